//! Transparent client-side encryption for single-request objects
//!
//! PUT: the entity is wrapped in an [`EncryptingEntity`] that emits
//! `IV ‖ ciphertext ‖ trailer`, and the object's metadata records the
//! cipher, IV, key id and trailer kind. GET: those headers drive
//! decryption, honoring the configured authentication mode. Ranged GET
//! translates the plaintext window onto the stored ciphertext and uses
//! the keystream's random access (CTR only).

use std::io::{self, Write};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use manta_core::object::{
    ENCRYPT_AEAD_TAG_LENGTH, ENCRYPT_CIPHER, ENCRYPT_HMAC, ENCRYPT_IV, ENCRYPT_KEY_ID,
    ENCRYPT_PLAINTEXT_CONTENT_LENGTH,
};
use manta_core::{
    EncryptionAuthMode, EncryptionConfig, MantaError, MantaMetadata, MantaObject, MantaResult,
};
use manta_crypto::{
    decrypt_object, decrypt_range, lookup, AuthMode, CipherDetails, EncryptionContext, SecretKey,
};

use crate::entity::Entity;

/// Entity wrapper producing the encrypted object layout.
pub struct EncryptingEntity {
    ctx: Option<EncryptionContext>,
    iv: Vec<u8>,
    inner: Box<dyn Entity>,
}

impl EncryptingEntity {
    pub fn new(ctx: EncryptionContext, inner: Box<dyn Entity>) -> Self {
        let iv = ctx.iv().to_vec();
        Self {
            ctx: Some(ctx),
            iv,
            inner,
        }
    }

    /// The object IV, available before the body is written.
    pub fn iv(&self) -> &[u8] {
        &self.iv
    }
}

struct CipherWriter<'a> {
    ctx: &'a mut EncryptionContext,
    out: &'a mut dyn Write,
    consumed: u64,
}

impl Write for CipherWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut scratch = buf.to_vec();
        self.ctx
            .encrypt(&mut scratch)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.out.write_all(&scratch)?;
        self.consumed += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Entity for EncryptingEntity {
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let mut ctx = self.ctx.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::Other, "encrypting entity was already written")
        })?;
        let declared = self.inner.content_length();

        out.write_all(&self.iv)?;
        let consumed = {
            let mut writer = CipherWriter {
                ctx: &mut ctx,
                out,
                consumed: 0,
            };
            self.inner.write_to(&mut writer)?;
            writer.consumed
        };
        if let Some(declared) = declared {
            if consumed != declared {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "bytes copied [{consumed}] does not equal the specified content length [{declared}]"
                    ),
                ));
            }
        }
        out.write_all(&ctx.finalize())?;
        Ok(())
    }

    /// Unknown: the trailer makes the body longer than the source.
    fn content_length(&self) -> Option<u64> {
        None
    }

    fn is_repeatable(&self) -> bool {
        false
    }
}

/// Encryption-aware overlay the client drives its object verbs through.
pub struct EncryptionLayer {
    details: &'static CipherDetails,
    key: SecretKey,
    key_id: String,
    auth_mode: AuthMode,
    permit_unencrypted_downloads: bool,
}

impl EncryptionLayer {
    pub fn new(config: &EncryptionConfig) -> MantaResult<Self> {
        let details = lookup(&config.algorithm)
            .ok_or_else(|| MantaError::Crypto(format!("unsupported cipher: {}", config.algorithm)))?;
        let key = match (&config.key_bytes, &config.key_path) {
            (Some(bytes), _) => SecretKey::from_bytes(bytes.clone()),
            (None, Some(path)) => {
                SecretKey::from_file(path).map_err(|e| MantaError::Crypto(e.to_string()))?
            }
            (None, None) => {
                return Err(MantaError::Crypto(
                    "either secret key path or bytes must be specified".into(),
                ))
            }
        };
        key.validate_for(details)
            .map_err(|e| MantaError::Crypto(e.to_string()))?;
        Ok(Self {
            details,
            key,
            key_id: config.key_id.clone(),
            auth_mode: match config.auth_mode {
                EncryptionAuthMode::Optional => AuthMode::Optional,
                EncryptionAuthMode::Mandatory => AuthMode::Mandatory,
            },
            permit_unencrypted_downloads: config.permit_unencrypted_downloads,
        })
    }

    pub fn details(&self) -> &'static CipherDetails {
        self.details
    }

    /// Wrap an entity for PUT and record the encryption metadata.
    pub fn wrap_for_put(
        &self,
        entity: Box<dyn Entity>,
        metadata: &mut MantaMetadata,
    ) -> MantaResult<EncryptingEntity> {
        let ctx = EncryptionContext::new(self.details, self.key.clone())
            .map_err(|e| MantaError::Crypto(e.to_string()))?;
        let plaintext_len = entity.content_length();

        metadata.put(ENCRYPT_KEY_ID, &self.key_id)?;
        metadata.put(ENCRYPT_CIPHER, self.details.id.canonical())?;
        metadata.put(ENCRYPT_IV, BASE64.encode(ctx.iv()))?;
        if let Some(len) = plaintext_len {
            metadata.put(ENCRYPT_PLAINTEXT_CONTENT_LENGTH, len.to_string())?;
        }
        if self.details.aead {
            metadata.put(ENCRYPT_AEAD_TAG_LENGTH, self.details.trailer_len.to_string())?;
        } else {
            let hmac = self
                .details
                .hmac
                .ok_or_else(|| MantaError::Crypto("cipher has no trailer definition".into()))?;
            metadata.put(ENCRYPT_HMAC, hmac.algorithm())?;
        }
        Ok(EncryptingEntity::new(ctx, entity))
    }

    /// Whether the object's headers mark it as client-side encrypted.
    pub fn is_encrypted(object: &MantaObject) -> bool {
        object.metadata().get(ENCRYPT_IV).is_some()
    }

    /// The cipher an encrypted object was written with.
    fn details_for(&self, object: &MantaObject) -> MantaResult<&'static CipherDetails> {
        let cipher = object.metadata().get(ENCRYPT_CIPHER).ok_or_else(|| {
            MantaError::Crypto(format!("object {} has no cipher metadata", object.path()))
        })?;
        lookup(cipher).ok_or_else(|| {
            MantaError::Crypto(format!(
                "object {} was encrypted with unsupported cipher {cipher}",
                object.path()
            ))
        })
    }

    fn iv_for(&self, object: &MantaObject) -> MantaResult<Vec<u8>> {
        let iv = object.metadata().get(ENCRYPT_IV).ok_or_else(|| {
            MantaError::Crypto(format!("object {} has no IV metadata", object.path()))
        })?;
        BASE64
            .decode(iv)
            .map_err(|e| MantaError::Crypto(format!("invalid IV metadata: {e}")))
    }

    /// Decrypt a full downloaded object; passes unencrypted objects
    /// through when the configuration permits.
    pub fn decrypt_get(&self, object: &MantaObject, body: Vec<u8>) -> MantaResult<Vec<u8>> {
        if !Self::is_encrypted(object) {
            if self.permit_unencrypted_downloads {
                tracing::warn!(
                    path = object.path(),
                    "downloading unencrypted object while client-side encryption is enabled"
                );
                return Ok(body);
            }
            return Err(MantaError::Crypto(format!(
                "object {} carries no encryption metadata and unencrypted downloads are not permitted",
                object.path()
            )));
        }
        let details = self.details_for(object)?;
        decrypt_object(details, &self.key, &body, self.auth_mode)
            .map_err(|e| MantaError::Crypto(e.to_string()))
    }

    /// Translate a plaintext window to the stored-object window that must
    /// be fetched.
    pub fn ciphertext_window(
        &self,
        object: &MantaObject,
        start: u64,
        end: u64,
    ) -> MantaResult<(u64, u64)> {
        let details = self.details_for(object)?;
        details
            .ciphertext_range(start, end)
            .map_err(|e| MantaError::Crypto(e.to_string()))
    }

    /// Decrypt a fetched ciphertext window for the plaintext range
    /// starting at `start`.
    pub fn decrypt_get_range(
        &self,
        object: &MantaObject,
        start: u64,
        window: &[u8],
    ) -> MantaResult<Vec<u8>> {
        if !Self::is_encrypted(object) {
            if self.permit_unencrypted_downloads {
                return Ok(window.to_vec());
            }
            return Err(MantaError::Crypto(format!(
                "object {} carries no encryption metadata and unencrypted downloads are not permitted",
                object.path()
            )));
        }
        let details = self.details_for(object)?;
        let iv = self.iv_for(object)?;
        decrypt_range(details, &self.key, &iv, start, window, self.auth_mode)
            .map_err(|e| MantaError::Crypto(e.to_string()))
    }

    /// Plaintext length of an encrypted object, from metadata when
    /// recorded, otherwise from the stored size.
    pub fn plaintext_len(&self, object: &MantaObject) -> MantaResult<Option<u64>> {
        if let Some(len) = object.metadata().get(ENCRYPT_PLAINTEXT_CONTENT_LENGTH) {
            let parsed = len.parse::<u64>().map_err(|e| {
                MantaError::Crypto(format!("invalid plaintext length metadata: {e}"))
            })?;
            return Ok(Some(parsed));
        }
        match object.content_length() {
            Some(stored) => {
                let details = self.details_for(object)?;
                let len = details
                    .plaintext_len(stored)
                    .map_err(|e| MantaError::Crypto(e.to_string()))?;
                Ok(Some(len))
            }
            None => Ok(None),
        }
    }
}
