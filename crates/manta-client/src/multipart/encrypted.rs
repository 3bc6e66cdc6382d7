//! Client-side encryption over server-side multipart uploads
//!
//! One encryption context per upload: the IV is generated at initiate,
//! every part's plaintext flows through the same keystream, and the
//! trailer (AEAD tag or HMAC) is uploaded as one synthetic final part at
//! complete. Part bodies stay block-aligned by routing ciphertext through
//! a [`MultipartOutputStream`]; the part-1 body starts with the IV.
//!
//! Parts of one upload must be encrypted in ascending order on a single
//! thread: the cipher state lives inside [`EncryptedMultipartUpload`] and
//! every part upload takes it `&mut`, so concurrent part encryption of
//! the same upload does not compile.

use std::io::{self, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use manta_core::object::{
    ENCRYPT_AEAD_TAG_LENGTH, ENCRYPT_CIPHER, ENCRYPT_HMAC, ENCRYPT_IV, ENCRYPT_KEY_ID,
    ENCRYPT_PLAINTEXT_CONTENT_LENGTH,
};
use manta_core::{
    EncryptionConfig, MantaError, MantaHttpHeaders, MantaMetadata, MantaResult, MultipartError,
    MultipartErrorKind,
};
use manta_crypto::{lookup, CipherDetails, EncryptionContext, SecretKey};

use crate::entity::{ByteArrayEntity, Entity};
use crate::multipart::output::MultipartOutputStream;
use crate::multipart::server::ServerSideMultipartManager;
use crate::multipart::{
    MultipartStatus, MultipartUploadPart, MultipartUploadTuple, ServerSideMultipartUpload,
    MAX_PARTS,
};

/// Sequential cipher state threaded through one upload's parts.
pub struct EncryptionState {
    ctx: Option<EncryptionContext>,
    stream: MultipartOutputStream<Vec<u8>>,
    last_part_number: u32,
    plaintext_bytes: u64,
}

impl EncryptionState {
    pub fn new(ctx: EncryptionContext) -> Self {
        let block_size = ctx.details().block_size;
        Self {
            ctx: Some(ctx),
            stream: MultipartOutputStream::new(block_size),
            last_part_number: 0,
            plaintext_bytes: 0,
        }
    }

    pub fn last_part_number(&self) -> u32 {
        self.last_part_number
    }

    /// Plaintext bytes consumed across all parts so far.
    pub fn plaintext_bytes(&self) -> u64 {
        self.plaintext_bytes
    }

    fn context(&mut self) -> MantaResult<&mut EncryptionContext> {
        self.ctx.as_mut().ok_or_else(|| {
            MultipartError::new(
                MultipartErrorKind::Validation,
                "upload is already finalized",
            )
            .into()
        })
    }

    /// Encrypt one part's plaintext into a block-aligned part body. The
    /// first part's body starts with the object IV.
    pub fn encrypt_part(
        &mut self,
        part_number: u32,
        plaintext: &mut dyn Entity,
    ) -> MantaResult<Vec<u8>> {
        if part_number != self.last_part_number + 1 {
            return Err(MultipartError::new(
                MultipartErrorKind::Validation,
                format!(
                    "encrypted parts must be uploaded in ascending order: expected part {}, got {}",
                    self.last_part_number + 1,
                    part_number
                ),
            )
            .into());
        }
        let declared_len = plaintext.content_length();
        let before = {
            let ctx = self.context()?;
            ctx.plaintext_len()
        };

        let mut sink = Vec::new();
        if part_number == 1 {
            let ctx = self.ctx.as_ref().expect("checked above");
            sink.extend_from_slice(ctx.iv());
        }
        self.stream.set_next(sink);

        {
            let mut writer = EncryptingWriter {
                ctx: self.ctx.as_mut().expect("checked above"),
                stream: &mut self.stream,
            };
            plaintext.write_to(&mut writer)?;
        }

        let consumed = self.ctx.as_ref().expect("checked above").plaintext_len() - before;
        if let Some(declared) = declared_len {
            if consumed != declared {
                return Err(MantaError::Io(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "bytes copied [{consumed}] does not equal the specified content length [{declared}]"
                    ),
                )));
            }
        }

        self.last_part_number = part_number;
        self.plaintext_bytes += consumed;
        Ok(self.stream.take_current().expect("sink set above"))
    }

    /// Drain the buffered ciphertext tail and the one-time trailer into
    /// the synthetic final part body. Consumes the cipher state.
    pub fn finalize_part(&mut self) -> MantaResult<Vec<u8>> {
        let ctx = match self.ctx.take() {
            Some(ctx) => ctx,
            None => {
                return Err(MultipartError::new(
                    MultipartErrorKind::Validation,
                    "upload is already finalized",
                )
                .into())
            }
        };
        self.stream.set_next(Vec::new());
        self.stream.flush_buffer()?;
        let mut body = self.stream.take_current().expect("sink set above");
        body.extend_from_slice(&ctx.finalize());
        Ok(body)
    }

    pub fn is_finalized(&self) -> bool {
        self.ctx.is_none()
    }
}

/// Routes plaintext through the cipher into the part-aligned stream.
struct EncryptingWriter<'a> {
    ctx: &'a mut EncryptionContext,
    stream: &'a mut MultipartOutputStream<Vec<u8>>,
}

impl Write for EncryptingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut scratch = buf.to_vec();
        self.ctx
            .encrypt(&mut scratch)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.stream.write(&scratch)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A server-side upload plus the cipher state its parts share.
pub struct EncryptedMultipartUpload {
    inner: ServerSideMultipartUpload,
    state: EncryptionState,
}

impl EncryptedMultipartUpload {
    pub fn inner(&self) -> &ServerSideMultipartUpload {
        &self.inner
    }

    pub fn state(&self) -> &EncryptionState {
        &self.state
    }
}

/// Multipart manager that transparently encrypts parts.
pub struct EncryptedServerSideMultipartManager {
    manager: Arc<ServerSideMultipartManager>,
    details: &'static CipherDetails,
    key: SecretKey,
    key_id: String,
}

impl EncryptedServerSideMultipartManager {
    pub fn new(
        manager: Arc<ServerSideMultipartManager>,
        encryption: &EncryptionConfig,
    ) -> MantaResult<Self> {
        let details = lookup(&encryption.algorithm).ok_or_else(|| {
            MantaError::Crypto(format!("unsupported cipher: {}", encryption.algorithm))
        })?;
        let key = match (&encryption.key_bytes, &encryption.key_path) {
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
        if encryption.key_id.is_empty() {
            return Err(MantaError::Crypto("encryption key id must be set".into()));
        }
        Ok(Self {
            manager,
            details,
            key,
            key_id: encryption.key_id.clone(),
        })
    }

    /// Begin an encrypted upload: generate the object IV and record the
    /// encryption metadata alongside any caller metadata. A caller-supplied
    /// content length is recorded as the plaintext length.
    pub fn initiate(
        &self,
        path: &str,
        metadata: Option<&MantaMetadata>,
        headers: Option<&MantaHttpHeaders>,
    ) -> MantaResult<EncryptedMultipartUpload> {
        let ctx = EncryptionContext::new(self.details, self.key.clone())
            .map_err(|e| MantaError::Crypto(e.to_string()))?;

        let mut merged = metadata.cloned().unwrap_or_default();
        merged.put(ENCRYPT_KEY_ID, &self.key_id)?;
        merged.put(ENCRYPT_CIPHER, self.details.id.canonical())?;
        merged.put(ENCRYPT_IV, BASE64.encode(ctx.iv()))?;
        if let Some(len) = headers.and_then(MantaHttpHeaders::content_length) {
            merged.put(ENCRYPT_PLAINTEXT_CONTENT_LENGTH, len.to_string())?;
        }
        if self.details.aead {
            merged.put(
                ENCRYPT_AEAD_TAG_LENGTH,
                self.details.trailer_len.to_string(),
            )?;
        } else {
            let hmac = self
                .details
                .hmac
                .ok_or_else(|| MantaError::Crypto("cipher has no trailer definition".into()))?;
            merged.put(ENCRYPT_HMAC, hmac.algorithm())?;
        }

        // the stored object is ciphertext: its length and checksum differ
        // from what the caller declared for the plaintext
        let forwarded_headers = headers.map(|h| {
            let mut h = h.clone();
            h.remove("content-length");
            h.remove("content-md5");
            h
        });

        let inner =
            self.manager
                .initiate(path, Some(&merged), forwarded_headers.as_ref())?;
        Ok(EncryptedMultipartUpload {
            inner,
            state: EncryptionState::new(ctx),
        })
    }

    /// Encrypt and upload one part. Parts must arrive in ascending order
    /// starting at 1.
    pub fn upload_part(
        &self,
        upload: &mut EncryptedMultipartUpload,
        part_number: u32,
        mut plaintext: Box<dyn Entity>,
    ) -> MantaResult<MultipartUploadPart> {
        let body = upload.state.encrypt_part(part_number, plaintext.as_mut())?;
        self.manager
            .upload_part(&upload.inner, part_number, Box::new(ByteArrayEntity::new(body)))
    }

    /// Seal the cipher stream, upload the trailer as the final part, and
    /// commit everything.
    pub fn complete(
        &self,
        upload: &mut EncryptedMultipartUpload,
        parts: &[MultipartUploadTuple],
    ) -> MantaResult<()> {
        let final_part_number = upload.state.last_part_number() + 1;
        if final_part_number > MAX_PARTS {
            return Err(MultipartError::new(
                MultipartErrorKind::Validation,
                format!(
                    "no part slot left for the encryption trailer: {} parts were uploaded \
                     and the maximum is {MAX_PARTS}",
                    upload.state.last_part_number()
                ),
            )
            .with("uploadId", upload.inner.id)
            .into());
        }

        let body = upload.state.finalize_part()?;
        let final_part =
            self.manager
                .upload_part(&upload.inner, final_part_number, Box::new(ByteArrayEntity::new(body)))?;

        let mut tuples: Vec<MultipartUploadTuple> = parts.to_vec();
        tuples.push(final_part.into());
        tuples.sort();
        self.manager.complete(&upload.inner, &tuples)
    }

    /// Abort the underlying upload. The cipher state is discarded.
    pub fn abort(&self, upload: &mut EncryptedMultipartUpload) -> MantaResult<()> {
        upload.state.ctx = None;
        self.manager.abort(&upload.inner)
    }

    pub fn get_status(
        &self,
        upload: &EncryptedMultipartUpload,
    ) -> MantaResult<MultipartStatus> {
        self.manager.get_status(&upload.inner)
    }
}
