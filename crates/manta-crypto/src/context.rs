//! Per-object encryption context
//!
//! One context per encrypted object: cipher details, secret key, the
//! object's single IV, the live keystream, and (for MtE) the running
//! HMAC. The context is an owned value; a multipart upload threads it
//! through parts one at a time, and [`EncryptionContext::freeze`] takes a
//! snapshot that can later continue the stream from the same position.

use rand::RngCore;

use crate::catalog::CipherDetails;
use crate::ctr_stream::CtrStream;
use crate::gcm::GcmStream;
use crate::hmac_stream::HmacStream;
use crate::key::SecretKey;

#[derive(Clone)]
enum StreamState {
    /// MtE: keystream plus the HMAC that will become the trailer.
    Ctr { cipher: CtrStream, hmac: HmacStream },
    /// AEAD: the tag is produced by the stream itself.
    Gcm(GcmStream),
}

#[derive(Clone)]
pub struct EncryptionContext {
    details: &'static CipherDetails,
    key: SecretKey,
    iv: Vec<u8>,
    state: StreamState,
    plaintext_len: u64,
}

impl EncryptionContext {
    /// Create a context with a freshly generated IV.
    pub fn new(details: &'static CipherDetails, key: SecretKey) -> anyhow::Result<Self> {
        let mut iv = vec![0u8; details.iv_len];
        rand::thread_rng().fill_bytes(&mut iv);
        Self::with_iv(details, key, iv)
    }

    /// Create a context over a caller-supplied IV.
    pub fn with_iv(
        details: &'static CipherDetails,
        key: SecretKey,
        iv: Vec<u8>,
    ) -> anyhow::Result<Self> {
        key.validate_for(details)?;
        if iv.len() != details.iv_len {
            anyhow::bail!(
                "IV is {} bytes but {} requires {}",
                iv.len(),
                details.id,
                details.iv_len
            );
        }
        let state = if details.aead {
            StreamState::Gcm(GcmStream::new(key.as_bytes(), &iv)?)
        } else {
            let kind = details
                .hmac
                .ok_or_else(|| anyhow::anyhow!("{} has no trailer definition", details.id))?;
            let mut hmac = HmacStream::new(kind, key.as_bytes())?;
            // The trailer covers IV ‖ ciphertext.
            hmac.update(&iv);
            StreamState::Ctr {
                cipher: CtrStream::new(key.as_bytes(), &iv)?,
                hmac,
            }
        };
        Ok(Self {
            details,
            key,
            iv,
            state,
            plaintext_len: 0,
        })
    }

    pub fn details(&self) -> &'static CipherDetails {
        self.details
    }

    pub fn iv(&self) -> &[u8] {
        &self.iv
    }

    pub fn key(&self) -> &SecretKey {
        &self.key
    }

    /// Plaintext bytes encrypted so far.
    pub fn plaintext_len(&self) -> u64 {
        self.plaintext_len
    }

    /// Encrypt `buf` in place, advancing keystream and trailer state.
    pub fn encrypt(&mut self, buf: &mut [u8]) -> anyhow::Result<()> {
        let next = self.plaintext_len + buf.len() as u64;
        if next > self.details.max_plaintext {
            anyhow::bail!(
                "plaintext of {next} bytes exceeds the {} limit of {}",
                self.details.max_plaintext,
                self.details.id
            );
        }
        match &mut self.state {
            StreamState::Ctr { cipher, hmac } => {
                cipher.apply(buf);
                hmac.update(buf);
            }
            StreamState::Gcm(stream) => stream.encrypt(buf),
        }
        self.plaintext_len = next;
        Ok(())
    }

    /// Produce the one-time trailer: the AEAD tag or the HMAC bytes.
    /// Consumes the context; nothing may be encrypted afterwards.
    pub fn finalize(self) -> Vec<u8> {
        match self.state {
            StreamState::Ctr { hmac, .. } => hmac.finalize(),
            StreamState::Gcm(stream) => stream.finalize().to_vec(),
        }
    }

    /// Snapshot the full cipher state for later continuation.
    pub fn freeze(&self) -> FrozenContext {
        FrozenContext {
            inner: self.clone(),
        }
    }
}

impl std::fmt::Debug for EncryptionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionContext")
            .field("cipher", &self.details.id)
            .field("plaintext_len", &self.plaintext_len)
            .field("key", &"?")
            .finish()
    }
}

/// A saved cipher state. Thawing resumes exactly where the snapshot was
/// taken; the original context remains usable.
pub struct FrozenContext {
    inner: EncryptionContext,
}

impl FrozenContext {
    pub fn thaw(self) -> EncryptionContext {
        self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CipherId;

    fn ctx(id: CipherId) -> EncryptionContext {
        let details = id.details();
        let key = SecretKey::from_bytes(vec![0x11; details.key_len]);
        EncryptionContext::new(details, key).unwrap()
    }

    #[test]
    fn one_iv_per_context() {
        let a = ctx(CipherId::Aes256Ctr);
        let b = ctx(CipherId::Aes256Ctr);
        assert_eq!(a.iv().len(), 16);
        assert_ne!(a.iv(), b.iv(), "fresh contexts must draw fresh IVs");
    }

    #[test]
    fn ctr_trailer_is_hmac_over_iv_and_ciphertext() {
        let details = CipherId::Aes256Ctr.details();
        let key = SecretKey::from_bytes(vec![0x22; 32]);
        let iv = vec![0x33; 16];
        let mut c =
            EncryptionContext::with_iv(details, key.clone(), iv.clone()).unwrap();

        let mut data = b"hello trailer".to_vec();
        c.encrypt(&mut data).unwrap();
        let trailer = c.finalize();
        assert_eq!(trailer.len(), details.trailer_len);

        let mut mac = HmacStream::new(details.hmac.unwrap(), key.as_bytes()).unwrap();
        mac.update(&iv);
        mac.update(&data);
        assert_eq!(mac.finalize(), trailer);
    }

    #[test]
    fn freeze_then_thaw_continues_the_stream() {
        let details = CipherId::Aes256Ctr.details();
        let key = SecretKey::from_bytes(vec![0x44; 32]);
        let iv = vec![0x55; 16];

        let mut whole =
            EncryptionContext::with_iv(details, key.clone(), iv.clone()).unwrap();
        let mut expected: Vec<u8> = (0u8..=255).cycle().take(500).collect();
        whole.encrypt(&mut expected).unwrap();

        let mut first = EncryptionContext::with_iv(details, key, iv).unwrap();
        let src: Vec<u8> = (0u8..=255).cycle().take(500).collect();
        let mut head = src[..123].to_vec();
        first.encrypt(&mut head).unwrap();

        let frozen = first.freeze();
        drop(first);
        let mut resumed = frozen.thaw();
        let mut tail = src[123..].to_vec();
        resumed.encrypt(&mut tail).unwrap();

        head.extend_from_slice(&tail);
        assert_eq!(head, expected);
        assert_eq!(resumed.plaintext_len(), 500);
    }

    #[test]
    fn wrong_key_length_is_rejected() {
        let details = CipherId::Aes256Gcm.details();
        let key = SecretKey::from_bytes(vec![0; 16]);
        assert!(EncryptionContext::new(details, key).is_err());
    }

    #[test]
    fn gcm_trailer_is_tag_sized() {
        let mut c = ctx(CipherId::Aes128Gcm);
        let mut data = vec![1u8; 48];
        c.encrypt(&mut data).unwrap();
        assert_eq!(c.finalize().len(), 16);
    }
}
