//! Supported cipher catalog
//!
//! Each entry fixes the layout parameters a reader needs to interpret an
//! encrypted object: IV length, trailer length, whether the trailer is an
//! AEAD tag or an HMAC, and how plaintext offsets map to ciphertext
//! offsets for random access.

use crate::hmac_stream::HmacKind;
use crate::{AES_BLOCK_SIZE, GCM_TAG_SIZE};

/// Canonical cipher identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CipherId {
    Aes128Ctr,
    Aes192Ctr,
    Aes256Ctr,
    Aes128Gcm,
    Aes192Gcm,
    Aes256Gcm,
}

impl CipherId {
    /// The canonical identifier string recorded in object metadata.
    pub fn canonical(&self) -> &'static str {
        match self {
            CipherId::Aes128Ctr => "AES128/CTR/NoPadding",
            CipherId::Aes192Ctr => "AES192/CTR/NoPadding",
            CipherId::Aes256Ctr => "AES256/CTR/NoPadding",
            CipherId::Aes128Gcm => "AES128/GCM/NoPadding",
            CipherId::Aes192Gcm => "AES192/GCM/NoPadding",
            CipherId::Aes256Gcm => "AES256/GCM/NoPadding",
        }
    }

    /// Case-insensitive parse of a canonical identifier.
    pub fn parse(name: &str) -> Option<CipherId> {
        ALL.iter()
            .map(|d| d.id)
            .find(|id| id.canonical().eq_ignore_ascii_case(name))
    }

    pub fn details(&self) -> &'static CipherDetails {
        lookup(self.canonical()).expect("catalog covers all ids")
    }
}

impl std::fmt::Display for CipherId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.canonical())
    }
}

/// Layout and limit parameters of a supported cipher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherDetails {
    pub id: CipherId,
    /// Secret key length in bytes.
    pub key_len: usize,
    /// Alignment unit for multipart boundaries.
    pub block_size: usize,
    /// IV length in bytes.
    pub iv_len: usize,
    /// Trailer length: AEAD tag or HMAC output.
    pub trailer_len: usize,
    /// True when the trailer is produced by the cipher itself.
    pub aead: bool,
    /// HMAC flavor for MtE ciphers; `None` for AEAD.
    pub hmac: Option<HmacKind>,
    /// Maximum plaintext a single object may carry.
    pub max_plaintext: u64,
}

// GCM's 32-bit block counter bounds the payload at (2^32 - 2) blocks.
const GCM_MAX_PLAINTEXT: u64 = ((1u64 << 32) - 2) * AES_BLOCK_SIZE as u64;

const fn ctr(id: CipherId, key_len: usize) -> CipherDetails {
    CipherDetails {
        id,
        key_len,
        block_size: AES_BLOCK_SIZE,
        iv_len: AES_BLOCK_SIZE,
        trailer_len: 32,
        aead: false,
        hmac: Some(HmacKind::Sha256),
        max_plaintext: i64::MAX as u64,
    }
}

const fn gcm(id: CipherId, key_len: usize) -> CipherDetails {
    CipherDetails {
        id,
        key_len,
        block_size: AES_BLOCK_SIZE,
        iv_len: 12,
        trailer_len: GCM_TAG_SIZE,
        aead: true,
        hmac: None,
        max_plaintext: GCM_MAX_PLAINTEXT,
    }
}

static ALL: [CipherDetails; 6] = [
    ctr(CipherId::Aes128Ctr, 16),
    ctr(CipherId::Aes192Ctr, 24),
    ctr(CipherId::Aes256Ctr, 32),
    gcm(CipherId::Aes128Gcm, 16),
    gcm(CipherId::Aes192Gcm, 24),
    gcm(CipherId::Aes256Gcm, 32),
];

/// Look up cipher details by canonical identifier, case-insensitively.
pub fn lookup(name: &str) -> Option<&'static CipherDetails> {
    ALL.iter()
        .find(|d| d.id.canonical().eq_ignore_ascii_case(name))
}

impl CipherDetails {
    /// Total stored object size for a given plaintext size.
    pub fn ciphertext_len(&self, plaintext_len: u64) -> u64 {
        self.iv_len as u64 + plaintext_len + self.trailer_len as u64
    }

    /// Plaintext size recovered from a stored object size.
    pub fn plaintext_len(&self, object_len: u64) -> anyhow::Result<u64> {
        let overhead = (self.iv_len + self.trailer_len) as u64;
        if object_len < overhead {
            anyhow::bail!(
                "object of {object_len} bytes is shorter than the {overhead}-byte \
                 encryption overhead of {}",
                self.id
            );
        }
        Ok(object_len - overhead)
    }

    /// Whether byte ranges of the ciphertext can be decrypted independently.
    pub fn supports_random_access(&self) -> bool {
        !self.aead
    }

    /// Map a plaintext byte window onto the stored-object byte window that
    /// must be fetched to decrypt it. Only meaningful for random-access
    /// ciphers: a stream cipher's ciphertext is byte-for-byte aligned with
    /// its plaintext, offset by the leading IV.
    pub fn ciphertext_range(
        &self,
        plaintext_start: u64,
        plaintext_end: u64,
    ) -> anyhow::Result<(u64, u64)> {
        if !self.supports_random_access() {
            anyhow::bail!("{} does not support random-access decryption", self.id);
        }
        if plaintext_start > plaintext_end {
            anyhow::bail!("invalid range: {plaintext_start} > {plaintext_end}");
        }
        let iv = self.iv_len as u64;
        Ok((iv + plaintext_start, iv + plaintext_end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_is_case_insensitive() {
        let d = lookup("aes256/ctr/nopadding").unwrap();
        assert_eq!(d.id, CipherId::Aes256Ctr);
        assert_eq!(d.key_len, 32);
        assert!(lookup("AES512/CTR/NoPadding").is_none());
    }

    #[test]
    fn canonical_names_roundtrip() {
        for d in &ALL {
            assert_eq!(CipherId::parse(d.id.canonical()), Some(d.id));
        }
    }

    #[test]
    fn ctr_layout() {
        let d = CipherId::Aes256Ctr.details();
        assert_eq!(d.iv_len, 16);
        assert_eq!(d.trailer_len, 32);
        assert!(!d.aead);
        assert_eq!(d.hmac, Some(HmacKind::Sha256));
        assert_eq!(d.ciphertext_len(100), 16 + 100 + 32);
        assert_eq!(d.plaintext_len(d.ciphertext_len(100)).unwrap(), 100);
    }

    #[test]
    fn gcm_layout() {
        let d = CipherId::Aes128Gcm.details();
        assert_eq!(d.iv_len, 12);
        assert_eq!(d.trailer_len, 16);
        assert!(d.aead);
        assert!(!d.supports_random_access());
        assert!(d.ciphertext_range(0, 10).is_err());
    }

    #[test]
    fn short_object_is_rejected() {
        let d = CipherId::Aes256Ctr.details();
        assert!(d.plaintext_len(10).is_err());
    }

    #[test]
    fn ctr_range_is_iv_shifted() {
        let d = CipherId::Aes128Ctr.details();
        let (s, e) = d.ciphertext_range(7 * 1024, 7 * 1024 + 100).unwrap();
        assert_eq!(s, 16 + 7 * 1024);
        assert_eq!(e, 16 + 7 * 1024 + 100);
    }

    #[test]
    fn gcm_plaintext_cap() {
        let d = CipherId::Aes256Gcm.details();
        assert_eq!(d.max_plaintext, 68_719_476_704);
    }
}
