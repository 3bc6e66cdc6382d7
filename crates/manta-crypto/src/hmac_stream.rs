//! Encrypt-then-MAC trailer
//!
//! Non-AEAD ciphers get an HMAC computed over `IV ‖ ciphertext` and
//! appended once after the ciphertext. The algorithm name recorded in
//! object metadata uses the JCA spelling (`HmacSHA256`) so objects stay
//! readable across client implementations.

use hmac::{Hmac, Mac};
use sha2::{Sha256, Sha512};
use subtle::ConstantTimeEq;

/// Supported HMAC flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacKind {
    Sha256,
    Sha512,
}

impl HmacKind {
    /// Metadata value identifying this flavor.
    pub fn algorithm(&self) -> &'static str {
        match self {
            HmacKind::Sha256 => "HmacSHA256",
            HmacKind::Sha512 => "HmacSHA512",
        }
    }

    pub fn parse(name: &str) -> Option<HmacKind> {
        if name.eq_ignore_ascii_case("HmacSHA256") {
            Some(HmacKind::Sha256)
        } else if name.eq_ignore_ascii_case("HmacSHA512") {
            Some(HmacKind::Sha512)
        } else {
            None
        }
    }

    pub fn output_len(&self) -> usize {
        match self {
            HmacKind::Sha256 => 32,
            HmacKind::Sha512 => 64,
        }
    }
}

/// Incrementally-fed HMAC.
#[derive(Clone)]
pub enum HmacStream {
    Sha256(Hmac<Sha256>),
    Sha512(Hmac<Sha512>),
}

impl HmacStream {
    pub fn new(kind: HmacKind, key: &[u8]) -> anyhow::Result<Self> {
        let stream = match kind {
            HmacKind::Sha256 => HmacStream::Sha256(
                Hmac::new_from_slice(key).map_err(|e| anyhow::anyhow!("HMAC init: {e}"))?,
            ),
            HmacKind::Sha512 => HmacStream::Sha512(
                Hmac::new_from_slice(key).map_err(|e| anyhow::anyhow!("HMAC init: {e}"))?,
            ),
        };
        Ok(stream)
    }

    pub fn kind(&self) -> HmacKind {
        match self {
            HmacStream::Sha256(_) => HmacKind::Sha256,
            HmacStream::Sha512(_) => HmacKind::Sha512,
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        match self {
            HmacStream::Sha256(m) => m.update(data),
            HmacStream::Sha512(m) => m.update(data),
        }
    }

    pub fn finalize(self) -> Vec<u8> {
        match self {
            HmacStream::Sha256(m) => m.finalize().into_bytes().to_vec(),
            HmacStream::Sha512(m) => m.finalize().into_bytes().to_vec(),
        }
    }

    /// Constant-time check of a received trailer.
    pub fn verify(self, expected: &[u8]) -> bool {
        let computed = self.finalize();
        computed.ct_eq(expected).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn algorithm_names_roundtrip() {
        assert_eq!(HmacKind::parse("HmacSHA256"), Some(HmacKind::Sha256));
        assert_eq!(HmacKind::parse("hmacsha512"), Some(HmacKind::Sha512));
        assert_eq!(HmacKind::parse("HmacMD5"), None);
        assert_eq!(HmacKind::Sha256.algorithm(), "HmacSHA256");
    }

    #[test]
    fn incremental_equals_one_shot() {
        let key = [9u8; 32];
        let data = b"iv-bytes-here-then-lots-of-ciphertext".to_vec();

        let mut one = HmacStream::new(HmacKind::Sha256, &key).unwrap();
        one.update(&data);
        let a = one.finalize();

        let mut two = HmacStream::new(HmacKind::Sha256, &key).unwrap();
        two.update(&data[..5]);
        two.update(&data[5..20]);
        two.update(&data[20..]);
        let b = two.finalize();

        assert_eq!(a, b);
        assert_eq!(a.len(), HmacKind::Sha256.output_len());
    }

    #[test]
    fn verify_detects_mismatch() {
        let key = [1u8; 16];
        let mut mac = HmacStream::new(HmacKind::Sha256, &key).unwrap();
        mac.update(b"payload");
        let mut tag = mac.clone().finalize();
        assert!(mac.clone().verify(&tag));
        tag[0] ^= 0xff;
        assert!(!mac.verify(&tag));
    }
}
