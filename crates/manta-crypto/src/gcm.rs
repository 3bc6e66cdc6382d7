//! Incremental AES-GCM
//!
//! The one-shot AEAD APIs want the whole message at once, which does not
//! work when one object's ciphertext is produced across many multipart
//! part bodies. This module assembles GCM from its parts — AES-CTR with a
//! 32-bit big-endian counter plus GHASH — so that data can be fed in
//! arbitrary increments and the tag is produced (or checked) exactly once
//! at the end. No associated data is used.
//!
//! Counter layout per NIST SP 800-38D with a 96-bit IV:
//! `J0 = IV ‖ 0x00000001`; the tag mask is `E_K(J0)` and payload blocks
//! start at `inc32(J0)`.

use aes::{Aes128, Aes192, Aes256};
use cipher::generic_array::GenericArray;
use cipher::{BlockEncrypt, KeyInit, KeyIvInit, StreamCipher};
use ctr::Ctr32BE;
use ghash::universal_hash::UniversalHash;
use ghash::GHash;
use subtle::ConstantTimeEq;

use crate::GCM_TAG_SIZE;

const BLOCK: usize = 16;

/// Encrypt one block with a raw AES key of any supported length.
fn aes_encrypt_block(key: &[u8], block: &mut [u8; BLOCK]) -> anyhow::Result<()> {
    let ga = GenericArray::from_mut_slice(block);
    match key.len() {
        16 => Aes128::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("AES init: {e}"))?
            .encrypt_block(ga),
        24 => Aes192::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("AES init: {e}"))?
            .encrypt_block(ga),
        32 => Aes256::new_from_slice(key)
            .map_err(|e| anyhow::anyhow!("AES init: {e}"))?
            .encrypt_block(ga),
        n => anyhow::bail!("unsupported AES key length: {n}"),
    }
    Ok(())
}

#[derive(Clone)]
enum Ctr32 {
    Aes128(Ctr32BE<Aes128>),
    Aes192(Ctr32BE<Aes192>),
    Aes256(Ctr32BE<Aes256>),
}

impl Ctr32 {
    fn new(key: &[u8], j0: &[u8; BLOCK]) -> anyhow::Result<Self> {
        let stream = match key.len() {
            16 => Ctr32::Aes128(
                Ctr32BE::<Aes128>::new_from_slices(key, j0)
                    .map_err(|e| anyhow::anyhow!("GCM CTR init: {e}"))?,
            ),
            24 => Ctr32::Aes192(
                Ctr32BE::<Aes192>::new_from_slices(key, j0)
                    .map_err(|e| anyhow::anyhow!("GCM CTR init: {e}"))?,
            ),
            32 => Ctr32::Aes256(
                Ctr32BE::<Aes256>::new_from_slices(key, j0)
                    .map_err(|e| anyhow::anyhow!("GCM CTR init: {e}"))?,
            ),
            n => anyhow::bail!("unsupported AES key length: {n}"),
        };
        Ok(stream)
    }

    fn apply(&mut self, buf: &mut [u8]) {
        match self {
            Ctr32::Aes128(c) => c.apply_keystream(buf),
            Ctr32::Aes192(c) => c.apply_keystream(buf),
            Ctr32::Aes256(c) => c.apply_keystream(buf),
        }
    }
}

/// Shared GHASH accumulator that tolerates unaligned input.
#[derive(Clone)]
struct GhashAcc {
    ghash: GHash,
    partial: [u8; BLOCK],
    partial_len: usize,
    total: u64,
}

impl GhashAcc {
    fn new(h: &[u8; BLOCK]) -> Self {
        Self {
            ghash: GHash::new(GenericArray::from_slice(h)),
            partial: [0u8; BLOCK],
            partial_len: 0,
            total: 0,
        }
    }

    fn update(&mut self, mut data: &[u8]) {
        self.total += data.len() as u64;
        if self.partial_len > 0 {
            let need = BLOCK - self.partial_len;
            if data.len() < need {
                self.partial[self.partial_len..self.partial_len + data.len()]
                    .copy_from_slice(data);
                self.partial_len += data.len();
                return;
            }
            self.partial[self.partial_len..].copy_from_slice(&data[..need]);
            let block = GenericArray::clone_from_slice(&self.partial);
            self.ghash.update(&[block]);
            self.partial_len = 0;
            data = &data[need..];
        }
        let aligned = data.len() / BLOCK * BLOCK;
        for chunk in data[..aligned].chunks_exact(BLOCK) {
            self.ghash.update(&[GenericArray::clone_from_slice(chunk)]);
        }
        let tail = &data[aligned..];
        self.partial[..tail.len()].copy_from_slice(tail);
        self.partial_len = tail.len();
    }

    /// Fold in the final zero padding and the length block, producing S.
    fn finalize(mut self) -> [u8; BLOCK] {
        if self.partial_len > 0 {
            for b in &mut self.partial[self.partial_len..] {
                *b = 0;
            }
            let block = GenericArray::clone_from_slice(&self.partial);
            self.ghash.update(&[block]);
        }
        let mut len_block = [0u8; BLOCK];
        // AAD is always empty: first 8 bytes stay zero.
        len_block[8..].copy_from_slice(&(self.total * 8).to_be_bytes());
        self.ghash.update(&[GenericArray::clone_from_slice(&len_block)]);
        self.ghash.finalize().into()
    }
}

fn setup(key: &[u8], iv: &[u8]) -> anyhow::Result<(Ctr32, GhashAcc, [u8; BLOCK])> {
    if iv.len() != 12 {
        anyhow::bail!("GCM IV must be 12 bytes, got {}", iv.len());
    }
    let mut h = [0u8; BLOCK];
    aes_encrypt_block(key, &mut h)?;

    let mut j0 = [0u8; BLOCK];
    j0[..12].copy_from_slice(iv);
    j0[15] = 1;

    let mut ctr = Ctr32::new(key, &j0)?;
    // First keystream block is E_K(J0): consume it as the tag mask so the
    // payload starts at inc32(J0).
    let mut tag_mask = [0u8; BLOCK];
    ctr.apply(&mut tag_mask);

    Ok((ctr, GhashAcc::new(&h), tag_mask))
}

/// Incremental GCM encryption. Feed plaintext through [`GcmStream::encrypt`]
/// in any increments; call [`GcmStream::finalize`] once for the tag.
#[derive(Clone)]
pub struct GcmStream {
    ctr: Ctr32,
    acc: GhashAcc,
    tag_mask: [u8; BLOCK],
}

impl GcmStream {
    pub fn new(key: &[u8], iv: &[u8]) -> anyhow::Result<Self> {
        let (ctr, acc, tag_mask) = setup(key, iv)?;
        Ok(Self { ctr, acc, tag_mask })
    }

    /// Encrypt `buf` in place, folding the ciphertext into the tag state.
    pub fn encrypt(&mut self, buf: &mut [u8]) {
        self.ctr.apply(buf);
        self.acc.update(buf);
    }

    /// Total ciphertext bytes processed so far.
    pub fn ciphertext_len(&self) -> u64 {
        self.acc.total
    }

    /// Produce the authentication tag. Consumes the stream: the tag is
    /// emitted exactly once, after the last byte.
    pub fn finalize(self) -> [u8; GCM_TAG_SIZE] {
        let mut tag = self.acc.finalize();
        for (t, m) in tag.iter_mut().zip(self.tag_mask.iter()) {
            *t ^= m;
        }
        tag
    }
}

/// Incremental GCM decryption with tag verification at the end.
#[derive(Clone)]
pub struct GcmVerifier {
    ctr: Ctr32,
    acc: GhashAcc,
    tag_mask: [u8; BLOCK],
}

impl GcmVerifier {
    pub fn new(key: &[u8], iv: &[u8]) -> anyhow::Result<Self> {
        let (ctr, acc, tag_mask) = setup(key, iv)?;
        Ok(Self { ctr, acc, tag_mask })
    }

    /// Decrypt `buf` in place. The ciphertext is folded into the tag state
    /// before decryption.
    pub fn decrypt(&mut self, buf: &mut [u8]) {
        self.acc.update(buf);
        self.ctr.apply(buf);
    }

    /// Check the expected tag in constant time.
    pub fn finalize(self, expected_tag: &[u8]) -> anyhow::Result<()> {
        let mut tag = self.acc.finalize();
        for (t, m) in tag.iter_mut().zip(self.tag_mask.iter()) {
            *t ^= m;
        }
        if tag[..].ct_eq(expected_tag).into() {
            Ok(())
        } else {
            anyhow::bail!("GCM authentication tag mismatch")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aes_gcm::aead::{Aead, KeyInit as AeadKeyInit, Payload};
    use aes_gcm::{Aes128Gcm, Aes256Gcm, Nonce};

    fn key(n: usize) -> Vec<u8> {
        (0..n as u8).map(|b| b.wrapping_mul(7).wrapping_add(3)).collect()
    }

    fn iv12() -> Vec<u8> {
        (50u8..62).collect()
    }

    /// Reference ciphertext ‖ tag from the RustCrypto one-shot implementation.
    fn reference(key_bytes: &[u8], iv: &[u8], plaintext: &[u8]) -> Vec<u8> {
        let payload = Payload {
            msg: plaintext,
            aad: &[],
        };
        match key_bytes.len() {
            16 => Aes128Gcm::new_from_slice(key_bytes)
                .unwrap()
                .encrypt(Nonce::from_slice(iv), payload)
                .unwrap(),
            32 => Aes256Gcm::new_from_slice(key_bytes)
                .unwrap()
                .encrypt(Nonce::from_slice(iv), payload)
                .unwrap(),
            _ => unreachable!("reference covers 128/256 only"),
        }
    }

    #[test]
    fn matches_one_shot_aes256() {
        let k = key(32);
        let iv = iv12();
        let plaintext: Vec<u8> = (0u8..=255).cycle().take(4097).collect();

        let expected = reference(&k, &iv, &plaintext);

        let mut buf = plaintext.clone();
        let mut stream = GcmStream::new(&k, &iv).unwrap();
        // deliberately unaligned increments
        let mut off = 0;
        for len in [1usize, 5, 16, 31, 1024, 3020] {
            stream.encrypt(&mut buf[off..off + len]);
            off += len;
        }
        assert_eq!(off, plaintext.len());
        let tag = stream.finalize();

        assert_eq!(&buf[..], &expected[..plaintext.len()]);
        assert_eq!(&tag[..], &expected[plaintext.len()..]);
    }

    #[test]
    fn matches_one_shot_aes128() {
        let k = key(16);
        let iv = iv12();
        let plaintext = b"a short message".to_vec();

        let expected = reference(&k, &iv, &plaintext);

        let mut buf = plaintext.clone();
        let mut stream = GcmStream::new(&k, &iv).unwrap();
        stream.encrypt(&mut buf);
        let tag = stream.finalize();

        assert_eq!(&buf[..], &expected[..plaintext.len()]);
        assert_eq!(&tag[..], &expected[plaintext.len()..]);
    }

    #[test]
    fn empty_plaintext_tag_matches() {
        let k = key(32);
        let iv = iv12();
        let expected = reference(&k, &iv, b"");
        let tag = GcmStream::new(&k, &iv).unwrap().finalize();
        assert_eq!(&tag[..], &expected[..]);
    }

    #[test]
    fn verifier_roundtrip() {
        let k = key(32);
        let iv = iv12();
        let plaintext: Vec<u8> = (0u8..200).collect();

        let mut ct = plaintext.clone();
        let mut enc = GcmStream::new(&k, &iv).unwrap();
        enc.encrypt(&mut ct);
        let tag = enc.finalize();

        let mut out = ct.clone();
        let mut dec = GcmVerifier::new(&k, &iv).unwrap();
        dec.decrypt(&mut out);
        dec.finalize(&tag).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn tamper_is_detected() {
        let k = key(32);
        let iv = iv12();
        let mut ct = vec![7u8; 64];
        let mut enc = GcmStream::new(&k, &iv).unwrap();
        enc.encrypt(&mut ct);
        let tag = enc.finalize();

        ct[10] ^= 0x01;
        let mut dec = GcmVerifier::new(&k, &iv).unwrap();
        dec.decrypt(&mut ct);
        assert!(dec.finalize(&tag).is_err());
    }

    #[test]
    fn clone_resumes_identically() {
        let k = key(32);
        let iv = iv12();
        let data: Vec<u8> = (0u8..=255).cycle().take(1000).collect();

        let mut a = GcmStream::new(&k, &iv).unwrap();
        let mut first = data[..400].to_vec();
        a.encrypt(&mut first);

        let mut b = a.clone();
        let mut rest_a = data[400..].to_vec();
        let mut rest_b = data[400..].to_vec();
        a.encrypt(&mut rest_a);
        b.encrypt(&mut rest_b);

        assert_eq!(rest_a, rest_b);
        assert_eq!(a.finalize(), b.finalize());
    }

    #[test]
    fn rejects_bad_iv() {
        assert!(GcmStream::new(&key(32), &[0u8; 16]).is_err());
    }
}
