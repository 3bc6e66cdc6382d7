//! AES-CTR keystream with a 128-bit big-endian counter
//!
//! Ciphertext is byte-for-byte positional with plaintext, so the stream is
//! seekable: `seek(n)` repositions the keystream to plaintext offset `n`,
//! which is how ranged reads and part resumption work. Cloning the stream
//! snapshots the keystream position.

use aes::{Aes128, Aes192, Aes256};
use cipher::{KeyIvInit, StreamCipher, StreamCipherSeek};
use ctr::Ctr128BE;

/// Key-size-dispatched AES-CTR stream.
#[derive(Clone)]
pub enum CtrStream {
    Aes128(Ctr128BE<Aes128>),
    Aes192(Ctr128BE<Aes192>),
    Aes256(Ctr128BE<Aes256>),
}

impl CtrStream {
    /// Build a stream from a raw key (16/24/32 bytes) and a 16-byte IV.
    pub fn new(key: &[u8], iv: &[u8]) -> anyhow::Result<Self> {
        if iv.len() != 16 {
            anyhow::bail!("CTR IV must be 16 bytes, got {}", iv.len());
        }
        let stream = match key.len() {
            16 => CtrStream::Aes128(
                Ctr128BE::<Aes128>::new_from_slices(key, iv)
                    .map_err(|e| anyhow::anyhow!("CTR init: {e}"))?,
            ),
            24 => CtrStream::Aes192(
                Ctr128BE::<Aes192>::new_from_slices(key, iv)
                    .map_err(|e| anyhow::anyhow!("CTR init: {e}"))?,
            ),
            32 => CtrStream::Aes256(
                Ctr128BE::<Aes256>::new_from_slices(key, iv)
                    .map_err(|e| anyhow::anyhow!("CTR init: {e}"))?,
            ),
            n => anyhow::bail!("unsupported AES key length: {n}"),
        };
        Ok(stream)
    }

    /// XOR the keystream over `buf` in place, advancing the position.
    pub fn apply(&mut self, buf: &mut [u8]) {
        match self {
            CtrStream::Aes128(c) => c.apply_keystream(buf),
            CtrStream::Aes192(c) => c.apply_keystream(buf),
            CtrStream::Aes256(c) => c.apply_keystream(buf),
        }
    }

    /// Reposition the keystream to an absolute plaintext byte offset.
    pub fn seek(&mut self, pos: u64) {
        match self {
            CtrStream::Aes128(c) => c.seek(pos),
            CtrStream::Aes192(c) => c.seek(pos),
            CtrStream::Aes256(c) => c.seek(pos),
        }
    }

    /// Current absolute keystream position in bytes.
    pub fn position(&self) -> u64 {
        match self {
            CtrStream::Aes128(c) => c.current_pos(),
            CtrStream::Aes192(c) => c.current_pos(),
            CtrStream::Aes256(c) => c.current_pos(),
        }
    }
}
