//! Secret key handling

use std::path::Path;

use anyhow::Context;
use zeroize::Zeroize;

use crate::catalog::CipherDetails;

/// A raw symmetric secret key. Zeroized on drop.
#[derive(Clone)]
pub struct SecretKey {
    bytes: Vec<u8>,
}

impl SecretKey {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self { bytes }
    }

    /// Load raw key bytes from a file.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("reading secret key from {}", path.display()))?;
        Ok(Self { bytes })
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Check the key length against a cipher's requirement.
    pub fn validate_for(&self, details: &CipherDetails) -> anyhow::Result<()> {
        if self.bytes.len() != details.key_len {
            anyhow::bail!(
                "secret key is {} bytes but {} requires {}",
                self.bytes.len(),
                details.id,
                details.key_len
            );
        }
        Ok(())
    }
}

impl Drop for SecretKey {
    fn drop(&mut self) {
        self.bytes.zeroize();
    }
}

impl std::fmt::Debug for SecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretKey").field("bytes", &"?").finish()
    }
}
