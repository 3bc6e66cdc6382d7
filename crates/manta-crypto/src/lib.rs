//! manta-crypto: client-side encryption for Manta objects
//!
//! Ciphertext layout (one object, possibly assembled from many parts):
//! ```text
//! [IV][ciphertext][trailer]
//! trailer = 16-byte GCM tag (AEAD) or HMAC over IV ‖ ciphertext (MtE)
//! ```
//!
//! One IV per object, one trailer per object. The cipher state is a plain
//! value: cloning it snapshots the keystream position, which is what lets
//! a multipart upload feed parts through the same stream one at a time.
//! CTR-mode objects additionally support random-access decryption of byte
//! ranges (unauthenticated by nature).

pub mod catalog;
pub mod context;
pub mod ctr_stream;
pub mod decrypt;
pub mod gcm;
pub mod hmac_stream;
pub mod key;

pub use catalog::{lookup, CipherDetails, CipherId};
pub use context::{EncryptionContext, FrozenContext};
pub use ctr_stream::CtrStream;
pub use decrypt::{decrypt_object, decrypt_range, AuthMode};
pub use gcm::{GcmStream, GcmVerifier};
pub use hmac_stream::{HmacKind, HmacStream};
pub use key::SecretKey;

/// AES block size in bytes; the part-alignment unit for multipart CSE.
pub const AES_BLOCK_SIZE: usize = 16;

/// GCM authentication tag size in bytes.
pub const GCM_TAG_SIZE: usize = 16;
