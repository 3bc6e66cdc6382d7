//! manta-client: a client for the Manta HTTP object store
//!
//! Every outbound request is signed with the account's private key
//! (HTTP Signatures), transient transport failures are retried with
//! re-signing, large objects are assembled server-side from multipart
//! parts, and the optional client-side encryption layer produces
//! ciphertext that supports ranged decryption — including for objects
//! uploaded in parts.
//!
//! ```no_run
//! use manta_client::MantaClient;
//! use manta_core::{MantaConfig, ObjectDataSource};
//!
//! let config = MantaConfig {
//!     url: "https://us-central.manta.example.com".into(),
//!     user: "alice".into(),
//!     key_path: Some("/home/alice/.ssh/id_rsa".into()),
//!     key_id: "ab:cd:ef:01:23:45:67:89:ab:cd:ef:01:23:45:67:89".into(),
//!     ..Default::default()
//! };
//! let client = MantaClient::new(config)?;
//! client.put(
//!     "/alice/stor/hello.txt",
//!     ObjectDataSource::Text("hello manta".into()),
//!     None,
//!     None,
//! )?;
//! # Ok::<(), manta_core::MantaError>(())
//! ```

pub mod client;
pub mod digest;
pub mod encryption;
pub mod entity;
pub mod helper;
pub mod multipart;
pub mod seekable;
pub mod signer;
pub mod transport;

mod retry;

pub use client::MantaClient;
pub use digest::DigestedEntity;
pub use encryption::{EncryptingEntity, EncryptionLayer};
pub use entity::{ByteArrayEntity, EmptyEntity, Entity, FileEntity, StreamEntity, StringEntity};
pub use helper::{ExpectedStatus, HttpHelper, MantaResponse};
pub use multipart::encrypted::{
    EncryptedMultipartUpload, EncryptedServerSideMultipartManager, EncryptionState,
};
pub use multipart::output::MultipartOutputStream;
pub use multipart::server::ServerSideMultipartManager;
pub use multipart::{
    MultipartStatus, MultipartUploadPart, MultipartUploadTuple, ServerSideMultipartUpload,
    MAX_PARTS, MIN_PART_SIZE,
};
pub use seekable::MantaSeekableReader;
pub use signer::{HttpSigner, SignedHeaders};
pub use transport::ConnectionFactory;
