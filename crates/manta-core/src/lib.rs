//! manta-core: shared types for the Manta object-store client
//!
//! Holds everything the higher layers agree on: the error taxonomy,
//! client configuration, the object/metadata/header model, and path
//! encoding for the hierarchical namespace.

pub mod config;
pub mod error;
pub mod object;
pub mod path;

pub use config::{EncryptionAuthMode, EncryptionConfig, MantaConfig};
pub use error::{
    ChecksumError, ErrorContext, MantaError, MantaResult, MultipartError, MultipartErrorKind,
    ResponseError,
};
pub use object::{
    MantaDirectoryEntry, MantaHttpHeaders, MantaMetadata, MantaObject, ObjectDataSource,
};
pub use path::{decode_path, format_path, SEPARATOR};
