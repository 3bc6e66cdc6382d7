//! Server-side multipart upload protocol
//!
//! A large object is assembled by the store from parts uploaded
//! independently. Lifecycle: `CREATED → FINALIZING(COMMIT|ABORT) →
//! {COMPLETED, ABORTED}`. Part numbers are 1-based and contiguous; every
//! part except possibly the last must be at least [`MIN_PART_SIZE`].

pub mod encrypted;
pub mod output;
pub mod server;

use uuid::Uuid;

/// Maximum number of parts in one upload.
pub const MAX_PARTS: u32 = 10_000;

/// Minimum part size in bytes (5 MiB).
pub const MIN_PART_SIZE: u64 = 5_242_880;

/// An in-progress server-side multipart upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSideMultipartUpload {
    /// Server-assigned upload identifier.
    pub id: Uuid,
    /// Target object path; unknown when recovered from a listing.
    pub path: Option<String>,
    /// Server-managed directory collecting this upload's parts.
    pub parts_directory: String,
}

/// A part accepted by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MultipartUploadPart {
    pub part_number: u32,
    pub object_path: Option<String>,
    pub etag: String,
}

/// The (part number, etag) pair consumed by commit. Ordered by part
/// number.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct MultipartUploadTuple {
    pub part_number: u32,
    pub etag: String,
}

impl From<MultipartUploadPart> for MultipartUploadTuple {
    fn from(part: MultipartUploadPart) -> Self {
        Self {
            part_number: part.part_number,
            etag: part.etag,
        }
    }
}

/// Observed state of an upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartStatus {
    Created,
    Committing,
    Aborting,
    Completed,
    Aborted,
    /// The server's response could not be classified.
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tuples_order_by_part_number() {
        let mut tuples = vec![
            MultipartUploadTuple {
                part_number: 3,
                etag: "c".into(),
            },
            MultipartUploadTuple {
                part_number: 1,
                etag: "a".into(),
            },
            MultipartUploadTuple {
                part_number: 2,
                etag: "b".into(),
            },
        ];
        tuples.sort();
        let numbers: Vec<u32> = tuples.iter().map(|t| t.part_number).collect();
        assert_eq!(numbers, [1, 2, 3]);
    }
}
