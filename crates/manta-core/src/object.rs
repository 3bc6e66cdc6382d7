//! Object, header and metadata model
//!
//! A Manta object is a virtual file addressed by an absolute path. The
//! server describes it entirely through HTTP headers; user metadata rides
//! along as `m-` prefixed headers.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{MantaError, MantaResult};

/// Content type the server uses to denote directories.
pub const DIRECTORY_CONTENT_TYPE: &str = "application/json; type=directory";

/// Content type used when creating a snaplink.
pub const LINK_CONTENT_TYPE: &str = "application/json; type=link";

/// Reserved prefix for user metadata headers.
pub const METADATA_PREFIX: &str = "m-";

/// Reserved prefix for encrypted user metadata (unsupported, rejected).
pub const ENCRYPTED_METADATA_PREFIX: &str = "e-";

/// Metadata recorded by the client-side encryption layer.
pub const ENCRYPT_KEY_ID: &str = "m-encrypt-key-id";
pub const ENCRYPT_CIPHER: &str = "m-encrypt-cipher";
pub const ENCRYPT_IV: &str = "m-encrypt-iv";
pub const ENCRYPT_PLAINTEXT_CONTENT_LENGTH: &str = "m-encrypt-plaintext-content-length";
pub const ENCRYPT_AEAD_TAG_LENGTH: &str = "m-encrypt-aead-tag-length";
pub const ENCRYPT_HMAC: &str = "m-encrypt-hmac";

/// Header carrying the server-computed MD5 of an uploaded entity.
pub const HEADER_COMPUTED_MD5: &str = "computed-md5";

/// Header carrying the server-assigned request identifier.
pub const HEADER_REQUEST_ID: &str = "x-request-id";

/// Case-insensitive HTTP header map with typed accessors.
///
/// Header names are normalized to lowercase on insertion.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MantaHttpHeaders {
    map: BTreeMap<String, String>,
}

impl MantaHttpHeaders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let mut headers = Self::new();
        for (k, v) in pairs {
            headers.set(k, v);
        }
        headers
    }

    pub fn set(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
        self.map
            .insert(name.as_ref().to_ascii_lowercase(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn remove(&mut self, name: &str) -> Option<String> {
        self.map.remove(&name.to_ascii_lowercase())
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn content_type(&self) -> Option<&str> {
        self.get("content-type")
    }

    pub fn set_content_type(&mut self, value: impl Into<String>) {
        self.set("content-type", value);
    }

    pub fn content_length(&self) -> Option<u64> {
        self.get("content-length").and_then(|v| v.parse().ok())
    }

    pub fn set_content_length(&mut self, value: u64) {
        self.set("content-length", value.to_string());
    }

    pub fn etag(&self) -> Option<&str> {
        self.get("etag")
    }

    pub fn location(&self) -> Option<&str> {
        self.get("location")
    }

    pub fn request_id(&self) -> Option<&str> {
        self.get(HEADER_REQUEST_ID)
    }

    /// Server-computed MD5, decoded from its base64 header form.
    pub fn computed_md5(&self) -> Option<Vec<u8>> {
        self.get(HEADER_COMPUTED_MD5)
            .and_then(|v| BASE64.decode(v).ok())
    }

    /// Copy all user metadata pairs into this header map.
    pub fn merge_metadata(&mut self, metadata: &MantaMetadata) {
        for (k, v) in metadata.iter() {
            self.set(k, v);
        }
    }

    /// Extract the user metadata pairs carried in these headers.
    pub fn metadata(&self) -> MantaMetadata {
        let mut md = MantaMetadata::new();
        for (k, v) in self.iter() {
            if k.starts_with(METADATA_PREFIX) {
                // keys coming off the wire already passed the server
                let _ = md.put(k, v);
            }
        }
        md
    }
}

/// User metadata: `m-` prefixed, case-insensitive keys.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MantaMetadata {
    map: BTreeMap<String, String>,
}

impl MantaMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a metadata pair. Keys must start with `m-`; the `e-`
    /// (encrypted metadata) prefix is reserved and rejected.
    pub fn put(&mut self, key: impl AsRef<str>, value: impl Into<String>) -> MantaResult<()> {
        let key = key.as_ref().to_ascii_lowercase();
        if key.starts_with(ENCRYPTED_METADATA_PREFIX) {
            return Err(MantaError::Config(format!(
                "encrypted metadata is not supported: {key}"
            )));
        }
        if !key.starts_with(METADATA_PREFIX) {
            return Err(MantaError::Config(format!(
                "metadata keys must start with {METADATA_PREFIX}: {key}"
            )));
        }
        self.map.insert(key, value.into());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(&key.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.map
    }
}

/// A Manta object reference: absolute path plus the headers and metadata
/// describing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MantaObject {
    path: String,
    headers: MantaHttpHeaders,
    metadata: MantaMetadata,
}

impl MantaObject {
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            headers: MantaHttpHeaders::new(),
            metadata: MantaMetadata::new(),
        }
    }

    pub fn with_headers(path: impl Into<String>, headers: MantaHttpHeaders) -> Self {
        let metadata = headers.metadata();
        Self {
            path: path.into(),
            headers,
            metadata,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn headers(&self) -> &MantaHttpHeaders {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut MantaHttpHeaders {
        &mut self.headers
    }

    pub fn metadata(&self) -> &MantaMetadata {
        &self.metadata
    }

    pub fn set_metadata(&mut self, metadata: MantaMetadata) {
        self.metadata = metadata;
    }

    pub fn content_type(&self) -> Option<&str> {
        self.headers.content_type()
    }

    pub fn content_length(&self) -> Option<u64> {
        self.headers.content_length()
    }

    pub fn etag(&self) -> Option<&str> {
        self.headers.etag()
    }

    /// MD5 of the object's content as raw bytes, when the server sent one.
    pub fn md5_bytes(&self) -> Option<Vec<u8>> {
        self.headers.computed_md5()
    }

    /// Whether the object is a directory per the content-type sentinel.
    pub fn is_directory(&self) -> bool {
        self.content_type()
            .map(|ct| ct == DIRECTORY_CONTENT_TYPE)
            .unwrap_or(false)
    }
}

/// Data supplied to a PUT. Exactly one source per request.
pub enum ObjectDataSource {
    Bytes(Vec<u8>),
    Text(String),
    File(PathBuf),
    Reader(Box<dyn Read + Send>),
}

impl fmt::Debug for ObjectDataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ObjectDataSource::Bytes(b) => f.debug_tuple("Bytes").field(&b.len()).finish(),
            ObjectDataSource::Text(s) => f.debug_tuple("Text").field(&s.len()).finish(),
            ObjectDataSource::File(p) => f.debug_tuple("File").field(p).finish(),
            ObjectDataSource::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// One line of a newline-delimited directory listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MantaDirectoryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub durability: Option<u32>,
    /// Absolute path, joined by the client after parsing.
    #[serde(skip)]
    pub path: String,
}

impl MantaDirectoryEntry {
    pub fn is_directory(&self) -> bool {
        self.kind == "directory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_case_insensitive() {
        let mut h = MantaHttpHeaders::new();
        h.set("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
        h.set("CONTENT-TYPE", "application/json");
        assert_eq!(h.content_type(), Some("application/json"));
    }

    #[test]
    fn computed_md5_decodes_base64() {
        let mut h = MantaHttpHeaders::new();
        h.set(HEADER_COMPUTED_MD5, BASE64.encode([0xde, 0xad, 0xbe, 0xef]));
        assert_eq!(h.computed_md5().unwrap(), vec![0xde, 0xad, 0xbe, 0xef]);
    }

    #[test]
    fn metadata_enforces_prefix() {
        let mut md = MantaMetadata::new();
        md.put("m-favorite", "blue").unwrap();
        assert!(md.put("favorite", "blue").is_err());
        assert!(md.put("e-secret", "x").is_err());
        assert_eq!(md.get("M-FAVORITE"), Some("blue"));
    }

    #[test]
    fn headers_roundtrip_metadata() {
        let mut md = MantaMetadata::new();
        md.put("m-alpha", "1").unwrap();
        md.put("m-beta", "2").unwrap();

        let mut h = MantaHttpHeaders::new();
        h.set("content-type", "text/plain");
        h.merge_metadata(&md);

        let extracted = h.metadata();
        assert_eq!(extracted, md);
    }

    #[test]
    fn directory_sentinel() {
        let mut h = MantaHttpHeaders::new();
        h.set_content_type(DIRECTORY_CONTENT_TYPE);
        let obj = MantaObject::with_headers("/u/stor/dir", h);
        assert!(obj.is_directory());
    }

    #[test]
    fn listing_line_parses() {
        let line = r#"{"name":"photo.jpg","type":"object","etag":"abc","mtime":"2015-04-16T19:40:23.123Z","size":42,"durability":2}"#;
        let entry: MantaDirectoryEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.name, "photo.jpg");
        assert!(!entry.is_directory());
        assert_eq!(entry.size, Some(42));
    }
}
