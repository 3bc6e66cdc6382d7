//! Upload entities
//!
//! An entity is a request body that knows how to stream itself into a
//! sink, plus the content metadata the HTTP layer needs. Sized sources
//! (bytes, strings, files) are repeatable; a raw reader is not, and must
//! not be driven twice.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use manta_core::ObjectDataSource;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// A streamable request body.
pub trait Entity: Send {
    /// Stream the full body into `out`.
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()>;

    /// Declared body length, when known up front.
    fn content_length(&self) -> Option<u64>;

    fn content_type(&self) -> &str {
        OCTET_STREAM
    }

    /// Whether `write_to` may be called more than once.
    fn is_repeatable(&self) -> bool;
}

/// Entity over an owned byte buffer.
pub struct ByteArrayEntity {
    bytes: Vec<u8>,
    content_type: String,
}

impl ByteArrayEntity {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            content_type: OCTET_STREAM.to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl Entity for ByteArrayEntity {
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        out.write_all(&self.bytes)
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn is_repeatable(&self) -> bool {
        true
    }
}

/// Entity over a UTF-8 string.
pub struct StringEntity {
    inner: ByteArrayEntity,
}

impl StringEntity {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            inner: ByteArrayEntity::new(text.into().into_bytes())
                .with_content_type("text/plain; charset=utf-8"),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.inner = self.inner.with_content_type(content_type);
        self
    }
}

impl Entity for StringEntity {
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.inner.write_to(out)
    }

    fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    fn is_repeatable(&self) -> bool {
        true
    }
}

/// Entity streaming a file from disk. The length is captured at
/// construction time.
pub struct FileEntity {
    path: PathBuf,
    len: u64,
    content_type: String,
}

impl FileEntity {
    pub fn new(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let len = std::fs::metadata(&path)?.len();
        Ok(Self {
            path,
            len,
            content_type: OCTET_STREAM.to_string(),
        })
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Entity for FileEntity {
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        let mut file = File::open(&self.path)?;
        io::copy(&mut file, out)?;
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        Some(self.len)
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn is_repeatable(&self) -> bool {
        true
    }
}

/// Entity over an arbitrary reader. Not repeatable; the declared length,
/// when given, is validated downstream by the consumers that care.
pub struct StreamEntity {
    reader: Box<dyn Read + Send>,
    declared_len: Option<u64>,
    consumed: bool,
}

impl StreamEntity {
    pub fn new(reader: Box<dyn Read + Send>) -> Self {
        Self {
            reader,
            declared_len: None,
            consumed: false,
        }
    }

    pub fn with_length(mut self, len: u64) -> Self {
        self.declared_len = Some(len);
        self
    }
}

impl Entity for StreamEntity {
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        if self.consumed {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "stream entity is not repeatable",
            ));
        }
        self.consumed = true;
        io::copy(&mut self.reader, out)?;
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        self.declared_len
    }

    fn is_repeatable(&self) -> bool {
        false
    }
}

/// Zero-length entity for bodyless PUTs (directories, snaplinks).
pub struct EmptyEntity {
    content_type: String,
}

impl EmptyEntity {
    pub fn new() -> Self {
        Self {
            content_type: OCTET_STREAM.to_string(),
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

impl Default for EmptyEntity {
    fn default() -> Self {
        Self::new()
    }
}

impl Entity for EmptyEntity {
    fn write_to(&mut self, _out: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        Some(0)
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn is_repeatable(&self) -> bool {
        true
    }
}

/// Map a PUT data source onto its entity type.
pub fn entity_for(source: ObjectDataSource) -> io::Result<Box<dyn Entity>> {
    Ok(match source {
        ObjectDataSource::Bytes(bytes) => Box::new(ByteArrayEntity::new(bytes)),
        ObjectDataSource::Text(text) => Box::new(StringEntity::new(text)),
        ObjectDataSource::File(path) => Box::new(FileEntity::new(path)?),
        ObjectDataSource::Reader(reader) => Box::new(StreamEntity::new(reader)),
    })
}
