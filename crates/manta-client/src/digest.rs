//! MD5-digesting entity wrapper
//!
//! Streams the wrapped entity through a running MD5 and a byte counter.
//! The digest and count are valid only after a successful `write_to`; the
//! HTTP helper compares the digest against the server's `Computed-MD5`.

use std::io::{self, Write};

use md5::{Digest, Md5};

use crate::entity::Entity;

pub struct DigestedEntity {
    inner: Box<dyn Entity>,
    digest: Option<[u8; 16]>,
    byte_count: u64,
}

impl DigestedEntity {
    pub fn new(inner: Box<dyn Entity>) -> Self {
        Self {
            inner,
            digest: None,
            byte_count: 0,
        }
    }

    /// MD5 of everything streamed by the last `write_to`.
    pub fn digest(&self) -> Option<[u8; 16]> {
        self.digest
    }

    /// Bytes streamed by the last `write_to`.
    pub fn byte_count(&self) -> u64 {
        self.byte_count
    }
}

struct DigestingWriter<'a> {
    out: &'a mut dyn Write,
    hasher: Md5,
    count: u64,
}

impl Write for DigestingWriter<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.out.write(buf)?;
        self.hasher.update(&buf[..n]);
        self.count += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.out.flush()
    }
}

impl Entity for DigestedEntity {
    fn write_to(&mut self, out: &mut dyn Write) -> io::Result<()> {
        self.digest = None;
        self.byte_count = 0;

        let mut writer = DigestingWriter {
            out,
            hasher: Md5::new(),
            count: 0,
        };
        self.inner.write_to(&mut writer)?;

        self.digest = Some(writer.hasher.finalize().into());
        self.byte_count = writer.count;
        Ok(())
    }

    fn content_length(&self) -> Option<u64> {
        self.inner.content_length()
    }

    fn content_type(&self) -> &str {
        self.inner.content_type()
    }

    fn is_repeatable(&self) -> bool {
        self.inner.is_repeatable()
    }
}
