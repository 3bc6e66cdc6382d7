//! Read-only seekable byte source over HTTP range requests
//!
//! The connection is opened lazily: the first `read` or `size` issues a
//! `GET` with `Range: bytes=<pos>-`. Seeking to a different position
//! drops the open response and reconnects on the next read;
//! `position_at` instead returns a brand-new reader and leaves this one
//! untouched. The lazy connect is a plain `Option` behind `&mut self` —
//! exactly one writer, no double connect.

use std::io::{self, Read, Seek, SeekFrom};
use std::sync::Arc;

use reqwest::blocking::Response;
use reqwest::Method;

use manta_core::object::DIRECTORY_CONTENT_TYPE;
use manta_core::{MantaError, MantaHttpHeaders, MantaResult, ResponseError};

use crate::helper::headers_from_response;
use crate::transport::ConnectionFactory;

struct OpenState {
    response: Response,
    /// Total object size, when the server disclosed it.
    total_size: Option<u64>,
}

pub struct MantaSeekableReader {
    conn: Arc<ConnectionFactory>,
    path: String,
    position: u64,
    open: Option<OpenState>,
    closed: bool,
}

impl MantaSeekableReader {
    pub fn new(conn: Arc<ConnectionFactory>, path: impl Into<String>) -> Self {
        Self::at_position(conn, path, 0)
    }

    pub fn at_position(
        conn: Arc<ConnectionFactory>,
        path: impl Into<String>,
        position: u64,
    ) -> Self {
        Self {
            conn,
            path: path.into(),
            position,
            open: None,
            closed: false,
        }
    }

    /// Current absolute position in bytes.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// A fresh reader over the same object starting at `position`. This
    /// reader keeps its own open response and stays usable.
    pub fn position_at(&self, position: u64) -> MantaSeekableReader {
        MantaSeekableReader::at_position(Arc::clone(&self.conn), self.path.clone(), position)
    }

    /// Total object size. Connects if necessary; fails when the server
    /// does not disclose a length.
    pub fn size(&mut self) -> MantaResult<u64> {
        self.ensure_open()?;
        self.open
            .as_ref()
            .and_then(|s| s.total_size)
            .ok_or_else(|| {
                MantaError::Other(anyhow::anyhow!(
                    "object {} has no known size; cannot seek over it",
                    self.path
                ))
            })
    }

    /// Release the open response. Further reads fail.
    pub fn close(&mut self) {
        self.open = None;
        self.closed = true;
    }

    pub fn is_open(&self) -> bool {
        !self.closed
    }

    fn ensure_open(&mut self) -> MantaResult<()> {
        if self.closed {
            return Err(MantaError::Io(closed_error()));
        }
        if self.open.is_some() {
            return Ok(());
        }

        let mut headers = MantaHttpHeaders::new();
        headers.set("range", format!("bytes={}-", self.position));
        let response = self
            .conn
            .execute(Method::GET, &self.path, &headers, None)?;

        let status = response.status().as_u16();
        if status >= 400 {
            let buffered = headers_from_response(&response);
            let mut err = ResponseError::new(
                status,
                response.status().canonical_reason().unwrap_or(""),
            )
            .with("path", self.path.clone())
            .with("position", self.position);
            if let Some(id) = buffered.request_id() {
                err = err.with_request_id(id);
            }
            return Err(err.into());
        }

        let response_headers = headers_from_response(&response);
        if response_headers.content_type() == Some(DIRECTORY_CONTENT_TYPE) {
            return Err(MantaError::Other(anyhow::anyhow!(
                "cannot read directory {} as a byte stream",
                self.path
            )));
        }

        let total_size = total_size_of(&response_headers, self.position);
        self.open = Some(OpenState {
            response,
            total_size,
        });
        Ok(())
    }
}

/// Recover the total object size from a ranged response: prefer the
/// `Content-Range` total, fall back to the remaining length plus the
/// position the request started at.
fn total_size_of(headers: &MantaHttpHeaders, open_position: u64) -> Option<u64> {
    if let Some(range) = headers.get("content-range") {
        // "bytes <start>-<end>/<total>"
        if let Some(total) = range.rsplit('/').next() {
            if let Ok(total) = total.parse::<u64>() {
                return Some(total);
            }
        }
    }
    headers.content_length().map(|len| len + open_position)
}

fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "seekable reader is closed")
}

impl Read for MantaSeekableReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.ensure_open()
            .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
        let state = self.open.as_mut().expect("opened above");
        let n = state.response.read(buf)?;
        self.position += n as u64;
        Ok(n)
    }
}

impl Seek for MantaSeekableReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        if self.closed {
            return Err(closed_error());
        }
        let new_position = match pos {
            SeekFrom::Start(n) => n,
            SeekFrom::Current(delta) => offset_position(self.position, delta)?,
            SeekFrom::End(delta) => {
                let size = self
                    .size()
                    .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
                offset_position(size, delta)?
            }
        };
        if new_position != self.position {
            // drop the open response; the next read reconnects at the new
            // offset
            self.open = None;
            self.position = new_position;
        }
        Ok(self.position)
    }
}

fn offset_position(base: u64, delta: i64) -> io::Result<u64> {
    let result = if delta.is_negative() {
        base.checked_sub(delta.unsigned_abs())
    } else {
        base.checked_add(delta as u64)
    };
    result.ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            "seek would move before the start of the object",
        )
    })
}
