//! Error taxonomy for the Manta client
//!
//! Errors are plain values. Context is attached with the non-destructive
//! `with()` builders and travels inside the error rather than in a shared
//! mutable annotation object.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

pub type MantaResult<T> = Result<T, MantaError>;

/// Ordered key/value annotations attached to an error value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    entries: BTreeMap<String, String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an annotation, consuming and returning the context.
    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.entries.insert(key.into(), value.to_string());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.entries.is_empty() {
            return Ok(());
        }
        write!(f, " [")?;
        for (i, (k, v)) in self.entries.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{k}={v}")?;
        }
        write!(f, "]")
    }
}

#[derive(Debug, Error)]
pub enum MantaError {
    #[error("config error: {0}")]
    Config(String),

    #[error("crypto error: {0}")]
    Crypto(String),

    #[error(transparent)]
    Response(#[from] ResponseError),

    #[error(transparent)]
    Checksum(#[from] ChecksumError),

    #[error(transparent)]
    Multipart(#[from] MultipartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Non-success HTTP status returned by the server.
#[derive(Debug, Error)]
#[error("HTTP {status} {reason}{context}")]
pub struct ResponseError {
    pub status: u16,
    pub reason: String,
    /// Server-assigned request identifier, when present.
    pub request_id: Option<String>,
    /// Truncated response body.
    pub body: Option<String>,
    pub context: ErrorContext,
}

impl ResponseError {
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        Self {
            status,
            reason: reason.into(),
            request_id: None,
            body: None,
            context: ErrorContext::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context = self.context.with(key, value);
        self
    }

    pub fn with_request_id(mut self, id: impl Into<String>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

/// Client-computed and server-computed MD5 digests disagree.
#[derive(Debug, Error)]
#[error("checksum mismatch: client MD5 {client_md5} != server MD5 {server_md5}{context}")]
pub struct ChecksumError {
    pub client_md5: String,
    pub server_md5: String,
    pub context: ErrorContext,
}

impl ChecksumError {
    pub fn new(client_md5: impl Into<String>, server_md5: impl Into<String>) -> Self {
        Self {
            client_md5: client_md5.into(),
            server_md5: server_md5.into(),
            context: ErrorContext::new(),
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context = self.context.with(key, value);
        self
    }
}

/// Classification of a multipart protocol failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MultipartErrorKind {
    /// Response body could not be parsed as JSON.
    JsonParse,
    /// Expected response field or header was missing or malformed.
    MissingField,
    /// Response status did not match the protocol contract.
    UnexpectedStatus,
    /// Client-side validation failure (part numbers, sizes, ordering).
    Validation,
}

impl fmt::Display for MultipartErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MultipartErrorKind::JsonParse => "json-parse",
            MultipartErrorKind::MissingField => "missing-field",
            MultipartErrorKind::UnexpectedStatus => "unexpected-status",
            MultipartErrorKind::Validation => "validation",
        };
        f.write_str(s)
    }
}

/// Multipart upload protocol violation.
#[derive(Debug, Error)]
#[error("multipart error ({kind}): {message}{context}")]
pub struct MultipartError {
    pub message: String,
    pub kind: MultipartErrorKind,
    pub context: ErrorContext,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

impl MultipartError {
    pub fn new(kind: MultipartErrorKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            context: ErrorContext::new(),
            source: None,
        }
    }

    pub fn with(mut self, key: impl Into<String>, value: impl fmt::Display) -> Self {
        self.context = self.context.with(key, value);
        self
    }

    pub fn with_source(
        mut self,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_display_is_ordered() {
        let ctx = ErrorContext::new()
            .with("zebra", "z")
            .with("alpha", "a")
            .with("mid", 42);
        assert_eq!(ctx.to_string(), " [alpha=a, mid=42, zebra=z]");
    }

    #[test]
    fn response_error_carries_annotations() {
        let err = ResponseError::new(503, "Service Unavailable")
            .with_request_id("req-123")
            .with("method", "GET")
            .with("path", "/user/stor/x");
        assert_eq!(err.status, 503);
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
        assert_eq!(err.context.get("method"), Some("GET"));
        let rendered = err.to_string();
        assert!(rendered.contains("503"));
        assert!(rendered.contains("path=/user/stor/x"));
    }

    #[test]
    fn checksum_error_reports_both_digests() {
        let err = ChecksumError::new("00ff", "deadbeef");
        let rendered = err.to_string();
        assert!(rendered.contains("00ff"));
        assert!(rendered.contains("deadbeef"));
    }

    #[test]
    fn multipart_error_construction_is_non_destructive() {
        let base = MultipartError::new(MultipartErrorKind::Validation, "gap in part numbers");
        let annotated = base.with("uploadId", "abc").with("missing", 3);
        assert_eq!(annotated.kind, MultipartErrorKind::Validation);
        assert_eq!(annotated.context.get("missing"), Some("3"));
    }
}
