//! Path-level HTTP operations
//!
//! Verb methods with the status-code contract: an explicit expectation
//! must match exactly, otherwise anything >= 400 fails. PUT optionally
//! wraps the entity in a digesting wrapper and compares the client MD5
//! against the server's `Computed-MD5` header.

use std::sync::Arc;

use reqwest::blocking::Response;
use reqwest::Method;

use manta_core::object::{HEADER_COMPUTED_MD5, HEADER_REQUEST_ID};
use manta_core::{
    ChecksumError, MantaHttpHeaders, MantaMetadata, MantaObject, MantaResult, ResponseError,
};

use crate::digest::DigestedEntity;
use crate::entity::Entity;
use crate::transport::ConnectionFactory;

/// How to judge a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedStatus {
    /// Fail on any status >= 400.
    Default,
    /// Fail unless the status matches exactly.
    Is(u16),
    /// Hand the response back regardless; the caller judges.
    Any,
}

/// A buffered response: status line, headers, body.
#[derive(Debug)]
pub struct MantaResponse {
    pub status: u16,
    pub reason: String,
    pub headers: MantaHttpHeaders,
    pub body: Vec<u8>,
}

impl MantaResponse {
    /// Truncated body for error annotations.
    pub fn body_snippet(&self) -> String {
        const LIMIT: usize = 1024;
        let text = String::from_utf8_lossy(&self.body);
        if text.len() > LIMIT {
            format!("{}…", &text[..LIMIT])
        } else {
            text.into_owned()
        }
    }
}

pub(crate) fn headers_from_response(response: &Response) -> MantaHttpHeaders {
    let mut headers = MantaHttpHeaders::new();
    for (name, value) in response.headers() {
        if let Ok(v) = value.to_str() {
            headers.set(name.as_str(), v);
        }
    }
    headers
}

pub struct HttpHelper {
    conn: Arc<ConnectionFactory>,
    verify_uploads: bool,
}

impl HttpHelper {
    pub fn new(conn: Arc<ConnectionFactory>, verify_uploads: bool) -> Self {
        Self {
            conn,
            verify_uploads,
        }
    }

    pub fn connection(&self) -> &Arc<ConnectionFactory> {
        &self.conn
    }

    /// Execute a request and buffer the response, applying the status
    /// policy.
    pub fn exchange(
        &self,
        method: Method,
        path: &str,
        headers: &MantaHttpHeaders,
        body: Option<&[u8]>,
        expected: ExpectedStatus,
    ) -> MantaResult<MantaResponse> {
        tracing::debug!(method = %method, path, "request");
        let response = self.conn.execute(method.clone(), path, headers, body)?;

        let status = response.status().as_u16();
        let reason = response
            .status()
            .canonical_reason()
            .unwrap_or("")
            .to_string();
        let response_headers = headers_from_response(&response);
        let body = response.bytes()?.to_vec();
        let buffered = MantaResponse {
            status,
            reason,
            headers: response_headers,
            body,
        };
        tracing::debug!(method = %method, path, status, "response");

        let failed = match expected {
            ExpectedStatus::Default => status >= 400,
            ExpectedStatus::Is(code) => status != code,
            ExpectedStatus::Any => false,
        };
        if failed {
            return Err(self.response_error(&method, path, &buffered).into());
        }
        Ok(buffered)
    }

    pub(crate) fn response_error(
        &self,
        method: &Method,
        path: &str,
        response: &MantaResponse,
    ) -> ResponseError {
        let mut err = ResponseError::new(response.status, response.reason.clone())
            .with("method", method)
            .with("path", path)
            .with("url", self.conn.url_for(path))
            .with_body(response.body_snippet());
        if let Some(id) = response.headers.get(HEADER_REQUEST_ID) {
            err = err.with_request_id(id);
        }
        err
    }

    pub fn head(&self, path: &str) -> MantaResult<MantaObject> {
        let response = self.exchange(
            Method::HEAD,
            path,
            &MantaHttpHeaders::new(),
            None,
            ExpectedStatus::Default,
        )?;
        Ok(MantaObject::with_headers(path, response.headers))
    }

    pub fn get(&self, path: &str) -> MantaResult<(MantaObject, Vec<u8>)> {
        let response = self.exchange(
            Method::GET,
            path,
            &MantaHttpHeaders::new(),
            None,
            ExpectedStatus::Default,
        )?;
        let object = MantaObject::with_headers(path, response.headers);
        Ok((object, response.body))
    }

    /// Ranged GET of `[start, end)`.
    pub fn get_range(&self, path: &str, start: u64, end: u64) -> MantaResult<(MantaObject, Vec<u8>)> {
        let mut headers = MantaHttpHeaders::new();
        headers.set("range", format!("bytes={}-{}", start, end.saturating_sub(1)));
        let response =
            self.exchange(Method::GET, path, &headers, None, ExpectedStatus::Is(206))?;
        let object = MantaObject::with_headers(path, response.headers);
        Ok((object, response.body))
    }

    pub fn delete(&self, path: &str) -> MantaResult<()> {
        self.exchange(
            Method::DELETE,
            path,
            &MantaHttpHeaders::new(),
            None,
            ExpectedStatus::Is(204),
        )?;
        Ok(())
    }

    pub fn post(
        &self,
        path: &str,
        headers: &MantaHttpHeaders,
        body: Option<&[u8]>,
        expected: ExpectedStatus,
    ) -> MantaResult<MantaResponse> {
        self.exchange(Method::POST, path, headers, body, expected)
    }

    /// PUT an entity, verifying the upload checksum when configured.
    pub fn put(
        &self,
        path: &str,
        headers: Option<MantaHttpHeaders>,
        entity: Option<Box<dyn Entity>>,
        metadata: Option<&MantaMetadata>,
    ) -> MantaResult<MantaObject> {
        let mut request_headers = headers.unwrap_or_default();
        if let Some(md) = metadata {
            request_headers.merge_metadata(md);
        }

        let (body, client_digest, entity_content_type) = match entity {
            Some(entity) if self.verify_uploads => {
                let mut digested = DigestedEntity::new(entity);
                let mut buf = Vec::with_capacity(
                    digested.content_length().unwrap_or(8 * 1024) as usize,
                );
                digested.write_to(&mut buf)?;
                let content_type = digested.content_type().to_string();
                (Some(buf), digested.digest(), Some(content_type))
            }
            Some(mut entity) => {
                let mut buf = Vec::with_capacity(
                    entity.content_length().unwrap_or(8 * 1024) as usize,
                );
                entity.write_to(&mut buf)?;
                let content_type = entity.content_type().to_string();
                (Some(buf), None, Some(content_type))
            }
            None => (None, None, None),
        };
        if request_headers.content_type().is_none() {
            if let Some(ct) = &entity_content_type {
                request_headers.set_content_type(ct.clone());
            }
        }

        let response = self.exchange(
            Method::PUT,
            path,
            &request_headers,
            body.as_deref(),
            ExpectedStatus::Is(204),
        )?;

        let mut result_headers = response.headers.clone();
        // carry the request metadata on the result so it is immediately
        // visible without a follow-up HEAD
        if let Some(md) = metadata {
            result_headers.merge_metadata(md);
        }
        if result_headers.content_type().is_none() {
            if let Some(ct) = entity_content_type {
                result_headers.set_content_type(ct);
            }
        }
        let object = MantaObject::with_headers(path, result_headers);

        if self.verify_uploads {
            self.validate_checksum(path, client_digest, &response)?;
        }
        Ok(object)
    }

    /// Compare the client digest with the server's `Computed-MD5`. A
    /// missing side skips verification with a warning.
    fn validate_checksum(
        &self,
        path: &str,
        client_digest: Option<[u8; 16]>,
        response: &MantaResponse,
    ) -> MantaResult<()> {
        let Some(client_md5) = client_digest else {
            return Ok(());
        };
        let Some(server_md5) = response.headers.computed_md5() else {
            tracing::warn!(path, "no cryptographic check performed by the server");
            return Ok(());
        };
        if server_md5 != client_md5 {
            let err = ChecksumError::new(hex::encode(client_md5), hex::encode(server_md5))
                .with("path", path)
                .with("header", HEADER_COMPUTED_MD5);
            return Err(err.into());
        }
        Ok(())
    }
}
