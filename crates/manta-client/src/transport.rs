//! Connection pool, request construction and bounded retry
//!
//! One configured blocking client backs the whole `MantaClient`: pooled
//! connections capped at the configured maximum, TCP_NODELAY, rustls, and
//! a DNS resolver that rotates the resolved address list to spread load
//! across endpoints. Idempotent requests are retried on transient
//! transport failures; every attempt is rebuilt and re-signed, so the
//! `Date` header is always current.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use reqwest::blocking::{Client, Response};
use reqwest::dns::{Addrs, Name, Resolve, Resolving};
use reqwest::Method;
use thiserror::Error;
use url::Url;

use manta_core::{format_path, MantaConfig, MantaError, MantaHttpHeaders, MantaResult};

use crate::retry;
use crate::signer::HttpSigner;

/// DNS failure marker so the retry classifier can spot unknown hosts in a
/// transport error's source chain.
#[derive(Debug, Error)]
#[error("failed to resolve host {host}: {source}")]
pub(crate) struct DnsFailure {
    pub host: String,
    #[source]
    pub source: io::Error,
}

/// Resolves via the system resolver, then rotates the address list by a
/// random amount.
#[derive(Debug, Default)]
struct ShufflingResolver;

impl Resolve for ShufflingResolver {
    fn resolve(&self, name: Name) -> Resolving {
        let host = name.as_str().to_string();
        let result: Result<Vec<SocketAddr>, DnsFailure> = (host.as_str(), 0u16)
            .to_socket_addrs()
            .map(Iterator::collect)
            .map_err(|source| DnsFailure {
                host: host.clone(),
                source,
            });
        Box::pin(async move {
            match result {
                Ok(mut addrs) => {
                    if addrs.len() > 1 {
                        let n = rand::thread_rng().gen_range(0..addrs.len());
                        addrs.rotate_left(n);
                    }
                    Ok(Box::new(addrs.into_iter()) as Addrs)
                }
                Err(e) => Err(Box::new(e) as Box<dyn std::error::Error + Send + Sync>),
            }
        })
    }
}

/// Builds and executes signed requests over a shared connection pool.
pub struct ConnectionFactory {
    client: Client,
    base_url: String,
    host: String,
    signer: Arc<HttpSigner>,
    retries: u32,
}

impl ConnectionFactory {
    pub fn new(config: &MantaConfig, signer: Arc<HttpSigner>) -> MantaResult<Self> {
        let base = Url::parse(config.base_url())
            .map_err(|e| MantaError::Config(format!("invalid url {}: {e}", config.url)))?;
        let host = base
            .host_str()
            .ok_or_else(|| MantaError::Config(format!("url has no host: {}", config.url)))?
            .to_string();
        let host = match base.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        };
        if base.scheme() == "http" {
            tracing::warn!(
                url = %config.url,
                "endpoint uses plaintext HTTP; signed requests and object data are unencrypted in transit"
            );
        }

        let timeout = Duration::from_millis(config.timeout_ms);
        let client = Client::builder()
            .use_rustls_tls()
            .timeout(timeout)
            .connect_timeout(timeout)
            .pool_max_idle_per_host(config.max_connections)
            .tcp_nodelay(true)
            .dns_resolver(Arc::new(ShufflingResolver))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url().trim_end_matches('/').to_string(),
            host,
            signer,
            retries: config.retries,
        })
    }

    /// The `Host` value requests are signed against.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Absolute URL for a raw (not yet encoded) object path.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, format_path(path))
    }

    /// Execute one signed request, retrying idempotent methods on
    /// transient transport failures. Returns the raw response; status
    /// policy belongs to the caller.
    pub fn execute(
        &self,
        method: Method,
        path: &str,
        headers: &MantaHttpHeaders,
        body: Option<&[u8]>,
    ) -> MantaResult<Response> {
        let url = self.url_for(path);
        let idempotent = method == Method::GET
            || method == Method::HEAD
            || method == Method::PUT
            || method == Method::DELETE;
        let max_attempts = if idempotent { self.retries + 1 } else { 1 };

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            let date = http_date();
            let encoded_path = format_path(path);
            let authorization = self.signer.authorization(
                method.as_str(),
                &encoded_path,
                &self.host,
                &date,
            )?;

            let mut request = self
                .client
                .request(method.clone(), &url)
                .header("Date", &date)
                .header("Authorization", &authorization);
            for (name, value) in headers.iter() {
                request = request.header(name, value);
            }
            if let Some(bytes) = body {
                request = request.body(bytes.to_vec());
            }

            match request.send() {
                Ok(response) => return Ok(response),
                Err(e) if attempt < max_attempts && retry::is_retriable(&e) => {
                    tracing::debug!(
                        method = %method,
                        path,
                        attempt,
                        max_retries = self.retries,
                        error = %e,
                        "request failed, retrying"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Current wall-clock time in RFC 1123 form for the `Date` header.
pub fn http_date() -> String {
    chrono::Utc::now()
        .format("%a, %d %b %Y %H:%M:%S GMT")
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_date_is_rfc1123() {
        let date = http_date();
        // e.g. "Thu, 05 Jan 2017 22:03:03 GMT"
        assert!(date.ends_with(" GMT"));
        assert_eq!(date.len(), 29);
        assert_eq!(&date[3..5], ", ");
    }
}
