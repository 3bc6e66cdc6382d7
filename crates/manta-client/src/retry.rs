//! Transport failure classification
//!
//! Never retried: timeouts, unknown hosts, connection refused, TLS
//! failures. Everything else transport-shaped (resets, aborted
//! connections, broken pipes, truncated responses) is retried up to the
//! configured count.

use std::error::Error as StdError;
use std::io;

use crate::transport::DnsFailure;

/// Decide whether a failed attempt may be retried.
pub(crate) fn is_retriable(err: &reqwest::Error) -> bool {
    if err.is_timeout() || err.is_builder() || err.is_redirect() || err.is_decode() {
        return false;
    }
    let mut source = err.source();
    while let Some(cause) = source {
        if let Some(verdict) = verdict_for(cause) {
            return verdict;
        }
        source = cause.source();
    }
    // TLS and refused-connection failures surface as connect errors with
    // no classifiable io cause; anything else is a mid-flight transport
    // failure worth retrying.
    !err.is_connect()
}

/// Classify a single cause in the source chain, if it is decisive.
fn verdict_for(cause: &(dyn StdError + 'static)) -> Option<bool> {
    if cause.downcast_ref::<DnsFailure>().is_some() {
        return Some(false);
    }
    if let Some(io_err) = cause.downcast_ref::<io::Error>() {
        use io::ErrorKind::*;
        return match io_err.kind() {
            ConnectionRefused | TimedOut | WouldBlock | Interrupted => Some(false),
            ConnectionReset | ConnectionAborted | BrokenPipe | UnexpectedEof => Some(true),
            _ => None,
        };
    }
    None
}
