//! HTTP Signatures request signing
//!
//! Produces the `Authorization` header:
//! `Signature keyId="/<login>/keys/<fingerprint>",algorithm="rsa-sha256",headers="date",signature="<base64>"`
//!
//! The signing string is built from the signed header lines; the default
//! set is just `date`. Signing is pure over request state plus the
//! supplied date, so the transport can re-sign freely on retry.

use std::fmt;
use std::path::Path;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::signature::{SignatureEncoding, Signer};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use manta_core::{MantaError, MantaResult};

/// Which header lines participate in the signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignedHeaders {
    /// Sign `date` only (the historical default).
    DateOnly,
    /// Sign `(request-target)`, `host` and `date`.
    RequestTargetHostDate,
}

impl SignedHeaders {
    fn header_list(&self) -> &'static str {
        match self {
            SignedHeaders::DateOnly => "date",
            SignedHeaders::RequestTargetHostDate => "(request-target) host date",
        }
    }
}

enum SignerKey {
    Rsa(rsa::pkcs1v15::SigningKey<Sha256>),
    Ecdsa(p256::ecdsa::SigningKey),
}

impl fmt::Debug for SignerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignerKey::Rsa(_) => f.write_str("Rsa(?)"),
            SignerKey::Ecdsa(_) => f.write_str("Ecdsa(?)"),
        }
    }
}

/// Signs outbound requests with the account's private key.
#[derive(Debug)]
pub struct HttpSigner {
    key: SignerKey,
    fingerprint: String,
    login: String,
    signed_headers: SignedHeaders,
}

impl HttpSigner {
    /// Load the key from a PEM file on disk.
    pub fn from_key_file(
        path: &Path,
        fingerprint: impl Into<String>,
        login: impl Into<String>,
    ) -> MantaResult<Self> {
        let pem = std::fs::read_to_string(path).map_err(|e| {
            MantaError::Crypto(format!("unable to read private key {}: {e}", path.display()))
        })?;
        Self::from_key_bytes(&pem, fingerprint, None, login)
    }

    /// Build a signer from in-memory PEM content.
    pub fn from_key_bytes(
        pem: &str,
        fingerprint: impl Into<String>,
        passphrase: Option<&str>,
        login: impl Into<String>,
    ) -> MantaResult<Self> {
        let fingerprint = fingerprint.into();
        let login = login.into();
        if fingerprint.is_empty() {
            return Err(MantaError::Crypto("key fingerprint must not be empty".into()));
        }
        if login.is_empty() {
            return Err(MantaError::Crypto("login must not be empty".into()));
        }
        let key = parse_key(pem, passphrase)?;
        Ok(Self {
            key,
            fingerprint,
            login,
            signed_headers: SignedHeaders::DateOnly,
        })
    }

    /// Override which headers participate in the signature.
    pub fn with_signed_headers(mut self, headers: SignedHeaders) -> Self {
        self.signed_headers = headers;
        self
    }

    /// Signature algorithm identifier, decided by the key type.
    pub fn algorithm(&self) -> &'static str {
        match self.key {
            SignerKey::Rsa(_) => "rsa-sha256",
            SignerKey::Ecdsa(_) => "ecdsa-sha256",
        }
    }

    /// The `keyId` value: `/<login>/keys/<fingerprint>`.
    pub fn key_id(&self) -> String {
        format!("/{}/keys/{}", self.login, self.fingerprint)
    }

    /// Produce the `Authorization` header value for one request.
    ///
    /// `method` and `path` are only consulted when `(request-target)` is in
    /// the signed set; `date` must be the exact value sent on the wire.
    pub fn authorization(
        &self,
        method: &str,
        path: &str,
        host: &str,
        date: &str,
    ) -> MantaResult<String> {
        let signing_string = match self.signed_headers {
            SignedHeaders::DateOnly => format!("date: {date}"),
            SignedHeaders::RequestTargetHostDate => format!(
                "(request-target): {} {}\nhost: {}\ndate: {}",
                method.to_ascii_lowercase(),
                path,
                host,
                date
            ),
        };
        let signature = self.sign(signing_string.as_bytes());
        Ok(format!(
            "Signature keyId=\"{}\",algorithm=\"{}\",headers=\"{}\",signature=\"{}\"",
            self.key_id(),
            self.algorithm(),
            self.signed_headers.header_list(),
            BASE64.encode(signature),
        ))
    }

    fn sign(&self, message: &[u8]) -> Vec<u8> {
        match &self.key {
            SignerKey::Rsa(key) => key.sign(message).to_vec(),
            SignerKey::Ecdsa(key) => {
                let signature: p256::ecdsa::Signature = key.sign(message);
                signature.to_der().as_bytes().to_vec()
            }
        }
    }
}

fn parse_key(pem: &str, passphrase: Option<&str>) -> MantaResult<SignerKey> {
    if pem.contains("BEGIN RSA PRIVATE KEY") {
        let key = RsaPrivateKey::from_pkcs1_pem(pem)
            .map_err(|e| MantaError::Crypto(format!("invalid PKCS#1 RSA key: {e}")))?;
        return Ok(SignerKey::Rsa(rsa::pkcs1v15::SigningKey::new(key)));
    }
    if pem.contains("BEGIN EC PRIVATE KEY") {
        let secret = p256::SecretKey::from_sec1_pem(pem)
            .map_err(|e| MantaError::Crypto(format!("invalid SEC1 EC key: {e}")))?;
        return Ok(SignerKey::Ecdsa(p256::ecdsa::SigningKey::from(&secret)));
    }
    if pem.contains("BEGIN ENCRYPTED PRIVATE KEY") {
        let passphrase = passphrase.ok_or_else(|| {
            MantaError::Crypto("private key is encrypted but no passphrase was supplied".into())
        })?;
        if let Ok(key) = RsaPrivateKey::from_pkcs8_encrypted_pem(pem, passphrase) {
            return Ok(SignerKey::Rsa(rsa::pkcs1v15::SigningKey::new(key)));
        }
        let key = p256::ecdsa::SigningKey::from_pkcs8_encrypted_pem(pem, passphrase)
            .map_err(|e| MantaError::Crypto(format!("unable to decrypt private key: {e}")))?;
        return Ok(SignerKey::Ecdsa(key));
    }
    if pem.contains("BEGIN PRIVATE KEY") {
        if let Ok(key) = RsaPrivateKey::from_pkcs8_pem(pem) {
            return Ok(SignerKey::Rsa(rsa::pkcs1v15::SigningKey::new(key)));
        }
        if let Ok(key) = p256::ecdsa::SigningKey::from_pkcs8_pem(pem) {
            return Ok(SignerKey::Ecdsa(key));
        }
        return Err(MantaError::Crypto(
            "PKCS#8 key is neither RSA nor ECDSA P-256".into(),
        ));
    }
    Err(MantaError::Crypto(
        "unrecognized private key format (expected PEM)".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use rsa::pkcs8::EncodePrivateKey;
    use rsa::pkcs1v15::VerifyingKey;
    use rsa::signature::Verifier;
    use rsa::RsaPublicKey;

    fn rsa_key() -> (RsaPrivateKey, String) {
        let key = RsaPrivateKey::new(&mut OsRng, 2048).expect("keygen");
        let pem = key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)
            .expect("pem")
            .to_string();
        (key, pem)
    }

    #[test]
    fn rsa_signature_over_date_verifies() {
        let (key, pem) = rsa_key();
        let signer = HttpSigner::from_key_bytes(&pem, "ab:cd", None, "u").unwrap();
        assert_eq!(signer.algorithm(), "rsa-sha256");

        let date = "Thu, 05 Jan 2017 22:03:03 GMT";
        let header = signer
            .authorization("GET", "/u/stor/x", "manta.example.com", date)
            .unwrap();

        assert!(header.starts_with("Signature keyId=\"/u/keys/ab:cd\""));
        assert!(header.contains("algorithm=\"rsa-sha256\""));
        assert!(header.contains("headers=\"date\""));

        let sig_b64 = header
            .split("signature=\"")
            .nth(1)
            .unwrap()
            .trim_end_matches('"');
        let sig_bytes = BASE64.decode(sig_b64).unwrap();
        let signature = rsa::pkcs1v15::Signature::try_from(sig_bytes.as_slice()).unwrap();

        let verifying = VerifyingKey::<Sha256>::new(RsaPublicKey::from(&key));
        verifying
            .verify(format!("date: {date}").as_bytes(), &signature)
            .expect("signature must cover exactly the date line");
    }

    #[test]
    fn rsa_signing_is_deterministic() {
        let (_, pem) = rsa_key();
        let signer = HttpSigner::from_key_bytes(&pem, "ab:cd", None, "u").unwrap();
        let date = "Thu, 05 Jan 2017 22:03:03 GMT";
        let a = signer.authorization("GET", "/u/stor/x", "h", date).unwrap();
        let b = signer.authorization("PUT", "/u/stor/y", "h", date).unwrap();
        // date is the only signed header, so method and path do not matter
        assert_eq!(a, b);
    }

    #[test]
    fn ecdsa_key_selects_ecdsa_algorithm() {
        let secret = p256::SecretKey::random(&mut OsRng);
        let pem = secret
            .to_pkcs8_pem(p256::pkcs8::LineEnding::LF)
            .unwrap()
            .to_string();
        let signer = HttpSigner::from_key_bytes(&pem, "aa:bb", None, "u").unwrap();
        assert_eq!(signer.algorithm(), "ecdsa-sha256");
        let header = signer
            .authorization("GET", "/u/stor/x", "h", "Mon, 01 Jan 2024 00:00:00 GMT")
            .unwrap();
        assert!(header.contains("algorithm=\"ecdsa-sha256\""));
    }

    #[test]
    fn request_target_mode_binds_method_and_path() {
        let (_, pem) = rsa_key();
        let signer = HttpSigner::from_key_bytes(&pem, "ab:cd", None, "u")
            .unwrap()
            .with_signed_headers(SignedHeaders::RequestTargetHostDate);
        let date = "Thu, 05 Jan 2017 22:03:03 GMT";
        let a = signer.authorization("GET", "/u/stor/x", "h", date).unwrap();
        let b = signer.authorization("PUT", "/u/stor/x", "h", date).unwrap();
        assert_ne!(a, b);
        assert!(a.contains("headers=\"(request-target) host date\""));
    }

    #[test]
    fn construction_failures_are_fatal() {
        assert!(HttpSigner::from_key_bytes("not a key", "aa", None, "u").is_err());
        let (_, pem) = rsa_key();
        assert!(HttpSigner::from_key_bytes(&pem, "", None, "u").is_err());
        assert!(HttpSigner::from_key_bytes(&pem, "aa", None, "").is_err());
        assert!(HttpSigner::from_key_file(Path::new("/nonexistent/key"), "aa", "u").is_err());
    }
}
