//! Download-side decryption
//!
//! Whole objects are verified against their trailer; MtE verification can
//! be waived in [`AuthMode::Optional`], which is also what permits ranged
//! reads of CTR ciphertext (a byte range can never be authenticated,
//! because the HMAC covers the whole object).

use subtle::ConstantTimeEq;

use crate::catalog::CipherDetails;
use crate::ctr_stream::CtrStream;
use crate::gcm::GcmVerifier;
use crate::hmac_stream::HmacStream;
use crate::key::SecretKey;

/// Strictness of ciphertext authentication.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Unauthenticated reads of MtE ciphertext are permitted with a warning.
    Optional,
    /// All reads must authenticate; range reads of MtE ciphertext fail.
    Mandatory,
}

/// Decrypt a complete stored object (`IV ‖ C ‖ trailer`).
///
/// For MtE ciphers an HMAC mismatch is fatal in [`AuthMode::Mandatory`]
/// and logged in [`AuthMode::Optional`]. AEAD tags are always enforced.
pub fn decrypt_object(
    details: &CipherDetails,
    key: &SecretKey,
    object: &[u8],
    mode: AuthMode,
) -> anyhow::Result<Vec<u8>> {
    key.validate_for(details)?;
    let plaintext_len = details.plaintext_len(object.len() as u64)? as usize;
    let (iv, rest) = object.split_at(details.iv_len);
    let (ciphertext, trailer) = rest.split_at(plaintext_len);

    if details.aead {
        let mut verifier = GcmVerifier::new(key.as_bytes(), iv)?;
        let mut plaintext = ciphertext.to_vec();
        verifier.decrypt(&mut plaintext);
        verifier.finalize(trailer)?;
        Ok(plaintext)
    } else {
        let kind = details
            .hmac
            .ok_or_else(|| anyhow::anyhow!("{} has no trailer definition", details.id))?;
        let mut mac = HmacStream::new(kind, key.as_bytes())?;
        mac.update(iv);
        mac.update(ciphertext);
        let computed = mac.finalize();
        let authenticated: bool = computed.ct_eq(trailer).into();
        if !authenticated {
            match mode {
                AuthMode::Mandatory => {
                    anyhow::bail!("ciphertext HMAC mismatch; refusing unauthenticated plaintext")
                }
                AuthMode::Optional => {
                    tracing::warn!("ciphertext HMAC mismatch; returning unauthenticated plaintext");
                }
            }
        }
        let mut plaintext = ciphertext.to_vec();
        let mut stream = CtrStream::new(key.as_bytes(), iv)?;
        stream.apply(&mut plaintext);
        Ok(plaintext)
    }
}

/// Decrypt a ciphertext window fetched for the plaintext range starting at
/// `plaintext_start`. CTR only; the result is inherently unauthenticated,
/// so [`AuthMode::Mandatory`] refuses.
pub fn decrypt_range(
    details: &CipherDetails,
    key: &SecretKey,
    iv: &[u8],
    plaintext_start: u64,
    ciphertext_window: &[u8],
    mode: AuthMode,
) -> anyhow::Result<Vec<u8>> {
    if !details.supports_random_access() {
        anyhow::bail!("{} does not support random-access decryption", details.id);
    }
    if mode == AuthMode::Mandatory {
        anyhow::bail!(
            "range reads cannot be authenticated; enable optional authentication \
             or download the whole object"
        );
    }
    key.validate_for(details)?;
    tracing::warn!(
        offset = plaintext_start,
        len = ciphertext_window.len(),
        "returning unauthenticated range of MtE ciphertext"
    );

    let mut plaintext = ciphertext_window.to_vec();
    let mut stream = CtrStream::new(key.as_bytes(), iv)?;
    stream.seek(plaintext_start);
    stream.apply(&mut plaintext);
    Ok(plaintext)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CipherId;
    use crate::context::EncryptionContext;
    use proptest::prelude::*;

    fn encrypt_whole(id: CipherId, key: &SecretKey, plaintext: &[u8]) -> Vec<u8> {
        let details = id.details();
        let mut ctx = EncryptionContext::new(details, key.clone()).unwrap();
        let mut object = Vec::with_capacity(details.ciphertext_len(plaintext.len() as u64) as usize);
        object.extend_from_slice(ctx.iv());
        let mut body = plaintext.to_vec();
        ctx.encrypt(&mut body).unwrap();
        object.extend_from_slice(&body);
        object.extend_from_slice(&ctx.finalize());
        object
    }

    #[test]
    fn ctr_object_roundtrip() {
        let key = SecretKey::from_bytes(vec![0x66; 32]);
        let plaintext = b"twelve bytes and then some more bytes".to_vec();
        let object = encrypt_whole(CipherId::Aes256Ctr, &key, &plaintext);

        let details = CipherId::Aes256Ctr.details();
        assert_eq!(object.len() as u64, details.ciphertext_len(plaintext.len() as u64));
        let out = decrypt_object(details, &key, &object, AuthMode::Mandatory).unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn gcm_object_roundtrip() {
        let key = SecretKey::from_bytes(vec![0x77; 32]);
        let plaintext = vec![0xabu8; 5000];
        let object = encrypt_whole(CipherId::Aes256Gcm, &key, &plaintext);
        let out = decrypt_object(CipherId::Aes256Gcm.details(), &key, &object, AuthMode::Optional)
            .unwrap();
        assert_eq!(out, plaintext);
    }

    #[test]
    fn tampered_mte_object_fails_mandatory_passes_optional() {
        let key = SecretKey::from_bytes(vec![0x88; 32]);
        let mut object = encrypt_whole(CipherId::Aes256Ctr, &key, b"sensitive payload");
        let mid = object.len() / 2;
        object[mid] ^= 0x01;

        let details = CipherId::Aes256Ctr.details();
        assert!(decrypt_object(details, &key, &object, AuthMode::Mandatory).is_err());
        // optional mode returns the (corrupted) plaintext with a warning
        assert!(decrypt_object(details, &key, &object, AuthMode::Optional).is_ok());
    }

    #[test]
    fn tampered_aead_object_always_fails() {
        let key = SecretKey::from_bytes(vec![0x99; 32]);
        let mut object = encrypt_whole(CipherId::Aes256Gcm, &key, b"sensitive payload");
        let mid = object.len() / 2;
        object[mid] ^= 0x01;
        let details = CipherId::Aes256Gcm.details();
        assert!(decrypt_object(details, &key, &object, AuthMode::Optional).is_err());
    }

    #[test]
    fn range_decrypt_recovers_window() {
        let key = SecretKey::from_bytes(vec![0xaa; 32]);
        let plaintext: Vec<u8> = (0u8..=255).cycle().take(10_000).collect();
        let object = encrypt_whole(CipherId::Aes256Ctr, &key, &plaintext);

        let details = CipherId::Aes256Ctr.details();
        let (start, end) = (3000u64, 4500u64);
        let (ct_start, ct_end) = details.ciphertext_range(start, end).unwrap();
        let window = &object[ct_start as usize..ct_end as usize];

        let out = decrypt_range(details, &key, &object[..16], start, window, AuthMode::Optional)
            .unwrap();
        assert_eq!(out, &plaintext[start as usize..end as usize]);
    }

    #[test]
    fn range_decrypt_refused_in_mandatory_mode() {
        let key = SecretKey::from_bytes(vec![0xbb; 32]);
        let details = CipherId::Aes256Ctr.details();
        let err = decrypt_range(details, &key, &[0; 16], 0, &[0; 32], AuthMode::Mandatory);
        assert!(err.is_err());
    }

    #[test]
    fn range_decrypt_refused_for_aead() {
        let key = SecretKey::from_bytes(vec![0xcc; 32]);
        let details = CipherId::Aes256Gcm.details();
        assert!(decrypt_range(details, &key, &[0; 12], 0, &[0; 32], AuthMode::Optional).is_err());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]
        #[test]
        fn arbitrary_windows_decrypt(
            len in 1usize..4096,
            seed in any::<u8>(),
        ) {
            let key = SecretKey::from_bytes(vec![seed; 32]);
            let plaintext: Vec<u8> = (0..len).map(|i| (i as u8).wrapping_add(seed)).collect();
            let object = encrypt_whole(CipherId::Aes256Ctr, &key, &plaintext);

            let details = CipherId::Aes256Ctr.details();
            let start = (len / 3) as u64;
            let end = (len - len / 4) as u64;
            prop_assume!(start < end);
            let (cs, ce) = details.ciphertext_range(start, end).unwrap();
            let out = decrypt_range(
                details,
                &key,
                &object[..16],
                start,
                &object[cs as usize..ce as usize],
                AuthMode::Optional,
            ).unwrap();
            prop_assert_eq!(&out[..], &plaintext[start as usize..end as usize]);
        }
    }
}
