use ed25519_dalek::{Signer, SigningKey};

/// Domain separator prepended to every signed request body.
pub const REQUEST_DOMAIN_SEPARATOR: &[u8] = b"\x0Aic-request";

/// DER prefix of an Ed25519 `SubjectPublicKeyInfo`.
pub const ED25519_DER_PREFIX: [u8; 12] = [
    0x30, 0x2a, 0x30, 0x05, 0x06, 0x03, 0x2b, 0x65, 0x70, 0x03, 0x21, 0x00,
];

/// Sign a request body: `ed25519_sign(domain_separator || body)`.
pub fn sign_request(body: &[u8], signing_key: &SigningKey) -> Vec<u8> {
    let mut framed = Vec::with_capacity(REQUEST_DOMAIN_SEPARATOR.len() + body.len());
    framed.extend_from_slice(REQUEST_DOMAIN_SEPARATOR);
    framed.extend_from_slice(body);
    signing_key.sign(&framed).to_bytes().to_vec()
}

/// DER-encode a raw 32-byte Ed25519 public key.
pub fn ed25519_der(raw: &[u8; 32]) -> Vec<u8> {
    let mut der = ED25519_DER_PREFIX.to_vec();
    der.extend_from_slice(raw);
    der
}

/// Strip the DER prefix, accepting a raw 32-byte key as-is.
pub fn ed25519_raw(der_or_raw: &[u8]) -> Option<[u8; 32]> {
    let raw = match der_or_raw.len() {
        32 => der_or_raw,
        44 if der_or_raw.starts_with(&ED25519_DER_PREFIX) => &der_or_raw[12..],
        _ => return None,
    };
    raw.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    fn test_signing_key() -> SigningKey {
        SigningKey::from_bytes(&[7u8; 32])
    }

    #[test]
    fn test_sign_request_verifies_with_separator() {
        let key = test_signing_key();
        let sig = sign_request(b"{\"a\":1}", &key);
        assert_eq!(sig.len(), 64);

        let signature = ed25519_dalek::Signature::from_bytes(sig.as_slice().try_into().unwrap());
        let mut framed = REQUEST_DOMAIN_SEPARATOR.to_vec();
        framed.extend_from_slice(b"{\"a\":1}");
        key.verifying_key().verify(&framed, &signature).unwrap();
        assert!(key
            .verifying_key()
            .verify(b"{\"a\":1}", &signature)
            .is_err());
    }

    #[test]
    fn test_der_round_trip() {
        let raw = test_signing_key().verifying_key().to_bytes();
        let der = ed25519_der(&raw);
        assert_eq!(der.len(), 44);
        assert_eq!(ed25519_raw(&der), Some(raw));
        assert_eq!(ed25519_raw(&raw), Some(raw));
        assert_eq!(ed25519_raw(&der[..40]), None);
    }
}
