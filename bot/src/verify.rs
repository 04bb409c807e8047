//! Discord interaction signature check.
//!
//! Discord signs `timestamp || body` with the application's Ed25519 key and
//! sends the result hex-encoded in `X-Signature-Ed25519`. Requests that do
//! not verify must be answered with 401.

use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use thiserror::Error;

pub const SIGNATURE_HEADER: &str = "x-signature-ed25519";
pub const TIMESTAMP_HEADER: &str = "x-signature-timestamp";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SignatureError {
    #[error("public key is not valid hex: {0}")]
    KeyEncoding(String),

    #[error("public key is not a valid Ed25519 point")]
    KeyInvalid,

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("malformed signature")]
    Malformed,

    #[error("signature does not match")]
    Mismatch,
}

#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    key: VerifyingKey,
}

impl SignatureVerifier {
    pub fn from_hex(public_key: &str) -> Result<Self, SignatureError> {
        let bytes = hex::decode(public_key.trim())
            .map_err(|e| SignatureError::KeyEncoding(e.to_string()))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| SignatureError::KeyEncoding("expected 32 bytes".to_string()))?;
        let key = VerifyingKey::from_bytes(&bytes).map_err(|_| SignatureError::KeyInvalid)?;
        Ok(Self { key })
    }

    pub fn verify(&self, signature_hex: &str, timestamp: &str, body: &[u8]) -> Result<(), SignatureError> {
        let raw = hex::decode(signature_hex.trim()).map_err(|_| SignatureError::Malformed)?;
        let signature = Signature::from_slice(&raw).map_err(|_| SignatureError::Malformed)?;

        let mut message = Vec::with_capacity(timestamp.len() + body.len());
        message.extend_from_slice(timestamp.as_bytes());
        message.extend_from_slice(body);

        self.key
            .verify(&message, &signature)
            .map_err(|_| SignatureError::Mismatch)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, SignatureVerifier) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let verifier =
            SignatureVerifier::from_hex(&hex::encode(signing.verifying_key().to_bytes())).unwrap();
        (signing, verifier)
    }

    fn sign(key: &SigningKey, timestamp: &str, body: &[u8]) -> String {
        let mut message = timestamp.as_bytes().to_vec();
        message.extend_from_slice(body);
        hex::encode(key.sign(&message).to_bytes())
    }

    #[test]
    fn accepts_signature_over_timestamp_and_body() {
        let (signing, verifier) = keypair();
        let body = br#"{"type":1}"#;
        let sig = sign(&signing, "1700000000", body);
        assert_eq!(verifier.verify(&sig, "1700000000", body), Ok(()));
    }

    #[test]
    fn rejects_tampered_body_or_timestamp() {
        let (signing, verifier) = keypair();
        let sig = sign(&signing, "1700000000", br#"{"type":1}"#);
        assert_eq!(
            verifier.verify(&sig, "1700000000", br#"{"type":2}"#),
            Err(SignatureError::Mismatch)
        );
        assert_eq!(
            verifier.verify(&sig, "1700000001", br#"{"type":1}"#),
            Err(SignatureError::Mismatch)
        );
    }

    #[test]
    fn rejects_non_hex_signature() {
        let (_, verifier) = keypair();
        assert_eq!(
            verifier.verify("not-hex", "1", b"{}"),
            Err(SignatureError::Malformed)
        );
        assert_eq!(verifier.verify("abcd", "1", b"{}"), Err(SignatureError::Malformed));
    }

    #[test]
    fn rejects_short_public_key() {
        assert!(matches!(
            SignatureVerifier::from_hex("abcd"),
            Err(SignatureError::KeyEncoding(_))
        ));
    }
}
