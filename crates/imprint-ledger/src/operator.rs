//! Operator account and signing key.

use std::fmt;
use std::str::FromStr;

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use imprint_core::AccountId;

use crate::error::LedgerError;

/// Hex of the PKCS#8 DER header that precedes a raw Ed25519 seed.
pub const DER_PREFIX: &str = "302e020100300506032b657004220420";

/// The operator's Ed25519 signing key.
#[derive(Clone)]
pub struct OperatorKey {
    signing_key: SigningKey,
}

impl OperatorKey {
    /// Generate a new random key.
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            signing_key: SigningKey::generate(&mut rng),
        }
    }

    /// Create from a 32-byte seed.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Parse a key given as 64 hex characters (raw seed) or 96 hex characters
    /// (DER-encoded PKCS#8). An optional `0x` prefix is accepted.
    pub fn parse(s: &str) -> Result<Self, LedgerError> {
        let trimmed = s.trim();
        let hex_str = trimmed.strip_prefix("0x").unwrap_or(trimmed).to_ascii_lowercase();

        let seed_hex = match hex_str.len() {
            64 => hex_str.as_str(),
            96 => hex_str.strip_prefix(DER_PREFIX).ok_or_else(|| {
                LedgerError::Config("operator key has an unrecognised DER header".into())
            })?,
            n => {
                return Err(LedgerError::Config(format!(
                    "operator key must be 64 or 96 hex characters, got {}",
                    n
                )))
            }
        };

        let bytes = hex::decode(seed_hex)
            .map_err(|e| LedgerError::Config(format!("operator key is not hex: {}", e)))?;
        let mut seed = [0u8; 32];
        seed.copy_from_slice(&bytes);
        Ok(Self::from_seed(&seed))
    }

    pub fn public_key(&self) -> VerifyingKey {
        self.signing_key.verifying_key()
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        self.signing_key.sign(message)
    }

    /// The raw seed as 64 hex characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.signing_key.to_bytes())
    }
}

impl FromStr for OperatorKey {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Debug for OperatorKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let public = hex::encode(self.public_key().to_bytes());
        write!(f, "OperatorKey({})", &public[..16])
    }
}

/// The account that pays for and signs submissions.
#[derive(Debug, Clone)]
pub struct OperatorCredentials {
    pub account_id: AccountId,
    pub key: OperatorKey,
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::Verifier;

    #[test]
    fn test_parse_raw_and_der_forms() {
        let key = OperatorKey::from_seed(&[0x42; 32]);
        let raw = key.to_hex();

        let from_raw = OperatorKey::parse(&raw).unwrap();
        let from_der = OperatorKey::parse(&format!("{}{}", DER_PREFIX, raw)).unwrap();
        let from_prefixed = OperatorKey::parse(&format!("0x{}", raw.to_uppercase())).unwrap();

        assert_eq!(from_raw.public_key(), key.public_key());
        assert_eq!(from_der.public_key(), key.public_key());
        assert_eq!(from_prefixed.public_key(), key.public_key());
    }

    #[test]
    fn test_parse_rejects_bad_keys() {
        assert!(matches!(OperatorKey::parse(""), Err(LedgerError::Config(_))));
        assert!(matches!(OperatorKey::parse("abcd"), Err(LedgerError::Config(_))));
        assert!(matches!(
            OperatorKey::parse(&"zz".repeat(32)),
            Err(LedgerError::Config(_))
        ));
        // 96 characters without the Ed25519 DER header
        assert!(matches!(
            OperatorKey::parse(&"00".repeat(48)),
            Err(LedgerError::Config(_))
        ));
    }

    #[test]
    fn test_sign_verify() {
        let key = OperatorKey::generate();
        let sig = key.sign(b"payload");
        assert!(key.public_key().verify(b"payload", &sig).is_ok());
        assert!(key.public_key().verify(b"payloaD", &sig).is_err());
    }

    #[test]
    fn test_debug_hides_secret() {
        let key = OperatorKey::from_seed(&[7; 32]);
        let shown = format!("{:?}", key);
        assert!(!shown.contains(&key.to_hex()));
        assert!(shown.starts_with("OperatorKey("));
    }
}
