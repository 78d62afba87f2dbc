//! Claw identity: Ed25519 keypair, deterministic claw-id derivation, and
//! request signing/verification.
//!
//! The claw-id is the hex-encoded SHA-256 digest of the raw Ed25519 public
//! key, directly following the teacher's device-id derivation.

#![forbid(unsafe_code)]

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("invalid key material: {0}")]
    InvalidKey(String),
    #[error("signature verification failed")]
    BadSignature,
}

/// An owned Ed25519 identity: signing key plus the derived claw-id.
pub struct ClawIdentity {
    pub claw_id: String,
    pub public_key_raw: Vec<u8>,
    signing_key: SigningKey,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredIdentity {
    version: u32,
    claw_id: String,
    public_key: String,
    secret_key: String,
    created_at_ms: i64,
}

/// Derive the claw-id from a raw Ed25519 public key: hex(sha256(pubkey)).
pub fn derive_claw_id(public_key_raw: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(public_key_raw);
    hex::encode(hasher.finalize())
}

impl ClawIdentity {
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let public_key_raw = signing_key.verifying_key().to_bytes().to_vec();
        let claw_id = derive_claw_id(&public_key_raw);
        Self { claw_id, public_key_raw, signing_key }
    }

    pub fn load_or_create(path: &Path) -> Result<Self, IdentityError> {
        if path.exists() {
            Self::load(path)
        } else {
            let identity = Self::generate();
            identity.save(path)?;
            Ok(identity)
        }
    }

    pub fn load(path: &Path) -> Result<Self, IdentityError> {
        let raw = fs::read_to_string(path)?;
        let stored: StoredIdentity = serde_json::from_str(&raw)?;
        let secret_bytes = base64::Engine::decode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            &stored.secret_key,
        )?;
        let secret: [u8; 32] = secret_bytes
            .try_into()
            .map_err(|_| IdentityError::InvalidKey("secret key must be 32 bytes".into()))?;
        let signing_key = SigningKey::from_bytes(&secret);
        let public_key_raw = signing_key.verifying_key().to_bytes().to_vec();
        Ok(Self { claw_id: stored.claw_id, public_key_raw, signing_key })
    }

    pub fn save(&self, path: &Path) -> Result<(), IdentityError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredIdentity {
            version: 1,
            claw_id: self.claw_id.clone(),
            public_key: self.public_key_base64url(),
            secret_key: base64::Engine::encode(
                &base64::engine::general_purpose::URL_SAFE_NO_PAD,
                self.signing_key.to_bytes(),
            ),
            created_at_ms: chrono::Utc::now().timestamp_millis(),
        };
        let json = serde_json::to_string_pretty(&stored)?;
        fs::write(path, json)?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
        }
        Ok(())
    }

    pub fn public_key_base64url(&self) -> String {
        base64::Engine::encode(
            &base64::engine::general_purpose::URL_SAFE_NO_PAD,
            &self.public_key_raw,
        )
    }

    /// Sign an arbitrary payload, returning a base64url signature.
    pub fn sign(&self, payload: &[u8]) -> String {
        let sig: Signature = self.signing_key.sign(payload);
        base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, sig.to_bytes())
    }
}

/// Build the canonical signed-message string per spec.md §4.1/§6:
/// `method + "\n" + path + "\n" + timestamp + "\n" + body`.
pub fn build_signed_message(method: &str, path: &str, timestamp_ms: i64, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(method.len() + path.len() + body.len() + 16);
    out.extend_from_slice(method.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(path.as_bytes());
    out.push(b'\n');
    out.extend_from_slice(timestamp_ms.to_string().as_bytes());
    out.push(b'\n');
    out.extend_from_slice(body);
    out
}

/// Verify a base64url-encoded Ed25519 signature over `message` using a
/// base64url-encoded raw public key.
pub fn verify_signature(
    public_key_b64: &str,
    message: &[u8],
    signature_b64: &str,
) -> Result<(), IdentityError> {
    let pub_bytes = base64::Engine::decode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        public_key_b64,
    )?;
    let pub_bytes: [u8; 32] = pub_bytes
        .try_into()
        .map_err(|_| IdentityError::InvalidKey("public key must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&pub_bytes)
        .map_err(|e| IdentityError::InvalidKey(e.to_string()))?;

    let sig_bytes = base64::Engine::decode(
        &base64::engine::general_purpose::URL_SAFE_NO_PAD,
        signature_b64,
    )?;
    let sig_bytes: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| IdentityError::InvalidKey("signature must be 64 bytes".into()))?;
    let signature = Signature::from_bytes(&sig_bytes);

    verifying_key
        .verify(message, &signature)
        .map_err(|_| IdentityError::BadSignature)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_identity() {
        let identity = ClawIdentity::generate();
        assert_eq!(identity.claw_id.len(), 64);
        assert_eq!(identity.public_key_raw.len(), 32);
    }

    #[test]
    fn test_claw_id_deterministic_from_public_key() {
        let identity = ClawIdentity::generate();
        assert_eq!(derive_claw_id(&identity.public_key_raw), identity.claw_id);
    }

    #[test]
    fn test_sign_and_verify_roundtrip() {
        let identity = ClawIdentity::generate();
        let message = build_signed_message("POST", "/api/v1/messages", 1_700_000_000_000, b"{}");
        let sig = identity.sign(&message);
        verify_signature(&identity.public_key_base64url(), &message, &sig).expect("verify");
    }

    #[test]
    fn test_verify_rejects_mutated_body() {
        let identity = ClawIdentity::generate();
        let message = build_signed_message("POST", "/api/v1/messages", 1_700_000_000_000, b"{}");
        let sig = identity.sign(&message);
        let mutated = build_signed_message("POST", "/api/v1/messages", 1_700_000_000_000, b"{\"x\":1}");
        let result = verify_signature(&identity.public_key_base64url(), &mutated, &sig);
        assert!(result.is_err());
    }

    #[test]
    fn test_verify_rejects_wrong_key() {
        let a = ClawIdentity::generate();
        let b = ClawIdentity::generate();
        let message = build_signed_message("GET", "/api/v1/me", 1_700_000_000_000, b"");
        let sig = a.sign(&message);
        let result = verify_signature(&b.public_key_base64url(), &message, &sig);
        assert!(result.is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("identity.json");
        let identity = ClawIdentity::generate();
        identity.save(&path).expect("save");

        let loaded = ClawIdentity::load(&path).expect("load");
        assert_eq!(loaded.claw_id, identity.claw_id);
        assert_eq!(loaded.public_key_raw, identity.public_key_raw);
    }

    #[test]
    fn test_load_or_create_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("identity.json");
        let first = ClawIdentity::load_or_create(&path).expect("create");
        let second = ClawIdentity::load_or_create(&path).expect("load");
        assert_eq!(first.claw_id, second.claw_id);
    }
}
