use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use ulid::Ulid;

use crate::engine::EngineError;
use crate::model::Credential;

/// Resolves caller credentials to a verified hotel identity.
#[async_trait]
pub trait IdentityResolver: Send + Sync {
    async fn resolve(&self, token: &str) -> Result<Ulid, EngineError>;
}

pub fn hash_password(password: &str) -> Credential {
    let mut salt = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt);
    let salt = hex::encode(salt);
    let hash = digest_password(&salt, password);
    Credential { salt, hash }
}

pub fn verify_password(credential: &Credential, password: &str) -> bool {
    let candidate = digest_password(&credential.salt, password);
    constant_time_eq(candidate.as_bytes(), credential.hash.as_bytes())
}

fn digest_password(salt: &str, password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(salt.as_bytes());
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

/// Token format: `<hotel ulid>.<hex mac>`. The mac covers the password hash, so
/// a password change invalidates every outstanding token.
pub fn issue_token(secret: &str, hotel_id: Ulid, credential: &Credential) -> String {
    format!("{hotel_id}.{}", token_mac(secret, hotel_id, credential))
}

/// Split a token into its hotel id and mac without verifying it.
pub fn parse_token(token: &str) -> Option<(Ulid, &str)> {
    let (id, mac) = token.split_once('.')?;
    let id = Ulid::from_string(id).ok()?;
    if mac.is_empty() {
        return None;
    }
    Some((id, mac))
}

pub fn verify_token_mac(secret: &str, hotel_id: Ulid, credential: &Credential, mac: &str) -> bool {
    let expected = token_mac(secret, hotel_id, credential);
    constant_time_eq(expected.as_bytes(), mac.as_bytes())
}

fn token_mac(secret: &str, hotel_id: Ulid, credential: &Credential) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hasher.update(hotel_id.to_string().as_bytes());
    hasher.update(credential.hash.as_bytes());
    hex::encode(hasher.finalize())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
