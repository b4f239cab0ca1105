use std::sync::Arc;

use bcrypt::{BcryptError, hash, verify};

use crate::error::HashingError;

/// PasswordHasher
///
/// One-way, salted password hashing. Implementations must produce self-describing hashes
/// (salt and cost embedded) so `verify` needs nothing but the stored string.
///
/// Both methods are CPU-bound and synchronous; async callers go through
/// [`hash_blocking`] / [`verify_blocking`].
pub trait PasswordHasher: Send + Sync {
    fn hash(&self, raw: &str) -> Result<String, BcryptError>;
    fn verify(&self, raw: &str, hashed: &str) -> Result<bool, BcryptError>;
}

pub type HasherState = Arc<dyn PasswordHasher>;

/// BcryptHasher
///
/// bcrypt with a configurable work factor. Produces `$2b$<cost>$<salt+hash>` strings.
#[derive(Debug, Clone, Copy)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost }
    }

    pub fn cost(&self) -> u32 {
        self.cost
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, raw: &str) -> Result<String, BcryptError> {
        hash(raw, self.cost)
    }

    fn verify(&self, raw: &str, hashed: &str) -> Result<bool, BcryptError> {
        verify(raw, hashed)
    }
}

/// Hashes on the blocking pool so the request dispatcher is never stalled by bcrypt.
pub async fn hash_blocking(hasher: &HasherState, raw: &str) -> Result<String, HashingError> {
    let hasher = Arc::clone(hasher);
    let raw = raw.to_owned();
    Ok(tokio::task::spawn_blocking(move || hasher.hash(&raw)).await??)
}

/// Verifies on the blocking pool. A malformed stored hash is an error, not a mismatch.
pub async fn verify_blocking(
    hasher: &HasherState,
    raw: &str,
    hashed: &str,
) -> Result<bool, HashingError> {
    let hasher = Arc::clone(hasher);
    let raw = raw.to_owned();
    let hashed = hashed.to_owned();
    Ok(tokio::task::spawn_blocking(move || hasher.verify(&raw, &hashed)).await??)
}
