use uuid::Uuid;

use crate::{
    error::{CredentialError, RepositoryError},
    models::{Account, Role},
    password::{self, HasherState},
    repository::RepositoryState,
};

/// CredentialService
///
/// Turns registration requests into persisted accounts. Collaborators are passed in by the
/// caller; the service holds no other state and is cheap to clone.
#[derive(Clone)]
pub struct CredentialService {
    repo: RepositoryState,
    hasher: HasherState,
}

impl CredentialService {
    pub fn new(repo: RepositoryState, hasher: HasherState) -> Self {
        Self { repo, hasher }
    }

    /// register
    ///
    /// Checks username then email for conflicts, hashes the password and stores a new,
    /// unverified account holding `role`.
    ///
    /// Both checks run before anything is written. They are not atomic with the insert: the
    /// store's unique constraints decide the race, and a conflict reported by `insert` comes
    /// back as the same `DuplicateUsername` / `DuplicateEmail`.
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        raw_password: &str,
        role: Role,
    ) -> Result<Account, CredentialError> {
        if self.repo.find_by_username(username).await?.is_some() {
            tracing::info!(username, "registration rejected: username taken");
            return Err(CredentialError::DuplicateUsername);
        }

        if self.repo.find_by_email(email).await?.is_some() {
            tracing::info!(username, "registration rejected: email in use");
            return Err(CredentialError::DuplicateEmail);
        }

        let password_hash = password::hash_blocking(&self.hasher, raw_password).await?;

        let account = Account::new(username, email, password_hash, [role]);

        let saved = self.repo.insert(account).await.inspect_err(|e| {
            if matches!(e, RepositoryError::DuplicateUsername | RepositoryError::DuplicateEmail) {
                tracing::warn!(username, "registration lost a uniqueness race: {e}");
            }
        })?;

        tracing::info!(account_id = %saved.id, username, %role, "account registered");
        Ok(saved)
    }

    pub async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        self.repo.find_by_username(username).await
    }

    pub async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        self.repo.find_by_email(email).await
    }

    /// Idempotent: deleting an absent id is `Ok(None)`, every time.
    pub async fn delete_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let deleted = self.repo.delete_by_id(id).await?;
        match &deleted {
            Some(account) => tracing::info!(account_id = %id, username = %account.username, "account deleted"),
            None => tracing::debug!(account_id = %id, "delete requested for unknown account"),
        }
        Ok(deleted)
    }
}
