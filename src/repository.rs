use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use sqlx::PgPool;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    error::RepositoryError,
    models::{Account, AccountRow},
};

/// AccountRepository
///
/// Persistence contract for accounts. Absence is `Ok(None)`; `Err` is reserved for store
/// failures and for uniqueness violations detected by the store itself.
///
/// Implementations must enforce username and email uniqueness on `insert` on their own; the
/// service's pre-checks are only an early exit.
#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError>;
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;
    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError>;
    async fn insert(&self, account: Account) -> Result<Account, RepositoryError>;
    /// Removes the account and returns it; `Ok(None)` when it was already gone.
    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError>;
}

/// RepositoryState
///
/// The shared handle stored in `AppState`.
pub type RepositoryState = Arc<dyn AccountRepository>;

const USERNAME_CONSTRAINT: &str = "accounts_username_key";
const EMAIL_CONSTRAINT: &str = "accounts_email_address_key";

const ACCOUNT_COLUMNS: &str =
    "id, username, email_address, password, roles, is_verified, creation_date";

/// PostgresAccountRepository
///
/// `accounts` table backed implementation. Schema: `migrations/`.
pub struct PostgresAccountRepository {
    pool: PgPool,
}

impl PostgresAccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_one_by(
        &self,
        column: &str,
        value: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE {column} = $1");
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_row).transpose()
    }
}

fn decode_row(row: AccountRow) -> Result<Account, RepositoryError> {
    Account::try_from(row).map_err(|e| RepositoryError::Database(sqlx::Error::Decode(Box::new(e))))
}

/// Maps unique-index violations onto the matching duplicate error.
fn map_insert_error(err: sqlx::Error) -> RepositoryError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.is_unique_violation() {
            match db_err.constraint() {
                Some(USERNAME_CONSTRAINT) => return RepositoryError::DuplicateUsername,
                Some(EMAIL_CONSTRAINT) => return RepositoryError::DuplicateEmail,
                _ => {}
            }
        }
    }
    RepositoryError::Database(err)
}

#[async_trait]
impl AccountRepository for PostgresAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let query = format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1");
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_row).transpose()
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        self.fetch_one_by("username", username).await
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        self.fetch_one_by("email_address", email).await
    }

    async fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
        let roles: Vec<String> = account.roles.iter().map(|r| r.as_str().to_string()).collect();
        let query = format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {ACCOUNT_COLUMNS}"
        );

        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(account.id)
            .bind(&account.username)
            .bind(&account.email)
            .bind(&account.password_hash)
            .bind(&roles)
            .bind(account.is_verified)
            .bind(account.creation_date)
            .fetch_one(&self.pool)
            .await
            .map_err(map_insert_error)?;

        decode_row(row)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let query = format!("DELETE FROM accounts WHERE id = $1 RETURNING {ACCOUNT_COLUMNS}");
        let row = sqlx::query_as::<_, AccountRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(decode_row).transpose()
    }
}

/// InMemoryAccountRepository
///
/// Process-local store used by the test-suite and for running without Postgres. Both
/// uniqueness checks and the insert happen under one write lock.
#[derive(Default)]
pub struct InMemoryAccountRepository {
    accounts: RwLock<HashMap<Uuid, Account>>,
}

impl InMemoryAccountRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountRepository for InMemoryAccountRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.username == username)
            .cloned())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email == email)
            .cloned())
    }

    async fn insert(&self, account: Account) -> Result<Account, RepositoryError> {
        let mut accounts = self.accounts.write().await;

        if accounts.values().any(|a| a.username == account.username) {
            return Err(RepositoryError::DuplicateUsername);
        }
        if accounts.values().any(|a| a.email == account.email) {
            return Err(RepositoryError::DuplicateEmail);
        }

        accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn delete_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.write().await.remove(&id))
    }
}
