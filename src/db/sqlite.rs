use crate::db::models::{Account, NewAccount};
use crate::db::schema::SQLITE_INIT;
use crate::db::store::AccountStore;
use crate::error::GateError;
use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub type SqlitePool = Pool<Sqlite>;

const ACCOUNT_COLUMNS: &str = "username, password_hash, credits, created_at, updated_at";

#[derive(Clone)]
pub struct AccountsStorage {
    pool: SqlitePool,
}

impl AccountsStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if missing) the database at `database_url` and apply the schema.
    pub async fn connect(database_url: &str) -> Result<Self, GateError> {
        let connect_opts = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .connect_with(connect_opts)
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    /// Single-connection in-memory database; the connection is never recycled
    /// so the data lives as long as the pool.
    pub async fn in_memory() -> Result<Self, GateError> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(connect_opts)
            .await?;
        let storage = Self::new(pool);
        storage.init_schema().await?;
        Ok(storage)
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Initialize the schema by executing the bundled DDL.
    pub async fn init_schema(&self) -> Result<(), GateError> {
        // sqlx::query runs one statement at a time
        for stmt in SQLITE_INIT.split(';') {
            let s = stmt.trim();
            if s.is_empty() {
                continue;
            }
            sqlx::query(s).execute(&self.pool).await?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl AccountStore for AccountsStorage {
    async fn find(&self, username: &str) -> Result<Option<Account>, GateError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE username = ?"
        ))
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(account)
    }

    async fn insert(&self, account: NewAccount) -> Result<(), GateError> {
        let now = Utc::now();
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (username, password_hash, credits, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&account.username)
        .bind(&account.password_hash)
        .bind(account.credits)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                debug!(username = %account.username, "insert lost a registration race");
                Err(GateError::DuplicateAccount)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn set_credits(&self, username: &str, credits: i64) -> Result<bool, GateError> {
        let result =
            sqlx::query("UPDATE accounts SET credits = ?, updated_at = ? WHERE username = ?")
                .bind(credits)
                .bind(Utc::now())
                .bind(username)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn consume_credit(&self, username: &str) -> Result<Option<i64>, GateError> {
        let remaining: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE accounts
               SET credits = credits - 1, updated_at = ?
             WHERE username = ? AND credits > 0
            RETURNING credits
            "#,
        )
        .bind(Utc::now())
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(remaining)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_account(name: &str, credits: i64) -> NewAccount {
        NewAccount {
            username: name.to_string(),
            password_hash: "$argon2id$placeholder".to_string(),
            credits,
        }
    }

    #[tokio::test]
    async fn insert_then_find_round_trips_fields() {
        let storage = AccountsStorage::in_memory().await.unwrap();
        storage.insert(new_account("alice", 10)).await.unwrap();

        let found = storage.find("alice").await.unwrap().expect("account stored");
        assert_eq!(found.username, "alice");
        assert_eq!(found.credits, 10);
        assert_eq!(found.created_at, found.updated_at);
        assert!(storage.find("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn second_insert_is_rejected_without_overwrite() {
        let storage = AccountsStorage::in_memory().await.unwrap();
        storage.insert(new_account("alice", 10)).await.unwrap();

        let err = storage.insert(new_account("alice", 99)).await.unwrap_err();
        assert!(matches!(err, GateError::DuplicateAccount));
        assert_eq!(storage.find("alice").await.unwrap().unwrap().credits, 10);
    }

    #[tokio::test]
    async fn consume_credit_stops_at_zero() {
        let storage = AccountsStorage::in_memory().await.unwrap();
        storage.insert(new_account("alice", 2)).await.unwrap();

        assert_eq!(storage.consume_credit("alice").await.unwrap(), Some(1));
        assert_eq!(storage.consume_credit("alice").await.unwrap(), Some(0));
        assert_eq!(storage.consume_credit("alice").await.unwrap(), None);
        assert_eq!(storage.consume_credit("nobody").await.unwrap(), None);
        assert_eq!(storage.find("alice").await.unwrap().unwrap().credits, 0);
    }

    #[tokio::test]
    async fn set_credits_overwrites_and_reports_missing_rows() {
        let storage = AccountsStorage::in_memory().await.unwrap();
        storage.insert(new_account("alice", 10)).await.unwrap();

        assert!(storage.set_credits("alice", 3).await.unwrap());
        assert_eq!(storage.find("alice").await.unwrap().unwrap().credits, 3);
        assert!(!storage.set_credits("bob", 3).await.unwrap());
    }

    #[tokio::test]
    async fn negative_balance_violates_check_constraint() {
        let storage = AccountsStorage::in_memory().await.unwrap();
        storage.insert(new_account("alice", 1)).await.unwrap();

        let err = storage.set_credits("alice", -1).await.unwrap_err();
        assert!(matches!(err, GateError::DatabaseError(_)));
        assert_eq!(storage.find("alice").await.unwrap().unwrap().credits, 1);
    }
}
