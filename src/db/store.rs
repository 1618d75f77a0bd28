use async_trait::async_trait;
use std::sync::Arc;

use crate::db::models::{Account, NewAccount};
use crate::error::GateError;

/// Key-value-by-username account storage. Every method is atomic at the
/// single-record level.
#[async_trait]
pub trait AccountStore: Send + Sync {
    async fn find(&self, username: &str) -> Result<Option<Account>, GateError>;

    /// Insert a new account. Fails with `DuplicateAccount` if the name is taken.
    async fn insert(&self, account: NewAccount) -> Result<(), GateError>;

    /// Overwrite the credit balance. Returns `false` if no such account exists.
    async fn set_credits(&self, username: &str, credits: i64) -> Result<bool, GateError>;

    /// Decrement credits by one if and only if they are positive.
    /// Returns the remaining balance, or `None` when the precondition failed.
    async fn consume_credit(&self, username: &str) -> Result<Option<i64>, GateError>;
}

pub type DynAccountStore = Arc<dyn AccountStore>;
