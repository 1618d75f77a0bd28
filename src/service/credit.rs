use crate::db::store::AccountStore;
use crate::error::GateError;

/// One credit provisionally committed to a request.
///
/// Nothing is written when the reservation is taken; `commit` performs the
/// conditional decrement. Dropping an uncommitted reservation releases it.
#[derive(Debug)]
#[must_use = "a reservation only spends a credit when committed"]
pub struct CreditReservation {
    username: String,
    observed: i64,
}

impl CreditReservation {
    pub(crate) fn new(username: String, observed: i64) -> Self {
        Self { username, observed }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    /// Balance seen when the reservation was taken.
    pub fn observed_credits(&self) -> i64 {
        self.observed
    }

    /// Spend the credit. Fails with `CreditsExhausted` when a concurrent
    /// request drained the balance after this reservation was taken.
    pub async fn commit(self, store: &dyn AccountStore) -> Result<i64, GateError> {
        store
            .consume_credit(&self.username)
            .await?
            .ok_or(GateError::CreditsExhausted)
    }
}
