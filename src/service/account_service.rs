use sha2::{Digest, Sha256};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tracing::{debug, info, warn};
use url::Url;

use crate::db::models::{Account, NewAccount};
use crate::db::store::AccountStore;
use crate::error::GateError;
use crate::service::classifier::{ImageClassifier, Prediction};
use crate::service::credit::CreditReservation;
use crate::service::fetcher::ImageFetcher;
use crate::service::password::PasswordHashing;

pub const DEFAULT_INITIAL_CREDITS: i64 = 10;

/// Proof that the caller presented the right password for this account.
/// Only [`AccountService::authenticate`] can build one.
#[derive(Debug, Clone)]
pub struct AuthenticatedAccount {
    account: Account,
}

impl AuthenticatedAccount {
    pub fn username(&self) -> &str {
        &self.account.username
    }

    /// Balance as read during authentication; may be stale.
    pub fn credits_snapshot(&self) -> i64 {
        self.account.credits
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    pub predictions: Vec<Prediction>,
    pub credits_remaining: i64,
}

/// Registration, authentication, credit accounting and classification.
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn AccountStore>,
    hasher: PasswordHashing,
    fetcher: Arc<dyn ImageFetcher>,
    classifier: Arc<dyn ImageClassifier>,
    admin_digest: [u8; 32],
    initial_credits: i64,
}

impl AccountService {
    pub fn new(
        store: Arc<dyn AccountStore>,
        hasher: PasswordHashing,
        fetcher: Arc<dyn ImageFetcher>,
        classifier: Arc<dyn ImageClassifier>,
        admin_key: &str,
    ) -> Self {
        Self {
            store,
            hasher,
            fetcher,
            classifier,
            admin_digest: secret_digest(admin_key),
            initial_credits: DEFAULT_INITIAL_CREDITS,
        }
    }

    pub fn with_initial_credits(mut self, credits: i64) -> Self {
        self.initial_credits = credits;
        self
    }

    pub async fn register(&self, username: &str, password: &str) -> Result<(), GateError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(GateError::InvalidInput("username is empty".to_string()));
        }
        if password.is_empty() {
            return Err(GateError::InvalidInput("password is empty".to_string()));
        }
        if self.store.find(username).await?.is_some() {
            debug!(username, "registration rejected: name taken");
            return Err(GateError::DuplicateAccount);
        }

        let password_hash = self.hasher.hash(password.to_string()).await?;
        self.store
            .insert(NewAccount {
                username: username.to_string(),
                password_hash,
                credits: self.initial_credits,
            })
            .await?;
        info!(username, credits = self.initial_credits, "account registered");
        Ok(())
    }

    pub async fn authenticate(
        &self,
        username: &str,
        password: &str,
    ) -> Result<AuthenticatedAccount, GateError> {
        let account = self
            .store
            .find(username.trim())
            .await?
            .ok_or(GateError::UnknownAccount)?;

        let matches = self
            .hasher
            .verify(password.to_string(), account.password_hash.clone())
            .await?;
        if !matches {
            warn!(username = %account.username, "password mismatch");
            return Err(GateError::InvalidCredentials);
        }
        Ok(AuthenticatedAccount { account })
    }

    /// Check the current balance without spending it.
    pub async fn reserve_credit(
        &self,
        account: &AuthenticatedAccount,
    ) -> Result<CreditReservation, GateError> {
        let current = self
            .store
            .find(account.username())
            .await?
            .ok_or(GateError::UnknownAccount)?;
        if current.credits <= 0 {
            debug!(username = %current.username, "no credits left");
            return Err(GateError::CreditsExhausted);
        }
        Ok(CreditReservation::new(current.username, current.credits))
    }

    /// Fetch and classify `url`, spending one credit only if both steps succeed.
    pub async fn classify(
        &self,
        account: &AuthenticatedAccount,
        url: &str,
    ) -> Result<Classification, GateError> {
        let url = parse_image_url(url)?;
        let reservation = self.reserve_credit(account).await?;

        let image = self.fetcher.fetch(&url).await.inspect_err(|e| {
            warn!(username = account.username(), %url, error = %e, "image fetch failed");
        })?;
        let predictions = self.classifier.classify(image).await.inspect_err(|e| {
            warn!(username = account.username(), %url, error = %e, "inference failed");
        })?;

        let credits_remaining = reservation.commit(self.store.as_ref()).await.inspect_err(|_| {
            warn!(
                username = account.username(),
                "balance drained by a concurrent request before commit"
            );
        })?;
        info!(
            username = account.username(),
            labels = predictions.len(),
            credits_remaining,
            "image classified"
        );
        Ok(Classification {
            predictions,
            credits_remaining,
        })
    }

    /// Overwrite an account's balance. Requires the shared admin secret.
    pub async fn refill(
        &self,
        username: &str,
        admin_secret: &str,
        amount: i64,
    ) -> Result<i64, GateError> {
        let username = username.trim();
        if self.store.find(username).await?.is_none() {
            debug!(username, "refill rejected: unknown account");
            return Err(GateError::UnknownAccount);
        }
        if !self.admin_secret_matches(admin_secret) {
            warn!(username, "refill rejected: bad admin secret");
            return Err(GateError::NotAuthorized);
        }
        if amount < 0 {
            return Err(GateError::InvalidInput(
                "amount must not be negative".to_string(),
            ));
        }
        if !self.store.set_credits(username, amount).await? {
            return Err(GateError::UnknownAccount);
        }
        info!(username, credits = amount, "account refilled");
        Ok(amount)
    }

    // Digests are fixed width, so the compare does not depend on the secret's length.
    fn admin_secret_matches(&self, supplied: &str) -> bool {
        bool::from(secret_digest(supplied)[..].ct_eq(&self.admin_digest[..]))
    }
}

fn secret_digest(secret: &str) -> [u8; 32] {
    let mut out = [0u8; 32];
    out.copy_from_slice(&Sha256::digest(secret.as_bytes()));
    out
}

fn parse_image_url(raw: &str) -> Result<Url, GateError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(GateError::InvalidInput("url is empty".to_string()));
    }
    let url = Url::parse(raw).map_err(|e| GateError::InvalidInput(format!("url: {e}")))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(GateError::InvalidInput(format!(
            "unsupported url scheme `{other}`"
        ))),
    }
}
