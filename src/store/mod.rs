//! Persistence for subscriptions and their tokens.
//!
//! Handlers only see [`SubscriptionStore`]; the process entry point decides which
//! implementation backs it. [`PgStore`] is the only one shipped with the service.

mod postgres;

use crate::domain::{NewSubscriber, Subscription, Token};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
pub use postgres::{PgStore, MIGRATIONS};
use uuid::Uuid;

#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    async fn find_subscription(&self, id: Uuid) -> Result<Option<Subscription>, StoreError>;

    async fn find_subscription_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError>;

    /// Inserts an unconfirmed subscription together with its confirmation
    /// token; neither is stored if either insert fails.
    /// Fails with [`StoreError::Conflict`] if the email is already subscribed.
    async fn insert_pending_subscription(
        &self,
        new_subscriber: &NewSubscriber,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, Token), StoreError>;

    /// Marks the subscription confirmed, consumes the confirmation token and
    /// issues the unsubscribe token, all or nothing.
    async fn confirm_subscription(
        &self,
        id: Uuid,
        confirmation_token_id: Uuid,
    ) -> Result<Token, StoreError>;

    /// Tokens owned by the subscription go with it.
    async fn delete_subscription(&self, id: Uuid) -> Result<(), StoreError>;

    async fn find_token(&self, value: &str) -> Result<Option<Token>, StoreError>;

    async fn delete_token(&self, id: Uuid) -> Result<(), StoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("A unique constraint was violated: {0}")]
    Conflict(String),
    #[error("Failed to check a connection out of the pool")]
    Pool(#[from] diesel::r2d2::PoolError),
    #[error("Failed to execute query")]
    Query(#[source] diesel::result::Error),
    #[error("The blocking database task did not complete")]
    Join(#[from] tokio::task::JoinError),
    #[error("A stored row could not be read back: {0}")]
    Corrupt(String),
    #[error("Failed to run database migrations: {0}")]
    Migration(String),
}

impl From<diesel::result::Error> for StoreError {
    fn from(e: diesel::result::Error) -> Self {
        use diesel::result::{DatabaseErrorKind, Error};
        match e {
            Error::DatabaseError(DatabaseErrorKind::UniqueViolation, info) => {
                StoreError::Conflict(info.message().to_string())
            }
            other => StoreError::Query(other),
        }
    }
}
