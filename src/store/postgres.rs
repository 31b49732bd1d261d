use crate::configuration::DatabaseSettings;
use crate::domain::{NewSubscriber, NewToken, Subscription, Token};
use crate::models;
use crate::store::{StoreError, SubscriptionStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{Connection, ExpressionMethods, OptionalExtension, PgConnection, QueryDsl, QueryResult};
use diesel::{RunQueryDsl, SelectableHelper};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use secrecy::ExposeSecret;
use std::time::Duration;
use uuid::Uuid;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

type PgPool = Pool<ConnectionManager<PgConnection>>;

/// Diesel-backed store. Every query runs on the blocking thread pool with a
/// pooled connection.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn connect(settings: &DatabaseSettings) -> Result<PgStore, StoreError> {
        let manager =
            ConnectionManager::<PgConnection>::new(settings.connection_string().expose_secret());
        let pool = Pool::builder()
            .max_size(settings.max_connections)
            .connection_timeout(Duration::from_secs(5))
            .build(manager)?;
        Ok(PgStore { pool })
    }

    #[tracing::instrument(name = "Running database migrations", skip(self))]
    pub async fn run_migrations(&self) -> Result<(), StoreError> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            let mut conn = pool.get()?;
            let applied = conn
                .run_pending_migrations(MIGRATIONS)
                .map_err(|e| StoreError::Migration(e.to_string()))?;
            tracing::info!(applied = applied.len(), "Database schema is up to date");
            Ok(())
        })
        .await?
    }

    async fn run<F, T>(&self, query: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut PgConnection) -> QueryResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || -> Result<T, StoreError> {
            let mut conn = pool.get()?;
            query(&mut conn).map_err(|e| {
                tracing::error!("Failed to execute query: {:?}", e);
                StoreError::from(e)
            })
        })
        .await?
    }
}

#[async_trait]
impl SubscriptionStore for PgStore {
    #[tracing::instrument(name = "Get subscription by id", skip(self))]
    async fn find_subscription(&self, id: Uuid) -> Result<Option<Subscription>, StoreError> {
        use crate::schema::subscriptions;
        let row = self
            .run(move |c| {
                subscriptions::table
                    .find(id)
                    .select(models::Subscription::as_select())
                    .first(c)
                    .optional()
            })
            .await?;
        row.map(Subscription::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    #[tracing::instrument(name = "Get subscription by email", skip(self))]
    async fn find_subscription_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        use crate::schema::subscriptions;
        let email = email.to_string();
        let row = self
            .run(move |c| {
                subscriptions::table
                    .filter(subscriptions::email.eq(email))
                    .select(models::Subscription::as_select())
                    .first(c)
                    .optional()
            })
            .await?;
        row.map(Subscription::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    #[tracing::instrument(
        name = "Saving new subscriber details in the database",
        skip(self, new_subscriber)
    )]
    async fn insert_pending_subscription(
        &self,
        new_subscriber: &NewSubscriber,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, Token), StoreError> {
        use crate::schema::{subscriptions, tokens};
        let subscription_id = Uuid::new_v4();
        let confirmation = NewToken::confirmation(subscription_id, now);
        let email = new_subscriber.email.as_ref().to_string();
        let city = new_subscriber.city.as_ref().to_string();
        let frequency = new_subscriber.frequency.as_str();
        let (subscription, token) = self
            .run(move |c| {
                c.transaction::<_, diesel::result::Error, _>(|c| {
                    let subscription = diesel::insert_into(subscriptions::table)
                        .values(models::NewSubscription {
                            id: &subscription_id,
                            email: &email,
                            city: &city,
                            frequency,
                            confirmed: false,
                            created_at: &now,
                            updated_at: &now,
                        })
                        .returning(models::Subscription::as_returning())
                        .get_result(c)?;
                    let token = diesel::insert_into(tokens::table)
                        .values(models::NewToken {
                            id: &Uuid::new_v4(),
                            subscription_id: &subscription_id,
                            token: confirmation.value.as_ref(),
                            token_type: confirmation.kind.as_str(),
                            expires_at: confirmation.expires_at.as_ref(),
                            created_at: &now,
                            updated_at: &now,
                        })
                        .returning(models::Token::as_returning())
                        .get_result(c)?;
                    Ok((subscription, token))
                })
            })
            .await?;
        Ok((
            Subscription::try_from(subscription).map_err(StoreError::Corrupt)?,
            Token::try_from(token).map_err(StoreError::Corrupt)?,
        ))
    }

    #[tracing::instrument(name = "Mark subscriber as confirmed", skip(self))]
    async fn confirm_subscription(
        &self,
        subscription_id: Uuid,
        confirmation_token_id: Uuid,
    ) -> Result<Token, StoreError> {
        use crate::schema::{subscriptions, tokens};
        let unsubscribe = NewToken::unsubscribe(subscription_id);
        let row = self
            .run(move |c| {
                c.transaction::<_, diesel::result::Error, _>(|c| {
                    let now = Utc::now();
                    diesel::update(subscriptions::table.find(subscription_id))
                        .set((
                            subscriptions::confirmed.eq(true),
                            subscriptions::updated_at.eq(now),
                        ))
                        .execute(c)?;
                    diesel::delete(tokens::table.find(confirmation_token_id)).execute(c)?;
                    diesel::insert_into(tokens::table)
                        .values(models::NewToken {
                            id: &Uuid::new_v4(),
                            subscription_id: &subscription_id,
                            token: unsubscribe.value.as_ref(),
                            token_type: unsubscribe.kind.as_str(),
                            expires_at: None,
                            created_at: &now,
                            updated_at: &now,
                        })
                        .returning(models::Token::as_returning())
                        .get_result(c)
                })
            })
            .await?;
        Token::try_from(row).map_err(StoreError::Corrupt)
    }

    #[tracing::instrument(name = "Delete subscription", skip(self))]
    async fn delete_subscription(&self, subscription_id: Uuid) -> Result<(), StoreError> {
        use crate::schema::subscriptions::dsl::*;
        self.run(move |c| {
            diesel::delete(subscriptions.filter(id.eq(subscription_id)))
                .execute(c)
                .map(|_| ())
        })
        .await
    }

    #[tracing::instrument(name = "Get token by value", skip_all)]
    async fn find_token(&self, value: &str) -> Result<Option<Token>, StoreError> {
        use crate::schema::tokens;
        let value = value.to_string();
        let row = self
            .run(move |c| {
                tokens::table
                    .filter(tokens::token.eq(value))
                    .select(models::Token::as_select())
                    .first(c)
                    .optional()
            })
            .await?;
        row.map(Token::try_from)
            .transpose()
            .map_err(StoreError::Corrupt)
    }

    #[tracing::instrument(name = "Delete token", skip(self))]
    async fn delete_token(&self, token_id: Uuid) -> Result<(), StoreError> {
        use crate::schema::tokens::dsl::*;
        self.run(move |c| {
            diesel::delete(tokens.filter(id.eq(token_id)))
                .execute(c)
                .map(|_| ())
        })
        .await
    }
}
