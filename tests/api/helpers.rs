use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use once_cell::sync::Lazy;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;
use weather_subscriptions::configuration::{get_configuration, Settings};
use weather_subscriptions::domain::{
    NewSubscriber, NewToken, SubscriberEmail, Subscription, Token, TokenKind,
};
use weather_subscriptions::email::EmailClient;
use weather_subscriptions::mail_domain::{MailDomainStatus, MxResolver};
use weather_subscriptions::startup::{Application, Collaborators};
use weather_subscriptions::store::{StoreError, SubscriptionStore};
use weather_subscriptions::telemetry::{get_subscriber, init_subscriber};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

static TRACING: Lazy<()> = Lazy::new(|| {
    let default_filter_level = "info".into();
    let subscriber_name = "test".into();
    if std::env::var("TEST_LOG").is_ok() {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::stdout);
        init_subscriber(subscriber).expect("Failed to set up logging.");
    } else {
        let subscriber = get_subscriber(subscriber_name, default_filter_level, std::io::sink);
        init_subscriber(subscriber).expect("Failed to set up logging.");
    };
});

#[derive(Default)]
struct StoreState {
    subscriptions: Vec<Subscription>,
    tokens: Vec<Token>,
}

/// Keeps rows in memory and enforces the same unique constraints as the
/// database schema.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
    hide_existing_subscriptions: AtomicBool,
    failing: AtomicBool,
    failing_token_inserts: AtomicBool,
    confirm_calls: AtomicUsize,
}

impl InMemoryStore {
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.state.lock().unwrap().tokens.clone()
    }

    pub fn tokens_of_kind(&self, kind: TokenKind) -> Vec<Token> {
        self.tokens().into_iter().filter(|t| t.kind == kind).collect()
    }

    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    /// Lookups by email miss, as if another request inserted the row after
    /// this one checked.
    pub fn hide_existing_subscriptions(&self) {
        self.hide_existing_subscriptions.store(true, Ordering::SeqCst);
    }

    /// Every later call fails, as if the database went away.
    pub fn fail_every_query(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    /// Token inserts fail, including the one paired with a new subscription.
    pub fn fail_token_inserts(&self) {
        self.failing_token_inserts.store(true, Ordering::SeqCst);
    }

    fn available(&self) -> Result<(), StoreError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("the store is unavailable".into()));
        }
        Ok(())
    }

    fn accepting_tokens(&self) -> Result<(), StoreError> {
        self.available()?;
        if self.failing_token_inserts.load(Ordering::SeqCst) {
            return Err(StoreError::Corrupt("the tokens table is unavailable".into()));
        }
        Ok(())
    }

    /// Stores an extra token next to whatever the flows created.
    pub fn add_token(&self, new_token: &NewToken) -> Token {
        let token = stored(new_token, Utc::now());
        self.state.lock().unwrap().tokens.push(token.clone());
        token
    }

    pub fn expire_token(&self, value: &str) {
        let mut state = self.state.lock().unwrap();
        let token = state
            .tokens
            .iter_mut()
            .find(|t| t.value == value)
            .expect("No token with this value.");
        token.expires_at = Some(Utc::now() - Duration::hours(1));
    }

    /// Drops the subscription row but leaves its tokens behind.
    pub fn remove_subscription_only(&self, id: Uuid) {
        let mut state = self.state.lock().unwrap();
        state.subscriptions.retain(|s| s.id != id);
    }
}

#[async_trait]
impl SubscriptionStore for InMemoryStore {
    async fn find_subscription(&self, id: Uuid) -> Result<Option<Subscription>, StoreError> {
        self.available()?;
        let state = self.state.lock().unwrap();
        Ok(state.subscriptions.iter().find(|s| s.id == id).cloned())
    }

    async fn find_subscription_by_email(
        &self,
        email: &str,
    ) -> Result<Option<Subscription>, StoreError> {
        self.available()?;
        if self.hide_existing_subscriptions.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let state = self.state.lock().unwrap();
        Ok(state.subscriptions.iter().find(|s| s.email == email).cloned())
    }

    async fn insert_pending_subscription(
        &self,
        new_subscriber: &NewSubscriber,
        now: DateTime<Utc>,
    ) -> Result<(Subscription, Token), StoreError> {
        self.available()?;
        let mut state = self.state.lock().unwrap();
        let email = new_subscriber.email.as_ref();
        if state.subscriptions.iter().any(|s| s.email == email) {
            return Err(StoreError::Conflict(format!(
                "Key (email)=({}) already exists.",
                email
            )));
        }
        self.accepting_tokens()?;
        let subscription = Subscription {
            id: Uuid::new_v4(),
            email: email.to_string(),
            city: new_subscriber.city.as_ref().to_string(),
            frequency: new_subscriber.frequency,
            confirmed: false,
            created_at: now,
            updated_at: now,
        };
        let token = stored(&NewToken::confirmation(subscription.id, now), now);
        state.subscriptions.push(subscription.clone());
        state.tokens.push(token.clone());
        Ok((subscription, token))
    }

    async fn confirm_subscription(
        &self,
        id: Uuid,
        confirmation_token_id: Uuid,
    ) -> Result<Token, StoreError> {
        self.available()?;
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.accepting_tokens()?;
        let now = Utc::now();
        let mut state = self.state.lock().unwrap();
        if let Some(subscription) = state.subscriptions.iter_mut().find(|s| s.id == id) {
            subscription.confirmed = true;
            subscription.updated_at = now;
        }
        state.tokens.retain(|t| t.id != confirmation_token_id);
        let token = stored(&NewToken::unsubscribe(id), now);
        state.tokens.push(token.clone());
        Ok(token)
    }

    async fn delete_subscription(&self, id: Uuid) -> Result<(), StoreError> {
        self.available()?;
        let mut state = self.state.lock().unwrap();
        state.subscriptions.retain(|s| s.id != id);
        state.tokens.retain(|t| t.subscription_id != id);
        Ok(())
    }

    async fn find_token(&self, value: &str) -> Result<Option<Token>, StoreError> {
        self.available()?;
        let state = self.state.lock().unwrap();
        Ok(state.tokens.iter().find(|t| t.value == value).cloned())
    }

    async fn delete_token(&self, id: Uuid) -> Result<(), StoreError> {
        self.available()?;
        let mut state = self.state.lock().unwrap();
        state.tokens.retain(|t| t.id != id);
        Ok(())
    }
}

fn stored(new_token: &NewToken, now: DateTime<Utc>) -> Token {
    Token {
        id: Uuid::new_v4(),
        subscription_id: new_token.subscription_id,
        value: new_token.value.as_ref().to_string(),
        kind: new_token.kind,
        expires_at: new_token.expires_at,
        created_at: now,
    }
}

#[derive(Debug, Clone)]
pub struct SentEmail {
    pub recipient: String,
    pub subject: String,
    pub html_content: String,
    pub text_content: String,
}

#[derive(Default)]
pub struct MockEmailClient {
    pub sent_emails: Mutex<Vec<SentEmail>>,
    failing: AtomicBool,
}

impl MockEmailClient {
    pub fn fail_every_send(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent_emails.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailClient for MockEmailClient {
    async fn send_email(
        &self,
        recipient: &SubscriberEmail,
        subject: &str,
        html_content: &str,
        text_content: &str,
    ) -> Result<(), anyhow::Error> {
        if self.failing.load(Ordering::SeqCst) {
            anyhow::bail!("The mail server rejected the message");
        }
        self.sent_emails.lock().unwrap().push(SentEmail {
            recipient: recipient.as_ref().to_string(),
            subject: subject.to_string(),
            html_content: html_content.to_string(),
            text_content: text_content.to_string(),
        });
        Ok(())
    }
}

pub struct StubMxResolver {
    status: Mutex<MailDomainStatus>,
}

impl Default for StubMxResolver {
    fn default() -> Self {
        StubMxResolver {
            status: Mutex::new(MailDomainStatus::AcceptsMail),
        }
    }
}

impl StubMxResolver {
    pub fn answer_with(&self, status: MailDomainStatus) {
        *self.status.lock().unwrap() = status;
    }
}

#[async_trait]
impl MxResolver for StubMxResolver {
    async fn mail_domain_status(&self, _domain: &str) -> Result<MailDomainStatus, anyhow::Error> {
        Ok(*self.status.lock().unwrap())
    }
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub store: Arc<InMemoryStore>,
    pub email_client: Arc<MockEmailClient>,
    pub mx_resolver: Arc<StubMxResolver>,
    pub weather_server: MockServer,
    pub api_client: reqwest::Client,
}

impl TestApp {
    pub async fn post_subscriptions(&self, body: String) -> reqwest::Response {
        self.api_client
            .post(&format!("{}/api/subscribe", &self.address))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_weather(&self, query: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/weather{}", &self.address, query))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_confirm(&self, token: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/confirm/{}", &self.address, token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    pub async fn get_unsubscribe(&self, token: &str) -> reqwest::Response {
        self.api_client
            .get(&format!("{}/api/unsubscribe/{}", &self.address, token))
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Answers every lookup with the current conditions of `city`.
    pub async fn weather_api_knows(&self, city: &str) {
        Mock::given(method("GET"))
            .and(path("/v1/current.json"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "location": { "name": city },
                "current": {
                    "temp_c": 15.0,
                    "humidity": 70,
                    "condition": { "text": "Partly cloudy" }
                }
            })))
            .mount(&self.weather_server)
            .await;
    }

    pub async fn weather_api_answers(&self, status: u16, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path("/v1/current.json"))
            .respond_with(ResponseTemplate::new(status).set_body_json(body))
            .mount(&self.weather_server)
            .await;
    }

    /// Subscribes `ursula_le_guin@gmail.com` and returns the confirmation link.
    pub async fn subscribe_and_get_confirmation_link(&self) -> reqwest::Url {
        self.weather_api_knows("London").await;
        let response = self
            .post_subscriptions(
                "email=ursula_le_guin%40gmail.com&city=London&frequency=daily".into(),
            )
            .await;
        assert_eq!(200, response.status().as_u16());
        let emails = self.email_client.sent();
        let email = emails.last().expect("No email was sent.");
        self.get_link(email)
    }

    /// The single link of the plain text body, pointed at this app's port.
    pub fn get_link(&self, email: &SentEmail) -> reqwest::Url {
        let links: Vec<_> = linkify::LinkFinder::new()
            .links(&email.text_content)
            .filter(|l| *l.kind() == linkify::LinkKind::Url)
            .collect();
        assert_eq!(links.len(), 1);
        let raw_link = links[0].as_str().to_owned();
        let mut link = reqwest::Url::parse(&raw_link).unwrap();
        assert_eq!(link.host_str().unwrap(), "127.0.0.1");
        link.set_port(Some(self.port)).unwrap();
        link
    }
}

pub fn token_of(link: &reqwest::Url) -> String {
    link.path_segments()
        .and_then(|segments| segments.last())
        .expect("The link has no token.")
        .to_string()
}

pub async fn spawn_app() -> TestApp {
    spawn_app_with(|_| {}).await
}

/// Like [`spawn_app`], with a chance to adjust the configuration after the
/// test defaults are applied.
pub async fn spawn_app_with(customise: impl FnOnce(&mut Settings)) -> TestApp {
    Lazy::force(&TRACING);

    let weather_server = MockServer::start().await;
    let configuration = {
        let mut c = get_configuration().expect("Failed to read configuration.");
        c.application.port = 0;
        c.application.base_url = "http://127.0.0.1".into();
        c.weather_api.base_url = weather_server.uri();
        c.weather_api.api_key = secrecy::Secret::new("test-key".into());
        customise(&mut c);
        c
    };

    let store = Arc::new(InMemoryStore::default());
    let email_client = Arc::new(MockEmailClient::default());
    let mx_resolver = Arc::new(StubMxResolver::default());
    let collaborators = Collaborators {
        store: store.clone(),
        email_client: email_client.clone(),
        mx_resolver: mx_resolver.clone(),
    };

    let app = Application::build(&configuration, collaborators)
        .await
        .expect("Failed to build application.");
    let port = app.port;
    let _ = tokio::spawn(app.server.launch());
    let port = port.get().await.expect("The server did not start.");

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        port,
        store,
        email_client,
        mx_resolver,
        weather_server,
        api_client: reqwest::Client::new(),
    }
}

pub fn expires_in_a_day(token: &Token) -> bool {
    let expires_at = token.expires_at.expect("The token never expires.");
    let remaining = expires_at - Utc::now();
    remaining > Duration::hours(23) && remaining <= Duration::hours(24)
}
