use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use std::fmt::Write;
use uuid::Uuid;

const TOKEN_BYTES: usize = 32;
const TOKEN_LENGTH: usize = TOKEN_BYTES * 2;

/// How long a confirmation link stays valid, in hours.
pub const CONFIRMATION_TOKEN_TTL_HOURS: i64 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Confirmation,
    Unsubscribe,
}

impl TokenKind {
    pub fn parse(s: &str) -> Result<TokenKind, String> {
        match s {
            "confirmation" => Ok(Self::Confirmation),
            "unsubscribe" => Ok(Self::Unsubscribe),
            other => Err(format!("{} is not a known token type.", other)),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Confirmation => "confirmation",
            TokenKind::Unsubscribe => "unsubscribe",
        }
    }
}

/// 32 random bytes, hex encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValue(String);

impl TokenValue {
    pub fn generate() -> TokenValue {
        let bytes: [u8; TOKEN_BYTES] = rand::thread_rng().gen();
        let mut value = String::with_capacity(TOKEN_LENGTH);
        for byte in bytes {
            // writing to a String cannot fail
            let _ = write!(value, "{:02x}", byte);
        }
        Self(value)
    }

    pub fn parse(s: &str) -> Result<TokenValue, String> {
        if s.len() == TOKEN_LENGTH && s.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(Self(s.to_ascii_lowercase()))
        } else {
            Err(format!(
                "Token must be a {}-character hex string",
                TOKEN_LENGTH
            ))
        }
    }
}

impl AsRef<str> for TokenValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TokenValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone)]
pub struct Token {
    pub id: Uuid,
    pub subscription_id: Uuid,
    pub value: String,
    pub kind: TokenKind,
    pub expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Token {
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |expires_at| expires_at < now)
    }
}

pub struct NewToken {
    pub subscription_id: Uuid,
    pub value: TokenValue,
    pub kind: TokenKind,
    pub expires_at: Option<DateTime<Utc>>,
}

impl NewToken {
    pub fn confirmation(subscription_id: Uuid, now: DateTime<Utc>) -> NewToken {
        NewToken {
            subscription_id,
            value: TokenValue::generate(),
            kind: TokenKind::Confirmation,
            expires_at: Some(now + Duration::hours(CONFIRMATION_TOKEN_TTL_HOURS)),
        }
    }

    pub fn unsubscribe(subscription_id: Uuid) -> NewToken {
        NewToken {
            subscription_id,
            value: TokenValue::generate(),
            kind: TokenKind::Unsubscribe,
            expires_at: None,
        }
    }
}
