mod health;
mod home;
mod subscriptions;
mod subscriptions_confirm;
mod subscriptions_unsubscribe;
mod weather_lookup;

pub use health::*;
pub use home::*;
pub use subscriptions::*;
pub use subscriptions_confirm::*;
pub use subscriptions_unsubscribe::*;
pub use weather_lookup::*;

use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::Json;
use rocket::response::Responder;
use rocket::Request;
use std::collections::BTreeMap;

/// Prefix of the links sent out by email, e.g. `https://weather.example.com`.
pub struct ApplicationBaseUrl(pub String);

impl ApplicationBaseUrl {
    pub fn link(&self, path: &str) -> String {
        format!("{}{}", self.0.trim_end_matches('/'), path)
    }
}

#[derive(serde::Serialize)]
pub struct MessageBody {
    pub message: String,
}

impl MessageBody {
    pub fn new(message: impl Into<String>) -> Json<MessageBody> {
        Json(MessageBody {
            message: message.into(),
        })
    }
}

/// Validation failures keyed by the offending field.
#[derive(Debug, Default, serde::Serialize)]
pub struct FieldErrors(BTreeMap<&'static str, Vec<String>>);

impl FieldErrors {
    pub fn single(field: &'static str, reason: String) -> Self {
        let mut errors = Self::default();
        errors.add(field, reason);
        errors
    }

    pub fn add(&mut self, field: &'static str, reason: String) {
        self.0.entry(field).or_default().push(reason);
    }
}

#[derive(serde::Serialize)]
pub struct ErrorBody {
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    errors: Option<FieldErrors>,
    #[serde(skip_serializing_if = "Option::is_none")]
    detail: Option<String>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        ErrorBody {
            message: message.into(),
            errors: None,
            detail: None,
        }
    }

    pub fn with_errors(mut self, errors: FieldErrors) -> Self {
        self.errors = Some(errors);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn respond_with<'r>(
        self,
        request: &'r Request<'_>,
        status: Status,
    ) -> rocket::response::Result<'static> {
        status::Custom(status, Json(self)).respond_to(request)
    }
}

pub fn error_chain_fmt(
    e: &impl std::error::Error,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    writeln!(f, "{}\n", e)?;
    let mut current = e.source();
    while let Some(cause) = current {
        writeln!(f, "Caused by:\n\t{}", cause)?;
        current = cause.source();
    }
    Ok(())
}
