use crate::domain::{TokenKind, TokenValue};
use crate::routes::{error_chain_fmt, ErrorBody, FieldErrors, MessageBody};
use crate::store::SubscriptionStore;
use anyhow::Context;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use std::sync::Arc;
use uuid::Uuid;

#[get("/unsubscribe/<token>")]
#[tracing::instrument(
    name = "Remove a subscription",
    skip_all,
    fields(request_id = %Uuid::new_v4())
)]
pub async fn unsubscribe(
    token: &str,
    store: &State<Arc<dyn SubscriptionStore>>,
) -> Result<Json<MessageBody>, UnsubscribeError> {
    let token = TokenValue::parse(token).map_err(|reason| {
        UnsubscribeError::InvalidTokenFormat(FieldErrors::single("token", reason))
    })?;

    let token = store
        .find_token(token.as_ref())
        .await
        .context("Failed to look up the unsubscribe token.")?
        .ok_or(UnsubscribeError::UnknownToken)?;
    if token.kind != TokenKind::Unsubscribe {
        return Err(UnsubscribeError::WrongTokenType);
    }

    let subscription = store
        .find_subscription(token.subscription_id)
        .await
        .context("Failed to look up the subscription owning the token.")?;
    let Some(subscription) = subscription else {
        store
            .delete_token(token.id)
            .await
            .context("Failed to delete a stale unsubscribe token.")?;
        return Ok(MessageBody::new("Subscription already removed or not found"));
    };

    store
        .delete_subscription(subscription.id)
        .await
        .context("Failed to delete the subscription.")?;
    store
        .delete_token(token.id)
        .await
        .context("Failed to delete a used unsubscribe token.")?;
    tracing::info!(subscription_id = %subscription.id, "Subscription removed");

    Ok(MessageBody::new("Unsubscribed successfully"))
}

#[derive(thiserror::Error)]
pub enum UnsubscribeError {
    #[error("Invalid token format")]
    InvalidTokenFormat(FieldErrors),
    #[error("Token not found")]
    UnknownToken,
    #[error("Invalid token type for unsubscribe operation")]
    WrongTokenType,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for UnsubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for UnsubscribeError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("UnsubscribeError: {:?}", self);
        let (status, body) = match self {
            UnsubscribeError::InvalidTokenFormat(errors) => (
                Status::BadRequest,
                ErrorBody::new("Invalid token format").with_errors(errors),
            ),
            UnsubscribeError::UnknownToken => (Status::NotFound, ErrorBody::new(self.to_string())),
            UnsubscribeError::WrongTokenType => {
                (Status::BadRequest, ErrorBody::new(self.to_string()))
            }
            UnsubscribeError::UnexpectedError(_) => (
                Status::InternalServerError,
                ErrorBody::new("Server error during unsubscribe process"),
            ),
        };
        body.respond_with(request, status)
    }
}
