use crate::domain::{SubscriberEmail, TokenKind, TokenValue};
use crate::email::EmailClient;
use crate::routes::{error_chain_fmt, ApplicationBaseUrl, ErrorBody, FieldErrors, MessageBody};
use crate::store::SubscriptionStore;
use anyhow::Context;
use chrono::Utc;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use std::sync::Arc;
use uuid::Uuid;

#[get("/confirm/<token>")]
#[tracing::instrument(
    name = "Confirm a pending subscriber",
    skip_all,
    fields(request_id = %Uuid::new_v4())
)]
pub async fn confirm(
    token: &str,
    store: &State<Arc<dyn SubscriptionStore>>,
    email_client: &State<Arc<dyn EmailClient>>,
    base_url: &State<ApplicationBaseUrl>,
) -> Result<Json<MessageBody>, ConfirmError> {
    let token = TokenValue::parse(token)
        .map_err(|reason| ConfirmError::InvalidTokenFormat(FieldErrors::single("token", reason)))?;

    let token = store
        .find_token(token.as_ref())
        .await
        .context("Failed to look up the confirmation token.")?
        .ok_or(ConfirmError::UnknownToken)?;
    if token.kind != TokenKind::Confirmation {
        return Err(ConfirmError::WrongTokenType);
    }
    if token.is_expired_at(Utc::now()) {
        store
            .delete_token(token.id)
            .await
            .context("Failed to delete an expired confirmation token.")?;
        return Err(ConfirmError::ExpiredToken);
    }

    let subscription = store
        .find_subscription(token.subscription_id)
        .await
        .context("Failed to look up the subscription owning the token.")?
        .ok_or(ConfirmError::UnknownSubscription)?;

    if subscription.confirmed {
        store
            .delete_token(token.id)
            .await
            .context("Failed to delete a redundant confirmation token.")?;
        return Ok(MessageBody::new("Subscription already confirmed"));
    }

    let unsubscribe_token = store
        .confirm_subscription(subscription.id, token.id)
        .await
        .context("Failed to mark the subscription as confirmed.")?;

    match SubscriberEmail::parse(subscription.email) {
        Ok(recipient) => {
            if let Err(e) = send_unsubscribe_link(
                email_client.inner().as_ref(),
                &recipient,
                base_url,
                &unsubscribe_token.value,
            )
            .await
            {
                tracing::error!(
                    error.cause_chain = ?e,
                    subscription_id = %subscription.id,
                    "Failed to send the unsubscribe link"
                );
            }
        }
        Err(error) => {
            tracing::warn!(
                error,
                subscription_id = %subscription.id,
                "Skipping the unsubscribe email. The stored contact details are invalid"
            );
        }
    }

    Ok(MessageBody::new("Subscription confirmed successfully"))
}

#[tracing::instrument(
    name = "Send the unsubscribe link to a confirmed subscriber",
    skip(email_client, base_url, token)
)]
async fn send_unsubscribe_link(
    email_client: &dyn EmailClient,
    recipient: &SubscriberEmail,
    base_url: &ApplicationBaseUrl,
    token: &str,
) -> anyhow::Result<()> {
    let unsubscribe_link = base_url.link(&format!("/api/unsubscribe/{}", token));
    let html_body = &format!(
        "<p>Your Weather API subscription is confirmed.</p>\
        <p>You can unsubscribe at any time with this link: \
        <a href=\"{0}\">{0}</a></p>",
        unsubscribe_link
    );
    let plain_body = &format!(
        "Your Weather API subscription is confirmed. \
        You can unsubscribe at any time with this link: {}",
        unsubscribe_link
    );
    email_client
        .send_email(
            recipient,
            "Your Weather API Subscription Is Confirmed",
            html_body,
            plain_body,
        )
        .await
}

#[derive(thiserror::Error)]
pub enum ConfirmError {
    #[error("Invalid token format")]
    InvalidTokenFormat(FieldErrors),
    #[error("Token not found or already used")]
    UnknownToken,
    #[error("Invalid token type")]
    WrongTokenType,
    #[error("Token expired")]
    ExpiredToken,
    #[error("Associated subscription not found")]
    UnknownSubscription,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for ConfirmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for ConfirmError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("ConfirmError: {:?}", self);
        let (status, body) = match self {
            ConfirmError::InvalidTokenFormat(errors) => (
                Status::BadRequest,
                ErrorBody::new("Invalid token format").with_errors(errors),
            ),
            ConfirmError::WrongTokenType | ConfirmError::ExpiredToken => {
                (Status::BadRequest, ErrorBody::new(self.to_string()))
            }
            ConfirmError::UnknownToken | ConfirmError::UnknownSubscription => {
                (Status::NotFound, ErrorBody::new(self.to_string()))
            }
            ConfirmError::UnexpectedError(_) => (
                Status::InternalServerError,
                ErrorBody::new("Server error during confirmation process"),
            ),
        };
        body.respond_with(request, status)
    }
}
