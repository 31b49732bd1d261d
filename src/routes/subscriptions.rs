use crate::domain::{City, Frequency, NewSubscriber, SubscriberEmail};
use crate::email::EmailClient;
use crate::mail_domain::{MailDomainStatus, MxResolver};
use crate::routes::{error_chain_fmt, ApplicationBaseUrl, ErrorBody, FieldErrors, MessageBody};
use crate::store::{StoreError, SubscriptionStore};
use crate::weather_client::{WeatherApiError, WeatherClient};
use anyhow::Context;
use chrono::Utc;
use rocket::form::Form;
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use std::sync::Arc;
use uuid::Uuid;

#[derive(FromForm)]
pub struct FormData {
    email: Option<String>,
    city: Option<String>,
    frequency: Option<String>,
}

impl TryFrom<FormData> for NewSubscriber {
    type Error = FieldErrors;

    fn try_from(form: FormData) -> Result<Self, Self::Error> {
        let email = form.email.ok_or_else(required).and_then(|email| {
            SubscriberEmail::parse(email).map_err(|_| "Invalid email address".to_string())
        });
        let city = form.city.ok_or_else(required).and_then(City::parse);
        let frequency = form
            .frequency
            .ok_or_else(required)
            .and_then(|frequency| Frequency::parse(&frequency));

        match (email, city, frequency) {
            (Ok(email), Ok(city), Ok(frequency)) => Ok(NewSubscriber {
                email,
                city,
                frequency,
            }),
            (email, city, frequency) => {
                let mut errors = FieldErrors::default();
                if let Err(reason) = email {
                    errors.add("email", reason);
                }
                if let Err(reason) = city {
                    errors.add("city", reason);
                }
                if let Err(reason) = frequency {
                    errors.add("frequency", reason);
                }
                Err(errors)
            }
        }
    }
}

fn required() -> String {
    "Required".to_string()
}

#[post("/subscribe", data = "<form>")]
#[tracing::instrument(
    name = "Adding a new subscriber",
    skip_all,
    fields(
        request_id = %Uuid::new_v4(),
        subscriber_email = ?form.email,
        subscriber_city = ?form.city,
        frequency = ?form.frequency
    )
)]
pub async fn subscribe(
    form: Form<FormData>,
    store: &State<Arc<dyn SubscriptionStore>>,
    email_client: &State<Arc<dyn EmailClient>>,
    weather_client: &State<WeatherClient>,
    mx_resolver: &State<Arc<dyn MxResolver>>,
    base_url: &State<ApplicationBaseUrl>,
) -> Result<Json<MessageBody>, SubscribeError> {
    let new_subscriber: NewSubscriber = form
        .into_inner()
        .try_into()
        .map_err(SubscribeError::ValidationError)?;

    verify_city(weather_client, &new_subscriber.city).await?;
    verify_mail_domain(mx_resolver.inner().as_ref(), &new_subscriber.email).await?;

    let existing = store
        .find_subscription_by_email(new_subscriber.email.as_ref())
        .await
        .context("Failed to look up an existing subscription for this email.")?;
    if existing.is_some() {
        return Err(SubscribeError::AlreadySubscribed);
    }

    let (subscription, confirmation_token) = match store
        .insert_pending_subscription(&new_subscriber, Utc::now())
        .await
    {
        Ok(inserted) => inserted,
        Err(StoreError::Conflict(_)) => return Err(SubscribeError::AlreadySubscribed),
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context("Failed to insert new subscriber in the database.")
                .into())
        }
    };

    if let Err(e) = send_confirmation_email(
        email_client.inner().as_ref(),
        &new_subscriber.email,
        base_url,
        &confirmation_token.value,
    )
    .await
    {
        tracing::error!(
            error.cause_chain = ?e,
            subscription_id = %subscription.id,
            "Failed to send a confirmation email, the subscription was still created"
        );
    }

    Ok(MessageBody::new(
        "Subscription successful. Confirmation email sent.",
    ))
}

#[tracing::instrument(name = "Check that the city is known", skip_all, fields(city = %city))]
async fn verify_city(weather_client: &WeatherClient, city: &City) -> Result<(), SubscribeError> {
    match weather_client.current_weather(city).await {
        Ok(_) => Ok(()),
        Err(WeatherApiError::LocationNotFound) => Err(SubscribeError::UnknownCity(city.to_string())),
        Err(WeatherApiError::IncompletePayload) => {
            Err(SubscribeError::UnverifiableCity(city.to_string()))
        }
        Err(e @ WeatherApiError::Service { .. }) => Err(SubscribeError::WeatherServiceError(e)),
        Err(e @ WeatherApiError::Transport(_)) => Err(SubscribeError::WeatherServiceUnavailable(e)),
        Err(e @ WeatherApiError::MissingApiKey) => Err(SubscribeError::UnexpectedError(
            anyhow::Error::new(e).context("Cannot validate cities without a weather API key."),
        )),
    }
}

#[tracing::instrument(name = "Check that the email domain accepts mail", skip_all)]
async fn verify_mail_domain(
    mx_resolver: &dyn MxResolver,
    email: &SubscriberEmail,
) -> Result<(), SubscribeError> {
    match mx_resolver.mail_domain_status(email.domain()).await {
        Ok(MailDomainStatus::AcceptsMail) => Ok(()),
        Ok(MailDomainStatus::NoMailServers) => Err(SubscribeError::UndeliverableEmail(
            "Email domain does not accept emails",
        )),
        Ok(MailDomainStatus::DoesNotExist) => Err(SubscribeError::UndeliverableEmail(
            "Email domain does not exist or has no mail servers",
        )),
        Err(e) => {
            tracing::warn!(error.cause_chain = ?e, "MX lookup failed");
            Err(SubscribeError::UndeliverableEmail(
                "Could not verify email domain",
            ))
        }
    }
}

#[tracing::instrument(
    name = "Send a confirmation email to a new subscriber",
    skip(email_client, base_url, token)
)]
async fn send_confirmation_email(
    email_client: &dyn EmailClient,
    recipient: &SubscriberEmail,
    base_url: &ApplicationBaseUrl,
    token: &str,
) -> anyhow::Result<()> {
    let confirmation_link = base_url.link(&format!("/api/confirm/{}", token));
    let html_body = &format!(
        "<p>Welcome to Weather API!</p>\
        <p>Please confirm your subscription by clicking this link: \
        <a href=\"{0}\">{0}</a></p>",
        confirmation_link
    );
    let plain_body = &format!(
        "Welcome to Weather API! Please confirm your subscription by clicking this link: {}",
        confirmation_link
    );
    email_client
        .send_email(
            recipient,
            "Confirm Your Weather API Subscription",
            html_body,
            plain_body,
        )
        .await
}

#[derive(thiserror::Error)]
pub enum SubscribeError {
    #[error("Invalid input")]
    ValidationError(FieldErrors),
    #[error("Invalid city: '{0}' not found.")]
    UnknownCity(String),
    #[error("Could not verify city: '{0}'. Please ensure it's a known location.")]
    UnverifiableCity(String),
    #[error("Could not verify city with weather service at this time.")]
    WeatherServiceError(#[source] WeatherApiError),
    #[error("Failed to connect to weather service for city validation.")]
    WeatherServiceUnavailable(#[source] WeatherApiError),
    #[error("{0}")]
    UndeliverableEmail(&'static str),
    #[error("Email already subscribed")]
    AlreadySubscribed,
    #[error(transparent)]
    UnexpectedError(#[from] anyhow::Error),
}

impl std::fmt::Debug for SubscribeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for SubscribeError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("SubscribeError: {:?}", self);
        let (status, body) = match self {
            SubscribeError::ValidationError(errors) => (
                Status::BadRequest,
                ErrorBody::new("Invalid input").with_errors(errors),
            ),
            SubscribeError::UnknownCity(_)
            | SubscribeError::UnverifiableCity(_)
            | SubscribeError::UndeliverableEmail(_) => {
                (Status::BadRequest, ErrorBody::new(self.to_string()))
            }
            SubscribeError::WeatherServiceError(_) => {
                (Status::BadGateway, ErrorBody::new(self.to_string()))
            }
            SubscribeError::WeatherServiceUnavailable(_) => {
                (Status::ServiceUnavailable, ErrorBody::new(self.to_string()))
            }
            SubscribeError::AlreadySubscribed => (Status::Conflict, ErrorBody::new(self.to_string())),
            SubscribeError::UnexpectedError(_) => (
                Status::InternalServerError,
                ErrorBody::new("Could not process subscription due to a server error."),
            ),
        };
        body.respond_with(request, status)
    }
}
