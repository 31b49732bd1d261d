use crate::domain::City;
use crate::routes::{error_chain_fmt, ErrorBody, FieldErrors};
use crate::weather_client::{CurrentWeather, WeatherApiError, WeatherClient};
use rocket::http::Status;
use rocket::response::Responder;
use rocket::serde::json::Json;
use rocket::{Request, State};
use uuid::Uuid;

#[get("/weather?<city>")]
#[tracing::instrument(
    name = "Look up the current weather",
    skip(weather_client),
    fields(request_id = %Uuid::new_v4())
)]
pub async fn weather(
    city: Option<String>,
    weather_client: &State<WeatherClient>,
) -> Result<Json<CurrentWeather>, WeatherLookupError> {
    let city = city
        .ok_or_else(|| "City name cannot be empty".to_string())
        .and_then(City::parse)
        .map_err(|reason| WeatherLookupError::ValidationError(FieldErrors::single("city", reason)))?;

    match weather_client.current_weather(&city).await {
        Ok(weather) => Ok(Json(weather)),
        Err(WeatherApiError::LocationNotFound) => {
            Err(WeatherLookupError::CityNotFound(city.to_string()))
        }
        Err(e) => Err(WeatherLookupError::Upstream(e)),
    }
}

#[derive(thiserror::Error)]
pub enum WeatherLookupError {
    #[error("Invalid request")]
    ValidationError(FieldErrors),
    #[error("City not found: {0}")]
    CityNotFound(String),
    #[error("The weather service could not answer")]
    Upstream(#[source] WeatherApiError),
}

impl std::fmt::Debug for WeatherLookupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        error_chain_fmt(self, f)
    }
}

impl<'r> Responder<'r, 'static> for WeatherLookupError {
    fn respond_to(self, request: &'r Request<'_>) -> rocket::response::Result<'static> {
        tracing::warn!("WeatherLookupError: {:?}", self);
        let (status, body) = match self {
            WeatherLookupError::ValidationError(errors) => (
                Status::BadRequest,
                ErrorBody::new("Invalid request").with_errors(errors),
            ),
            WeatherLookupError::CityNotFound(_) => {
                (Status::NotFound, ErrorBody::new(self.to_string()))
            }
            WeatherLookupError::Upstream(e) => match e {
                WeatherApiError::Service { message, .. } => (
                    Status::BadRequest,
                    ErrorBody::new("Invalid request to weather service").with_detail(message),
                ),
                WeatherApiError::IncompletePayload | WeatherApiError::LocationNotFound => (
                    Status::InternalServerError,
                    ErrorBody::new("Unexpected response from weather service"),
                ),
                WeatherApiError::Transport(_) => (
                    Status::ServiceUnavailable,
                    ErrorBody::new("Failed to connect to weather service"),
                ),
                WeatherApiError::MissingApiKey => (
                    Status::InternalServerError,
                    ErrorBody::new("Server configuration error: API key missing"),
                ),
            },
        };
        body.respond_with(request, status)
    }
}
