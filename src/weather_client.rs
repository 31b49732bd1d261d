//! Client for the weatherapi.com "current conditions" endpoint.
//!
//! The upstream API reports failures in the body (`{"error": {"code", "message"}}`)
//! whatever the HTTP status, so the body is always decoded before the outcome is
//! classified.

use crate::configuration::WeatherApiSettings;
use crate::domain::City;
use reqwest::Client;
use secrecy::{ExposeSecret, Secret};

/// Upstream error code for "No matching location found."
const LOCATION_NOT_FOUND: i64 = 1006;

#[derive(Debug, thiserror::Error)]
pub enum WeatherApiError {
    #[error("No weather API key has been configured")]
    MissingApiKey,
    #[error("No matching location found")]
    LocationNotFound,
    #[error("Weather service rejected the request with code {code}: {message}")]
    Service { code: i64, message: String },
    #[error("Weather service returned a payload without location or current conditions")]
    IncompletePayload,
    #[error("Failed to reach the weather service")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct CurrentWeather {
    #[serde(serialize_with = "serialize_temperature")]
    pub temperature: f64,
    pub humidity: i64,
    pub description: String,
}

/// Whole degrees go out as integers, the way the upstream API reports them.
fn serialize_temperature<S>(temperature: &f64, serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let whole = temperature.trunc();
    if whole == *temperature && whole.abs() < i64::MAX as f64 {
        serializer.serialize_i64(whole as i64)
    } else {
        serializer.serialize_f64(*temperature)
    }
}

#[derive(serde::Deserialize)]
struct CurrentResponse {
    location: Option<Location>,
    current: Option<Current>,
    error: Option<ApiError>,
}

#[derive(serde::Deserialize)]
struct Location {
    name: Option<String>,
}

#[derive(serde::Deserialize)]
struct Current {
    temp_c: Option<f64>,
    humidity: Option<i64>,
    condition: Option<Condition>,
}

#[derive(serde::Deserialize)]
struct Condition {
    text: Option<String>,
}

#[derive(serde::Deserialize)]
struct ApiError {
    code: i64,
    message: String,
}

impl CurrentResponse {
    fn into_current_weather(self) -> Result<CurrentWeather, WeatherApiError> {
        if let Some(error) = self.error {
            return Err(match error.code {
                LOCATION_NOT_FOUND => WeatherApiError::LocationNotFound,
                code => WeatherApiError::Service {
                    code,
                    message: error.message,
                },
            });
        }
        let (location, current) = match (self.location, self.current) {
            (Some(location), Some(current)) => (location, current),
            _ => return Err(WeatherApiError::IncompletePayload),
        };
        let condition = current.condition.and_then(|condition| condition.text);
        match (current.temp_c, current.humidity, condition, location.name) {
            (Some(temperature), Some(humidity), Some(condition), Some(name)) => {
                Ok(CurrentWeather {
                    temperature,
                    humidity,
                    description: format!("{} in {}", condition, name),
                })
            }
            _ => Err(WeatherApiError::IncompletePayload),
        }
    }
}

pub struct WeatherClient {
    http_client: Client,
    base_url: String,
    api_key: Secret<String>,
}

impl WeatherClient {
    pub fn new(settings: &WeatherApiSettings) -> Result<WeatherClient, reqwest::Error> {
        let http_client = Client::builder().timeout(settings.timeout()).build()?;
        Ok(Self {
            http_client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
        })
    }

    #[tracing::instrument(name = "Fetch current weather", skip(self))]
    pub async fn current_weather(&self, city: &City) -> Result<CurrentWeather, WeatherApiError> {
        if self.api_key.expose_secret().is_empty() {
            return Err(WeatherApiError::MissingApiKey);
        }
        let url = format!("{}/v1/current.json", self.base_url);
        let response = self
            .http_client
            .get(&url)
            .query(&[("key", self.api_key.expose_secret().as_str()), ("q", city.as_ref())])
            .send()
            .await?;
        let body: CurrentResponse = response.json().await?;
        body.into_current_weather()
    }
}
