use unicode_segmentation::UnicodeSegmentation;

const MAX_CITY_LENGTH: usize = 100;

/// A city name as typed by the user; whether it exists is for the weather API to say.
#[derive(Debug, Clone)]
pub struct City(String);

impl City {
    pub fn parse(s: String) -> Result<City, String> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Err("City name cannot be empty".to_string());
        }
        if trimmed.graphemes(true).count() > MAX_CITY_LENGTH {
            return Err(format!(
                "City name cannot be longer than {} characters",
                MAX_CITY_LENGTH
            ));
        }
        if trimmed.chars().any(char::is_control) {
            return Err("City name cannot contain control characters".to_string());
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl AsRef<str> for City {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for City {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}
