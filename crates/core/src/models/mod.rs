//! Shared domain models.

use std::{fmt, str::FromStr};

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

/// Email shown for an identity rebuilt from a stored token alone.
pub const PLACEHOLDER_EMAIL: &str = "demo@user.com";
/// Identifier of the synthetic demo user.
pub const DEMO_USER_ID: &str = "demo-id";
/// Restaurant attached to the synthetic demo user.
pub const DEMO_RESTAURANT: &str = "Demo Restaurant";

static NAME_SEPARATORS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[._+\-]+").expect("invalid name separator regex"));

/// Authenticated user as reported by the backend (or synthesized in demo mode).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// Email-like login identifier.
    pub email: String,
    /// Name shown in the UI.
    #[serde(default)]
    pub display_name: String,
    /// Backend user id, when known. Numeric ids are kept in string form.
    #[serde(
        default,
        deserialize_with = "deserialize_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<String>,
    /// Restaurant the account belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restaurant_name: Option<String>,
}

impl Identity {
    /// Build the synthetic identity used when the backend is unavailable.
    pub fn demo(identifier: &str) -> Self {
        let email = identifier.trim().to_string();
        Self {
            display_name: display_name_for(&email),
            email,
            id: Some(DEMO_USER_ID.to_string()),
            restaurant_name: Some(DEMO_RESTAURANT.to_string()),
        }
    }

    /// Minimal identity reconstructed from a persisted token.
    pub fn placeholder() -> Self {
        Self {
            email: PLACEHOLDER_EMAIL.to_string(),
            display_name: display_name_for(PLACEHOLDER_EMAIL),
            id: None,
            restaurant_name: None,
        }
    }

    /// Fill in a display name when the backend omitted one.
    pub fn normalized(mut self) -> Self {
        if self.display_name.trim().is_empty() {
            self.display_name = display_name_for(&self.email);
        }
        self
    }
}

/// Derive a readable name from the local part of an identifier.
///
/// `chef.mario@x.com` becomes `Chef Mario`.
pub fn display_name_for(identifier: &str) -> String {
    let local = identifier.split('@').next().unwrap_or_default();
    let words: Vec<String> = NAME_SEPARATORS
        .split(local)
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect();
    if words.is_empty() {
        identifier.to_string()
    } else {
        words.join(" ")
    }
}

/// Current authentication state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    /// Signed-in user, if any.
    pub identity: Option<Identity>,
    /// Bearer token presented to the backend.
    pub token: Option<String>,
}

impl Session {
    /// The signed-out session.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A present token is all the UI needs to treat the user as signed in.
    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

/// Weather tag attached to a forecast day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Weather {
    /// Clear sky.
    Sunny,
    /// Overcast.
    Cloudy,
    /// Rain expected.
    Rainy,
}

impl FromStr for Weather {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "sunny" | "clear" => Ok(Weather::Sunny),
            "cloudy" | "clouds" | "overcast" => Ok(Weather::Cloudy),
            "rainy" | "rain" => Ok(Weather::Rainy),
            other => Err(format!("unknown weather '{other}'")),
        }
    }
}

impl fmt::Display for Weather {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Weather::Sunny => "Sunny",
            Weather::Cloudy => "Cloudy",
            Weather::Rainy => "Rainy",
        };
        f.write_str(label)
    }
}

/// One forecast day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    /// Calendar day the forecast applies to.
    #[serde(alias = "prediction_date")]
    pub date: NaiveDate,
    /// Expected number of covers.
    pub predicted_covers: f64,
    /// Confidence percentage, clamped to `[0, 100]`.
    #[serde(deserialize_with = "deserialize_confidence")]
    pub confidence: f64,
    /// Weather tag; unknown labels decode as `None`.
    #[serde(
        default,
        deserialize_with = "deserialize_weather",
        skip_serializing_if = "Option::is_none"
    )]
    pub weather: Option<Weather>,
    /// Observed covers, once the day has passed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<f64>,
}

impl ForecastPoint {
    /// Convenience constructor used by the built-in demo series.
    pub fn new(
        date: NaiveDate,
        predicted_covers: f64,
        confidence: f64,
        weather: Option<Weather>,
        actual: Option<f64>,
    ) -> Self {
        Self {
            date,
            predicted_covers,
            confidence: confidence.clamp(0.0, 100.0),
            weather,
            actual,
        }
    }
}

/// Ordered per-day forecast, chronological in insertion order.
pub type ForecastSeries = Vec<ForecastPoint>;

/// Summary statistics accompanying a series.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastStats {
    /// Average covers across the fitted history.
    #[serde(default)]
    pub mean_covers: f64,
    /// Linear trend in covers per day.
    #[serde(default)]
    pub trend_per_day: f64,
    /// Whether a weekly pattern was found.
    #[serde(default)]
    pub seasonality_detected: bool,
}

fn deserialize_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<serde_json::Value> = Option::deserialize(deserializer)?;
    Ok(match raw {
        Some(serde_json::Value::String(text)) => Some(text),
        Some(serde_json::Value::Number(num)) => Some(num.to_string()),
        _ => None,
    })
}

fn deserialize_confidence<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    Ok(raw.clamp(0.0, 100.0))
}

fn deserialize_weather<'de, D>(deserializer: D) -> Result<Option<Weather>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|value| value.parse().ok()))
}
