//! Response shaping.
//!
//! Projects a raw OpenWeatherMap reading into the fixed response shape. Only
//! the projected fields are inspected; anything else in the payload is
//! ignored. Numbers keep their upstream JSON representation.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::error::FetchError;

/// Where the payload behind a response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Api,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Cache => "cache",
            Source::Api => "api",
        }
    }
}

impl std::fmt::Display for Source {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized response body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedResult {
    pub city: String,
    pub country: String,
    pub weather: WeatherSummary,
    /// When the response was formatted, not when the reading was taken
    pub timestamp: String,
    pub source: Source,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub description: String,
    pub temperature: Number,
    pub feels_like: Number,
    pub humidity: Number,
    pub pressure: Number,
    pub wind: Wind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wind {
    pub speed: Number,
    pub direction: Number,
}

/// Shape `raw` into a `FormattedResult` stamped with `now`
///
/// # Errors
///
/// Returns `FetchError::Formatting` naming the first field that is missing or
/// has the wrong type.
pub fn format(raw: &Value, source: Source, now: DateTime<Utc>) -> Result<FormattedResult, FetchError> {
    Ok(FormattedResult {
        city: string_at(raw, "/name")?,
        country: string_at(raw, "/sys/country")?,
        weather: WeatherSummary {
            description: string_at(raw, "/weather/0/description")?,
            temperature: number_at(raw, "/main/temp")?,
            feels_like: number_at(raw, "/main/feels_like")?,
            humidity: number_at(raw, "/main/humidity")?,
            pressure: number_at(raw, "/main/pressure")?,
            wind: Wind {
                speed: number_at(raw, "/wind/speed")?,
                direction: number_at(raw, "/wind/deg")?,
            },
        },
        timestamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        source,
    })
}

fn field<'a>(raw: &'a Value, pointer: &str) -> Result<&'a Value, FetchError> {
    raw.pointer(pointer)
        .ok_or_else(|| FetchError::Formatting(format!("missing field `{}`", display_path(pointer))))
}

fn string_at(raw: &Value, pointer: &str) -> Result<String, FetchError> {
    field(raw, pointer)?
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| wrong_type(pointer, "a string"))
}

fn number_at(raw: &Value, pointer: &str) -> Result<Number, FetchError> {
    match field(raw, pointer)? {
        Value::Number(n) => Ok(n.clone()),
        _ => Err(wrong_type(pointer, "a number")),
    }
}

fn wrong_type(pointer: &str, expected: &str) -> FetchError {
    FetchError::Formatting(format!(
        "field `{}` is not {}",
        display_path(pointer),
        expected
    ))
}

// "/weather/0/description" -> "weather[0].description"
fn display_path(pointer: &str) -> String {
    let mut out = String::new();
    for segment in pointer.trim_start_matches('/').split('/') {
        if segment.chars().all(|c| c.is_ascii_digit()) && !segment.is_empty() {
            out.push('[');
            out.push_str(segment);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(segment);
        }
    }
    out
}
