use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What to look up: a free-text place name or a coordinate pair.
#[derive(Debug, Clone, PartialEq)]
pub enum LocationQuery {
    City(String),
    Coordinates { lat: f64, lon: f64 },
}

impl LocationQuery {
    pub fn city(name: impl Into<String>) -> Self {
        Self::City(name.into())
    }

    pub fn coordinates(lat: f64, lon: f64) -> Self {
        Self::Coordinates { lat, lon }
    }

    /// The descriptor sent upstream and stored in the offline queue.
    pub fn descriptor(&self) -> String {
        self.to_string()
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Self::City(name) if name.trim().is_empty())
    }
}

impl fmt::Display for LocationQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::City(name) => f.write_str(name),
            Self::Coordinates { lat, lon } => write!(f, "{lat},{lon}"),
        }
    }
}

impl FromStr for LocationQuery {
    type Err = std::convert::Infallible;

    /// Exactly two comma-separated floats parse as coordinates; anything
    /// else is a city name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some((lat, lon)) = s.split_once(',') {
            if let (Ok(lat), Ok(lon)) = (lat.trim().parse::<f64>(), lon.trim().parse::<f64>()) {
                return Ok(Self::Coordinates { lat, lon });
            }
        }
        Ok(Self::City(s.to_string()))
    }
}

impl From<&str> for LocationQuery {
    fn from(s: &str) -> Self {
        match s.parse() {
            Ok(query) => query,
            Err(never) => match never {},
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub name: String,
    pub region: String,
    pub country: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub text: String,
    /// Absolute icon URL.
    pub icon: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentConditions {
    pub temp_c: f64,
    pub temp_f: f64,
    pub condition: Condition,
    /// Relative humidity, 0..=100.
    pub humidity: u8,
    pub pressure_mb: f64,
    pub vis_km: f64,
    pub last_updated: Option<DateTime<Utc>>,
}

/// Normalized current-conditions answer for one location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherRecord {
    pub location: Place,
    pub current: CurrentConditions,
}

impl WeatherRecord {
    pub fn temperature(&self, unit: TemperatureUnit) -> f64 {
        match unit {
            TemperatureUnit::Celsius => self.current.temp_c,
            TemperatureUnit::Fahrenheit => self.current.temp_f,
        }
    }

    /// "Name, Region, Country" heading.
    pub fn place_label(&self) -> String {
        format!(
            "{}, {}, {}",
            self.location.name, self.location.region, self.location.country
        )
    }
}

/// Display unit. View-only; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TemperatureUnit {
    Celsius,
    #[default]
    Fahrenheit,
}

impl TemperatureUnit {
    pub fn toggled(self) -> Self {
        match self {
            Self::Celsius => Self::Fahrenheit,
            Self::Fahrenheit => Self::Celsius,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Celsius => "°C",
            Self::Fahrenheit => "°F",
        }
    }
}
