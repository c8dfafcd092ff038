use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    error::QueryError,
    model::{Condition, CurrentConditions, LocationQuery, Place, WeatherRecord},
};

use super::WeatherProvider;

/// WeatherAPI.com error code for "No matching location found."
const NO_MATCHING_LOCATION: u32 = 1006;

#[derive(Debug, Clone)]
pub struct WeatherApiProvider {
    api_key: String,
    base_url: String,
    http: Client,
}

impl WeatherApiProvider {
    pub fn new(api_key: String, base_url: &str, timeout: Duration) -> Result<Self, QueryError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    async fn fetch_current(&self, query: &LocationQuery) -> Result<WeatherRecord, QueryError> {
        let url = format!("{}/current.json", self.base_url);
        let descriptor = query.descriptor();

        let res = self
            .http
            .get(&url)
            .query(&[("key", self.api_key.as_str()), ("q", descriptor.as_str())])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        debug!(%status, bytes = body.len(), "WeatherAPI current response");

        if !status.is_success() {
            return Err(classify_failure(status.as_u16(), &body, &descriptor));
        }

        let parsed: WaResponse = serde_json::from_str(&body)?;
        Ok(parsed.into_record())
    }
}

#[async_trait]
impl WeatherProvider for WeatherApiProvider {
    #[instrument(skip_all, fields(q = %query))]
    async fn fetch_conditions(&self, query: &LocationQuery) -> Result<WeatherRecord, QueryError> {
        self.fetch_current(query).await
    }
}

fn classify_failure(status: u16, body: &str, descriptor: &str) -> QueryError {
    let api_error = serde_json::from_str::<WaErrorEnvelope>(body).ok().map(|e| e.error);

    match api_error {
        Some(err) if err.code == NO_MATCHING_LOCATION => QueryError::NotFound {
            query: descriptor.to_string(),
        },
        _ if status == 404 => QueryError::NotFound {
            query: descriptor.to_string(),
        },
        Some(err) => QueryError::Api {
            status,
            message: err.message,
        },
        None => QueryError::Api {
            status,
            message: truncate_body(body),
        },
    }
}

#[derive(Debug, Deserialize)]
struct WaErrorEnvelope {
    error: WaError,
}

#[derive(Debug, Deserialize)]
struct WaError {
    code: u32,
    message: String,
}

#[derive(Debug, Deserialize)]
struct WaLocation {
    name: String,
    region: String,
    country: String,
}

#[derive(Debug, Deserialize)]
struct WaCondition {
    text: String,
    icon: String,
}

#[derive(Debug, Deserialize)]
struct WaCurrent {
    temp_c: f64,
    temp_f: f64,
    condition: WaCondition,
    humidity: u8,
    pressure_mb: f64,
    vis_km: f64,
    last_updated_epoch: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct WaResponse {
    location: WaLocation,
    current: WaCurrent,
}

impl WaResponse {
    fn into_record(self) -> WeatherRecord {
        let WaResponse { location, current } = self;

        WeatherRecord {
            location: Place {
                name: location.name,
                region: location.region,
                country: location.country,
            },
            current: CurrentConditions {
                temp_c: current.temp_c,
                temp_f: current.temp_f,
                condition: Condition {
                    text: current.condition.text,
                    icon: absolute_icon_url(&current.condition.icon),
                },
                humidity: current.humidity.min(100),
                pressure_mb: current.pressure_mb,
                vis_km: current.vis_km,
                last_updated: current.last_updated_epoch.and_then(unix_to_utc),
            },
        }
    }
}

/// WeatherAPI hands out protocol-relative icon URLs.
fn absolute_icon_url(icon: &str) -> String {
    if icon.starts_with("//") {
        format!("https:{icon}")
    } else {
        icon.to_string()
    }
}

fn unix_to_utc(ts: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp(ts, 0)
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
