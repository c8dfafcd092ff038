use crate::{Config, LocationQuery, QueryError, WeatherRecord, provider::weatherapi::WeatherApiProvider};
use async_trait::async_trait;
use std::fmt::Debug;

pub mod weatherapi;

/// One outbound call: current conditions for a location.
///
/// Implementations never retry and never cache; both are the caller's call.
#[async_trait]
pub trait WeatherProvider: Send + Sync + Debug {
    async fn fetch_conditions(&self, query: &LocationQuery) -> Result<WeatherRecord, QueryError>;
}

/// Construct the WeatherAPI provider from config.
pub fn provider_from_config(config: &Config) -> anyhow::Result<Box<dyn WeatherProvider>> {
    let api_key = config.api_key()?;
    let provider = WeatherApiProvider::new(
        api_key.to_owned(),
        &config.weatherapi.base_url,
        config.weatherapi.timeout(),
    )?;
    Ok(Box::new(provider))
}
