//! Core library for the `weather` client.
//!
//! This crate defines:
//! - Configuration handling
//! - The weather query client (WeatherAPI.com)
//! - Local stores for recent searches and the offline search queue
//! - The page controller that ties queries, view state and reconnects together
//! - The cache-and-fallback worker (precache, cache-first fetch, offline page,
//!   push and sync notifications)
//!
//! It is used by `weather-cli`, but can also be reused by other front ends.

pub mod config;
pub mod controller;
pub mod error;
pub mod model;
pub mod provider;
pub mod queue;
pub mod recent;
pub mod store;
pub mod worker;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{Config, ProviderConfig, ShellConfig};
pub use controller::{Connectivity, DrainSummary, PageController, SearchOutcome, ViewState};
pub use error::{QueryError, QueueError, StoreError};
pub use model::{LocationQuery, TemperatureUnit, WeatherRecord};
pub use provider::{WeatherProvider, provider_from_config};
pub use queue::{OfflineQueue, QueueHandle};
pub use recent::RecentSearches;
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreKey};
pub use worker::{CacheGeneration, CacheStorage, ServiceWorker, WorkerContext, WorkerPhase};
