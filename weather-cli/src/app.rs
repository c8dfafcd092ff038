//! Wiring for one CLI invocation: file-backed stores under the data dir,
//! the queue owner task, the page controller and the cache worker.

use std::{path::PathBuf, sync::Arc};

use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;
use weather_core::{
    CacheStorage, Config, Connectivity, FileStore, KeyValueStore, LocationQuery, OfflineQueue,
    PageController, QueryError, QueueHandle, RecentSearches, ServiceWorker, WeatherProvider,
    WeatherRecord, WorkerContext, provider_from_config,
    worker::{HttpNetwork, Network, OfflineNetwork},
};

use crate::console::{ConsoleNotifier, TerminalClients};

const CACHE_SNAPSHOT: &str = "caches.json";

pub struct App {
    pub config: Config,
    data_dir: PathBuf,
    store: Arc<dyn KeyValueStore>,
    queue: QueueHandle,
    notifier: Arc<ConsoleNotifier>,
}

impl App {
    pub fn open() -> Result<Self> {
        let config = Config::load()?;
        let data_dir = Config::data_dir()?;
        debug!(dir = %data_dir.display(), "Using data directory");

        let store: Arc<dyn KeyValueStore> = Arc::new(FileStore::new(&data_dir));
        // Every queue command is answered after its write, so the owner task
        // can simply be detached.
        let (queue, _owner) = QueueHandle::spawn(OfflineQueue::new(Arc::clone(&store)));

        Ok(Self {
            config,
            data_dir,
            store,
            queue,
            notifier: Arc::new(ConsoleNotifier),
        })
    }

    pub fn queue(&self) -> &QueueHandle {
        &self.queue
    }

    pub fn recent(&self) -> RecentSearches {
        RecentSearches::new(Arc::clone(&self.store))
    }

    pub fn page(&self, connectivity: Connectivity) -> Result<PageController> {
        let provider: Arc<dyn WeatherProvider> = if self.config.is_configured() {
            Arc::from(provider_from_config(&self.config)?)
        } else {
            Arc::new(MissingKeyProvider)
        };

        Ok(PageController::new(
            provider,
            self.recent(),
            self.queue.clone(),
            self.notifier.clone(),
            connectivity,
        ))
    }

    /// A worker over the persisted cache storage.
    pub fn worker(&self, offline: bool) -> Result<(ServiceWorker, CacheStorage)> {
        let caches = CacheStorage::load(&self.cache_snapshot())?;
        let network: Arc<dyn Network> = if offline {
            Arc::new(OfflineNetwork)
        } else {
            Arc::new(HttpNetwork::new(self.config.weatherapi.timeout())?)
        };

        let worker = ServiceWorker::new(
            &self.config.shell,
            WorkerContext {
                caches: caches.clone(),
                network,
                notifier: self.notifier.clone(),
                clients: Arc::new(TerminalClients::new(&self.config.shell.origin)),
                queue: self.queue.clone(),
            },
        )?;
        Ok((worker, caches))
    }

    pub fn save_caches(&self, caches: &CacheStorage) -> Result<()> {
        caches.save(&self.cache_snapshot())
    }

    fn cache_snapshot(&self) -> PathBuf {
        self.data_dir.join(CACHE_SNAPSHOT)
    }
}

/// Stands in for the real provider until an API key is configured, so
/// offline queueing still works.
#[derive(Debug)]
struct MissingKeyProvider;

#[async_trait]
impl WeatherProvider for MissingKeyProvider {
    async fn fetch_conditions(&self, _query: &LocationQuery) -> Result<WeatherRecord, QueryError> {
        Err(QueryError::Api {
            status: 401,
            message: "No API key configured".to_string(),
        })
    }
}
