//! Cache-and-fallback worker.
//!
//! Runs beside the page with no shared memory: it sees the network, the
//! origin's [`CacheStorage`], the notification surface, open windows and a
//! read-only view of the offline queue.
//!
//! Lifecycle: `New → Installing → Installed → Active → Terminated`. A failed
//! install goes straight to `Terminated`.

use std::sync::Arc;

use reqwest::Url;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{config::ShellConfig, error::QueueError, queue::QueueHandle};

pub mod cache;
pub mod network;
pub mod notify;

pub use cache::CacheStorage;
pub use network::{FetchError, HttpNetwork, Network, OfflineNetwork, Request, RequestMode, Response};
pub use notify::{ClickOutcome, Clients, Notification, Notifier, Permission, PushPayload, WindowClient};

/// Sync tag the page registers for its offline queue.
pub const SYNC_TAG: &str = "sync-weather-queue";

/// A versioned precache set. Exactly one generation is current.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheGeneration {
    prefix: String,
    version: u32,
    urls: Vec<String>,
}

impl CacheGeneration {
    pub fn new(prefix: &str, version: u32, urls: Vec<String>) -> Self {
        Self {
            prefix: prefix.to_string(),
            version,
            urls,
        }
    }

    /// Cache-store name, e.g. `weather-app-v6`.
    pub fn name(&self) -> String {
        format!("{}-v{}", self.prefix, self.version)
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerPhase {
    New,
    Installing,
    Installed,
    Active,
    Terminated,
}

#[derive(Error, Debug)]
pub enum WorkerError {
    #[error("Precache of {url} failed: {reason}")]
    InstallFailed { url: String, reason: String },

    #[error("Cannot {action} while {phase:?}")]
    InvalidPhase {
        action: &'static str,
        phase: WorkerPhase,
    },

    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Offline page {0} is not cached")]
    OfflinePageMissing(String),

    #[error(transparent)]
    Client(#[from] notify::ClientError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchSource {
    Cache,
    Network,
    OfflineFallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub source: FetchSource,
    pub response: Response,
}

/// Collaborators the worker is given at startup.
#[derive(Debug, Clone)]
pub struct WorkerContext {
    pub caches: CacheStorage,
    pub network: Arc<dyn Network>,
    pub notifier: Arc<dyn Notifier>,
    pub clients: Arc<dyn Clients>,
    pub queue: QueueHandle,
}

#[derive(Debug)]
pub struct ServiceWorker {
    generation: CacheGeneration,
    origin: Url,
    offline_page: String,
    phase: WorkerPhase,
    ctx: WorkerContext,
}

impl ServiceWorker {
    pub fn new(shell: &ShellConfig, ctx: WorkerContext) -> Result<Self, WorkerError> {
        let origin = Url::parse(&shell.origin).map_err(|err| WorkerError::InvalidUrl {
            url: shell.origin.clone(),
            reason: err.to_string(),
        })?;
        let offline_page = resolve(&origin, &shell.offline_page)?;

        Ok(Self {
            generation: shell.generation(),
            origin,
            offline_page,
            phase: WorkerPhase::New,
            ctx,
        })
    }

    pub fn phase(&self) -> WorkerPhase {
        self.phase
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    /// Absolute form of a URL relative to the shell origin.
    pub fn resolve(&self, url: &str) -> Result<String, WorkerError> {
        resolve(&self.origin, url)
    }

    /// Precache the current generation. All-or-nothing: nothing is stored
    /// unless every URL fetched with a success status.
    pub async fn install(&mut self) -> Result<(), WorkerError> {
        self.expect_phase(WorkerPhase::New, "install")?;
        self.phase = WorkerPhase::Installing;
        let name = self.generation.name();
        info!(cache = %name, "Installing cache worker");

        match self.fetch_precache().await {
            Ok(responses) => {
                let count = responses.len();
                self.ctx.caches.put_all(&name, responses);
                self.phase = WorkerPhase::Installed;
                info!(cache = %name, count, "Precache complete");
                Ok(())
            }
            Err(err) => {
                warn!(cache = %name, error = %err, "Install failed");
                self.phase = WorkerPhase::Terminated;
                Err(err)
            }
        }
    }

    async fn fetch_precache(&self) -> Result<Vec<(String, Response)>, WorkerError> {
        let mut responses = Vec::with_capacity(self.generation.urls().len());
        for url in self.generation.urls() {
            let url = self.resolve(url)?;
            let response = self
                .ctx
                .network
                .fetch(&Request::get(url.clone()))
                .await
                .map_err(|err| WorkerError::InstallFailed {
                    url: url.clone(),
                    reason: err.to_string(),
                })?;

            if !response.is_success() {
                return Err(WorkerError::InstallFailed {
                    url,
                    reason: format!("status {}", response.status),
                });
            }
            responses.push((url, response));
        }
        Ok(responses)
    }

    /// Delete every cache generation but the current one, then start
    /// intercepting. Returns the deleted cache names.
    pub async fn activate(&mut self) -> Result<Vec<String>, WorkerError> {
        self.expect_phase(WorkerPhase::Installed, "activate")?;
        Ok(self.purge_and_activate())
    }

    fn purge_and_activate(&mut self) -> Vec<String> {
        let current = self.generation.name();

        let stale: Vec<String> = self
            .ctx
            .caches
            .keys()
            .into_iter()
            .filter(|name| *name != current)
            .collect();
        for name in &stale {
            self.ctx.caches.delete(name);
            info!(cache = %name, "Deleted stale cache generation");
        }

        self.phase = WorkerPhase::Active;
        stale
    }

    /// Pick up a generation installed by an earlier run: when every precache
    /// URL is already stored under the current name, finish activation
    /// (purging any stale generations left behind) without touching the
    /// network. Returns the deleted cache names, or `None` when the current
    /// generation is incomplete and a full install is needed.
    pub fn resume(&mut self) -> Result<Option<Vec<String>>, WorkerError> {
        self.expect_phase(WorkerPhase::New, "resume")?;
        let name = self.generation.name();

        for url in self.generation.urls() {
            let url = self.resolve(url)?;
            if self.ctx.caches.match_in(&name, &url).is_none() {
                return Ok(None);
            }
        }

        debug!(cache = %name, "Resuming installed cache generation");
        Ok(Some(self.purge_and_activate()))
    }

    /// A newer worker took over.
    pub fn supersede(&mut self) {
        debug!(cache = %self.generation.name(), "Cache worker superseded");
        self.phase = WorkerPhase::Terminated;
    }

    /// Cache-first, then network, then (navigations only) the offline page.
    /// Network responses are never written back to the cache.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, WorkerError> {
        let request = Request {
            url: self.resolve(&request.url)?,
            mode: request.mode,
        };

        if self.phase != WorkerPhase::Active {
            let response = self.ctx.network.fetch(&request).await?;
            return Ok(FetchOutcome { source: FetchSource::Network, response });
        }

        if let Some(response) = self.ctx.caches.match_url(&request.url) {
            debug!(url = %request.url, "Served from cache");
            return Ok(FetchOutcome { source: FetchSource::Cache, response });
        }

        match self.ctx.network.fetch(&request).await {
            Ok(response) => Ok(FetchOutcome { source: FetchSource::Network, response }),
            Err(err) if request.is_navigation() => {
                debug!(url = %request.url, error = %err, "Navigation failed; serving offline page");
                let response = self
                    .ctx
                    .caches
                    .match_in(&self.generation.name(), &self.offline_page)
                    .ok_or_else(|| WorkerError::OfflinePageMissing(self.offline_page.clone()))?;
                Ok(FetchOutcome { source: FetchSource::OfflineFallback, response })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Show the pushed notification, filling absent fields with defaults.
    pub async fn handle_push(&self, data: Option<&[u8]>) -> Notification {
        let notification = PushPayload::parse(data).into_notification();
        self.ctx.notifier.show(notification.clone()).await;
        notification
    }

    /// Close the notification, then focus an open window or open a new one.
    pub async fn handle_notification_click(
        &self,
        notification: &Notification,
    ) -> Result<ClickOutcome, WorkerError> {
        self.ctx.notifier.close(notification).await;

        let windows = self.ctx.clients.windows().await;
        if let Some(window) = windows.into_iter().find(|w| w.url.is_some() && w.focusable) {
            self.ctx.clients.focus(&window.id).await?;
            return Ok(ClickOutcome::Focused(window.id));
        }

        self.ctx.clients.open_window("/").await?;
        Ok(ClickOutcome::Opened("/".to_string()))
    }

    /// Tell the user each queued search will be picked up by the app.
    ///
    /// This only notifies. Fetching and clearing stay with the page, which
    /// drains the queue on its own reconnect. Returns how many
    /// notifications were shown.
    pub async fn handle_sync(&self, tag: &str) -> Result<usize, WorkerError> {
        if tag != SYNC_TAG {
            debug!(tag, "Ignoring unrelated sync tag");
            return Ok(0);
        }

        let queued = self.ctx.queue.snapshot().await?;
        for city in &queued {
            self.ctx
                .notifier
                .show(Notification::new(
                    "Weather Request Synced",
                    format!("Weather for {city} will be updated in the app!"),
                ))
                .await;
        }
        Ok(queued.len())
    }

    fn expect_phase(&self, expected: WorkerPhase, action: &'static str) -> Result<(), WorkerError> {
        if self.phase == expected {
            Ok(())
        } else {
            Err(WorkerError::InvalidPhase { action, phase: self.phase })
        }
    }
}

fn resolve(origin: &Url, url: &str) -> Result<String, WorkerError> {
    origin
        .join(url)
        .map(String::from)
        .map_err(|err| WorkerError::InvalidUrl {
            url: url.to_string(),
            reason: err.to_string(),
        })
}
