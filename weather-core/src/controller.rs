//! The page: issues queries, keeps the view state, and replays the offline
//! queue when connectivity comes back.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::{
    error::{QueryError, QueueError},
    model::{LocationQuery, TemperatureUnit, WeatherRecord},
    provider::WeatherProvider,
    queue::QueueHandle,
    recent::RecentSearches,
    worker::{Notification, Notifier, Permission},
};

pub const OFFLINE_MESSAGE: &str =
    "Offline: your search will be processed when you are back online.";
pub const LOCATION_FAILED_MESSAGE: &str = "Could not fetch weather for your location.";
const QUEUE_FAILED_MESSAGE: &str = "Offline: your search could not be saved for later.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connectivity {
    Online,
    Offline,
}

/// Everything the rendering layer needs.
#[derive(Debug, Clone, Default)]
pub struct ViewState {
    pub weather: Option<WeatherRecord>,
    /// Transient banner; cleared when the next query starts.
    pub error: Option<String>,
    pub loading: bool,
    pub unit: TemperatureUnit,
    pub recent: Vec<String>,
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchOutcome {
    Displayed,
    Queued { pending: usize },
    Failed,
    Ignored,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub processed: usize,
    pub failed: usize,
}

#[derive(Debug)]
pub struct PageController {
    provider: Arc<dyn WeatherProvider>,
    recent: RecentSearches,
    queue: QueueHandle,
    notifier: Arc<dyn Notifier>,
    connectivity: Connectivity,
    view: ViewState,
}

impl PageController {
    pub fn new(
        provider: Arc<dyn WeatherProvider>,
        recent: RecentSearches,
        queue: QueueHandle,
        notifier: Arc<dyn Notifier>,
        connectivity: Connectivity,
    ) -> Self {
        Self {
            provider,
            recent,
            queue,
            notifier,
            connectivity,
            view: ViewState::default(),
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn connectivity(&self) -> Connectivity {
        self.connectivity
    }

    /// Page load: restore recent searches, ask for notification permission,
    /// and look up the current position if one is known.
    pub async fn init(&mut self, position: Option<(f64, f64)>) {
        self.view.recent = self.recent.load();

        if self.notifier.permission() != Permission::Granted {
            let permission = self.notifier.request_permission().await;
            debug!(?permission, "Notification permission");
        }

        if let Some((lat, lon)) = position {
            self.search_coordinates(lat, lon).await;
        }
    }

    pub fn set_input(&mut self, text: impl Into<String>) {
        self.view.input = text.into();
    }

    /// Enter pressed in the search box.
    pub async fn submit(&mut self) -> SearchOutcome {
        let input = self.view.input.clone();
        self.search(&input).await
    }

    /// Click on a recent-search entry.
    pub async fn select_recent(&mut self, city: &str) -> SearchOutcome {
        self.set_input(city);
        self.search(city).await
    }

    pub async fn search(&mut self, input: &str) -> SearchOutcome {
        let query = LocationQuery::from(input);
        if query.is_blank() {
            return SearchOutcome::Ignored;
        }

        if self.connectivity == Connectivity::Offline {
            return self.enqueue(&query).await;
        }

        self.begin_loading();
        let result = self.provider.fetch_conditions(&query).await;
        self.view.loading = false;
        self.apply(result)
    }

    pub async fn search_coordinates(&mut self, lat: f64, lon: f64) -> SearchOutcome {
        self.begin_loading();
        let result = self
            .provider
            .fetch_conditions(&LocationQuery::coordinates(lat, lon))
            .await;
        self.view.loading = false;

        match result {
            Ok(record) => {
                self.display(record);
                SearchOutcome::Displayed
            }
            Err(err) => {
                warn!(error = %err, "Geolocation lookup failed");
                self.view.error = Some(LOCATION_FAILED_MESSAGE.to_string());
                SearchOutcome::Failed
            }
        }
    }

    pub fn toggle_unit(&mut self) {
        self.view.unit = self.view.unit.toggled();
    }

    /// e.g. "21 °C"; `None` when nothing is displayed.
    pub fn temperature_label(&self) -> Option<String> {
        let record = self.view.weather.as_ref()?;
        let unit = self.view.unit;
        Some(format!("{} {}", record.temperature(unit), unit.symbol()))
    }

    /// Record a connectivity change; an Offline → Online edge drains the
    /// offline queue.
    pub async fn set_connectivity(&mut self, next: Connectivity) -> Option<DrainSummary> {
        let previous = std::mem::replace(&mut self.connectivity, next);
        if previous == Connectivity::Offline && next == Connectivity::Online {
            info!("Back online");
            match self.process_offline_queue().await {
                Ok(summary) => return Some(summary),
                Err(err) => warn!(error = %err, "Offline queue drain failed"),
            }
        }
        None
    }

    /// React to connectivity changes until the sender goes away.
    pub async fn watch_connectivity(&mut self, mut rx: watch::Receiver<Connectivity>) {
        while rx.changed().await.is_ok() {
            let next = *rx.borrow_and_update();
            self.set_connectivity(next).await;
        }
    }

    /// Replay every queued search in order. Failures are reported in the
    /// banner like direct searches, but never requeued.
    pub async fn process_offline_queue(&mut self) -> Result<DrainSummary, QueueError> {
        let provider = Arc::clone(&self.provider);
        let outcomes = self
            .queue
            .drain_and_process(move |city| {
                let provider = Arc::clone(&provider);
                async move { provider.fetch_conditions(&LocationQuery::from(city.as_str())).await }
            })
            .await?;

        let mut summary = DrainSummary::default();
        for outcome in outcomes {
            summary.processed += 1;
            if self.apply(outcome.result) == SearchOutcome::Failed {
                summary.failed += 1;
            }
        }
        Ok(summary)
    }

    pub async fn pending_searches(&self) -> Result<Vec<String>, QueueError> {
        self.queue.snapshot().await
    }

    /// A local notification, shown only with permission. Returns whether
    /// it was shown.
    pub async fn show_local_notification(&self, notification: Notification) -> bool {
        if self.notifier.permission() != Permission::Granted {
            debug!("Notification permission not granted; skipping");
            return false;
        }
        self.notifier.show(notification).await;
        true
    }

    async fn enqueue(&mut self, query: &LocationQuery) -> SearchOutcome {
        match self.queue.enqueue(&query.descriptor()).await {
            Ok(pending) => {
                info!(query = %query, pending, "Offline; search queued");
                self.view.error = Some(OFFLINE_MESSAGE.to_string());
                SearchOutcome::Queued { pending }
            }
            Err(err) => {
                warn!(query = %query, error = %err, "Could not queue offline search");
                self.view.error = Some(QUEUE_FAILED_MESSAGE.to_string());
                SearchOutcome::Failed
            }
        }
    }

    fn begin_loading(&mut self) {
        self.view.loading = true;
        self.view.error = None;
    }

    fn apply(&mut self, result: Result<WeatherRecord, QueryError>) -> SearchOutcome {
        match result {
            Ok(record) => {
                self.view.input.clear();
                self.display(record);
                SearchOutcome::Displayed
            }
            Err(err) => {
                debug!(error = %err, "Query failed");
                self.view.error = Some(err.user_message());
                self.view.weather = None;
                SearchOutcome::Failed
            }
        }
    }

    fn display(&mut self, record: WeatherRecord) {
        match self.recent.record(&record.location.name) {
            Ok(recent) => self.view.recent = recent,
            Err(err) => warn!(error = %err, "Failed to persist recent searches"),
        }
        self.view.weather = Some(record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        queue::OfflineQueue,
        store::{KeyValueStore, MemoryStore, StoreKey},
        testing::{FakeProvider, RecordingNotifier},
    };

    struct Page {
        controller: PageController,
        provider: Arc<FakeProvider>,
        notifier: Arc<RecordingNotifier>,
        store: Arc<MemoryStore>,
        queue: QueueHandle,
    }

    fn page_with(provider: FakeProvider, connectivity: Connectivity) -> Page {
        page_full(provider, RecordingNotifier::granted(), connectivity)
    }

    fn page_full(
        provider: FakeProvider,
        notifier: RecordingNotifier,
        connectivity: Connectivity,
    ) -> Page {
        let store = Arc::new(MemoryStore::new());
        let provider = Arc::new(provider);
        let notifier = Arc::new(notifier);
        let (queue, _task) = QueueHandle::spawn(OfflineQueue::new(store.clone()));
        let controller = PageController::new(
            provider.clone(),
            RecentSearches::new(store.clone()),
            queue.clone(),
            notifier.clone(),
            connectivity,
        );
        Page { controller, provider, notifier, store, queue }
    }

    #[tokio::test]
    async fn successful_search_displays_and_records() {
        let mut page = page_with(FakeProvider::new().found("Paris"), Connectivity::Online);
        page.controller.set_input("paris");

        let outcome = page.controller.submit().await;

        let view = page.controller.view();
        assert_eq!(outcome, SearchOutcome::Displayed);
        assert_eq!(view.weather.as_ref().unwrap().location.name, "Paris");
        assert!(view.input.is_empty());
        assert!(!view.loading);
        assert_eq!(view.recent, ["Paris"]);
        assert_eq!(page.provider.queries(), ["paris"]);
    }

    #[tokio::test]
    async fn paris_lyon_paris_yields_two_recent() {
        let provider = FakeProvider::new().found("Paris").found("Lyon").found("Paris");
        let mut page = page_with(provider, Connectivity::Online);

        for city in ["Paris", "Lyon", "Paris"] {
            page.controller.search(city).await;
        }

        assert_eq!(page.controller.view().recent, ["Paris", "Lyon"]);
    }

    #[tokio::test]
    async fn not_found_shows_banner_and_keeps_recent() {
        let provider = FakeProvider::new().found("Paris").not_found();
        let mut page = page_with(provider, Connectivity::Online);
        page.controller.search("Paris").await;

        let outcome = page.controller.search("Atlantis").await;

        let view = page.controller.view();
        assert_eq!(outcome, SearchOutcome::Failed);
        assert_eq!(view.error.as_deref(), Some("City not found. Please try again."));
        assert!(view.weather.is_none());
        assert_eq!(view.recent, ["Paris"]);
    }

    #[tokio::test]
    async fn network_error_has_its_own_message() {
        let mut page = page_with(FakeProvider::new().network_error(), Connectivity::Online);
        page.controller.search("Paris").await;

        let error = page.controller.view().error.clone().unwrap();
        assert!(error.contains("Network error"));
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut page = page_with(FakeProvider::new(), Connectivity::Online);
        assert_eq!(page.controller.search("  ").await, SearchOutcome::Ignored);
        assert!(page.provider.queries().is_empty());
    }

    #[tokio::test]
    async fn offline_search_is_queued_not_fetched() {
        let mut page = page_with(FakeProvider::new(), Connectivity::Offline);

        let outcome = page.controller.search("Tokyo").await;

        assert_eq!(outcome, SearchOutcome::Queued { pending: 1 });
        assert_eq!(page.controller.view().error.as_deref(), Some(OFFLINE_MESSAGE));
        assert!(page.provider.queries().is_empty());
        assert_eq!(page.queue.snapshot().await.unwrap(), ["Tokyo"]);
    }

    #[tokio::test]
    async fn reconnect_drains_queue_once() {
        let mut page = page_with(FakeProvider::new().found("Tokyo"), Connectivity::Offline);
        page.controller.search("Tokyo").await;

        let summary = page.controller.set_connectivity(Connectivity::Online).await;

        assert_eq!(summary, Some(DrainSummary { processed: 1, failed: 0 }));
        assert_eq!(page.provider.queries(), ["Tokyo"]);
        assert!(page.queue.snapshot().await.unwrap().is_empty());
        assert_eq!(page.controller.view().recent, ["Tokyo"]);
    }

    #[tokio::test]
    async fn failed_replay_is_dropped() {
        let mut page = page_with(FakeProvider::new().network_error(), Connectivity::Offline);
        page.controller.search("Tokyo").await;

        let summary = page.controller.set_connectivity(Connectivity::Online).await;

        assert_eq!(summary, Some(DrainSummary { processed: 1, failed: 1 }));
        assert_eq!(page.provider.queries(), ["Tokyo"]);
        assert!(page.queue.snapshot().await.unwrap().is_empty());
        assert!(page.store.get(StoreKey::OfflineQueue).unwrap().is_none());
    }

    #[tokio::test]
    async fn only_offline_to_online_edge_drains() {
        let mut page = page_with(FakeProvider::new(), Connectivity::Online);
        page.queue.enqueue("Tokyo").await.unwrap();

        assert_eq!(page.controller.set_connectivity(Connectivity::Online).await, None);
        assert_eq!(page.controller.set_connectivity(Connectivity::Offline).await, None);
        assert_eq!(page.queue.snapshot().await.unwrap(), ["Tokyo"]);
    }

    #[tokio::test]
    async fn watch_connectivity_drains_on_reconnect() {
        let mut page = page_with(FakeProvider::new().found("Tokyo"), Connectivity::Offline);
        page.controller.search("Tokyo").await;

        let (tx, rx) = watch::channel(Connectivity::Offline);
        tx.send(Connectivity::Online).unwrap();
        drop(tx);
        page.controller.watch_connectivity(rx).await;

        assert_eq!(page.controller.connectivity(), Connectivity::Online);
        assert_eq!(page.provider.queries(), ["Tokyo"]);
    }

    #[tokio::test]
    async fn init_restores_recent_and_asks_permission() {
        let store_json = r#"["Oslo","Bergen"]"#;
        let notifier = RecordingNotifier::with_permission(Permission::Default, true);
        let mut page = page_full(FakeProvider::new(), notifier, Connectivity::Online);
        page.store.set(StoreKey::RecentSearches, store_json).unwrap();

        page.controller.init(None).await;

        assert_eq!(page.controller.view().recent, ["Oslo", "Bergen"]);
        assert_eq!(page.notifier.permission_requests(), 1);
    }

    #[tokio::test]
    async fn init_with_position_looks_up_coordinates() {
        let mut page = page_with(FakeProvider::new().found("Paris"), Connectivity::Online);

        page.controller.init(Some((48.85, 2.35))).await;

        assert_eq!(page.provider.queries(), ["48.85,2.35"]);
        assert_eq!(page.controller.view().recent, ["Paris"]);
        assert_eq!(page.notifier.permission_requests(), 0);
    }

    #[tokio::test]
    async fn failed_geolocation_uses_location_message() {
        let mut page = page_with(FakeProvider::new().not_found(), Connectivity::Online);
        page.controller.search_coordinates(0.0, 0.0).await;

        assert_eq!(page.controller.view().error.as_deref(), Some(LOCATION_FAILED_MESSAGE));
    }

    #[tokio::test]
    async fn unit_toggle_changes_label() {
        let mut page = page_with(FakeProvider::new().found("Paris"), Connectivity::Online);
        assert_eq!(page.controller.temperature_label(), None);

        page.controller.search("Paris").await;
        assert_eq!(page.controller.temperature_label().as_deref(), Some("69.8 °F"));

        page.controller.toggle_unit();
        assert_eq!(page.controller.temperature_label().as_deref(), Some("21 °C"));
    }

    #[tokio::test]
    async fn select_recent_searches_again() {
        let mut page = page_with(FakeProvider::new().found("Lyon"), Connectivity::Online);
        assert_eq!(page.controller.select_recent("Lyon").await, SearchOutcome::Displayed);
        assert_eq!(page.provider.queries(), ["Lyon"]);
    }

    #[tokio::test]
    async fn local_notification_needs_permission() {
        let denied = RecordingNotifier::with_permission(Permission::Denied, false);
        let page = page_full(FakeProvider::new(), denied, Connectivity::Online);

        let shown = page
            .controller
            .show_local_notification(Notification::new("Hi", "there"))
            .await;

        assert!(!shown);
        assert!(page.notifier.shown().is_empty());
    }
}
