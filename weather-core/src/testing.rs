//! In-process doubles for the traits at the crate's seams.

use std::{
    collections::{HashMap, VecDeque},
    sync::atomic::{AtomicBool, AtomicUsize, Ordering},
};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::{
    error::QueryError,
    model::{LocationQuery, WeatherRecord, fixtures},
    provider::WeatherProvider,
    worker::{
        Clients, FetchError, Network, Notification, Notifier, Permission, Request, Response,
        WindowClient, notify::ClientError,
    },
};

#[derive(Debug, Default)]
pub struct ScriptedNetwork {
    routes: HashMap<String, Response>,
    offline: AtomicBool,
    calls: AtomicUsize,
}

impl ScriptedNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: &str, body: &str) -> Self {
        self.routes.insert(url.to_string(), Response::ok(url, "text/html", body));
        self
    }

    pub fn status(mut self, url: &str, status: u16) -> Self {
        let mut response = Response::ok(url, "text/plain", "");
        response.status = status;
        self.routes.insert(url.to_string(), response);
        self
    }

    pub fn go_offline(&self) {
        self.offline.store(true, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Network for ScriptedNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline.load(Ordering::SeqCst) {
            return Err(FetchError::Offline);
        }
        self.routes
            .get(&request.url)
            .cloned()
            .ok_or_else(|| FetchError::Transport {
                url: request.url.clone(),
                reason: "connection refused".to_string(),
            })
    }
}

#[derive(Debug)]
pub struct RecordingNotifier {
    permission: Mutex<Permission>,
    grant_on_request: bool,
    permission_requests: AtomicUsize,
    shown: Mutex<Vec<Notification>>,
    closed: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub fn with_permission(permission: Permission, grant_on_request: bool) -> Self {
        Self {
            permission: Mutex::new(permission),
            grant_on_request,
            permission_requests: AtomicUsize::new(0),
            shown: Mutex::new(Vec::new()),
            closed: Mutex::new(Vec::new()),
        }
    }

    pub fn granted() -> Self {
        Self::with_permission(Permission::Granted, true)
    }

    pub fn shown(&self) -> Vec<Notification> {
        self.shown.lock().clone()
    }

    pub fn closed(&self) -> Vec<Notification> {
        self.closed.lock().clone()
    }

    pub fn permission_requests(&self) -> usize {
        self.permission_requests.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    fn permission(&self) -> Permission {
        *self.permission.lock()
    }

    async fn request_permission(&self) -> Permission {
        self.permission_requests.fetch_add(1, Ordering::SeqCst);
        let mut permission = self.permission.lock();
        if self.grant_on_request {
            *permission = Permission::Granted;
        } else {
            *permission = Permission::Denied;
        }
        *permission
    }

    async fn show(&self, notification: Notification) {
        self.shown.lock().push(notification);
    }

    async fn close(&self, notification: &Notification) {
        self.closed.lock().push(notification.clone());
    }
}

#[derive(Debug, Default)]
pub struct FakeClients {
    windows: Mutex<Vec<WindowClient>>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
}

impl FakeClients {
    pub fn add_window(&self, id: &str, url: Option<&str>, focusable: bool) {
        self.windows.lock().push(WindowClient {
            id: id.to_string(),
            url: url.map(str::to_string),
            focusable,
        });
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().clone()
    }
}

#[async_trait]
impl Clients for FakeClients {
    async fn windows(&self) -> Vec<WindowClient> {
        self.windows.lock().clone()
    }

    async fn focus(&self, id: &str) -> Result<(), ClientError> {
        self.focused.lock().push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<(), ClientError> {
        self.opened.lock().push(url.to_string());
        Ok(())
    }
}

/// Scripted answers, consumed in order; every query is recorded.
#[derive(Debug, Default)]
pub struct FakeProvider {
    answers: Mutex<VecDeque<Result<WeatherRecord, QueryError>>>,
    queries: Mutex<Vec<String>>,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn found(self, name: &str) -> Self {
        self.answers.lock().push_back(Ok(fixtures::record(name)));
        self
    }

    pub fn not_found(self) -> Self {
        self.answers.lock().push_back(Err(QueryError::NotFound { query: String::new() }));
        self
    }

    pub fn network_error(self) -> Self {
        self.answers
            .lock()
            .push_back(Err(QueryError::Network("connection reset".to_string())));
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().clone()
    }
}

#[async_trait]
impl WeatherProvider for FakeProvider {
    async fn fetch_conditions(&self, query: &LocationQuery) -> Result<WeatherRecord, QueryError> {
        self.queries.lock().push(query.descriptor());
        self.answers
            .lock()
            .pop_front()
            .unwrap_or_else(|| Err(QueryError::Network("no scripted answer".to_string())))
    }
}
