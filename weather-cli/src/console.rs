//! Terminal stand-ins for the platform surfaces: notifications print to
//! stdout, and there are no app windows to focus.

use async_trait::async_trait;
use tracing::debug;
use weather_core::{
    ViewState,
    worker::{Clients, Notification, Notifier, Permission, WindowClient, notify::ClientError},
};

#[derive(Debug, Default)]
pub struct ConsoleNotifier;

#[async_trait]
impl Notifier for ConsoleNotifier {
    fn permission(&self) -> Permission {
        Permission::Granted
    }

    async fn request_permission(&self) -> Permission {
        Permission::Granted
    }

    async fn show(&self, notification: Notification) {
        println!("🔔 {}", notification.title);
        println!("   {}", notification.body);
    }

    async fn close(&self, notification: &Notification) {
        debug!(title = %notification.title, "Notification closed");
    }
}

#[derive(Debug)]
pub struct TerminalClients {
    origin: String,
}

impl TerminalClients {
    pub fn new(origin: &str) -> Self {
        Self {
            origin: origin.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl Clients for TerminalClients {
    async fn windows(&self) -> Vec<WindowClient> {
        Vec::new()
    }

    async fn focus(&self, id: &str) -> Result<(), ClientError> {
        Err(ClientError(format!("no window '{id}' in a terminal session")))
    }

    async fn open_window(&self, url: &str) -> Result<(), ClientError> {
        println!("Open {}{} in your browser.", self.origin, url);
        Ok(())
    }
}

/// Print the weather panel and any banner.
pub fn render(view: &ViewState, temperature: Option<String>) {
    if let Some(error) = &view.error {
        eprintln!("⚠ {error}");
    }

    let Some(record) = &view.weather else {
        return;
    };
    let current = &record.current;

    println!("{}", record.place_label());
    if let Some(temperature) = temperature {
        println!("  Temperature: {temperature}");
    }
    println!("  Condition:   {}", current.condition.text);
    println!("  Icon:        {}", current.condition.icon);
    println!("  Humidity:    {}%", current.humidity);
    println!("  Pressure:    {} mb", current.pressure_mb);
    println!("  Visibility:  {} km", current.vis_km);
    if let Some(updated) = current.last_updated {
        let local = updated.with_timezone(&chrono::Local);
        println!("  Updated:     {}", local.format("%Y-%m-%d %H:%M"));
    }
}

pub fn render_recent(recent: &[String]) {
    if recent.is_empty() {
        return;
    }
    println!();
    println!("Recent searches: {}", recent.join(" · "));
}
