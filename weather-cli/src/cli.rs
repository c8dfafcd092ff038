use anyhow::{Context, bail};
use clap::{Parser, Subcommand, ValueEnum};
use inquire::{Password, PasswordDisplayMode, Select};
use weather_core::{
    Config, Connectivity, PageController, SearchOutcome, TemperatureUnit,
    worker::{ClickOutcome, FetchSource, Notification, Request, SYNC_TAG},
};

use crate::{
    app::App,
    console::{render, render_recent},
};

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather", version, about = "Offline-first weather lookup")]
pub struct Cli {
    /// More log output (-v info, -vv debug). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum Unit {
    C,
    F,
}

impl From<Unit> for TemperatureUnit {
    fn from(unit: Unit) -> Self {
        match unit {
            Unit::C => TemperatureUnit::Celsius,
            Unit::F => TemperatureUnit::Fahrenheit,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the WeatherAPI.com API key.
    Configure,

    /// Show current weather for a city (or "lat,lon").
    Show {
        query: String,

        /// Treat the network as down: the search is queued for later.
        #[arg(long)]
        offline: bool,

        #[arg(long, value_enum, default_value = "f")]
        unit: Unit,
    },

    /// Show current weather for coordinates.
    Here {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,

        #[arg(long, allow_negative_numbers = true)]
        lon: f64,

        #[arg(long, value_enum, default_value = "f")]
        unit: Unit,
    },

    /// Pick a recent search and look it up again.
    Recent,

    /// List searches waiting for the network.
    Queue,

    /// Back online: sync notifications, then replay queued searches.
    Sync,

    /// Fetch URLs through the cache worker.
    Shell {
        /// Paths or URLs, resolved against the shell origin.
        #[arg(required = true)]
        urls: Vec<String>,

        /// Fetch with the network down.
        #[arg(long)]
        offline: bool,
    },

    /// Deliver a push message (JSON) to the cache worker.
    Push {
        payload: Option<String>,

        /// Also click the notification once shown.
        #[arg(long)]
        click: bool,
    },

    /// Show the demo notification.
    Notify,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<()> {
        match self.command {
            Command::Configure => configure()?,
            Command::Show { query, offline, unit } => {
                let app = App::open()?;
                let connectivity = if offline {
                    Connectivity::Offline
                } else {
                    Connectivity::Online
                };
                let mut page = app.page(connectivity)?;
                page.init(None).await;
                set_unit(&mut page, unit.into());
                page.set_input(query);
                eprintln!("Loading...");
                let outcome = page.submit().await;
                show_outcome(&page, &outcome);
            }
            Command::Here { lat, lon, unit } => {
                let app = App::open()?;
                let mut page = app.page(Connectivity::Online)?;
                page.init(None).await;
                set_unit(&mut page, unit.into());
                eprintln!("Loading...");
                let outcome = page.search_coordinates(lat, lon).await;
                show_outcome(&page, &outcome);
            }
            Command::Recent => {
                let app = App::open()?;
                let mut page = app.page(Connectivity::Online)?;
                page.init(None).await;
                let recent = page.view().recent.clone();
                if recent.is_empty() {
                    println!("No recent searches yet.");
                    return Ok(());
                }
                let city = Select::new("Recent searches", recent)
                    .prompt()
                    .context("No city selected")?;
                eprintln!("Loading...");
                let outcome = page.select_recent(&city).await;
                show_outcome(&page, &outcome);
            }
            Command::Queue => {
                let app = App::open()?;
                let pending = app.queue().snapshot().await?;
                if pending.is_empty() {
                    println!("No searches waiting.");
                }
                for (i, city) in pending.iter().enumerate() {
                    println!("{}. {city}", i + 1);
                }
            }
            Command::Sync => {
                let app = App::open()?;
                let (worker, _) = app.worker(false)?;
                worker.handle_sync(SYNC_TAG).await?;

                let mut page = app.page(Connectivity::Offline)?;
                page.init(None).await;
                match page.set_connectivity(Connectivity::Online).await {
                    Some(summary) if summary.processed > 0 => {
                        println!(
                            "Replayed {} queued search(es), {} failed.",
                            summary.processed, summary.failed
                        );
                        render(page.view(), page.temperature_label());
                    }
                    Some(_) => println!("Nothing queued."),
                    None => bail!("Could not drain the offline queue"),
                }
            }
            Command::Shell { urls, offline } => {
                let app = App::open()?;
                let (mut worker, caches) = app.worker(offline)?;
                let deleted = match worker.resume()? {
                    Some(deleted) => deleted,
                    None => {
                        worker.install().await?;
                        worker.activate().await?
                    }
                };
                for stale in deleted {
                    println!("Deleted stale cache {stale}");
                }
                app.save_caches(&caches)?;
                println!("Cache worker active ({})", worker.generation().name());

                for url in urls {
                    match worker.handle_fetch(&Request::navigate(url.as_str())).await {
                        Ok(outcome) => {
                            let source = match outcome.source {
                                FetchSource::Cache => "cache",
                                FetchSource::Network => "network",
                                FetchSource::OfflineFallback => "offline page",
                            };
                            println!(
                                "{url}: {} from {source} ({} bytes)",
                                outcome.response.status,
                                outcome.response.body.len()
                            );
                        }
                        Err(err) => eprintln!("⚠ {url}: {err}"),
                    }
                }
            }
            Command::Push { payload, click } => {
                let app = App::open()?;
                let (worker, _) = app.worker(false)?;
                let shown = worker.handle_push(payload.as_deref().map(str::as_bytes)).await;
                if click {
                    match worker.handle_notification_click(&shown).await? {
                        ClickOutcome::Focused(id) => println!("Focused window {id}"),
                        ClickOutcome::Opened(_) => {}
                    }
                }
            }
            Command::Notify => {
                let app = App::open()?;
                let page = app.page(Connectivity::Online)?;
                let demo = Notification::new(
                    "Check todays weather!",
                    "Tap to open the app and see the latest forecast.",
                );
                if !page.show_local_notification(demo).await {
                    println!("Notifications are not permitted.");
                }
            }
        }

        Ok(())
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("WeatherAPI.com API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("No API key entered")?;

    if api_key.trim().is_empty() {
        bail!("API key must not be empty");
    }

    config.set_api_key(api_key.trim().to_string());
    config.save()?;
    println!("Saved to {}", Config::config_file_path()?.display());
    Ok(())
}

fn set_unit(page: &mut PageController, unit: TemperatureUnit) {
    if page.view().unit != unit {
        page.toggle_unit();
    }
}

fn show_outcome(page: &PageController, outcome: &SearchOutcome) {
    render(page.view(), page.temperature_label());
    if let SearchOutcome::Queued { pending } = outcome {
        println!("{pending} search(es) waiting for the network.");
    }
    render_recent(&page.view().recent);
}
