//! rollcalld - The rollcall background service
//!
//! Wires together:
//! - Configuration loading
//! - The attendance ledger
//! - The core engine
//! - A location feed (NDJSON on stdin or a file)

use anyhow::{Context, Result};
use chrono::{DateTime, Local};
use clap::Parser;
use rollcall_api::{AuthorizationStatus, Verdict};
use rollcall_config::{Settings, load_config};
use rollcall_core::{CoreEngine, CoreEvent};
use rollcall_location_api::{FeedMonitor, LocationMonitor};
use rollcall_store::{AuditEvent, AuditEventType, SqliteStore, Store};
use rollcall_util::{LEDGER_FILENAME, default_config_path, format_clock_time};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::BufReader;
use tokio::signal::unix::{SignalKind, signal};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

/// rollcalld - Geofence attendance confirmation service
#[derive(Parser, Debug)]
#[command(name = "rollcalld")]
#[command(about = "Confirms class attendance from geofence events", long_about = None)]
struct Args {
    /// Configuration file path (default: ~/.config/rollcall/config.toml)
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    /// Data directory override (or set ROLLCALL_DATA_DIR env var)
    #[arg(short, long, env = "ROLLCALL_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Read location events from this file instead of stdin
    #[arg(short, long)]
    feed: Option<PathBuf>,

    /// Treat location permission as already granted
    #[arg(long)]
    authorized: bool,

    /// Log level
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

/// Main service state
struct Service {
    config_path: PathBuf,
    settings: Settings,
    engine: CoreEngine,
    monitor: Arc<FeedMonitor>,
    store: Arc<dyn Store>,
    feed_task: JoinHandle<()>,
}

impl Service {
    async fn new(args: &Args) -> Result<Self> {
        let settings = load_config(&args.config)
            .with_context(|| format!("Failed to load config from {:?}", args.config))?;

        info!(
            config_path = %args.config.display(),
            meeting_count = settings.meetings.len(),
            "Configuration loaded"
        );

        let data_dir = args
            .data_dir
            .clone()
            .unwrap_or_else(|| settings.service.data_dir.clone());

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory {:?}", data_dir))?;

        let db_path = data_dir.join(LEDGER_FILENAME);
        let store: Arc<dyn Store> = Arc::new(
            SqliteStore::open(&db_path)
                .with_context(|| format!("Failed to open ledger {:?}", db_path))?,
        );

        info!(db_path = %db_path.display(), "Ledger opened");

        store.append_audit(AuditEvent::new(AuditEventType::ServiceStarted))?;

        let initial = if args.authorized {
            AuthorizationStatus::AuthorizedAlways
        } else {
            AuthorizationStatus::NotDetermined
        };
        let monitor = Arc::new(FeedMonitor::new(initial, settings.engine.sample_limits()));

        let feed_task = match &args.feed {
            Some(path) => {
                let file = tokio::fs::File::open(path)
                    .await
                    .with_context(|| format!("Failed to open location feed {:?}", path))?;
                info!(path = %path.display(), "Reading location feed from file");
                monitor.spawn_reader(BufReader::new(file))
            }
            None => {
                info!("Reading location feed from stdin");
                monitor.spawn_reader(BufReader::new(tokio::io::stdin()))
            }
        };

        let engine = CoreEngine::new(settings.engine.clone(), store.clone(), monitor.clone());

        Ok(Self {
            config_path: args.config.clone(),
            settings,
            engine,
            monitor,
            store,
            feed_task,
        })
    }

    async fn run(mut self) -> Result<()> {
        let mut location_events = self
            .monitor
            .subscribe()
            .context("Location event stream already taken")?;

        let now = rollcall_util::now();
        let events = self
            .engine
            .configure(self.settings.meetings.clone(), now)
            .context("Failed to apply meeting catalog")?;
        self.handle_core_events(events);

        let mut sigterm = signal(SignalKind::terminate())
            .context("Failed to create SIGTERM handler")?;
        let mut sigint = signal(SignalKind::interrupt())
            .context("Failed to create SIGINT handler")?;
        let mut sighup = signal(SignalKind::hangup())
            .context("Failed to create SIGHUP handler")?;
        let mut sigusr1 = signal(SignalKind::user_defined1())
            .context("Failed to create SIGUSR1 handler")?;

        // Timer deadlines have one-second resolution in practice
        let mut tick_timer = tokio::time::interval(Duration::from_secs(1));

        info!("Service running");

        loop {
            tokio::select! {
                _ = sigterm.recv() => {
                    info!("Received SIGTERM, shutting down gracefully");
                    break;
                }
                _ = sigint.recv() => {
                    info!("Received SIGINT, shutting down gracefully");
                    break;
                }

                // SIGHUP - reload the meeting catalog
                _ = sighup.recv() => {
                    self.reload();
                }

                // SIGUSR1 - dump the current agenda
                _ = sigusr1.recv() => {
                    self.log_snapshot();
                }

                _ = tick_timer.tick() => {
                    let events = self.engine.tick(rollcall_util::now());
                    self.handle_core_events(events);
                }

                Some(event) = location_events.recv() => {
                    debug!(event = ?event, "Location event");
                    let events = self.engine.handle_location_event(event, rollcall_util::now());
                    self.handle_core_events(events);
                }
            }
        }

        info!("Shutting down rollcalld");

        self.feed_task.abort();
        let now = rollcall_util::now();
        self.engine.shutdown(now);
        self.log_day_summary(now);

        if let Err(e) = self.store.append_audit(AuditEvent::new(AuditEventType::ServiceStopped)) {
            warn!(error = %e, "Failed to log service shutdown");
        }

        info!("Shutdown complete");
        Ok(())
    }

    fn reload(&mut self) {
        info!(config_path = %self.config_path.display(), "Reloading configuration");

        let settings = match load_config(&self.config_path) {
            Ok(settings) => settings,
            Err(e) => {
                error!(error = %e, "Reload failed, keeping current catalog");
                return;
            }
        };

        if settings.engine != *self.engine.params() {
            warn!("Engine parameters changed on disk; restart rollcalld to apply them");
        }

        match self.engine.configure(settings.meetings.clone(), rollcall_util::now()) {
            Ok(events) => {
                self.settings = settings;
                self.handle_core_events(events);
            }
            Err(e) => error!(error = %e, "Reload rejected, keeping current catalog"),
        }
    }

    fn handle_core_events(&self, events: Vec<CoreEvent>) {
        for event in events {
            match event {
                CoreEvent::AgendaApplied { run_id, day, meeting_count } => {
                    info!(run_id = %run_id, day = %day, meeting_count, "Agenda ready");
                }
                CoreEvent::AuthorizationChanged { status } => {
                    if status.is_denied() {
                        warn!(status = ?status, "Location permission denied, attendance cannot be confirmed");
                    } else {
                        info!(status = ?status, "Location permission changed");
                    }
                }
                CoreEvent::DwellStarted { meeting_id, entered_at } => {
                    info!(
                        meeting_id = %meeting_id,
                        entered_at = %format_clock_time(&entered_at),
                        "Arrived, confirming attendance"
                    );
                }
                CoreEvent::DwellAbandoned { meeting_id } => {
                    info!(meeting_id = %meeting_id, "Left before attendance was confirmed");
                }
                CoreEvent::VerdictReached { meeting_id, verdict, at } => {
                    let name = self
                        .engine
                        .catalog()
                        .get(&meeting_id)
                        .map(|m| m.name.as_str())
                        .unwrap_or("unknown meeting");
                    match verdict {
                        Verdict::Present => info!(
                            meeting_id = %meeting_id,
                            at = %format_clock_time(&at),
                            "Attendance confirmed: {}", name
                        ),
                        Verdict::Absent => warn!(
                            meeting_id = %meeting_id,
                            at = %format_clock_time(&at),
                            "Marked absent: {}", name
                        ),
                    }
                }
            }
        }
    }

    fn log_snapshot(&self) {
        let snapshot = self.engine.snapshot();
        match serde_json::to_string(&snapshot) {
            Ok(json) => info!(snapshot = %json, "Engine snapshot"),
            Err(e) => warn!(error = %e, "Failed to serialize snapshot"),
        }
    }

    fn log_day_summary(&self, now: DateTime<Local>) {
        let records = match self.store.verdicts_for_day(now.date_naive()) {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "Failed to read today's ledger");
                return;
            }
        };

        let present = records.iter().filter(|r| r.verdict == Verdict::Present).count();
        let missed_cost: f64 = records
            .iter()
            .filter(|r| r.verdict == Verdict::Absent)
            .filter_map(|r| r.cost)
            .sum();

        info!(
            decided = records.len(),
            present,
            absent = records.len() - present,
            missed_cost,
            "Today's attendance"
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "rollcalld starting");

    if rollcall_util::is_mock_time_active() {
        warn!(now = %rollcall_util::now(), "Mock time is active");
    }

    let service = Service::new(&args).await?;
    let result = service.run().await;

    // A blocking stdin read cannot be cancelled and would hold up runtime
    // shutdown until the next line arrives
    if let Err(e) = &result {
        error!(error = %format!("{:#}", e), "rollcalld failed");
        std::process::exit(1);
    }
    std::process::exit(0);
}
