pub mod dispatch;
pub mod instance;
pub mod models;
pub mod segmentation;
pub mod sensing;
pub mod settings;
pub mod utils;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use dispatch::{BatchDispatcher, Classifier, CsvSink, LogStore, OpenAiClassifier, Pipeline};
use instance::InstanceLock;
use segmentation::Tracker;
use sensing::{
    spawn_event_listener, spawn_idle_listener, InputMonitor, TrackerController, X11WindowSensor,
    XprintidleProbe,
};
use settings::{Settings, API_KEY_ENV};

const IDLE_POLL_INTERVAL: Duration = Duration::from_millis(250);
const RUNTIME_LOG: &str = "runtime.log";

/// Command-line overrides for a tracking run.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub data_dir: Option<PathBuf>,
}

/// Track until Ctrl-C or SIGTERM.
pub async fn run(options: RunOptions) -> Result<()> {
    let config_path = options.config_path.unwrap_or_else(Settings::default_path);
    // The logger needs the data dir from the settings, so a bad file is reported after init.
    let (mut settings, load_error) = match Settings::load(&config_path) {
        Ok(settings) => (settings, None),
        Err(err) => (Settings::default(), Some(err)),
    };
    settings.apply_env_override(std::env::var(API_KEY_ENV).ok());
    if options.data_dir.is_some() {
        settings.data_dir = options.data_dir;
    }

    let data_dir = settings.resolved_data_dir();
    fs::create_dir_all(&data_dir)
        .with_context(|| format!("failed to create data directory {}", data_dir.display()))?;
    utils::logging::init(&data_dir.join(RUNTIME_LOG))?;
    if let Some(err) = load_error {
        warn!("{err:#}; using default settings");
    }

    let _instance = InstanceLock::acquire(settings.lock_port)?;
    log_startup(&settings, &config_path, &data_dir);

    let monitor = InputMonitor::new();
    if let Err(err) = spawn_idle_listener(monitor.clone(), XprintidleProbe, IDLE_POLL_INTERVAL) {
        warn!("Idle detection disabled: {err:#}");
        monitor.disable_idle_tracking();
    }
    if let Err(err) = spawn_event_listener(monitor.clone()) {
        warn!("Input counting disabled, activity will read low: {err:#}");
    }

    let tracker = Tracker::new(settings.segmentation(), settings.browsers(), monitor);
    let sensor = X11WindowSensor::new(settings.browsers(), settings.url_command.as_deref());
    let classifier = OpenAiClassifier::from_settings(&settings)
        .map(|classifier| Arc::new(classifier) as Arc<dyn Classifier>);
    let pipeline = Pipeline::new(
        LogStore::new(&data_dir)?,
        CsvSink::new(&data_dir),
        classifier,
        settings.retry_policy(),
    );
    let dispatcher = BatchDispatcher::new(pipeline, settings.batch_size);

    let mut controller = TrackerController::new();
    controller.start(tracker, sensor, dispatcher)?;

    shutdown_signal().await;
    controller.stop().await?;
    info!("Tracker stopped");
    Ok(())
}

/// Write the default settings file unless one exists. Returns the path and
/// whether it was created.
pub fn init_config(config_path: Option<PathBuf>) -> Result<(PathBuf, bool)> {
    let path = config_path.unwrap_or_else(Settings::default_path);
    if path.exists() {
        return Ok((path, false));
    }
    Settings::default().save(&path)?;
    Ok((path, true))
}

fn log_startup(settings: &Settings, config_path: &Path, data_dir: &Path) {
    info!("tasklog {} starting", env!("CARGO_PKG_VERSION"));
    info!("Config: {}", config_path.display());
    info!("Data dir: {}", data_dir.display());
    info!(
        "Model: {} | batch {} | debounce {}s | idle {}s/{}s | sleep {}s",
        settings.model,
        settings.batch_size,
        settings.check_interval,
        settings.idle_timeout,
        settings.idle_exit_threshold,
        settings.sleep_threshold
    );
    let browsers = settings.browsers();
    if browsers.is_empty() {
        info!("Browsers: none, URLs are not tracked");
    } else {
        info!("Browsers: {} known", browsers.len());
    }
    info!(
        "Classifier: {}",
        if settings.api_key.trim().is_empty() {
            "disabled (no API key)"
        } else {
            settings.base_url.as_str()
        }
    );
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = ctrl_c => info!("received ctrl-c, shutting down"),
                    _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
                }
            }
            Err(err) => {
                warn!("failed to register SIGTERM handler: {err}");
                ctrl_c.await.ok();
                info!("received ctrl-c, shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("received ctrl-c, shutting down");
    }
}
