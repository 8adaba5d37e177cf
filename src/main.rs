//! Ion gauge monitor
//!
//! Opens the LabJack U6, polls the ion gauge controller output and shows the
//! pressure in a small window with a button for the gauge power relay.
//!
//! # Usage
//!
//! ```bash
//! ion-gauge-monitor                              # config/monitor.toml + ION_GAUGE_* env
//! ion-gauge-monitor --config lab.toml --relay EIO3
//! ion-gauge-monitor --backend simulated          # demo readings without hardware
//! ion-gauge-monitor --print-config
//! ```

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use eframe::egui;
use tracing::info;

use ion_gauge_monitor::config::{DeviceBackend, MonitorConfig};
use ion_gauge_monitor::gui::GaugeApp;
use ion_gauge_monitor::hardware;
use ion_gauge_monitor::logging;
use ion_gauge_monitor::monitor::MonitorSession;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[derive(Parser)]
#[command(name = "ion-gauge-monitor")]
#[command(about = "Ion gauge pressure readout and relay control", long_about = None)]
struct Cli {
    /// Configuration file (default: config/monitor.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Device backend
    #[arg(long, value_enum)]
    backend: Option<DeviceBackend>,

    /// Relay line, e.g. FIO0 or EIO3
    #[arg(long)]
    relay: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Print the effective configuration and exit
    #[arg(long)]
    print_config: bool,
}

impl Cli {
    fn apply(&self, config: &mut MonitorConfig) {
        if let Some(backend) = self.backend {
            config.device.backend = backend;
        }
        if let Some(relay) = &self.relay {
            config.gauge.relay = relay.clone();
        }
        if let Some(level) = &self.log_level {
            config.application.log_level = level.clone();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => MonitorConfig::load_from(path),
        None => MonitorConfig::load(),
    }
    .context("Failed to load configuration")?;
    cli.apply(&mut config);
    config.validate().context("Invalid configuration")?;

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    logging::init_from_config(&config).map_err(|e| anyhow!(e))?;
    info!(
        name = %config.application.name,
        backend = ?config.device.backend,
        relay = %config.gauge.relay,
        "Starting"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .thread_name("monitor-runtime")
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    let device = hardware::open_device(&config);
    let mut session = MonitorSession::start(&config, device, runtime.handle().clone())?;
    let events = session
        .take_events()
        .ok_or_else(|| anyhow!("Event receiver already taken"))?;
    let controller = session.controller();

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([config.window.width, config.window.height])
            .with_title(&config.window.title),
        ..Default::default()
    };

    let gui_result = eframe::run_native(
        &config.application.name,
        options,
        Box::new(move |cc| Ok(Box::new(GaugeApp::new(cc, controller, events)))),
    );

    let final_state = session.shutdown();
    info!(?final_state, "Monitor closed");
    runtime.shutdown_timeout(Duration::from_millis(config.recovery.shutdown_grace_ms));

    gui_result.map_err(|e| anyhow!("GUI error: {e}"))
}
