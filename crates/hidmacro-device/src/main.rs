//! hidmacro device runtime entry point.
//!
//! Wires together the configuration file, the HID gadget transport, the serial
//! command line and the scheduler, then runs the cooperative loop until Ctrl-C
//! or a fatal HID failure.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ load_config()                      -- TOML file + CLI overrides
//!  └─ HidGadgetTransport::open()          -- /dev/hidg0
//!  └─ ReportCodec::flush()                -- probe: all-zero report
//!  └─ SerialLineTransport::open()         -- /dev/ttyGS0, raw mode + reader thread
//!  └─ spawn_blocking(Scheduler::run)      -- serve command / advance playback
//! ```
//!
//! `init-config` writes the effective settings out as a TOML file instead of
//! running.
//!
//! The scheduler is synchronous; it runs on Tokio's blocking pool so the
//! async side stays free to watch for Ctrl-C and flip the shared `running`
//! flag.

use std::path::PathBuf;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hidmacro_core::hid::report::ABSOLUTE_MOUSE_REPORT_DESCRIPTOR;
use hidmacro_core::{Clock, PlaybackEngine, ReportCodec, SystemClock};
use hidmacro_device::application::handle_commands::CommandHandler;
use hidmacro_device::application::run_scheduler::Scheduler;
use hidmacro_device::infrastructure::{
    config::{init_config, load_config, DeviceConfig, DEFAULT_CONFIG_PATH},
    hid_gadget::HidGadgetTransport,
    line::serial::SerialLineTransport,
};

#[derive(Debug, Parser)]
#[command(name = "hidmacro-device", version, about = "Replay mouse macros as a USB HID absolute mouse")]
struct Cli {
    #[command(subcommand)]
    command: DeviceCommand,
}

#[derive(Debug, Subcommand)]
enum DeviceCommand {
    /// Serve the command protocol and play macros.
    Run(RunArgs),
    /// Write a config file from the defaults plus any override flags.
    InitConfig {
        #[command(flatten)]
        settings: RunArgs,
        /// Replace an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the HID report descriptor for gadget configuration.
    Descriptor {
        /// Write the raw bytes instead of hex (for configfs `report_desc`).
        #[arg(long)]
        raw: bool,
    },
}

#[derive(Debug, Args)]
struct RunArgs {
    /// Configuration file.
    #[arg(long, env = "HIDMACRO_DEVICE_CONFIG", default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,
    /// Serial gadget carrying commands (overrides the config file).
    #[arg(long)]
    serial: Option<PathBuf>,
    /// HID gadget node (overrides the config file).
    #[arg(long)]
    hid: Option<PathBuf>,
    /// Screen width in pixels (overrides the config file).
    #[arg(long)]
    width: Option<u32>,
    /// Screen height in pixels (overrides the config file).
    #[arg(long)]
    height: Option<u32>,
}

impl RunArgs {
    fn apply(&self, config: &mut DeviceConfig) {
        if let Some(serial) = &self.serial {
            config.transport.serial = serial.clone();
        }
        if let Some(hid) = &self.hid {
            config.transport.hid = hid.clone();
        }
        if let Some(width) = self.width {
            config.screen.width = width;
        }
        if let Some(height) = self.height {
            config.screen.height = height;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        DeviceCommand::InitConfig { settings, force } => write_config(&settings, force),
        DeviceCommand::Descriptor { raw } => print_descriptor(raw),
        DeviceCommand::Run(args) => run(args).await,
    }
}

fn write_config(settings: &RunArgs, force: bool) -> anyhow::Result<()> {
    let mut config = DeviceConfig::default();
    settings.apply(&mut config);
    config.geometry().context("invalid screen configuration")?;
    init_config(&settings.config, &config, force)
        .with_context(|| format!("writing {}", settings.config.display()))?;
    println!("wrote {}", settings.config.display());
    Ok(())
}

fn print_descriptor(raw: bool) -> anyhow::Result<()> {
    use std::io::Write;

    let mut stdout = std::io::stdout().lock();
    if raw {
        stdout
            .write_all(ABSOLUTE_MOUSE_REPORT_DESCRIPTOR)
            .context("writing descriptor")?;
    } else {
        let hex: Vec<String> = ABSOLUTE_MOUSE_REPORT_DESCRIPTOR
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect();
        writeln!(stdout, "{}", hex.join(" ")).context("writing descriptor")?;
    }
    Ok(())
}

async fn run(args: RunArgs) -> anyhow::Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("loading {}", args.config.display()))?;
    args.apply(&mut config);

    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .init();

    info!("hidmacro device starting");
    let geometry = config.geometry().context("invalid screen configuration")?;
    info!("screen geometry {}x{}", geometry.width(), geometry.height());

    // ── HID endpoint ──────────────────────────────────────────────────────────
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let hid = HidGadgetTransport::open(&config.transport.hid)
        .with_context(|| format!("opening HID gadget {}", config.transport.hid.display()))?;
    let mut codec = ReportCodec::new(Box::new(hid), Arc::clone(&clock))
        .with_retry_backoff(config.retry_backoff());
    codec
        .flush()
        .context("HID endpoint did not accept the initial report")?;

    // ── Command line ──────────────────────────────────────────────────────────
    let line = SerialLineTransport::open(&config.transport.serial).with_context(|| {
        format!(
            "opening serial line {}",
            config.transport.serial.display()
        )
    })?;

    let engine = PlaybackEngine::new(geometry).with_dwell(config.dwell());
    let handler = CommandHandler::new(engine, codec, Arc::clone(&clock));
    let mut scheduler = Scheduler::new(handler, line, clock).with_poll_slice(config.poll_slice());

    // ── Ctrl-C handler ────────────────────────────────────────────────────────
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown signal received");
            running_clone.store(false, Ordering::Relaxed);
        }
    });

    info!("hidmacro device ready");
    let result = tokio::task::spawn_blocking(move || scheduler.run(&running))
        .await
        .context("scheduler task panicked")?;

    if let Err(e) = result {
        error!("fatal: {e}");
        return Err(e).context("scheduler stopped");
    }

    info!("hidmacro device stopped");
    Ok(())
}
