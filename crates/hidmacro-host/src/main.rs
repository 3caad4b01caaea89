//! `hidmacro` host command-line tool.
//!
//! Manages the local macro library and drives a device over its serial port.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ Cli::parse()                 -- clap, with HIDMACRO_* env fallbacks
//!  ├─ library commands             -- show / import / remove / record
//!  │    └─ macro_file::{load,save}_library()
//!  └─ device commands              -- ping / list / upload / play / stop / move / click
//!       └─ DeviceLink::open()       -- one command, one reply
//! ```
//!
//! Library commands never open the port, and device failures never rewrite
//! the library file.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use hidmacro_core::domain::store::validate_macro_name;
use hidmacro_core::{MacroStore, MouseButton};
use hidmacro_host::application::record_clicks::{parse_click_line, Recorder};
use hidmacro_host::infrastructure::link::DeviceLink;
use hidmacro_host::infrastructure::macro_file::{import_library, load_library, save_library};

#[derive(Debug, Parser)]
#[command(name = "hidmacro", version, about = "Record mouse macros and play them on a hidmacro device")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,
    #[command(subcommand)]
    command: HostCommand,
}

#[derive(Debug, Args)]
struct GlobalArgs {
    /// Serial port of the device.
    #[arg(long, global = true, env = "HIDMACRO_PORT", default_value = "/dev/ttyACM0")]
    port: PathBuf,
    /// Macro library file.
    #[arg(long, global = true, env = "HIDMACRO_LIBRARY", default_value = "macros.json")]
    library: PathBuf,
    /// Seconds to wait for each device reply (waits forever when unset).
    #[arg(long, global = true, env = "HIDMACRO_TIMEOUT")]
    timeout: Option<f64>,
}

#[derive(Debug, Subcommand)]
enum HostCommand {
    #[command(flatten)]
    Device(DeviceCommand),
    /// Merge another library file into the library (same names are replaced).
    Import { file: PathBuf },
    /// Print the library contents.
    Show,
    /// Delete a macro from the library (the device keeps its copy until restart).
    Remove { name: String },
    /// Record clicks from stdin (`<x> <y> [button]` per line) into the library.
    Record { name: String },
}

/// Subcommands that talk to the device over [`GlobalArgs::port`].
#[derive(Debug, Subcommand)]
enum DeviceCommand {
    /// Check that the device answers.
    Ping,
    /// List the macros stored on the device.
    List,
    /// Upload one macro from the library to the device.
    Upload { name: String },
    /// Upload every macro in the library to the device.
    UploadAll,
    /// Play a macro stored on the device.
    Play {
        name: String,
        /// Repeat until stopped.
        #[arg(long = "loop")]
        looping: bool,
    },
    /// Stop playback.
    Stop,
    /// Move the pointer once.
    Move { x: i64, y: i64 },
    /// Click once.
    Click {
        x: i64,
        y: i64,
        #[arg(long, default_value = "left")]
        button: MouseButton,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let global = cli.global;

    match cli.command {
        // ── Library commands ──────────────────────────────────────────────────
        HostCommand::Show => show(&global.library),
        HostCommand::Import { file } => {
            let mut library = load(&global.library)?;
            let count = import_library(&mut library, &file)
                .with_context(|| format!("importing {}", file.display()))?;
            save_library(&global.library, &library)?;
            println!("imported {count} macros from {}", file.display());
            Ok(())
        }
        HostCommand::Remove { name } => {
            let mut library = load(&global.library)?;
            library.remove(&name)?;
            save_library(&global.library, &library)?;
            println!("removed '{name}'");
            Ok(())
        }
        HostCommand::Record { name } => record(&global.library, &name).await,

        // ── Device commands ───────────────────────────────────────────────────
        HostCommand::Device(command) => run_device(command, &global).await,
    }
}

/// Opens the port and runs one device command.
async fn run_device(command: DeviceCommand, global: &GlobalArgs) -> anyhow::Result<()> {
    let timeout = global
        .timeout
        .map(Duration::try_from_secs_f64)
        .transpose()
        .context("invalid --timeout")?;
    let mut link = DeviceLink::open(&global.port)
        .await
        .with_context(|| format!("opening {}", global.port.display()))?
        .with_timeout(timeout);

    match command {
        DeviceCommand::Ping => {
            link.ping().await?;
            println!("PONG");
        }
        DeviceCommand::List => {
            for name in link.list().await? {
                println!("{name}");
            }
        }
        DeviceCommand::Upload { name } => {
            let library = load(&global.library)?;
            let actions = library.get(&name)?;
            link.upload(&name, &actions).await?;
            println!("uploaded '{name}' ({} actions)", actions.len());
        }
        DeviceCommand::UploadAll => {
            let library = load(&global.library)?;
            for (name, actions) in library.iter() {
                link.upload(name, actions)
                    .await
                    .with_context(|| format!("uploading '{name}'"))?;
                println!("uploaded '{name}' ({} actions)", actions.len());
            }
        }
        DeviceCommand::Play { name, looping } => link.play(&name, looping).await?,
        DeviceCommand::Stop => link.stop().await?,
        DeviceCommand::Move { x, y } => link.move_to(x, y).await?,
        DeviceCommand::Click { x, y, button } => link.click(x, y, button).await?,
    }
    Ok(())
}

fn load(path: &Path) -> anyhow::Result<MacroStore> {
    load_library(path).with_context(|| format!("loading library {}", path.display()))
}

fn show(path: &Path) -> anyhow::Result<()> {
    let library = load(path)?;
    if library.is_empty() {
        println!("library {} is empty", path.display());
    }
    for (name, actions) in library.iter() {
        println!("{name} ({} actions)", actions.len());
        for action in actions {
            println!("  {action:?}");
        }
    }
    Ok(())
}

/// Reads click lines from stdin until EOF or an empty line, then stores the
/// recorded macro under `name`.
async fn record(library_path: &Path, name: &str) -> anyhow::Result<()> {
    validate_macro_name(name)?;
    let mut library = load(library_path)?;

    let mut recorder = Recorder::default();
    recorder.start();
    eprintln!("recording '{name}': enter `<x> <y> [button]` per click, empty line to finish");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("reading stdin")? {
        let at = Instant::now();
        if line.trim().is_empty() {
            break;
        }
        match parse_click_line(&line) {
            Ok((x, y, button)) => recorder.record_click(x, y, button, at),
            Err(e) => warn!("{e}"),
        }
    }

    let actions = recorder.stop();
    if actions.is_empty() {
        bail!("no clicks recorded; library unchanged");
    }
    let count = actions.len();
    library.put(name, actions)?;
    save_library(library_path, &library)?;
    info!("recorded macro '{name}'");
    println!("recorded '{name}' ({count} clicks)");
    Ok(())
}

// ── Tests ─────────────────────────────────────────────────────────────────────
