//! Callback Bridge Host Harness
//!
//! This is the command-line host for the callback-bridge library. It plays
//! the part of the host engine:
//! - Registers callbacks (from a host shared library, or built-in loggers)
//! - Delivers payloads through the C ABI as the native side would
//! - Reports registry state and delivery outcomes (text/JSON)

use anyhow::Result;
use callback_bridge::{ffi, shared, shared_dispatcher, BridgeStatus, SlotKind};
use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;

mod callbacks;
mod config;
mod report;

use callbacks::HostLibrary;
use config::{AppConfig, PayloadConfig};
use report::{DeliveryRecord, Report};

/// Callback Bridge - register host callbacks and deliver native results
#[derive(Parser, Debug)]
#[command(name = "callback-bridge-cli")]
#[command(about = "Register host callbacks and deliver native results through the C ABI")]
#[command(long_about = None)]
#[command(version)]
struct Args {
    /// Host shared library exporting the callbacks
    #[arg(short, long, value_name = "FILE")]
    library: Option<PathBuf>,

    /// Exported symbol used as the result callback
    #[arg(long, value_name = "NAME")]
    result_symbol: Option<String>,

    /// Exported symbol used as the file-result callback
    #[arg(long, value_name = "NAME")]
    file_result_symbol: Option<String>,

    /// Text payload to deliver to the result callback (can be repeated)
    #[arg(short, long, value_name = "TEXT")]
    result: Vec<String>,

    /// File whose contents are delivered to the file-result callback (can be repeated)
    #[arg(short, long, value_name = "FILE")]
    file_result: Vec<PathBuf>,

    /// Path to configuration file (config.toml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Fail deliveries that find no registered callback
    #[arg(long)]
    strict: bool,

    /// Reject payloads larger than this many bytes
    #[arg(long, value_name = "BYTES")]
    max_payload_bytes: Option<usize>,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Verbosity level (can be repeated: -v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logging
    init_logging(args.verbose, args.quiet);

    log::info!("Callback Bridge CLI v{}", env!("CARGO_PKG_VERSION"));
    log::info!("Using bridge library v{}", callback_bridge::VERSION);

    let config = build_config(&args)?;
    let report = run(&config)?;

    if args.json {
        println!("{}", report::render_json(&report)?);
    } else if !args.quiet {
        print!("{}", report);
    }

    let failures = report.failures();
    if failures > 0 {
        anyhow::bail!("{} deliveries failed", failures);
    }

    Ok(())
}

/// Merge the optional config file with command-line overrides
fn build_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => {
            log::info!("Loading configuration from: {:?}", path);
            config::load_config(path)?
        }
        None => AppConfig::default(),
    };

    if let Some(library) = &args.library {
        config.library.path = Some(library.clone());
    }
    if let Some(symbol) = &args.result_symbol {
        config.library.result_symbol = symbol.clone();
    }
    if let Some(symbol) = &args.file_result_symbol {
        config.library.file_result_symbol = symbol.clone();
    }
    if args.strict {
        config.dispatch.require_callback = true;
    }
    if let Some(limit) = args.max_payload_bytes {
        config.dispatch.max_payload_bytes = Some(limit);
    }

    config.payloads.extend(args.result.iter().map(|text| PayloadConfig {
        slot: SlotKind::Result,
        text: Some(text.clone()),
        file: None,
    }));
    config.payloads.extend(args.file_result.iter().map(|path| PayloadConfig {
        slot: SlotKind::FileResult,
        text: None,
        file: Some(path.clone()),
    }));

    log::debug!("Effective configuration: {:?}", config);
    Ok(config)
}

/// Register callbacks, deliver every configured payload, and collect a report
fn run(config: &AppConfig) -> Result<Report> {
    shared_dispatcher().set_config(config.dispatch.clone());

    // Keep the library loaded until every payload has been delivered
    let host = match &config.library.path {
        Some(path) => Some(HostLibrary::load(
            path,
            &config.library.result_symbol,
            &config.library.file_result_symbol,
        )?),
        None => {
            callbacks::register_builtin();
            None
        }
    };

    let mut deliveries = Vec::with_capacity(config.payloads.len());
    for payload in &config.payloads {
        let bytes = payload.load_bytes()?;
        let status = deliver(payload.slot, &bytes);
        log::debug!(
            "{} payload ({} bytes) -> {:?}",
            payload.slot,
            bytes.len(),
            status
        );
        deliveries.push(DeliveryRecord {
            slot: payload.slot,
            bytes: bytes.len(),
            status,
        });
    }

    let report = Report {
        generated_at: Utc::now(),
        bridge_version: callback_bridge::VERSION.to_string(),
        library: host.as_ref().map(|h| h.path().display().to_string()),
        registry: shared().status(),
        stats: shared_dispatcher().stats(),
        deliveries,
    };

    drop(host);
    Ok(report)
}

fn deliver(slot: SlotKind, bytes: &[u8]) -> BridgeStatus {
    // SAFETY: `bytes` is a live slice for the duration of the call
    unsafe {
        match slot {
            SlotKind::Result => ffi::bridge_deliver_result(bytes.as_ptr(), bytes.len()),
            SlotKind::FileResult => ffi::bridge_deliver_file_result(bytes.as_ptr(), bytes.len()),
        }
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: u8, quiet: bool) {
    use env_logger::Builder;
    use log::LevelFilter;
    use std::io::Write;

    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    Builder::new()
        .filter_level(level)
        .format(|buf, record| {
            writeln!(
                buf,
                "[{} {}] {}",
                record.level(),
                record.target(),
                record.args()
            )
        })
        .init();
}
