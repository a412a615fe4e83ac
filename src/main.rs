//! # SENTINEL Surge - CLI Entry Point
//!
//! Command-line interface for the SENTINEL Surge detector.
//!
//! Commands:
//! - `run`         - Process the configured access log from the beginning
//! - `watch`       - Follow the access log and process new lines as they appear
//! - `init-config` - Generate a default configuration file

use clap::{Parser, Subcommand};
use log::{info, warn};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use sentinel_surge::alert::AlertSink;
use sentinel_surge::detection::Detector;
use sentinel_surge::log_sources::web_log::WebLogParser;
use sentinel_surge::log_sources::LogTailer;
use sentinel_surge::{SurgeConfig, SurgeError, SurgeResult};

/// SENTINEL Surge - traffic-surge detection for web access logs.
///
/// Buckets requests per time unit, baselines recent history, and flags
/// time units (and the addresses driving them) that land more than two
/// standard deviations above normal.
#[derive(Parser, Debug)]
#[command(name = "sentinel-surge")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file.
    #[arg(short, long, default_value = "sentinel-surge.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Process the configured access log from the beginning, then exit.
    Run,

    /// Follow the access log, processing new lines until interrupted.
    Watch,

    /// Generate a default configuration file.
    InitConfig,
}

fn main() -> SurgeResult<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run => cmd_run(&cli.config),
        Commands::Watch => cmd_watch(&cli.config),
        Commands::InitConfig => cmd_init_config(&cli.config),
    }
}

/// Load configuration, falling back to defaults when the file is absent.
fn load_config(config_path: &Path) -> SurgeResult<SurgeConfig> {
    if config_path.exists() {
        info!("Loading configuration from: {}", config_path.display());
        SurgeConfig::from_file(config_path)
    } else {
        info!("No config file found, using defaults. Run 'init-config' to generate one.");
        Ok(SurgeConfig::default())
    }
}

/// Build the parser/detector pair from configuration.
fn build_pipeline(config: &SurgeConfig) -> (WebLogParser, Detector) {
    let parser = WebLogParser::new(config.detector.bucket_secs);
    let sink = AlertSink::new(config.alerts.alert_log_path.clone());
    let detector = Detector::new(&config.detector, sink);
    (parser, detector)
}

/// Feed a batch of raw log lines through the parser into the detector.
///
/// Returns (records fed, lines skipped). Unparseable lines are skipped
/// with a debug log; sink failures propagate.
fn feed_lines(
    lines: &[String],
    parser: &WebLogParser,
    detector: &mut Detector,
) -> SurgeResult<(u64, u64)> {
    let mut fed = 0u64;
    let mut skipped = 0u64;
    for line in lines {
        match parser.parse_line(line) {
            Some(record) => {
                detector.process(&record.address, record.label)?;
                fed += 1;
            }
            None => {
                log::debug!("Skipping unparseable line: {}", line);
                skipped += 1;
            }
        }
    }
    Ok((fed, skipped))
}

/// Process the whole access log in one pass.
fn cmd_run(config_path: &Path) -> SurgeResult<()> {
    let config = load_config(config_path)?;
    let (parser, mut detector) = build_pipeline(&config);

    let log_path = &config.log_source.access_log_path;
    if !log_path.exists() {
        return Err(SurgeError::Config(format!(
            "Access log not found: {}",
            log_path.display()
        )));
    }

    info!("Processing {} from the beginning", log_path.display());
    let mut tailer = LogTailer::new(log_path.clone());
    let lines = tailer.read_new_lines();
    let (fed, skipped) = feed_lines(&lines, &parser, &mut detector)?;

    // The last in-progress time unit never retires; the feed simply ends.
    info!(
        "Done: {} records fed, {} lines skipped, {} time units retired",
        fed,
        skipped,
        detector.window().len(),
    );
    println!(
        "Processed {} records ({} skipped). Final status: attack={}",
        fed,
        skipped,
        detector.is_under_attack(),
    );
    if detector.is_under_attack() {
        println!(
            "Flagged addresses were appended to {}",
            config.alerts.alert_log_path.display(),
        );
    }

    Ok(())
}

/// Follow the access log until interrupted.
fn cmd_watch(config_path: &Path) -> SurgeResult<()> {
    let config = load_config(config_path)?;
    let (parser, mut detector) = build_pipeline(&config);

    // Graceful shutdown on Ctrl-C.
    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    }) {
        warn!("Could not install signal handler: {}. Use kill to stop.", e);
    }

    let log_path = &config.log_source.access_log_path;
    let mut tailer = LogTailer::new(log_path.clone());
    tailer.seek_to_end();
    info!(
        "Watching {} (poll every {}s, window {} x {}s buckets)",
        log_path.display(),
        config.log_source.poll_interval_secs,
        config.detector.window_len,
        config.detector.bucket_secs,
    );

    let poll_interval = std::time::Duration::from_secs(config.log_source.poll_interval_secs);
    let mut total_fed = 0u64;

    loop {
        if shutdown.load(Ordering::SeqCst) {
            info!("Shutdown signal received. Stopping gracefully...");
            break;
        }

        let lines = tailer.read_new_lines();
        if !lines.is_empty() {
            let (fed, skipped) = feed_lines(&lines, &parser, &mut detector)?;
            total_fed += fed;
            if skipped > 0 {
                log::debug!("Skipped {} unparseable lines this poll", skipped);
            }
        }

        std::thread::sleep(poll_interval);
    }

    info!(
        "SENTINEL Surge stopped. {} records processed, {} time units retired, attack={}",
        total_fed,
        detector.window().len(),
        detector.is_under_attack(),
    );

    Ok(())
}

/// Generate a default configuration file.
fn cmd_init_config(config_path: &Path) -> SurgeResult<()> {
    if config_path.exists() {
        return Err(SurgeError::Config(format!(
            "Configuration file already exists: {}. Remove it first or use a different path.",
            config_path.display()
        )));
    }

    SurgeConfig::write_default(config_path)?;
    println!("Default configuration written to: {}", config_path.display());
    println!("Key settings to configure:");
    println!("  [log_source] - Point access_log_path at your actual access log");
    println!("  [detector]   - window_len (history depth) and bucket_secs (granularity)");
    println!("  [alerts]     - Where flagged addresses are appended");

    Ok(())
}
