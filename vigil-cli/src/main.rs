//! Vigil CLI
//!
//! Continuous-verification trust engine for zero trust perimeters.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Deserialize;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use vigil_api::create_router;
use vigil_core::{DecayRates, EventEffect, TrustSnapshot, EVENT_RULES, PROTECTED_RESOURCES};
use vigil_runtime::{
    demo_roster, DeviceSimulator, EngineConfig, HeartbeatSupervisor, SimulatedDevice, TrustEngine,
    DEFAULT_MISS_RATE,
};

#[derive(Parser)]
#[command(name = "vigil")]
#[command(author, version, about = "Vigil: continuous-verification trust engine", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbosity level (0-3)
    #[arg(short, long, default_value = "1")]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the trust engine and its HTTP API
    Serve(ServeArgs),

    /// Fetch and print the current trust snapshot from a running engine
    Status {
        /// Base URL of the engine
        #[arg(long, env = "VIGIL_URL", default_value = "http://127.0.0.1:8000")]
        url: String,

        /// Print the raw JSON snapshot
        #[arg(long)]
        json: bool,
    },

    /// Print the event policy table and protected resources
    Policy {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long, env = "VIGIL_ADDR", default_value = "127.0.0.1:8000")]
    addr: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Supervisor tick interval in milliseconds
    #[arg(long, env = "VIGIL_TICK_MS")]
    tick_ms: Option<u64>,

    /// Seconds of silence before a device is marked lost
    #[arg(long, env = "VIGIL_HEARTBEAT_TIMEOUT")]
    heartbeat_timeout: Option<u64>,

    /// Presence decay in points per second
    #[arg(long, env = "VIGIL_DECAY_PRESENCE")]
    decay_presence: Option<f64>,

    /// Biometric decay in points per second
    #[arg(long, env = "VIGIL_DECAY_BIOMETRIC")]
    decay_biometric: Option<f64>,

    /// Integrity decay in points per second
    #[arg(long, env = "VIGIL_DECAY_INTEGRITY")]
    decay_integrity: Option<f64>,

    /// Behavior decay in points per second
    #[arg(long, env = "VIGIL_DECAY_BEHAVIOR")]
    decay_behavior: Option<f64>,

    /// Simulate the demo device roster when the config lists no devices
    #[arg(long)]
    simulate: bool,

    /// Probability that a simulated device skips a heartbeat
    #[arg(long, default_value_t = DEFAULT_MISS_RATE)]
    miss_rate: f64,
}

/// Settings read from `--config`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    tick_interval_ms: Option<u64>,
    heartbeat_timeout_secs: Option<u64>,
    history_limit: Option<usize>,
    decay: Option<DecayRates>,
    devices: Vec<DeviceEntry>,
}

#[derive(Debug, Deserialize)]
struct DeviceEntry {
    id: String,
    name: Option<String>,
}

fn load_config(path: &Path) -> Result<FileConfig> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    toml::from_str(&raw).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Defaults, then the config file, then flags and environment.
fn resolve_config(args: &ServeArgs, file: &FileConfig) -> EngineConfig {
    let mut config = EngineConfig::default();

    if let Some(ms) = file.tick_interval_ms {
        config.tick_interval_ms = ms;
    }
    if let Some(secs) = file.heartbeat_timeout_secs {
        config.perimeter.heartbeat_timeout_secs = secs;
    }
    if let Some(limit) = file.history_limit {
        config.perimeter.history_limit = limit;
    }
    if let Some(decay) = file.decay {
        config.perimeter.decay = decay;
    }

    if let Some(ms) = args.tick_ms {
        config.tick_interval_ms = ms;
    }
    if let Some(secs) = args.heartbeat_timeout {
        config.perimeter.heartbeat_timeout_secs = secs;
    }
    let decay = &mut config.perimeter.decay;
    decay.presence = args.decay_presence.unwrap_or(decay.presence);
    decay.biometric = args.decay_biometric.unwrap_or(decay.biometric);
    decay.integrity = args.decay_integrity.unwrap_or(decay.integrity);
    decay.behavior = args.decay_behavior.unwrap_or(decay.behavior);

    config
}

fn roster(args: &ServeArgs, file: &FileConfig) -> Vec<SimulatedDevice> {
    if !file.devices.is_empty() {
        file.devices
            .iter()
            .map(|d| SimulatedDevice::new(&d.id, d.name.as_deref()))
            .collect()
    } else if args.simulate {
        demo_roster()
    } else {
        Vec::new()
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins over -v when set
    let log_level = match cli.verbose {
        0 => Level::ERROR,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    match cli.command {
        Commands::Serve(args) => serve(args).await?,
        Commands::Status { url, json } => check_status(&url, json).await?,
        Commands::Policy { json } => print_policy(json)?,
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let file = match &args.config {
        Some(path) => load_config(path)?,
        None => FileConfig::default(),
    };
    let config = resolve_config(&args, &file);
    let engine = TrustEngine::new(config).context("Invalid engine configuration")?;

    info!(
        tick_ms = engine.config().tick_interval_ms,
        heartbeat_timeout_secs = engine.config().perimeter.heartbeat_timeout_secs,
        "Trust engine ready"
    );

    let supervisor = HeartbeatSupervisor::new(engine.clone()).spawn();

    let devices = roster(&args, &file);
    let simulator = if devices.is_empty() {
        None
    } else {
        Some(
            DeviceSimulator::new(engine.clone(), devices)
                .with_miss_rate(args.miss_rate)
                .spawn(),
        )
    };

    let listener = tokio::net::TcpListener::bind(&args.addr)
        .await
        .with_context(|| format!("Failed to bind {}", args.addr))?;
    info!("Vigil listening on http://{}", listener.local_addr()?);

    axum::serve(listener, create_router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(simulator) = simulator {
        simulator.shutdown().await;
    }
    supervisor.shutdown().await;
    info!("Vigil stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        return;
    }
    info!("Shutdown requested");
}

async fn check_status(url: &str, raw: bool) -> Result<()> {
    let endpoint = format!("{}/trust-score", url.trim_end_matches('/'));
    let snapshot: TrustSnapshot = reqwest::get(&endpoint)
        .await
        .with_context(|| format!("Failed to reach {}", endpoint))?
        .error_for_status()?
        .json()
        .await
        .context("Malformed trust snapshot")?;

    if raw {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    println!("Trust score: {} ({})", snapshot.score, snapshot.confidence_band);
    println!("Access level: {}", snapshot.access_level.as_str());
    println!("{}", snapshot.explanation);
    if !snapshot.risk_factors.is_empty() {
        println!("\nRisk factors:");
        for factor in &snapshot.risk_factors {
            println!("   - {}", factor);
        }
    }
    println!("\nUpdated: {}", snapshot.last_updated.to_rfc3339());

    Ok(())
}

fn print_policy(json: bool) -> Result<()> {
    if json {
        let policy = serde_json::json!({
            "events": EVENT_RULES,
            "resources": PROTECTED_RESOURCES,
        });
        println!("{}", serde_json::to_string_pretty(&policy)?);
        return Ok(());
    }

    println!("{:<24} {:<10} {:>5} {:>7} {:>5}  Label", "Event", "Category", "Low", "Medium", "High");
    println!("{}", "-".repeat(80));
    for rule in EVENT_RULES {
        let (low, medium, high) = match rule.effect {
            EventEffect::Penalty { low, medium, high } => {
                (format!("{low}"), format!("{medium}"), format!("{high}"))
            }
            EventEffect::DeviceLost => ("-".into(), "LOST".into(), "-".into()),
            EventEffect::DeviceRevoked => ("-".into(), "REVOKED".into(), "-".into()),
        };
        println!(
            "{:<24} {:<10} {:>5} {:>7} {:>5}  {}",
            rule.event_type,
            rule.category.as_str(),
            low,
            medium,
            high,
            rule.label
        );
    }

    println!("\n{:<16} {:<28} Min score", "Resource", "Name");
    println!("{}", "-".repeat(56));
    for resource in PROTECTED_RESOURCES {
        println!("{:<16} {:<28} {}", resource.id, resource.name, resource.min_score);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn serve_args(argv: &[&str]) -> ServeArgs {
        let mut full = vec!["vigil", "serve"];
        full.extend_from_slice(argv);
        match Cli::try_parse_from(full).unwrap().command {
            Commands::Serve(args) => args,
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_defaults_without_overrides() {
        let args = serve_args(&["--addr", "127.0.0.1:0"]);
        let config = resolve_config(&args, &FileConfig::default());
        assert_eq!(config.perimeter.heartbeat_timeout_secs, 5);
        assert_eq!(config.perimeter.decay.presence, 2.0);
        assert_eq!(config.perimeter.decay.biometric, 0.5);
    }

    #[test]
    fn test_flags_override_file() {
        let file: FileConfig = toml::from_str(
            r#"
            tick_interval_ms = 250
            heartbeat_timeout_secs = 10

            [decay]
            presence = 4.0

            [[devices]]
            id = "DEV-100"
            name = "Lobby Kiosk"
            "#,
        )
        .unwrap();
        let args = serve_args(&["--heartbeat-timeout", "3", "--decay-integrity", "1.0"]);
        let config = resolve_config(&args, &file);

        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.perimeter.heartbeat_timeout_secs, 3);
        assert_eq!(config.perimeter.decay.presence, 4.0);
        assert_eq!(config.perimeter.decay.integrity, 1.0);
        // unspecified decay keys keep their defaults
        assert_eq!(config.perimeter.decay.behavior, 0.5);

        let devices = roster(&args, &file);
        assert_eq!(devices, vec![SimulatedDevice::new("DEV-100", Some("Lobby Kiosk"))]);
    }

    #[test]
    fn test_simulate_uses_demo_roster() {
        let args = serve_args(&["--simulate"]);
        assert_eq!(roster(&args, &FileConfig::default()).len(), 3);

        let args = serve_args(&[]);
        assert!(roster(&args, &FileConfig::default()).is_empty());
    }

    #[test]
    fn test_unknown_config_key_rejected() {
        assert!(toml::from_str::<FileConfig>("tick_ms = 5").is_err());
    }
}
