use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use lora_relay::db::{self, NodeRepo};
use lora_relay::liveness::LivenessSweeper;
use lora_relay::seed::seed_test_nodes;
use lora_relay::{Config, Daemon};

/// LoRa relay - node registry and message relay for ESP32 + LoRa devices
#[derive(Parser)]
#[command(name = "lora-relay", version, about)]
struct Cli {
    /// Port to listen on (overrides the config file)
    #[arg(long, env = "RELAY_PORT")]
    port: Option<u16>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server (default)
    Serve,
    /// Create test nodes Node 1 through Node 5
    Seed,
    /// Print the node registry
    Nodes,
    /// Run one heartbeat timeout sweep
    Sweep,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,lora_relay=info",
        1 => "info,lora_relay=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = cli.port {
        config.api_server.port = port;
    }
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(config).await,
        Command::Seed => cmd_seed(&config),
        Command::Nodes => cmd_nodes(&config),
        Command::Sweep => cmd_sweep(&config),
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        port = config.api_server.port,
        database = %config.database_path.display(),
        "starting lora relay"
    );

    let port = config.api_server.port;
    let daemon = Daemon::new(config, port)?;
    daemon.run().await?;
    Ok(())
}

/// Create the bench test nodes
fn cmd_seed(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;
    let report = seed_test_nodes(&pool)?;

    for node in &report.created {
        println!("Created {} ({})", node.display_name, node.device_id);
    }
    for username in &report.skipped {
        println!("Skipped {username}: already exists");
    }
    println!(
        "{} created, {} skipped",
        report.created.len(),
        report.skipped.len()
    );
    Ok(())
}

/// Print every registered node
fn cmd_nodes(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;
    let nodes = NodeRepo::new(pool).list()?;

    if nodes.is_empty() {
        println!("No nodes registered");
        return Ok(());
    }

    println!(
        "{:<6} {:<24} {:<20} {:<12} {:<8} LAST SEEN",
        "ID", "NAME", "DEVICE", "LORA", "STATUS"
    );
    for node in nodes {
        let last_seen = node
            .last_seen
            .map_or_else(|| "never".to_string(), |ts| ts.to_rfc3339());
        println!(
            "{:<6} {:<24} {:<20} {:<12} {:<8} {last_seen}",
            node.id,
            node.display_name,
            node.device_id,
            node.lora_node_id,
            node.status.as_str()
        );
    }
    Ok(())
}

/// Expire stale nodes once and report how many changed
fn cmd_sweep(config: &Config) -> anyhow::Result<()> {
    let pool = db::init(&config.database_path)?;

    let Some(sweeper) = LivenessSweeper::new(pool, config.liveness) else {
        println!("Heartbeat timeout is disabled");
        return Ok(());
    };

    let expired = sweeper.sweep_once()?;
    println!(
        "{expired} node(s) marked OFFLINE (timeout {}s)",
        config.liveness.heartbeat_timeout_secs
    );
    Ok(())
}
