//! NXD DX Gateway - operator process
//!
//! Loads the device list, then hands stdin to the operator console.
//! Polling only begins on `start`.

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use nxd_gateway::{Gateway, GatewayConfig, Reply};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "nxd-gateway", version, about = "DX gateway: Modbus TCP polling and telemetry relay")]
struct Args {
    /// Config file (defaults to $NXD_GATEWAY_CONFIG, then ./gateway.toml)
    #[arg(long, short)]
    config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("nxd_gateway=info,nxd_modbus=warn")),
        )
        .init();

    let args = Args::parse();
    let path = GatewayConfig::resolve_path(args.config);
    let mut config = GatewayConfig::load(&path)
        .await
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;
    config.apply_env_overrides();
    config.validate().context("Configuration rejected")?;

    let mut gateway = Gateway::new(config).context("Failed to build HTTP client")?;
    info!("Gateway ready");

    print_banner(&gateway);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        prompt();
        let Some(line) = lines.next_line().await.context("Failed to read console input")? else {
            info!("stdin closed, exiting");
            break;
        };

        match gateway.handle_line(&line) {
            Reply::Print(text) => println!("{}", text),
            Reply::Silent => {}
            Reply::Exit(text) => {
                println!("{}", text);
                break;
            }
        }
    }

    Ok(())
}

fn print_banner(gateway: &Gateway) {
    println!();
    println!("📡 ======================================");
    println!("   NXD DX GATEWAY - MODBUS TCP → CLOUD");
    println!("📡 ======================================");
    println!();
    println!("{}", gateway.render_config());
    println!();
    if !gateway.flags().has_credential() {
        println!("⚠️  No API key configured. Use: api <key>");
    }
    println!("Type 'help' for commands, 'start' to begin polling.");
}

fn prompt() {
    print!("DX> ");
    let _ = std::io::stdout().flush();
}
