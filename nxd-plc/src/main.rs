//! NXD PLC - simulated field device process
//!
//! One process per device:
//! - Register responder on the profile's Modbus TCP port
//! - Machine-state tick every second
//! - Status line every two seconds
//! - Operator console on stdin

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use nxd_modbus::{new_state, Responder};
use nxd_plc::console::{render_status, status_line};
use nxd_plc::simulator::cadence;
use nxd_plc::{Brand, Device};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

const TICK: Duration = Duration::from_secs(1);
const STATUS_EVERY: Duration = Duration::from_secs(2);

#[derive(Debug, Parser)]
#[command(name = "nxd-plc", version, about = "Simulated PLC exposing Modbus TCP holding registers")]
struct Args {
    /// Device brand: siemens or delta
    #[arg(long, short)]
    brand: Brand,

    /// Listen address
    #[arg(long, default_value = "0.0.0.0")]
    bind: String,

    /// Override the profile's Modbus port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("nxd_plc=info,nxd_modbus=info")),
        )
        .init();

    let args = Args::parse();
    let profile = args.brand.profile();
    let port = args.port.unwrap_or(profile.port);

    let device = new_state(Device::new(profile));
    let responder = Responder::bind(&format!("{}:{}", args.bind, port), device.clone(), profile.station_id)
        .await
        .with_context(|| format!("Failed to bind Modbus listener on {}:{}", args.bind, port))?;

    tokio::spawn(responder.run());

    println!("═══════════════════════════════════════════════════════════");
    println!("   PLC {} - MODBUS TCP SIMULATOR", profile.display_name().to_uppercase());
    println!("   Port: {} | Unit ID: {}", port, profile.station_id);
    println!("═══════════════════════════════════════════════════════════");
    let (fault_long, fault_short) = profile.fault.command();
    println!(
        "   Commands: stop (p) | resume (r) | {} ({}) | Enter = status",
        fault_long, fault_short
    );
    println!();
    {
        let device = device.lock();
        println!("{}", render_status(device.state(), profile));
    }

    info!("{} simulator started", profile.display_name());

    let mut rng = StdRng::from_entropy();
    let mut tick_timer = cadence(TICK);
    let mut status_timer = cadence(STATUS_EVERY);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tick_timer.tick() => {
                device.lock().tick(&mut rng);
            }

            _ = status_timer.tick() => {
                let device = device.lock();
                println!("{}", status_line(device.state(), profile));
            }

            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        let message = device.lock().handle_input(&line);
                        println!("{}", message);
                    }
                    Ok(None) => {
                        info!("stdin closed, console disabled");
                        stdin_open = false;
                    }
                    Err(e) => {
                        error!("Failed to read console input: {}", e);
                        stdin_open = false;
                    }
                }
            }
        }
    }
}
