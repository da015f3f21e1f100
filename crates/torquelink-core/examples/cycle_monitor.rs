//! MicroTorque cycle counter monitor
//!
//! Opens a serial-attached device, prints its tightening cycle counter at a
//! fixed interval and reports unsolicited data while running.
//!
//! Usage:
//!   cargo run --example cycle_monitor -- [OPTIONS]
//!
//! Options:
//!   --port PORT       Serial port (default: /dev/ttyUSB0)
//!   --baud RATE       Baud rate (default: 115200)
//!   --config FILE     JSON link configuration (overrides defaults)
//!   --interval MS     Poll interval in ms (default: 1000)
//!   --count N         Stop after N polls (default: run until disconnected)
//!   --async           Also print unsolicited device data
//!
//! Set RUST_LOG=torquelink_core=trace to see every frame on the wire.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use torquelink_core::prelude::*;
use torquelink_core::protocol::decode_text;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut port_name = "/dev/ttyUSB0".to_string();
    let mut baud_rate: Option<u32> = None;
    let mut config_path: Option<PathBuf> = None;
    let mut interval_ms = 1000u64;
    let mut count: Option<u64> = None;
    let mut show_async = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--port" | "-p" => {
                i += 1;
                if i < args.len() {
                    port_name = args[i].clone();
                }
            }
            "--baud" | "-b" => {
                i += 1;
                if i < args.len() {
                    baud_rate = args[i].parse().ok();
                }
            }
            "--config" | "-c" => {
                i += 1;
                if i < args.len() {
                    config_path = Some(PathBuf::from(&args[i]));
                }
            }
            "--interval" | "-i" => {
                i += 1;
                if i < args.len() {
                    interval_ms = args[i].parse().unwrap_or(1000);
                }
            }
            "--count" | "-n" => {
                i += 1;
                if i < args.len() {
                    count = args[i].parse().ok();
                }
            }
            "--async" => {
                show_async = true;
            }
            "--help" | "-h" => {
                print_help();
                return Ok(());
            }
            other => {
                eprintln!("Unknown option: {}", other);
                print_help();
                return Ok(());
            }
        }
        i += 1;
    }

    let mut config = match &config_path {
        Some(path) => LinkConfig::load(path)
            .with_context(|| format!("loading link configuration {}", path.display()))?,
        None => LinkConfig::default(),
    };
    if let Some(baud) = baud_rate {
        config.serial.baud_rate = baud;
    }
    config.validate()?;

    println!("=== MicroTorque Cycle Monitor ===");
    println!("Port: {} @ {} baud", port_name, config.serial.baud_rate);
    println!(
        "Read timeout: {}ms, retries: {}",
        config.read_timeout_ms, config.max_retries
    );
    println!();

    let connector = Arc::new(SerialConnector::from_link_config(&config));
    let device = connector
        .query_device(&port_name)
        .map_err(|code| anyhow::anyhow!("querying {}: {}", port_name, code))?;
    if !device.is_ready() {
        anyhow::bail!("device {} is not available ({:?})", port_name, device.status);
    }

    let conn = AsciiConnection::with_config(connector, &config);
    conn.open(&device)
        .with_context(|| format!("opening {}", port_name))?;

    let disconnected = Arc::new(AtomicBool::new(false));
    {
        let disconnected = disconnected.clone();
        conn.events().abrupt_disconnect.subscribe(move |_| {
            disconnected.store(true, Ordering::SeqCst);
        });
    }
    if show_async {
        conn.events().async_data.subscribe(|data| {
            println!("  async: {:?}", decode_text(data));
        });
        conn.enable_async_read()?;
    }

    let mut polls = 0u64;
    while count.map_or(true, |n| polls < n) {
        if disconnected.load(Ordering::SeqCst) {
            println!("Device disconnected");
            break;
        }

        match conn.read_cycle_counter() {
            Ok(cycles) => println!("Cycle counter: {}", cycles),
            Err(ProtocolError::ProtocolTimeout) => println!("No reply"),
            Err(e) if e.is_connection_error() => {
                conn.close();
                return Err(e).context("reading cycle counter");
            }
            Err(e) => println!("Bad reply: {}", e),
        }

        polls += 1;
        std::thread::sleep(Duration::from_millis(interval_ms));
    }

    conn.close();
    Ok(())
}

fn print_help() {
    println!("MicroTorque Cycle Monitor");
    println!();
    println!("Usage: cycle_monitor [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --port, -p PORT       Serial port (default: /dev/ttyUSB0)");
    println!("  --baud, -b RATE       Baud rate (default: 115200)");
    println!("  --config, -c FILE     JSON link configuration");
    println!("  --interval, -i MS     Poll interval in ms (default: 1000)");
    println!("  --count, -n N         Stop after N polls");
    println!("  --async               Print unsolicited device data");
    println!("  --help, -h            Show this help");
}
