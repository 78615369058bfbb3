//! One-shot meter read.
//!
//! Polls a PZEM meter once and prints the decoded quantities.
//!
//! ```bash
//! cargo run --bin read_once -- 192.168.1.89 9000
//! ```

use std::env;
use std::process::ExitCode;

use voltage_pzem::{poll, MeterReading};

fn display_reading(r: &MeterReading) {
    println!("Voltage:       {:>10.1} V", r.voltage);
    println!("Current:       {:>10.3} A", r.current);
    println!("Power:         {:>10.1} W", r.power);
    println!("Consumption:   {:>10.3} kWh", r.energy);
    println!("Frequency:     {:>10.1} Hz", r.frequency);
    println!("Power factor:  {:>10.2}", r.power_factor);
    if r.alert {
        println!("Alert:         device signals an alert condition");
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    let mut args = env::args().skip(1);
    let host = match args.next() {
        Some(host) => host,
        None => {
            eprintln!("usage: read_once <host> [port]");
            return ExitCode::FAILURE;
        }
    };
    let port: u16 = match args.next().as_deref().unwrap_or("9000").parse() {
        Ok(port) => port,
        Err(_) => {
            eprintln!("usage: read_once <host> [port]");
            return ExitCode::FAILURE;
        }
    };

    match poll(&host, port).await {
        Ok(reading) => {
            display_reading(&reading);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("poll failed: {}", e);
            ExitCode::FAILURE
        }
    }
}
