use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::SeedableRng;
use simulator::degradation::generate_reading;
use simulator::telemetry::{IngestReply, Telemetry};
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "simulator",
    about = "Simulated medical device streaming readings to the backend"
)]
struct Args {
    #[arg(long, env = "API_URL", default_value = "http://127.0.0.1:8001")]
    api_url: String,

    #[arg(long, env = "DEVICE_ID", default_value = "DEV-001")]
    device_id: String,

    #[arg(
        long,
        env = "DEVICE_KEY",
        default_value = "secret-api-key",
        hide_env_values = true
    )]
    device_key: String,

    /// Milliseconds between readings
    #[arg(
        long,
        env = "INTERVAL_MS",
        default_value_t = 1000,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    interval_ms: u64,

    /// Stop after this many cycles (runs forever when unset)
    #[arg(long, env = "CYCLES")]
    cycles: Option<u64>,

    /// Seed for a reproducible stream
    #[arg(long, env = "SEED")]
    seed: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let endpoint = format!("{}/device-data", args.api_url.trim_end_matches('/'));
    info!("Starting simulator for {}", args.device_id);
    info!("Endpoint: {}, interval: {}ms", endpoint, args.interval_ms);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(10))
        .build()
        .context("Failed to build HTTP client")?;

    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms));
    let mut cycle = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal after {} cycles", cycle);
                break;
            }
        }

        cycle += 1;
        let reading = generate_reading(&mut rng, cycle);
        let telemetry = Telemetry {
            device_id: args.device_id.clone(),
            api_key: args.device_key.clone(),
            motor_current: reading.motor_current,
            motor_rpm: reading.motor_rpm,
            vibration_level: reading.vibration_level,
            device_temperature: reading.device_temperature,
            battery_voltage: reading.battery_voltage,
            error_count: reading.error_count,
        };

        match client.post(&endpoint).json(&telemetry).send().await {
            Ok(response) if response.status().is_success() => {
                match response.json::<IngestReply>().await {
                    Ok(reply) => {
                        let status = if reply.is_anomaly { "ANOMALY" } else { "NORMAL" };
                        info!(
                            "Cycle {}: sent data ({}). Status: {} Score: {:.4}",
                            cycle, reply.status, status, reply.anomaly_score
                        );
                    }
                    Err(e) => warn!("Cycle {}: unreadable reply: {}", cycle, e),
                }
            }
            Ok(response) => {
                warn!("Cycle {}: failed to send data. Status: {}", cycle, response.status());
            }
            Err(e) => {
                error!("Cycle {}: connection error: {}", cycle, e);
            }
        }

        if args.cycles.is_some_and(|limit| cycle >= limit) {
            info!("Completed {} cycles", cycle);
            break;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_interval_is_rejected() {
        assert!(Args::try_parse_from(["simulator", "--interval-ms", "0"]).is_err());

        let args = Args::try_parse_from(["simulator", "--interval-ms", "250"]).unwrap();
        assert_eq!(args.interval_ms, 250);
    }
}
