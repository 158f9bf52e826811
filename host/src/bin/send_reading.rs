//! ==============================================================================
//! send_reading.rs - device simulator
//! ==============================================================================
//!
//! posts one reading to a running host the way the sensor node does and
//! prints the host's reply.
//!
//!     sigeta-send --mq 750 --temperature 29 --humidity 85
//!
//! exits non-zero when the host answers with an error status.
//!
//! ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;

#[derive(Parser)]
#[command(name = "sigeta-send")]
#[command(about = "Send a simulated sensor reading to the SIGETA host", long_about = None)]
struct Args {
    /// Endpoint the sensor node posts to
    #[arg(long, default_value = "http://127.0.0.1:5000/data")]
    url: String,

    /// Raw MQ gas sensor value
    #[arg(long, default_value_t = 750.0)]
    mq: f64,

    /// Temperature in celsius
    #[arg(long, default_value_t = 29.0)]
    temperature: f64,

    /// Relative humidity in percent
    #[arg(long, default_value_t = 85.0)]
    humidity: f64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let payload = serde_json::json!({
        "mq": args.mq,
        "temperature": args.temperature,
        "humidity": args.humidity,
    });

    let response = reqwest::Client::new()
        .post(&args.url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("failed to reach {}", args.url))?;

    let status = response.status();
    let body: serde_json::Value = response
        .json()
        .await
        .context("host reply was not JSON")?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    if !status.is_success() {
        anyhow::bail!("host answered {}", status);
    }
    Ok(())
}
