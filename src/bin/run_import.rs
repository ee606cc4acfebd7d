//! Manual import trigger CLI.
//!
//! `run_import` starts an import run for a single configuration through the
//! fieldbridge API, optionally replaying history from an explicit start.
//! The API only accepts the request when `FIELDBRIDGE_MANUAL_IMPORT_ALLOWED`
//! is set on the server.

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde_json::json;
use uuid::Uuid;

#[derive(Parser, Debug)]
#[command(name = "run_import")]
#[command(about = "Trigger an import run for a single configuration")]
#[command(version)]
struct Args {
    /// Base URL of the fieldbridge API
    #[arg(long, short = 'a', default_value = "http://localhost:8080")]
    address: String,

    /// Configuration to run the import for
    configuration_id: Uuid,

    /// Replay data from this point in time (RFC 3339) instead of running
    /// the regular schedule
    #[arg(long, short = 's')]
    start: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let url = format!(
        "{}/api/v1/import/{}/run",
        args.address.trim_end_matches('/'),
        args.configuration_id
    );

    let client = reqwest::Client::new();
    let mut request = client.post(&url);
    if let Some(start) = &args.start {
        request = request.json(&json!({ "start": start }));
    }

    let response = request.send().await.context("sending the import request")?;
    let status = response.status();
    let body = response.text().await.context("reading the response body")?;

    if !status.is_success() {
        bail!("the API answered {}: {}", status, body);
    }

    println!("{}", body);
    Ok(())
}
