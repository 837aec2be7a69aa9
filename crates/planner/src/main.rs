use std::io::Read;

use anyhow::{Context, Result};

mod config;
mod request;

use config::PlannerConfig;
use request::PlanRequest;

const USAGE: &str = "Usage: planner [REQUEST.json | -]\n\
\n\
Reads one plan request (JSON) from the given file, or from stdin when the\n\
path is omitted or '-', and prints the plan as JSON.\n\
Plan kinds: harvest, withdrawal, transition, manage, basket.";

fn read_request(path: Option<&str>) -> Result<String> {
    match path {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read request from stdin")?;
            Ok(text)
        }
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read request file {path}")),
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    // Logs go to stderr so stdout carries only the plan
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
            )
            .init();
    }

    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.iter().any(|a| a == "-h" || a == "--help") {
        println!("{USAGE}");
        return Ok(());
    }
    if args.len() > 1 {
        anyhow::bail!("Expected at most one request path\n\n{USAGE}");
    }

    let config = PlannerConfig::from_env()?;
    tracing::info!("Configuration loaded and validated");
    tracing::info!("  As of: {}", config.as_of);
    tracing::info!(
        "  Tax rates: ST {:.2} / LT {:.2} / state {:.2}",
        config.rates.short_term,
        config.rates.long_term,
        config.rates.state
    );

    let text = read_request(args.first().map(String::as_str))?;
    let output = PlanRequest::from_json(&text)?.run(&config)?;
    println!(
        "{}",
        serde_json::to_string_pretty(&output).context("Failed to render plan")?
    );
    Ok(())
}
