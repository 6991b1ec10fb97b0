use clap::Parser;
use ig_scraper::config::Config;
use ig_scraper::{logging, metrics, pipeline};
use std::time::Instant;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "ig_scraper")]
#[command(about = "Collects engagement, creator and comment data for registry post URLs")]
#[command(version)]
struct Cli {}

/// Whole minutes print as a float (`1.0 minutes`).
fn elapsed_message(total_seconds: f64) -> String {
    let minutes = (total_seconds / 60.0).floor();
    let seconds = total_seconds % 60.0;
    format!("Scraper spent {minutes:.1} minutes {seconds:.2} seconds to extract data.")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Cli::parse();
    let started = Instant::now();

    dotenv::dotenv().ok();
    let log_guard = logging::init_logging()?;
    info!(dir = %log_guard.dir.display(), "Logging initialized");
    metrics::init_metrics();

    // Fails before any network call when required variables are missing
    let config = Config::load()?;
    info!("Configuration loaded");

    let outcome = pipeline::run(&config).await;

    match &outcome {
        Ok(result) => {
            println!(
                "📊 {} rows ({} OK, {} ERROR), {} deactivated",
                result.total_rows, result.ok_rows, result.error_rows, result.deactivated
            );
            if !result.deactivation_failures.is_empty() {
                println!("⚠️  {} deactivation(s) failed", result.deactivation_failures.len());
            }
            match &result.upload {
                Ok(key) => println!("💾 Uploaded {key}"),
                Err(e) => println!("❌ {e}"),
            }
        }
        Err(e) => error!("Run failed: {}", e),
    }

    println!("{}", elapsed_message(started.elapsed().as_secs_f64()));
    outcome.map(|_| ()).map_err(Into::into)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn elapsed_minutes_print_as_float() {
        assert_eq!(
            elapsed_message(75.5),
            "Scraper spent 1.0 minutes 15.50 seconds to extract data."
        );
        assert_eq!(
            elapsed_message(3.0),
            "Scraper spent 0.0 minutes 3.00 seconds to extract data."
        );
    }
}
