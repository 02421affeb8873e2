//! # Eesti Pank scraper
//!
//! Scrapes the configured listing pages for documents published inside the
//! query window and writes the result document.
//!
//! ## Usage
//!
//! ```sh
//! eestipank_scraper ./out/result.json --start-date 2024-01-01 --end-date 2024-01-31
//! ```

use chrono::Utc;
use clap::Parser;
use eestipank_scraper::cli::Cli;
use eestipank_scraper::errors::ErrorAggregator;
use eestipank_scraper::language::WhatlangDetector;
use eestipank_scraper::logging::{RunLog, init_tracing};
use eestipank_scraper::output::write_result;
use eestipank_scraper::pdf::LopdfParser;
use eestipank_scraper::scrape::Scraper;
use eestipank_scraper::transport::{DEFAULT_USER_AGENT, ReqwestTransport};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, error, info, instrument};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[tokio::main]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();

    let start_time = std::time::Instant::now();
    info!("eestipank_scraper starting up");

    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = args.scrape_config_now().inspect_err(|e| {
        error!(error = %e, "Invalid configuration");
    })?;
    info!(
        start = %config.window.start,
        end = %config.window.end,
        document_type = %config.document_type,
        "Query window"
    );

    let run_log = if args.no_log_file {
        RunLog::discard()
    } else {
        RunLog::open(&args.log_dir, Utc::now().date_naive()).inspect_err(|e| {
            error!(dir = %args.log_dir.display(), error = %e, "Cannot open run log");
        })?
    };

    let transport = ReqwestTransport::new(DEFAULT_USER_AGENT, REQUEST_TIMEOUT)?;
    let scraper = Scraper::new(
        config,
        transport,
        LopdfParser,
        WhatlangDetector,
        ErrorAggregator::new(run_log),
    )?;
    info!(seeds = scraper.seeds().len(), "Scraping");

    let result = scraper.run().await;
    write_result(&result, &args.output).await?;

    let elapsed = start_time.elapsed();
    info!(
        elapsed_secs = elapsed.as_secs_f64(),
        successes = result.successes.len(),
        errors = result.errors.len(),
        output = %args.output.display(),
        "eestipank_scraper finished"
    );

    Ok(())
}
