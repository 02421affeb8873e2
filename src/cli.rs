//! Command-line interface for the scraper.
//!
//! Every option can also be set through an environment variable. Dates
//! default to a window from 100 days ago to tomorrow.

use crate::discover::DateWindow;
use crate::error::ScrapeError;
use crate::models::{DATE_FORMAT, DocumentType};
use crate::rate::{MAX_DELAY, MIN_DELAY};
use crate::scrape::ScrapeConfig;
use chrono::{Days, Local, NaiveDate};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the scraper.
///
/// # Examples
///
/// ```sh
/// # Default window, default seeds
/// eestipank_scraper ./out/result.json
///
/// # Explicit window and a single listing page
/// eestipank_scraper ./out/jan.json --start-date 2024-01-01 --end-date 2024-01-31 \
///     --seed https://www.eestipank.ee/blogi
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path of the JSON result file to write
    pub output: PathBuf,

    /// First day of the query window (YYYY-MM-DD); defaults to 100 days ago
    #[arg(long, env = "SCRAPER_START_DATE")]
    pub start_date: Option<String>,

    /// Last day of the query window (YYYY-MM-DD); defaults to tomorrow
    #[arg(long, env = "SCRAPER_END_DATE")]
    pub end_date: Option<String>,

    /// Site root used to build the default seed URLs
    #[arg(long, env = "SCRAPER_BASE_URL", default_value = "https://www.eestipank.ee")]
    pub base_url: String,

    /// Listing page to start from; repeat to give several. Replaces the defaults.
    #[arg(long = "seed", value_name = "URL")]
    pub seeds: Vec<String>,

    /// Initial delay between requests, in seconds
    #[arg(long, env = "SCRAPER_DELAY", default_value_t = 1.0)]
    pub delay: f64,

    /// Upper bound for rendering a fetched page, in seconds
    #[arg(long, env = "SCRAPER_RENDER_TIMEOUT", default_value_t = 20)]
    pub render_timeout: u64,

    /// Directory for the per-run log file
    #[arg(long, env = "SCRAPER_LOG_DIR", default_value = ".")]
    pub log_dir: PathBuf,

    /// Do not write a per-run log file
    #[arg(long)]
    pub no_log_file: bool,

    /// Language code used when detection fails
    #[arg(long, env = "SCRAPER_DEFAULT_LANGUAGE", default_value = "et")]
    pub default_language: String,

    /// Document type recorded for scraped documents
    #[arg(long, env = "SCRAPER_DOCUMENT_TYPE", default_value = "press_release")]
    pub document_type: DocumentType,
}

impl Cli {
    /// Resolve defaults and build the runtime configuration, using `today`
    /// for the default window.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Config`] for an unparseable date, a window that
    /// ends before it starts, a delay outside `0..=3600` seconds, or a default
    /// language that is not two letters.
    pub fn scrape_config(&self, today: NaiveDate) -> Result<ScrapeConfig, ScrapeError> {
        let start = match &self.start_date {
            Some(raw) => parse_date("start date", raw)?,
            None => today - Days::new(100),
        };
        let end = match &self.end_date {
            Some(raw) => parse_date("end date", raw)?,
            None => today + Days::new(1),
        };
        if end < start {
            return Err(ScrapeError::Config(format!(
                "end date {end} is before start date {start}"
            )));
        }
        if !(MIN_DELAY..=MAX_DELAY).contains(&self.delay) {
            return Err(ScrapeError::Config(format!(
                "delay {} is outside {MIN_DELAY}..={MAX_DELAY} seconds",
                self.delay
            )));
        }
        if self.default_language.chars().count() != 2 {
            return Err(ScrapeError::Config(format!(
                "default language {:?} is not a two-letter code",
                self.default_language
            )));
        }

        Ok(ScrapeConfig {
            base_url: self.base_url.clone(),
            seeds: self.seeds.clone(),
            window: DateWindow::new(start, end),
            initial_delay: self.delay,
            render_timeout: Duration::from_secs(self.render_timeout),
            default_language: self.default_language.to_ascii_lowercase(),
            document_type: self.document_type,
        })
    }

    /// [`Cli::scrape_config`] with the local calendar date as today.
    pub fn scrape_config_now(&self) -> Result<ScrapeConfig, ScrapeError> {
        self.scrape_config(Local::now().date_naive())
    }
}

fn parse_date(what: &str, raw: &str) -> Result<NaiveDate, ScrapeError> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
        .map_err(|e| ScrapeError::Config(format!("{what} {raw:?} is not YYYY-MM-DD: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "eestipank_scraper",
            "./out.json",
            "--start-date",
            "2024-01-01",
            "--end-date",
            "2024-01-31",
        ]);

        assert_eq!(cli.output, PathBuf::from("./out.json"));
        assert_eq!(cli.start_date.as_deref(), Some("2024-01-01"));
        assert_eq!(cli.base_url, "https://www.eestipank.ee");
        assert_eq!(cli.document_type, DocumentType::PressRelease);
        assert!(cli.seeds.is_empty());
    }

    #[test]
    fn test_repeated_seeds_and_document_type() {
        let cli = Cli::parse_from([
            "eestipank_scraper",
            "out.json",
            "--seed",
            "https://www.eestipank.ee/blogi",
            "--seed",
            "https://www.eestipank.ee/en/press/2024",
            "--document-type",
            "speech",
            "--no-log-file",
        ]);

        assert_eq!(cli.seeds.len(), 2);
        assert_eq!(cli.document_type, DocumentType::Speech);
        assert!(cli.no_log_file);
    }

    #[test]
    fn test_default_window_is_relative_to_today() {
        let cli = Cli::parse_from(["eestipank_scraper", "out.json"]);
        let config = cli.scrape_config(ymd(2024, 4, 10)).unwrap();

        assert_eq!(config.window.start, ymd(2024, 1, 1));
        assert_eq!(config.window.end, ymd(2024, 4, 11));
        assert_eq!(config.render_timeout, Duration::from_secs(20));
        assert_eq!(config.default_language, "et");
    }

    #[test]
    fn test_bad_date_is_rejected() {
        let cli = Cli::parse_from(["eestipank_scraper", "out.json", "--start-date", "1.1.2024"]);
        assert!(matches!(
            cli.scrape_config(ymd(2024, 4, 10)),
            Err(ScrapeError::Config(_))
        ));
    }

    #[test]
    fn test_out_of_range_delay_is_rejected() {
        for delay in ["--delay=1e20", "--delay=-1", "--delay=NaN"] {
            let cli = Cli::parse_from(["eestipank_scraper", "out.json", delay]);
            let err = cli.scrape_config(ymd(2024, 4, 10)).unwrap_err();
            assert!(err.to_string().contains("delay"), "{delay}: {err}");
        }
        let cli = Cli::parse_from(["eestipank_scraper", "out.json", "--delay", "0"]);
        assert_eq!(cli.scrape_config(ymd(2024, 4, 10)).unwrap().initial_delay, 0.0);
    }

    #[test]
    fn test_inverted_window_is_rejected() {
        let cli = Cli::parse_from([
            "eestipank_scraper",
            "out.json",
            "--start-date",
            "2024-02-01",
            "--end-date",
            "2024-01-01",
        ]);
        let err = cli.scrape_config(ymd(2024, 4, 10)).unwrap_err();
        assert!(err.to_string().contains("before start date"));
    }
}
