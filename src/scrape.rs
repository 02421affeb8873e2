//! Scrape orchestration.
//!
//! The [`Scraper`] owns every piece of per-run state (pacing, the error
//! aggregator, the success list) and drives the pipeline strictly in
//! sequence:
//!
//! 1. **Seed**: rate-controlled fetch, status check, render
//! 2. **Discovery**: walk the listing and keep in-window articles
//! 3. **Article**: fetch the article page and locate PDF links
//! 4. **PDF**: download, extract on the blocking pool, detect language
//!
//! Helpers return their records instead of appending to shared lists; only
//! [`Scraper::run`] extends the success list. A seed that fails stops only
//! itself, and a failing article or PDF stops only that document.

use crate::discover::{DateWindow, DiscoveredArticle, PageFailure, discover};
use crate::error::{ExtractionError, ScrapeError};
use crate::errors::ErrorAggregator;
use crate::language::{LanguageDetector, detect_or};
use crate::models::{DATE_FORMAT, DocumentType, RunMetadata, RunResult, SuccessRecord, format_timestamp};
use crate::pdf::{ExtractedPdf, PdfExtractor, PdfParser};
use crate::rate::RateController;
use crate::transport::{FetchedPage, Transport, render_within};
use crate::utils::{element_text, truncate_for_log, visible_text};
use chrono::Utc;
use itertools::Itertools;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

static LINK_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("a[href]").unwrap());
static CONTENT_SELECTORS: Lazy<[Selector; 3]> = Lazy::new(|| {
    [
        Selector::parse("article").unwrap(),
        Selector::parse("main").unwrap(),
        Selector::parse("body").unwrap(),
    ]
});

/// Runtime settings for one scrape.
#[derive(Debug, Clone)]
pub struct ScrapeConfig {
    pub base_url: String,
    /// Listing pages to start from. Empty means [`default_seeds`].
    pub seeds: Vec<String>,
    pub window: DateWindow,
    pub initial_delay: f64,
    pub render_timeout: Duration,
    /// Used when language detection gives no two-letter code.
    pub default_language: String,
    pub document_type: DocumentType,
}

impl ScrapeConfig {
    /// Configured seeds, or the defaults for the base URL and window.
    pub fn seed_urls(&self) -> Vec<String> {
        if self.seeds.is_empty() {
            default_seeds(&self.base_url, &self.window)
        } else {
            self.seeds.clone()
        }
    }
}

/// Blog feed plus the Estonian economic-commentary and English press
/// indexes for every year the window touches.
pub fn default_seeds(base_url: &str, window: &DateWindow) -> Vec<String> {
    let base = base_url.trim_end_matches('/');
    let mut seeds = vec![format!("{base}/blogi")];
    for year in window.years() {
        seeds.push(format!("{base}/press/majanduskommentaarid/{year}"));
        seeds.push(format!("{base}/en/press/{year}"));
    }
    seeds
}

/// Parse every seed up front; one malformed entry fails the whole run.
///
/// # Errors
///
/// [`ScrapeError::InvalidSeed`] for the first unparseable URL, or
/// [`ScrapeError::Config`] when there are no seeds at all.
pub fn parse_seeds(seeds: &[String]) -> Result<Vec<Url>, ScrapeError> {
    if seeds.is_empty() {
        return Err(ScrapeError::Config("no seed URLs".to_string()));
    }
    seeds
        .iter()
        .map(|seed| {
            Url::parse(seed).map_err(|source| ScrapeError::InvalidSeed {
                url: seed.clone(),
                source,
            })
        })
        .collect()
}

/// What the article page itself contributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticlePage {
    /// Visible text of `article`, `main` or `body`, whichever first has any.
    pub text: String,
    pub html: String,
    /// Absolute PDF URLs in document order, duplicates removed.
    pub pdf_links: Vec<String>,
}

/// Parse an article page fetched from `page_url`.
pub fn read_article(body: &str, page_url: &Url) -> ArticlePage {
    let document = Html::parse_document(body);

    let text = CONTENT_SELECTORS
        .iter()
        .filter_map(|selector| document.select(selector).next())
        .map(visible_text)
        .find(|text| !text.is_empty())
        .unwrap_or_default();

    ArticlePage {
        text,
        html: body.to_string(),
        pdf_links: pdf_links(&document, page_url),
    }
}

/// Links whose target or visible label ends in `.pdf`, resolved against
/// `page_url` with any fragment dropped.
pub fn pdf_links(document: &Html, page_url: &Url) -> Vec<String> {
    document
        .select(&LINK_SELECTOR)
        .filter_map(|link| {
            let href = link.value().attr("href")?.trim();
            if !(names_pdf(href) || names_pdf(&element_text(link))) {
                return None;
            }
            match page_url.join(href) {
                Ok(mut resolved) => {
                    resolved.set_fragment(None);
                    Some(resolved.to_string())
                }
                Err(e) => {
                    debug!(%href, error = %e, "Skipping unresolvable PDF link");
                    None
                }
            }
        })
        .unique()
        .collect()
}

fn names_pdf(target: &str) -> bool {
    let path = target.split(['?', '#']).next().unwrap_or_default();
    path.trim_end_matches('/').to_ascii_lowercase().ends_with(".pdf")
}

/// One run's pipeline and the state it owns.
pub struct Scraper<T, P, L> {
    config: ScrapeConfig,
    seeds: Vec<Url>,
    transport: T,
    extractor: PdfExtractor<P>,
    detector: L,
    rate: RateController,
    errors: ErrorAggregator,
}

impl<T, P, L> Scraper<T, P, L>
where
    T: Transport,
    P: PdfParser + Clone + Send + 'static,
    L: LanguageDetector,
{
    /// # Errors
    ///
    /// Fails on an invalid seed list or a window that ends before it starts.
    pub fn new(
        config: ScrapeConfig,
        transport: T,
        parser: P,
        detector: L,
        errors: ErrorAggregator,
    ) -> Result<Self, ScrapeError> {
        if config.window.end < config.window.start {
            return Err(ScrapeError::Config(format!(
                "end date {} is before start date {}",
                config.window.end, config.window.start
            )));
        }
        let seeds = parse_seeds(&config.seed_urls())?;
        let rate = RateController::new(config.initial_delay);
        Ok(Self {
            config,
            seeds,
            transport,
            extractor: PdfExtractor::new(parser),
            detector,
            rate,
            errors,
        })
    }

    pub fn seeds(&self) -> &[Url] {
        &self.seeds
    }

    /// Process every seed and assemble the result.
    #[instrument(level = "info", skip_all, fields(seeds = self.seeds.len()))]
    pub async fn run(mut self) -> RunResult {
        let run_start = Utc::now();
        let seeds = std::mem::take(&mut self.seeds);
        let mut successes = Vec::new();

        for seed in &seeds {
            match self.scrape_seed(seed).await {
                Ok(records) => {
                    info!(%seed, records = records.len(), "Seed finished");
                    successes.extend(records);
                }
                Err(e) => warn!(%seed, error = %e, "Skipping seed"),
            }
        }

        let window = self.config.window;
        let errors = self.errors.finish();
        info!(
            successes = successes.len(),
            errors = errors.len(),
            "Run finished"
        );
        RunResult {
            metadata: RunMetadata::new(window.start, window.end, run_start),
            errors,
            successes,
        }
    }

    /// Everything one seed yields. `Err` means the seed page itself failed;
    /// the failure has already been recorded.
    #[instrument(level = "info", skip_all, fields(seed = %seed))]
    async fn scrape_seed(&mut self, seed: &Url) -> Result<Vec<SuccessRecord>, ScrapeError> {
        let mut page = self.fetch_recorded(seed.as_str()).await?;
        self.render_recorded(&mut page).await?;

        let window = self.config.window;
        let discovery = discover(
            &page,
            &window,
            &mut self.rate,
            &self.transport,
            self.config.render_timeout,
        )
        .await;
        for failure in discovery.failed_pages {
            self.record_page_failure(failure);
        }

        let mut records = Vec::new();
        for article in &discovery.articles {
            records.extend(self.scrape_article(seed, article).await);
        }
        Ok(records)
    }

    /// Records for the PDFs linked from `article`, followed by the article
    /// itself.
    #[instrument(level = "debug", skip_all, fields(link = %article.link))]
    async fn scrape_article(
        &mut self,
        seed: &Url,
        article: &DiscoveredArticle,
    ) -> Vec<SuccessRecord> {
        let url = match seed.join(&article.link) {
            Ok(url) => url,
            Err(source) => {
                self.errors
                    .log_failure(&article.link, &ScrapeError::Url(source));
                return Vec::new();
            }
        };

        let Ok(mut fetched) = self.fetch_recorded(url.as_str()).await else {
            return Vec::new();
        };
        if self.render_recorded(&mut fetched).await.is_err() {
            return Vec::new();
        }

        let base = Url::parse(&fetched.final_url).unwrap_or_else(|_| url.clone());
        let page = read_article(&fetched.text(), &base);
        debug!(pdfs = page.pdf_links.len(), "Read article page");

        let mut records = Vec::new();
        for pdf_url in &page.pdf_links {
            if let Some(record) = self.scrape_pdf(pdf_url, article).await {
                records.push(record);
            }
        }

        let text = if page.text.is_empty() {
            article.title.clone()
        } else {
            page.text
        };
        if text.is_empty() {
            self.errors
                .log_extraction_error(url.as_str(), "article page has no text");
            return records;
        }

        records.push(SuccessRecord {
            datetime_accessed: format_timestamp(Utc::now()),
            language: detect_or(&self.detector, &text, &self.config.default_language),
            document_type: self.config.document_type,
            document_author: String::new(),
            document_date: article.date.format(DATE_FORMAT).to_string(),
            document_title: article.title.clone(),
            document_text: text,
            document_html: page.html,
            document_url: url.to_string(),
            document_pdf_encoded: String::new(),
            document_tables: Vec::new(),
        });
        records
    }

    /// Download and extract one PDF. Every failure is recorded and yields
    /// `None`.
    #[instrument(level = "debug", skip(self, article))]
    async fn scrape_pdf(&mut self, url: &str, article: &DiscoveredArticle) -> Option<SuccessRecord> {
        let fetched = self.fetch_recorded(url).await.ok()?;

        let pdf = match self.extract(fetched.body).await {
            Ok(pdf) => pdf,
            Err(source) => {
                let err = ScrapeError::Extraction {
                    url: url.to_string(),
                    source,
                };
                self.errors.log_failure(url, &err);
                return None;
            }
        };
        info!(
            %url,
            chars = pdf.text.len(),
            tables = pdf.tables.len(),
            "Extracted PDF"
        );

        let title = if pdf.title.is_empty() {
            article.title.clone()
        } else {
            pdf.title
        };
        Some(SuccessRecord {
            datetime_accessed: format_timestamp(Utc::now()),
            language: detect_or(&self.detector, &pdf.text, &self.config.default_language),
            document_type: self.config.document_type,
            document_author: pdf.author,
            document_date: article.date.format(DATE_FORMAT).to_string(),
            document_title: title,
            document_text: pdf.text,
            document_html: String::new(),
            document_url: url.to_string(),
            document_pdf_encoded: pdf.encoded,
            document_tables: pdf.tables,
        })
    }

    /// Run the extractor on the blocking pool.
    async fn extract(&self, bytes: Vec<u8>) -> Result<ExtractedPdf, ExtractionError> {
        let extractor = self.extractor.clone();
        let pdf = tokio::task::spawn_blocking(move || extractor.extract(&bytes))
            .await
            .map_err(|e| ExtractionError::Aborted(e.to_string()))??;
        if pdf.text.trim().is_empty() {
            return Err(ExtractionError::NoText);
        }
        Ok(pdf)
    }

    /// Rate-controlled fetch whose outcome is always recorded. `Ok` only
    /// for 2xx pages.
    async fn fetch_recorded(&mut self, url: &str) -> Result<FetchedPage, ScrapeError> {
        let page = match self.rate.wait_then_request(url, &self.transport).await {
            Ok(page) => page,
            Err(source) => {
                let err = ScrapeError::Transport {
                    url: url.to_string(),
                    source,
                };
                self.errors.log_failure(url, &err);
                return Err(err);
            }
        };
        self.errors.log_result(page.status, url)?;
        Ok(page)
    }

    async fn render_recorded(&mut self, page: &mut FetchedPage) -> Result<(), ScrapeError> {
        if let Err(source) = render_within(&self.transport, page, self.config.render_timeout).await
        {
            let err = ScrapeError::Transport {
                url: page.url.clone(),
                source,
            };
            self.errors.log_failure(&page.url, &err);
            return Err(err);
        }
        Ok(())
    }

    fn record_page_failure(&mut self, failure: PageFailure) {
        match failure {
            PageFailure::Status { url, status } => {
                // Recorded here; the page itself was already skipped.
                let _ = self.errors.log_result(status, &url);
            }
            PageFailure::Transport { url, source } => {
                warn!(%url, error = %truncate_for_log(&source.to_string(), 200), "Listing page failed");
                let err = ScrapeError::Transport {
                    url: url.clone(),
                    source,
                };
                self.errors.log_failure(&url, &err);
            }
        }
    }
}
