//! Article discovery on listing pages.
//!
//! Two listing shapes are understood, chosen by probing the markup rather
//! than the URL:
//!
//! | Kind | Markup | Pagination |
//! |------|--------|------------|
//! | [`PageKind::PaginatedFeed`] | `MiniPost` blocks with a `DD.MM.YY` date, an `h2` title, and an enclosing link | `?page=N` up to the advertised maximum |
//! | [`PageKind::FlatIndex`] | `dt` date / `dd` title pairs inside a link | none |
//!
//! Only articles whose date falls inside the [`DateWindow`] are returned.
//! Listing dates carry a two-digit year; see [`ArticleDate::resolve_in`].

use crate::error::TransportError;
use crate::rate::RateController;
use crate::transport::{FetchedPage, Transport, render_within};
use crate::utils::element_text;
use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info, instrument, warn};
use url::Url;

static PAGINATION_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"a[tabindex="0"]"#).unwrap());
static POST_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse(r#"div[class*="MiniPost_post__content"]"#).unwrap());
static POST_DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("p").unwrap());
static POST_TITLE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("h2").unwrap());
static INDEX_DATE_SELECTOR: Lazy<Selector> = Lazy::new(|| Selector::parse("dt").unwrap());

/// Inclusive calendar-date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Calendar years touched by the window, oldest first.
    pub fn years(&self) -> impl Iterator<Item = i32> {
        self.start.year()..=self.end.year()
    }
}

/// Year component as printed on a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum YearToken {
    /// Two digits with no century, e.g. `24`.
    TwoDigit(u8),
    Full(i32),
}

/// A `DD.MM.YY` (or `DD.MM.YYYY`) listing date before century resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArticleDate {
    pub day: u32,
    pub month: u32,
    pub year: YearToken,
}

impl ArticleDate {
    /// Parse a dotted date: first component is the day, second the month,
    /// last the year.
    pub fn parse(raw: &str) -> Option<Self> {
        let parts: Vec<&str> = raw
            .trim()
            .split('.')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .collect();
        if parts.len() < 3 || !parts.iter().all(|p| p.bytes().all(|b| b.is_ascii_digit())) {
            return None;
        }

        let day = parts[0].parse().ok()?;
        let month = parts[1].parse().ok()?;
        let last = parts[parts.len() - 1];
        let year = if last.len() <= 2 {
            YearToken::TwoDigit(last.parse().ok()?)
        } else {
            YearToken::Full(last.parse().ok()?)
        };
        Some(Self { day, month, year })
    }

    /// The calendar date this listing date denotes inside `window`, if any.
    ///
    /// A two-digit year is not assumed to be 20xx. It is tried against each
    /// century the window touches, and the first candidate that falls
    /// inside the window wins. A date that lands outside the window under
    /// every candidate century is rejected.
    pub fn resolve_in(&self, window: &DateWindow) -> Option<NaiveDate> {
        match self.year {
            YearToken::Full(year) => NaiveDate::from_ymd_opt(year, self.month, self.day)
                .filter(|date| window.contains(*date)),
            YearToken::TwoDigit(yy) => {
                let first = window.start.year().div_euclid(100);
                let last = window.end.year().div_euclid(100);
                (first..=last)
                    .filter_map(|century| {
                        NaiveDate::from_ymd_opt(century * 100 + i32::from(yy), self.month, self.day)
                    })
                    .find(|date| window.contains(*date))
            }
        }
    }
}

/// A listing entry inside the window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredArticle {
    /// `href` exactly as found; may be relative.
    pub link: String,
    /// Date string exactly as printed on the listing.
    pub raw_date: String,
    pub title: String,
    pub date: NaiveDate,
}

/// Listing shape, decided by [`probe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    PaginatedFeed { max_pages: u32 },
    FlatIndex,
}

/// A listing page that could not be fetched while paginating.
#[derive(Debug)]
pub enum PageFailure {
    Status { url: String, status: u16 },
    Transport { url: String, source: TransportError },
}

/// Everything one listing walk produced.
#[derive(Debug)]
pub struct Discovery {
    pub kind: PageKind,
    pub articles: Vec<DiscoveredArticle>,
    pub failed_pages: Vec<PageFailure>,
    /// Follow-up listing pages requested, not counting the first page.
    pub pages_fetched: u32,
}

/// Decide which listing shape `document` is.
pub fn probe(document: &Html) -> PageKind {
    if document.select(&POST_SELECTOR).next().is_none() {
        return PageKind::FlatIndex;
    }

    let controls: Vec<ElementRef<'_>> = document.select(&PAGINATION_SELECTOR).collect();
    // The last control is "next"; the one before it is the highest page.
    let max_pages = controls
        .len()
        .checked_sub(2)
        .and_then(|i| element_text(controls[i]).parse::<u32>().ok())
        .unwrap_or(1)
        .max(1);
    PageKind::PaginatedFeed { max_pages }
}

/// Probe one listing body and pull out its in-window articles.
pub fn parse_listing(body: &str, window: &DateWindow) -> (PageKind, Vec<DiscoveredArticle>) {
    let document = Html::parse_document(body);
    let kind = probe(&document);
    let articles = match kind {
        PageKind::PaginatedFeed { .. } => feed_articles(&document, window),
        PageKind::FlatIndex => index_articles(&document, window),
    };
    (kind, articles)
}

fn feed_articles(document: &Html, window: &DateWindow) -> Vec<DiscoveredArticle> {
    document
        .select(&POST_SELECTOR)
        .filter_map(|post| {
            let raw_date = element_text(post.select(&POST_DATE_SELECTOR).next()?);
            let title = post
                .select(&POST_TITLE_SELECTOR)
                .next()
                .map(element_text)
                .unwrap_or_default();
            accept(enclosing_link(post), raw_date, title, window)
        })
        .collect()
}

fn index_articles(document: &Html, window: &DateWindow) -> Vec<DiscoveredArticle> {
    document
        .select(&INDEX_DATE_SELECTOR)
        .filter_map(|dt| {
            let raw_date = element_text(dt);
            let title = dt
                .next_siblings()
                .filter_map(ElementRef::wrap)
                .find(|el| el.value().name() == "dd")
                .map(element_text)
                .unwrap_or_default();
            accept(enclosing_link(dt), raw_date, title, window)
        })
        .collect()
}

fn accept(
    link: Option<String>,
    raw_date: String,
    title: String,
    window: &DateWindow,
) -> Option<DiscoveredArticle> {
    let Some(parsed) = ArticleDate::parse(&raw_date) else {
        debug!(%raw_date, "Skipping entry with unparseable date");
        return None;
    };
    let date = parsed.resolve_in(window)?;
    let Some(link) = link else {
        warn!(%raw_date, %title, "In-window entry has no enclosing link");
        return None;
    };
    Some(DiscoveredArticle {
        link,
        raw_date,
        title,
        date,
    })
}

/// `href` of the nearest ancestor anchor.
fn enclosing_link(element: ElementRef<'_>) -> Option<String> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find_map(|el| (el.value().name() == "a").then(|| el.value().attr("href")).flatten())
        .map(str::to_string)
}

/// `url` with its `page` query parameter set to `page`.
pub fn page_url(url: &str, page: u32) -> Result<String, url::ParseError> {
    let mut parsed = Url::parse(url)?;
    let kept: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(k, _)| k != "page")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    parsed
        .query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair("page", &page.to_string());
    Ok(parsed.to_string())
}

/// Collect in-window articles starting from an already fetched and
/// rendered listing page.
///
/// For a paginated feed, pages `2..=max_pages` are fetched through `rate`
/// one after another. Entries are not sorted by date, so the walk never
/// stops early; a page that fails is reported in
/// [`Discovery::failed_pages`] and skipped.
#[instrument(level = "info", skip_all, fields(url = %first_page.url))]
pub async fn discover<T: Transport>(
    first_page: &FetchedPage,
    window: &DateWindow,
    rate: &mut RateController,
    transport: &T,
    render_timeout: Duration,
) -> Discovery {
    let (kind, mut articles) = parse_listing(&first_page.text(), window);
    let mut failed_pages = Vec::new();
    let mut pages_fetched = 0;

    if let PageKind::PaginatedFeed { max_pages } = kind {
        info!(max_pages, "Walking paginated feed");
        for page in 2..=max_pages {
            let url = match page_url(&first_page.url, page) {
                Ok(url) => url,
                Err(e) => {
                    warn!(error = %e, page, "Cannot build page URL; stopping walk");
                    break;
                }
            };

            pages_fetched += 1;
            let mut fetched = match rate.wait_then_request(&url, transport).await {
                Ok(fetched) => fetched,
                Err(source) => {
                    failed_pages.push(PageFailure::Transport { url, source });
                    continue;
                }
            };
            if !fetched.is_success() {
                failed_pages.push(PageFailure::Status {
                    url,
                    status: fetched.status,
                });
                continue;
            }
            if let Err(source) = render_within(transport, &mut fetched, render_timeout).await {
                failed_pages.push(PageFailure::Transport { url, source });
                continue;
            }

            let (_, found) = parse_listing(&fetched.text(), window);
            debug!(page, found = found.len(), "Parsed feed page");
            articles.extend(found);
        }
    }

    info!(?kind, count = articles.len(), failed = failed_pages.len(), "Discovery finished");
    Discovery {
        kind,
        articles,
        failed_pages,
        pages_fetched,
    }
}
