//! # Eesti Pank scraper
//!
//! Collects blog posts, press releases and their PDF attachments from the
//! Eesti Pank website for a date window and writes them, together with
//! every failure encountered, into one `v2` JSON result document.
//!
//! ## Architecture
//!
//! The pipeline is strictly sequential:
//! 1. **Seeds**: listing pages built from the base URL and the window
//! 2. **Discovery**: paginated feeds and flat indexes filtered by date
//! 3. **Articles**: article pages and the PDFs they link to
//! 4. **Output**: pretty JSON, checked by [`validate`]
//!
//! Every request goes through the adaptive [`rate::RateController`].

pub mod cli;
pub mod codec;
pub mod discover;
pub mod error;
pub mod errors;
pub mod language;
pub mod logging;
pub mod models;
pub mod output;
pub mod pdf;
pub mod rate;
pub mod scrape;
pub mod transport;
pub mod utils;
pub mod validate;
