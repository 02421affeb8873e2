//! Check a result file against the consumer's acceptance rules.
//!
//! ```sh
//! validate_output ./out/2024-02-01.json
//! ```
//!
//! Prints `OK` and exits 0 when the file passes; otherwise reports the first
//! violated rule and exits non-zero.

use clap::Parser;
use eestipank_scraper::validate::validate_file;
use std::error::Error;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Validate a scraper result file")]
struct Args {
    /// Result JSON file to check
    file: PathBuf,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    validate_file(&args.file)?;
    println!("OK");
    Ok(())
}
