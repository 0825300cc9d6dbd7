//! Result export
//!
//! Writes the crawl report as pretty JSON and the listings as CSV, and
//! renders the console summary.

use std::fmt::Write as _;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use thiserror::Error;
use tracing::{info, warn};

use crate::domain::listing::{Listing, ListingReport};
use crate::infrastructure::config::OutputConfig;

/// Sample listings shown in the summary
pub const SUMMARY_SAMPLE_SIZE: usize = 3;

/// URLs in the summary are cut to this many characters
const SUMMARY_URL_WIDTH: usize = 80;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error writing {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

impl ExportError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Write the report as 2-space indented UTF-8 JSON
pub fn save_to_json(report: &ListingReport, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|e| ExportError::io(path, e))?;
    let mut writer = BufWriter::new(file);

    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().map_err(|e| ExportError::io(path, e))?;

    info!("💾 Results saved to {}", path.display());
    Ok(())
}

/// Write one CSV row per listing; returns `false` (writing nothing) when empty
pub fn save_to_csv(listings: &[Listing], path: &Path) -> Result<bool, ExportError> {
    if listings.is_empty() {
        warn!("❌ No listings to save");
        return Ok(false);
    }

    let mut writer = csv::Writer::from_path(path)?;
    for listing in listings {
        writer.serialize(listing)?;
    }
    writer.flush().map_err(|e| ExportError::io(path, e))?;

    info!("💾 Results saved to {}", path.display());
    Ok(true)
}

/// Write every format enabled in `output`, returning the files created
pub fn write_outputs(report: &ListingReport, output: &OutputConfig, file_stem: &str) -> Result<Vec<PathBuf>, ExportError> {
    fs::create_dir_all(&output.output_dir).map_err(|e| ExportError::io(&output.output_dir, e))?;

    let mut written = Vec::new();

    if output.format.writes_json() {
        let path = output.output_dir.join(format!("{file_stem}.json"));
        save_to_json(report, &path)?;
        written.push(path);
    }

    if output.format.writes_csv() {
        let path = output.output_dir.join(format!("{file_stem}.csv"));
        if save_to_csv(&report.listings, &path)? {
            written.push(path);
        }
    }

    Ok(written)
}

/// Console summary: totals plus the first few listings
pub fn render_summary(listings: &[Listing], search_url: &str) -> String {
    let rule = "=".repeat(60);
    let mut out = String::new();

    let _ = writeln!(out, "\n{rule}");
    let _ = writeln!(out, "🎯 SCRAPING SUMMARY");
    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "📊 Total listings found: {}", listings.len());
    let _ = writeln!(out, "🔗 Search URL: {search_url}");
    let _ = writeln!(out, "⏰ Scraped at: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));

    if !listings.is_empty() {
        let _ = writeln!(out, "\n📋 Sample listings:");
        for (i, listing) in listings.iter().take(SUMMARY_SAMPLE_SIZE).enumerate() {
            let url: String = listing.url.chars().take(SUMMARY_URL_WIDTH).collect();
            let _ = writeln!(out, "\n{}. {}", i + 1, listing.title);
            let _ = writeln!(out, "   💰 Price: {}", listing.price);
            let _ = writeln!(out, "   📍 Location: {}", listing.location);
            let _ = writeln!(out, "   📅 Date: {}", listing.date);
            let _ = writeln!(out, "   🔗 URL: {url}...");
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing(title: &str) -> Listing {
        Listing {
            title: title.to_string(),
            price: "₹ 1,500".to_string(),
            url: format!("https://www.olx.in/item/{title}"),
            ..Listing::default()
        }
    }

    #[test]
    fn test_summary_shows_at_most_three_samples() {
        let listings: Vec<Listing> = ["one", "two", "three", "four"].iter().map(|t| listing(t)).collect();
        let summary = render_summary(&listings, "https://www.olx.in/items/q-car-cover");

        assert!(summary.contains("📊 Total listings found: 4"));
        assert!(summary.contains("3. three"));
        assert!(!summary.contains("4. four"));
        assert!(summary.contains("🔗 URL: https://www.olx.in/item/one..."));
    }

    #[test]
    fn test_summary_truncates_long_urls() {
        let long = Listing {
            url: format!("https://www.olx.in/item/{}", "x".repeat(200)),
            ..listing("long")
        };
        let summary = render_summary(&[long.clone()], "u");
        let expected: String = long.url.chars().take(80).collect();
        assert!(summary.contains(&format!("🔗 URL: {expected}...\n")));
    }

    #[test]
    fn test_empty_summary_has_no_samples() {
        let summary = render_summary(&[], "u");
        assert!(summary.contains("Total listings found: 0"));
        assert!(!summary.contains("Sample listings"));
    }
}
