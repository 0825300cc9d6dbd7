use chrono::Local;
use serde::{Deserialize, Serialize};

/// Placeholder written for any field the listing markup did not provide
pub const NOT_AVAILABLE: &str = "N/A";

/// Single classifieds listing extracted from a search results page
///
/// Field order is the serialization order for both JSON and CSV output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Listing {
    pub title: String,
    pub price: String,
    pub location: String,
    pub date: String,
    pub url: String,
    pub image_url: String,
}

impl Default for Listing {
    fn default() -> Self {
        Self {
            title: NOT_AVAILABLE.to_string(),
            price: NOT_AVAILABLE.to_string(),
            location: NOT_AVAILABLE.to_string(),
            date: NOT_AVAILABLE.to_string(),
            url: NOT_AVAILABLE.to_string(),
            image_url: NOT_AVAILABLE.to_string(),
        }
    }
}

impl Listing {
    /// Listings without a title are discarded by the crawler
    pub fn has_title(&self) -> bool {
        self.title != NOT_AVAILABLE
    }
}

/// JSON envelope persisted after a crawl
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingReport {
    pub search_query: String,
    pub search_url: String,
    /// Local wall-clock time, ISO-8601 without offset
    pub scraped_at: String,
    pub total_results: usize,
    pub listings: Vec<Listing>,
}

impl ListingReport {
    pub fn new(search_query: &str, search_url: &str, listings: Vec<Listing>) -> Self {
        Self {
            search_query: search_query.to_string(),
            search_url: search_url.to_string(),
            scraped_at: Local::now().naive_local().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
            total_results: listings.len(),
            listings,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_listing_is_all_placeholders() {
        let listing = Listing::default();
        assert!(!listing.has_title());
        assert_eq!(listing.image_url, NOT_AVAILABLE);
    }

    #[test]
    fn test_report_counts_listings() {
        let listings = vec![
            Listing { title: "Car cover XL".to_string(), ..Listing::default() },
            Listing { title: "Waterproof cover".to_string(), ..Listing::default() },
        ];
        let report = ListingReport::new("car cover", "https://www.olx.in/items/q-car-cover", listings);

        assert_eq!(report.total_results, 2);
        assert_eq!(report.search_query, "car cover");
        // 2024-01-01T12:00:00.000000
        assert_eq!(report.scraped_at.len(), 26);
        assert_eq!(&report.scraped_at[10..11], "T");
    }

    #[test]
    fn test_listing_serializes_in_field_order() {
        let listing = Listing { title: "Cover".to_string(), ..Listing::default() };
        let json = serde_json::to_string(&listing).unwrap();
        let title_pos = json.find("\"title\"").unwrap();
        let image_pos = json.find("\"image_url\"").unwrap();
        assert!(title_pos < image_pos);
    }
}
