//! Command-line interface definitions and prompt helpers

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::infrastructure::config::{AppConfig, OutputFormat};
use crate::infrastructure::retry_policy::FetchStrategy;

#[derive(Parser, Debug)]
#[command(
    name = "classifieds-crawler",
    about = "Scrape classifieds search results into JSON and CSV",
    version,
    after_help = "Run 'classifieds-crawler <command> --help' for details on each command."
)]
pub struct Cli {
    /// Configuration file (defaults to the per-user config directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Crawl search results pages and save the listings
    Scrape(ScrapeArgs),
    /// Check connectivity to the site and save a sample search page
    Probe {
        /// Directory for saved test pages
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Write the default configuration file
    InitConfig {
        /// Overwrite an existing configuration file
        #[arg(long)]
        force: bool,
    },
}

#[derive(Args, Debug, Default)]
pub struct ScrapeArgs {
    /// Number of pages to crawl (prompted for when omitted)
    #[arg(long)]
    pub pages: Option<u32>,

    /// Search query, e.g. "car cover"
    #[arg(long)]
    pub query: Option<String>,

    #[arg(long, value_enum)]
    pub strategy: Option<FetchStrategy>,

    #[arg(long)]
    pub output_dir: Option<PathBuf>,

    #[arg(long, value_enum)]
    pub format: Option<OutputFormat>,

    /// Skip the confirmation prompt
    #[arg(long, short)]
    pub yes: bool,

    /// Don't save fetched pages as debug_page_{n}.html
    #[arg(long)]
    pub no_debug_pages: bool,
}

impl ScrapeArgs {
    /// Apply command-line overrides on top of the loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(query) = &self.query {
            config.site.search_query.clone_from(query);
        }
        if let Some(strategy) = self.strategy {
            config.crawling.strategy = strategy;
        }
        if let Some(dir) = &self.output_dir {
            config.output.output_dir.clone_from(dir);
        }
        if let Some(format) = self.format {
            config.output.format = format;
        }
        if self.no_debug_pages {
            config.crawling.save_debug_pages = false;
        }
    }
}

/// Page count from a prompt answer: blank or non-numeric gives `default`,
/// any integer (however large) is clamped to `[1, max]`
pub fn parse_page_count(input: &str, default: u32, max: u32) -> u32 {
    let max = max.max(1);
    let trimmed = input.trim();

    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return default.clamp(1, max);
    }

    if negative {
        return 1;
    }
    digits.parse::<u32>().map_or(max, |n| n.clamp(1, max))
}

/// Only an explicit "y" proceeds
pub fn is_confirmed(answer: &str) -> bool {
    answer.trim().eq_ignore_ascii_case("y")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("", 2)]
    #[case("   ", 2)]
    #[case("3", 3)]
    #[case(" 4 ", 4)]
    #[case("0", 1)]
    #[case("-7", 1)]
    #[case("50", 5)]
    #[case("two", 2)]
    #[case("2.5", 2)]
    #[case("+3", 3)]
    #[case("-", 2)]
    #[case("99999999999999999999", 5)]
    #[case("-99999999999999999999", 1)]
    fn test_parse_page_count(#[case] input: &str, #[case] expected: u32) {
        assert_eq!(parse_page_count(input, 2, 5), expected);
    }

    #[rstest]
    #[case("y", true)]
    #[case("Y\n", true)]
    #[case("", false)]
    #[case("yes", false)]
    #[case("n", false)]
    fn test_is_confirmed(#[case] answer: &str, #[case] expected: bool) {
        assert_eq!(is_confirmed(answer), expected);
    }

    #[test]
    fn test_scrape_flags_override_config() {
        let cli = Cli::parse_from([
            "classifieds-crawler",
            "scrape",
            "--pages",
            "3",
            "--query",
            "bike cover",
            "--strategy",
            "basic",
            "--format",
            "csv",
            "--no-debug-pages",
            "--yes",
        ]);

        let Commands::Scrape(args) = cli.command else {
            panic!("expected scrape command");
        };
        assert_eq!(args.pages, Some(3));
        assert!(args.yes);

        let mut config = AppConfig::default();
        args.apply_to(&mut config);
        assert_eq!(config.site.search_query, "bike cover");
        assert_eq!(config.crawling.strategy, FetchStrategy::Basic);
        assert_eq!(config.output.format, OutputFormat::Csv);
        assert!(!config.crawling.save_debug_pages);
    }

    #[test]
    fn test_global_config_flag() {
        let cli = Cli::parse_from(["classifieds-crawler", "probe", "--config", "/tmp/c.json"]);
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/c.json")));
        assert!(matches!(cli.command, Commands::Probe { output_dir: None }));
    }
}
