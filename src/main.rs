use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info, warn};

use classifieds_crawler_lib::cli::{Cli, Commands, ScrapeArgs, is_confirmed, parse_page_count};
use classifieds_crawler_lib::domain::ListingReport;
use classifieds_crawler_lib::infrastructure::diagnostics::{self, ProbeOptions, ProbeTarget};
use classifieds_crawler_lib::infrastructure::logging::log_system_info;
use classifieds_crawler_lib::infrastructure::{
    AppConfig, ConfigLoadStatus, ConfigManager, CrawlerConfig, HttpClient, HttpClientConfig, ListingCrawler, ListingParser,
    init_logging, init_logging_with_config, render_summary, write_outputs,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        eprintln!("\n❌ An error occurred: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let manager = match &cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new()?,
    };

    if let Commands::InitConfig { force } = cli.command {
        init_logging()?;
        return init_config(&manager, force).await;
    }

    let (config, status) = manager
        .load_config_with_status()
        .await
        .context("Failed to load configuration")?;
    init_logging_with_config(&config.logging)?;
    report_config_status(&manager, &status);

    match cli.command {
        Commands::Scrape(args) => scrape(config, &args).await,
        Commands::Probe { output_dir } => probe(&config, output_dir).await,
        Commands::InitConfig { .. } => Ok(()),
    }
}

/// Loading happens before logging exists, so repeat what happened once it does
fn report_config_status(manager: &ConfigManager, status: &ConfigLoadStatus) {
    let path = manager.config_path().display();
    match status {
        ConfigLoadStatus::Loaded => info!("Loaded configuration from {}", path),
        ConfigLoadStatus::Created => info!("Created default configuration at {}", path),
        ConfigLoadStatus::ResetCorrupted { reason, backup } => {
            warn!("Configuration file {} could not be parsed: {}", path, reason);
            match backup {
                Some(backup) => {
                    eprintln!(
                        "⚠️  Configuration file could not be parsed; backed up to {} and reset to defaults",
                        backup.display()
                    );
                    warn!("Backed up corrupted configuration to {}", backup.display());
                }
                None => {
                    eprintln!("⚠️  Configuration file could not be parsed and no backup could be made; reset to defaults");
                    warn!("Corrupted configuration could not be backed up");
                }
            }
        }
    }
}

fn prompt(message: &str) -> Result<String> {
    print!("{message}");
    io::stdout().flush().context("Failed to flush stdout")?;

    let mut answer = String::new();
    io::stdin().read_line(&mut answer).context("Failed to read from stdin")?;
    Ok(answer)
}

async fn scrape(mut config: AppConfig, args: &ScrapeArgs) -> Result<()> {
    args.apply_to(&mut config);
    config.validate().context("Invalid settings")?;

    println!("🔧 {} Search Scraper", config.site.name.to_uppercase());
    println!("{}", "=".repeat(50));
    println!("⚠️  DISCLAIMER: This tool is for educational purposes only.");
    println!("Please respect the site's terms of service and robots.txt");
    println!("{}", "=".repeat(50));

    if !args.yes {
        let answer = prompt("\n🚀 Do you want to proceed with scraping? (y/N): ")?;
        if !is_confirmed(&answer) {
            println!("❌ Scraping cancelled.");
            return Ok(());
        }
    }

    let pages = match args.pages {
        Some(pages) => config.crawling.clamp_pages(pages),
        None => {
            let answer = prompt(&format!(
                "📄 Enter number of pages to scrape (default {}): ",
                config.crawling.default_pages
            ))?;
            parse_page_count(&answer, config.crawling.default_pages, config.crawling.max_pages_limit)
        }
    };

    println!("\n🎯 Starting scrape for {pages} pages...");
    info!("Fetch strategy: {:?}", config.crawling.strategy);

    let client = HttpClient::with_config(HttpClientConfig::from_crawling_config(&config.crawling))?;
    let parser = ListingParser::with_config(&config.selectors).context("Invalid selector configuration")?;
    let crawler = ListingCrawler::new(client, parser, CrawlerConfig::from_app_config(&config, pages));

    let outcome = tokio::select! {
        outcome = crawler.crawl() => outcome,
        _ = tokio::signal::ctrl_c() => {
            println!("\n⚠️  Scraping interrupted by user");
            return Ok(());
        }
    };

    if outcome.listings.is_empty() {
        println!("\n❌ No listings found. Possible reasons:");
        println!("1. 🚫 The site has strong anti-bot protection for your IP");
        println!("2. 🌐 Try using a VPN from a different location");
        println!("3. ⏰ Wait a few hours and try again");
        println!("4. 📱 Try from mobile data instead of WiFi");
        if config.crawling.save_debug_pages {
            println!(
                "5. 🔍 Check the saved debug_page_*.html files in {}",
                config.output.debug_dir().display()
            );
        }
        return Ok(());
    }

    let search_url = crawler.config().search_url.clone();
    let report = ListingReport::new(&config.site.search_query, &search_url, outcome.listings);
    let written = write_outputs(&report, &config.output, &config.site.results_file_stem())
        .context("Failed to save results")?;

    print!("{}", render_summary(&report.listings, &search_url));

    println!("\n🎉 SUCCESS! Found {} listings", report.total_results);
    println!("📁 Check these files:");
    for path in written {
        println!("   - {}", path.display());
    }

    Ok(())
}

async fn probe(config: &AppConfig, output_dir: Option<PathBuf>) -> Result<()> {
    log_system_info();

    let client = HttpClient::with_config(HttpClientConfig::from_crawling_config(&config.crawling))?;
    let parser = ListingParser::with_config(&config.selectors).context("Invalid selector configuration")?;

    let defaults = ProbeOptions::default();
    let options = ProbeOptions {
        pause: defaults.pause.mul_f64(config.crawling.effective_delay_scale()),
        output_dir: output_dir.unwrap_or_else(|| config.output.output_dir.clone()),
        ..defaults
    };

    let targets = ProbeTarget::defaults_for(&config.site);
    let reports = diagnostics::probe(&client, &parser, &targets, &options).await;
    let reachable = reports.iter().filter(|report| report.is_reachable()).count();

    println!("\n{}", "=".repeat(50));
    println!("📡 {reachable}/{} targets reachable", reports.len());
    println!("🔧 Troubleshooting suggestions:");
    println!("1. Check if you can access {} in your browser", config.site.base_url);
    println!("2. Try using a VPN if the site is blocked in your region");
    println!("3. Check your internet connection");
    println!("4. The site might be temporarily blocking automated requests");
    println!("5. Try running the test again after a few minutes");

    Ok(())
}

async fn init_config(manager: &ConfigManager, force: bool) -> Result<()> {
    if manager.config_path().exists() && !force {
        println!(
            "Configuration already exists at {} (use --force to overwrite)",
            manager.config_path().display()
        );
        return Ok(());
    }

    manager.reset_to_defaults().await?;
    println!("✅ Wrote default configuration to {}", manager.config_path().display());
    Ok(())
}
