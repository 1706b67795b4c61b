mod models;
mod output;
mod pipeline;
mod scrapers;

use clap::Parser;
use output::Format;
use scrapers::types::DEFAULT_LISTING_URL;
use scrapers::{BrowserFetcher, HttpFetcher, ListingBrowser, PageFetcher, ScrapeParams};
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Scrape an RV dealer's used-inventory listing into a flat table
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Listing page showing the grid of units
    #[arg(short, long, default_value = DEFAULT_LISTING_URL)]
    url: String,

    /// Maximum number of listing pages to walk
    #[arg(long, default_value_t = 12)]
    max_pages: usize,

    /// Output file (defaults to rv_listings.csv / rv_listings.json)
    #[arg(short, long)]
    out: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Fetch pages over plain HTTP instead of headless Chrome
    #[arg(long, default_value_t = false)]
    no_browser: bool,

    /// Let detail pages load images, fonts and stylesheets
    #[arg(long, default_value_t = false)]
    load_assets: bool,

    /// Delay between page loads (ms) to be polite
    #[arg(long, default_value_t = 200)]
    delay_ms: u64,

    /// Extra attempts for plain HTTP fetches
    #[arg(long, default_value_t = 2)]
    retries: u32,

    /// Save the first listing page's HTML and a screenshot here
    #[arg(long)]
    debug_dir: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG overrides)
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

impl Args {
    fn to_params(&self) -> ScrapeParams {
        ScrapeParams {
            max_pages: self.max_pages,
            request_delay: Duration::from_millis(self.delay_ms),
            http_retries: self.retries,
            use_browser: !self.no_browser,
            block_detail_assets: !self.load_assets,
            debug_dir: self.debug_dir.clone(),
            ..ScrapeParams::for_url(self.url.trim())
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let default_level = if args.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("🚐 RV Scout - dealer listing scraper");
    info!("====================================");

    let params = args.to_params();
    info!("Listing URL: {}", params.listing_url);

    let http = HttpFetcher::new(&params)?;
    let run = if params.use_browser {
        let browser = tokio::task::spawn_blocking({
            let params = params.clone();
            move || ListingBrowser::launch(&params)
        })
        .await??;
        let browser = BrowserFetcher::new(browser);
        pipeline::run_scrape(&browser, Some(&http as &dyn PageFetcher), &params).await
    } else {
        info!("Browser disabled, fetching over plain HTTP");
        pipeline::run_scrape(&http, None, &params).await
    };

    info!("\n✅ Scraped {} rows\n", run.rows.len());

    for (i, row) in run.rows.iter().enumerate() {
        println!("{}. {} ({})", i + 1, row.title, row.list_price);
        if !row.tagline.is_empty() {
            println!("   {}", row.tagline);
        }
        if !row.payments_from.is_empty() {
            println!("   From {}/mo", row.payments_from);
        }
        println!("   URL: {}", row.detail_url);
        println!();
    }

    let path = args.out.clone().unwrap_or_else(|| args.format.default_path());
    output::write_output(args.format, &path, &run).await?;
    info!("💾 Saved {} rows to {}", run.rows.len(), path.display());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let args = Args::parse_from(["rv-scout"]);
        assert_eq!(args.url, DEFAULT_LISTING_URL);
        assert_eq!(args.format, Format::Csv);
        let params = args.to_params();
        assert!(params.use_browser);
        assert!(params.block_detail_assets);
        assert_eq!(params.site_domain, "parrisrv.com");
        assert_eq!(params.request_delay, Duration::from_millis(200));
    }

    #[test]
    fn flags_map_onto_params() {
        let args = Args::parse_from([
            "rv-scout",
            "--url",
            " https://dealer.example.com/used?page=2 ",
            "--max-pages",
            "3",
            "--no-browser",
            "--format",
            "json",
            "--retries",
            "0",
            "--load-assets",
        ]);
        let params = args.to_params();
        assert_eq!(params.listing_url, "https://dealer.example.com/used?page=2");
        assert_eq!(params.site_domain, "dealer.example.com");
        assert_eq!(params.max_pages, 3);
        assert_eq!(params.http_retries, 0);
        assert!(!params.use_browser);
        assert!(!params.block_detail_assets);
        assert_eq!(args.format, Format::Json);
    }
}
