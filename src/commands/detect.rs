use std::path::Path;
use std::time::Duration;

use colored::Colorize;

use prodlens::config::Config;
use prodlens::diagnostics::TracingSink;
use prodlens::error::Result;
use prodlens::facts::DetectedProduct;
use prodlens::fetch::{Fetcher, PageContent, DEFAULT_TIMEOUT_SECS};
use prodlens::markup::HtmlDocument;
use prodlens::probe::Analyzer;

/// The page to analyze: a saved file when given, otherwise a fresh fetch
pub(crate) fn load_page(url: &str, file: Option<&Path>, config: &Config) -> Result<PageContent> {
    match file {
        Some(path) => Ok(PageContent {
            url: url.to_string(),
            html: std::fs::read_to_string(path)?,
        }),
        None => {
            let fetcher = Fetcher::new(
                Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                config.probe.user_agent.clone(),
            );
            let page = fetcher.fetch(url)?;
            if page.looks_blocked() {
                tracing::warn!(url = %page.url, "page looks like a bot check; try --file with a saved copy");
            }
            Ok(page)
        }
    }
}

/// Detect the product on a page
pub fn cmd_detect(url: &str, file: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load()?;
    let page = load_page(url, file, &config)?;

    let analyzer = Analyzer::new(config.retailer_table());
    let document = HtmlDocument::parse_with_url(&page.html, &page.url);
    let product = analyzer.detect(&document, Some(page.url.as_str()), &TracingSink);

    if json {
        println!("{}", serde_json::to_string_pretty(&product)?);
        return Ok(());
    }

    match product {
        Some(product) => print_product(&product),
        None => println!("{} No product detected on {}", "✗".yellow(), page.url),
    }

    Ok(())
}

/// Print the canonical platform name for a URL
pub fn cmd_platform(url: &str) -> Result<()> {
    let config = Config::load()?;
    println!("{}", config.retailer_table().identify(url));
    Ok(())
}

pub(crate) fn print_product(product: &DetectedProduct) {
    println!("\n{} {}", "Product".cyan().bold(), product.title.bold());
    println!("  Source:  {}", product.source);
    if !product.url.is_empty() {
        println!("  URL:     {}", product.url);
    }
    if let Some(image) = &product.image {
        println!("  Image:   {}", image);
    }
    match &product.selector {
        Some(selector) => println!("  Found by {} {}", product.method, format!("({})", selector).dimmed()),
        None => println!("  Found by {}", product.method),
    }
}
