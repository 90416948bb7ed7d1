use std::io::Read;
use std::path::Path;

use colored::Colorize;

use prodlens::config::Config;
use prodlens::diagnostics::TracingSink;
use prodlens::error::Result;
use prodlens::markup::HtmlDocument;
use prodlens::probe::Analyzer;
use prodlens::rating::{AggregatedScore, Aggregator, PlatformRatingObservation};

use super::detect::{load_page, print_product};

/// Merge observations from a JSON file
pub fn cmd_aggregate(path: &Path, json: bool) -> Result<()> {
    let config = Config::load()?;

    let content = if path == Path::new("-") {
        let mut buffer = String::new();
        std::io::stdin().read_to_string(&mut buffer)?;
        buffer
    } else {
        std::fs::read_to_string(path)?
    };
    let observations: Vec<PlatformRatingObservation> = serde_json::from_str(&content)?;

    let score = Aggregator::new(config.aggregation.clone()).aggregate(&observations, &TracingSink);

    if json {
        println!("{}", serde_json::to_string_pretty(&score)?);
    } else {
        print_score(&score);
    }
    Ok(())
}

/// Detect the product on a page, probe every retailer and merge
pub fn cmd_rate(url: &str, file: Option<&Path>, json: bool) -> Result<()> {
    let config = Config::load()?;
    let page = load_page(url, file, &config)?;
    let analyzer = Analyzer::from_config(&config);
    let document = HtmlDocument::parse_with_url(&page.html, &page.url);

    if !json {
        println!("\n{} {}", "Analyzing".cyan().bold(), page.url);
    }

    let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
    let analysis = runtime.block_on(analyzer.analyze(&document, Some(page.url.as_str()), &TracingSink));

    if json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
        return Ok(());
    }

    match (&analysis.product, &analysis.score) {
        (Some(product), Some(score)) => {
            print_product(product);
            print_score(score);
        }
        _ => println!("{} Not a product page, nothing to rate", "✗".yellow()),
    }
    Ok(())
}

fn print_score(score: &AggregatedScore) {
    if score.platform_breakdown.is_empty() {
        println!("\n{} Not enough rating data", "?".yellow());
        return;
    }

    println!(
        "\n{} {:.1} / 5  {}",
        "Overall".green().bold(),
        score.overall_score,
        format!("(confidence {:.0}%)", score.confidence_score * 100.0).dimmed()
    );
    println!(
        "  {} reviews across {} platform{}\n",
        score.total_review_count,
        score.platform_count(),
        if score.platform_count() == 1 { "" } else { "s" }
    );

    println!("  {:<16} {:>6} {:>10} {:>6}", "Platform", "Rating", "Reviews", "Trust");
    println!("  {}", "─".repeat(44).dimmed());
    for observation in &score.platform_breakdown {
        let verified = if observation.verified {
            format!(" {}", "✓ verified".green())
        } else {
            String::new()
        };
        println!(
            "  {:<16} {:>6.1} {:>10} {:>6.0}{}",
            observation.platform,
            observation.rating,
            observation.review_count,
            observation.trust_weight,
            verified
        );
    }
}
