use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "prodlens")]
#[command(author, version, about = "Detect the product on a web page and merge its ratings across retailers", long_about = None)]
#[command(after_help = r#"Examples:
  prodlens detect "https://www.amazon.com/dp/B0863TXGM3"      What product is this?
  prodlens detect "https://shop.example.com/p/1" --file page.html
  prodlens platform "https://www.bestbuy.com/site/123.p"      Which retailer?
  prodlens aggregate observations.json                        Merge ratings you already have
  prodlens rate "https://www.walmart.com/ip/123" --json       Detect, probe and merge

Logging:
  RUST_LOG=prodlens=debug prodlens rate <url>                  Show every cascade step
"#)]
pub struct Cli {
    /// Show debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Detect the product on a page
    #[command(after_help = r#"Examples:
  prodlens detect "https://www.target.com/p/lego-classic/-/A-123"
  prodlens detect "https://shop.example.com/p/1" --file saved.html   # Don't fetch
  prodlens detect "https://www.etsy.com/listing/123" --json
"#)]
    Detect {
        /// Page URL (used for platform identification even with --file)
        url: String,

        /// Read the HTML from this file instead of fetching the URL
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the canonical platform name for a URL
    Platform {
        url: String,
    },

    /// Merge rating observations from a JSON file ("-" for stdin)
    #[command(after_help = r#"The file holds a JSON array of observations:
  [{"platform": "Amazon", "rating": 4.5, "reviewCount": 1000, "trustWeight": 9},
   {"platform": "Target", "rating": 3.0, "reviewCount": 10, "trustWeight": 4, "verified": true}]
"#)]
    Aggregate {
        #[arg(value_name = "OBSERVATIONS")]
        observations: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Detect the product, probe retailers for its rating and merge the results
    Rate {
        url: String,

        /// Read the product page from this file instead of fetching it
        #[arg(long, value_name = "PATH")]
        file: Option<PathBuf>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}
