//! Platform identification - map a URL to a canonical retailer name
//!
//! Retailers are described by a declarative table (`assets/retailers.toml`).
//! Supporting a new retailer means adding an entry, not writing code: the
//! same table feeds host matching, trust weights, DOM title/image selectors
//! and rating-probe search URLs.

use std::fs;
use std::path::Path;

use once_cell::sync::Lazy;
use serde::Deserialize;
use url::Url;

use crate::error::{ProdlensError, Result};

/// Returned when a URL cannot be parsed or has no usable host
pub const UNKNOWN_SOURCE: &str = "Unknown Source";

/// Trust weight for platforms the table doesn't know
pub const DEFAULT_TRUST_WEIGHT: f64 = 5.0;

pub const MIN_TRUST_WEIGHT: f64 = 1.0;
pub const MAX_TRUST_WEIGHT: f64 = 10.0;

static EMBEDDED_TABLE: Lazy<RetailerTable> = Lazy::new(RetailerTable::embedded_defaults);

/// One retailer in the table
#[derive(Debug, Clone, Deserialize)]
pub struct RetailerDef {
    /// Stable identifier (e.g., "amazon")
    pub id: String,
    /// Display name (e.g., "Amazon")
    pub name: String,
    /// Case-insensitive substrings of the URL host
    #[serde(default)]
    pub host_patterns: Vec<String>,
    /// Intrinsic credibility, 1-10
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,
    /// Product-title selectors specific to this retailer's layout
    #[serde(default)]
    pub title_selectors: Vec<String>,
    /// Primary product-image selectors
    #[serde(default)]
    pub image_selectors: Vec<String>,
    /// Search page template with a `{query}` placeholder
    #[serde(default)]
    pub search_url: Option<String>,
}

fn default_trust_weight() -> f64 {
    DEFAULT_TRUST_WEIGHT
}

impl RetailerDef {
    /// Whether this retailer claims the given (lowercased) host
    pub fn matches_host(&self, host: &str) -> bool {
        self.host_patterns
            .iter()
            .any(|pattern| host.contains(&pattern.to_lowercase()))
    }

    /// Build the search URL for a product title
    pub fn search_url_for(&self, query: &str) -> Option<String> {
        self.search_url
            .as_ref()
            .map(|template| template.replace("{query}", &urlencoding::encode(query)))
    }
}

#[derive(Debug, Deserialize)]
struct RetailerFile {
    #[serde(default)]
    retailer: Vec<RetailerDef>,
}

/// The retailer knowledge base, in priority order
#[derive(Debug, Clone, Default)]
pub struct RetailerTable {
    pub retailers: Vec<RetailerDef>,
}

impl RetailerTable {
    /// Load the table from a TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            ProdlensError::KnowledgeBaseError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::parse_toml(&content)
    }

    /// Parse the table from a TOML string
    pub fn parse_toml(content: &str) -> Result<Self> {
        let file: RetailerFile = toml::from_str(content)
            .map_err(|e| ProdlensError::KnowledgeBaseError(format!("Failed to parse TOML: {}", e)))?;

        let retailers = file
            .retailer
            .into_iter()
            .filter(|r| !r.id.trim().is_empty() && !r.name.trim().is_empty())
            .map(|mut r| {
                r.trust_weight = clamp_trust(r.trust_weight);
                r
            })
            .collect();

        Ok(Self { retailers })
    }

    /// Load a user table if one is configured, otherwise the embedded defaults.
    /// A broken user table falls back to the defaults.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        if let Some(path) = path {
            match Self::load_from_file(path) {
                Ok(table) if !table.retailers.is_empty() => return table,
                Ok(_) => tracing::warn!(path = %path.display(), "retailer table is empty, using defaults"),
                Err(e) => tracing::warn!(path = %path.display(), error = %e, "using default retailer table"),
            }
        }
        Self::embedded_defaults()
    }

    /// Get embedded default table
    pub fn embedded_defaults() -> Self {
        let defaults = include_str!("../assets/retailers.toml");
        Self::parse_toml(defaults).unwrap_or_default()
    }

    /// Shared instance of the embedded table
    pub fn embedded() -> &'static RetailerTable {
        &EMBEDDED_TABLE
    }

    pub fn get(&self, id: &str) -> Option<&RetailerDef> {
        self.retailers.iter().find(|r| r.id.eq_ignore_ascii_case(id))
    }

    /// Find a retailer by id or display name
    pub fn find_by_platform(&self, platform: &str) -> Option<&RetailerDef> {
        let platform = platform.trim();
        self.retailers
            .iter()
            .find(|r| r.id.eq_ignore_ascii_case(platform) || r.name.eq_ignore_ascii_case(platform))
    }

    /// The first retailer whose host pattern matches the URL
    pub fn retailer_for_url(&self, url: &str) -> Option<&RetailerDef> {
        let host = host_of(url)?;
        self.retailers.iter().find(|r| r.matches_host(&host))
    }

    /// Canonical platform name for a URL. Never fails.
    pub fn identify(&self, url: &str) -> String {
        let host = match host_of(url) {
            Some(host) => host,
            None => return UNKNOWN_SOURCE.to_string(),
        };

        if let Some(retailer) = self.retailers.iter().find(|r| r.matches_host(&host)) {
            return retailer.name.clone();
        }

        synthesize_platform_name(&host)
    }

    /// Intrinsic trust weight for a platform name, clamped to 1-10
    pub fn trust_weight(&self, platform: &str) -> f64 {
        self.find_by_platform(platform)
            .map(|r| r.trust_weight)
            .unwrap_or(DEFAULT_TRUST_WEIGHT)
    }

    /// Every retailer title selector, table order, no duplicates.
    /// The retailer matching `url` (if any) goes first.
    pub fn title_selectors(&self, url: Option<&str>) -> Vec<&str> {
        self.collect_selectors(url, |r| &r.title_selectors)
    }

    /// Image selectors, same ordering rules as `title_selectors`
    pub fn image_selectors(&self, url: Option<&str>) -> Vec<&str> {
        self.collect_selectors(url, |r| &r.image_selectors)
    }

    fn collect_selectors<'a>(
        &'a self,
        url: Option<&str>,
        field: impl Fn(&'a RetailerDef) -> &'a Vec<String>,
    ) -> Vec<&'a str> {
        let preferred = url.and_then(|u| self.retailer_for_url(u));
        let mut selectors: Vec<&str> = Vec::new();

        let ordered = preferred
            .into_iter()
            .chain(self.retailers.iter().filter(|r| Some(r.id.as_str()) != preferred.map(|p| p.id.as_str())));

        for retailer in ordered {
            for selector in field(retailer) {
                if !selectors.contains(&selector.as_str()) {
                    selectors.push(selector.as_str());
                }
            }
        }
        selectors
    }
}

/// Identify a URL against the embedded retailer table
pub fn identify_platform(url: &str) -> String {
    RetailerTable::embedded().identify(url)
}

pub fn clamp_trust(weight: f64) -> f64 {
    if weight.is_nan() {
        return DEFAULT_TRUST_WEIGHT;
    }
    weight.clamp(MIN_TRUST_WEIGHT, MAX_TRUST_WEIGHT)
}

fn host_of(url: &str) -> Option<String> {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .filter(|h| !h.is_empty())
}

/// "www.gadgetshop.co.uk" -> "Gadgetshop.com"
fn synthesize_platform_name(host: &str) -> String {
    let host = host.strip_prefix("www.").unwrap_or(host);
    let label = host.split('.').next().unwrap_or_default();

    let mut chars = label.chars();
    match chars.next() {
        Some(first) => format!("{}{}.com", first.to_uppercase(), chars.as_str()),
        None => UNKNOWN_SOURCE.to_string(),
    }
}
