use once_cell::sync::Lazy;
use regex::Regex;

use super::{char_len, ExtractionContext, ExtractionStrategy};
use crate::facts::{Attempt, CandidateFact, ExtractionMethod};
use crate::markup::MarkupSource;
use crate::normalize::strip_prices;

/// Title/site separators, tried in this order
const TITLE_SEPARATORS: &[&str] = &[" - ", " | ", " – ", " • ", " » ", " :: "];

/// Retailer names that show up glued to the start or end of page titles
const RETAILER_AFFIXES: &[&str] = &[
    "Amazon.com",
    "Amazon.co.uk",
    "Amazon.ca",
    "Amazon",
    "Walmart.com",
    "Walmart",
    "Best Buy",
    "BestBuy.com",
    "Target",
    "eBay",
    "Etsy",
    "The Home Depot",
    "Home Depot",
    "Lowe's",
    "Costco",
    "Newegg.com",
    "Newegg",
    "AliExpress",
    "Wayfair",
    "Sephora",
    "Flipkart.com",
    "Flipkart",
];

/// "Amazon.com: " / "Walmart - " at the start
static RETAILER_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)^\s*(?:{})\s*[:|\-–]\s*", affix_alternation()))
        .expect("Invalid retailer prefix regex")
});

/// " : Amazon.com" / " at Walmart" / " - Target" at the end
static RETAILER_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(r"(?i)\s*(?:[:|\-–]|\bat\b)\s*(?:{})\s*$", affix_alternation()))
        .expect("Invalid retailer suffix regex")
});

fn affix_alternation() -> String {
    RETAILER_AFFIXES
        .iter()
        .map(|name| regex::escape(name))
        .collect::<Vec<_>>()
        .join("|")
}

/// Shorter document titles are never a product
const MIN_DOCUMENT_TITLE_CHARS: usize = 5;

/// Exclusive bounds for the cleaned result
const MIN_PAGE_TITLE_CHARS: usize = 5;
const MAX_PAGE_TITLE_CHARS: usize = 200;

pub struct PageTitleStrategy;

impl ExtractionStrategy for PageTitleStrategy {
    fn name(&self) -> &'static str {
        "page-title"
    }

    fn attempt(&self, source: &dyn MarkupSource, _ctx: &ExtractionContext<'_>) -> Attempt<CandidateFact> {
        match source.document_title().and_then(|title| clean_page_title(&title)) {
            Some(title) => Attempt::Found(
                CandidateFact::new(title, ExtractionMethod::PageTitle).with_selector("title"),
            ),
            None => Attempt::NotFound,
        }
    }
}

/// Reduce a document title to the product name it (probably) starts with
pub fn clean_page_title(raw: &str) -> Option<String> {
    let title = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    if char_len(&title) < MIN_DOCUMENT_TITLE_CHARS {
        return None;
    }

    // Product name precedes the site name
    let first_segment = TITLE_SEPARATORS
        .iter()
        .find(|sep| title.contains(**sep))
        .and_then(|sep| title.split(*sep).next())
        .unwrap_or(&title);

    let without_prefix = RETAILER_PREFIX_RE.replace(first_segment, "");
    let without_affixes = RETAILER_SUFFIX_RE.replace(&without_prefix, "");
    let cleaned = strip_prices(&without_affixes);

    let len = char_len(&cleaned);
    (len > MIN_PAGE_TITLE_CHARS && len < MAX_PAGE_TITLE_CHARS).then_some(cleaned)
}
