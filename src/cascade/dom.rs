use super::{char_len, ExtractionContext, ExtractionStrategy, MAX_CANDIDATE_CHARS};
use crate::facts::{Attempt, CandidateFact, ExtractionMethod};
use crate::markup::MarkupSource;

/// Title selectors shared by common storefront themes and layouts.
/// Retailer-specific selectors from the retailer table are probed first.
const GENERIC_TITLE_SELECTORS: &[&str] = &[
    "h1[itemprop='name']",
    "[itemprop='name'] h1",
    "[data-testid='product-title']",
    "[data-test='product-title']",
    "[data-automation='product-title']",
    "#product-title",
    "#productName",
    "h1.product-title",
    "h1.product_title",
    "h1.product-name",
    "h1.productName",
    ".product-title h1",
    ".product-name h1",
    ".product__title",
    ".product-single__title",
    ".product-detail-title",
    ".product-details h1",
    ".product-info h1",
    ".pdp-title",
    ".pdp-product-name",
    ".product-title",
    ".product-name",
    ".item-title",
    ".product h1",
    "[class*='ProductTitle']",
    "[class*='productTitle']",
    "[class*='product-title']",
    "main h1[class*='title']",
];

/// Minimum exclusive length for a selector hit
const MIN_SELECTOR_CHARS: usize = 5;

/// Bounds (both exclusive) for the bare `<h1>` fallback
const MIN_HEADING_CHARS: usize = 10;
const MAX_HEADING_CHARS: usize = 200;

/// Headings that are page chrome rather than a product
const NON_PRODUCT_PHRASES: &[&str] = &["shopping cart", "checkout", "login", "sign in"];

pub struct DomSelectorStrategy;

impl ExtractionStrategy for DomSelectorStrategy {
    fn name(&self) -> &'static str {
        "dom-selectors"
    }

    fn attempt(&self, source: &dyn MarkupSource, ctx: &ExtractionContext<'_>) -> Attempt<CandidateFact> {
        let mut selectors = ctx.retailers.title_selectors(ctx.url);
        for generic in GENERIC_TITLE_SELECTORS {
            if !selectors.contains(generic) {
                selectors.push(*generic);
            }
        }

        let mut invalid = Vec::new();

        for selector in selectors {
            let texts = match source.select_text(selector) {
                Ok(texts) => texts,
                Err(e) => {
                    invalid.push(e.to_string());
                    continue;
                }
            };

            let hit = texts.into_iter().find(|text| {
                let len = char_len(text);
                len > MIN_SELECTOR_CHARS && len <= MAX_CANDIDATE_CHARS
            });

            if let Some(title) = hit {
                return Attempt::Found(
                    CandidateFact::new(title, ExtractionMethod::DomSelector).with_selector(selector),
                );
            }
        }

        if let Some(title) = first_product_heading(source) {
            return Attempt::Found(
                CandidateFact::new(title, ExtractionMethod::GenericHeading).with_selector("h1"),
            );
        }

        if invalid.is_empty() {
            Attempt::NotFound
        } else {
            Attempt::Malformed(invalid.join("; "))
        }
    }
}

fn first_product_heading(source: &dyn MarkupSource) -> Option<String> {
    source.select_text("h1").ok()?.into_iter().find(|text| {
        let len = char_len(text);
        let lower = text.to_lowercase();
        len > MIN_HEADING_CHARS
            && len < MAX_HEADING_CHARS
            && !NON_PRODUCT_PHRASES.iter().any(|phrase| lower.contains(phrase))
    })
}
