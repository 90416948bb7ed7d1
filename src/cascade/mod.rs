//! Extraction cascade - find the product a page is about
//!
//! Strategies are tried in a fixed priority order and the first accepted
//! candidate wins:
//!
//! 1. Structured data (JSON-LD `Product`, `@graph`, `BreadcrumbList`)
//! 2. Meta tags (`og:title` and friends)
//! 3. DOM selectors (retailer table, generic layouts, then `<h1>` scan)
//! 4. The document `<title>`
//!
//! Finding nothing is not an error: `extract` returns `None` and the caller
//! decides what "not a product page" means for them.

mod dom;
mod image;
mod meta;
mod page_title;
pub mod structured_data;

pub use dom::DomSelectorStrategy;
pub use image::{resolve_image, MIN_IMAGE_AREA, MIN_IMAGE_SIDE};
pub use meta::MetaTagStrategy;
pub use page_title::{clean_page_title, PageTitleStrategy};
pub use structured_data::StructuredDataStrategy;

use url::Url;

use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink, NoopSink};
use crate::facts::{Attempt, CandidateFact, DetectedProduct};
use crate::markup::MarkupSource;
use crate::normalize::normalize_title;
use crate::platform::{RetailerTable, UNKNOWN_SOURCE};

/// Longest raw candidate any strategy will hand over
pub const MAX_CANDIDATE_CHARS: usize = 250;

/// What a strategy knows about the page besides its markup
#[derive(Debug, Clone, Copy)]
pub struct ExtractionContext<'a> {
    /// Page URL, when known
    pub url: Option<&'a str>,
    pub retailers: &'a RetailerTable,
}

impl<'a> ExtractionContext<'a> {
    pub fn new(url: Option<&'a str>, retailers: &'a RetailerTable) -> Self {
        Self { url, retailers }
    }

    /// Resolve a possibly relative link against the page URL
    pub fn resolve(&self, link: &str) -> String {
        let link = link.trim();
        if link.starts_with("http://") || link.starts_with("https://") {
            return link.to_string();
        }
        if link.starts_with("//") {
            return format!("https:{}", link);
        }

        self.url
            .and_then(|u| Url::parse(u).ok())
            .and_then(|base| base.join(link).ok())
            .map(|resolved| resolved.to_string())
            .unwrap_or_else(|| link.to_string())
    }
}

/// One way of finding a product title on a page
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn attempt(&self, source: &dyn MarkupSource, ctx: &ExtractionContext<'_>) -> Attempt<CandidateFact>;
}

/// Character count, which is what every length bound here means
pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// An ordered list of strategies
pub struct Cascade {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl Default for Cascade {
    fn default() -> Self {
        Self::new(vec![
            Box::new(StructuredDataStrategy),
            Box::new(MetaTagStrategy),
            Box::new(DomSelectorStrategy),
            Box::new(PageTitleStrategy),
        ])
    }
}

impl Cascade {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// First accepted candidate, with its title already normalized
    pub fn run(
        &self,
        source: &dyn MarkupSource,
        ctx: &ExtractionContext<'_>,
        sink: &dyn DiagnosticsSink,
    ) -> Option<CandidateFact> {
        self.strategies.iter().find_map(|strategy| {
            match strategy.attempt(source, ctx) {
                Attempt::Found(mut fact) => {
                    let title = normalize_title(&fact.title);
                    if title.is_empty() {
                        // Nothing left after cleaning (e.g., a bare price)
                        sink.record(DiagnosticEvent::StrategyRejected { strategy: strategy.name() });
                        return None;
                    }
                    fact.title = title;
                    sink.record(DiagnosticEvent::StrategyAccepted {
                        strategy: strategy.name(),
                        method: fact.method,
                        selector: fact.selector.clone(),
                    });
                    Some(fact)
                }
                Attempt::NotFound => {
                    sink.record(DiagnosticEvent::StrategyRejected { strategy: strategy.name() });
                    None
                }
                Attempt::Malformed(reason) => {
                    sink.record(DiagnosticEvent::StrategyMalformed { strategy: strategy.name(), reason });
                    None
                }
            }
        })
    }

    /// Run the cascade and build a `DetectedProduct`, resolving an image if
    /// the accepted strategy didn't supply one.
    pub fn extract(
        &self,
        source: &dyn MarkupSource,
        ctx: &ExtractionContext<'_>,
        sink: &dyn DiagnosticsSink,
    ) -> Option<DetectedProduct> {
        let fact = self.run(source, ctx, sink)?;

        let image = match fact.image {
            Some(image) => Some(ctx.resolve(&image)),
            None => resolve_image(source, ctx, sink),
        };

        let (url, platform) = match ctx.url {
            Some(url) => (url.to_string(), ctx.retailers.identify(url)),
            None => (String::new(), UNKNOWN_SOURCE.to_string()),
        };

        Some(DetectedProduct {
            title: fact.title,
            url,
            source: platform,
            image,
            method: fact.method,
            selector: fact.selector,
        })
    }
}

/// Detect the product on a page with the default cascade and retailer table
pub fn extract(source: &dyn MarkupSource, url: Option<&str>) -> Option<DetectedProduct> {
    let ctx = ExtractionContext::new(url, RetailerTable::embedded());
    Cascade::default().extract(source, &ctx, &NoopSink)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::RecordingSink;
    use crate::facts::ExtractionMethod;
    use crate::markup::HtmlDocument;

    struct Fixed(Attempt<CandidateFact>);

    impl ExtractionStrategy for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn attempt(&self, _source: &dyn MarkupSource, _ctx: &ExtractionContext<'_>) -> Attempt<CandidateFact> {
            self.0.clone()
        }
    }

    #[test]
    fn test_first_success_wins() {
        let cascade = Cascade::new(vec![
            Box::new(Fixed(Attempt::NotFound)),
            Box::new(Fixed(Attempt::Malformed("bad".into()))),
            Box::new(Fixed(Attempt::Found(CandidateFact::new("Second Place Widget", ExtractionMethod::DomSelector)))),
            Box::new(Fixed(Attempt::Found(CandidateFact::new("Never Reached Widget", ExtractionMethod::PageTitle)))),
        ]);
        let doc = HtmlDocument::parse("<html></html>");
        let table = RetailerTable::default();
        let sink = RecordingSink::new();

        let fact = cascade.run(&doc, &ExtractionContext::new(None, &table), &sink).unwrap();
        assert_eq!(fact.title, "Second Place Widget");

        let events = sink.events();
        assert_eq!(events.len(), 3);
        assert!(matches!(events[1], DiagnosticEvent::StrategyMalformed { .. }));
    }

    #[test]
    fn test_candidate_cleaned_to_nothing_is_skipped() {
        let cascade = Cascade::new(vec![
            Box::new(Fixed(Attempt::Found(CandidateFact::new("$19.99 $24.99", ExtractionMethod::MetaTag)))),
            Box::new(Fixed(Attempt::Found(CandidateFact::new("Real Product Name", ExtractionMethod::PageTitle)))),
        ]);
        let doc = HtmlDocument::parse("<html></html>");
        let table = RetailerTable::default();

        let fact = cascade.run(&doc, &ExtractionContext::new(None, &table), &NoopSink).unwrap();
        assert_eq!(fact.title, "Real Product Name");
        assert_eq!(fact.method, ExtractionMethod::PageTitle);
    }

    #[test]
    fn test_default_order() {
        assert_eq!(
            Cascade::default().strategy_names(),
            vec!["structured-data", "meta-tags", "dom-selectors", "page-title"]
        );
    }

    #[test]
    fn test_resolve_links() {
        let table = RetailerTable::default();
        let ctx = ExtractionContext::new(Some("https://shop.example.com/p/1"), &table);
        assert_eq!(ctx.resolve("/img/a.jpg"), "https://shop.example.com/img/a.jpg");
        assert_eq!(ctx.resolve("//cdn.example.com/a.jpg"), "https://cdn.example.com/a.jpg");

        let ctx = ExtractionContext::new(None, &table);
        assert_eq!(ctx.resolve("/img/a.jpg"), "/img/a.jpg");
    }
}
