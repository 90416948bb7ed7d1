//! Rating probes - where observations come from
//!
//! The aggregator doesn't care how an observation was obtained. This module
//! holds the ways prodlens obtains them itself: reading `aggregateRating`
//! markup off a page, and probing each retailer's search page for a title.
//! Probes run through `run_batched` so only a few retailers are hit at once,
//! and every failure or timeout turns into "no observation".

use std::time::Duration;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use serde_json::Value;

use crate::batch::{run_batched, DEFAULT_CONCURRENCY};
use crate::cascade::structured_data::{has_type, parse_blocks};
use crate::cascade::{Cascade, ExtractionContext};
use crate::config::{Config, ProbeConfig};
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::error::{ProdlensError, Result};
use crate::facts::DetectedProduct;
use crate::fetch::Fetcher;
use crate::markup::{HtmlDocument, MarkupSource};
use crate::platform::{RetailerDef, RetailerTable, UNKNOWN_SOURCE};
use crate::rating::{AggregatedScore, Aggregator, PlatformRatingObservation, MAX_RATING};

/// First number in a microdata text like "4.6 out of 5 stars" or "1,204 ratings"
static NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\d[\d,]*(?:\.\d+)?").expect("Invalid number regex"));

/// A rating read off a single page
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageRating {
    /// Rescaled to 0-5
    pub rating: f64,
    pub review_count: u64,
}

/// Read the page's own aggregate rating from JSON-LD, falling back to
/// microdata. `None` unless both a positive rating and a review count exist.
pub fn read_page_rating(source: &dyn MarkupSource) -> Option<PageRating> {
    from_structured_data(source).or_else(|| from_microdata(source))
}

fn from_structured_data(source: &dyn MarkupSource) -> Option<PageRating> {
    parse_blocks(source)
        .values
        .iter()
        .filter_map(find_aggregate_rating)
        .find_map(|rating| {
            let value = rating.get("ratingValue").and_then(number_value)?;
            let count = rating
                .get("reviewCount")
                .and_then(number_value)
                .or_else(|| rating.get("ratingCount").and_then(number_value))?;
            let best = rating.get("bestRating").and_then(number_value);
            page_rating(value, best, count)
        })
}

fn from_microdata(source: &dyn MarkupSource) -> Option<PageRating> {
    let read = |prop: &str| {
        let selector = format!("[itemprop=\"{}\"]", prop);
        source
            .first_attr(&selector, "content")
            .or_else(|| source.first_text(&selector))
            .and_then(|text| parse_number(&text))
    };

    let value = read("ratingValue")?;
    let count = read("reviewCount").or_else(|| read("ratingCount"))?;
    page_rating(value, read("bestRating"), count)
}

fn page_rating(value: f64, best: Option<f64>, count: f64) -> Option<PageRating> {
    let best = best.filter(|b| b.is_finite() && *b > 0.0).unwrap_or(MAX_RATING);
    let rating = ((value / best * MAX_RATING) * 100.0).round() / 100.0;

    if !rating.is_finite() || rating <= 0.0 || !count.is_finite() || count < 1.0 {
        return None;
    }

    Some(PageRating {
        rating: rating.min(MAX_RATING),
        review_count: count as u64,
    })
}

/// First `aggregateRating` (or bare `AggregateRating` node) anywhere in a block
fn find_aggregate_rating(json: &Value) -> Option<&Value> {
    match json {
        Value::Object(map) => {
            if has_type(json, "AggregateRating") {
                return Some(json);
            }
            if let Some(rating) = map.get("aggregateRating").filter(|r| r.is_object()) {
                return Some(rating);
            }
            map.values().find_map(find_aggregate_rating)
        }
        Value::Array(items) => items.iter().find_map(find_aggregate_rating),
        _ => None,
    }
}

fn number_value(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn parse_number(text: &str) -> Option<f64> {
    NUMBER_RE
        .find(text)
        .and_then(|m| m.as_str().replace(',', "").parse().ok())
}

/// Something that can produce a rating observation for a product title
#[async_trait]
pub trait RatingProbe: Send + Sync {
    /// Platform this probe reports for
    fn platform(&self) -> &str;

    /// `Ok(None)` means the platform simply had nothing for this title
    async fn probe(&self, title: &str) -> Result<Option<PlatformRatingObservation>>;
}

/// Probes a retailer's search page for a title and reads the first
/// aggregate rating on it. Search results are never `verified`.
pub struct SearchPageProbe {
    retailer: RetailerDef,
    fetcher: Fetcher,
}

impl SearchPageProbe {
    /// `None` if the retailer has no search URL
    pub fn new(retailer: &RetailerDef, fetcher: Fetcher) -> Option<Self> {
        retailer.search_url.as_ref()?;
        Some(Self {
            retailer: retailer.clone(),
            fetcher,
        })
    }

    /// One probe per retailer that has a search URL, in table order
    pub fn for_table(table: &RetailerTable, fetcher: &Fetcher) -> Vec<Box<dyn RatingProbe>> {
        table
            .retailers
            .iter()
            .filter_map(|retailer| Self::new(retailer, fetcher.clone()))
            .map(|probe| Box::new(probe) as Box<dyn RatingProbe>)
            .collect()
    }
}

#[async_trait]
impl RatingProbe for SearchPageProbe {
    fn platform(&self) -> &str {
        &self.retailer.name
    }

    async fn probe(&self, title: &str) -> Result<Option<PlatformRatingObservation>> {
        let url = self.retailer.search_url_for(title).ok_or_else(|| {
            ProdlensError::ProbeError(format!("{} has no search URL", self.retailer.name))
        })?;
        let fetcher = self.fetcher.clone();

        // ureq blocks, and the parsed document isn't Send, so both stay on a blocking thread
        let found = tokio::task::spawn_blocking(move || -> Result<Option<(PageRating, String)>> {
            let page = fetcher.fetch(&url)?;
            if page.looks_blocked() {
                return Err(ProdlensError::ProbeError("blocked by bot protection".into()));
            }
            let document = HtmlDocument::parse_with_url(&page.html, &page.url);
            Ok(read_page_rating(&document).map(|rating| (rating, page.url)))
        })
        .await
        .map_err(|e| ProdlensError::ProbeError(e.to_string()))??;

        Ok(found.map(|(rating, url)| {
            PlatformRatingObservation::new(
                &self.retailer.name,
                rating.rating,
                rating.review_count,
                self.retailer.trust_weight,
            )
            .with_source_url(url)
        }))
    }
}

/// How probing is throttled
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeSettings {
    pub concurrency: usize,
    /// Per-probe budget; a probe that overruns counts as failed
    pub timeout: Duration,
}

impl Default for ProbeSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            timeout: Duration::from_secs(15),
        }
    }
}

impl From<&ProbeConfig> for ProbeSettings {
    fn from(config: &ProbeConfig) -> Self {
        Self {
            concurrency: config.concurrency,
            timeout: config.timeout(),
        }
    }
}

/// Run every probe for `title`, a few at a time, and keep what came back.
/// Results are in probe order. Failures and timeouts are reported to the sink
/// and otherwise ignored.
pub async fn collect_observations(
    probes: &[Box<dyn RatingProbe>],
    title: &str,
    settings: &ProbeSettings,
    sink: &dyn DiagnosticsSink,
) -> Vec<PlatformRatingObservation> {
    let tasks: Vec<_> = probes
        .iter()
        .map(|probe| {
            move || async move {
                match tokio::time::timeout(settings.timeout, probe.probe(title)).await {
                    Ok(Ok(observation)) => observation,
                    Ok(Err(e)) => {
                        sink.record(DiagnosticEvent::ProbeFailed {
                            platform: probe.platform().to_string(),
                            reason: e.to_string(),
                        });
                        None
                    }
                    Err(_) => {
                        sink.record(DiagnosticEvent::ProbeFailed {
                            platform: probe.platform().to_string(),
                            reason: format!("timed out after {:?}", settings.timeout),
                        });
                        None
                    }
                }
            }
        })
        .collect();

    run_batched(tasks, settings.concurrency)
        .await
        .into_iter()
        .flatten()
        .collect()
}

/// Detection plus rating for one page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analysis {
    pub product: Option<DetectedProduct>,
    /// Only present when a product was detected
    pub score: Option<AggregatedScore>,
}

/// Wires the cascade, the probes and the aggregator together
pub struct Analyzer {
    retailers: RetailerTable,
    cascade: Cascade,
    aggregator: Aggregator,
    probes: Vec<Box<dyn RatingProbe>>,
    settings: ProbeSettings,
}

impl Analyzer {
    /// No probes: only the page's own rating is used
    pub fn new(retailers: RetailerTable) -> Self {
        Self {
            retailers,
            cascade: Cascade::default(),
            aggregator: Aggregator::default(),
            probes: Vec::new(),
            settings: ProbeSettings::default(),
        }
    }

    /// Retailer table, search probes, throttling and policy from config
    pub fn from_config(config: &Config) -> Self {
        let retailers = config.retailer_table();
        let fetcher = Fetcher::new(config.probe.timeout(), config.probe.user_agent.clone());
        let probes = SearchPageProbe::for_table(&retailers, &fetcher);

        Self::new(retailers)
            .with_probes(probes)
            .with_settings(ProbeSettings::from(&config.probe))
            .with_aggregator(Aggregator::new(config.aggregation.clone()))
    }

    pub fn with_probes(mut self, probes: Vec<Box<dyn RatingProbe>>) -> Self {
        self.probes = probes;
        self
    }

    pub fn with_settings(mut self, settings: ProbeSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_aggregator(mut self, aggregator: Aggregator) -> Self {
        self.aggregator = aggregator;
        self
    }

    pub fn detect(
        &self,
        source: &dyn MarkupSource,
        url: Option<&str>,
        sink: &dyn DiagnosticsSink,
    ) -> Option<DetectedProduct> {
        let ctx = ExtractionContext::new(url, &self.retailers);
        self.cascade.extract(source, &ctx, sink)
    }

    /// The rating on the product's own page, as a verified observation
    pub fn page_observation(
        &self,
        source: &dyn MarkupSource,
        product: &DetectedProduct,
    ) -> Option<PlatformRatingObservation> {
        if product.source == UNKNOWN_SOURCE {
            return None;
        }
        let rating = read_page_rating(source)?;
        let observation = PlatformRatingObservation::new(
            &product.source,
            rating.rating,
            rating.review_count,
            self.retailers.trust_weight(&product.source),
        )
        .verified(true);

        Some(if product.url.is_empty() {
            observation
        } else {
            observation.with_source_url(&product.url)
        })
    }

    /// Probe every platform for `title` and aggregate, along with any
    /// observations the caller already has
    pub async fn rate(
        &self,
        title: &str,
        known: Vec<PlatformRatingObservation>,
        sink: &dyn DiagnosticsSink,
    ) -> AggregatedScore {
        let mut observations = known;
        observations.extend(collect_observations(&self.probes, title, &self.settings, sink).await);
        self.aggregator.aggregate(&observations, sink)
    }

    /// Detect the product, then rate it. Not a product page means no probing.
    pub async fn analyze(
        &self,
        source: &dyn MarkupSource,
        url: Option<&str>,
        sink: &dyn DiagnosticsSink,
    ) -> Analysis {
        let product = match self.detect(source, url, sink) {
            Some(product) => product,
            None => {
                return Analysis {
                    product: None,
                    score: None,
                }
            }
        };

        let known: Vec<_> = self.page_observation(source, &product).into_iter().collect();
        let score = self.rate(&product.title, known, sink).await;

        Analysis {
            product: Some(product),
            score: Some(score),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NoopSink, RecordingSink};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct FakeProbe {
        platform: &'static str,
        outcome: Outcome,
        delay: Duration,
        calls: Arc<AtomicUsize>,
    }

    #[derive(Clone)]
    enum Outcome {
        Rating(f64, u64),
        Nothing,
        Fails,
    }

    impl FakeProbe {
        fn boxed(platform: &'static str, outcome: Outcome) -> Box<dyn RatingProbe> {
            Box::new(Self {
                platform,
                outcome,
                delay: Duration::from_millis(1),
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }

        fn slow(platform: &'static str, delay: Duration) -> Box<dyn RatingProbe> {
            Box::new(Self {
                platform,
                outcome: Outcome::Rating(4.0, 10),
                delay,
                calls: Arc::new(AtomicUsize::new(0)),
            })
        }
    }

    #[async_trait]
    impl RatingProbe for FakeProbe {
        fn platform(&self) -> &str {
            self.platform
        }

        async fn probe(&self, _title: &str) -> Result<Option<PlatformRatingObservation>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            match self.outcome {
                Outcome::Rating(rating, reviews) => {
                    Ok(Some(PlatformRatingObservation::new(self.platform, rating, reviews, 5.0)))
                }
                Outcome::Nothing => Ok(None),
                Outcome::Fails => Err(ProdlensError::ProbeError("connection reset".into())),
            }
        }
    }

    fn settings() -> ProbeSettings {
        ProbeSettings {
            concurrency: 2,
            timeout: Duration::from_millis(200),
        }
    }

    #[test]
    fn test_reads_json_ld_rating() {
        let doc = HtmlDocument::parse(
            r#"<script type="application/ld+json">
            {"@context": "https://schema.org", "@type": "Product", "name": "Kettle",
             "aggregateRating": {"@type": "AggregateRating", "ratingValue": "4.6", "reviewCount": "1,204"}}
            </script>"#,
        );
        assert_eq!(
            read_page_rating(&doc),
            Some(PageRating { rating: 4.6, review_count: 1204 })
        );
    }

    #[test]
    fn test_rescales_by_best_rating() {
        let doc = HtmlDocument::parse(
            r#"<script type="application/ld+json">
            {"@graph": [{"@type": "WebPage"}, {"@type": "Product", "name": "Lamp",
              "aggregateRating": {"ratingValue": 8, "bestRating": 10, "ratingCount": 55}}]}
            </script>"#,
        );
        assert_eq!(
            read_page_rating(&doc),
            Some(PageRating { rating: 4.0, review_count: 55 })
        );
    }

    #[test]
    fn test_search_results_list() {
        let doc = HtmlDocument::parse(
            r#"<script type="application/ld+json">
            {"@type": "ItemList", "itemListElement": [
              {"@type": "ListItem", "position": 1, "item": {"@type": "Product", "name": "Desk Fan",
                "aggregateRating": {"ratingValue": 4.2, "reviewCount": 88}}}]}
            </script>"#,
        );
        assert_eq!(
            read_page_rating(&doc),
            Some(PageRating { rating: 4.2, review_count: 88 })
        );
    }

    #[test]
    fn test_microdata_fallback() {
        let doc = HtmlDocument::parse(
            r#"<div itemprop="aggregateRating" itemscope itemtype="https://schema.org/AggregateRating">
                <span itemprop="ratingValue">4.3 out of 5 stars</span>
                <meta itemprop="reviewCount" content="312">
            </div>"#,
        );
        assert_eq!(
            read_page_rating(&doc),
            Some(PageRating { rating: 4.3, review_count: 312 })
        );
    }

    #[test]
    fn test_rating_without_reviews_is_ignored() {
        let doc = HtmlDocument::parse(
            r#"<script type="application/ld+json">
            {"@type": "Product", "name": "Mug", "aggregateRating": {"ratingValue": 5}}
            </script>
            <span itemprop="ratingValue">0</span><span itemprop="reviewCount">0</span>"#,
        );
        assert_eq!(read_page_rating(&doc), None);
        assert_eq!(read_page_rating(&HtmlDocument::parse("<p>no ratings</p>")), None);
    }

    #[tokio::test]
    async fn test_collect_keeps_probe_order_and_skips_failures() {
        let probes = vec![
            FakeProbe::boxed("Amazon", Outcome::Rating(4.5, 1000)),
            FakeProbe::boxed("Walmart", Outcome::Fails),
            FakeProbe::boxed("Target", Outcome::Nothing),
            FakeProbe::boxed("Etsy", Outcome::Rating(4.8, 40)),
        ];
        let sink = RecordingSink::new();

        let observations = collect_observations(&probes, "Desk Lamp", &settings(), &sink).await;

        let platforms: Vec<_> = observations.iter().map(|o| o.platform.as_str()).collect();
        assert_eq!(platforms, vec!["Amazon", "Etsy"]);
        assert!(observations.iter().all(|o| !o.verified));

        let events = sink.events();
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            DiagnosticEvent::ProbeFailed { platform, .. } if platform == "Walmart"
        ));
    }

    #[tokio::test]
    async fn test_timeout_is_an_ordinary_failure() {
        let probes = vec![
            FakeProbe::slow("Sluggish", Duration::from_secs(5)),
            FakeProbe::boxed("Quick", Outcome::Rating(3.9, 20)),
        ];
        let sink = RecordingSink::new();

        let observations = collect_observations(&probes, "Desk Lamp", &settings(), &sink).await;

        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].platform, "Quick");
        assert!(matches!(
            &sink.events()[0],
            DiagnosticEvent::ProbeFailed { reason, .. } if reason.contains("timed out")
        ));
    }

    #[tokio::test]
    async fn test_analyze_combines_page_and_probes() {
        let html = r#"<html><head>
            <script type="application/ld+json">
            {"@type": "Product", "name": "Acme Cordless Drill 20V", "image": "/drill.jpg",
             "aggregateRating": {"ratingValue": 4.4, "reviewCount": 50}}
            </script></head></html>"#;
        let url = "https://www.homedepot.com/p/acme-drill/123";
        let doc = HtmlDocument::parse_with_url(html, url);

        let analyzer = Analyzer::new(RetailerTable::embedded_defaults())
            .with_probes(vec![
                // Same platform as the page, search result with the same count
                FakeProbe::boxed("Home Depot", Outcome::Rating(3.0, 50)),
                FakeProbe::boxed("Amazon", Outcome::Rating(4.6, 900)),
            ])
            .with_settings(settings());

        let analysis = analyzer.analyze(&doc, Some(url), &NoopSink).await;

        let product = analysis.product.unwrap();
        assert_eq!(product.title, "Acme Cordless Drill 20V");
        assert_eq!(product.image.as_deref(), Some("https://www.homedepot.com/drill.jpg"));

        let score = analysis.score.unwrap();
        assert_eq!(score.platform_count(), 2);
        // Tie on review count goes to the verified page rating
        let own = &score.platform_breakdown[0];
        assert_eq!(own.platform, product.source);
        assert!(own.verified);
        assert_eq!(own.rating, 4.4);
        assert_eq!(own.source_url.as_deref(), Some(url));
        assert_eq!(score.total_review_count, 950);
    }

    #[tokio::test]
    async fn test_no_product_means_no_probing() {
        let calls = Arc::new(AtomicUsize::new(0));
        let probe = FakeProbe {
            platform: "Amazon",
            outcome: Outcome::Rating(4.0, 10),
            delay: Duration::from_millis(1),
            calls: Arc::clone(&calls),
        };
        let analyzer = Analyzer::new(RetailerTable::embedded_defaults()).with_probes(vec![Box::new(probe)]);
        let doc = HtmlDocument::parse("<html><head><title>Hi</title></head></html>");

        let analysis = analyzer.analyze(&doc, None, &NoopSink).await;

        assert_eq!(analysis, Analysis { product: None, score: None });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_search_probes_from_table() {
        let table = RetailerTable::embedded_defaults();
        let probes = SearchPageProbe::for_table(&table, &Fetcher::default());
        let with_search = table.retailers.iter().filter(|r| r.search_url.is_some()).count();
        assert_eq!(probes.len(), with_search);
        assert_eq!(probes[0].platform(), "Amazon");
    }
}
