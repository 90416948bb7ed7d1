//! Rating aggregation - merge per-platform ratings into one score
//!
//! Each aggregation starts from the full observation list: drop unusable
//! observations, keep one per platform, weight by trust and (log-damped)
//! sample size, then estimate how far the result can be trusted.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink, NoopSink};
use crate::platform::{clamp_trust, DEFAULT_TRUST_WEIGHT};

/// Highest rating on the normalized scale
pub const MAX_RATING: f64 = 5.0;

/// One rating sample for a product on one platform
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformRatingObservation {
    pub platform: String,
    /// 0-5 scale
    pub rating: f64,
    pub review_count: u64,
    /// Read from the product's own page rather than a search result
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub source_url: Option<String>,
    /// Platform credibility, 1-10
    #[serde(default = "default_trust_weight")]
    pub trust_weight: f64,
}

fn default_trust_weight() -> f64 {
    DEFAULT_TRUST_WEIGHT
}

impl PlatformRatingObservation {
    pub fn new(platform: impl Into<String>, rating: f64, review_count: u64, trust_weight: f64) -> Self {
        Self {
            platform: platform.into(),
            rating,
            review_count,
            verified: false,
            source_url: None,
            trust_weight,
        }
    }

    pub fn verified(mut self, verified: bool) -> Self {
        self.verified = verified;
        self
    }

    pub fn with_source_url(mut self, url: impl Into<String>) -> Self {
        self.source_url = Some(url.into());
        self
    }

    /// Platform name used for deduplication
    fn platform_key(&self) -> String {
        self.platform.trim().to_lowercase()
    }

    /// Why this observation carries no data, if it doesn't
    fn unusable_reason(&self) -> Option<&'static str> {
        if !self.rating.is_finite() || self.rating <= 0.0 {
            Some("no rating")
        } else if self.rating > MAX_RATING {
            Some("rating above 5")
        } else if self.review_count == 0 {
            Some("no reviews")
        } else if self.platform.trim().is_empty() {
            Some("no platform")
        } else {
            None
        }
    }

    /// Should `self` replace `other` for the same platform?
    fn outranks(&self, other: &Self) -> bool {
        self.review_count > other.review_count
            || (self.review_count == other.review_count && self.verified && !other.verified)
    }
}

/// The merged result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AggregatedScore {
    /// 0-5, one decimal
    pub overall_score: f64,
    pub total_review_count: u64,
    /// 0-0.95, two decimals
    pub confidence_score: f64,
    /// One entry per platform, first-seen order
    pub platform_breakdown: Vec<PlatformRatingObservation>,
}

impl AggregatedScore {
    /// The "insufficient data" result
    pub fn empty() -> Self {
        Self {
            overall_score: 0.0,
            total_review_count: 0,
            confidence_score: 0.0,
            platform_breakdown: Vec::new(),
        }
    }

    pub fn platform_count(&self) -> usize {
        self.platform_breakdown.len()
    }
}

/// Tuning constants for weighting and confidence.
///
/// These were tuned by hand against real listings rather than derived, so
/// they're configurable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationPolicy {
    /// Cap on log10(review_count + 1) in a platform's weight
    #[serde(default = "default_max_log_weight")]
    pub max_log_weight: f64,
    /// Platform count at which breadth confidence saturates
    #[serde(default = "default_breadth_target")]
    pub breadth_target: f64,
    /// log10(total reviews + 1) at which depth confidence saturates
    #[serde(default = "default_depth_log_target")]
    pub depth_log_target: f64,
    /// Confidence never exceeds this
    #[serde(default = "default_confidence_cap")]
    pub confidence_cap: f64,
}

fn default_max_log_weight() -> f64 {
    5.0
}

fn default_breadth_target() -> f64 {
    5.0
}

fn default_depth_log_target() -> f64 {
    3.0
}

fn default_confidence_cap() -> f64 {
    0.95
}

impl Default for AggregationPolicy {
    fn default() -> Self {
        Self {
            max_log_weight: default_max_log_weight(),
            breadth_target: default_breadth_target(),
            depth_log_target: default_depth_log_target(),
            confidence_cap: default_confidence_cap(),
        }
    }
}

impl AggregationPolicy {
    /// Weight of one observation: trust times damped sample size
    pub fn effective_weight(&self, observation: &PlatformRatingObservation) -> f64 {
        let sample = ((observation.review_count as f64) + 1.0).log10().min(self.max_log_weight);
        clamp_trust(observation.trust_weight) * sample
    }

    /// Confidence from platform breadth and review depth, equally weighted
    pub fn confidence(&self, platform_count: usize, total_reviews: u64) -> f64 {
        if platform_count == 0 || total_reviews == 0 {
            return 0.0;
        }

        let breadth = ratio(platform_count as f64, self.breadth_target);
        let depth = ratio(((total_reviews as f64) + 1.0).log10(), self.depth_log_target);
        let cap = self.confidence_cap.clamp(0.0, 1.0);

        round_to((0.5 * breadth + 0.5 * depth).clamp(0.0, cap), 2)
    }
}

/// min(value / target, 1), treating a non-positive target as already saturated
fn ratio(value: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 1.0;
    }
    (value / target).min(1.0)
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

#[derive(Debug, Clone, Default)]
pub struct Aggregator {
    policy: AggregationPolicy,
}

impl Aggregator {
    pub fn new(policy: AggregationPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &AggregationPolicy {
        &self.policy
    }

    pub fn aggregate(
        &self,
        observations: &[PlatformRatingObservation],
        sink: &dyn DiagnosticsSink,
    ) -> AggregatedScore {
        let breakdown = dedupe_by_platform(observations, sink);
        if breakdown.is_empty() {
            return AggregatedScore::empty();
        }

        let (weighted_sum, weight_sum) = breakdown.iter().fold((0.0, 0.0), |(ws, w), obs| {
            let weight = self.policy.effective_weight(obs);
            (ws + obs.rating * weight, w + weight)
        });

        let overall_score = if weight_sum > 0.0 {
            round_to((weighted_sum / weight_sum).clamp(0.0, MAX_RATING), 1)
        } else {
            0.0
        };

        let total_review_count = breakdown
            .iter()
            .fold(0u64, |total, obs| total.saturating_add(obs.review_count));

        AggregatedScore {
            overall_score,
            total_review_count,
            confidence_score: self.policy.confidence(breakdown.len(), total_review_count),
            platform_breakdown: breakdown,
        }
    }
}

/// Aggregate with the default policy
pub fn aggregate(observations: &[PlatformRatingObservation]) -> AggregatedScore {
    Aggregator::default().aggregate(observations, &NoopSink)
}

/// Drop unusable observations and keep the best one per platform
fn dedupe_by_platform(
    observations: &[PlatformRatingObservation],
    sink: &dyn DiagnosticsSink,
) -> Vec<PlatformRatingObservation> {
    let mut kept: Vec<PlatformRatingObservation> = Vec::new();
    let mut index_by_platform: HashMap<String, usize> = HashMap::new();

    for observation in observations {
        if let Some(reason) = observation.unusable_reason() {
            sink.record(DiagnosticEvent::ObservationDropped {
                platform: observation.platform.clone(),
                reason,
            });
            continue;
        }

        let mut observation = observation.clone();
        observation.trust_weight = clamp_trust(observation.trust_weight);

        let key = observation.platform_key();
        match index_by_platform.get(&key).copied() {
            Some(index) => {
                let existing = &mut kept[index];
                let (kept_reviews, dropped_reviews) = if observation.outranks(existing) {
                    let dropped = existing.review_count;
                    *existing = observation;
                    (existing.review_count, dropped)
                } else {
                    (existing.review_count, observation.review_count)
                };
                sink.record(DiagnosticEvent::ObservationDeduplicated {
                    platform: existing.platform.clone(),
                    kept_reviews,
                    dropped_reviews,
                });
            }
            None => {
                index_by_platform.insert(key, kept.len());
                kept.push(observation);
            }
        }
    }

    kept
}
