//! Aggregation behaviour as seen from outside the crate

use prodlens::aggregate;
use prodlens::config::Config;
use prodlens::diagnostics::{DiagnosticEvent, RecordingSink};
use prodlens::rating::{AggregatedScore, Aggregator, PlatformRatingObservation};

fn obs(platform: &str, rating: f64, reviews: u64, trust: f64) -> PlatformRatingObservation {
    PlatformRatingObservation::new(platform, rating, reviews, trust)
}

/// Weighted mean by the documented formula, rounded to one decimal
fn expected_score(observations: &[(f64, u64, f64)]) -> f64 {
    let (sum, weights) = observations.iter().fold((0.0, 0.0), |(s, w), (rating, reviews, trust)| {
        let weight = trust * ((*reviews as f64) + 1.0).log10().min(5.0);
        (s + rating * weight, w + weight)
    });
    (sum / weights * 10.0).round() / 10.0
}

#[test]
fn test_empty_list_is_insufficient_data() {
    let score = aggregate(&[]);
    assert_eq!(score.overall_score, 0.0);
    assert_eq!(score.total_review_count, 0);
    assert_eq!(score.confidence_score, 0.0);
    assert!(score.platform_breakdown.is_empty());
}

#[test]
fn test_zero_count_contributes_nothing() {
    let with_zero = aggregate(&[
        obs("Amazon", 4.5, 1000, 9.0),
        obs("Target", 3.0, 10, 4.0),
        obs("Walmart", 1.0, 0, 7.0),
    ]);
    let without = aggregate(&[obs("Amazon", 4.5, 1000, 9.0), obs("Target", 3.0, 10, 4.0)]);

    assert_eq!(with_zero, without);
    assert_eq!(with_zero.total_review_count, 1010);
}

#[test]
fn test_duplicate_platform_keeps_larger_sample() {
    let sink = RecordingSink::new();
    let score = Aggregator::default().aggregate(
        &[obs("Best Buy", 2.0, 10, 8.0), obs("BEST BUY", 4.7, 1000, 8.0)],
        &sink,
    );

    assert_eq!(score.platform_count(), 1);
    assert_eq!(score.platform_breakdown[0].review_count, 1000);
    assert_eq!(score.overall_score, 4.7);
    assert_eq!(
        sink.events(),
        vec![DiagnosticEvent::ObservationDeduplicated {
            platform: "BEST BUY".to_string(),
            kept_reviews: 1000,
            dropped_reviews: 10,
        }]
    );
}

#[test]
fn test_weighted_mean_matches_formula() {
    let score = aggregate(&[obs("A", 4.5, 1000, 9.0), obs("B", 3.0, 10, 4.0)]);

    assert_eq!(score.overall_score, expected_score(&[(4.5, 1000, 9.0), (3.0, 10, 4.0)]));
    assert!((4.5 - score.overall_score) < (score.overall_score - 3.0));
}

#[test]
fn test_breakdown_keeps_first_seen_order() {
    let score = aggregate(&[
        obs("Etsy", 4.9, 80, 6.0),
        obs("Amazon", 4.1, 5000, 9.0),
        obs("etsy", 4.8, 120, 6.0),
        obs("Walmart", 3.9, 300, 7.0),
    ]);

    let platforms: Vec<_> = score.platform_breakdown.iter().map(|o| o.platform.as_str()).collect();
    assert_eq!(platforms, vec!["etsy", "Amazon", "Walmart"]);
    assert_eq!(score.total_review_count, 5420);
}

#[test]
fn test_confidence_stays_in_bounds() {
    let inputs: Vec<Vec<PlatformRatingObservation>> = vec![
        vec![],
        vec![obs("Solo", 5.0, 1, 1.0)],
        vec![obs("A", 4.0, 3, 5.0), obs("B", 2.0, 7, 5.0)],
        (0..25).map(|i| obs(&format!("P{}", i), 4.0, u64::MAX / 32, 10.0)).collect(),
    ];

    for observations in inputs {
        let score = aggregate(&observations);
        assert!(
            (0.0..=0.95).contains(&score.confidence_score),
            "confidence {} out of range",
            score.confidence_score
        );
        assert!((0.0..=5.0).contains(&score.overall_score));
    }
}

#[test]
fn test_policy_from_config() {
    let config: Config = toml::from_str(
        r#"
        [aggregation]
        breadth_target = 2.0
        confidence_cap = 0.8
        "#,
    )
    .unwrap();
    let aggregator = Aggregator::new(config.aggregation.clone());

    let observations = [obs("A", 4.0, 100_000, 9.0), obs("B", 4.2, 100_000, 8.0)];
    let tuned = aggregator.aggregate(&observations, &RecordingSink::new());
    let default = aggregate(&observations);

    assert_eq!(tuned.confidence_score, 0.8);
    assert_eq!(default.confidence_score, 0.7);
    assert_eq!(tuned.overall_score, default.overall_score);
}

#[test]
fn test_reads_observation_json() {
    let json = r#"[
        {"platform": "Amazon", "rating": 4.5, "reviewCount": 1000, "trustWeight": 9},
        {"platform": "Target", "rating": 3.0, "reviewCount": 10, "trustWeight": 4, "verified": true,
         "sourceUrl": "https://www.target.com/p/-/A-1"}
    ]"#;
    let observations: Vec<PlatformRatingObservation> = serde_json::from_str(json).unwrap();
    let score = aggregate(&observations);

    let round_trip: AggregatedScore = serde_json::from_str(&serde_json::to_string(&score).unwrap()).unwrap();
    assert_eq!(round_trip, score);
    assert!(score.platform_breakdown[1].verified);
}
