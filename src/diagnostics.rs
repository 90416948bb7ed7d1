//! Diagnostics - structured reporting from the extraction and aggregation core
//!
//! The cascade and aggregator stay pure functions of their inputs; anything
//! worth telling a human goes to a caller-supplied sink. Pass `&NoopSink` when
//! you don't care, `&TracingSink` in the binary.

use std::sync::Mutex;

use crate::facts::ExtractionMethod;

/// A single diagnostic emitted by the core
#[derive(Debug, Clone, PartialEq)]
pub enum DiagnosticEvent {
    StrategyAccepted {
        strategy: &'static str,
        method: ExtractionMethod,
        selector: Option<String>,
    },
    StrategyRejected {
        strategy: &'static str,
    },
    StrategyMalformed {
        strategy: &'static str,
        reason: String,
    },
    ImageResolved {
        source: &'static str,
        image: String,
    },
    ObservationDropped {
        platform: String,
        reason: &'static str,
    },
    ObservationDeduplicated {
        platform: String,
        kept_reviews: u64,
        dropped_reviews: u64,
    },
    ProbeFailed {
        platform: String,
        reason: String,
    },
}

pub trait DiagnosticsSink: Send + Sync {
    fn record(&self, event: DiagnosticEvent);
}

/// Discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl DiagnosticsSink for NoopSink {
    fn record(&self, _event: DiagnosticEvent) {}
}

/// Forwards events to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticsSink for TracingSink {
    fn record(&self, event: DiagnosticEvent) {
        match event {
            DiagnosticEvent::StrategyAccepted { strategy, method, selector } => {
                tracing::debug!(strategy, method = %method, selector = ?selector, "strategy accepted");
            }
            DiagnosticEvent::StrategyRejected { strategy } => {
                tracing::debug!(strategy, "strategy found nothing");
            }
            DiagnosticEvent::StrategyMalformed { strategy, reason } => {
                tracing::debug!(strategy, reason = %reason, "strategy skipped malformed input");
            }
            DiagnosticEvent::ImageResolved { source, image } => {
                tracing::debug!(source, image = %image, "image resolved");
            }
            DiagnosticEvent::ObservationDropped { platform, reason } => {
                tracing::debug!(platform = %platform, reason, "observation dropped");
            }
            DiagnosticEvent::ObservationDeduplicated { platform, kept_reviews, dropped_reviews } => {
                tracing::debug!(platform = %platform, kept_reviews, dropped_reviews, "duplicate observation");
            }
            DiagnosticEvent::ProbeFailed { platform, reason } => {
                tracing::warn!(platform = %platform, reason = %reason, "rating probe failed");
            }
        }
    }
}

/// Keeps events in memory, mostly for tests
#[derive(Debug, Default)]
pub struct RecordingSink {
    events: Mutex<Vec<DiagnosticEvent>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<DiagnosticEvent> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }
}

impl DiagnosticsSink for RecordingSink {
    fn record(&self, event: DiagnosticEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}
