//! Facts - candidate and accepted product identities
//!
//! A `CandidateFact` is what a single extraction strategy produced, tagged with
//! where it came from. A `DetectedProduct` is the cleaned result handed to
//! callers once the cascade accepts a candidate.

use serde::{Deserialize, Serialize};

/// Provenance of a candidate, ordered by reliability (most reliable first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractionMethod {
    StructuredData,
    StructuredDataGraph,
    BreadcrumbList,
    MetaTag,
    DomSelector,
    GenericHeading,
    PageTitle,
}

impl ExtractionMethod {
    /// Short label used in diagnostics and CLI output
    pub fn label(&self) -> &'static str {
        match self {
            ExtractionMethod::StructuredData => "structured-data",
            ExtractionMethod::StructuredDataGraph => "structured-data-graph",
            ExtractionMethod::BreadcrumbList => "breadcrumb-list",
            ExtractionMethod::MetaTag => "meta-tag",
            ExtractionMethod::DomSelector => "dom-selector",
            ExtractionMethod::GenericHeading => "generic-heading",
            ExtractionMethod::PageTitle => "page-title",
        }
    }
}

impl std::fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Output of one extraction strategy attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFact {
    pub title: String,
    pub image: Option<String>,
    pub method: ExtractionMethod,
    /// Selector or tag that matched
    pub selector: Option<String>,
}

impl CandidateFact {
    pub fn new(title: impl Into<String>, method: ExtractionMethod) -> Self {
        Self {
            title: title.into(),
            image: None,
            method,
            selector: None,
        }
    }

    pub fn with_image(mut self, image: Option<String>) -> Self {
        self.image = image.filter(|i| !i.trim().is_empty());
        self
    }

    pub fn with_selector(mut self, selector: impl Into<String>) -> Self {
        self.selector = Some(selector.into());
        self
    }
}

/// Tagged outcome of a strategy or probe
///
/// `NotFound` and `Malformed` both mean "try the next strategy"; the
/// distinction only exists so callers and tests can see why.
#[derive(Debug, Clone, PartialEq)]
pub enum Attempt<T> {
    Found(T),
    NotFound,
    Malformed(String),
}

impl<T> Attempt<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Attempt::Found(value) => Some(value),
            _ => None,
        }
    }
}

/// The accepted, cleaned product identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectedProduct {
    pub title: String,
    pub url: String,
    /// Canonical platform/display name
    pub source: String,
    pub image: Option<String>,
    /// Which strategy produced the title
    pub method: ExtractionMethod,
    pub selector: Option<String>,
}
