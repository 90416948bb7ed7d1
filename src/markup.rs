//! Markup - read-only query surface over a page
//!
//! The extraction cascade only ever talks to `MarkupSource`. A live browser
//! integration implements it against its own DOM; `HtmlDocument` implements it
//! over an HTML string that somebody else fetched.

use scraper::{Html, Selector};
use url::Url;

/// A selector string that could not be parsed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidSelector(pub String);

impl std::fmt::Display for InvalidSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid selector: {}", self.0)
    }
}

/// An `<img>` on the page with whatever size hints it declares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageElement {
    /// Absolute when a base URL is known
    pub src: String,
    pub alt: String,
    /// `id` and `class` joined, for keyword exclusion
    pub id_class: String,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageElement {
    pub fn area(&self) -> Option<u64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(u64::from(w) * u64::from(h)),
            _ => None,
        }
    }
}

pub trait MarkupSource {
    /// Whitespace-collapsed text of every element matching `selector`, in document order
    fn select_text(&self, selector: &str) -> Result<Vec<String>, InvalidSelector>;

    /// Values of `attr` on every element matching `selector` that carries it
    fn select_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>, InvalidSelector>;

    /// Raw text of every embedded JSON-LD block
    fn structured_data_blocks(&self) -> Vec<String>;

    /// Contents of `<title>`, trimmed
    fn document_title(&self) -> Option<String>;

    fn images(&self) -> Vec<ImageElement>;

    /// First matching text, ignoring invalid selectors
    fn first_text(&self, selector: &str) -> Option<String> {
        self.select_text(selector)
            .ok()
            .and_then(|texts| texts.into_iter().find(|t| !t.is_empty()))
    }

    /// First matching attribute value, ignoring invalid selectors
    fn first_attr(&self, selector: &str, attr: &str) -> Option<String> {
        self.select_attr(selector, attr)
            .ok()
            .and_then(|values| values.into_iter().find(|v| !v.trim().is_empty()))
    }
}

/// `MarkupSource` over a parsed HTML string
pub struct HtmlDocument {
    document: Html,
    base_url: Option<Url>,
}

impl HtmlDocument {
    pub fn parse(html: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            base_url: None,
        }
    }

    /// Parse HTML fetched from `url`, so relative image links can be resolved
    pub fn parse_with_url(html: &str, url: &str) -> Self {
        Self {
            document: Html::parse_document(html),
            base_url: Url::parse(url).ok(),
        }
    }

    /// Resolve a potentially relative URL against the page URL
    fn resolve_url(&self, relative: &str) -> String {
        if relative.starts_with("http://") || relative.starts_with("https://") {
            return relative.to_string();
        }

        if let Some(base) = &self.base_url {
            if let Ok(resolved) = base.join(relative) {
                return resolved.to_string();
            }
        }

        relative.to_string()
    }

    fn parse_selector(selector: &str) -> Result<Selector, InvalidSelector> {
        Selector::parse(selector).map_err(|e| InvalidSelector(format!("{} ({:?})", selector, e)))
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn parse_dimension(value: Option<&str>) -> Option<u32> {
    let value = value?.trim().trim_end_matches("px");
    value.parse::<u32>().ok().or_else(|| {
        value.parse::<f64>().ok().filter(|v| *v >= 0.0).map(|v| v as u32)
    })
}

impl MarkupSource for HtmlDocument {
    fn select_text(&self, selector: &str) -> Result<Vec<String>, InvalidSelector> {
        let parsed = Self::parse_selector(selector)?;
        Ok(self
            .document
            .select(&parsed)
            .map(|el| collapse_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .collect())
    }

    fn select_attr(&self, selector: &str, attr: &str) -> Result<Vec<String>, InvalidSelector> {
        let parsed = Self::parse_selector(selector)?;
        Ok(self
            .document
            .select(&parsed)
            .filter_map(|el| el.value().attr(attr).map(|v| v.trim().to_string()))
            .collect())
    }

    fn structured_data_blocks(&self) -> Vec<String> {
        match Selector::parse(r#"script[type="application/ld+json"]"#) {
            Ok(selector) => self
                .document
                .select(&selector)
                .map(|script| script.text().collect::<String>())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    fn document_title(&self) -> Option<String> {
        let selector = Selector::parse("title").ok()?;
        self.document
            .select(&selector)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }

    fn images(&self) -> Vec<ImageElement> {
        let selector = match Selector::parse("img") {
            Ok(selector) => selector,
            Err(_) => return Vec::new(),
        };

        self.document
            .select(&selector)
            .filter_map(|el| {
                let value = el.value();
                // Lazy-loaded images keep the real URL in data-src
                let src = value
                    .attr("src")
                    .filter(|s| !s.trim().is_empty() && !s.starts_with("data:"))
                    .or_else(|| value.attr("data-src"))?;
                let id_class = format!(
                    "{} {}",
                    value.attr("id").unwrap_or_default(),
                    value.attr("class").unwrap_or_default()
                );
                Some(ImageElement {
                    src: self.resolve_url(src.trim()),
                    alt: value.attr("alt").unwrap_or_default().to_string(),
                    id_class: id_class.trim().to_string(),
                    width: parse_dimension(value.attr("width")),
                    height: parse_dimension(value.attr("height")),
                })
            })
            .collect()
    }
}
