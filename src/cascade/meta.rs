use super::{char_len, ExtractionContext, ExtractionStrategy, MAX_CANDIDATE_CHARS};
use crate::facts::{Attempt, CandidateFact, ExtractionMethod};
use crate::markup::MarkupSource;

/// Meta tags that carry a product title, most specific-to-the-page first
const TITLE_META_SELECTORS: &[&str] = &[
    r#"meta[property="og:title"]"#,
    r#"meta[name="twitter:title"]"#,
    r#"meta[name="title"]"#,
    r#"meta[property="product:name"]"#,
    r#"meta[name="product-name"]"#,
    r#"meta[itemprop="name"]"#,
];

/// Anything this short is a site name or a placeholder
const MIN_META_CHARS: usize = 5;

const SITE_SEPARATORS: &[&str] = &[" - ", " | "];

pub struct MetaTagStrategy;

impl ExtractionStrategy for MetaTagStrategy {
    fn name(&self) -> &'static str {
        "meta-tags"
    }

    fn attempt(&self, source: &dyn MarkupSource, _ctx: &ExtractionContext<'_>) -> Attempt<CandidateFact> {
        for selector in TITLE_META_SELECTORS {
            let Some(content) = source.first_attr(selector, "content") else {
                continue;
            };
            if let Some(title) = accept_meta_title(&content) {
                return Attempt::Found(
                    CandidateFact::new(title, ExtractionMethod::MetaTag).with_selector(*selector),
                );
            }
        }
        Attempt::NotFound
    }
}

/// Apply the meta-title rules: too-short values are rejected, and a trailing
/// " - Site" / " | Site" is dropped when what precedes it is long enough.
pub fn accept_meta_title(content: &str) -> Option<String> {
    let value = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if char_len(&value) <= MIN_META_CHARS {
        return None;
    }

    // Split at whichever separator shows up first
    let split_at = SITE_SEPARATORS
        .iter()
        .filter_map(|sep| value.find(sep))
        .min();

    let title = match split_at {
        Some(index) => {
            let first = value[..index].trim();
            if char_len(first) > MIN_META_CHARS {
                first.to_string()
            } else {
                value
            }
        }
        None => value,
    };

    (char_len(&title) <= MAX_CANDIDATE_CHARS).then_some(title)
}
