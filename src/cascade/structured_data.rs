//! JSON-LD product detection, plus helpers shared with image resolution and
//! the page rating reader.

use serde_json::{Map, Value};

use super::{char_len, ExtractionContext, ExtractionStrategy, MAX_CANDIDATE_CHARS};
use crate::facts::{Attempt, CandidateFact, ExtractionMethod};
use crate::markup::MarkupSource;

const JSON_LD_SELECTOR: &str = r#"script[type="application/ld+json"]"#;

pub struct StructuredDataStrategy;

impl ExtractionStrategy for StructuredDataStrategy {
    fn name(&self) -> &'static str {
        "structured-data"
    }

    fn attempt(&self, source: &dyn MarkupSource, _ctx: &ExtractionContext<'_>) -> Attempt<CandidateFact> {
        let parsed = parse_blocks(source);

        // Every block is considered; the most reliable method wins, then document order
        let best = parsed
            .values
            .iter()
            .filter_map(candidate_from_value)
            .min_by_key(|fact| fact.method);

        match best {
            Some(fact) => Attempt::Found(fact),
            None if !parsed.errors.is_empty() => Attempt::Malformed(parsed.errors.join("; ")),
            None => Attempt::NotFound,
        }
    }
}

/// Parsed JSON-LD blocks and the reasons any were skipped
#[derive(Debug, Default)]
pub struct ParsedBlocks {
    pub values: Vec<Value>,
    pub errors: Vec<String>,
}

/// Parse every JSON-LD block, skipping (and noting) the malformed ones
pub fn parse_blocks(source: &dyn MarkupSource) -> ParsedBlocks {
    let mut parsed = ParsedBlocks::default();

    for (index, block) in source.structured_data_blocks().iter().enumerate() {
        let text = block.trim();
        if text.is_empty() {
            continue;
        }
        match serde_json::from_str::<Value>(text) {
            Ok(value) => parsed.values.push(value),
            Err(e) => parsed.errors.push(format!("JSON-LD block {}: {}", index, e)),
        }
    }

    parsed
}

/// Check if a JSON-LD item declares the given type.
/// Handles namespaced types ("schema:Product") and type arrays.
pub fn has_type(json: &Value, wanted: &str) -> bool {
    let matches = |type_str: &str| {
        let clean = type_str.rsplit_once(':').map(|(_, t)| t).unwrap_or(type_str);
        let clean = clean.rsplit_once('/').map(|(_, t)| t).unwrap_or(clean);
        clean.eq_ignore_ascii_case(wanted)
    };

    match json.get("@type") {
        Some(Value::String(s)) => matches(s),
        Some(Value::Array(types)) => types.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

/// Product, or one of its schema.org specialisations
pub fn is_product(json: &Value) -> bool {
    ["Product", "ProductGroup", "IndividualProduct", "ProductModel", "SomeProducts"]
        .iter()
        .any(|t| has_type(json, t))
}

/// Find the first product object anywhere in a block: the top level, a
/// top-level array, an `@graph`, or a `mainEntity`.
pub fn find_product(json: &Value) -> Option<&Map<String, Value>> {
    match json {
        Value::Object(map) => {
            if is_product(json) {
                return Some(map);
            }
            if let Some(Value::Array(graph)) = map.get("@graph") {
                if let Some(found) = graph.iter().find_map(find_product) {
                    return Some(found);
                }
            }
            map.get("mainEntity").and_then(find_product)
        }
        Value::Array(items) => items.iter().find_map(find_product),
        _ => None,
    }
}

/// A trimmed, non-empty string field
pub fn text_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    map.get(key)
        .and_then(Value::as_str)
        .map(|s| s.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|s| !s.is_empty())
}

/// Image as a string, the first array element, or an `ImageObject` url
pub fn image_field(map: &Map<String, Value>) -> Option<String> {
    fn from_value(value: &Value) -> Option<String> {
        match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Array(items) => items.first().and_then(from_value),
            Value::Object(obj) => obj
                .get("url")
                .or_else(|| obj.get("contentUrl"))
                .and_then(from_value),
            _ => None,
        }
    }

    map.get("image").and_then(from_value)
}

fn acceptable_title(name: String) -> Option<String> {
    let len = char_len(&name);
    (len > 0 && len <= MAX_CANDIDATE_CHARS).then_some(name)
}

fn product_fact(map: &Map<String, Value>, method: ExtractionMethod, selector: &str) -> Option<CandidateFact> {
    let title = acceptable_title(text_field(map, "name")?)?;
    Some(
        CandidateFact::new(title, method)
            .with_image(image_field(map))
            .with_selector(selector),
    )
}

/// Best candidate in one parsed block
fn candidate_from_value(json: &Value) -> Option<CandidateFact> {
    match json {
        Value::Array(items) => items
            .iter()
            .filter_map(candidate_from_value)
            .min_by_key(|fact| fact.method),
        Value::Object(map) => {
            if is_product(json) {
                if let Some(fact) = product_fact(map, ExtractionMethod::StructuredData, JSON_LD_SELECTOR) {
                    return Some(fact);
                }
            }

            if let Some(Value::Array(graph)) = map.get("@graph") {
                let nested = graph
                    .iter()
                    .filter(|member| is_product(member))
                    .filter_map(Value::as_object)
                    .find_map(|member| product_fact(member, ExtractionMethod::StructuredDataGraph, "@graph"));
                if nested.is_some() {
                    return nested;
                }
                // Breadcrumbs and product-like members still count inside a graph
                return graph
                    .iter()
                    .filter_map(candidate_from_value)
                    .min_by_key(|fact| fact.method);
            }

            if has_type(json, "BreadcrumbList") {
                return breadcrumb_leaf(map);
            }

            product_like(map)
        }
        _ => None,
    }
}

/// Name of the last breadcrumb, usually the product itself
fn breadcrumb_leaf(map: &Map<String, Value>) -> Option<CandidateFact> {
    let items = map.get("itemListElement")?.as_array()?;

    // Positions, when present, win over array order
    let last = items
        .iter()
        .enumerate()
        .max_by_key(|(index, item)| {
            item.get("position")
                .and_then(|p| p.as_u64().or_else(|| p.as_str().and_then(|s| s.parse().ok())))
                .unwrap_or(*index as u64)
        })
        .map(|(_, item)| item)?
        .as_object()?;

    let name = text_field(last, "name").or_else(|| {
        last.get("item")
            .and_then(Value::as_object)
            .and_then(|item| text_field(item, "name"))
    })?;

    Some(
        CandidateFact::new(acceptable_title(name)?, ExtractionMethod::BreadcrumbList)
            .with_selector("BreadcrumbList"),
    )
}

/// Untyped or oddly typed objects that still look like a product
fn product_like(map: &Map<String, Value>) -> Option<CandidateFact> {
    let has_commerce_field = ["offers", "price", "sku"].iter().any(|k| map.contains_key(*k));
    if !has_commerce_field {
        return None;
    }
    product_fact(map, ExtractionMethod::StructuredData, "product-like")
}
