//! Image resolution for an accepted title that came without one.
//!
//! Order: meta tags, structured data, retailer primary-image selectors, then
//! the largest reasonably sized `<img>` that isn't page furniture.

use super::structured_data::{find_product, image_field, parse_blocks};
use super::ExtractionContext;
use crate::diagnostics::{DiagnosticEvent, DiagnosticsSink};
use crate::markup::{ImageElement, MarkupSource};

const IMAGE_META_SELECTORS: &[(&str, &str)] = &[
    (r#"meta[property="og:image"]"#, "content"),
    (r#"meta[property="og:image:url"]"#, "content"),
    (r#"meta[name="twitter:image"]"#, "content"),
    (r#"meta[itemprop="image"]"#, "content"),
    (r#"link[rel="image_src"]"#, "href"),
];

/// Attributes that may hold the real image URL on retailer hero images
const IMAGE_ATTRS: &[&str] = &["data-old-hires", "src", "data-src"];

/// Smallest pixel area considered for the largest-image fallback
pub const MIN_IMAGE_AREA: u64 = 40_000;

/// Each side must be at least this many pixels
pub const MIN_IMAGE_SIDE: u32 = 100;

const EXCLUDED_IMAGE_KEYWORDS: &[&str] = &["logo", "icon", "pixel", "tracking", "banner"];

pub fn resolve_image(
    source: &dyn MarkupSource,
    ctx: &ExtractionContext<'_>,
    sink: &dyn DiagnosticsSink,
) -> Option<String> {
    let (origin, image) = from_meta(source)
        .map(|i| ("meta-tag", i))
        .or_else(|| from_structured_data(source).map(|i| ("structured-data", i)))
        .or_else(|| from_retailer_selectors(source, ctx).map(|i| ("retailer-selector", i)))
        .or_else(|| largest_image(source).map(|i| ("largest-image", i)))?;

    let image = ctx.resolve(&image);
    sink.record(DiagnosticEvent::ImageResolved { source: origin, image: image.clone() });
    Some(image)
}

fn from_meta(source: &dyn MarkupSource) -> Option<String> {
    IMAGE_META_SELECTORS
        .iter()
        .find_map(|(selector, attr)| source.first_attr(selector, attr))
}

fn from_structured_data(source: &dyn MarkupSource) -> Option<String> {
    parse_blocks(source)
        .values
        .iter()
        .filter_map(find_product)
        .find_map(image_field)
}

fn from_retailer_selectors(source: &dyn MarkupSource, ctx: &ExtractionContext<'_>) -> Option<String> {
    ctx.retailers
        .image_selectors(ctx.url)
        .into_iter()
        .find_map(|selector| {
            IMAGE_ATTRS.iter().find_map(|attr| {
                source
                    .first_attr(selector, attr)
                    .filter(|src| !src.starts_with("data:"))
            })
        })
}

fn is_candidate(image: &ImageElement) -> bool {
    let haystack = format!("{} {} {}", image.src, image.alt, image.id_class).to_lowercase();
    if EXCLUDED_IMAGE_KEYWORDS.iter().any(|k| haystack.contains(k)) {
        return false;
    }

    match (image.width, image.height, image.area()) {
        (Some(w), Some(h), Some(area)) => {
            w >= MIN_IMAGE_SIDE && h >= MIN_IMAGE_SIDE && area >= MIN_IMAGE_AREA
        }
        // No declared size means we can't judge it
        _ => false,
    }
}

fn largest_image(source: &dyn MarkupSource) -> Option<String> {
    source
        .images()
        .into_iter()
        .filter(is_candidate)
        .fold(None::<ImageElement>, |best, image| match best {
            Some(current) if current.area() >= image.area() => Some(current),
            _ => Some(image),
        })
        .map(|image| image.src)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostics::{NoopSink, RecordingSink};
    use crate::markup::HtmlDocument;
    use crate::platform::RetailerTable;

    fn resolve(html: &str, url: Option<&str>) -> Option<String> {
        let doc = match url {
            Some(u) => HtmlDocument::parse_with_url(html, u),
            None => HtmlDocument::parse(html),
        };
        let table = RetailerTable::embedded_defaults();
        resolve_image(&doc, &ExtractionContext::new(url, &table), &NoopSink)
    }

    #[test]
    fn test_meta_image_first() {
        let html = r#"<html><head>
            <meta property="og:image" content="/og.jpg">
            <script type="application/ld+json">{"@type": "Product", "name": "X", "image": "https://x.test/ld.jpg"}</script>
        </head></html>"#;
        assert_eq!(
            resolve(html, Some("https://shop.test/p/1")).as_deref(),
            Some("https://shop.test/og.jpg")
        );
    }

    #[test]
    fn test_structured_data_image() {
        let html = r#"<html><head>
            <script type="application/ld+json">{"@graph": [{"@type": "Product", "name": "X", "image": {"url": "https://x.test/ld.jpg"}}]}</script>
        </head></html>"#;
        assert_eq!(resolve(html, None).as_deref(), Some("https://x.test/ld.jpg"));
    }

    #[test]
    fn test_retailer_selector_image() {
        let html = r#"<html><body>
            <img id="landingImage" src="data:image/gif;base64,R0lGOD" data-old-hires="https://m.media-amazon.test/hero.jpg">
        </body></html>"#;
        assert_eq!(
            resolve(html, Some("https://www.amazon.com/dp/B0")).as_deref(),
            Some("https://m.media-amazon.test/hero.jpg")
        );
    }

    #[test]
    fn test_largest_image_skips_furniture() {
        let html = r#"<html><body>
            <img src="/site-logo.png" width="800" height="800">
            <img src="/tiny.jpg" width="90" height="900">
            <img src="/small.jpg" width="200" height="200">
            <img src="/big.jpg" width="600" height="600">
            <img src="/hero-banner.jpg" width="1200" height="400">
            <img src="/unsized.jpg">
        </body></html>"#;

        let sink = RecordingSink::new();
        let table = RetailerTable::default();
        let doc = HtmlDocument::parse_with_url(html, "https://shop.test/p/1");
        let image = resolve_image(&doc, &ExtractionContext::new(Some("https://shop.test/p/1"), &table), &sink);

        assert_eq!(image.as_deref(), Some("https://shop.test/big.jpg"));
        assert!(matches!(
            sink.events()[0],
            DiagnosticEvent::ImageResolved { source: "largest-image", .. }
        ));
    }

    #[test]
    fn test_no_image() {
        assert_eq!(resolve("<html><body><p>text</p></body></html>", None), None);
    }
}
