use once_cell::sync::Lazy;
use regex::Regex;

/// Longest title we hand back, ellipsis included
pub const MAX_TITLE_CHARS: usize = 150;

const ELLIPSIS: &str = "...";

// Pre-compiled regexes (compile once, use many times)
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+").expect("Invalid whitespace regex pattern")
});

/// Inline prices: $19.99, $1,299.00, $ 45
pub(crate) static PRICE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\$\s?\d{1,3}(?:,\d{3})*(?:\.\d{1,2})?|\$\s?\d+(?:\.\d{1,2})?")
        .expect("Invalid price regex pattern")
});

/// Discount annotations: (25% Off), (25% off)
pub(crate) static DISCOUNT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\(\s*\d{1,3}\s*%\s*off\s*\)").expect("Invalid discount regex pattern")
});

/// Trailing SKU-ish `#token`
static SKU_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s+#[A-Za-z0-9_-]+$").expect("Invalid SKU regex pattern")
});

/// Trailing parenthetical such as a model number
static PAREN_SUFFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*\([^()]*\)$").expect("Invalid parenthetical regex pattern")
});

/// Clean a raw candidate title.
///
/// Collapses whitespace, removes prices and discount annotations, drops
/// trailing SKU/model suffixes and caps the length. Running it on its own
/// output changes nothing.
pub fn normalize_title(raw: &str) -> String {
    let mut title = collapse_whitespace(raw);
    title = strip_prices(&title);
    title = strip_suffix_tokens(&title);
    truncate_title(&title, MAX_TITLE_CHARS)
}

/// Collapse runs of whitespace into single spaces and trim the ends
pub fn collapse_whitespace(content: &str) -> String {
    WHITESPACE_RE.replace_all(content, " ").trim().to_string()
}

/// Remove inline prices and discount annotations
///
/// Removing a price can expose a discount annotation ("(10$5% off)"), so the
/// passes repeat until nothing changes.
pub fn strip_prices(content: &str) -> String {
    let mut current = collapse_whitespace(content);
    loop {
        let without_discounts = DISCOUNT_RE.replace_all(&current, " ");
        let without_prices = PRICE_RE.replace_all(&without_discounts, " ");
        let stripped = collapse_whitespace(&without_prices);
        if stripped == current {
            return current;
        }
        current = stripped;
    }
}

/// Remove trailing `#token` and `(...)` suffixes until none are left
fn strip_suffix_tokens(content: &str) -> String {
    let mut current = content.to_string();
    loop {
        let mut changed = false;
        for suffix in [&*SKU_SUFFIX_RE, &*PAREN_SUFFIX_RE] {
            let stripped = suffix.replace(&current, "").trim_end().to_string();
            // Never strip a title down to nothing
            if stripped != current && !stripped.is_empty() {
                current = stripped;
                changed = true;
            }
        }
        if !changed {
            return current;
        }
    }
}

/// Cap a title at `max_chars` characters, ending it with an ellipsis when cut
pub fn truncate_title(content: &str, max_chars: usize) -> String {
    if content.chars().count() <= max_chars {
        return content.to_string();
    }

    let keep = max_chars.saturating_sub(ELLIPSIS.len());
    let head: String = content.chars().take(keep).collect();
    format!("{}{}", head.trim_end(), ELLIPSIS)
}
