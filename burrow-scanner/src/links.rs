use scraper::{Html, Selector};
use std::sync::LazyLock;

static HREF_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[href]").expect("static selector is valid"));

/// Pull the raw `href` value of every element that carries one.
///
/// Values are returned as written in the document. Empty values, in-page
/// anchors, and `javascript:`, `mailto:` and `tel:` links are skipped.
pub fn extract_links(body: &[u8]) -> Vec<String> {
    let html = String::from_utf8_lossy(body);
    let document = Html::parse_document(&html);

    document
        .select(&HREF_SELECTOR)
        .filter_map(|element| element.value().attr("href"))
        .map(str::trim)
        .filter(|href| !is_ignored(href))
        .map(str::to_string)
        .collect()
}

fn is_ignored(href: &str) -> bool {
    let lower = href.to_ascii_lowercase();
    href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
}
