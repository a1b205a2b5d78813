//! Readable-text extraction from fetched HTML
//!
//! Produces the plain-text payload handed to the summarizer: boilerplate
//! elements are stripped, whitespace is normalized, and the result is capped
//! at a byte budget derived from the summarizer's token limit.

use scraper::{ElementRef, Html, Selector};

/// Elements whose text content is navigation or chrome, not page content
const EXCLUDED_TAGS: &[&str] = &["script", "style", "nav", "footer", "header", "aside", "noscript"];

/// Extracts readable text from an HTML document
///
/// Prefers the `<main>` or `<article>` element when the page has one,
/// otherwise walks the whole document. Text is whitespace-normalized and
/// truncated to at most `max_bytes` on a char boundary.
pub fn extract_text(html: &str, max_bytes: usize) -> String {
    let document = Html::parse_document(html);

    // Selector strings are static and known-valid
    let content_selector = Selector::parse("main, article").unwrap();

    let mut parts: Vec<String> = Vec::new();
    if let Some(content) = document.select(&content_selector).next() {
        collect_text(content, &mut parts);
    } else {
        // parse_document always synthesizes an <html> element
        collect_text(document.root_element(), &mut parts);
    }

    let joined = parts.join(" ");
    let normalized: String = joined.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_at_char_boundary(&normalized, max_bytes)
}

fn collect_text(element: ElementRef, parts: &mut Vec<String>) {
    if EXCLUDED_TAGS.contains(&element.value().name()) {
        return;
    }

    for child in element.children() {
        if let Some(child_element) = ElementRef::wrap(child) {
            collect_text(child_element, parts);
        } else if let Some(text) = child.value().as_text() {
            let trimmed = text.trim();
            if !trimmed.is_empty() {
                parts.push(trimmed.to_string());
            }
        }
    }
}

/// Truncates `s` to at most `max_bytes`, backing up to a char boundary
fn truncate_at_char_boundary(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
