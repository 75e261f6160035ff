//! Rate extraction from fetched markup.
//!
//! The matching rule is tied to the source page layout, so it lives behind
//! [`RateExtractor`] and can be replaced without touching the fetcher.

use crate::core::normalize_rate;
use regex::Regex;
use rust_decimal::Decimal;
use scraper::Html;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

/// `USD`, any non-digit run, then a number with `.` or `,` separators.
static USD_RATE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"USD[^0-9]*?([\d.,]+)").expect("Invalid regex"));

const HIDDEN_ELEMENTS: [&str; 3] = ["script", "style", "noscript"];

pub trait RateExtractor: Send + Sync {
    /// Extracts the rate from a response body, or `None` when absent.
    fn extract(&self, body: &str) -> Option<Decimal>;
}

/// Finds the first `USD <number>` occurrence in the visible page text.
#[derive(Debug, Default, Clone, Copy)]
pub struct UsdTextExtractor;

impl RateExtractor for UsdTextExtractor {
    fn extract(&self, body: &str) -> Option<Decimal> {
        let text = visible_text(body);
        let raw = USD_RATE_REGEX
            .captures(&text)
            .and_then(|cap| cap.get(1))
            .map(|m| m.as_str())?;

        let value = match Decimal::from_str(&raw.replace(',', ".")) {
            Ok(value) => value,
            Err(e) => {
                debug!("Matched '{}' but could not parse it: {}", raw, e);
                return None;
            }
        };
        normalize_rate(value)
    }
}

/// Text content of an HTML document, skipping scripts and styles. Text nodes
/// are concatenated as-is so numbers split across inline tags stay whole.
pub fn visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let mut text = String::new();

    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            ancestor
                .value()
                .as_element()
                .is_some_and(|el| HIDDEN_ELEMENTS.contains(&el.name()))
        });
        if !hidden {
            text.push_str(fragment);
        }
    }

    text
}
