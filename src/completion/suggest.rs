//! Parser for suggest service responses.
//!
//! The body is a JSON list:
//! `[query, [suggestions...], [descriptions...], [query urls...], {extras}]`.
//! Only the first two elements are required. The extras may carry
//! `"google:suggesttype"`, a list parallel to the suggestions in which
//! `"NAVIGATION"` marks a site rather than a query.

use crate::error::{Error, Result};
use crate::url_bar::fixup;
use serde_json::Value;

const SUGGEST_TYPE_KEY: &str = "google:suggesttype";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigationResult {
    pub url: String,
    pub site_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SuggestResults {
    /// Query suggestions, best first
    pub queries: Vec<String>,
    /// Site suggestions, best first
    pub navigation: Vec<NavigationResult>,
}

/// Parse a response for `query`. A response echoing a different query is
/// stale and yields no results. Each list is capped at `max_results`.
pub fn parse_suggest_response(body: &[u8], query: &str, max_results: usize) -> Result<SuggestResults> {
    let value: Value = serde_json::from_slice(body)?;
    let malformed = || Error::Transport("malformed suggest response".into());

    let root = value.as_array().ok_or_else(malformed)?;
    let echoed = root.first().and_then(Value::as_str).ok_or_else(malformed)?;
    let suggestions = root.get(1).and_then(Value::as_array).ok_or_else(malformed)?;

    if !echoed.eq_ignore_ascii_case(query) {
        log::debug!("Ignoring suggestions for {:?} while waiting for {:?}", echoed, query);
        return Ok(SuggestResults::default());
    }

    let descriptions = root.get(2).and_then(Value::as_array);
    let types = root
        .get(4)
        .and_then(Value::as_object)
        .and_then(|extras| extras.get(SUGGEST_TYPE_KEY))
        .and_then(Value::as_array);

    let mut results = SuggestResults::default();
    for (i, suggestion) in suggestions.iter().enumerate() {
        let text = suggestion.as_str().ok_or_else(malformed)?;

        let is_navigation = types
            .and_then(|t| t.get(i))
            .and_then(Value::as_str)
            .is_some_and(|t| t == "NAVIGATION");

        if is_navigation {
            let site_name = descriptions.and_then(|d| d.get(i)).and_then(Value::as_str);
            if let Some(site_name) = site_name {
                if results.navigation.len() < max_results {
                    // don't trust the server to send valid URLs
                    if let Some(url) = fixup::fixup_url(text, "") {
                        results.navigation.push(NavigationResult {
                            url: url.to_string(),
                            site_name: site_name.to_string(),
                        });
                    }
                }
            }
        } else if results.queries.len() < max_results {
            results.queries.push(text.to_string());
        }
    }

    Ok(results)
}
