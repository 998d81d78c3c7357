//! Page-content signals shared by the probes.
//!
//! Everything here is a string heuristic over the profile page. Matching
//! runs on [`PageText`], which lowercases the body and folds the
//! typographic apostrophe so "doesn’t" and "doesn't" compare equal.

use regex::Regex;
use scraper::{Html, Selector};

use crate::utils::truncate_chars;

/// Phrases the platform shows when no account owns the handle.
pub const NOT_FOUND_PHRASES: &[&str] = &[
    "this account doesn't exist",
    "account doesn't exist",
    "page doesn't exist",
];

/// Phrases shown on suspended profiles.
pub const SUSPENDED_PHRASES: &[&str] = &["account has been suspended", "account suspended"];

/// Counters rendered only on real profiles.
pub const PROFILE_MARKERS: &[&str] = &["followers", "following"];

/// Characters of context kept on each side of a matched phrase.
const SNIPPET_CONTEXT: usize = 40;

/// Normalized, lowercase view of a response body.
pub struct PageText {
    text: String,
}

impl PageText {
    pub fn new(body: &str) -> Self {
        Self {
            text: body.to_lowercase().replace('\u{2019}', "'"),
        }
    }

    /// First phrase from `phrases` present in the page.
    pub fn find(&self, phrases: &[&'static str]) -> Option<&'static str> {
        phrases.iter().copied().find(|p| self.text.contains(p))
    }

    pub fn suspension(&self) -> Option<&'static str> {
        self.find(SUSPENDED_PHRASES)
    }

    pub fn not_found(&self) -> Option<&'static str> {
        self.find(NOT_FOUND_PHRASES)
    }

    pub fn profile_marker(&self) -> Option<&'static str> {
        self.find(PROFILE_MARKERS)
    }

    /// Case-insensitive plain mention of the handle.
    pub fn mentions(&self, handle: &str) -> bool {
        self.text.contains(&handle.to_lowercase())
    }

    /// Short excerpt around the first occurrence of `phrase`.
    pub fn snippet(&self, phrase: &str) -> Option<String> {
        let start = self.text.find(phrase)?;
        let end = start + phrase.len();

        let before = &self.text[..start];
        let lead = before
            .char_indices()
            .rev()
            .nth(SNIPPET_CONTEXT - 1)
            .map_or(0, |(idx, _)| idx);
        let after = truncate_chars(&self.text[end..], SNIPPET_CONTEXT);

        let excerpt = format!("{}{}{}", &before[lead..], phrase, after);
        Some(excerpt.split_whitespace().collect::<Vec<_>>().join(" "))
    }
}

/// Whether the page embeds the handle as its own profile data.
///
/// Looks for the profile JSON fields (`"screen_name":"…"`, `"username":"…"`)
/// or the `(@handle)` form used in profile titles.
pub fn handle_embedded(body: &str, handle: &str) -> bool {
    let escaped = regex::escape(handle);
    let pattern = format!(
        r#"(?i)"(?:screen_name|username)"\s*:\s*"{escaped}"|\(@{escaped}\)"#
    );
    match Regex::new(&pattern) {
        Ok(re) => re.is_match(body),
        Err(e) => {
            log::warn!("Handle pattern for '{}' failed to compile: {}", handle, e);
            false
        }
    }
}

/// Text of the document's `<title>`, trimmed.
pub fn page_title(body: &str) -> Option<String> {
    let selector = Selector::parse("title").ok()?;
    let document = Html::parse_document(body);
    let title: String = document.select(&selector).next()?.text().collect();
    let title = title.split_whitespace().collect::<Vec<_>>().join(" ");
    (!title.is_empty()).then_some(title)
}
