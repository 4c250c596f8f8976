use std::sync::OnceLock;

use chrono::Utc;
use regex::Regex;

// ============== Timestamp Helpers ==============

/// RFC3339 timestamp in UTC (for persisted state metadata).
pub fn iso_timestamp_utc() -> String {
    Utc::now().to_rfc3339()
}

// ============== Text Helpers ==============

pub fn truncate_text(s: &str, max_len: usize) -> String {
    if s.len() <= max_len {
        return s.to_string();
    }
    let mut out = s.chars().take(max_len).collect::<String>();
    out.push_str("...");
    out
}

// ============== Link Helpers ==============

/// A link found in a message: either a bare URL or a text link (`<a href>`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LinkEntity {
    Url(String),
    TextLink { text: String, url: String },
}

impl LinkEntity {
    pub fn target(&self) -> &str {
        match self {
            LinkEntity::Url(url) => url,
            LinkEntity::TextLink { url, .. } => url,
        }
    }

    /// The text of the entity as it appears in the message.
    pub fn visible_text(&self) -> &str {
        match self {
            LinkEntity::Url(url) => url,
            LinkEntity::TextLink { text, .. } => text,
        }
    }
}

/// Extract the keyword from a short URL: the part after the last slash,
/// trailing slashes ignored. `https://sho.rt/foo//` yields `foo`.
pub fn extract_keyword(short_url: &str) -> String {
    let trimmed = short_url.trim().trim_end_matches('/');
    match trimmed.rsplit_once('/') {
        Some((_, keyword)) => keyword.to_string(),
        None => trimmed.to_string(),
    }
}

/// Leave URLs with a scheme (`https:`, `mailto:`, ...) untouched; assume
/// everything else is a web link and prefix `http://`.
pub fn sanitize_protocol(url: &str) -> String {
    static SCHEME: OnceLock<Regex> = OnceLock::new();
    let scheme =
        SCHEME.get_or_init(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid regex"));

    let url = url.trim();
    if scheme.is_match(url) {
        return url.to_string();
    }
    format!("http://{url}")
}

/// Sanitized link targets in order of first appearance, duplicates removed.
pub fn unique_link_targets(entities: &[LinkEntity]) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for e in entities {
        let url = sanitize_protocol(e.target());
        if !out.contains(&url) {
            out.push(url);
        }
    }
    out
}

/// Parse a "url keyword" (or "keyword url") message.
///
/// Matches messages of exactly two words where exactly one link entity is
/// present and all entities are of the same kind. Returns `(url, keyword)`.
pub fn parse_url_with_keyword(text: &str, entities: &[LinkEntity]) -> Option<(String, String)> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() != 2 {
        return None;
    }

    let urls = entities
        .iter()
        .filter(|e| matches!(e, LinkEntity::Url(_)))
        .count();
    let text_links = entities.len() - urls;
    if !((urls == 1 && text_links == 0) || (urls == 0 && text_links == 1)) {
        return None;
    }

    let entity = &entities[0];
    let word = entity.visible_text().trim();
    let idx = words.iter().position(|w| *w == word)?;
    let keyword = words[1 - idx].to_string();

    Some((sanitize_protocol(entity.target()), keyword))
}
