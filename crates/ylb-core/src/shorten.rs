//! One-shot shortening: plain messages, "url keyword" messages and inline queries.

use std::sync::Arc;

use tracing::{debug, info};

use crate::{
    cache::ListingCache,
    domain::SessionKey,
    ephemeral::EphemeralLinks,
    formatting::{escape_html, keyword_in_use},
    ports::ShortenerGateway,
    utils::{sanitize_protocol, unique_link_targets, LinkEntity},
    Error, Result,
};

/// Result id of the "this link already exists" inline result. Choosing it
/// must never delete the link it points to.
pub const EXISTING_LINK_RESULT_ID: &str = "dont_delete_cir";

/// `/start` parameter used when the inline query carried an invalid URL.
pub const INVALID_URL_START_PARAMETER: &str = "empty_switch_pm";

/// `/start` parameter used when the occupied keyword cannot travel as one.
pub const OCCUPIED_START_PARAMETER: &str = "keyword_occupied";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InlineAnswer {
    /// Empty or malformed query: answer nothing.
    Nothing,
    Existing {
        short_url: String,
    },
    Created {
        keyword: String,
        title: String,
        short_url: String,
    },
    KeywordOccupied {
        keyword: String,
    },
    InvalidUrl,
}

impl InlineAnswer {
    /// `/start` parameter for the switch-to-private button, if this answer has one.
    pub fn start_parameter(&self) -> Option<String> {
        match self {
            InlineAnswer::KeywordOccupied { keyword } if is_start_parameter(keyword) => {
                Some(keyword.clone())
            }
            InlineAnswer::KeywordOccupied { .. } => Some(OCCUPIED_START_PARAMETER.to_string()),
            InlineAnswer::InvalidUrl => Some(INVALID_URL_START_PARAMETER.to_string()),
            _ => None,
        }
    }
}

/// Deep-link parameters are limited to 64 chars of `A-Za-z0-9_-`.
fn is_start_parameter(s: &str) -> bool {
    !s.is_empty()
        && s.len() <= 64
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Explanation shown after a switch from an inline answer to the private chat.
pub fn start_parameter_explanation(param: &str) -> String {
    match param {
        INVALID_URL_START_PARAMETER => {
            "You tried to shorten an invalid URL. Please try another!".to_string()
        }
        OCCUPIED_START_PARAMETER => {
            "The keyword you asked for is already occupied. Please try another!".to_string()
        }
        keyword => format!(
            "The keyword <i>{}</i> is already occupied. Please try another!",
            escape_html(keyword)
        ),
    }
}

pub struct QuickShortener {
    gateway: Arc<dyn ShortenerGateway>,
    cache: Arc<ListingCache>,
    ephemeral: Arc<EphemeralLinks>,
}

impl QuickShortener {
    pub fn new(
        gateway: Arc<dyn ShortenerGateway>,
        cache: Arc<ListingCache>,
        ephemeral: Arc<EphemeralLinks>,
    ) -> Self {
        Self {
            gateway,
            cache,
            ephemeral,
        }
    }

    /// Shorten every unique link of a message. `None` when it has no links.
    pub async fn shorten_links(&self, entities: &[LinkEntity]) -> Result<Option<String>> {
        let urls = unique_link_targets(entities);
        if urls.is_empty() {
            return Ok(None);
        }

        let mut lines = vec!["The following short links were created:\n".to_string()];
        for url in &urls {
            match self.gateway.create(url, None).await {
                Ok(link) => lines.push(link.short_url),
                Err(Error::InvalidUrl(_)) => {
                    lines.push(format!("{} (invalid URL)", escape_html(url)));
                }
                Err(e) => return Err(e),
            }
        }
        info!(count = urls.len(), "links shortened");
        Ok(Some(lines.join("\n")))
    }

    /// Create a short link under a chosen keyword.
    pub async fn shorten_with_keyword(&self, url: &str, keyword: &str) -> Result<String> {
        match self.gateway.create(url, Some(keyword)).await {
            Ok(link) if link.reused => Ok(format!(
                "This URL was already shortened before: {}",
                link.short_url
            )),
            Ok(link) => {
                info!(keyword = %link.keyword, "link shortened with keyword");
                Ok(link.short_url)
            }
            Err(Error::KeywordExists(_)) => Ok(keyword_in_use(keyword)),
            Err(Error::InvalidUrl(_)) => Ok(format!(
                "<code>{}</code> does not look like a valid URL.",
                escape_html(url)
            )),
            Err(e) => Err(e),
        }
    }

    /// Answer an inline query `url` or `url keyword`.
    ///
    /// A single word naming an existing keyword answers with that link.
    /// Otherwise a link is created speculatively and recorded for later cleanup.
    pub async fn inline(&self, key: SessionKey, query: &str) -> Result<InlineAnswer> {
        let words: Vec<&str> = query.split_whitespace().collect();
        let (target, keyword) = match words.as_slice() {
            [url] => {
                match self.cache.exists(url).await {
                    Ok(Some(existing)) => {
                        return Ok(InlineAnswer::Existing {
                            short_url: existing.short_url,
                        })
                    }
                    Ok(None) => {}
                    Err(e) => debug!(error = %e, "listing unavailable for inline lookup"),
                }
                (*url, None)
            }
            [url, keyword] => (*url, Some(*keyword)),
            _ => return Ok(InlineAnswer::Nothing),
        };

        let url = sanitize_protocol(target);
        let link = match self.gateway.create(&url, keyword).await {
            Ok(link) => link,
            Err(Error::KeywordExists(k)) => {
                return Ok(InlineAnswer::KeywordOccupied {
                    keyword: keyword.map(str::to_string).unwrap_or(k),
                })
            }
            Err(Error::InvalidUrl(_)) => return Ok(InlineAnswer::InvalidUrl),
            Err(e) => return Err(e),
        };

        // A reused link predates this query and must survive the cleanup.
        if !link.reused {
            self.ephemeral
                .record_speculative(key, &link.keyword)
                .await?;
        }

        let title = match keyword {
            Some(k) => format!("{k} | {}", link.title),
            None => link.title,
        };
        Ok(InlineAnswer::Created {
            keyword: link.keyword,
            title,
            short_url: link.short_url,
        })
    }

    /// The user picked an inline result: keep it, reclaim the rest.
    pub async fn chosen(&self, key: SessionKey, result_id: &str) -> Result<usize> {
        let kept = (result_id != EXISTING_LINK_RESULT_ID).then_some(result_id);
        self.ephemeral.resolve(key, kept).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::UserId, session::Sessions, store::MemoryStore, testing::FakeGateway,
    };
    use std::time::Duration;

    fn setup(links: &[&str]) -> (QuickShortener, Arc<FakeGateway>) {
        let gateway = Arc::new(FakeGateway::with_links(links));
        let sessions = Arc::new(Sessions::new(Arc::new(MemoryStore::new())));
        let cache = Arc::new(ListingCache::new(gateway.clone(), Duration::from_secs(60)));
        let ephemeral = Arc::new(EphemeralLinks::new(sessions, gateway.clone()));
        (QuickShortener::new(gateway.clone(), cache, ephemeral), gateway)
    }

    fn key() -> SessionKey {
        SessionKey::private(UserId(9))
    }

    #[tokio::test]
    async fn shortens_unique_links_in_order() {
        let (q, _) = setup(&[]);
        let entities = vec![
            LinkEntity::Url("b.com".to_string()),
            LinkEntity::TextLink {
                text: "here".to_string(),
                url: "https://a.com".to_string(),
            },
            LinkEntity::Url("b.com".to_string()),
        ];
        let reply = q.shorten_links(&entities).await.unwrap().unwrap();
        assert_eq!(
            reply,
            "The following short links were created:\n\nhttps://sho.rt/auto0\nhttps://sho.rt/auto1"
        );
        assert_eq!(q.shorten_links(&[]).await.unwrap(), None);
    }

    #[tokio::test]
    async fn occupied_keyword_gets_a_message() {
        let (q, _) = setup(&["taken"]);
        let reply = q.shorten_with_keyword("https://x.org", "taken").await.unwrap();
        assert!(reply.contains("already in use"));

        let reply = q.shorten_with_keyword("https://x.org", "free").await.unwrap();
        assert_eq!(reply, "https://sho.rt/free");
    }

    #[tokio::test]
    async fn inline_existing_keyword_is_never_reclaimed() {
        let (q, gateway) = setup(&["docs"]);
        let answer = q.inline(key(), "docs").await.unwrap();
        assert_eq!(
            answer,
            InlineAnswer::Existing {
                short_url: "https://sho.rt/docs".to_string()
            }
        );

        q.chosen(key(), EXISTING_LINK_RESULT_ID).await.unwrap();
        assert!(gateway.has("docs"));
        assert!(gateway.remove_calls().is_empty());
    }

    #[tokio::test]
    async fn incremental_inline_search_keeps_only_the_chosen_link() {
        let (q, gateway) = setup(&[]);
        let mut created = Vec::new();
        for query in ["example.com", "example.com ex", "example.com exa"] {
            match q.inline(key(), query).await.unwrap() {
                InlineAnswer::Created { keyword, .. } => created.push(keyword),
                other => panic!("unexpected answer: {other:?}"),
            }
        }
        assert_eq!(created, vec!["auto0", "ex", "exa"]);

        assert_eq!(q.chosen(key(), "exa").await.unwrap(), 2);
        assert!(gateway.has("exa"));
        assert!(!gateway.has("ex") && !gateway.has("auto0"));
    }

    #[tokio::test]
    async fn inline_failures_map_to_switch_parameters() {
        let (q, _) = setup(&["taken"]);
        let occupied = q.inline(key(), "x.org taken").await.unwrap();
        assert_eq!(occupied.start_parameter().as_deref(), Some("taken"));

        let invalid = q.inline(key(), "nodot kw").await.unwrap();
        assert_eq!(invalid, InlineAnswer::InvalidUrl);
        assert_eq!(
            invalid.start_parameter().as_deref(),
            Some(INVALID_URL_START_PARAMETER)
        );

        assert_eq!(q.inline(key(), "   ").await.unwrap(), InlineAnswer::Nothing);
        assert_eq!(q.inline(key(), "a b c").await.unwrap(), InlineAnswer::Nothing);
    }

    #[test]
    fn start_parameter_explanations() {
        assert!(start_parameter_explanation(INVALID_URL_START_PARAMETER).contains("invalid URL"));
        assert!(start_parameter_explanation("kw").contains("<i>kw</i>"));
        let odd = InlineAnswer::KeywordOccupied {
            keyword: "ä ö".to_string(),
        };
        assert_eq!(odd.start_parameter().as_deref(), Some(OCCUPIED_START_PARAMETER));
    }
}
