//! Reclaiming short links created speculatively while a user types an inline query.
//!
//! Every keystroke of an inline query may create a short link. Only the result
//! the user finally picks is meant to survive; the rest are deleted as soon as
//! the choice is known.

use std::sync::Arc;

use tracing::debug;

use crate::{domain::SessionKey, ports::ShortenerGateway, session::Sessions, Result};

pub struct EphemeralLinks {
    sessions: Arc<Sessions>,
    gateway: Arc<dyn ShortenerGateway>,
}

impl EphemeralLinks {
    pub fn new(sessions: Arc<Sessions>, gateway: Arc<dyn ShortenerGateway>) -> Self {
        Self { sessions, gateway }
    }

    /// Remember a keyword created on the session's behalf. Recording twice is a no-op.
    pub async fn record_speculative(&self, key: SessionKey, keyword: &str) -> Result<()> {
        let mut session = self.sessions.open(key).await?;
        if session.ephemeral_keywords.iter().any(|k| k == keyword) {
            return Ok(());
        }
        session.ephemeral_keywords.push(keyword.to_string());
        session.save().await?;
        debug!(session = %key, keyword, pending = session.ephemeral_keywords.len(), "speculative link recorded");
        Ok(())
    }

    /// Delete every recorded keyword except `kept`, and forget all of them.
    ///
    /// The set is drained under the session lock; the remote deletes run after
    /// it is released and their failures are only logged. Returns the number of
    /// links actually deleted.
    pub async fn resolve(&self, key: SessionKey, kept: Option<&str>) -> Result<usize> {
        let drained = {
            let mut session = self.sessions.open(key).await?;
            if session.ephemeral_keywords.is_empty() {
                return Ok(0);
            }
            let drained = std::mem::take(&mut session.ephemeral_keywords);
            session.save().await?;
            drained
        };

        let mut deleted = 0;
        for keyword in drained.iter().filter(|k| Some(k.as_str()) != kept) {
            match self.gateway.remove(keyword).await {
                Ok(()) => deleted += 1,
                Err(e) => debug!(session = %key, keyword = %keyword, error = %e, "speculative link cleanup failed"),
            }
        }
        debug!(session = %key, kept = ?kept, drained = drained.len(), deleted, "ephemeral links resolved");
        Ok(deleted)
    }
}
