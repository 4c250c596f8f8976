use std::fmt;

use serde::{Deserialize, Serialize};

/// Telegram user id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

/// Telegram chat id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

/// Telegram message id (numeric).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub i32);

/// A stable reference to a Telegram message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageRef {
    pub chat_id: ChatId,
    pub message_id: MessageId,
}

/// Identity of a session: one per (chat, user) pair.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionKey {
    pub chat_id: ChatId,
    pub user_id: UserId,
}

impl SessionKey {
    pub fn new(chat_id: ChatId, user_id: UserId) -> Self {
        Self { chat_id, user_id }
    }

    /// The session of a user's private chat with the bot.
    ///
    /// Inline queries and chosen inline results carry no chat, so they are
    /// attributed here (Telegram private chat ids equal the user id).
    pub fn private(user_id: UserId) -> Self {
        Self {
            chat_id: ChatId(user_id.0),
            user_id,
        }
    }

    pub fn storage_key(&self) -> String {
        format!("session:{}:{}", self.chat_id.0, self.user_id.0)
    }
}

impl fmt::Display for SessionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.chat_id.0, self.user_id.0)
    }
}

/// One entry of the shortener listing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortUrl {
    pub keyword: String,
    pub short_url: String,
    pub url: String,
    pub title: String,
}

/// Result of creating a short link.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreatedLink {
    pub keyword: String,
    pub short_url: String,
    pub title: String,
    /// The instance already had a link for this URL and handed that one back.
    pub reused: bool,
}
