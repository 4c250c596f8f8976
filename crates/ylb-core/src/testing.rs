//! Port fakes shared by the unit tests.

use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{ChatId, CreatedLink, MessageId, MessageRef, ShortUrl},
    messaging::{port::MessagingPort, types::InlineKeyboard},
    ports::ShortenerGateway,
    Error, Result,
};

pub const BASE_URL: &str = "https://sho.rt";

fn record(keyword: &str) -> ShortUrl {
    ShortUrl {
        keyword: keyword.to_string(),
        short_url: format!("{BASE_URL}/{keyword}"),
        url: format!("https://example.com/{keyword}"),
        title: format!("Page {keyword}"),
    }
}

/// In-memory shortener that records every mutating call.
#[derive(Default)]
pub struct FakeGateway {
    links: Mutex<Vec<ShortUrl>>,
    list_calls: AtomicUsize,
    list_failing: AtomicBool,
    list_delay: Mutex<Option<Duration>>,
    expand_calls: Mutex<Vec<String>>,
    remove_calls: Mutex<Vec<String>>,
    failing_removes: Mutex<HashSet<String>>,
    renames: Mutex<Vec<(String, String)>>,
    retargets: Mutex<Vec<(String, String)>>,
    auto_keyword: AtomicUsize,
}

impl FakeGateway {
    pub fn with_links(keywords: &[&str]) -> Self {
        let gw = Self::default();
        gw.links
            .lock()
            .unwrap()
            .extend(keywords.iter().map(|k| record(k)));
        gw
    }

    /// Add a link the listing will only see on its next refresh.
    pub fn insert(&self, keyword: &str) {
        self.links.lock().unwrap().push(record(keyword));
    }

    pub fn has(&self, keyword: &str) -> bool {
        self.links
            .lock()
            .unwrap()
            .iter()
            .any(|r| r.keyword == keyword)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn set_list_failing(&self, failing: bool) {
        self.list_failing.store(failing, Ordering::SeqCst);
    }

    pub fn set_list_delay(&self, delay: Duration) {
        *self.list_delay.lock().unwrap() = Some(delay);
    }

    pub fn fail_remove_of(&self, keyword: &str) {
        self.failing_removes
            .lock()
            .unwrap()
            .insert(keyword.to_string());
    }

    pub fn expand_calls(&self) -> Vec<String> {
        self.expand_calls.lock().unwrap().clone()
    }

    pub fn remove_calls(&self) -> Vec<String> {
        self.remove_calls.lock().unwrap().clone()
    }

    pub fn renames(&self) -> Vec<(String, String)> {
        self.renames.lock().unwrap().clone()
    }

    pub fn retargets(&self) -> Vec<(String, String)> {
        self.retargets.lock().unwrap().clone()
    }
}

#[async_trait]
impl ShortenerGateway for FakeGateway {
    fn base_url(&self) -> &str {
        BASE_URL
    }

    async fn expand(&self, keyword: &str) -> Result<String> {
        self.expand_calls.lock().unwrap().push(keyword.to_string());
        self.links
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.keyword == keyword)
            .map(|r| r.url.clone())
            .ok_or_else(|| Error::NotFound(keyword.to_string()))
    }

    async fn create(&self, url: &str, keyword: Option<&str>) -> Result<CreatedLink> {
        if !url.contains('.') {
            return Err(Error::InvalidUrl(url.to_string()));
        }
        let keyword = match keyword {
            Some(k) => k.to_string(),
            None => format!("auto{}", self.auto_keyword.fetch_add(1, Ordering::SeqCst)),
        };
        if self.has(&keyword) {
            return Err(Error::KeywordExists(keyword));
        }

        let rec = ShortUrl {
            keyword: keyword.clone(),
            short_url: format!("{BASE_URL}/{keyword}"),
            url: url.to_string(),
            title: format!("Title of {url}"),
        };
        self.links.lock().unwrap().push(rec.clone());
        Ok(CreatedLink {
            keyword: rec.keyword,
            short_url: rec.short_url,
            title: rec.title,
            reused: false,
        })
    }

    async fn rename(&self, old_keyword: &str, new_keyword: &str) -> Result<()> {
        if self.has(new_keyword) {
            return Err(Error::KeywordExists(new_keyword.to_string()));
        }
        let mut links = self.links.lock().unwrap();
        let rec = links
            .iter_mut()
            .find(|r| r.keyword == old_keyword)
            .ok_or_else(|| Error::NotFound(old_keyword.to_string()))?;
        rec.keyword = new_keyword.to_string();
        rec.short_url = format!("{BASE_URL}/{new_keyword}");
        self.renames
            .lock()
            .unwrap()
            .push((old_keyword.to_string(), new_keyword.to_string()));
        Ok(())
    }

    async fn retarget(&self, keyword: &str, url: &str) -> Result<()> {
        let mut links = self.links.lock().unwrap();
        let rec = links
            .iter_mut()
            .find(|r| r.keyword == keyword)
            .ok_or_else(|| Error::NotFound(keyword.to_string()))?;
        rec.url = url.to_string();
        self.retargets
            .lock()
            .unwrap()
            .push((keyword.to_string(), url.to_string()));
        Ok(())
    }

    async fn remove(&self, keyword: &str) -> Result<()> {
        self.remove_calls.lock().unwrap().push(keyword.to_string());
        if self.failing_removes.lock().unwrap().contains(keyword) {
            return Err(Error::Transport("connection reset".to_string()));
        }
        let mut links = self.links.lock().unwrap();
        let before = links.len();
        links.retain(|r| r.keyword != keyword);
        if links.len() == before {
            return Err(Error::NotFound(keyword.to_string()));
        }
        Ok(())
    }

    async fn list_all(&self) -> Result<Vec<ShortUrl>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.list_delay.lock().unwrap();
        if let Some(d) = delay {
            tokio::time::sleep(d).await;
        }
        if self.list_failing.load(Ordering::SeqCst) {
            return Err(Error::Transport("connection refused".to_string()));
        }
        Ok(self.links.lock().unwrap().clone())
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Sent {
    Message {
        msg: MessageRef,
        html: String,
        keyboard: Option<InlineKeyboard>,
    },
    Edited {
        msg: MessageRef,
        html: String,
    },
    Cleared {
        msg: MessageRef,
    },
    CallbackAnswer {
        id: String,
        text: Option<String>,
    },
}

/// Messenger that records every call and tracks which keyboards are live.
#[derive(Default)]
pub struct FakeMessenger {
    next_id: Mutex<i32>,
    log: Mutex<Vec<Sent>>,
    live: Mutex<HashSet<MessageRef>>,
    max_live: AtomicUsize,
}

impl FakeMessenger {
    fn alloc(&self, chat_id: ChatId) -> MessageRef {
        let mut guard = self.next_id.lock().unwrap();
        *guard += 1;
        MessageRef {
            chat_id,
            message_id: MessageId(*guard),
        }
    }

    pub fn log(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    pub fn texts(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { html, .. } | Sent::Edited { html, .. } => Some(html),
                _ => None,
            })
            .collect()
    }

    pub fn last_text(&self) -> Option<String> {
        self.texts().pop()
    }

    pub fn live_keyboards(&self) -> Vec<MessageRef> {
        self.live.lock().unwrap().iter().copied().collect()
    }

    /// Highest number of simultaneously live keyboards ever observed.
    pub fn max_live(&self) -> usize {
        self.max_live.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessagingPort for FakeMessenger {
    async fn send_html(&self, chat_id: ChatId, html: &str) -> Result<MessageRef> {
        let msg = self.alloc(chat_id);
        self.log.lock().unwrap().push(Sent::Message {
            msg,
            html: html.to_string(),
            keyboard: None,
        });
        Ok(msg)
    }

    async fn send_with_keyboard(
        &self,
        chat_id: ChatId,
        html: &str,
        keyboard: InlineKeyboard,
    ) -> Result<MessageRef> {
        let msg = self.alloc(chat_id);
        self.log.lock().unwrap().push(Sent::Message {
            msg,
            html: html.to_string(),
            keyboard: Some(keyboard),
        });
        let mut live = self.live.lock().unwrap();
        live.insert(msg);
        self.max_live.fetch_max(live.len(), Ordering::SeqCst);
        Ok(msg)
    }

    async fn edit_html(&self, msg: MessageRef, html: &str) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Edited {
            msg,
            html: html.to_string(),
        });
        self.live.lock().unwrap().remove(&msg);
        Ok(())
    }

    async fn clear_keyboard(&self, msg: MessageRef) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Cleared { msg });
        self.live.lock().unwrap().remove(&msg);
        Ok(())
    }

    async fn answer_callback_query(&self, callback_id: &str, text: Option<&str>) -> Result<()> {
        self.log.lock().unwrap().push(Sent::CallbackAnswer {
            id: callback_id.to_string(),
            text: text.map(str::to_string),
        });
        Ok(())
    }
}
