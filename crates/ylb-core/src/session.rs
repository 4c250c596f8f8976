//! Per-(chat, user) conversation state and its serialization discipline.
//!
//! Every mutation goes through a [`SessionGuard`], which holds that session's
//! lock for its whole lifetime. Two updates for the same session therefore
//! never interleave, while different sessions proceed in parallel.

use std::{
    collections::HashMap,
    ops::{Deref, DerefMut},
    sync::{Arc, Mutex as StdMutex},
};

use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::warn;

use crate::{
    dialog::Dialog,
    domain::{MessageRef, SessionKey},
    ports::StateStore,
    Result,
};

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    #[serde(default)]
    pub active_dialog: Option<Dialog>,
    /// Last prompt that still carries a cancel control.
    #[serde(default)]
    pub pending_prompt: Option<MessageRef>,
    /// Speculative inline keywords, in creation order, not yet resolved.
    #[serde(default)]
    pub ephemeral_keywords: Vec<String>,
}

impl Session {
    pub fn is_idle(&self) -> bool {
        self.active_dialog.is_none()
            && self.pending_prompt.is_none()
            && self.ephemeral_keywords.is_empty()
    }
}

type LockMap = Arc<StdMutex<HashMap<SessionKey, Arc<Mutex<()>>>>>;

pub struct Sessions {
    store: Arc<dyn StateStore>,
    /// Entries live only while a guard holds or awaits them.
    locks: LockMap,
}

impl Sessions {
    pub fn new(store: Arc<dyn StateStore>) -> Self {
        Self {
            store,
            locks: Arc::new(StdMutex::new(HashMap::new())),
        }
    }

    /// Lock the session and load its persisted state.
    pub async fn open(&self, key: SessionKey) -> Result<SessionGuard> {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(key)
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let mut guard = SessionGuard {
            key,
            session: Session::default(),
            store: self.store.clone(),
            locks: self.locks.clone(),
            lock: Some(lock.lock_owned().await),
        };

        if let Some(raw) = self.store.get(&key.storage_key()).await? {
            guard.session = serde_json::from_value(raw).unwrap_or_else(|e| {
                warn!(session = %key, error = %e, "discarding unreadable session state");
                Session::default()
            });
        }
        Ok(guard)
    }

    #[cfg(test)]
    pub(crate) fn tracked_locks(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Read-only copy of the session (still serialized against writers).
    pub async fn peek(&self, key: SessionKey) -> Result<Session> {
        let guard = self.open(key).await?;
        Ok(guard.session.clone())
    }
}

pub struct SessionGuard {
    key: SessionKey,
    session: Session,
    store: Arc<dyn StateStore>,
    locks: LockMap,
    lock: Option<OwnedMutexGuard<()>>,
}

impl SessionGuard {
    pub fn key(&self) -> SessionKey {
        self.key
    }

    /// Persist the current state. Idle sessions are removed from the store.
    pub async fn save(&self) -> Result<()> {
        let key = self.key.storage_key();
        if self.session.is_idle() {
            return self.store.delete(&key).await;
        }
        self.store
            .put(&key, serde_json::to_value(&self.session)?)
            .await
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        drop(self.lock.take());

        // Only the map references the mutex now: nobody holds or awaits it.
        let mut map = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if map
            .get(&self.key)
            .is_some_and(|lock| Arc::strong_count(lock) == 1)
        {
            map.remove(&self.key);
        }
    }
}

impl Deref for SessionGuard {
    type Target = Session;

    fn deref(&self) -> &Session {
        &self.session
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Session {
        &mut self.session
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        dialog::{Dialog, DialogKind},
        domain::{ChatId, MessageId, UserId},
        store::MemoryStore,
    };
    use std::time::Duration;

    fn key() -> SessionKey {
        SessionKey::new(ChatId(10), UserId(20))
    }

    #[tokio::test]
    async fn saved_state_is_visible_to_next_open() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Sessions::new(store.clone());

        {
            let mut s = sessions.open(key()).await.unwrap();
            s.active_dialog = Some(Dialog::new(DialogKind::Delete));
            s.pending_prompt = Some(MessageRef {
                chat_id: ChatId(10),
                message_id: MessageId(3),
            });
            s.ephemeral_keywords.push("k1".to_string());
            s.save().await.unwrap();
        }

        // A fresh manager over the same store sees the same state (restart).
        let restarted = Sessions::new(store);
        let s = restarted.peek(key()).await.unwrap();
        assert_eq!(s.active_dialog, Some(Dialog::new(DialogKind::Delete)));
        assert_eq!(s.ephemeral_keywords, vec!["k1".to_string()]);
    }

    #[tokio::test]
    async fn idle_session_is_deleted_from_store() {
        let store = Arc::new(MemoryStore::new());
        let sessions = Sessions::new(store.clone());

        let mut s = sessions.open(key()).await.unwrap();
        s.ephemeral_keywords.push("k1".to_string());
        s.save().await.unwrap();
        assert!(store.get(&key().storage_key()).await.unwrap().is_some());

        s.ephemeral_keywords.clear();
        s.save().await.unwrap();
        assert!(store.get(&key().storage_key()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn same_session_is_serialized() {
        let sessions = Arc::new(Sessions::new(Arc::new(MemoryStore::new())));

        let first = sessions.open(key()).await.unwrap();
        let contender = {
            let sessions = sessions.clone();
            tokio::spawn(async move { sessions.open(key()).await.map(|_| ()) })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(first);
        contender.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn other_sessions_are_not_blocked() {
        let sessions = Sessions::new(Arc::new(MemoryStore::new()));
        let _held = sessions.open(key()).await.unwrap();

        let other = SessionKey::new(ChatId(11), UserId(20));
        let opened = tokio::time::timeout(Duration::from_millis(200), sessions.open(other)).await;
        assert!(opened.is_ok());
    }

    #[tokio::test]
    async fn lock_entries_are_released_with_their_guards() {
        let sessions = Sessions::new(Arc::new(MemoryStore::new()));
        for user in 0..1000 {
            sessions
                .peek(SessionKey::new(ChatId(10), UserId(user)))
                .await
                .unwrap();
        }
        assert_eq!(sessions.tracked_locks(), 0);

        let held = sessions.open(key()).await.unwrap();
        assert_eq!(sessions.tracked_locks(), 1);
        drop(held);
        assert_eq!(sessions.tracked_locks(), 0);
    }

    #[tokio::test]
    async fn waiting_opener_keeps_the_lock_entry() {
        let sessions = Arc::new(Sessions::new(Arc::new(MemoryStore::new())));

        let first = sessions.open(key()).await.unwrap();
        let contender = {
            let sessions = sessions.clone();
            tokio::spawn(async move {
                let mut s = sessions.open(key()).await.unwrap();
                s.ephemeral_keywords.push("k1".to_string());
                s.save().await.unwrap();
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The contender is queued on the same mutex, so it must survive the drop.
        drop(first);
        assert_eq!(sessions.tracked_locks(), 1);
        contender.await.unwrap();
        assert_eq!(sessions.tracked_locks(), 0);

        let s = sessions.peek(key()).await.unwrap();
        assert_eq!(s.ephemeral_keywords, vec!["k1".to_string()]);
    }
}
