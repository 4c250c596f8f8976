use std::{collections::BTreeSet, sync::Arc};

use tokio::sync::RwLock;
use tracing::info;

use crate::{dialog::DialogKind, domain::UserId, ports::StateStore, Result};

const USERS_KEY: &str = "access:users";

// ============== Authorization ==============

/// Admin plus the set of users the admin has let in.
pub struct AccessRegistry {
    admin: UserId,
    users: RwLock<BTreeSet<UserId>>,
    store: Arc<dyn StateStore>,
}

impl AccessRegistry {
    pub async fn load(admin: UserId, store: Arc<dyn StateStore>) -> Result<Self> {
        let users = match store.get(USERS_KEY).await? {
            Some(raw) => serde_json::from_value::<BTreeSet<UserId>>(raw)?,
            None => BTreeSet::new(),
        };
        info!(admin = admin.0, users = users.len(), "access registry loaded");
        Ok(Self {
            admin,
            users: RwLock::new(users),
            store,
        })
    }

    pub fn admin(&self) -> UserId {
        self.admin
    }

    pub fn is_admin(&self, user_id: Option<UserId>) -> bool {
        user_id == Some(self.admin)
    }

    /// Admin or an authorized user.
    pub async fn is_permitted(&self, user_id: Option<UserId>) -> bool {
        let Some(user_id) = user_id else {
            return false;
        };
        user_id == self.admin || self.users.read().await.contains(&user_id)
    }

    pub async fn may_start(&self, user_id: Option<UserId>, kind: DialogKind) -> bool {
        if kind.admin_only() {
            return self.is_admin(user_id);
        }
        self.is_permitted(user_id).await
    }

    /// Returns whether the user was newly added.
    pub async fn add_user(&self, user_id: UserId) -> Result<bool> {
        let mut users = self.users.write().await;
        let mut next = users.clone();
        if !next.insert(user_id) {
            return Ok(false);
        }
        self.store
            .put(USERS_KEY, serde_json::to_value(&next)?)
            .await?;
        *users = next;
        info!(user = user_id.0, "user authorized");
        Ok(true)
    }

    /// Returns whether the user was present.
    pub async fn kick_user(&self, user_id: UserId) -> Result<bool> {
        let mut users = self.users.write().await;
        let mut next = users.clone();
        if !next.remove(&user_id) {
            return Ok(false);
        }
        self.store
            .put(USERS_KEY, serde_json::to_value(&next)?)
            .await?;
        *users = next;
        info!(user = user_id.0, "user kicked");
        Ok(true)
    }

    /// Authorized users, admin excluded, in id order.
    pub async fn users(&self) -> Vec<UserId> {
        self.users.read().await.iter().copied().collect()
    }
}
