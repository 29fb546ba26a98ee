use std::collections::HashMap;

use async_trait::async_trait;
use time::OffsetDateTime;
use tokio::sync::RwLock;

use crate::storage::{NewUser, StorageError, StorageResult, User, UserDirectory, UserId};

#[derive(Debug)]
struct Inner {
    users: HashMap<UserId, User>,
    next_id: UserId,
}

/// User directory backed by a `HashMap`.
///
/// Ids are assigned sequentially from 1. Usernames are unique; emails are
/// unique case-insensitively.
#[derive(Debug)]
pub struct InMemoryUserDirectory {
    inner: RwLock<Inner>,
}

impl Default for InMemoryUserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryUserDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                users: HashMap::new(),
                next_id: 1,
            }),
        }
    }

    /// Inserts or replaces a user with a caller-chosen id.
    pub async fn insert(&self, user: User) {
        let mut inner = self.inner.write().await;
        inner.next_id = inner.next_id.max(user.id + 1);
        inner.users.insert(user.id, user);
    }

    /// Removes a user, returning it if present.
    pub async fn remove(&self, id: UserId) -> Option<User> {
        self.inner.write().await.users.remove(&id)
    }

    /// Number of users in the directory.
    pub async fn len(&self) -> usize {
        self.inner.read().await.users.len()
    }

    /// Returns `true` if the directory holds no users.
    pub async fn is_empty(&self) -> bool {
        self.inner.read().await.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for InMemoryUserDirectory {
    async fn find_by_identifier(&self, identifier: &str) -> StorageResult<Option<User>> {
        let inner = self.inner.read().await;
        Ok(inner
            .users
            .values()
            .find(|user| user.matches_identifier(identifier))
            .cloned())
    }

    async fn find_by_id(&self, id: UserId) -> StorageResult<Option<User>> {
        Ok(self.inner.read().await.users.get(&id).cloned())
    }

    async fn create(&self, new_user: NewUser) -> StorageResult<User> {
        let mut inner = self.inner.write().await;

        if let Some(existing) = inner.users.values().find(|user| {
            user.username == new_user.username || user.email.eq_ignore_ascii_case(&new_user.email)
        }) {
            let field = if existing.username == new_user.username {
                "username"
            } else {
                "email"
            };
            return Err(StorageError::Conflict(format!("{} already registered", field)));
        }

        let id = inner.next_id;
        inner.next_id += 1;

        let now = OffsetDateTime::now_utc();
        let user = User {
            id,
            username: new_user.username,
            email: new_user.email,
            status: true,
            nick_name: new_user.nick_name,
            phone: new_user.phone,
            header_img: None,
            password_hash: Some(new_user.password_hash),
            created_at: now,
            updated_at: now,
        };
        inner.users.insert(id, user.clone());
        Ok(user)
    }
}
