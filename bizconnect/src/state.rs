//! The application state container. One writer path (`Store::update`),
//! immutable snapshots out (`Store::snapshot`), so deferred callbacks always
//! read through the store instead of captured copies.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::RwLock;
use uuid::Uuid;

use crate::model::{
    AppNotification, ChatMessage, Idea, Item, Post, Problem, RecentChat, User,
};

/// The conversation window currently on screen, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenChat {
    pub chat_id: Uuid,
    pub item: Item,
    pub messages: Vec<ChatMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct AppState {
    pub users: Vec<User>,
    pub posts: Vec<Post>,
    pub problems: Vec<Problem>,
    pub ideas: Vec<Idea>,
    /// The signed-in user, if any.
    pub session: Option<User>,
    pub notifications: Vec<AppNotification>,
    pub recent_chats: Vec<RecentChat>,
    /// Chats the session user participates in; gates chat-message events.
    pub user_chat_ids: HashSet<Uuid>,
    /// Chat messages already merged, so a redelivered event is a no-op even
    /// when the conversation window is closed and no message is stored.
    pub seen_message_ids: HashSet<Uuid>,
    pub open_chat: Option<OpenChat>,
}

impl AppState {
    pub fn user_by_id(&self, id: Uuid) -> Option<&User> {
        self.users.iter().find(|u| u.user_id == id)
    }

    pub fn post_by_id(&self, id: Uuid) -> Option<&Post> {
        self.posts.iter().find(|p| p.id == id)
    }

    pub fn post_mut(&mut self, id: Uuid) -> Option<&mut Post> {
        self.posts.iter_mut().find(|p| p.id == id)
    }

    /// Look an item up across both content collections.
    pub fn item_by_id(&self, id: Uuid) -> Option<Item> {
        if let Some(p) = self.problems.iter().find(|p| p.id == id) {
            return Some(Item::Problem(p.clone()));
        }
        self.ideas
            .iter()
            .find(|i| i.id == id)
            .map(|i| Item::Idea(i.clone()))
    }

    /// Feed order: newest first. Stable, so same-timestamp entries keep
    /// their insertion order.
    pub fn sort_posts(&mut self) {
        self.posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    }

    /// Update an existing recent-chat entry and move it to the front.
    /// Returns false when the chat has no projection yet.
    pub fn touch_recent_chat(&mut self, chat_id: Uuid, text: &str, at: i64) -> bool {
        let Some(pos) = self.recent_chats.iter().position(|c| c.chat_id == chat_id) else {
            return false;
        };
        let mut entry = self.recent_chats.remove(pos);
        entry.last_message_text = Some(text.into());
        entry.last_message_at = Some(at);
        self.recent_chats.insert(0, entry);
        true
    }

    /// Insert (or replace) a recent-chat projection, keeping the list
    /// ordered by recency.
    pub fn push_recent_chat(&mut self, chat: RecentChat) {
        self.recent_chats.retain(|c| c.chat_id != chat.chat_id);
        self.recent_chats.insert(0, chat);
        self.recent_chats
            .sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    }
}

pub struct Store {
    inner: RwLock<Arc<AppState>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Arc::new(AppState::default())),
        }
    }

    /// Cheap clone of the current snapshot.
    pub fn snapshot(&self) -> Arc<AppState> {
        self.inner.read().clone()
    }

    /// The single writer path. Readers holding older snapshots are
    /// unaffected; the next `snapshot()` sees the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut AppState) -> R) -> R {
        let mut guard = self.inner.write();
        let state = Arc::make_mut(&mut guard);
        f(state)
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshots_are_immutable() {
        let store = Store::new();
        let before = store.snapshot();
        store.update(|s| {
            s.user_chat_ids.insert(Uuid::new_v4());
        });
        assert!(before.user_chat_ids.is_empty());
        assert_eq!(store.snapshot().user_chat_ids.len(), 1);
    }

    #[test]
    fn touch_recent_chat_moves_to_front() {
        let user = User {
            user_id: Uuid::new_v4(),
            name: "a".into(),
            email: "a@example.com".into(),
            avatar_url: String::new(),
            bio: None,
        };
        let item = Item::Idea(crate::model::Idea {
            id: Uuid::new_v4(),
            title: "t".into(),
            summary: "s".into(),
            detailed_description: "d".into(),
            reward: crate::model::Reward {
                kind: crate::model::RewardType::Other,
                value: "x".into(),
            },
            posted_by: user.clone(),
            created_at: 0,
        });
        let mut state = AppState::default();
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        for (id, at) in [(first, 10), (second, 20)] {
            state.push_recent_chat(RecentChat {
                chat_id: id,
                item: item.clone(),
                other_participant: user.clone(),
                last_message_text: None,
                last_message_at: Some(at),
            });
        }
        assert_eq!(state.recent_chats[0].chat_id, second);
        assert!(state.touch_recent_chat(first, "hi", 30));
        assert_eq!(state.recent_chats[0].chat_id, first);
        assert!(!state.touch_recent_chat(Uuid::new_v4(), "hi", 40));
    }
}
