//! Opening conversations. Every item has at most one chat; the first person
//! to reach out creates it with both the initiator and the item owner as
//! participants, and everyone after that lands in the same one.

use datasvc::DataService;
use uuid::Uuid;

use crate::app::App;
use crate::model::{ChatMessage, Item, RecentChat};
use crate::mutate::{MutationError, MutationResult};
use crate::state::OpenChat;

impl<S: DataService> App<S> {
    /// Find or create the chat for an item, load its history and publish it
    /// as the open conversation.
    pub async fn open_item_chat(&self, item: &Item) -> MutationResult<OpenChat> {
        let user = self.require_session()?;
        let remote = |action| move |source| MutationError::Remote { action, source };

        let chat = match self
            .svc
            .find_chat_by_item(item.id())
            .await
            .map_err(remote("open chat"))?
        {
            Some(chat) => chat,
            None => {
                let chat = self
                    .svc
                    .create_chat(item.id(), item.item_type())
                    .await
                    .map_err(remote("start chat"))?;
                let owner = item.posted_by().user_id;
                let mut participants: Vec<Uuid> = vec![user.user_id];
                if owner != user.user_id {
                    participants.push(owner);
                }
                self.svc
                    .add_chat_participants(chat.chatid, &participants)
                    .await
                    .map_err(remote("start chat"))?;
                chat
            }
        };

        let rows = self
            .svc
            .list_chat_messages_for(chat.chatid)
            .await
            .map_err(remote("load messages"))?;
        let snapshot = self.store.snapshot();
        let messages: Vec<ChatMessage> = rows
            .into_iter()
            .filter_map(|row| {
                let sender = snapshot.user_by_id(row.user_id)?.clone();
                Some(ChatMessage {
                    id: row.messageid,
                    text: row.text,
                    sender,
                    timestamp: row.createdat,
                })
            })
            .collect();

        let open = OpenChat {
            chat_id: chat.chatid,
            item: item.clone(),
            messages,
        };
        self.store.update(|s| {
            s.user_chat_ids.insert(chat.chatid);
            s.open_chat = Some(open.clone());
        });
        Ok(open)
    }

    /// Reopen a conversation from the recent list.
    pub async fn open_recent_chat(&self, recent: &RecentChat) -> MutationResult<OpenChat> {
        self.open_item_chat(&recent.item).await
    }

    pub fn close_chat(&self) {
        self.store.update(|s| s.open_chat = None);
    }
}
