use async_trait::async_trait;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::Result;
use crate::event::Change;
use crate::rows::*;

/// Contract of the hosted data service: read-all per table, writes per
/// entity and a changefeed subscription. The application never assumes more
/// than this; identity, uniqueness and referential constraints are enforced
/// behind this trait, not in front of it.
#[async_trait]
pub trait DataService: Send + Sync {
    // users
    async fn list_users(&self) -> Result<Vec<UserRow>>;
    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>>;
    /// Insert or update a user keyed on email.
    async fn upsert_user(&self, up: UserUpsert) -> Result<UserRow>;
    async fn update_user(&self, id: Uuid, update: ProfileUpdate) -> Result<UserRow>;

    // posts
    async fn list_posts(&self) -> Result<Vec<PostRow>>;
    async fn insert_post(&self, new: NewPost) -> Result<PostRow>;
    async fn delete_post(&self, postid: Uuid) -> Result<()>;

    // comments
    async fn list_comments(&self) -> Result<Vec<CommentRow>>;
    async fn insert_comment(&self, new: NewComment) -> Result<CommentRow>;
    async fn delete_comment(&self, commentid: Uuid) -> Result<()>;

    // likes
    async fn list_likes(&self) -> Result<Vec<LikeRow>>;
    async fn insert_like(&self, postid: Uuid, user_id: Uuid) -> Result<LikeRow>;
    async fn delete_like(&self, postid: Uuid, user_id: Uuid) -> Result<()>;

    // challenges
    async fn list_challenges(&self) -> Result<Vec<ChallengeRow>>;
    async fn insert_challenge(&self, new: NewChallenge) -> Result<ChallengeRow>;
    async fn delete_challenge(&self, challengeid: Uuid) -> Result<()>;

    // ideas
    async fn list_ideas(&self) -> Result<Vec<IdeaRow>>;
    async fn insert_idea(&self, new: NewIdea) -> Result<IdeaRow>;
    async fn delete_idea(&self, ideaid: Uuid) -> Result<()>;

    // polls
    async fn list_polls(&self) -> Result<Vec<PollRow>>;
    async fn list_poll_options(&self) -> Result<Vec<PollOptionRow>>;
    async fn list_poll_votes(&self) -> Result<Vec<PollVoteRow>>;
    async fn create_poll(&self, new: NewPoll) -> Result<(PollRow, Vec<PollOptionRow>)>;
    /// Upsert keyed on (pollid, user_id): a second vote by the same voter
    /// replaces the previous one.
    async fn upsert_poll_vote(
        &self,
        pollid: Uuid,
        optionid: Uuid,
        user_id: Uuid,
    ) -> Result<PollVoteRow>;

    // chats
    async fn list_chats(&self) -> Result<Vec<ChatRow>>;
    async fn get_chat(&self, chatid: Uuid) -> Result<Option<ChatRow>>;
    async fn find_chat_by_item(&self, itemid: Uuid) -> Result<Option<ChatRow>>;
    /// Create the chat for an item, or return the existing one if another
    /// initiator got there first.
    async fn create_chat(&self, itemid: Uuid, itemtype: &str) -> Result<ChatRow>;
    async fn list_chat_participants(&self) -> Result<Vec<ChatParticipantRow>>;
    async fn add_chat_participants(&self, chatid: Uuid, user_ids: &[Uuid]) -> Result<()>;
    async fn list_chat_messages(&self) -> Result<Vec<ChatMessageRow>>;
    /// Messages for one chat, ascending by creation time.
    async fn list_chat_messages_for(&self, chatid: Uuid) -> Result<Vec<ChatMessageRow>>;
    async fn insert_chat_message(&self, new: NewChatMessage) -> Result<ChatMessageRow>;

    // notifications
    async fn list_notifications_for(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationRow>>;
    async fn insert_notification(&self, new: NewNotification) -> Result<NotificationRow>;
    async fn mark_notifications_seen(&self, user_id: Uuid) -> Result<()>;

    /// Subscribe to the changefeed. Events committed before the call are not
    /// replayed.
    fn subscribe(&self) -> broadcast::Receiver<Change>;
}
