//! Changefeed events. The service publishes one [`Change`] per committed
//! write; subscribers receive the changed row's image (before-image for
//! deletes, after-image otherwise).

use crate::rows::{
    ChallengeRow, ChatMessageRow, ChatParticipantRow, ChatRow, CommentRow, IdeaRow, LikeRow,
    NotificationRow, PollVoteRow, PostRow, UserRow,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    Inserted(T),
    Updated(T),
    Deleted(T),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
    Users(Event<UserRow>),
    Posts(Event<PostRow>),
    Comments(Event<CommentRow>),
    Likes(Event<LikeRow>),
    Challenges(Event<ChallengeRow>),
    Ideas(Event<IdeaRow>),
    PollVotes(Event<PollVoteRow>),
    Chats(Event<ChatRow>),
    ChatParticipants(Event<ChatParticipantRow>),
    ChatMessages(Event<ChatMessageRow>),
    Notifications(Event<NotificationRow>),
}
