//! Row types for every table the service exposes. Field names follow the
//! table columns exactly; the application maps them into view entities.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRow {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub avatarurl: String,
    pub bio: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostRow {
    pub postid: Uuid,
    pub text: String,
    pub imageurl: Option<String>,
    pub user_id: Uuid,
    pub createdat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CommentRow {
    pub commentid: Uuid,
    pub postid: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub createdat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LikeRow {
    pub postid: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChallengeRow {
    pub challengeid: Uuid,
    pub title: String,
    pub description: String,
    pub detaileddescription: String,
    pub industry: String,
    pub rewardtype: String,
    pub rewardvalue: String,
    pub user_id: Uuid,
    pub createdat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdeaRow {
    pub ideaid: Uuid,
    pub title: String,
    pub summary: String,
    pub detaileddescription: String,
    pub rewardtype: String,
    pub rewardvalue: String,
    pub user_id: Uuid,
    pub createdat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollRow {
    pub pollid: Uuid,
    pub postid: Uuid,
    pub durationdays: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollOptionRow {
    pub optionid: Uuid,
    pub pollid: Uuid,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PollVoteRow {
    pub pollid: Uuid,
    pub optionid: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatRow {
    pub chatid: Uuid,
    pub itemid: Uuid,
    pub itemtype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatParticipantRow {
    pub chatid: Uuid,
    pub user_id: Uuid,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessageRow {
    pub messageid: Uuid,
    pub chatid: Uuid,
    pub user_id: Uuid,
    pub text: String,
    pub createdat: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NotificationRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub actor_id: Uuid,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub link_to: Option<String>,
    pub createdat: i64,
    pub seen: bool,
}

/// Upsert payload for `users`, keyed on email.
#[derive(Debug, Clone)]
pub struct UserUpsert {
    pub name: String,
    pub email: String,
    pub avatarurl: String,
    pub bio: Option<String>,
}

/// Profile fields a user may edit.
#[derive(Debug, Clone)]
pub struct ProfileUpdate {
    pub name: String,
    pub bio: String,
    pub avatarurl: String,
}

#[derive(Debug, Clone)]
pub struct NewPost {
    pub text: String,
    pub imageurl: Option<String>,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub postid: Uuid,
    pub user_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct NewChallenge {
    pub title: String,
    pub description: String,
    pub detaileddescription: String,
    pub industry: String,
    pub rewardtype: String,
    pub rewardvalue: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewIdea {
    pub title: String,
    pub summary: String,
    pub detaileddescription: String,
    pub rewardtype: String,
    pub rewardvalue: String,
    pub user_id: Uuid,
}

#[derive(Debug, Clone)]
pub struct NewPoll {
    pub postid: Uuid,
    pub durationdays: i64,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewChatMessage {
    pub chatid: Uuid,
    pub user_id: Uuid,
    pub text: String,
}

#[derive(Debug, Clone)]
pub struct NewNotification {
    pub user_id: Uuid,
    pub actor_id: Uuid,
    pub kind: String,
    pub message: String,
    pub link_to: Option<String>,
}
