//! User-initiated writes. Additive actions apply optimistically: the local
//! view changes first under a placeholder id, the remote write confirms or
//! rolls it back, and the placeholder doubles as the correlation id when the
//! confirmed row replaces it. Destructive actions write first and only
//! remove locally on success.

use std::collections::HashSet;

use datasvc::rows::{
    NewChallenge, NewChatMessage, NewComment, NewIdea, NewPoll, NewPost, ProfileUpdate,
};
use datasvc::DataService;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::App;
use crate::model::{
    ChatMessage, Comment, Idea, Poll, PollOption, Post, Problem, Reward, User,
};

#[derive(Debug, thiserror::Error)]
pub enum MutationError {
    #[error("Please log in first.")]
    NotLoggedIn,
    #[error("Please fill out all required fields.")]
    MissingFields,
    #[error("No conversation is open.")]
    NoOpenChat,
    #[error("That content no longer exists.")]
    UnknownTarget,
    #[error("failed to {action}: {source}")]
    Remote {
        action: &'static str,
        #[source]
        source: datasvc::Error,
    },
}

pub type MutationResult<T> = std::result::Result<T, MutationError>;

fn remote(action: &'static str) -> impl FnOnce(datasvc::Error) -> MutationError {
    move |source| MutationError::Remote { action, source }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

/// Yes/no prompt the view shows before a destructive write goes out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub title: &'static str,
    pub message: &'static str,
}

impl Confirmation {
    pub fn delete_post() -> Self {
        Self {
            title: "Delete Post",
            message: "Are you sure you want to permanently delete this post?",
        }
    }

    pub fn delete_comment() -> Self {
        Self {
            title: "Delete Comment",
            message: "Are you sure you want to permanently delete this comment?",
        }
    }

    pub fn delete_challenge() -> Self {
        Self {
            title: "Delete Challenge",
            message: "Are you sure you want to permanently delete this challenge?",
        }
    }

    pub fn delete_idea() -> Self {
        Self {
            title: "Delete Idea",
            message: "Are you sure you want to permanently delete this idea?",
        }
    }
}

/// Input for a new feed post.
#[derive(Debug, Clone, Default)]
pub struct NewPostInput {
    pub text: String,
    pub image_url: Option<String>,
    pub poll: Option<PollInput>,
}

#[derive(Debug, Clone)]
pub struct PollInput {
    pub duration_days: i64,
    pub options: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NewChallengeInput {
    pub title: String,
    pub description: String,
    pub detailed_description: String,
    pub industry: String,
    pub reward: Reward,
}

#[derive(Debug, Clone)]
pub struct NewIdeaInput {
    pub title: String,
    pub summary: String,
    pub detailed_description: String,
    pub reward: Reward,
}

impl<S: DataService> App<S> {
    pub(crate) fn require_session(&self) -> MutationResult<User> {
        self.store
            .snapshot()
            .session
            .clone()
            .ok_or(MutationError::NotLoggedIn)
    }

    /// Flip the session user's like on a post. Optimistic both ways.
    pub async fn toggle_like(&self, post_id: Uuid) -> MutationResult<()> {
        let user = self.require_session()?;
        let liked = self
            .store
            .snapshot()
            .post_by_id(post_id)
            .ok_or(MutationError::UnknownTarget)?
            .likes
            .contains(&user.user_id);

        let flip = |s: &mut crate::state::AppState, undo: bool| {
            if let Some(p) = s.post_mut(post_id) {
                if liked != undo {
                    p.likes.remove(&user.user_id);
                } else {
                    p.likes.insert(user.user_id);
                }
            }
        };
        self.store.update(|s| flip(s, false));

        let res = if liked {
            self.svc.delete_like(post_id, user.user_id).await
        } else {
            self.svc.insert_like(post_id, user.user_id).await.map(|_| ())
        };
        if let Err(source) = res {
            self.store.update(|s| flip(s, true));
            return Err(MutationError::Remote {
                action: if liked { "remove like" } else { "like post" },
                source,
            });
        }
        Ok(())
    }

    pub async fn add_comment(&self, post_id: Uuid, text: &str) -> MutationResult<Comment> {
        let user = self.require_session()?;
        if text.trim().is_empty() {
            return Err(MutationError::MissingFields);
        }
        if self.store.snapshot().post_by_id(post_id).is_none() {
            return Err(MutationError::UnknownTarget);
        }

        let placeholder = Comment {
            id: Uuid::new_v4(),
            text: text.into(),
            posted_by: user.clone(),
            created_at: now(),
        };
        let placeholder_id = placeholder.id;
        self.store.update(|s| {
            if let Some(p) = s.post_mut(post_id) {
                p.comments.push(placeholder);
                p.comments.sort_by_key(|c| c.created_at);
            }
        });

        match self
            .svc
            .insert_comment(NewComment {
                postid: post_id,
                user_id: user.user_id,
                text: text.into(),
            })
            .await
        {
            Ok(row) => {
                let confirmed = Comment {
                    id: row.commentid,
                    text: row.text,
                    posted_by: user,
                    created_at: row.createdat,
                };
                self.store.update(|s| {
                    if let Some(p) = s.post_mut(post_id) {
                        p.comments.retain(|c| c.id != placeholder_id);
                        if p.comments.iter().all(|c| c.id != confirmed.id) {
                            p.comments.push(confirmed.clone());
                        }
                        p.comments.sort_by_key(|c| c.created_at);
                    }
                });
                Ok(confirmed)
            }
            Err(source) => {
                self.store.update(|s| {
                    if let Some(p) = s.post_mut(post_id) {
                        p.comments.retain(|c| c.id != placeholder_id);
                    }
                });
                Err(MutationError::Remote {
                    action: "add comment",
                    source,
                })
            }
        }
    }

    pub async fn delete_comment(&self, post_id: Uuid, comment_id: Uuid) -> MutationResult<()> {
        self.require_session()?;
        self.svc
            .delete_comment(comment_id)
            .await
            .map_err(remote("delete comment"))?;
        self.store.update(|s| {
            if let Some(p) = s.post_mut(post_id) {
                p.comments.retain(|c| c.id != comment_id);
            }
        });
        Ok(())
    }

    /// Cast (or move) the session user's vote. The whole poll is backed up
    /// so a failed write restores exactly the previous ballot.
    pub async fn vote_on_poll(&self, post_id: Uuid, option_id: Uuid) -> MutationResult<()> {
        let user = self.require_session()?;
        let snapshot = self.store.snapshot();
        let poll = snapshot
            .post_by_id(post_id)
            .and_then(|p| p.poll.as_ref())
            .ok_or(MutationError::UnknownTarget)?;
        if !poll.options.iter().any(|o| o.id == option_id) {
            return Err(MutationError::UnknownTarget);
        }
        let backup = poll.clone();
        let poll_id = poll.id;

        self.store.update(|s| {
            if let Some(poll) = s.post_mut(post_id).and_then(|p| p.poll.as_mut()) {
                for option in &mut poll.options {
                    if option.id == option_id {
                        option.votes.insert(user.user_id);
                    } else {
                        option.votes.remove(&user.user_id);
                    }
                }
            }
        });

        if let Err(source) = self
            .svc
            .upsert_poll_vote(poll_id, option_id, user.user_id)
            .await
        {
            self.store.update(|s| {
                if let Some(p) = s.post_mut(post_id) {
                    p.poll = Some(backup);
                }
            });
            return Err(MutationError::Remote {
                action: "vote",
                source,
            });
        }
        Ok(())
    }

    /// Send a message into the open conversation.
    pub async fn send_chat_message(&self, text: &str) -> MutationResult<ChatMessage> {
        let user = self.require_session()?;
        if text.trim().is_empty() {
            return Err(MutationError::MissingFields);
        }
        let chat_id = self
            .store
            .snapshot()
            .open_chat
            .as_ref()
            .map(|c| c.chat_id)
            .ok_or(MutationError::NoOpenChat)?;

        let placeholder = ChatMessage {
            id: Uuid::new_v4(),
            text: text.into(),
            sender: user.clone(),
            timestamp: now(),
        };
        let placeholder_id = placeholder.id;
        self.store.update(|s| {
            if let Some(chat) = s.open_chat.as_mut().filter(|c| c.chat_id == chat_id) {
                chat.messages.push(placeholder);
            }
        });

        match self
            .svc
            .insert_chat_message(NewChatMessage {
                chatid: chat_id,
                user_id: user.user_id,
                text: text.into(),
            })
            .await
        {
            Ok(row) => {
                let confirmed = ChatMessage {
                    id: row.messageid,
                    text: row.text,
                    sender: user,
                    timestamp: row.createdat,
                };
                self.store.update(|s| {
                    if let Some(chat) = s.open_chat.as_mut().filter(|c| c.chat_id == chat_id) {
                        chat.messages.retain(|m| m.id != placeholder_id);
                        if chat.messages.iter().all(|m| m.id != confirmed.id) {
                            chat.messages.push(confirmed.clone());
                        }
                    }
                    s.touch_recent_chat(chat_id, &confirmed.text, confirmed.timestamp);
                });
                Ok(confirmed)
            }
            Err(source) => {
                self.store.update(|s| {
                    if let Some(chat) = s.open_chat.as_mut().filter(|c| c.chat_id == chat_id) {
                        chat.messages.retain(|m| m.id != placeholder_id);
                    }
                });
                Err(MutationError::Remote {
                    action: "send message",
                    source,
                })
            }
        }
    }

    /// Create a feed post, optionally with a poll. A failed poll write keeps
    /// the post; the poll is dropped with a warning.
    pub async fn create_post(&self, input: NewPostInput) -> MutationResult<Post> {
        let user = self.require_session()?;
        if input.text.trim().is_empty() {
            return Err(MutationError::MissingFields);
        }

        let placeholder_id = Uuid::new_v4();
        let placeholder_poll = input.poll.as_ref().map(|p| Poll {
            id: Uuid::new_v4(),
            options: p
                .options
                .iter()
                .map(|text| PollOption {
                    id: Uuid::new_v4(),
                    text: text.clone(),
                    votes: HashSet::new(),
                })
                .collect(),
        });
        self.store.update(|s| {
            s.posts.insert(
                0,
                Post {
                    id: placeholder_id,
                    text: input.text.clone(),
                    image_url: input.image_url.clone(),
                    poll: placeholder_poll,
                    posted_by: user.clone(),
                    created_at: now(),
                    likes: HashSet::new(),
                    comments: Vec::new(),
                },
            );
            s.sort_posts();
        });

        let row = match self
            .svc
            .insert_post(NewPost {
                text: input.text.clone(),
                imageurl: input.image_url.clone(),
                user_id: user.user_id,
            })
            .await
        {
            Ok(row) => row,
            Err(source) => {
                self.store.update(|s| s.posts.retain(|p| p.id != placeholder_id));
                return Err(MutationError::Remote {
                    action: "post",
                    source,
                });
            }
        };

        let poll = match input.poll {
            Some(p) => match self
                .svc
                .create_poll(NewPoll {
                    postid: row.postid,
                    durationdays: p.duration_days,
                    options: p.options,
                })
                .await
            {
                Ok((poll_row, option_rows)) => Some(Poll {
                    id: poll_row.pollid,
                    options: option_rows
                        .into_iter()
                        .map(|o| PollOption {
                            id: o.optionid,
                            text: o.text,
                            votes: HashSet::new(),
                        })
                        .collect(),
                }),
                Err(err) => {
                    tracing::warn!(%err, post = %row.postid, "poll creation failed, post kept without it");
                    None
                }
            },
            None => None,
        };

        let confirmed = Post {
            id: row.postid,
            text: row.text,
            image_url: row.imageurl,
            poll,
            posted_by: user,
            created_at: row.createdat,
            likes: HashSet::new(),
            comments: Vec::new(),
        };
        self.store.update(|s| {
            s.posts.retain(|p| p.id != placeholder_id);
            if s.post_by_id(confirmed.id).is_none() {
                s.posts.insert(0, confirmed.clone());
            }
            s.sort_posts();
        });
        Ok(confirmed)
    }

    pub async fn create_challenge(&self, input: NewChallengeInput) -> MutationResult<Problem> {
        let user = self.require_session()?;
        let required = [
            &input.title,
            &input.description,
            &input.detailed_description,
            &input.industry,
            &input.reward.value,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(MutationError::MissingFields);
        }

        let placeholder_id = Uuid::new_v4();
        self.store.update(|s| {
            s.problems.insert(
                0,
                Problem {
                    id: placeholder_id,
                    title: input.title.clone(),
                    description: input.description.clone(),
                    detailed_description: input.detailed_description.clone(),
                    industry: input.industry.clone(),
                    reward: input.reward.clone(),
                    posted_by: user.clone(),
                    created_at: now(),
                },
            );
        });

        match self
            .svc
            .insert_challenge(NewChallenge {
                title: input.title,
                description: input.description,
                detaileddescription: input.detailed_description,
                industry: input.industry,
                rewardtype: input.reward.kind.as_str().into(),
                rewardvalue: input.reward.value,
                user_id: user.user_id,
            })
            .await
        {
            Ok(row) => {
                let confirmed = Problem::from_row(row, user);
                self.store.update(|s| {
                    s.problems.retain(|p| p.id != placeholder_id);
                    if !s.problems.iter().any(|p| p.id == confirmed.id) {
                        s.problems.insert(0, confirmed.clone());
                    }
                    s.problems.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                });
                Ok(confirmed)
            }
            Err(source) => {
                self.store
                    .update(|s| s.problems.retain(|p| p.id != placeholder_id));
                Err(MutationError::Remote {
                    action: "post challenge",
                    source,
                })
            }
        }
    }

    pub async fn create_idea(&self, input: NewIdeaInput) -> MutationResult<Idea> {
        let user = self.require_session()?;
        let required = [
            &input.title,
            &input.summary,
            &input.detailed_description,
            &input.reward.value,
        ];
        if required.iter().any(|f| f.trim().is_empty()) {
            return Err(MutationError::MissingFields);
        }

        let placeholder_id = Uuid::new_v4();
        self.store.update(|s| {
            s.ideas.insert(
                0,
                Idea {
                    id: placeholder_id,
                    title: input.title.clone(),
                    summary: input.summary.clone(),
                    detailed_description: input.detailed_description.clone(),
                    reward: input.reward.clone(),
                    posted_by: user.clone(),
                    created_at: now(),
                },
            );
        });

        match self
            .svc
            .insert_idea(NewIdea {
                title: input.title,
                summary: input.summary,
                detaileddescription: input.detailed_description,
                rewardtype: input.reward.kind.as_str().into(),
                rewardvalue: input.reward.value,
                user_id: user.user_id,
            })
            .await
        {
            Ok(row) => {
                let confirmed = Idea::from_row(row, user);
                self.store.update(|s| {
                    s.ideas.retain(|i| i.id != placeholder_id);
                    if !s.ideas.iter().any(|i| i.id == confirmed.id) {
                        s.ideas.insert(0, confirmed.clone());
                    }
                    s.ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
                });
                Ok(confirmed)
            }
            Err(source) => {
                self.store.update(|s| s.ideas.retain(|i| i.id != placeholder_id));
                Err(MutationError::Remote {
                    action: "post idea",
                    source,
                })
            }
        }
    }

    pub async fn delete_post(&self, post_id: Uuid) -> MutationResult<()> {
        self.require_session()?;
        self.svc
            .delete_post(post_id)
            .await
            .map_err(remote("delete post"))?;
        self.store.update(|s| s.posts.retain(|p| p.id != post_id));
        Ok(())
    }

    pub async fn delete_challenge(&self, challenge_id: Uuid) -> MutationResult<()> {
        self.require_session()?;
        self.svc
            .delete_challenge(challenge_id)
            .await
            .map_err(remote("delete challenge"))?;
        self.store
            .update(|s| s.problems.retain(|p| p.id != challenge_id));
        Ok(())
    }

    pub async fn delete_idea(&self, idea_id: Uuid) -> MutationResult<()> {
        self.require_session()?;
        self.svc
            .delete_idea(idea_id)
            .await
            .map_err(remote("delete idea"))?;
        self.store.update(|s| s.ideas.retain(|i| i.id != idea_id));
        Ok(())
    }

    /// Edit the session user's profile. Optimistic; the persisted session
    /// blob is rewritten once the service confirms.
    pub async fn update_profile(
        &self,
        name: &str,
        bio: &str,
        avatar_url: &str,
    ) -> MutationResult<User> {
        let backup = self.require_session()?;
        if name.trim().is_empty() {
            return Err(MutationError::MissingFields);
        }
        let optimistic = User {
            name: name.into(),
            bio: Some(bio.into()),
            avatar_url: avatar_url.into(),
            ..backup.clone()
        };
        let replace = |s: &mut crate::state::AppState, user: &User| {
            if let Some(existing) = s.users.iter_mut().find(|u| u.user_id == user.user_id) {
                *existing = user.clone();
            }
            s.session = Some(user.clone());
        };
        self.store.update(|s| replace(s, &optimistic));

        match self
            .svc
            .update_user(
                backup.user_id,
                ProfileUpdate {
                    name: name.into(),
                    bio: bio.into(),
                    avatarurl: avatar_url.into(),
                },
            )
            .await
        {
            Ok(row) => {
                let confirmed = User::from(row);
                self.store.update(|s| replace(s, &confirmed));
                if let Err(err) = self.session_file.save(&confirmed).await {
                    tracing::warn!(%err, "failed to persist updated session");
                }
                Ok(confirmed)
            }
            Err(source) => {
                self.store.update(|s| replace(s, &backup));
                Err(MutationError::Remote {
                    action: "update profile",
                    source,
                })
            }
        }
    }

    /// Mark every notification read. The local flip is what the user sees;
    /// the remote write is best effort.
    pub async fn mark_notifications_seen(&self) -> MutationResult<()> {
        let user = self.require_session()?;
        self.store.update(|s| {
            for n in &mut s.notifications {
                n.seen = true;
            }
        });
        if let Err(err) = self.svc.mark_notifications_seen(user.user_id).await {
            tracing::warn!(%err, "failed to mark notifications seen remotely");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RewardType;
    use datasvc::rows::UserUpsert;
    use datasvc::SqliteService;
    use std::sync::Arc;

    async fn app_with_user() -> (App<SqliteService>, User, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(SqliteService::in_memory().unwrap());
        let row = svc
            .upsert_user(UserUpsert {
                name: "Asha".into(),
                email: "asha@example.com".into(),
                avatarurl: String::new(),
                bio: None,
            })
            .await
            .unwrap();
        let user = User::from(row);
        let app = App::new(svc, dir.path().join("session.json"));
        app.initial_load().await.unwrap();
        app.store.update(|s| s.session = Some(user.clone()));
        (app, user, dir)
    }

    #[tokio::test]
    async fn like_toggle_is_a_parity_flip() {
        let (app, user, _dir) = app_with_user().await;
        let post = app
            .create_post(NewPostInput {
                text: "hello".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        app.toggle_like(post.id).await.unwrap();
        assert!(app.snapshot().post_by_id(post.id).unwrap().likes.contains(&user.user_id));
        app.toggle_like(post.id).await.unwrap();
        assert!(app.snapshot().post_by_id(post.id).unwrap().likes.is_empty());
    }

    #[tokio::test]
    async fn failed_like_rolls_back() {
        let (app, user, _dir) = app_with_user().await;
        let post = app
            .create_post(NewPostInput {
                text: "hello".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        // deleted remotely but still in the local view
        app.svc.delete_post(post.id).await.unwrap();

        let err = app.toggle_like(post.id).await.unwrap_err();
        assert!(matches!(err, MutationError::Remote { action: "like post", .. }));
        assert!(app.snapshot().post_by_id(post.id).unwrap().likes.is_empty());
        let _ = user;
    }

    #[tokio::test]
    async fn comment_placeholder_is_replaced_by_confirmed_row() {
        let (app, _user, _dir) = app_with_user().await;
        let post = app
            .create_post(NewPostInput {
                text: "hello".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        let confirmed = app.add_comment(post.id, "nice").await.unwrap();
        let comments = app
            .snapshot()
            .post_by_id(post.id)
            .unwrap()
            .comments
            .clone();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, confirmed.id);
    }

    #[tokio::test]
    async fn failed_comment_disappears() {
        let (app, _user, _dir) = app_with_user().await;
        let post = app
            .create_post(NewPostInput {
                text: "hello".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        app.svc.delete_post(post.id).await.unwrap();

        assert!(app.add_comment(post.id, "nice").await.is_err());
        assert!(app.snapshot().post_by_id(post.id).unwrap().comments.is_empty());
    }

    #[tokio::test]
    async fn voting_twice_keeps_one_ballot() {
        let (app, user, _dir) = app_with_user().await;
        let post = app
            .create_post(NewPostInput {
                text: "pick one".into(),
                image_url: None,
                poll: Some(PollInput {
                    duration_days: 3,
                    options: vec!["Yes".into(), "No".into()],
                }),
            })
            .await
            .unwrap();
        let poll = post.poll.unwrap();

        app.vote_on_poll(post.id, poll.options[0].id).await.unwrap();
        app.vote_on_poll(post.id, poll.options[1].id).await.unwrap();

        let state = app.snapshot();
        let poll = state.post_by_id(post.id).unwrap().poll.as_ref().unwrap();
        assert_eq!(poll.total_votes(), 1);
        assert!(poll.options[1].votes.contains(&user.user_id));
    }

    #[tokio::test]
    async fn challenge_requires_all_fields() {
        let (app, _user, _dir) = app_with_user().await;
        let err = app
            .create_challenge(NewChallengeInput {
                title: "Fix logistics".into(),
                description: String::new(),
                detailed_description: "dd".into(),
                industry: "retail".into(),
                reward: Reward {
                    kind: RewardType::Money,
                    value: "5000".into(),
                },
            })
            .await
            .unwrap_err();
        assert!(matches!(err, MutationError::MissingFields));
        assert!(app.snapshot().problems.is_empty());
    }

    #[tokio::test]
    async fn delete_is_remote_first() {
        let (app, _user, _dir) = app_with_user().await;
        let idea = app
            .create_idea(NewIdeaInput {
                title: "Solar kiosks".into(),
                summary: "s".into(),
                detailed_description: "dd".into(),
                reward: Reward {
                    kind: RewardType::Equity,
                    value: "5%".into(),
                },
            })
            .await
            .unwrap();
        app.delete_idea(idea.id).await.unwrap();
        assert!(app.snapshot().ideas.is_empty());
        assert!(app.svc.list_ideas().await.unwrap().is_empty());

        // a second delete fails remotely and must not touch local state
        assert!(app.delete_idea(idea.id).await.is_err());
    }

    #[tokio::test]
    async fn profile_update_confirms_and_persists() {
        let (app, user, _dir) = app_with_user().await;
        let updated = app
            .update_profile("Asha K", "founder", "https://img.example/a.png")
            .await
            .unwrap();
        assert_eq!(updated.user_id, user.user_id);
        assert_eq!(updated.bio.as_deref(), Some("founder"));
        assert_eq!(app.current_user().unwrap(), updated);
        assert_eq!(
            app.session_file.load_email().await.as_deref(),
            Some("asha@example.com")
        );
    }

    #[tokio::test]
    async fn mutations_require_a_session() {
        let (app, _user, _dir) = app_with_user().await;
        app.store.update(|s| s.session = None);
        assert!(matches!(
            app.toggle_like(Uuid::new_v4()).await.unwrap_err(),
            MutationError::NotLoggedIn
        ));
        assert!(matches!(
            app.create_post(NewPostInput {
                text: "x".into(),
                ..Default::default()
            })
            .await
            .unwrap_err(),
            MutationError::NotLoggedIn
        ));
    }

    #[tokio::test]
    async fn mark_seen_flips_local_flags() {
        let (app, user, _dir) = app_with_user().await;
        app.svc
            .insert_notification(datasvc::rows::NewNotification {
                user_id: user.user_id,
                actor_id: user.user_id,
                kind: "like".into(),
                message: "m".into(),
                link_to: None,
            })
            .await
            .unwrap();
        app.load_user_data(&user).await.unwrap();
        assert!(!app.snapshot().notifications[0].seen);

        app.mark_notifications_seen().await.unwrap();
        assert!(app.snapshot().notifications[0].seen);
        let remote = app
            .svc
            .list_notifications_for(user.user_id, 20)
            .await
            .unwrap();
        assert!(remote[0].seen);
    }
}
