//! Full load on startup and per-user load on sign-in. All tables for a phase
//! are fetched concurrently; one failure aborts the whole phase so no partial
//! state is ever published.

use std::collections::{HashMap, HashSet};

use anyhow::Context;
use datasvc::rows::ChatMessageRow;
use datasvc::DataService;
use uuid::Uuid;

use crate::app::App;
use crate::model::{
    AppNotification, Comment, Idea, Poll, PollOption, Post, Problem, RecentChat, User,
};

impl<S: DataService> App<S> {
    /// Load every public table, join rows into view entities and publish all
    /// collections in one store update. Then restore the persisted session,
    /// which needs the committed user list.
    pub async fn initial_load(&self) -> anyhow::Result<()> {
        let (users, challenges, ideas, posts, comments, likes, polls, options, votes) =
            tokio::try_join!(
                self.svc.list_users(),
                self.svc.list_challenges(),
                self.svc.list_ideas(),
                self.svc.list_posts(),
                self.svc.list_comments(),
                self.svc.list_likes(),
                self.svc.list_polls(),
                self.svc.list_poll_options(),
                self.svc.list_poll_votes(),
            )
            .context("initial load failed")?;

        let users: Vec<User> = users.into_iter().map(User::from).collect();
        let by_id: HashMap<Uuid, User> =
            users.iter().map(|u| (u.user_id, u.clone())).collect();

        let mut comments_by_post: HashMap<Uuid, Vec<Comment>> = HashMap::new();
        for row in comments {
            let Some(author) = by_id.get(&row.user_id) else {
                tracing::debug!(comment = %row.commentid, "dropping comment with unknown author");
                continue;
            };
            comments_by_post.entry(row.postid).or_default().push(Comment {
                id: row.commentid,
                text: row.text,
                posted_by: author.clone(),
                created_at: row.createdat,
            });
        }
        for list in comments_by_post.values_mut() {
            list.sort_by_key(|c| c.created_at);
        }

        let mut likes_by_post: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for row in likes {
            likes_by_post.entry(row.postid).or_default().insert(row.user_id);
        }

        let mut votes_by_option: HashMap<Uuid, HashSet<Uuid>> = HashMap::new();
        for row in votes {
            votes_by_option
                .entry(row.optionid)
                .or_default()
                .insert(row.user_id);
        }
        let mut options_by_poll: HashMap<Uuid, Vec<PollOption>> = HashMap::new();
        for row in options {
            options_by_poll.entry(row.pollid).or_default().push(PollOption {
                votes: votes_by_option.remove(&row.optionid).unwrap_or_default(),
                id: row.optionid,
                text: row.text,
            });
        }
        let mut polls_by_post: HashMap<Uuid, Poll> = HashMap::new();
        for row in polls {
            polls_by_post.insert(
                row.postid,
                Poll {
                    id: row.pollid,
                    options: options_by_poll.remove(&row.pollid).unwrap_or_default(),
                },
            );
        }

        let mut view_posts = Vec::new();
        for row in posts {
            let Some(author) = by_id.get(&row.user_id) else {
                tracing::debug!(post = %row.postid, "dropping post with unknown author");
                continue;
            };
            view_posts.push(Post {
                id: row.postid,
                text: row.text,
                image_url: row.imageurl,
                poll: polls_by_post.remove(&row.postid),
                posted_by: author.clone(),
                created_at: row.createdat,
                likes: likes_by_post.remove(&row.postid).unwrap_or_default(),
                comments: comments_by_post.remove(&row.postid).unwrap_or_default(),
            });
        }
        view_posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut problems = Vec::new();
        for row in challenges {
            let Some(author) = by_id.get(&row.user_id) else {
                tracing::debug!(challenge = %row.challengeid, "dropping challenge with unknown author");
                continue;
            };
            problems.push(Problem::from_row(row, author.clone()));
        }
        problems.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let mut view_ideas = Vec::new();
        for row in ideas {
            let Some(author) = by_id.get(&row.user_id) else {
                tracing::debug!(idea = %row.ideaid, "dropping idea with unknown author");
                continue;
            };
            view_ideas.push(Idea::from_row(row, author.clone()));
        }
        view_ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        self.store.update(|s| {
            s.users = users;
            s.posts = view_posts;
            s.problems = problems;
            s.ideas = view_ideas;
        });

        if let Some(user) = self.restore_session().await {
            self.load_user_data(&user).await?;
        }
        Ok(())
    }

    /// Per-user collections: notifications, chat memberships and the
    /// recent-conversations list. Runs after sign-in and after a restored
    /// session.
    pub async fn load_user_data(&self, user: &User) -> anyhow::Result<()> {
        let (notifications, chats, participants, messages) = tokio::try_join!(
            self.svc.list_notifications_for(user.user_id, 20),
            self.svc.list_chats(),
            self.svc.list_chat_participants(),
            self.svc.list_chat_messages(),
        )
        .context("user data load failed")?;

        let snapshot = self.store.snapshot();

        let notifications: Vec<AppNotification> = notifications
            .into_iter()
            .filter_map(|row| {
                let actor = snapshot.user_by_id(row.actor_id)?.clone();
                Some(AppNotification {
                    id: row.id,
                    actor,
                    message: row.message,
                    created_at: row.createdat,
                    seen: row.seen,
                })
            })
            .collect();

        let chat_ids: HashSet<Uuid> = participants
            .iter()
            .filter(|p| p.user_id == user.user_id)
            .map(|p| p.chatid)
            .collect();

        let mut last_by_chat: HashMap<Uuid, &ChatMessageRow> = HashMap::new();
        let mut seen_message_ids = HashSet::new();
        for msg in &messages {
            if !chat_ids.contains(&msg.chatid) {
                continue;
            }
            seen_message_ids.insert(msg.messageid);
            let newer = last_by_chat
                .get(&msg.chatid)
                .map_or(true, |m| msg.createdat > m.createdat);
            if newer {
                last_by_chat.insert(msg.chatid, msg);
            }
        }

        let mut recent = Vec::new();
        for chat in chats.iter().filter(|c| chat_ids.contains(&c.chatid)) {
            // Chats with no counterparty row are self-chats: the item owner
            // opened their own item, so the viewer fills both roles.
            let other = match participants
                .iter()
                .find(|p| p.chatid == chat.chatid && p.user_id != user.user_id)
            {
                Some(p) => match snapshot.user_by_id(p.user_id) {
                    Some(u) => u.clone(),
                    None => {
                        tracing::debug!(chat = %chat.chatid, "dropping chat with unknown participant");
                        continue;
                    }
                },
                None => user.clone(),
            };
            let Some(item) = snapshot.item_by_id(chat.itemid) else {
                tracing::debug!(chat = %chat.chatid, item = %chat.itemid, "dropping chat for unknown item");
                continue;
            };
            let last = last_by_chat.get(&chat.chatid);
            recent.push(RecentChat {
                chat_id: chat.chatid,
                item,
                other_participant: other,
                last_message_text: last.map(|m| m.text.clone()),
                last_message_at: last.map(|m| m.createdat),
            });
        }
        recent.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));

        self.store.update(|s| {
            s.notifications = notifications;
            s.recent_chats = recent;
            s.user_chat_ids = chat_ids;
            s.seen_message_ids = seen_message_ids;
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasvc::rows::{NewChallenge, NewComment, NewPoll, NewPost, UserUpsert};
    use datasvc::SqliteService;
    use std::sync::Arc;

    async fn seed_user(svc: &SqliteService, name: &str) -> User {
        let row = svc
            .upsert_user(UserUpsert {
                name: name.into(),
                email: format!("{name}@example.com"),
                avatarurl: String::new(),
                bio: None,
            })
            .await
            .unwrap();
        User::from(row)
    }

    #[tokio::test]
    async fn joins_posts_with_comments_likes_and_polls() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(SqliteService::in_memory().unwrap());
        let asha = seed_user(&svc, "asha").await;
        let ravi = seed_user(&svc, "ravi").await;
        let post = svc
            .insert_post(NewPost {
                text: "launching soon".into(),
                imageurl: None,
                user_id: asha.user_id,
            })
            .await
            .unwrap();
        svc.insert_comment(NewComment {
            postid: post.postid,
            user_id: ravi.user_id,
            text: "congrats".into(),
        })
        .await
        .unwrap();
        svc.insert_like(post.postid, ravi.user_id).await.unwrap();
        let (_, options) = svc
            .create_poll(NewPoll {
                postid: post.postid,
                durationdays: 3,
                options: vec!["Yes".into(), "No".into()],
            })
            .await
            .unwrap();
        svc.upsert_poll_vote(options[0].pollid, options[0].optionid, ravi.user_id)
            .await
            .unwrap();

        let app = App::new(svc, dir.path().join("session.json"));
        app.initial_load().await.unwrap();

        let state = app.snapshot();
        assert_eq!(state.users.len(), 2);
        assert_eq!(state.posts.len(), 1);
        let loaded = &state.posts[0];
        assert_eq!(loaded.comments.len(), 1);
        assert_eq!(loaded.comments[0].posted_by, ravi);
        assert!(loaded.likes.contains(&ravi.user_id));
        let poll = loaded.poll.as_ref().unwrap();
        assert_eq!(poll.options.len(), 2);
        assert_eq!(poll.vote_share(options[0].optionid), 100.0);
    }

    #[tokio::test]
    async fn collections_come_back_newest_first() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(SqliteService::in_memory().unwrap());
        let asha = seed_user(&svc, "asha").await;
        let first = svc
            .insert_challenge(NewChallenge {
                title: "first".into(),
                description: "d".into(),
                detaileddescription: "dd".into(),
                industry: "retail".into(),
                rewardtype: "money".into(),
                rewardvalue: "5000".into(),
                user_id: asha.user_id,
            })
            .await
            .unwrap();
        let second = svc
            .insert_challenge(NewChallenge {
                title: "second".into(),
                description: "d".into(),
                detaileddescription: "dd".into(),
                industry: "retail".into(),
                rewardtype: "money".into(),
                rewardvalue: "5000".into(),
                user_id: asha.user_id,
            })
            .await
            .unwrap();

        let app = App::new(svc, dir.path().join("session.json"));
        app.initial_load().await.unwrap();

        let state = app.snapshot();
        assert_eq!(state.problems.len(), 2);
        // Same-second inserts keep a stable order; the later row must not
        // jump ahead of an earlier one with a newer timestamp.
        if second.createdat > first.createdat {
            assert_eq!(state.problems[0].id, second.challengeid);
        } else {
            assert_eq!(state.problems[0].id, first.challengeid);
        }
    }

    #[tokio::test]
    async fn restored_session_pulls_user_data() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(SqliteService::in_memory().unwrap());
        let asha = seed_user(&svc, "asha").await;
        let ravi = seed_user(&svc, "ravi").await;
        svc.insert_notification(datasvc::rows::NewNotification {
            user_id: asha.user_id,
            actor_id: ravi.user_id,
            kind: "like".into(),
            message: "liked your post: \"hello...\"".into(),
            link_to: None,
        })
        .await
        .unwrap();

        let app = App::new(svc, dir.path().join("session.json"));
        app.session_file.save(&asha).await.unwrap();
        app.initial_load().await.unwrap();

        let state = app.snapshot();
        assert_eq!(state.session.as_ref().unwrap().user_id, asha.user_id);
        assert_eq!(state.notifications.len(), 1);
        assert_eq!(state.notifications[0].actor, ravi);
        assert!(!state.notifications[0].seen);
    }
}
