//! Changefeed reconciliation. `apply` merges one event into state and is
//! pure with respect to the outside world; remote work comes back as
//! `Effect`s, which the dispatcher runs after the lock is released. Every
//! insert rule is keyed by id, so redelivered events and echoes of our own
//! optimistic writes are no-ops.

use std::collections::HashSet;
use std::sync::Arc;

use datasvc::event::{Change, Event};
use datasvc::rows::NewNotification;
use datasvc::DataService;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::app::App;
use crate::model::{
    AppNotification, ChatMessage, Comment, Idea, Post, Problem, RecentChat, User,
};
use crate::notify;
use crate::state::AppState;

/// Deferred work a merge rule wants done outside the state lock.
#[derive(Debug, Clone)]
pub enum Effect {
    /// Write a notification row; best effort.
    Notify(NewNotification),
    /// A message arrived for a chat with no recent-chat projection yet; the
    /// chat row has to be fetched to build one.
    ResolveRecentChat {
        chat_id: Uuid,
        text: String,
        sent_at: i64,
        sender: User,
    },
}

fn excerpt(text: &str, n: usize) -> String {
    text.chars().take(n).collect()
}

/// Merge one event into state. Events that reference rows we cannot resolve
/// (unknown author, unknown post) are dropped with a debug log; the next full
/// load repairs any gap.
pub fn apply(state: &mut AppState, change: &Change) -> Vec<Effect> {
    let mut effects = Vec::new();
    match change {
        Change::Users(Event::Inserted(row)) => {
            if state.user_by_id(row.id).is_none() {
                state.users.push(User::from(row.clone()));
            }
        }
        Change::Users(Event::Updated(row)) => {
            let user = User::from(row.clone());
            if let Some(existing) = state.users.iter_mut().find(|u| u.user_id == user.user_id) {
                *existing = user.clone();
            }
            if state
                .session
                .as_ref()
                .is_some_and(|s| s.user_id == user.user_id)
            {
                state.session = Some(user);
            }
        }
        Change::Posts(Event::Inserted(row)) => {
            if state.post_by_id(row.postid).is_some() {
                return effects;
            }
            let Some(author) = state.user_by_id(row.user_id).cloned() else {
                tracing::debug!(post = %row.postid, "dropping post event with unknown author");
                return effects;
            };
            state.posts.insert(
                0,
                Post {
                    id: row.postid,
                    text: row.text.clone(),
                    image_url: row.imageurl.clone(),
                    poll: None,
                    posted_by: author,
                    created_at: row.createdat,
                    likes: HashSet::new(),
                    comments: Vec::new(),
                },
            );
            state.sort_posts();
        }
        Change::Posts(Event::Deleted(row)) => {
            state.posts.retain(|p| p.id != row.postid);
        }
        Change::Comments(Event::Inserted(row)) => {
            let Some(author) = state.user_by_id(row.user_id).cloned() else {
                tracing::debug!(comment = %row.commentid, "dropping comment event with unknown author");
                return effects;
            };
            let session = state.session.clone();
            let Some(post) = state.post_mut(row.postid) else {
                tracing::debug!(comment = %row.commentid, post = %row.postid, "dropping comment event for unknown post");
                return effects;
            };
            if post.comments.iter().any(|c| c.id == row.commentid) {
                return effects;
            }
            post.comments.push(Comment {
                id: row.commentid,
                text: row.text.clone(),
                posted_by: author.clone(),
                created_at: row.createdat,
            });
            post.comments.sort_by_key(|c| c.created_at);
            // Only the post owner's own client writes the notification, and
            // only on the first delivery of the event, so it is created
            // exactly once.
            if let Some(session) = session {
                if post.posted_by.user_id == session.user_id && row.user_id != session.user_id {
                    effects.push(Effect::Notify(NewNotification {
                        user_id: session.user_id,
                        actor_id: author.user_id,
                        kind: "comment".into(),
                        message: format!(
                            "commented on your post: \"{}...\"",
                            excerpt(&post.text, 20)
                        ),
                        link_to: Some(format!("/post/{}", post.id)),
                    }));
                }
            }
        }
        Change::Comments(Event::Deleted(row)) => {
            if let Some(post) = state.post_mut(row.postid) {
                post.comments.retain(|c| c.id != row.commentid);
            }
        }
        Change::Likes(Event::Inserted(row)) => {
            let actor = state.user_by_id(row.user_id).cloned();
            let session = state.session.clone();
            if let Some(post) = state.post_mut(row.postid) {
                if !post.likes.insert(row.user_id) {
                    return effects;
                }
                if let (Some(session), Some(actor)) = (session, actor) {
                    if post.posted_by.user_id == session.user_id
                        && row.user_id != session.user_id
                    {
                        effects.push(Effect::Notify(NewNotification {
                            user_id: session.user_id,
                            actor_id: actor.user_id,
                            kind: "like".into(),
                            message: format!(
                                "liked your post: \"{}...\"",
                                excerpt(&post.text, 30)
                            ),
                            link_to: Some(format!("/post/{}", post.id)),
                        }));
                    }
                }
            }
        }
        Change::Likes(Event::Deleted(row)) => {
            if let Some(post) = state.post_mut(row.postid) {
                post.likes.remove(&row.user_id);
            }
        }
        Change::Challenges(Event::Inserted(row)) => {
            if state.problems.iter().any(|p| p.id == row.challengeid) {
                return effects;
            }
            let Some(author) = state.user_by_id(row.user_id).cloned() else {
                tracing::debug!(challenge = %row.challengeid, "dropping challenge event with unknown author");
                return effects;
            };
            state.problems.insert(0, Problem::from_row(row.clone(), author));
            state.problems.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Change::Challenges(Event::Deleted(row)) => {
            state.problems.retain(|p| p.id != row.challengeid);
        }
        Change::Ideas(Event::Inserted(row)) => {
            if state.ideas.iter().any(|i| i.id == row.ideaid) {
                return effects;
            }
            let Some(author) = state.user_by_id(row.user_id).cloned() else {
                tracing::debug!(idea = %row.ideaid, "dropping idea event with unknown author");
                return effects;
            };
            state.ideas.insert(0, Idea::from_row(row.clone(), author));
            state.ideas.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        }
        Change::Ideas(Event::Deleted(row)) => {
            state.ideas.retain(|i| i.id != row.ideaid);
        }
        Change::PollVotes(Event::Inserted(row) | Event::Updated(row)) => {
            for post in &mut state.posts {
                let Some(poll) = post.poll.as_mut() else { continue };
                if poll.id != row.pollid {
                    continue;
                }
                // One vote per voter: a new ballot replaces the old one.
                for option in &mut poll.options {
                    if option.id == row.optionid {
                        option.votes.insert(row.user_id);
                    } else {
                        option.votes.remove(&row.user_id);
                    }
                }
            }
        }
        Change::ChatParticipants(Event::Inserted(row)) => {
            if state
                .session
                .as_ref()
                .is_some_and(|s| s.user_id == row.user_id)
            {
                state.user_chat_ids.insert(row.chatid);
            }
        }
        Change::ChatMessages(Event::Inserted(row)) => {
            let Some(session) = state.session.clone() else {
                return effects;
            };
            if !state.user_chat_ids.contains(&row.chatid) || row.user_id == session.user_id {
                return effects;
            }
            let Some(sender) = state.user_by_id(row.user_id).cloned() else {
                tracing::debug!(message = %row.messageid, "dropping chat message with unknown sender");
                return effects;
            };
            if !state.seen_message_ids.insert(row.messageid) {
                return effects;
            }
            let window_open = state
                .open_chat
                .as_ref()
                .is_some_and(|c| c.chat_id == row.chatid);
            if window_open {
                if let Some(chat) = state.open_chat.as_mut() {
                    if chat.messages.iter().all(|m| m.id != row.messageid) {
                        chat.messages.push(ChatMessage {
                            id: row.messageid,
                            text: row.text.clone(),
                            sender: sender.clone(),
                            timestamp: row.createdat,
                        });
                    }
                }
            } else {
                effects.push(Effect::Notify(NewNotification {
                    user_id: session.user_id,
                    actor_id: sender.user_id,
                    kind: "chat_message".into(),
                    message: "sent you a new message.".into(),
                    link_to: Some(format!("/chat/{}", row.chatid)),
                }));
            }
            if !state.touch_recent_chat(row.chatid, &row.text, row.createdat) {
                effects.push(Effect::ResolveRecentChat {
                    chat_id: row.chatid,
                    text: row.text.clone(),
                    sent_at: row.createdat,
                    sender,
                });
            }
        }
        Change::Notifications(Event::Inserted(row)) => {
            let Some(session) = state.session.as_ref() else {
                return effects;
            };
            if row.user_id != session.user_id {
                return effects;
            }
            let Some(actor) = state.user_by_id(row.actor_id).cloned() else {
                tracing::debug!(notification = %row.id, "dropping notification with unknown actor");
                return effects;
            };
            if state.notifications.iter().all(|n| n.id != row.id) {
                state.notifications.insert(
                    0,
                    AppNotification {
                        id: row.id,
                        actor,
                        message: row.message.clone(),
                        created_at: row.createdat,
                        seen: row.seen,
                    },
                );
            }
        }
        _ => {}
    }
    effects
}

/// Consume the changefeed until the service closes it. Events missed while
/// lagging are lost; the next full load catches the view up.
pub async fn run<S: DataService>(app: Arc<App<S>>) {
    let mut rx = app.svc.subscribe();
    loop {
        match rx.recv().await {
            Ok(change) => handle_change(&app, change).await,
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "changefeed lagged, events dropped");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Apply one event, then run whatever effects it produced.
pub async fn handle_change<S: DataService>(app: &App<S>, change: Change) {
    let effects = app.store.update(|state| apply(state, &change));
    for effect in effects {
        match effect {
            Effect::Notify(new) => notify::create(app.svc.as_ref(), new).await,
            Effect::ResolveRecentChat {
                chat_id,
                text,
                sent_at,
                sender,
            } => resolve_recent_chat(app, chat_id, text, sent_at, sender).await,
        }
    }
}

async fn resolve_recent_chat<S: DataService>(
    app: &App<S>,
    chat_id: Uuid,
    text: String,
    sent_at: i64,
    sender: User,
) {
    let chat = match app.svc.get_chat(chat_id).await {
        Ok(Some(chat)) => chat,
        Ok(None) => {
            tracing::debug!(%chat_id, "chat row missing, cannot build recent-chat entry");
            return;
        }
        Err(err) => {
            tracing::warn!(%err, %chat_id, "failed to fetch chat for recent-chat entry");
            return;
        }
    };
    let Some(item) = app.store.snapshot().item_by_id(chat.itemid) else {
        tracing::debug!(item = %chat.itemid, "dropping recent-chat entry for unknown item");
        return;
    };
    app.store.update(|s| {
        s.push_recent_chat(RecentChat {
            chat_id,
            item,
            other_participant: sender,
            last_message_text: Some(text),
            last_message_at: Some(sent_at),
        })
    });
}
