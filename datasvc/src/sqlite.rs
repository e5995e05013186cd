//! SQLite-backed reference implementation of [`DataService`].
//!
//! Uniqueness lives here, not in the application: one vote per
//! (pollid, user_id) and one chat per itemid are schema constraints, so two
//! racing writers converge on a single row.

use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::{params, OptionalExtension, Row};
use time::OffsetDateTime;
use tokio::sync::broadcast;
use uuid::Uuid;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::event::{Change, Event};
use crate::rows::*;
use crate::service::DataService;

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS users (
  id TEXT PRIMARY KEY,
  name TEXT NOT NULL,
  email TEXT UNIQUE NOT NULL,
  avatarurl TEXT NOT NULL,
  bio TEXT
);

CREATE TABLE IF NOT EXISTS posts (
  postid TEXT PRIMARY KEY,
  text TEXT NOT NULL,
  imageurl TEXT,
  user_id TEXT NOT NULL REFERENCES users(id),
  createdat INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS comments (
  commentid TEXT PRIMARY KEY,
  postid TEXT NOT NULL REFERENCES posts(postid) ON DELETE CASCADE,
  user_id TEXT NOT NULL REFERENCES users(id),
  text TEXT NOT NULL,
  createdat INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS likes (
  postid TEXT NOT NULL REFERENCES posts(postid) ON DELETE CASCADE,
  user_id TEXT NOT NULL REFERENCES users(id),
  PRIMARY KEY (postid, user_id)
);

CREATE TABLE IF NOT EXISTS challenges (
  challengeid TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  description TEXT NOT NULL,
  detaileddescription TEXT NOT NULL,
  industry TEXT NOT NULL,
  rewardtype TEXT NOT NULL,
  rewardvalue TEXT NOT NULL,
  user_id TEXT NOT NULL REFERENCES users(id),
  createdat INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS ideas (
  ideaid TEXT PRIMARY KEY,
  title TEXT NOT NULL,
  summary TEXT NOT NULL,
  detaileddescription TEXT NOT NULL,
  rewardtype TEXT NOT NULL,
  rewardvalue TEXT NOT NULL,
  user_id TEXT NOT NULL REFERENCES users(id),
  createdat INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS polls (
  pollid TEXT PRIMARY KEY,
  postid TEXT NOT NULL REFERENCES posts(postid) ON DELETE CASCADE,
  durationdays INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS poll_options (
  optionid TEXT PRIMARY KEY,
  pollid TEXT NOT NULL REFERENCES polls(pollid) ON DELETE CASCADE,
  text TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS poll_votes (
  pollid TEXT NOT NULL REFERENCES polls(pollid) ON DELETE CASCADE,
  optionid TEXT NOT NULL REFERENCES poll_options(optionid) ON DELETE CASCADE,
  user_id TEXT NOT NULL REFERENCES users(id),
  UNIQUE (pollid, user_id)
);

CREATE TABLE IF NOT EXISTS chats (
  chatid TEXT PRIMARY KEY,
  itemid TEXT UNIQUE NOT NULL,
  itemtype TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS chat_participants (
  chatid TEXT NOT NULL REFERENCES chats(chatid) ON DELETE CASCADE,
  user_id TEXT NOT NULL REFERENCES users(id),
  PRIMARY KEY (chatid, user_id)
);

CREATE TABLE IF NOT EXISTS chat_messages (
  messageid TEXT PRIMARY KEY,
  chatid TEXT NOT NULL REFERENCES chats(chatid) ON DELETE CASCADE,
  user_id TEXT NOT NULL REFERENCES users(id),
  text TEXT NOT NULL,
  createdat INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
  id TEXT PRIMARY KEY,
  user_id TEXT NOT NULL REFERENCES users(id),
  actor_id TEXT NOT NULL REFERENCES users(id),
  type TEXT NOT NULL,
  message TEXT NOT NULL,
  link_to TEXT,
  createdat INTEGER NOT NULL,
  seen INTEGER NOT NULL DEFAULT 0
);
"#;

pub struct SqliteService {
    pool: Pool<SqliteConnectionManager>,
    changes: broadcast::Sender<Change>,
}

impl SqliteService {
    /// Open (or create) the database at `path` and run migrations.
    pub fn open<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let manager = SqliteConnectionManager::file(path)
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        Self::build(Pool::new(manager)?)
    }

    /// In-memory database for tests. Pool is capped at one connection so
    /// every caller sees the same database.
    pub fn in_memory() -> Result<Self> {
        let manager = SqliteConnectionManager::memory()
            .with_init(|c| c.execute_batch("PRAGMA foreign_keys = ON;"));
        Self::build(Pool::builder().max_size(1).build(manager)?)
    }

    fn build(pool: Pool<SqliteConnectionManager>) -> Result<Self> {
        pool.get()?.execute_batch(SCHEMA)?;
        let (changes, _) = broadcast::channel(256);
        Ok(Self { pool, changes })
    }

    fn conn(&self) -> Result<PooledConnection<SqliteConnectionManager>> {
        Ok(self.pool.get()?)
    }

    fn emit(&self, change: Change) {
        // Nobody listening is fine.
        let _ = self.changes.send(change);
    }
}

fn now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    Ok(UserRow {
        id: get_uuid(row, 0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        avatarurl: row.get(3)?,
        bio: row.get(4)?,
    })
}

fn row_to_post(row: &Row<'_>) -> rusqlite::Result<PostRow> {
    Ok(PostRow {
        postid: get_uuid(row, 0)?,
        text: row.get(1)?,
        imageurl: row.get(2)?,
        user_id: get_uuid(row, 3)?,
        createdat: row.get(4)?,
    })
}

fn row_to_comment(row: &Row<'_>) -> rusqlite::Result<CommentRow> {
    Ok(CommentRow {
        commentid: get_uuid(row, 0)?,
        postid: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        text: row.get(3)?,
        createdat: row.get(4)?,
    })
}

fn row_to_challenge(row: &Row<'_>) -> rusqlite::Result<ChallengeRow> {
    Ok(ChallengeRow {
        challengeid: get_uuid(row, 0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        detaileddescription: row.get(3)?,
        industry: row.get(4)?,
        rewardtype: row.get(5)?,
        rewardvalue: row.get(6)?,
        user_id: get_uuid(row, 7)?,
        createdat: row.get(8)?,
    })
}

fn row_to_idea(row: &Row<'_>) -> rusqlite::Result<IdeaRow> {
    Ok(IdeaRow {
        ideaid: get_uuid(row, 0)?,
        title: row.get(1)?,
        summary: row.get(2)?,
        detaileddescription: row.get(3)?,
        rewardtype: row.get(4)?,
        rewardvalue: row.get(5)?,
        user_id: get_uuid(row, 6)?,
        createdat: row.get(7)?,
    })
}

fn row_to_chat(row: &Row<'_>) -> rusqlite::Result<ChatRow> {
    Ok(ChatRow {
        chatid: get_uuid(row, 0)?,
        itemid: get_uuid(row, 1)?,
        itemtype: row.get(2)?,
    })
}

fn row_to_chat_message(row: &Row<'_>) -> rusqlite::Result<ChatMessageRow> {
    Ok(ChatMessageRow {
        messageid: get_uuid(row, 0)?,
        chatid: get_uuid(row, 1)?,
        user_id: get_uuid(row, 2)?,
        text: row.get(3)?,
        createdat: row.get(4)?,
    })
}

fn row_to_notification(row: &Row<'_>) -> rusqlite::Result<NotificationRow> {
    Ok(NotificationRow {
        id: get_uuid(row, 0)?,
        user_id: get_uuid(row, 1)?,
        actor_id: get_uuid(row, 2)?,
        kind: row.get(3)?,
        message: row.get(4)?,
        link_to: row.get(5)?,
        createdat: row.get(6)?,
        seen: row.get::<_, i64>(7)? != 0,
    })
}

fn is_constraint_violation(e: &rusqlite::Error) -> bool {
    matches!(
        e.sqlite_error_code(),
        Some(rusqlite::ErrorCode::ConstraintViolation)
    )
}

fn is_fk_violation(e: &rusqlite::Error) -> bool {
    matches!(e, rusqlite::Error::SqliteFailure(err, _)
        if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY)
}

const USER_COLS: &str = "id, name, email, avatarurl, bio";
const POST_COLS: &str = "postid, text, imageurl, user_id, createdat";
const COMMENT_COLS: &str = "commentid, postid, user_id, text, createdat";
const CHALLENGE_COLS: &str =
    "challengeid, title, description, detaileddescription, industry, rewardtype, rewardvalue, user_id, createdat";
const IDEA_COLS: &str =
    "ideaid, title, summary, detaileddescription, rewardtype, rewardvalue, user_id, createdat";
const CHAT_MESSAGE_COLS: &str = "messageid, chatid, user_id, text, createdat";
const NOTIFICATION_COLS: &str = "id, user_id, actor_id, type, message, link_to, createdat, seen";

#[async_trait]
impl DataService for SqliteService {
    async fn list_users(&self) -> Result<Vec<UserRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLS} FROM users"))?;
        let rows = stmt
            .query_map([], row_to_user)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLS} FROM users WHERE email = ?1"))?;
        let user = stmt.query_row([email], row_to_user).optional()?;
        Ok(user)
    }

    async fn upsert_user(&self, up: UserUpsert) -> Result<UserRow> {
        let existed = self.find_user_by_email(&up.email).await?;
        let conn = self.conn()?;
        let id = existed
            .as_ref()
            .map(|u| u.id)
            .unwrap_or_else(Uuid::new_v4);
        conn.execute(
            "INSERT INTO users (id, name, email, avatarurl, bio) VALUES (?1, ?2, ?3, ?4, ?5) \
             ON CONFLICT(email) DO UPDATE SET name = excluded.name, avatarurl = excluded.avatarurl",
            params![id.to_string(), up.name, up.email, up.avatarurl, up.bio],
        )?;
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLS} FROM users WHERE email = ?1"))?;
        let user = stmt.query_row([up.email], row_to_user)?;
        if existed.is_some() {
            self.emit(Change::Users(Event::Updated(user.clone())));
        } else {
            self.emit(Change::Users(Event::Inserted(user.clone())));
        }
        Ok(user)
    }

    async fn update_user(&self, id: Uuid, update: ProfileUpdate) -> Result<UserRow> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE users SET name = ?2, bio = ?3, avatarurl = ?4 WHERE id = ?1",
            params![id.to_string(), update.name, update.bio, update.avatarurl],
        )?;
        if changed == 0 {
            return Err(Error::NotFound);
        }
        let mut stmt = conn.prepare(&format!("SELECT {USER_COLS} FROM users WHERE id = ?1"))?;
        let user = stmt.query_row([id.to_string()], row_to_user)?;
        self.emit(Change::Users(Event::Updated(user.clone())));
        Ok(user)
    }

    async fn list_posts(&self) -> Result<Vec<PostRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {POST_COLS} FROM posts"))?;
        let rows = stmt
            .query_map([], row_to_post)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_post(&self, new: NewPost) -> Result<PostRow> {
        let conn = self.conn()?;
        let row = PostRow {
            postid: Uuid::new_v4(),
            text: new.text,
            imageurl: new.imageurl,
            user_id: new.user_id,
            createdat: now(),
        };
        conn.execute(
            "INSERT INTO posts (postid, text, imageurl, user_id, createdat) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.postid.to_string(),
                row.text,
                row.imageurl,
                row.user_id.to_string(),
                row.createdat
            ],
        )?;
        self.emit(Change::Posts(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn delete_post(&self, postid: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {POST_COLS} FROM posts WHERE postid = ?1"))?;
        let old = stmt
            .query_row([postid.to_string()], row_to_post)
            .optional()?
            .ok_or(Error::NotFound)?;
        conn.execute("DELETE FROM posts WHERE postid = ?1", [postid.to_string()])?;
        self.emit(Change::Posts(Event::Deleted(old)));
        Ok(())
    }

    async fn list_comments(&self) -> Result<Vec<CommentRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {COMMENT_COLS} FROM comments"))?;
        let rows = stmt
            .query_map([], row_to_comment)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_comment(&self, new: NewComment) -> Result<CommentRow> {
        let conn = self.conn()?;
        let row = CommentRow {
            commentid: Uuid::new_v4(),
            postid: new.postid,
            user_id: new.user_id,
            text: new.text,
            createdat: now(),
        };
        conn.execute(
            "INSERT INTO comments (commentid, postid, user_id, text, createdat) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.commentid.to_string(),
                row.postid.to_string(),
                row.user_id.to_string(),
                row.text,
                row.createdat
            ],
        )?;
        self.emit(Change::Comments(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn delete_comment(&self, commentid: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {COMMENT_COLS} FROM comments WHERE commentid = ?1"))?;
        let old = stmt
            .query_row([commentid.to_string()], row_to_comment)
            .optional()?
            .ok_or(Error::NotFound)?;
        conn.execute(
            "DELETE FROM comments WHERE commentid = ?1",
            [commentid.to_string()],
        )?;
        self.emit(Change::Comments(Event::Deleted(old)));
        Ok(())
    }

    async fn list_likes(&self) -> Result<Vec<LikeRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT postid, user_id FROM likes")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(LikeRow {
                    postid: get_uuid(row, 0)?,
                    user_id: get_uuid(row, 1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_like(&self, postid: Uuid, user_id: Uuid) -> Result<LikeRow> {
        let conn = self.conn()?;
        let res = conn.execute(
            "INSERT INTO likes (postid, user_id) VALUES (?1, ?2)",
            params![postid.to_string(), user_id.to_string()],
        );
        match res {
            Ok(_) => {}
            // a missing post and a duplicate like both raise constraint
            // errors; only the latter means "already liked"
            Err(e) if is_fk_violation(&e) => return Err(Error::NotFound),
            Err(e) if is_constraint_violation(&e) => return Err(Error::Conflict("already_liked")),
            Err(e) => return Err(e.into()),
        }
        let row = LikeRow { postid, user_id };
        self.emit(Change::Likes(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn delete_like(&self, postid: Uuid, user_id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "DELETE FROM likes WHERE postid = ?1 AND user_id = ?2",
            params![postid.to_string(), user_id.to_string()],
        )?;
        if changed == 0 {
            return Err(Error::NotFound);
        }
        self.emit(Change::Likes(Event::Deleted(LikeRow { postid, user_id })));
        Ok(())
    }

    async fn list_challenges(&self) -> Result<Vec<ChallengeRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {CHALLENGE_COLS} FROM challenges"))?;
        let rows = stmt
            .query_map([], row_to_challenge)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_challenge(&self, new: NewChallenge) -> Result<ChallengeRow> {
        let conn = self.conn()?;
        let row = ChallengeRow {
            challengeid: Uuid::new_v4(),
            title: new.title,
            description: new.description,
            detaileddescription: new.detaileddescription,
            industry: new.industry,
            rewardtype: new.rewardtype,
            rewardvalue: new.rewardvalue,
            user_id: new.user_id,
            createdat: now(),
        };
        conn.execute(
            "INSERT INTO challenges (challengeid, title, description, detaileddescription, industry, rewardtype, rewardvalue, user_id, createdat) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                row.challengeid.to_string(),
                row.title,
                row.description,
                row.detaileddescription,
                row.industry,
                row.rewardtype,
                row.rewardvalue,
                row.user_id.to_string(),
                row.createdat
            ],
        )?;
        self.emit(Change::Challenges(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn delete_challenge(&self, challengeid: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHALLENGE_COLS} FROM challenges WHERE challengeid = ?1"
        ))?;
        let old = stmt
            .query_row([challengeid.to_string()], row_to_challenge)
            .optional()?
            .ok_or(Error::NotFound)?;
        conn.execute(
            "DELETE FROM challenges WHERE challengeid = ?1",
            [challengeid.to_string()],
        )?;
        self.emit(Change::Challenges(Event::Deleted(old)));
        Ok(())
    }

    async fn list_ideas(&self) -> Result<Vec<IdeaRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {IDEA_COLS} FROM ideas"))?;
        let rows = stmt
            .query_map([], row_to_idea)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_idea(&self, new: NewIdea) -> Result<IdeaRow> {
        let conn = self.conn()?;
        let row = IdeaRow {
            ideaid: Uuid::new_v4(),
            title: new.title,
            summary: new.summary,
            detaileddescription: new.detaileddescription,
            rewardtype: new.rewardtype,
            rewardvalue: new.rewardvalue,
            user_id: new.user_id,
            createdat: now(),
        };
        conn.execute(
            "INSERT INTO ideas (ideaid, title, summary, detaileddescription, rewardtype, rewardvalue, user_id, createdat) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                row.ideaid.to_string(),
                row.title,
                row.summary,
                row.detaileddescription,
                row.rewardtype,
                row.rewardvalue,
                row.user_id.to_string(),
                row.createdat
            ],
        )?;
        self.emit(Change::Ideas(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn delete_idea(&self, ideaid: Uuid) -> Result<()> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare(&format!("SELECT {IDEA_COLS} FROM ideas WHERE ideaid = ?1"))?;
        let old = stmt
            .query_row([ideaid.to_string()], row_to_idea)
            .optional()?
            .ok_or(Error::NotFound)?;
        conn.execute("DELETE FROM ideas WHERE ideaid = ?1", [ideaid.to_string()])?;
        self.emit(Change::Ideas(Event::Deleted(old)));
        Ok(())
    }

    async fn list_polls(&self) -> Result<Vec<PollRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT pollid, postid, durationdays FROM polls")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PollRow {
                    pollid: get_uuid(row, 0)?,
                    postid: get_uuid(row, 1)?,
                    durationdays: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn list_poll_options(&self) -> Result<Vec<PollOptionRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT optionid, pollid, text FROM poll_options")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PollOptionRow {
                    optionid: get_uuid(row, 0)?,
                    pollid: get_uuid(row, 1)?,
                    text: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn list_poll_votes(&self) -> Result<Vec<PollVoteRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT pollid, optionid, user_id FROM poll_votes")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(PollVoteRow {
                    pollid: get_uuid(row, 0)?,
                    optionid: get_uuid(row, 1)?,
                    user_id: get_uuid(row, 2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn create_poll(&self, new: NewPoll) -> Result<(PollRow, Vec<PollOptionRow>)> {
        let conn = self.conn()?;
        let poll = PollRow {
            pollid: Uuid::new_v4(),
            postid: new.postid,
            durationdays: new.durationdays,
        };
        conn.execute(
            "INSERT INTO polls (pollid, postid, durationdays) VALUES (?1, ?2, ?3)",
            params![
                poll.pollid.to_string(),
                poll.postid.to_string(),
                poll.durationdays
            ],
        )?;
        let mut options = Vec::with_capacity(new.options.len());
        for text in new.options {
            let opt = PollOptionRow {
                optionid: Uuid::new_v4(),
                pollid: poll.pollid,
                text,
            };
            conn.execute(
                "INSERT INTO poll_options (optionid, pollid, text) VALUES (?1, ?2, ?3)",
                params![opt.optionid.to_string(), opt.pollid.to_string(), opt.text],
            )?;
            options.push(opt);
        }
        Ok((poll, options))
    }

    async fn upsert_poll_vote(
        &self,
        pollid: Uuid,
        optionid: Uuid,
        user_id: Uuid,
    ) -> Result<PollVoteRow> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT 1 FROM poll_votes WHERE pollid = ?1 AND user_id = ?2")?;
        let existed: Option<i64> = stmt
            .query_row(params![pollid.to_string(), user_id.to_string()], |row| {
                row.get(0)
            })
            .optional()?;
        conn.execute(
            "INSERT INTO poll_votes (pollid, optionid, user_id) VALUES (?1, ?2, ?3) \
             ON CONFLICT(pollid, user_id) DO UPDATE SET optionid = excluded.optionid",
            params![
                pollid.to_string(),
                optionid.to_string(),
                user_id.to_string()
            ],
        )?;
        let row = PollVoteRow {
            pollid,
            optionid,
            user_id,
        };
        if existed.is_some() {
            self.emit(Change::PollVotes(Event::Updated(row.clone())));
        } else {
            self.emit(Change::PollVotes(Event::Inserted(row.clone())));
        }
        Ok(row)
    }

    async fn list_chats(&self) -> Result<Vec<ChatRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT chatid, itemid, itemtype FROM chats")?;
        let rows = stmt
            .query_map([], row_to_chat)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn get_chat(&self, chatid: Uuid) -> Result<Option<ChatRow>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT chatid, itemid, itemtype FROM chats WHERE chatid = ?1")?;
        let chat = stmt
            .query_row([chatid.to_string()], row_to_chat)
            .optional()?;
        Ok(chat)
    }

    async fn find_chat_by_item(&self, itemid: Uuid) -> Result<Option<ChatRow>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT chatid, itemid, itemtype FROM chats WHERE itemid = ?1")?;
        let chat = stmt
            .query_row([itemid.to_string()], row_to_chat)
            .optional()?;
        Ok(chat)
    }

    async fn create_chat(&self, itemid: Uuid, itemtype: &str) -> Result<ChatRow> {
        let conn = self.conn()?;
        let row = ChatRow {
            chatid: Uuid::new_v4(),
            itemid,
            itemtype: itemtype.into(),
        };
        let res = conn.execute(
            "INSERT INTO chats (chatid, itemid, itemtype) VALUES (?1, ?2, ?3)",
            params![row.chatid.to_string(), row.itemid.to_string(), row.itemtype],
        );
        match res {
            Ok(_) => {
                self.emit(Change::Chats(Event::Inserted(row.clone())));
                Ok(row)
            }
            // A concurrent initiator created the chat first; converge on it.
            Err(e) if is_constraint_violation(&e) => {
                tracing::debug!(%itemid, "chat already exists for item");
                drop(conn);
                self.find_chat_by_item(itemid).await?.ok_or(Error::NotFound)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn list_chat_participants(&self) -> Result<Vec<ChatParticipantRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT chatid, user_id FROM chat_participants")?;
        let rows = stmt
            .query_map([], |row| {
                Ok(ChatParticipantRow {
                    chatid: get_uuid(row, 0)?,
                    user_id: get_uuid(row, 1)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn add_chat_participants(&self, chatid: Uuid, user_ids: &[Uuid]) -> Result<()> {
        let conn = self.conn()?;
        for user_id in user_ids {
            let inserted = conn.execute(
                "INSERT OR IGNORE INTO chat_participants (chatid, user_id) VALUES (?1, ?2)",
                params![chatid.to_string(), user_id.to_string()],
            )?;
            if inserted > 0 {
                self.emit(Change::ChatParticipants(Event::Inserted(
                    ChatParticipantRow {
                        chatid,
                        user_id: *user_id,
                    },
                )));
            }
        }
        Ok(())
    }

    async fn list_chat_messages(&self) -> Result<Vec<ChatMessageRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!("SELECT {CHAT_MESSAGE_COLS} FROM chat_messages"))?;
        let rows = stmt
            .query_map([], row_to_chat_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn list_chat_messages_for(&self, chatid: Uuid) -> Result<Vec<ChatMessageRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {CHAT_MESSAGE_COLS} FROM chat_messages WHERE chatid = ?1 ORDER BY createdat ASC, messageid ASC"
        ))?;
        let rows = stmt
            .query_map([chatid.to_string()], row_to_chat_message)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_chat_message(&self, new: NewChatMessage) -> Result<ChatMessageRow> {
        let conn = self.conn()?;
        let row = ChatMessageRow {
            messageid: Uuid::new_v4(),
            chatid: new.chatid,
            user_id: new.user_id,
            text: new.text,
            createdat: now(),
        };
        conn.execute(
            "INSERT INTO chat_messages (messageid, chatid, user_id, text, createdat) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                row.messageid.to_string(),
                row.chatid.to_string(),
                row.user_id.to_string(),
                row.text,
                row.createdat
            ],
        )?;
        self.emit(Change::ChatMessages(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn list_notifications_for(
        &self,
        user_id: Uuid,
        limit: usize,
    ) -> Result<Vec<NotificationRow>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {NOTIFICATION_COLS} FROM notifications WHERE user_id = ?1 ORDER BY createdat DESC LIMIT ?2"
        ))?;
        let rows = stmt
            .query_map(
                params![user_id.to_string(), limit as i64],
                row_to_notification,
            )?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    async fn insert_notification(&self, new: NewNotification) -> Result<NotificationRow> {
        let conn = self.conn()?;
        let row = NotificationRow {
            id: Uuid::new_v4(),
            user_id: new.user_id,
            actor_id: new.actor_id,
            kind: new.kind,
            message: new.message,
            link_to: new.link_to,
            createdat: now(),
            seen: false,
        };
        conn.execute(
            "INSERT INTO notifications (id, user_id, actor_id, type, message, link_to, createdat, seen) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 0)",
            params![
                row.id.to_string(),
                row.user_id.to_string(),
                row.actor_id.to_string(),
                row.kind,
                row.message,
                row.link_to,
                row.createdat
            ],
        )?;
        self.emit(Change::Notifications(Event::Inserted(row.clone())));
        Ok(row)
    }

    async fn mark_notifications_seen(&self, user_id: Uuid) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE notifications SET seen = 1 WHERE user_id = ?1",
            [user_id.to_string()],
        )?;
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.changes.subscribe()
    }
}
