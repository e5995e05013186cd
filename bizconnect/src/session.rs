//! Persisted session: one JSON blob holding the signed-in user, keyed off
//! disk by a fixed path. Only the email matters for rehydration; the rest of
//! the blob is refreshed from the loaded user list on every restore.

use std::path::PathBuf;

use datasvc::DataService;
use serde::Deserialize;

use crate::app::App;
use crate::model::User;

pub struct SessionFile {
    path: PathBuf,
}

#[derive(Deserialize)]
struct PersistedSession {
    email: String,
}

impl SessionFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    /// Email of the persisted session, if a readable blob exists.
    pub async fn load_email(&self) -> Option<String> {
        let bytes = tokio::fs::read(&self.path).await.ok()?;
        let stored: PersistedSession = serde_json::from_slice(&bytes).ok()?;
        Some(stored.email)
    }

    pub async fn save(&self, user: &User) -> anyhow::Result<()> {
        if let Some(dir) = self.path.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::write(&self.path, serde_json::to_vec(user)?).await?;
        Ok(())
    }

    pub async fn clear(&self) {
        let _ = tokio::fs::remove_file(&self.path).await;
    }
}

impl<S: DataService> App<S> {
    /// Runs exactly once per load, after the user collection is committed.
    /// A stored email that still exists adopts the fresh record (and the
    /// blob is rewritten, since the stored copy may be stale); a stored
    /// email with no matching user is a silent logout.
    pub async fn restore_session(&self) -> Option<User> {
        let email = self.session_file.load_email().await?;
        let fresh = self
            .store
            .snapshot()
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned();
        match fresh {
            Some(user) => {
                if let Err(err) = self.session_file.save(&user).await {
                    tracing::warn!(%err, "failed to refresh persisted session");
                }
                self.store.update(|s| s.session = Some(user.clone()));
                Some(user)
            }
            None => {
                self.session_file.clear().await;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use uuid::Uuid;

    fn user(email: &str) -> User {
        User {
            user_id: Uuid::new_v4(),
            name: "Asha".into(),
            email: email.into(),
            avatar_url: String::new(),
            bio: None,
        }
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let file = SessionFile::new(dir.path().join("session.json"));
        assert!(file.load_email().await.is_none());
        file.save(&user("asha@example.com")).await.unwrap();
        assert_eq!(file.load_email().await.unwrap(), "asha@example.com");
        file.clear().await;
        assert!(file.load_email().await.is_none());
    }

    #[tokio::test]
    async fn restore_adopts_fresh_record() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(datasvc::SqliteService::in_memory().unwrap());
        let app = App::new(svc, dir.path().join("session.json"));
        let stale = user("asha@example.com");
        app.session_file.save(&stale).await.unwrap();
        let mut fresh = user("asha@example.com");
        fresh.name = "Asha K".into();
        app.store.update(|s| s.users = vec![fresh.clone()]);
        let restored = app.restore_session().await.unwrap();
        assert_eq!(restored, fresh);
        assert_eq!(app.current_user(), Some(fresh));
    }

    #[tokio::test]
    async fn restore_with_unknown_email_clears_blob() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(datasvc::SqliteService::in_memory().unwrap());
        let app = App::new(svc, dir.path().join("session.json"));
        app.session_file.save(&user("gone@example.com")).await.unwrap();
        app.store.update(|s| s.users = vec![user("asha@example.com")]);
        assert!(app.restore_session().await.is_none());
        assert!(app.current_user().is_none());
        assert!(app.session_file.load_email().await.is_none());
    }
}
