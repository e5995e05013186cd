//! Sign-in. The identity provider hands the client a JWT whose payload
//! carries name, email and picture; the signature was already checked by the
//! provider, so only the payload is decoded here. Users are keyed by email.

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use datasvc::rows::UserUpsert;
use datasvc::DataService;
use serde::Deserialize;

use crate::app::App;
use crate::model::User;

#[derive(Debug, Clone, Deserialize)]
pub struct IdentityClaims {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub picture: String,
}

/// Pull the claims out of a JWT without verifying it.
pub fn decode_identity_token(token: &str) -> anyhow::Result<IdentityClaims> {
    let payload = token
        .split('.')
        .nth(1)
        .ok_or_else(|| anyhow!("malformed identity token"))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .context("identity token payload is not base64url")?;
    serde_json::from_slice(&bytes).context("identity token payload is not valid claims")
}

impl<S: DataService> App<S> {
    pub async fn login_with_token(&self, token: &str) -> anyhow::Result<User> {
        let claims = decode_identity_token(token)?;
        self.login(claims).await
    }

    /// Upsert the user record for these claims, persist the session and load
    /// the per-user collections. A returning user keeps their bio; name and
    /// picture always follow the provider.
    pub async fn login(&self, claims: IdentityClaims) -> anyhow::Result<User> {
        let row = self
            .svc
            .upsert_user(UserUpsert {
                name: claims.name,
                email: claims.email,
                avatarurl: claims.picture,
                bio: None,
            })
            .await
            .context("sign-in write failed")?;
        let user = User::from(row);

        if let Err(err) = self.session_file.save(&user).await {
            tracing::warn!(%err, "failed to persist session");
        }

        self.store.update(|s| {
            match s.users.iter_mut().find(|u| u.user_id == user.user_id) {
                Some(existing) => *existing = user.clone(),
                None => s.users.push(user.clone()),
            }
            s.session = Some(user.clone());
        });

        self.load_user_data(&user).await?;
        Ok(user)
    }

    /// Drop the session and everything scoped to it. Public content stays.
    pub async fn logout(&self) {
        self.session_file.clear().await;
        self.store.update(|s| {
            s.session = None;
            s.notifications.clear();
            s.recent_chats.clear();
            s.user_chat_ids.clear();
            s.seen_message_ids.clear();
            s.open_chat = None;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use datasvc::SqliteService;
    use std::sync::Arc;

    fn token(name: &str, email: &str) -> String {
        let payload = serde_json::json!({
            "name": name,
            "email": email,
            "picture": "https://img.example/p.png",
            "iss": "https://accounts.example.com",
        });
        format!(
            "eyJhbGciOiJub25lIn0.{}.sig",
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn decodes_claims_from_payload_segment() {
        let claims = decode_identity_token(&token("Asha", "asha@example.com")).unwrap();
        assert_eq!(claims.name, "Asha");
        assert_eq!(claims.email, "asha@example.com");
        assert_eq!(claims.picture, "https://img.example/p.png");
    }

    #[test]
    fn rejects_token_without_payload() {
        assert!(decode_identity_token("justonesegment").is_err());
        assert!(decode_identity_token("a.!!!.c").is_err());
    }

    #[tokio::test]
    async fn login_upserts_by_email_and_keeps_bio() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(SqliteService::in_memory().unwrap());
        let app = App::new(svc.clone(), dir.path().join("session.json"));

        let first = app
            .login_with_token(&token("Asha", "asha@example.com"))
            .await
            .unwrap();
        svc.update_user(
            first.user_id,
            datasvc::rows::ProfileUpdate {
                name: "Asha".into(),
                bio: "founder".into(),
                avatarurl: "https://img.example/p.png".into(),
            },
        )
        .await
        .unwrap();

        let again = app
            .login_with_token(&token("Asha K", "asha@example.com"))
            .await
            .unwrap();
        assert_eq!(again.user_id, first.user_id);
        assert_eq!(again.name, "Asha K");
        assert_eq!(again.bio.as_deref(), Some("founder"));
        assert_eq!(app.current_user().unwrap(), again);
        assert!(app.session_file.load_email().await.is_some());
    }

    #[tokio::test]
    async fn logout_clears_session_scoped_state() {
        let dir = tempfile::tempdir().unwrap();
        let svc = Arc::new(SqliteService::in_memory().unwrap());
        let app = App::new(svc, dir.path().join("session.json"));
        app.login_with_token(&token("Asha", "asha@example.com"))
            .await
            .unwrap();
        app.store.update(|s| {
            s.user_chat_ids.insert(uuid::Uuid::new_v4());
        });

        app.logout().await;

        let state = app.snapshot();
        assert!(state.session.is_none());
        assert!(state.notifications.is_empty());
        assert!(state.recent_chats.is_empty());
        assert!(state.user_chat_ids.is_empty());
        assert!(state.seen_message_ids.is_empty());
        assert!(state.open_chat.is_none());
        assert!(app.session_file.load_email().await.is_none());
        // public content untouched
        assert_eq!(state.users.len(), 1);
    }
}
