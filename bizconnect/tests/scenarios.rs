//! Two engines sharing one data service, standing in for two signed-in
//! devices. Each test pumps the changefeed by hand so delivery order and
//! timing are deterministic.

use std::sync::Arc;

use bizconnect::model::{Reward, RewardType, User};
use bizconnect::mutate::{NewChallengeInput, NewPostInput, PollInput};
use bizconnect::{reconcile, App};
use datasvc::event::Change;
use datasvc::rows::UserUpsert;
use datasvc::{DataService, SqliteService};
use tokio::sync::broadcast;

struct Client {
    app: App<SqliteService>,
    rx: broadcast::Receiver<Change>,
    _dir: tempfile::TempDir,
}

impl Client {
    async fn new(svc: Arc<SqliteService>, user: &User) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let rx = svc.subscribe();
        let app = App::new(svc, dir.path().join("session.json"));
        app.initial_load().await.unwrap();
        app.store.update(|s| s.session = Some(user.clone()));
        app.load_user_data(user).await.unwrap();
        Self { app, rx, _dir: dir }
    }

    /// Apply every pending changefeed event, including ones produced by the
    /// effects of earlier ones.
    async fn pump(&mut self) {
        while let Ok(change) = self.rx.try_recv() {
            reconcile::handle_change(&self.app, change).await;
        }
    }
}

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
async fn reaching_out_creates_one_chat_and_notifies_the_owner() {
    let svc = Arc::new(SqliteService::in_memory().unwrap());
    let asha = seed_user(&svc, "asha").await;
    let ravi = seed_user(&svc, "ravi").await;
    let mut owner = Client::new(svc.clone(), &asha).await;
    let mut solver = Client::new(svc.clone(), &ravi).await;

    owner
        .app
        .create_challenge(NewChallengeInput {
            title: "Fix cold-chain logistics".into(),
            description: "Produce spoils in transit".into(),
            detailed_description: "Detail".into(),
            industry: "agritech".into(),
            reward: Reward {
                kind: RewardType::Money,
                value: "100000".into(),
            },
        })
        .await
        .unwrap();
    solver.pump().await;

    let item = {
        let state = solver.app.snapshot();
        assert_eq!(state.problems.len(), 1);
        state.item_by_id(state.problems[0].id).unwrap()
    };
    solver.app.open_item_chat(&item).await.unwrap();
    solver.app.send_chat_message("Interested!").await.unwrap();

    // the owner's device sees membership, then the message
    owner.pump().await;

    let chats = svc.list_chats().await.unwrap();
    assert_eq!(chats.len(), 1);
    let participants = svc.list_chat_participants().await.unwrap();
    assert_eq!(participants.len(), 2);

    let state = owner.app.snapshot();
    assert_eq!(state.notifications.len(), 1);
    assert_eq!(state.notifications[0].message, "sent you a new message.");
    assert_eq!(state.notifications[0].actor, ravi);
    assert_eq!(state.recent_chats.len(), 1);
    assert_eq!(state.recent_chats[0].item.title(), "Fix cold-chain logistics");
    assert_eq!(
        state.recent_chats[0].last_message_text.as_deref(),
        Some("Interested!")
    );

    // with the window open, a redelivered message event lands exactly once
    owner.app.open_item_chat(&item).await.unwrap();
    let mut replay = svc.subscribe();
    solver.app.send_chat_message("Still interested!").await.unwrap();
    let change = replay.recv().await.unwrap();
    reconcile::handle_change(&owner.app, change.clone()).await;
    reconcile::handle_change(&owner.app, change).await;
    let state = owner.app.snapshot();
    assert_eq!(state.open_chat.as_ref().unwrap().messages.len(), 2);
    assert_eq!(state.recent_chats.len(), 1);
    assert_eq!(
        state.recent_chats[0].last_message_text.as_deref(),
        Some("Still interested!")
    );

    // with the window closed, redelivery must not write a second notification
    owner.app.close_chat();
    let mut replay = svc.subscribe();
    solver.app.send_chat_message("One more thing").await.unwrap();
    let change = replay.recv().await.unwrap();
    reconcile::handle_change(&owner.app, change.clone()).await;
    reconcile::handle_change(&owner.app, change).await;
    owner.pump().await;
    let state = owner.app.snapshot();
    assert_eq!(state.notifications.len(), 2);
    let rows = svc.list_notifications_for(asha.user_id, 20).await.unwrap();
    assert_eq!(rows.len(), 2);
}

#[tokio::test]
async fn remote_vote_shows_up_in_the_poll_percentages() {
    let svc = Arc::new(SqliteService::in_memory().unwrap());
    let asha = seed_user(&svc, "asha").await;
    let ravi = seed_user(&svc, "ravi").await;
    let mut owner = Client::new(svc.clone(), &asha).await;
    let solver = Client::new(svc.clone(), &ravi).await;

    let post = owner
        .app
        .create_post(NewPostInput {
            text: "Should we go B2B?".into(),
            image_url: None,
            poll: Some(PollInput {
                duration_days: 3,
                options: vec!["Yes".into(), "No".into()],
            }),
        })
        .await
        .unwrap();
    let yes = post.poll.as_ref().unwrap().options[0].id;

    // polls ride along with posts, so the second device reloads to see one
    solver.app.initial_load().await.unwrap();
    solver.app.vote_on_poll(post.id, yes).await.unwrap();

    owner.pump().await;
    let state = owner.app.snapshot();
    let poll = state.post_by_id(post.id).unwrap().poll.as_ref().unwrap();
    assert_eq!(poll.total_votes(), 1);
    assert_eq!(poll.vote_share(yes), 100.0);
}

#[tokio::test]
async fn like_echoes_keep_counts_exact_and_notify_once() {
    let svc = Arc::new(SqliteService::in_memory().unwrap());
    let asha = seed_user(&svc, "asha").await;
    let ravi = seed_user(&svc, "ravi").await;
    let mut owner = Client::new(svc.clone(), &asha).await;
    let mut solver = Client::new(svc.clone(), &ravi).await;

    let post = owner
        .app
        .create_post(NewPostInput {
            text: "We just shipped our beta".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    solver.pump().await;

    solver.app.toggle_like(post.id).await.unwrap();
    owner.pump().await;
    solver.pump().await;

    let owner_state = owner.app.snapshot();
    assert_eq!(owner_state.post_by_id(post.id).unwrap().likes.len(), 1);
    assert_eq!(owner_state.notifications.len(), 1);
    assert_eq!(
        owner_state.notifications[0].message,
        "liked your post: \"We just shipped our beta...\""
    );
    // the liker's own echo leaves their optimistic state untouched
    assert_eq!(
        solver.app.snapshot().post_by_id(post.id).unwrap().likes.len(),
        1
    );

    solver.app.toggle_like(post.id).await.unwrap();
    owner.pump().await;
    assert!(owner
        .app
        .snapshot()
        .post_by_id(post.id)
        .unwrap()
        .likes
        .is_empty());
}

#[tokio::test]
async fn own_writes_confirm_without_duplicating_through_the_feed() {
    let svc = Arc::new(SqliteService::in_memory().unwrap());
    let asha = seed_user(&svc, "asha").await;
    let mut owner = Client::new(svc.clone(), &asha).await;

    let post = owner
        .app
        .create_post(NewPostInput {
            text: "hello network".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    owner.app.add_comment(post.id, "first!").await.unwrap();
    owner.pump().await;

    let state = owner.app.snapshot();
    assert_eq!(state.posts.len(), 1);
    assert_eq!(state.posts[0].id, post.id);
    assert_eq!(state.posts[0].comments.len(), 1);
    // commenting on your own post never notifies you
    assert!(state.notifications.is_empty());
}

#[tokio::test]
async fn redelivered_events_write_no_extra_notifications() {
    let svc = Arc::new(SqliteService::in_memory().unwrap());
    let asha = seed_user(&svc, "asha").await;
    let ravi = seed_user(&svc, "ravi").await;
    let mut owner = Client::new(svc.clone(), &asha).await;
    let mut solver = Client::new(svc.clone(), &ravi).await;

    let post = owner
        .app
        .create_post(NewPostInput {
            text: "Feedback welcome".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    solver.pump().await;

    // the comment event reaches the owner's device three times over
    let mut replay = svc.subscribe();
    solver.app.add_comment(post.id, "Let's talk").await.unwrap();
    let change = replay.recv().await.unwrap();
    reconcile::handle_change(&owner.app, change.clone()).await;
    reconcile::handle_change(&owner.app, change.clone()).await;
    owner.pump().await;
    reconcile::handle_change(&owner.app, change).await;

    let rows = svc.list_notifications_for(asha.user_id, 20).await.unwrap();
    assert_eq!(rows.len(), 1);
    let state = owner.app.snapshot();
    assert_eq!(state.notifications.len(), 1);
    assert_eq!(state.post_by_id(post.id).unwrap().comments.len(), 1);

    // same for a like event
    let mut replay = svc.subscribe();
    solver.app.toggle_like(post.id).await.unwrap();
    let change = replay.recv().await.unwrap();
    reconcile::handle_change(&owner.app, change.clone()).await;
    reconcile::handle_change(&owner.app, change).await;
    owner.pump().await;

    let rows = svc.list_notifications_for(asha.user_id, 20).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(owner.app.snapshot().post_by_id(post.id).unwrap().likes.len(), 1);
}

#[tokio::test]
async fn comment_from_another_user_notifies_the_post_owner() {
    let svc = Arc::new(SqliteService::in_memory().unwrap());
    let asha = seed_user(&svc, "asha").await;
    let ravi = seed_user(&svc, "ravi").await;
    let mut owner = Client::new(svc.clone(), &asha).await;
    let mut solver = Client::new(svc.clone(), &ravi).await;

    let post = owner
        .app
        .create_post(NewPostInput {
            text: "Looking for a technical cofounder".into(),
            ..Default::default()
        })
        .await
        .unwrap();
    solver.pump().await;
    solver.app.add_comment(post.id, "Let's talk").await.unwrap();

    owner.pump().await;
    let state = owner.app.snapshot();
    assert_eq!(state.post_by_id(post.id).unwrap().comments.len(), 1);
    assert_eq!(state.notifications.len(), 1);
    assert_eq!(
        state.notifications[0].message,
        "commented on your post: \"Looking for a techni...\""
    );
    assert_eq!(
        state.notifications[0].actor.user_id,
        ravi.user_id
    );
}
