use std::time::Duration;

use tokio::sync::mpsc;

use super::membership::Memberships;
use super::reconciler::Reconciler;
use super::transport::{ConnectionState, RetryPolicy, SocketManager, retry_delay};
use crate::model::{Comment, OwnReaction, ReactionAction, ReactionCounters};
use crate::transport::message::ServerEvent;

fn comment(id: &str, author: &str, parent: Option<&str>) -> Comment {
    Comment {
        id: id.to_string(),
        author_id: author.to_string(),
        author_name: author.to_string(),
        body: "hello".to_string(),
        parent_id: parent.map(str::to_string),
        created_at_ms: 0,
        counters: ReactionCounters::default(),
    }
}

fn reaction(
    entity: &str,
    subject: &str,
    action: ReactionAction,
    likes: u32,
    dislikes: u32,
    own: Option<OwnReaction>,
) -> ServerEvent {
    ServerEvent::ReactionChanged {
        entity_id: entity.to_string(),
        subject_id: subject.to_string(),
        action,
        counters: ReactionCounters { likes, dislikes },
        own_reaction: own,
    }
}

// -- reconciler --

#[test]
fn own_status_survives_counters_only_merge() {
    let mut rec = Reconciler::new("alice");
    rec.seed_reaction("c1", ReactionCounters { likes: 3, dislikes: 1 });
    rec.set_own_reaction("c1", Some(OwnReaction::Liked));

    // Someone else liked; the broadcast carries no own-state.
    rec.apply(reaction("c1", "bob", ReactionAction::Added, 4, 1, None));

    let entry = rec.reaction("c1").unwrap();
    assert_eq!(entry.counters, ReactionCounters { likes: 4, dislikes: 1 });
    assert_eq!(entry.own, Some(OwnReaction::Liked));
}

#[test]
fn explicit_own_state_is_taken() {
    let mut rec = Reconciler::new("alice");
    rec.apply(reaction(
        "c1",
        "alice",
        ReactionAction::Switched,
        2,
        5,
        Some(OwnReaction::Disliked),
    ));
    assert_eq!(rec.reaction("c1").unwrap().own, Some(OwnReaction::Disliked));
}

#[test]
fn own_removal_clears_own_state() {
    let mut rec = Reconciler::new("alice");
    rec.set_own_reaction("c1", Some(OwnReaction::Liked));

    rec.apply(reaction("c1", "alice", ReactionAction::Removed, 2, 1, None));
    assert_eq!(rec.reaction("c1").unwrap().own, None);
}

#[test]
fn someone_elses_removal_keeps_own_state() {
    let mut rec = Reconciler::new("alice");
    rec.set_own_reaction("c1", Some(OwnReaction::Liked));

    rec.apply(reaction("c1", "bob", ReactionAction::Removed, 2, 1, None));
    assert_eq!(rec.reaction("c1").unwrap().own, Some(OwnReaction::Liked));
}

#[test]
fn duplicate_creation_is_idempotent() {
    let mut rec = Reconciler::new("alice");
    rec.apply(ServerEvent::CommentCreated {
        comment: comment("c1", "bob", None),
    });
    rec.apply(ServerEvent::CommentCreated {
        comment: comment("c1", "bob", None),
    });
    assert_eq!(rec.comments().len(), 1);

    rec.apply(ServerEvent::ReplyCreated {
        reply: comment("r1", "carol", Some("c1")),
        parent_id: "c1".to_string(),
    });
    rec.apply(ServerEvent::ReplyCreated {
        reply: comment("r1", "carol", Some("c1")),
        parent_id: "c1".to_string(),
    });
    assert_eq!(rec.replies_of("c1").len(), 1);
}

#[test]
fn update_replaces_but_never_inserts() {
    let mut rec = Reconciler::new("alice");
    rec.seed_comments(vec![comment("c1", "bob", None)]);

    let mut edited = comment("c1", "bob", None);
    edited.body = "edited".to_string();
    rec.apply(ServerEvent::CommentUpdated { comment: edited });
    assert_eq!(rec.comments()[0].body, "edited");

    // An update for an entity we do not hold is dropped, not inserted.
    rec.apply(ServerEvent::CommentUpdated {
        comment: comment("ghost", "bob", None),
    });
    assert_eq!(rec.comments().len(), 1);
}

#[test]
fn delete_propagates_across_collections() {
    let mut rec = Reconciler::new("alice");
    // "x" is cached both as a top-level comment and under a reply list.
    rec.seed_comments(vec![comment("x", "bob", None), comment("c2", "bob", None)]);
    rec.seed_replies("c2", vec![comment("x", "bob", Some("c2"))]);
    rec.seed_reaction("x", ReactionCounters { likes: 1, dislikes: 0 });

    rec.apply(ServerEvent::CommentDeleted {
        entity_id: "x".to_string(),
        parent_id: None,
    });

    assert!(rec.comments().iter().all(|c| c.id != "x"));
    assert!(rec.replies_of("c2").is_empty());
    assert!(rec.reaction("x").is_none());
}

#[test]
fn typing_set_tracks_start_and_stop_and_hides_self() {
    let mut rec = Reconciler::new("alice");
    for (subject, typing) in [("bob", true), ("alice", true), ("carol", true)] {
        rec.apply(ServerEvent::Typing {
            entity_id: "c1".to_string(),
            subject_id: subject.to_string(),
            typing,
        });
    }
    assert_eq!(rec.typing_for("c1"), vec!["bob", "carol"]);

    rec.apply(ServerEvent::Typing {
        entity_id: "c1".to_string(),
        subject_id: "bob".to_string(),
        typing: false,
    });
    assert_eq!(rec.typing_for("c1"), vec!["carol"]);
}

#[test]
fn malformed_frames_are_dropped_quietly() {
    let mut rec = Reconciler::new("alice");
    rec.seed_comments(vec![comment("c1", "bob", None)]);

    rec.apply_json("{ not json");
    rec.apply_json("{\"type\": \"mystery_event\", \"entity_id\": \"c1\"}");
    rec.apply_json("{\"type\": \"comment_deleted\"}");

    assert_eq!(rec.comments().len(), 1);
}

#[test]
fn reaction_merge_refreshes_embedded_counters() {
    let mut rec = Reconciler::new("alice");
    rec.seed_comments(vec![comment("c1", "bob", None)]);
    rec.seed_replies("c1", vec![comment("r1", "carol", Some("c1"))]);

    rec.apply(reaction("r1", "bob", ReactionAction::Added, 7, 0, None));
    assert_eq!(rec.replies_of("c1")[0].counters.likes, 7);
}

// -- backoff schedule --

#[test]
fn retry_delay_doubles_and_caps() {
    let policy = RetryPolicy {
        base: Duration::from_millis(100),
        cap: Duration::from_millis(800),
        max_attempts: 10,
    };
    assert_eq!(retry_delay(&policy, 1), Duration::from_millis(100));
    assert_eq!(retry_delay(&policy, 2), Duration::from_millis(200));
    assert_eq!(retry_delay(&policy, 3), Duration::from_millis(400));
    assert_eq!(retry_delay(&policy, 4), Duration::from_millis(800));
    assert_eq!(retry_delay(&policy, 5), Duration::from_millis(800));
    assert_eq!(retry_delay(&policy, 32), Duration::from_millis(800));
}

// -- socket manager --

fn manager(token: Option<&str>, policy: RetryPolicy) -> SocketManager {
    let port = portpicker::pick_unused_port().expect("No free ports");
    let (events, _rx) = mpsc::unbounded_channel();
    // Nothing listens on the picked port, so every dial fails.
    SocketManager::new(
        format!("ws://127.0.0.1:{port}"),
        token.map(str::to_string),
        policy,
        events,
    )
}

#[tokio::test]
async fn connect_without_credential_fails_without_dialing() {
    let mgr = manager(None, RetryPolicy::default());
    assert!(mgr.connect().is_err());
    assert_eq!(mgr.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn retry_budget_exhaustion_lands_in_failed() {
    let mgr = manager(
        Some("token"),
        RetryPolicy {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(40),
            max_attempts: 3,
        },
    );
    mgr.connect().unwrap();

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(mgr.state(), ConnectionState::Failed);
}

#[tokio::test]
async fn disconnect_cancels_pending_retry() {
    let mgr = manager(
        Some("token"),
        RetryPolicy {
            base: Duration::from_millis(200),
            cap: Duration::from_millis(200),
            max_attempts: 10,
        },
    );
    mgr.connect().unwrap();

    // Let the first dial fail and a retry timer get scheduled.
    tokio::time::sleep(Duration::from_millis(50)).await;
    mgr.disconnect();

    // Well past the scheduled delay: nothing may have fired.
    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
    assert_eq!(mgr.attempts(), 0);
}

#[tokio::test]
async fn disconnect_is_idempotent() {
    let mgr = manager(Some("token"), RetryPolicy::default());
    mgr.disconnect();
    mgr.disconnect();
    assert_eq!(mgr.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn manual_reconnect_resets_the_attempt_counter() {
    let mgr = manager(
        Some("token"),
        RetryPolicy {
            base: Duration::from_millis(10),
            cap: Duration::from_millis(20),
            max_attempts: 2,
        },
    );
    mgr.connect().unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(mgr.state(), ConnectionState::Failed);

    mgr.reconnect().unwrap();
    assert_eq!(mgr.attempts(), 0);
    assert_ne!(mgr.state(), ConnectionState::Failed);

    mgr.disconnect();
}

// -- membership tracking --

fn memberships() -> Memberships {
    let socket = manager(Some("token"), RetryPolicy::default());
    Memberships::new(
        socket,
        Duration::from_millis(50),
        Duration::from_millis(200),
    )
}

#[tokio::test]
async fn join_is_deduplicated_and_leave_forgets() {
    let m = memberships();
    m.join("c1");
    m.join("c1");
    assert!(m.is_joined("c1"));

    m.leave("c1");
    assert!(!m.is_joined("c1"));
    m.leave("c1");
}

#[tokio::test]
async fn joined_set_survives_for_rejoin() {
    let m = memberships();
    m.join("c1");
    m.join("c2");
    // No transport connected; the set is untouched by connection state.
    m.rejoin_all();
    assert!(m.is_joined("c1"));
    assert!(m.is_joined("c2"));
}

#[tokio::test]
async fn typing_start_is_debounced_and_idles_out() {
    let m = memberships();
    m.keystroke("c1");
    assert!(!m.is_typing("c1"));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(m.is_typing("c1"));

    // No further keystrokes: the idle timer emits the stop.
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!m.is_typing("c1"));
}

#[tokio::test]
async fn keystrokes_extend_the_idle_deadline() {
    let m = memberships();
    m.keystroke("c1");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(m.is_typing("c1"));

    for _ in 0..3 {
        tokio::time::sleep(Duration::from_millis(120)).await;
        m.keystroke("c1");
    }
    // Each keystroke pushed the 200ms idle stop out.
    assert!(m.is_typing("c1"));

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(!m.is_typing("c1"));
}

#[tokio::test]
async fn stop_before_debounce_cancels_the_start() {
    let m = memberships();
    m.keystroke("c1");
    m.stop_typing("c1");

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(!m.is_typing("c1"));
}

#[tokio::test]
async fn teardown_cancels_all_timers() {
    let m = memberships();
    m.keystroke("c1");
    m.keystroke("c2");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(m.is_typing("c1"));

    m.teardown();
    assert!(!m.is_typing("c1"));
    assert!(!m.is_typing("c2"));

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(!m.is_typing("c1"));
}
