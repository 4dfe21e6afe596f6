use std::time::Duration;

use chatlink_relay::db::{self, MessageType};
use chatlink_relay::protocol::{ClientEvent, ServerEvent};
use chatlink_relay::relay::{Outbound, Relay, RelayHandle, SessionId};
use chatlink_relay::ws::handle_event;
use sqlx::SqlitePool;
use sqlx::sqlite::SqlitePoolOptions;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::time::timeout;
use uuid::Uuid;

async fn setup() -> (SqlitePool, RelayHandle) {
    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    db::init(&db_pool).await.unwrap();
    (db_pool, Relay::spawn())
}

fn connect(relay: &RelayHandle) -> (SessionId, Outbound, UnboundedReceiver<ServerEvent>) {
    let session = Uuid::now_v7();
    let (outbound, rx) = mpsc::unbounded_channel();
    relay.connect(session, outbound.clone());
    (session, outbound, rx)
}

async fn seed_user(db_pool: &SqlitePool, id: &str, name: &str) {
    sqlx::query("INSERT INTO users (id,name,image) VALUES (?,?,NULL)")
        .bind(id)
        .bind(name)
        .execute(db_pool)
        .await
        .unwrap();
}

fn send_event(user_id: &str, room_id: &str, content: &str) -> ClientEvent {
    ClientEvent::SendMessage {
        user_id: user_id.to_owned(),
        room_id: room_id.to_owned(),
        content: content.to_owned(),
        kind: MessageType::Text,
    }
}

async fn recv(rx: &mut UnboundedReceiver<ServerEvent>) -> ServerEvent {
    timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

fn join(room_id: &str) -> ClientEvent {
    ClientEvent::JoinRoom { room_id: room_id.to_owned() }
}

#[tokio::test]
async fn send_reaches_all_room_members_including_sender() {
    let (db_pool, relay) = setup().await;
    seed_user(&db_pool, "A", "Alice").await;

    let (a, a_out, mut a_rx) = connect(&relay);
    let (b, b_out, mut b_rx) = connect(&relay);

    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, b, &b_out, join("r1")).await;
    handle_event(&db_pool, &relay, a, &a_out, send_event("A", "r1", "hi")).await;

    for rx in [&mut a_rx, &mut b_rx] {
        let ServerEvent::Message { data } = recv(rx).await else {
            panic!("expected message event");
        };
        assert_eq!(data.message.content, "hi");
        assert_eq!(data.message.user_id, "A");
        assert_eq!(data.user.name.as_deref(), Some("Alice"));
    }
}

#[tokio::test]
async fn other_rooms_receive_nothing() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    let (c, c_out, mut c_rx) = connect(&relay);

    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, c, &c_out, join("r2")).await;
    handle_event(&db_pool, &relay, a, &a_out, send_event("A", "r1", "hello")).await;

    // once the sender's echo has arrived, the fan-out command has run
    assert!(matches!(recv(&mut a_rx).await, ServerEvent::Message { .. }));
    assert!(c_rx.try_recv().is_err());
}

#[tokio::test]
async fn repeated_joins_deliver_one_event() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    let (b, b_out, mut b_rx) = connect(&relay);

    for _ in 0..3 {
        handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    }
    handle_event(&db_pool, &relay, b, &b_out, join("r1")).await;
    handle_event(&db_pool, &relay, b, &b_out, send_event("B", "r1", "once")).await;

    assert!(matches!(recv(&mut b_rx).await, ServerEvent::Message { .. }));
    assert!(matches!(recv(&mut a_rx).await, ServerEvent::Message { .. }));
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn disconnected_session_receives_nothing() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    let (b, b_out, mut b_rx) = connect(&relay);

    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, b, &b_out, join("r1")).await;
    relay.disconnect(a);

    handle_event(&db_pool, &relay, b, &b_out, send_event("B", "r1", "anyone?")).await;

    assert!(matches!(recv(&mut b_rx).await, ServerEvent::Message { .. }));
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn dropped_receiver_is_evicted_without_breaking_fanout() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, a_rx) = connect(&relay);
    let (b, b_out, mut b_rx) = connect(&relay);

    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, b, &b_out, join("r1")).await;

    // transport died without a disconnect ever reaching the relay
    drop(a_rx);

    handle_event(&db_pool, &relay, b, &b_out, send_event("B", "r1", "first")).await;
    let ServerEvent::Message { data } = recv(&mut b_rx).await else {
        panic!("expected message event");
    };
    assert_eq!(data.message.content, "first");

    // the stale session was evicted during that fan-out; later sends still land
    handle_event(&db_pool, &relay, b, &b_out, send_event("B", "r1", "second")).await;
    let ServerEvent::Message { data } = recv(&mut b_rx).await else {
        panic!("expected message event");
    };
    assert_eq!(data.message.content, "second");
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn explicit_leave_stops_delivery() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    let (b, b_out, mut b_rx) = connect(&relay);

    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, b, &b_out, join("r1")).await;
    handle_event(
        &db_pool,
        &relay,
        a,
        &a_out,
        ClientEvent::LeaveRoom { room_id: "r1".to_owned() },
    )
    .await;

    handle_event(&db_pool, &relay, b, &b_out, send_event("B", "r1", "bye")).await;

    assert!(matches!(recv(&mut b_rx).await, ServerEvent::Message { .. }));
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn failed_persist_broadcasts_nothing() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    let (b, b_out, mut b_rx) = connect(&relay);

    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, b, &b_out, join("r1")).await;

    db_pool.close().await;
    handle_event(&db_pool, &relay, a, &a_out, send_event("A", "r1", "lost")).await;

    // the failure is reported to the sender only
    assert!(matches!(recv(&mut a_rx).await, ServerEvent::Error { .. }));
    assert!(a_rx.try_recv().is_err());
    assert!(b_rx.try_recv().is_err());
}

#[tokio::test]
async fn unknown_sender_still_broadcasts_with_bare_profile() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;
    handle_event(&db_pool, &relay, a, &a_out, send_event("ghost", "r1", "boo")).await;

    let ServerEvent::Message { data } = recv(&mut a_rx).await else {
        panic!("expected message event");
    };
    assert_eq!(data.message.content, "boo");
    assert_eq!(data.user.id, "ghost");
    assert_eq!(data.user.name, None);
    assert!(a_rx.try_recv().is_err());
}

#[tokio::test]
async fn empty_input_is_rejected_before_any_io() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;

    handle_event(&db_pool, &relay, a, &a_out, send_event("A", "r1", "")).await;
    assert!(matches!(recv(&mut a_rx).await, ServerEvent::Error { .. }));

    handle_event(&db_pool, &relay, a, &a_out, join("")).await;
    assert!(matches!(recv(&mut a_rx).await, ServerEvent::Error { .. }));

    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM messages")
        .fetch_one(&db_pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn join_from_unknown_session_is_ignored() {
    let (db_pool, relay) = setup().await;

    let (a, a_out, mut a_rx) = connect(&relay);
    handle_event(&db_pool, &relay, a, &a_out, join("r1")).await;

    // never connected, so the relay drops the join on the floor
    let stranger = Uuid::now_v7();
    let (stranger_out, mut stranger_rx) = mpsc::unbounded_channel();
    handle_event(&db_pool, &relay, stranger, &stranger_out, join("r1")).await;

    handle_event(&db_pool, &relay, a, &a_out, send_event("A", "r1", "hi")).await;

    assert!(matches!(recv(&mut a_rx).await, ServerEvent::Message { .. }));
    assert!(stranger_rx.try_recv().is_err());
}
