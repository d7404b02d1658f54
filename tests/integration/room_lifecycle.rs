//! Room lifecycle tests: disconnect notifications, garbage collection, and
//! concurrent joins against one shared hub.
//!
//! Verification command: `cargo test --test room_lifecycle`

use std::sync::{Arc, Barrier};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite;

use lantern_hub::hub::Hub;
use lantern_hub::rooms::RoomRegistry;
use lantern_hub::server::{ServerState, start_server_with_state};
use lantern_proto::signal::{ClientMessage, CodeValue, Role, ServerMessage};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

fn fixed_code_hub() -> Hub {
    Hub::with_registry(RoomRegistry::with_limits(
        64,
        Box::new(|| "4821".to_string()),
    ))
}

async fn start_hub() -> (std::net::SocketAddr, Arc<ServerState>) {
    let state = Arc::new(ServerState::with_hub(fixed_code_hub(), 64 * 1024));
    let (addr, _handle) = start_server_with_state("127.0.0.1:0", Arc::clone(&state))
        .await
        .expect("failed to start test hub");
    (addr, state)
}

async fn connect_as(addr: std::net::SocketAddr, peer_id: &str) -> WsStream {
    let url = format!("ws://{addr}/ws");
    let (mut ws, _) = tokio_tungstenite::connect_async(&url).await.unwrap();
    send(&mut ws, json!({"type": "register-id", "peerId": peer_id})).await;
    ws
}

async fn send(ws: &mut WsStream, value: Value) {
    ws.send(tungstenite::Message::text(value.to_string()))
        .await
        .unwrap();
}

async fn recv(ws: &mut WsStream) -> Value {
    let msg = tokio::time::timeout(Duration::from_secs(5), ws.next())
        .await
        .expect("recv timed out")
        .unwrap()
        .unwrap();
    serde_json::from_slice(&msg.into_data()).unwrap()
}

/// Polls `check` until it holds or a couple of seconds pass.
async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    panic!("condition never became true");
}

/// Connects sender "A" and receivers "B" and "C" to room "home".
async fn populated_room(addr: std::net::SocketAddr) -> (WsStream, WsStream, WsStream) {
    let mut a = connect_as(addr, "A").await;
    send(&mut a, json!({"type": "join", "room": "home", "role": "sender"})).await;
    let _joined = recv(&mut a).await;
    let _code = recv(&mut a).await;

    let mut receivers = Vec::new();
    for name in ["B", "C"] {
        let mut ws = connect_as(addr, name).await;
        send(
            &mut ws,
            json!({"type": "join", "room": "home", "role": "receiver", "code": "4821"}),
        )
        .await;
        let _joined = recv(&mut ws).await;
        let _ready = recv(&mut ws).await;
        receivers.push(ws);
    }
    let c = receivers.pop().unwrap();
    let b = receivers.pop().unwrap();
    (a, b, c)
}

// =============================================================================
// Disconnect reconciliation over WebSocket
// =============================================================================

#[tokio::test]
async fn sender_leaving_notifies_all_receivers() {
    let (addr, state) = start_hub().await;
    let (mut a, mut b, mut c) = populated_room(addr).await;

    a.close(None).await.unwrap();

    assert_eq!(recv(&mut b).await, json!({"type": "sender-left"}));
    assert_eq!(recv(&mut c).await, json!({"type": "sender-left"}));
    let room = state.hub.room("home").unwrap();
    assert_eq!(room.sender, None);
    assert_eq!(room.receivers.len(), 2);
}

#[tokio::test]
async fn receiver_leaving_notifies_sender() {
    let (addr, state) = start_hub().await;
    let (mut a, mut b, _c) = populated_room(addr).await;

    b.close(None).await.unwrap();

    assert_eq!(
        recv(&mut a).await,
        json!({"type": "receiver-left", "peerId": "B"})
    );
    eventually(|| state.hub.room("home").is_some_and(|r| r.receivers.len() == 1)).await;
}

#[tokio::test]
async fn dropped_tcp_connection_is_reconciled() {
    let (addr, state) = start_hub().await;
    let (mut a, b, _c) = populated_room(addr).await;

    drop(b);

    assert_eq!(
        recv(&mut a).await,
        json!({"type": "receiver-left", "peerId": "B"})
    );
    eventually(|| state.hub.connection_count() == 2).await;
}

#[tokio::test]
async fn empty_room_is_collected() {
    let (addr, state) = start_hub().await;
    let (a, b, c) = populated_room(addr).await;
    assert_eq!(state.hub.room_count(), 1);

    drop(a);
    drop(b);
    drop(c);

    eventually(|| state.hub.room_count() == 0 && state.hub.connection_count() == 0).await;
}

#[tokio::test]
async fn new_sender_after_sender_left_reaches_waiting_receivers() {
    let (addr, _state) = start_hub().await;
    let (mut a, mut b, mut c) = populated_room(addr).await;
    a.close(None).await.unwrap();
    assert_eq!(recv(&mut b).await, json!({"type": "sender-left"}));
    assert_eq!(recv(&mut c).await, json!({"type": "sender-left"}));

    let mut d = connect_as(addr, "D").await;
    send(&mut d, json!({"type": "join", "room": "home", "role": "sender"})).await;
    assert_eq!(recv(&mut d).await, json!({"type": "joined", "role": "sender"}));
    assert_eq!(recv(&mut d).await, json!({"type": "room-code", "code": "4821"}));

    assert_eq!(recv(&mut b).await, json!({"type": "sender-ready"}));
    assert_eq!(recv(&mut c).await, json!({"type": "sender-ready"}));
}

// =============================================================================
// Concurrency against a shared hub
// =============================================================================

#[test]
fn concurrent_joins_and_leaves_keep_invariants() {
    let hub = Arc::new(fixed_code_hub());
    let rooms = ["r0", "r1", "r2"];

    let workers: Vec<_> = (0..8)
        .map(|worker| {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || {
                let mut outboxes = Vec::new();
                for i in 0..200 {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let id = hub.connect(tx);
                    outboxes.push(rx);
                    hub.handle(
                        id,
                        ClientMessage::RegisterId {
                            peer_id: format!("w{worker}-{i}"),
                        },
                    );
                    let role = if i % 7 == 0 {
                        Role::Sender
                    } else {
                        Role::Receiver
                    };
                    hub.handle(
                        id,
                        ClientMessage::Join {
                            room: rooms[i % rooms.len()].to_string(),
                            role,
                            code: Some(CodeValue::Text("4821".to_string())),
                        },
                    );
                    if i % 3 != 0 {
                        hub.disconnect(id);
                    }
                }
                outboxes
            })
        })
        .collect();

    let mut outboxes = Vec::new();
    for worker in workers {
        outboxes.extend(worker.join().unwrap());
    }

    for name in rooms {
        if let Some(room) = hub.room(name) {
            assert!(room.sender.is_some() || !room.receivers.is_empty());
            if let Some(sender) = room.sender {
                assert!(!room.receivers.contains(&sender));
                let m = hub.membership(sender).unwrap();
                assert_eq!(m.role, Some(Role::Sender));
                assert_eq!(m.room.as_deref(), Some(name));
            }
            for receiver in &room.receivers {
                let m = hub.membership(*receiver).unwrap();
                assert_eq!(m.role, Some(Role::Receiver));
                assert_eq!(m.room.as_deref(), Some(name));
            }
        }
    }

    // Every join carried the right code and no room limit was hit.
    for rx in &mut outboxes {
        while let Ok(msg) = rx.try_recv() {
            assert!(!matches!(msg, ServerMessage::JoinDenied { .. }), "unexpected {msg:?}");
        }
    }
}

#[test]
fn sole_sender_survives_concurrent_takeovers() {
    let hub = Arc::new(fixed_code_hub());

    let workers: Vec<_> = (0..8)
        .map(|_| {
            let hub = Arc::clone(&hub);
            std::thread::spawn(move || {
                let (tx, rx) = mpsc::unbounded_channel();
                let id = hub.connect(tx);
                hub.handle(
                    id,
                    ClientMessage::Join {
                        room: "stage".to_string(),
                        role: Role::Sender,
                        code: None,
                    },
                );
                (id, rx)
            })
        })
        .collect();
    let peers: Vec<_> = workers.into_iter().map(|w| w.join().unwrap()).collect();

    let room = hub.room("stage").unwrap();
    let sender = room.sender.unwrap();
    assert_eq!(room.receivers.len(), 7);
    assert!(!room.receivers.contains(&sender));

    for (id, mut rx) in peers {
        let mut demoted = false;
        while let Ok(msg) = rx.try_recv() {
            if msg
                == (ServerMessage::RoleChanged {
                    new_role: Role::Receiver,
                })
            {
                demoted = true;
            }
        }
        assert_eq!(demoted, id != sender, "connection {id}");
    }
}

#[test]
fn join_racing_own_disconnect_leaves_no_room() {
    let hub = Arc::new(fixed_code_hub());

    for i in 0..2000 {
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = hub.connect(tx);
        let role = if i % 2 == 0 {
            Role::Receiver
        } else {
            Role::Sender
        };
        let barrier = Arc::new(Barrier::new(2));

        let joiner = {
            let hub = Arc::clone(&hub);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                hub.handle(
                    id,
                    ClientMessage::Join {
                        room: format!("race-{}", i % 4),
                        role,
                        code: Some(CodeValue::Text("4821".to_string())),
                    },
                );
            })
        };
        barrier.wait();
        hub.disconnect(id);
        joiner.join().unwrap();

        assert_eq!(hub.connection_count(), 0);
        assert_eq!(hub.room_count(), 0, "room kept after iteration {i}");
    }
}

