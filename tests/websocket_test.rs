//! WebSocket tests against the stub engine.

use fetchkit::engine::{EngineCall, StubEngine};
use fetchkit::ws::{CloseCode, CloseFrame};
use fetchkit::{Client, ErrorKind, Message, NetError, SocketEvent, WebSocketInit};

fn setup() -> (StubEngine, Client) {
    let engine = StubEngine::new();
    let client = Client::with_engine(engine.clone());
    (engine, client)
}

fn close_calls(engine: &StubEngine) -> usize {
    engine.count(|c| matches!(c, EngineCall::CloseConnection(_)))
}

#[tokio::test]
async fn test_rejects_non_websocket_scheme() {
    let (engine, client) = setup();

    let err = client
        .websocket("https://example.test/ws", WebSocketInit::new())
        .await
        .unwrap_err();
    assert_eq!(
        err,
        NetError::InvalidSocketScheme {
            scheme: "https".into()
        }
    );
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(engine.calls().is_empty());
}

#[tokio::test]
async fn test_rejects_unknown_profile() {
    let (engine, client) = setup();

    let err = client
        .websocket("wss://example.test/ws", WebSocketInit::new().browser("opera_1"))
        .await
        .unwrap_err();
    assert!(matches!(err, NetError::InvalidProfile { .. }));
    assert_eq!(
        engine.count(|c| matches!(c, EngineCall::OpenSocket { .. })),
        0
    );
}

#[tokio::test]
async fn test_inbound_messages_are_queued() {
    let (engine, client) = setup();
    let ws = client
        .websocket("wss://example.test/ws", WebSocketInit::new())
        .await
        .unwrap();
    assert_eq!(ws.url().as_str(), "wss://example.test/ws");

    assert!(engine.push_message(ws.handle(), Message::from("one")));
    assert!(engine.push_error(ws.handle(), "glitch"));
    assert!(engine.push_message(ws.handle(), Message::from(vec![1u8, 2, 3])));

    assert_eq!(ws.recv().await, Some(SocketEvent::Message(Message::from("one"))));
    assert_eq!(ws.recv().await, Some(SocketEvent::Error("glitch".into())));
    match ws.recv().await {
        Some(SocketEvent::Message(msg)) => assert!(msg.is_binary()),
        other => panic!("expected binary message, got {other:?}"),
    }
}

#[tokio::test]
async fn test_send_reaches_engine() {
    let (engine, client) = setup();
    let ws = client
        .websocket("ws://example.test/ws", WebSocketInit::new())
        .await
        .unwrap();

    ws.send_text("hello").await.unwrap();
    ws.send_binary(vec![0u8, 1]).await.unwrap();

    let sent: Vec<Message> = engine
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            EngineCall::Send(handle, msg) if handle == ws.handle() => Some(msg),
            _ => None,
        })
        .collect();
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].as_text(), Some("hello"));
    assert!(sent[1].is_binary());
}

#[tokio::test]
async fn test_close_is_idempotent() {
    let (engine, client) = setup();
    let ws = client
        .websocket("wss://example.test/ws", WebSocketInit::new())
        .await
        .unwrap();

    ws.close().await.unwrap();
    ws.close().await.unwrap();
    assert!(ws.is_closed());
    assert!(!engine.is_open(ws.handle()));

    drop(ws);
    assert_eq!(close_calls(&engine), 1);
}

#[tokio::test]
async fn test_send_after_close_fails() {
    let (engine, client) = setup();
    let ws = client
        .websocket("wss://example.test/ws", WebSocketInit::new())
        .await
        .unwrap();
    ws.close().await.unwrap();

    assert_eq!(ws.send_text("late").await.unwrap_err(), NetError::SocketClosed);
    assert_eq!(engine.count(|c| matches!(c, EngineCall::Send(..))), 0);
}

#[tokio::test]
async fn test_peer_close_delivers_event_and_ends_stream() {
    let (engine, client) = setup();
    let ws = client
        .websocket("wss://example.test/ws", WebSocketInit::new())
        .await
        .unwrap();

    let frame = CloseFrame::new(CloseCode::GOING_AWAY, "restart");
    assert!(engine.push_close(ws.handle(), Some(frame.clone())));

    assert!(ws.is_closed());
    assert_eq!(ws.recv().await, Some(SocketEvent::Close(Some(frame))));
    assert_eq!(ws.recv().await, None);

    // Already closed by the peer: nothing left to release.
    ws.close().await.unwrap();
    assert_eq!(close_calls(&engine), 0);
}

#[tokio::test]
async fn test_drop_closes_open_socket() {
    let (engine, client) = setup();
    let ws = client
        .websocket("wss://example.test/ws", WebSocketInit::new())
        .await
        .unwrap();
    let handle = ws.handle();

    drop(ws);

    assert_eq!(
        engine.count(|c| matches!(c, EngineCall::CloseConnection(h) if *h == handle)),
        1
    );
    assert!(!engine.is_open(handle));
}

#[tokio::test]
async fn test_each_socket_gets_its_own_handle() {
    let (_engine, client) = setup();
    let a = client
        .websocket("wss://example.test/a", WebSocketInit::new())
        .await
        .unwrap();
    let b = client
        .websocket("wss://example.test/b", WebSocketInit::new())
        .await
        .unwrap();
    assert_ne!(a.handle(), b.handle());
}
