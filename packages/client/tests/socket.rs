//! End-to-end tests for the room WebSocket connection manager, driven
//! against a loopback tungstenite server.

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use parley_client::{ChatEvent, ChatSocket, ClientFrame, ConnectionState, StreamError, TokenCell};

type WsConn = WebSocketStream<TcpStream>;

const MESSAGE_JSON: &str = r#"{
    "type": "message",
    "message": {
        "ID": 1,
        "room_id": 7,
        "sender_id": 2,
        "sender": null,
        "content": "hello there",
        "is_read": false,
        "CreatedAt": "2024-01-01T00:00:00Z",
        "UpdatedAt": "2024-01-01T00:00:00Z"
    }
}"#;

struct TestServer {
    url: String,
    paths: Arc<Mutex<Vec<String>>>,
    accepted: Arc<AtomicUsize>,
}

impl TestServer {
    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    fn path(&self, index: usize) -> String {
        self.paths.lock().unwrap()[index].clone()
    }
}

/// Spawn a WebSocket server on a random loopback port. `handler` runs once
/// per accepted connection with the connection ordinal.
async fn spawn_server<F, Fut>(handler: F) -> TestServer
where
    F: Fn(WsConn, usize) -> Fut + Clone + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let paths: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
    let accepted = Arc::new(AtomicUsize::new(0));

    let task_paths = paths.clone();
    let task_accepted = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let ordinal = task_accepted.fetch_add(1, Ordering::SeqCst);
            let paths = task_paths.clone();
            let handler = handler.clone();
            tokio::spawn(async move {
                let callback = move |req: &Request, resp: Response| -> Result<Response, ErrorResponse> {
                    paths.lock().unwrap().push(req.uri().to_string());
                    Ok(resp)
                };
                if let Ok(ws) = tokio_tungstenite::accept_hdr_async(stream, callback).await {
                    handler(ws, ordinal).await;
                }
            });
        }
    });

    TestServer {
        url: format!("ws://{}", addr),
        paths,
        accepted,
    }
}

async fn hold_open(mut ws: WsConn, _ordinal: usize) {
    while let Some(Ok(_)) = ws.next().await {}
}

async fn drop_immediately(ws: WsConn, _ordinal: usize) {
    drop(ws);
}

/// TCP server that accepts and immediately closes, so every WebSocket
/// handshake fails. Used to simulate a peer that never lets an open succeed.
async fn spawn_refusing_server() -> (String, Arc<AtomicUsize>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = accepted.clone();
    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });
    (format!("ws://{}", addr), accepted)
}

async fn wait_until<F: Fn() -> bool>(condition: F, timeout_ms: u64, what: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_millis(timeout_ms);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "timed out waiting for {}",
            what
        );
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

fn socket_for(server: &TestServer, token: &str) -> (ChatSocket, Arc<TokenCell>) {
    let tokens = Arc::new(TokenCell::with_token(token));
    let socket = ChatSocket::builder(&server.url, tokens.clone())
        .reconnect_delay_ms(100)
        .connect_timeout_secs(5)
        .build();
    (socket, tokens)
}

#[tokio::test]
async fn connect_delivers_decoded_message_events() {
    let hello = Arc::new(Mutex::new(None::<String>));
    let seen_hello = hello.clone();
    let server = spawn_server(move |mut ws: WsConn, _ordinal| {
        let hello = seen_hello.clone();
        async move {
            // first inbound frame is the courtesy hello
            if let Some(Ok(frame)) = ws.next().await {
                *hello.lock().unwrap() = Some(frame.into_text().unwrap());
            }
            ws.send(Message::Text(MESSAGE_JSON.to_string())).await.unwrap();
            while let Some(Ok(_)) = ws.next().await {}
        }
    })
    .await;

    let (socket, _tokens) = socket_for(&server, "s3cret token");
    let stream = socket.connect(7);
    let mut sub = stream.subscribe();

    let event = timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("no event within 2s")
        .unwrap();
    match event {
        ChatEvent::Message { message } => {
            assert_eq!(message.room_id, 7);
            assert_eq!(message.content, "hello there");
        }
        other => panic!("unexpected event: {:?}", other),
    }

    // token is URL-encoded into the query credential
    assert_eq!(server.path(0), "/chat/rooms/7/ws?token=s3cret%20token");

    let hello = hello.lock().unwrap().clone().expect("no hello frame");
    assert!(hello.contains(r#""type":"connected""#));
    assert!(socket.is_connected());
}

#[tokio::test]
async fn connect_same_room_twice_opens_one_transport() {
    let server = spawn_server(hold_open).await;
    let (socket, _tokens) = socket_for(&server, "tok");

    let _stream = socket.connect(7);
    wait_until(|| socket.is_connected(), 2000, "first connect").await;

    let _again = socket.connect(7);
    tokio::time::sleep(Duration::from_millis(200)).await;

    assert_eq!(server.accepted(), 1);
    assert_eq!(socket.connection_state(), ConnectionState::Connected);
    assert_eq!(socket.session().room_id(), Some(7));
}

#[tokio::test]
async fn switching_rooms_closes_old_transport_first() {
    let closes: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
    let seen_closes = closes.clone();
    let server = spawn_server(move |mut ws: WsConn, ordinal| {
        let closes = seen_closes.clone();
        async move {
            while let Some(Ok(msg)) = ws.next().await {
                if let Message::Close(frame) = msg {
                    let reason = frame.map(|f| f.reason.to_string()).unwrap_or_default();
                    closes.lock().unwrap().push((ordinal, reason));
                    break;
                }
            }
        }
    })
    .await;

    let (socket, _tokens) = socket_for(&server, "tok");
    socket.connect(7);
    wait_until(|| socket.is_connected(), 2000, "room 7 connect").await;

    socket.connect(8);
    wait_until(
        || socket.is_connected() && socket.session().room_id() == Some(8),
        2000,
        "room 8 connect",
    )
    .await;
    wait_until(|| !closes.lock().unwrap().is_empty(), 2000, "close frame").await;

    assert_eq!(server.accepted(), 2);
    let closes = closes.lock().unwrap().clone();
    assert_eq!(closes, vec![(0, "switching rooms".to_string())]);
    assert!(server.path(1).starts_with("/chat/rooms/8/ws"));
}

#[tokio::test]
async fn reconnects_with_fresh_token_after_unexpected_close() {
    let server = spawn_server(|ws: WsConn, ordinal| async move {
        if ordinal == 0 {
            drop(ws); // abnormal closure
        } else {
            hold_open(ws, ordinal).await;
        }
    })
    .await;

    let tokens = Arc::new(TokenCell::with_token("first-token"));
    let socket = ChatSocket::builder(&server.url, tokens.clone())
        .reconnect_delay_ms(300)
        .connect_timeout_secs(5)
        .build();

    socket.connect(7);
    wait_until(|| server.accepted() >= 1, 2000, "initial transport").await;
    tokens.set("second-token");

    wait_until(|| server.accepted() == 2, 3000, "reconnect attempt").await;
    wait_until(|| server.paths.lock().unwrap().len() == 2, 2000, "second handshake").await;

    assert_eq!(server.path(1), "/chat/rooms/7/ws?token=second-token");
    wait_until(|| socket.is_connected(), 2000, "reconnected").await;
}

#[tokio::test]
async fn gives_up_after_max_reconnect_attempts() {
    let (url, accepted) = spawn_refusing_server().await;
    let tokens = Arc::new(TokenCell::with_token("tok"));
    let socket = ChatSocket::builder(&url, tokens)
        .reconnect_delay_ms(100)
        .connect_timeout_secs(5)
        .build();

    let stream = socket.connect(7);
    let mut sub = stream.subscribe();

    let err = timeout(Duration::from_secs(5), sub.recv())
        .await
        .expect("stream did not terminate")
        .unwrap_err();
    assert_eq!(err, StreamError::ConnectionFailed("connection failed".into()));

    // initial open plus five reconnect attempts, then nothing more
    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
    assert_eq!(socket.session().room_id(), None);

    // future subscribers observe the terminal error too
    let mut late = socket.events().subscribe();
    assert!(late.recv().await.is_err());

    // connect after terminal failure opens nothing further
    socket.connect(7);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(accepted.load(Ordering::SeqCst), 6);
}

#[tokio::test]
async fn manual_disconnect_cancels_pending_reconnect() {
    let server = spawn_server(drop_immediately).await;
    let tokens = Arc::new(TokenCell::with_token("tok"));
    let socket = ChatSocket::builder(&server.url, tokens)
        .reconnect_delay_ms(500)
        .connect_timeout_secs(5)
        .build();

    socket.connect(7);
    wait_until(|| server.accepted() == 1, 2000, "initial transport").await;
    // let the close land so a reconnect timer is pending
    tokio::time::sleep(Duration::from_millis(150)).await;

    socket.disconnect().await;
    // idempotent
    socket.disconnect().await;

    tokio::time::sleep(Duration::from_millis(800)).await;
    assert_eq!(server.accepted(), 1, "stale reconnect timer opened a transport");
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
    assert_eq!(socket.session().room_id(), None);
}

#[tokio::test]
async fn malformed_frames_are_dropped_without_terminating() {
    let server = spawn_server(|mut ws: WsConn, _ordinal| async move {
        let _hello = ws.next().await;
        ws.send(Message::Text("{not json".to_string())).await.unwrap();
        ws.send(Message::Text(
            r#"{"type":"typing","userId":5,"username":"bob","typing":true}"#.to_string(),
        ))
        .await
        .unwrap();
        while let Some(Ok(_)) = ws.next().await {}
    })
    .await;

    let (socket, _tokens) = socket_for(&server, "tok");
    let stream = socket.connect(7);
    let mut sub = stream.subscribe();

    // the malformed frame never surfaces; the next valid one does
    let event = timeout(Duration::from_secs(2), sub.recv())
        .await
        .expect("stream stalled after malformed frame")
        .unwrap();
    match event {
        ChatEvent::Typing { user_id, typing, .. } => {
            assert_eq!(user_id, 5);
            assert!(typing);
        }
        other => panic!("unexpected event: {:?}", other),
    }
    assert!(socket.is_connected());
}

#[tokio::test]
async fn send_while_disconnected_is_a_noop() {
    let tokens = Arc::new(TokenCell::with_token("tok"));
    let socket = ChatSocket::builder("ws://127.0.0.1:9", tokens).build();

    // no transport was ever opened; this must not panic or buffer
    socket.send(&ClientFrame::typing(1, "alice", true)).await;

    assert!(!socket.is_connected());
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn connect_without_token_is_inert() {
    let server = spawn_server(hold_open).await;
    let tokens = Arc::new(TokenCell::new());
    let socket = ChatSocket::builder(&server.url, tokens).build();

    let stream = socket.connect(3);
    let mut sub = stream.subscribe();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.accepted(), 0);
    assert_eq!(socket.connection_state(), ConnectionState::Disconnected);

    // inert, not terminated
    let pending = timeout(Duration::from_millis(100), sub.recv()).await;
    assert!(pending.is_err());
}

#[tokio::test]
async fn vanished_token_abandons_reconnect_quietly() {
    let server = spawn_server(drop_immediately).await;
    let tokens = Arc::new(TokenCell::with_token("tok"));
    let socket = ChatSocket::builder(&server.url, tokens.clone())
        .reconnect_delay_ms(150)
        .connect_timeout_secs(5)
        .build();

    let stream = socket.connect(7);
    wait_until(|| server.accepted() == 1, 2000, "initial transport").await;
    tokens.clear();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert_eq!(server.accepted(), 1, "reconnect attempted without a token");

    // abandoned, not failed: the stream stays open for a later connect
    let mut sub = stream.subscribe();
    let pending = timeout(Duration::from_millis(100), sub.recv()).await;
    assert!(pending.is_err());
    assert_eq!(socket.session().reconnect_attempts(), 1);
}
