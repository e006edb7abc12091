//! Integration tests for the Matchgate server, handler, and full match flow.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use matchgate::prelude::*;
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Authenticator and policies
// =========================================================================

/// Accepts any numeric token as a SessionId.
struct TestAuth;

impl Authenticator for TestAuth {
    async fn authenticate(&self, token: &Token) -> Result<SessionId, SessionError> {
        let id: u64 = token
            .as_str()
            .parse()
            .map_err(|_| SessionError::AuthFailed("not a number".into()))?;
        Ok(SessionId(id))
    }
}

/// Only matches sessions that said `{"ready": true}`.
struct ReadyPolicy;

impl MatchPolicy for ReadyPolicy {
    type SessionId = SessionId;

    fn order(&self, candidates: &mut Vec<&WaitingSession<SessionId>>, _now: u64) {
        candidates.retain(|s| s.data["ready"] == true);
    }
}

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

fn fast_config() -> ServerConfig {
    ServerConfig::default()
        .with_match_interval(Duration::from_millis(20))
        .with_initial_jitter(Duration::ZERO)
        .with_max_wait(Duration::from_secs(10))
        .with_handshake_timeout(Duration::from_secs(2))
}

/// Starts a server on a random port and returns the address.
async fn start_server<P>(policy: P, config: ServerConfig) -> String
where
    P: MatchPolicy<SessionId = SessionId>,
{
    let server = MatchServer::builder()
        .bind("127.0.0.1:0")
        .config(config)
        .build(policy, TestAuth)
        .await
        .expect("server should build");

    let addr = server
        .local_addr()
        .expect("should have local addr")
        .to_string();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    // Give the accept loop a moment to start.
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

async fn connect(addr: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
        .await
        .expect("should connect");
    ws
}

async fn send_text(ws: &mut ClientWs, text: &str) {
    ws.send(Message::text(text.to_string()))
        .await
        .expect("send should succeed");
}

/// Reads the next text frame.
async fn next_json(ws: &mut ClientWs) -> Value {
    loop {
        let msg = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("stream ended")
            .expect("ws error");
        if let Message::Text(text) = msg {
            return serde_json::from_str(text.as_str()).expect("valid JSON");
        }
    }
}

/// Asserts the server closes the connection without sending text.
async fn expect_closed(ws: &mut ClientWs) {
    loop {
        let next = timeout(Duration::from_secs(3), ws.next())
            .await
            .expect("server should close the connection");
        match next {
            Some(Ok(Message::Text(text))) => panic!("unexpected frame: {text}"),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => continue,
        }
    }
}

/// Runs an `AuthenticatedConnection` with `token` and collects its frames.
fn spawn_client(
    addr: &str,
    token: &str,
) -> (
    tokio::task::JoinHandle<Result<SessionEnd, ClientError>>,
    mpsc::UnboundedReceiver<String>,
) {
    let client = AuthenticatedConnection::new();
    let (tx, rx) = mpsc::unbounded_channel();
    client
        .set_message_handler(move |frame| {
            tx.send(frame.to_owned())?;
            Ok(())
        })
        .expect("idle client accepts handlers");

    let url = format!("ws://{addr}");
    let token = token.to_owned();
    let task = tokio::spawn(async move { client.connect(&url, token).await });
    (task, rx)
}

fn sorted_members(game: &Value) -> Vec<u64> {
    let mut ids: Vec<u64> =
        serde_json::from_value(game["session_list"].clone()).expect("session_list");
    ids.sort_unstable();
    ids
}

async fn next_frame(rx: &mut mpsc::UnboundedReceiver<String>) -> Value {
    let frame = timeout(Duration::from_secs(3), rx.recv())
        .await
        .expect("timed out waiting for a frame")
        .expect("client dropped");
    serde_json::from_str(&frame).expect("valid JSON")
}

// =========================================================================
// Matching
// =========================================================================

#[tokio::test]
async fn test_two_clients_receive_the_same_game() {
    let addr = start_server(DefaultPolicy::new(), fast_config()).await;

    let (task_a, mut frames_a) = spawn_client(&addr, "9");
    let (task_b, mut frames_b) = spawn_client(&addr, "3241");

    let game_a = next_frame(&mut frames_a).await;
    let game_b = next_frame(&mut frames_b).await;

    assert_eq!(game_a, game_b);
    assert_eq!(game_a["matched"], true);
    assert!(game_a["game_id"].is_u64());

    let game: Game<SessionId> = Game::from_json(game_a);
    assert!(game.is_valid());
    assert!(!game.is_done());
    assert_eq!(game.session_list.len(), 2);
    assert!(game.contains(&SessionId(9)));
    assert!(game.contains(&SessionId(3241)));

    // The server closes matched sessions.
    for task in [task_a, task_b] {
        let end = timeout(Duration::from_secs(3), task)
            .await
            .expect("session should end")
            .expect("task")
            .expect("no usage error");
        assert_eq!(end, SessionEnd::Closed);
    }
}

#[tokio::test]
async fn test_matched_payload_parses_as_outcome() {
    let addr = start_server(DefaultPolicy::new(), fast_config()).await;
    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    send_text(&mut a, "1").await;
    send_text(&mut b, "2").await;

    let outcome: MatchOutcome = serde_json::from_value(next_json(&mut a).await).unwrap();
    assert!(outcome.matched);
    assert!(!outcome.is_cancelled());
    assert_eq!(sorted_members(&json!(outcome.data)), vec![1, 2]);
}

#[tokio::test]
async fn test_lone_client_gets_cancel_payload() {
    let config = fast_config().with_max_wait(Duration::from_millis(100));
    let addr = start_server(DefaultPolicy::new(), config).await;

    let (task, mut frames) = spawn_client(&addr, "77");

    assert_eq!(next_frame(&mut frames).await, json!({ "matched": false }));
    let end = timeout(Duration::from_secs(3), task)
        .await
        .expect("session should end")
        .expect("task")
        .expect("no usage error");
    assert_eq!(end, SessionEnd::Closed);
}

#[tokio::test]
async fn test_matching_data_reaches_the_policy() {
    let addr = start_server(ReadyPolicy, fast_config()).await;

    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    send_text(&mut a, "10").await;
    send_text(&mut a, r#"{"ready": true}"#).await;
    send_text(&mut b, "20").await;

    // B isn't ready, so nothing happens for a few passes.
    let early = timeout(Duration::from_millis(150), a.next()).await;
    assert!(early.is_err(), "matched before both were ready");

    // Frames that aren't JSON are ignored.
    send_text(&mut b, "not json").await;
    send_text(&mut b, r#"{"ready": true}"#).await;

    let game_a = next_json(&mut a).await;
    let game_b = next_json(&mut b).await;
    assert_eq!(game_a, game_b);
    assert_eq!(sorted_members(&game_a), vec![10, 20]);
}

#[tokio::test]
async fn test_three_clients_leave_one_waiting() {
    let config = fast_config().with_max_wait(Duration::from_millis(400));
    let addr = start_server(DefaultPolicy::new(), config).await;

    let mut clients = Vec::new();
    for token in ["1", "2", "3"] {
        let mut ws = connect(&addr).await;
        send_text(&mut ws, token).await;
        clients.push(ws);
        // Keep pool order predictable.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    let mut matched = 0;
    let mut cancelled = 0;
    for ws in &mut clients {
        let payload = next_json(ws).await;
        if payload["matched"] == true {
            matched += 1;
        } else {
            assert_eq!(payload, json!({ "matched": false }));
            cancelled += 1;
        }
    }
    assert_eq!((matched, cancelled), (2, 1));
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_invalid_token_is_rejected() {
    let addr = start_server(DefaultPolicy::new(), fast_config()).await;
    let mut ws = connect(&addr).await;

    send_text(&mut ws, "not-a-number").await;

    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_missing_token_times_out() {
    let config = fast_config().with_handshake_timeout(Duration::from_millis(100));
    let addr = start_server(DefaultPolicy::new(), config).await;
    let mut ws = connect(&addr).await;

    expect_closed(&mut ws).await;
}

#[tokio::test]
async fn test_duplicate_identity_is_rejected() {
    let addr = start_server(DefaultPolicy::new(), fast_config()).await;

    let mut first = connect(&addr).await;
    send_text(&mut first, "5").await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let mut second = connect(&addr).await;
    send_text(&mut second, "5").await;
    expect_closed(&mut second).await;

    // The first session is still waiting and can be matched.
    let mut other = connect(&addr).await;
    send_text(&mut other, "6").await;
    let game = next_json(&mut first).await;
    assert_eq!(game["session_list"], json!([5, 6]));
}

#[tokio::test]
async fn test_client_leaving_is_removed_from_pool() {
    let addr = start_server(DefaultPolicy::new(), fast_config()).await;

    let mut gone = connect(&addr).await;
    send_text(&mut gone, "1").await;
    gone.close(None).await.expect("close");
    drop(gone);
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut a = connect(&addr).await;
    let mut b = connect(&addr).await;
    send_text(&mut a, "2").await;
    tokio::time::sleep(Duration::from_millis(5)).await;
    send_text(&mut b, "3").await;

    let game = next_json(&mut a).await;
    assert_eq!(sorted_members(&game), vec![2, 3]);
}
