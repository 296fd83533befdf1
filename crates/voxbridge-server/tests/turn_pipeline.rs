//! End-to-end pipeline tests against a mock gateway.
//!
//! Each test boots a throwaway gateway and proxy on ephemeral ports and
//! drives the proxy over real sockets with tightened timing tunables.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::Response;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

use voxbridge_server::{create_router, AppState, ProxyConfig};

const EMAIL_INITIALS: [&str; 3] = [
    "Checking your inbox... ",
    "Pulling up your emails... ",
    "Let me look at your mail... ",
];

#[derive(Clone)]
struct MockGateway {
    requests: Arc<Mutex<Vec<Value>>>,
    deltas: Vec<&'static str>,
    first_byte_delay: Duration,
}

async fn mock_completions(State(mock): State<MockGateway>, Json(body): Json<Value>) -> Response {
    mock.requests.lock().await.push(body);

    let deltas = mock.deltas.clone();
    let delay = mock.first_byte_delay;
    let stream = async_stream::stream! {
        tokio::time::sleep(delay).await;
        for delta in deltas {
            let chunk = json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion.chunk",
                "created": 0,
                "choices": [{"index": 0, "delta": {"content": delta}, "finish_reason": null}]
            });
            yield Ok::<_, std::convert::Infallible>(format!("data: {chunk}\n\n"));
        }
        yield Ok("data: [DONE]\n\n".to_string());
    };

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(Body::from_stream(stream))
        .unwrap()
}

async fn spawn_gateway(
    deltas: Vec<&'static str>,
    first_byte_delay: Duration,
) -> (String, Arc<Mutex<Vec<Value>>>) {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let mock = MockGateway {
        requests: requests.clone(),
        deltas,
        first_byte_delay,
    };
    let app = Router::new()
        .route("/v1/chat/completions", post(mock_completions))
        .with_state(mock);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/v1/chat/completions"), requests)
}

/// Production timings shrunk so a full turn runs in well under a second. The
/// keep-alive interval stays long by default so only the dedicated test
/// sees filler between buffer and content.
fn test_config(upstream_url: String) -> ProxyConfig {
    let mut config = ProxyConfig::default();
    config.upstream.url = upstream_url;
    config.debounce = Duration::from_millis(120);
    config.min_buffer_speech = Duration::from_millis(150);
    config.keepalive_interval = Duration::from_secs(5);
    config.keepalive_idle = Duration::from_millis(4500);
    config
}

async fn spawn_proxy(config: ProxyConfig) -> String {
    let state = AppState::new(config).unwrap();
    let app = create_router(state);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}

fn frames(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|frame| !frame.is_empty())
        .map(|frame| {
            frame
                .strip_prefix("data: ")
                .unwrap_or_else(|| panic!("not an SSE frame: {frame:?}"))
                .to_string()
        })
        .collect()
}

fn content_of(payload: &str) -> Option<String> {
    serde_json::from_str::<Value>(payload)
        .ok()?
        .pointer("/choices/0/delta/content")?
        .as_str()
        .map(str::to_string)
}

#[tokio::test]
async fn silence_pings_never_reach_the_gateway() {
    let (gateway_url, requests) = spawn_gateway(vec!["should never be seen"], Duration::ZERO).await;
    let base = spawn_proxy(test_config(gateway_url)).await;
    let client = client();

    for content in ["...", "\u{2026}", "", "hm"] {
        let body = client
            .post(format!("{base}/v1/chat/completions"))
            .json(&json!({"user": "u1", "messages": [{"role": "user", "content": content}]}))
            .send()
            .await
            .unwrap()
            .text()
            .await
            .unwrap();

        let frames = frames(&body);
        assert_eq!(frames.len(), 2, "input {content:?}");
        assert_eq!(content_of(&frames[0]).as_deref(), Some(" "));
        assert_eq!(frames[1], "[DONE]");
    }

    assert!(requests.lock().await.is_empty());
}

#[tokio::test]
async fn buffer_phrase_precedes_gateway_content() {
    let (gateway_url, _requests) =
        spawn_gateway(vec!["You have ", "two unread."], Duration::from_millis(30)).await;
    let base = spawn_proxy(test_config(gateway_url)).await;

    let body = client()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({
            "user": "u1",
            "messages": [{"role": "user", "content": "check my inbox for anything from Dana"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let frames = frames(&body);
    let first = content_of(&frames[0]).expect("buffer phrase first");
    assert!(
        EMAIL_INITIALS.contains(&first.as_str()),
        "unexpected buffer phrase {first:?}"
    );
    assert!(first.ends_with(' '));

    let relayed: String = frames[1..frames.len() - 1]
        .iter()
        .filter_map(|frame| content_of(frame))
        .collect();
    assert_eq!(relayed, "You have two unread.");

    assert_eq!(frames.last().unwrap(), "[DONE]");
    assert_eq!(frames.iter().filter(|frame| *frame == "[DONE]").count(), 1);
}

#[tokio::test]
async fn speculative_transcript_is_superseded() {
    let (gateway_url, requests) = spawn_gateway(vec!["Plenty of things."], Duration::ZERO).await;
    let base = spawn_proxy(test_config(gateway_url)).await;
    let client = client();

    let partial = {
        let client = client.clone();
        let base = base.clone();
        tokio::spawn(async move {
            client
                .post(format!("{base}/v1/chat/completions"))
                .json(&json!({
                    "user": "u1",
                    "messages": [{"role": "user", "content": "Tell me what"}]
                }))
                .send()
                .await
                .unwrap()
                .text()
                .await
                .unwrap()
        })
    };
    // The final transcript lands well inside the 120 ms debounce window.
    tokio::time::sleep(Duration::from_millis(40)).await;

    let full = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({
            "user": "u1",
            "messages": [{"role": "user", "content": "Tell me what you can do"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let partial_frames = frames(&partial.await.unwrap());
    assert_eq!(partial_frames.len(), 2);
    assert_eq!(content_of(&partial_frames[0]).as_deref(), Some(" "));
    assert_eq!(partial_frames[1], "[DONE]");

    let full_frames = frames(&full);
    assert!(full_frames.len() > 2);
    assert_eq!(full_frames.last().unwrap(), "[DONE]");

    let recorded = requests.lock().await;
    assert_eq!(recorded.len(), 1, "only the final transcript reaches the gateway");
    let forwarded = recorded[0]["messages"][0]["content"].as_str().unwrap();
    assert!(forwarded.starts_with("Tell me what you can do [Voice call:"));
}

#[tokio::test]
async fn completed_turns_replay_from_cache() {
    let (gateway_url, requests) = spawn_gateway(vec!["Ten past three."], Duration::ZERO).await;
    let base = spawn_proxy(test_config(gateway_url)).await;
    let client = client();
    let body = json!({
        "user": "u1",
        "messages": [{"role": "user", "content": "what is the time"}]
    });

    let first = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(frames(&first).last().unwrap(), "[DONE]");

    let replay = client
        .post(format!("{base}/v1/chat/completions"))
        .json(&body)
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let replay_frames = frames(&replay);
    assert_eq!(replay_frames.len(), 2, "cache hit is a single chunk");
    assert_eq!(content_of(&replay_frames[0]).as_deref(), Some("Ten past three."));
    assert_eq!(replay_frames[1], "[DONE]");

    assert_eq!(requests.lock().await.len(), 1, "replay issued no gateway call");
}

#[tokio::test]
async fn keep_alive_fills_long_gateway_stalls() {
    let (gateway_url, _requests) = spawn_gateway(vec!["done."], Duration::from_millis(600)).await;
    let mut config = test_config(gateway_url);
    config.debounce = Duration::from_millis(50);
    config.min_buffer_speech = Duration::from_millis(100);
    config.keepalive_interval = Duration::from_millis(200);
    config.keepalive_idle = Duration::from_millis(150);
    let base = spawn_proxy(config).await;

    let body = client()
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({
            "user": "u1",
            "messages": [{"role": "user", "content": "hello there friend"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let frames = frames(&body);
    let contents: Vec<String> = frames
        .iter()
        .filter_map(|frame| content_of(frame))
        .collect();

    let done_idx = contents
        .iter()
        .position(|c| c == "done.")
        .expect("gateway content relayed");
    assert!(
        done_idx >= 2,
        "expected at least one keep-alive between buffer and content, got {contents:?}"
    );
    for filler in &contents[1..done_idx] {
        assert!(filler.ends_with(' '), "keep-alive {filler:?} missing trailing space");
    }
    assert_eq!(frames.last().unwrap(), "[DONE]");
}

#[tokio::test]
async fn doubled_completions_path_is_accepted() {
    let (gateway_url, requests) = spawn_gateway(vec!["Sure."], Duration::ZERO).await;
    let base = spawn_proxy(test_config(gateway_url)).await;

    let body = client()
        .post(format!("{base}/v1/chat/completions/chat/completions"))
        .json(&json!({
            "user": "u1",
            "messages": [{"role": "user", "content": "are you still there"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    assert_eq!(frames(&body).last().unwrap(), "[DONE]");
    assert_eq!(requests.lock().await.len(), 1);
}

#[tokio::test]
async fn debug_surface_reports_health_and_conversations() {
    let (gateway_url, _requests) = spawn_gateway(vec!["Hi."], Duration::ZERO).await;
    let base = spawn_proxy(test_config(gateway_url)).await;
    let client = client();

    let health: Value = client
        .get(format!("{base}/health"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["ok"], true);
    assert!(health["uptimeSeconds"].is_u64());

    client
        .post(format!("{base}/v1/chat/completions"))
        .json(&json!({
            "user": "u1",
            "messages": [{"role": "user", "content": "say hi to the listeners"}]
        }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();

    let conversations: Value = client
        .get(format!("{base}/conversations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let messages = conversations["u1"]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "say hi to the listeners");
    assert_eq!(messages.last().unwrap()["role"], "assistant");
    assert_eq!(messages.last().unwrap()["content"], "Hi.");

    let cleared = client
        .delete(format!("{base}/conversations"))
        .send()
        .await
        .unwrap();
    assert_eq!(cleared.status(), 200);

    let after: Value = client
        .get(format!("{base}/conversations"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(after, json!({}));
}
