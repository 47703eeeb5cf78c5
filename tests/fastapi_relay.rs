//! 自前の推論サーバー経由の end-to-end テスト。サーバーは axum の stub を立てる。

use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse, routing::post};
use chat_relay::{
    llm::FastapiBackend,
    model::{
        conversation::{ConversationTurn, Role},
        event::{InboundEvent, InvocationContext},
    },
    relay::ChatRelay,
};
use serde_json::{Value as JsonValue, json};
use tokio::net::TcpListener;

#[derive(Debug, Clone)]
struct StubServer {
    status: StatusCode,
    reply: String,
    received: Arc<Mutex<Vec<JsonValue>>>,
}

async fn generate(State(stub): State<StubServer>, Json(request): Json<JsonValue>) -> impl IntoResponse {
    stub.received.lock().unwrap().push(request);
    (stub.status, stub.reply.clone())
}

/// stub を起動してベース URL を返す。
async fn spawn_stub(status: StatusCode, reply: JsonValue) -> (String, Arc<Mutex<Vec<JsonValue>>>) {
    spawn_raw_stub(status, reply.to_string()).await
}

/// JSON とは限らないボディをそのまま返す stub。
async fn spawn_raw_stub(status: StatusCode, reply: impl Into<String>) -> (String, Arc<Mutex<Vec<JsonValue>>>) {
    let received = Arc::new(Mutex::new(vec![]));
    let stub = StubServer {
        status,
        reply: reply.into(),
        received: received.clone(),
    };
    let app = Router::new().route("/generate", post(generate)).with_state(stub);

    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind failed");
    let addr = listener.local_addr().expect("no local address");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server failed");
    });

    (format!("http://{addr}"), received)
}

fn relay_for(base_url: &str) -> ChatRelay {
    ChatRelay::new(Arc::new(FastapiBackend::new(base_url).expect("client build failed")))
}

fn context() -> InvocationContext {
    InvocationContext {
        request_id: "req-1".into(),
        invoked_function_arn: "arn:aws:lambda:us-west-2:123456789012:function:chat-fastapi".into(),
    }
}

#[tokio::test]
async fn happy_path_echoes_only_assistant_turn() {
    let reply = json!({"generated_text": "pong", "response_time": 0.42});
    let (base_url, received) = spawn_stub(StatusCode::OK, reply).await;
    let relay = relay_for(&base_url);
    let event = InboundEvent::with_body(json!({"message": "ping"}).to_string());

    let response = relay.handle(event, &context()).await;

    assert_eq!(response.status_code, 200);
    assert_eq!(
        serde_json::to_value(&response.body).unwrap(),
        json!({
            "success": true,
            "response": "pong",
            "response_time": 0.42,
            "conversationHistory": [{"role": "assistant", "content": "pong"}],
        })
    );
    assert_eq!(
        *received.lock().unwrap(),
        vec![json!({
            "prompt": "ping",
            "max_new_tokens": 512,
            "do_sample": true,
            "temperature": 0.7,
            "top_p": 0.9,
        })]
    );
}

#[tokio::test]
async fn caller_history_is_kept_but_not_sent() {
    let reply = json!({"generated_text": "fine", "response_time": 1.5});
    let (base_url, received) = spawn_stub(StatusCode::OK, reply).await;
    let relay = relay_for(&base_url);
    let event = InboundEvent::with_body(
        json!({
            "message": "and you?",
            "conversationHistory": [
                {"role": "user", "content": "how are you"},
                {"role": "assistant", "content": "good"},
                {"role": "system", "content": "kept as is"},
            ],
        })
        .to_string(),
    );

    let response = relay.handle(event, &context()).await;

    assert_eq!(received.lock().unwrap()[0]["prompt"], "and you?");
    let history = response.body.conversation_history.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[2].role, Role::Other("system".into()));
    assert_eq!(history[3], ConversationTurn::assistant("fine"));
    assert!(!history.contains(&ConversationTurn::user("and you?")));
}

#[tokio::test]
async fn trailing_slash_on_base_url_is_normalized() {
    let (base_url, received) = spawn_stub(StatusCode::OK, json!({"generated_text": "ok", "response_time": 0.1})).await;
    let backend = FastapiBackend::new(&format!("{base_url}/")).unwrap();
    assert_eq!(backend.endpoint(), format!("{base_url}/generate"));

    let relay = ChatRelay::new(Arc::new(backend));
    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 200);
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn non_success_status_is_upstream_failure() {
    let (base_url, _) = spawn_stub(StatusCode::SERVICE_UNAVAILABLE, json!({"detail": "model loading"})).await;
    let relay = relay_for(&base_url);

    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 500);
    assert!(!response.body.success);
    let error = response.body.error.unwrap();
    assert!(error.starts_with("upstream failure"), "{error}");
    assert!(error.contains("503"), "{error}");
}

#[tokio::test]
async fn missing_response_time_is_invalid_response() {
    let (base_url, _) = spawn_stub(StatusCode::OK, json!({"generated_text": "no timing"})).await;
    let relay = relay_for(&base_url);

    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 500);
    let error = response.body.error.unwrap();
    assert!(error.starts_with("invalid upstream response"), "{error}");
}

#[tokio::test]
async fn malformed_body_fails_without_request() {
    let (base_url, received) = spawn_stub(StatusCode::OK, json!({"generated_text": "x", "response_time": 0.0})).await;
    let relay = relay_for(&base_url);

    for event in [
        InboundEvent::with_body("{\"message\": "),
        InboundEvent::with_body(r#"{"conversationHistory": []}"#),
        InboundEvent::default(),
    ] {
        let response = relay.handle(event, &context()).await;
        assert_eq!(response.status_code, 500);
        assert!(!response.body.success);
        assert!(response.body.error.unwrap().starts_with("malformed request"));
    }
    assert!(received.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unreachable_server_is_upstream_failure() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let relay = relay_for(&format!("http://{addr}"));
    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 500);
    assert!(response.body.error.unwrap().starts_with("upstream failure"));
}

#[tokio::test]
async fn missing_generated_text_is_invalid_response() {
    let (base_url, received) = spawn_stub(StatusCode::OK, json!({"response_time": 0.1})).await;
    let relay = relay_for(&base_url);

    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 500);
    assert!(response.body.response.is_none());
    let error = response.body.error.unwrap();
    assert!(error.starts_with("invalid upstream response"), "{error}");
    assert_eq!(received.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn null_generated_text_is_invalid_response() {
    let (base_url, _) = spawn_stub(StatusCode::OK, json!({"generated_text": null, "response_time": 0.1})).await;
    let relay = relay_for(&base_url);

    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 500);
    assert!(response.body.error.unwrap().starts_with("invalid upstream response"));
}

#[tokio::test]
async fn non_json_body_is_invalid_response() {
    let (base_url, _) = spawn_raw_stub(StatusCode::OK, "<html>oops</html>").await;
    let relay = relay_for(&base_url);

    let response = relay
        .handle(InboundEvent::with_body(r#"{"message": "hi"}"#), &context())
        .await;

    assert_eq!(response.status_code, 500);
    assert!(!response.body.success);
    assert!(response.body.conversation_history.is_none());
    let error = response.body.error.unwrap();
    assert!(error.starts_with("invalid upstream response"), "{error}");
}
