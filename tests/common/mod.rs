#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use automation_relay::client::{Config, Settings, TransportMode};
use automation_relay::commands::TimeoutStrategy;
use automation_relay::security::ApiKey;

pub const API_KEY: &str = "test-key";

pub type ServerWs = WebSocketStream<TcpStream>;

/// Accept one websocket client and hand it to `handler`.
pub async fn spawn_channel<F, Fut>(handler: F) -> String
where
    F: FnOnce(ServerWs) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        handler(ws).await;
    });
    format!("ws://{}", addr)
}

/// Read the next text frame as JSON.
pub async fn recv_json(ws: &mut ServerWs) -> Value {
    loop {
        match ws.next().await {
            Some(Ok(Message::Text(text))) => return serde_json::from_str(text.as_str()).unwrap(),
            Some(Ok(_)) => continue,
            other => panic!("client went away: {:?}", other),
        }
    }
}

pub async fn send_json(ws: &mut ServerWs, value: Value) {
    ws.send(Message::Text(value.to_string().into())).await.unwrap();
}

pub async fn send_raw(ws: &mut ServerWs, text: &str) {
    ws.send(Message::Text(text.to_string().into())).await.unwrap();
}

pub fn request_id_of(command: &Value) -> String {
    command["requestId"].as_str().unwrap().to_string()
}

#[derive(Default)]
struct StoreInner {
    answers: HashMap<String, Value>,
    /// not-ready replies still owed per id before the answer is released
    hold_back: HashMap<String, usize>,
    queries: HashMap<String, usize>,
    submitted: Vec<Value>,
    assign_id: Option<String>,
    answer_on_submit: Option<Value>,
}

/// In-memory stand-in for the service's REST answer store.
#[derive(Clone, Default)]
pub struct AnswerStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl AnswerStore {
    pub fn put_answer(&self, request_id: &str, answer: Value) {
        self.inner
            .lock()
            .unwrap()
            .answers
            .insert(request_id.to_string(), answer);
    }

    pub fn hold_back(&self, request_id: &str, not_ready_replies: usize) {
        self.inner
            .lock()
            .unwrap()
            .hold_back
            .insert(request_id.to_string(), not_ready_replies);
    }

    /// Server replaces the client id with `id` on submit.
    pub fn assign_id(&self, id: &str) {
        self.inner.lock().unwrap().assign_id = Some(id.to_string());
    }

    /// Every submitted command gets this answer stored under its accepted id.
    pub fn answer_on_submit(&self, answer: Value) {
        self.inner.lock().unwrap().answer_on_submit = Some(answer);
    }

    pub fn queries_for(&self, request_id: &str) -> usize {
        *self
            .inner
            .lock()
            .unwrap()
            .queries
            .get(request_id)
            .unwrap_or(&0)
    }

    pub fn submitted(&self) -> Vec<Value> {
        self.inner.lock().unwrap().submitted.clone()
    }
}

async fn submit(State(store): State<AnswerStore>, Json(body): Json<Value>) -> (StatusCode, Json<Value>) {
    if body["apiKey"] != json!(API_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
    }
    let mut inner = store.inner.lock().unwrap();
    let id = inner
        .assign_id
        .clone()
        .unwrap_or_else(|| body["requestId"].as_str().unwrap_or_default().to_string());
    inner.submitted.push(body);
    if let Some(answer) = inner.answer_on_submit.clone() {
        inner.answers.insert(id.clone(), answer);
    }
    (StatusCode::OK, Json(json!({ "requestId": id })))
}

async fn answer(
    State(store): State<AnswerStore>,
    Path(id): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    if params.get("apiKey").map(String::as_str) != Some(API_KEY) {
        return (StatusCode::UNAUTHORIZED, Json(json!({"error": "Unauthorized"})));
    }
    let mut inner = store.inner.lock().unwrap();
    *inner.queries.entry(id.clone()).or_insert(0) += 1;

    if let Some(remaining) = inner.hold_back.get_mut(&id) {
        if *remaining > 0 {
            *remaining -= 1;
            return (StatusCode::OK, Json(json!({"success": false})));
        }
    }
    match inner.answers.get(&id) {
        Some(a) => (StatusCode::OK, Json(json!({"success": true, "answer": a}))),
        None => (StatusCode::OK, Json(json!({"success": false}))),
    }
}

/// Serve the answer store on an ephemeral port; returns its base URL.
pub async fn spawn_rest(store: AnswerStore) -> String {
    let app = Router::new()
        .route("/command", post(submit))
        .route("/command/{id}/answer", get(answer))
        .with_state(store);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

pub fn config(channel_url: &str, api_base_url: &str, mode: TransportMode) -> Config {
    let settings = Settings {
        channel_url: channel_url.to_string(),
        api_base_url: api_base_url.to_string(),
        mode,
        timeouts: TimeoutStrategy {
            connect_timeout_secs: 2,
            channel_timeout_secs: 2,
            poll_timeout_secs: 2,
            poll_interval_ms: 50,
        },
        ..Settings::default()
    };
    Config::new(settings, ApiKey::new(API_KEY).unwrap())
}
