mod common;

use serde_json::json;
use std::time::Duration;

use automation_relay::commands::builder::build;
use automation_relay::security::ApiKey;
use automation_relay::transport::dispatcher::Correlation;
use automation_relay::transport::websocket::ChannelTransport;
use automation_relay::transport::{CommandFields, RequestId, ResultSource};
use automation_relay::RelayError;
use common::{recv_json, request_id_of, send_json, send_raw, spawn_channel};

fn key() -> ApiKey {
    ApiKey::new(common::API_KEY).unwrap()
}

async fn open(url: &str, correlation: Correlation) -> ChannelTransport {
    ChannelTransport::connect(url, Duration::from_secs(2), correlation)
        .await
        .unwrap()
}

#[tokio::test]
async fn command_arrives_with_wire_field_names() {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let url = spawn_channel(|mut ws| async move {
        let cmd = recv_json(&mut ws).await;
        let id = request_id_of(&cmd);
        tx.send(cmd).unwrap();
        send_json(&mut ws, json!({"success": true, "action": "click", "requestId": id})).await;
    })
    .await;

    let fields = CommandFields {
        xpath: Some("//button[@id='go']".into()),
        ..CommandFields::default()
    };
    let cmd = build("click", fields, None, &key()).unwrap();
    let mut channel = open(&url, Correlation::Lenient).await;
    channel.send(&cmd).await.unwrap();
    channel
        .receive_matching(&cmd.request_id, Duration::from_secs(2))
        .await
        .unwrap();

    let seen = rx.await.unwrap();
    assert_eq!(seen["type"], "command");
    assert_eq!(seen["action"], "click");
    assert_eq!(seen["xpath"], "//button[@id='go']");
    assert_eq!(seen["apiKey"], common::API_KEY);
    assert_eq!(seen["requestId"], cmd.request_id.as_str());
    assert!(seen.get("selector").is_none());
}

#[tokio::test]
async fn status_chatter_is_skipped_until_the_answer() {
    let url = spawn_channel(|mut ws| async move {
        let id = request_id_of(&recv_json(&mut ws).await);
        send_json(&mut ws, json!({"type": "extension_status", "status": "connected"})).await;
        send_json(&mut ws, json!({"type": "registration", "clientId": "abc"})).await;
        send_json(
            &mut ws,
            json!({
                "type": "automation-response",
                "payload": {"success": true, "action": "getHtml", "requestId": id, "html": "<p>x</p>"}
            }),
        )
        .await;
    })
    .await;

    let cmd = build("getHtml", CommandFields::default(), None, &key()).unwrap();
    let mut channel = open(&url, Correlation::Lenient).await;
    channel.send(&cmd).await.unwrap();
    let response = channel
        .receive_matching(&cmd.request_id, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(response.success);
    assert_eq!(response.action_name(), "getHtml");
    assert_eq!(response.html.as_deref(), Some("<p>x</p>"));
}

#[tokio::test]
async fn malformed_frames_do_not_end_the_wait() {
    let url = spawn_channel(|mut ws| async move {
        let id = request_id_of(&recv_json(&mut ws).await);
        send_raw(&mut ws, "this is not json").await;
        send_raw(&mut ws, "[1, 2").await;
        send_json(&mut ws, json!({"success": true, "action": "click", "requestId": id})).await;
    })
    .await;

    let cmd = build("click", CommandFields::default(), None, &key()).unwrap();
    let mut channel = open(&url, Correlation::Lenient).await;
    channel.send(&cmd).await.unwrap();
    let response = channel
        .receive_matching(&cmd.request_id, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(response.action_name(), "click");
}

#[tokio::test]
async fn answers_for_other_requests_are_ignored() {
    let url = spawn_channel(|mut ws| async move {
        let id = request_id_of(&recv_json(&mut ws).await);
        send_json(
            &mut ws,
            json!({"success": true, "action": "click", "requestId": "someone-else"}),
        )
        .await;
        send_json(
            &mut ws,
            json!({"success": true, "action": "navigate", "requestId": id, "message": "mine"}),
        )
        .await;
    })
    .await;

    let cmd = build("navigate", CommandFields::default(), None, &key()).unwrap();
    let mut channel = open(&url, Correlation::Strict).await;
    channel.send(&cmd).await.unwrap();
    let response = channel
        .receive_matching(&cmd.request_id, Duration::from_secs(2))
        .await
        .unwrap();
    assert_eq!(response.message.as_deref(), Some("mine"));
}

#[tokio::test]
async fn remote_error_is_a_terminal_answer() {
    let url = spawn_channel(|mut ws| async move {
        let id = request_id_of(&recv_json(&mut ws).await);
        send_json(&mut ws, json!({"requestId": id, "error": "element not found"})).await;
    })
    .await;

    let cmd = build("click", CommandFields::default(), None, &key()).unwrap();
    let mut channel = open(&url, Correlation::Lenient).await;
    channel.send(&cmd).await.unwrap();
    let response = channel
        .receive_matching(&cmd.request_id, Duration::from_secs(2))
        .await
        .unwrap();

    assert!(response.is_failure());
    match response.check() {
        Err(RelayError::RemoteReported { action, error }) => {
            assert_eq!(action, "unknown");
            assert_eq!(error, "element not found");
        }
        other => panic!("expected RemoteReported, got {other:?}"),
    }
}

#[tokio::test]
async fn close_before_answer_is_an_interruption() {
    let url = spawn_channel(|mut ws| async move {
        recv_json(&mut ws).await;
        send_json(&mut ws, json!({"type": "extension_status", "status": "busy"})).await;
        ws.close(None).await.unwrap();
    })
    .await;

    let cmd = build("screenshot", CommandFields::default(), None, &key()).unwrap();
    let mut channel = open(&url, Correlation::Lenient).await;
    channel.send(&cmd).await.unwrap();
    let err = channel
        .receive_matching(&cmd.request_id, Duration::from_secs(2))
        .await
        .unwrap_err();

    assert!(err.is_interruption());
    match err {
        RelayError::ChannelInterrupted { request_id, .. } => {
            assert_eq!(request_id, cmd.request_id.as_str())
        }
        other => panic!("expected ChannelInterrupted, got {other}"),
    }
}

#[tokio::test]
async fn silence_past_the_deadline_is_an_interruption() {
    let url = spawn_channel(|mut ws| async move {
        recv_json(&mut ws).await;
        tokio::time::sleep(Duration::from_secs(3)).await;
    })
    .await;

    let id = RequestId::parse("req-quiet").unwrap();
    let cmd = build("click", CommandFields::default(), Some(id.clone()), &key()).unwrap();
    let mut channel = open(&url, Correlation::Lenient).await;
    channel.send(&cmd).await.unwrap();

    let started = std::time::Instant::now();
    let err = channel
        .await_result(&id, Duration::from_millis(300))
        .await
        .unwrap_err();
    assert!(err.is_interruption());
    assert!(started.elapsed() < Duration::from_secs(2));
    assert_eq!(channel.label(), "channel");
}
