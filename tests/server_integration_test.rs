//! Integration tests for the HTTP surface
//!
//! Each test builds the router over in-memory stores and drives it with
//! `oneshot`, with the Expo endpoint mocked.

use alerta_push::push::{
    auth::{InMemoryAuthenticator, TriggerSecrets},
    providers::ExpoPushClient,
    server::{PushServer, PushServerBuilder, ServerConfig},
    stores::{InMemoryNotificationStore, InMemoryPushTokenStore, NotificationStore, PushTokenStore},
};
use alerta_push::{AuthUser, Role};
use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    Router,
};
use mockito::{Mock, Server, ServerGuard};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::util::ServiceExt;

struct Harness {
    router: Router,
    tokens: Arc<InMemoryPushTokenStore>,
    history: Arc<InMemoryNotificationStore>,
    _server: PushServer,
}

fn authenticator() -> InMemoryAuthenticator {
    InMemoryAuthenticator::new()
        .with_user("admin-jwt", AuthUser::new("admin-1", Role::Admin))
        .with_user("user-jwt", AuthUser::new("user-1", Role::User))
}

fn harness(expo_url: String, secrets: TriggerSecrets) -> Harness {
    let tokens = Arc::new(InMemoryPushTokenStore::new());
    let history = Arc::new(InMemoryNotificationStore::new());

    let server = PushServerBuilder::new()
        .with_token_store(tokens.clone())
        .with_notification_store(history.clone())
        .with_authenticator(Arc::new(authenticator()))
        .with_provider(Arc::new(ExpoPushClient::with_endpoint(reqwest::Client::new(), expo_url)))
        .with_config(ServerConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            trigger_secrets: secrets,
        })
        .build()
        .unwrap();

    Harness {
        router: server.build_router(),
        tokens,
        history,
        _server: server,
    }
}

async fn expo_ok(server: &mut ServerGuard, tickets: usize) -> Mock {
    let data: Vec<Value> = (0..tickets).map(|i| json!({"status": "ok", "id": format!("t{}", i)})).collect();
    server
        .mock("POST", "/")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "data": data }).to_string())
        .create_async()
        .await
}

fn post(uri: &str, bearer: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(bearer) = bearer {
        builder = builder.header("authorization", format!("Bearer {}", bearer));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, json)
}

#[tokio::test]
async fn test_health() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_register_push_token() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let (status, _) = send(&h.router, post("/push-tokens", None, json!({"token": "ExponentPushToken[a]"}))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&h.router, post("/push-tokens", Some("user-jwt"), json!({"platform": "ios"}))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Push token is required");

    let (status, body) = send(
        &h.router,
        post("/push-tokens", Some("user-jwt"), json!({"token": "ExponentPushToken[a]", "platform": "ios"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Push token registered");

    let (status, body) = send(
        &h.router,
        post("/push-tokens", Some("admin-jwt"), json!({"token": "ExponentPushToken[a]"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Push token updated");

    let stored = h.tokens.list().await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].user_id.as_deref(), Some("admin-1"));
}

#[tokio::test]
async fn test_send_notification_requires_admin() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());
    let payload = json!({"title": "Alerta", "body": "Estrada cortada"});

    let (status, body) = send(&h.router, post("/notifications/send", None, payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, _) = send(&h.router, post("/notifications/send", Some("forged"), payload.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&h.router, post("/notifications/send", Some("user-jwt"), payload)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");

    let (status, body) = send(
        &h.router,
        post("/notifications/send", Some("admin-jwt"), json!({"title": "Alerta", "body": ""})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title and body are required");

    // rejected requests never reach the history
    assert!(h.history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_admin_broadcast() {
    let mut expo = Server::new_async().await;
    let mock = expo_ok(&mut expo, 2).await;
    let h = harness(expo.url(), TriggerSecrets::default());

    h.tokens.register(Some("u1"), "ExponentPushToken[a]", None).await.unwrap();
    h.tokens.register(Some("u2"), "ExponentPushToken[b]", None).await.unwrap();

    let (status, body) = send(
        &h.router,
        post(
            "/notifications/send",
            Some("admin-jwt"),
            json!({"title": "Operação STOP", "body": "Via Rápida, saída do Caniço"}),
        ),
    )
    .await;
    mock.assert_async().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["sent"], 2);
    assert_eq!(body["failed"], 0);
    assert_eq!(body["total"], 2);
    assert!(body.get("message").is_none());

    let request = Request::builder()
        .uri("/notifications")
        .header("authorization", "Bearer admin-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, history) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history.as_array().unwrap().len(), 1);
    assert_eq!(history[0]["sent_by"], "admin-1");
    assert_eq!(history[0]["id"], body["notification_id"]);
}

#[tokio::test]
async fn test_broadcast_without_tokens() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let (status, body) = send(
        &h.router,
        post("/notifications/send", Some("admin-jwt"), json!({"title": "t", "body": "b"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["message"], "No push tokens registered");
    assert_eq!(h.history.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_history_requires_admin() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());
    let request = Request::builder()
        .uri("/notifications")
        .header("authorization", "Bearer user-jwt")
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_notify_on_event_webhook() {
    let mut expo = Server::new_async().await;
    let mock = expo_ok(&mut expo, 1).await;
    let secrets = TriggerSecrets {
        webhook_secret: Some("hook-secret".to_string()),
        invoke_secret: None,
    };
    let h = harness(expo.url(), secrets);
    h.tokens.register(Some("u1"), "ExponentPushToken[a]", None).await.unwrap();

    let webhook_body = json!({
        "type": "INSERT",
        "table": "posts",
        "record": {"user_id": "poster", "title": "Acidente na ER101", "description": "Dois carros"}
    });

    // wrong secret
    let mut request = post("/notify-on-event", None, webhook_body.clone());
    request.headers_mut().insert("x-webhook-secret", "wrong".parse().unwrap());
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut request = post("/notify-on-event", None, webhook_body);
    request.headers_mut().insert("x-webhook-secret", "hook-secret".parse().unwrap());
    let (status, body) = send(&h.router, request).await;
    mock.assert_async().await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["sent"], 1);

    let records = h.history.list().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].title, "Nova publicação");
    assert_eq!(records[0].body, "Acidente na ER101: Dois carros...");
    assert_eq!(records[0].sent_by.as_deref(), Some("poster"));
}

#[tokio::test]
async fn test_notify_on_event_app_trigger() {
    let secrets = TriggerSecrets {
        webhook_secret: Some("hook-secret".to_string()),
        invoke_secret: Some("invoke-secret".to_string()),
    };
    let h = harness("http://127.0.0.1:9/".to_string(), secrets);

    let (status, _) = send(
        &h.router,
        post("/notify-on-event", Some("forged"), json!({"event": "new_comment"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &h.router,
        post("/notify-on-event", Some("user-jwt"), json!({"event": "new_comment", "title": "Comentário"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);

    let mut request = post("/notify-on-event", None, json!({"event": "new_post", "body": "Teste manual"}));
    request.headers_mut().insert("x-invoke-secret", "invoke-secret".parse().unwrap());
    let (status, _) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::OK);

    let records = h.history.list().await.unwrap();
    assert_eq!(records.len(), 2);
    let app_record = records.iter().find(|r| r.title == "Comentário").unwrap();
    assert_eq!(app_record.sent_by.as_deref(), Some("user-1"));
    let invoke_record = records.iter().find(|r| r.body == "Teste manual").unwrap();
    assert_eq!(invoke_record.title, "Alerta Madeira");
    assert_eq!(invoke_record.sent_by, None);
}

#[tokio::test]
async fn test_notify_on_event_rejects_empty_payload() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let request = Request::builder()
        .method(Method::POST)
        .uri("/notify-on-event")
        .body(Body::from("not json"))
        .unwrap();
    let (status, body) = send(&h.router, request).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing title/body or unrecognized webhook payload");
    assert!(h.history.list().await.unwrap().is_empty());
}

fn raw_post(uri: &str, authorization: Option<&str>, body: &str) -> Request<Body> {
    let mut builder = Request::builder().method(Method::POST).uri(uri);
    if let Some(authorization) = authorization {
        builder = builder.header("authorization", authorization);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

#[tokio::test]
async fn test_auth_checked_before_body() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let (status, body) = send(&h.router, raw_post("/notifications/send", None, "")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = send(&h.router, raw_post("/push-tokens", None, "{not json")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");

    let (status, body) = send(&h.router, raw_post("/notifications/send", Some("Bearer user-jwt"), "")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Admin access required");
}

#[tokio::test]
async fn test_malformed_bodies_return_json_errors() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let (status, body) = send(&h.router, raw_post("/push-tokens", Some("Bearer user-jwt"), r#"{"token":5}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().starts_with("Invalid JSON body"));

    // missing content type and empty body fall through to field validation
    let (status, body) = send(&h.router, raw_post("/push-tokens", Some("Bearer user-jwt"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Push token is required");

    let (status, body) = send(&h.router, raw_post("/notifications/send", Some("Bearer admin-jwt"), "")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Title and body are required");

    assert!(h.tokens.list().await.unwrap().is_empty());
    assert!(h.history.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_broadcast_keeps_text_untrimmed() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let (status, _) = send(
        &h.router,
        post("/notifications/send", Some("admin-jwt"), json!({"title": "  Alerta ", "body": "   "})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &h.router,
        post("/notifications/send", Some("admin-jwt"), json!({"title": "  Alerta ", "body": "Chuva forte\n"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let records = h.history.list().await.unwrap();
    assert_eq!(records[0].title, "  Alerta ");
    assert_eq!(records[0].body, "Chuva forte\n");
}

#[tokio::test]
async fn test_notify_on_event_rejects_non_bearer_authorization() {
    let h = harness("http://127.0.0.1:9/".to_string(), TriggerSecrets::default());

    let (status, body) = send(
        &h.router,
        raw_post("/notify-on-event", Some("Basic dXNlcjpwYXNz"), r#"{"event":"new_post","title":"x"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Unauthorized");
    assert!(h.history.list().await.unwrap().is_empty());
}
