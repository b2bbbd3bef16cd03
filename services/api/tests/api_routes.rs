//! Router-level tests over the in-memory store and a scripted translation engine.

use api_lib::adapters::MemoryDocumentStore;
use api_lib::web::{router, AppState};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use messenger_core::{
    domain::User,
    ports::{DocumentStore, PortError, PortResult, TranslationEngine},
    LanguageCode, LanguagePair,
};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Knows "Hello" in Spanish; anything else fails to translate.
#[derive(Default)]
struct ScriptedEngine {
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedEngine {
    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

#[async_trait]
impl TranslationEngine for ScriptedEngine {
    async fn ensure_model(&self, _pair: LanguagePair) -> PortResult<()> {
        Ok(())
    }

    async fn translate(&self, pair: LanguagePair, text: &str) -> PortResult<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match (pair.to, text) {
            (LanguageCode::Spanish, "Hello") => Ok("Hola".to_string()),
            _ => Err(PortError::Unexpected("model offline".to_string())),
        }
    }
}

struct TestApp {
    router: Router,
    store: Arc<MemoryDocumentStore>,
    engine: Arc<ScriptedEngine>,
}

fn app() -> TestApp {
    app_with(ScriptedEngine::default())
}

fn app_with(engine: ScriptedEngine) -> TestApp {
    let store = Arc::new(MemoryDocumentStore::with_tokens(vec![
        ("alice-token".to_string(), "alice".to_string()),
        ("bob-token".to_string(), "bob".to_string()),
        ("carol-token".to_string(), "carol".to_string()),
    ]));
    let engine = Arc::new(engine);
    let state = AppState::new(store.clone(), store.clone(), engine.clone());
    TestApp {
        router: router(Arc::new(state)),
        store,
        engine,
    }
}

async fn call(
    router: &Router,
    method: &str,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, String) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    if body.is_some() {
        builder = builder.header("content-type", "application/json");
    }
    let body = match body {
        Some(v) => Body::from(serde_json::to_string(&v).unwrap()),
        None => Body::empty(),
    };
    let resp = router.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), 1024 * 1024).await.unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

fn json_of(body: &str) -> Value {
    serde_json::from_str(body).unwrap()
}

async fn register(router: &Router, token: &str, email: &str, language: Option<&str>) {
    let (status, body) = call(
        router,
        "PUT",
        "/users/me",
        Some(token),
        Some(json!({
            "email": email,
            "name": email,
            "profile_image_url": format!("https://img.example.com/{}.png", email),
            "language": language,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "register failed: {}", body);
}

async fn seeded() -> TestApp {
    seed(app()).await
}

async fn seed(app: TestApp) -> TestApp {
    register(&app.router, "alice-token", "alice@example.com", Some("English")).await;
    register(&app.router, "bob-token", "bob@example.com", Some("spanish")).await;
    app
}

#[tokio::test]
async fn test_health_is_public_and_everything_else_needs_a_token() {
    let app = app();
    let (status, body) = call(&app.router, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");

    let (status, _) = call(&app.router, "GET", "/users/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app.router, "GET", "/users/me", Some("forged"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_profile_registration_defaults_to_english() {
    let app = app();
    let (status, _) = call(&app.router, "GET", "/users/me", Some("carol-token"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    register(&app.router, "carol-token", " Carol@Example.com ", None).await;
    let (status, body) = call(&app.router, "GET", "/users/me", Some("carol-token"), None).await;
    assert_eq!(status, StatusCode::OK);
    let profile = json_of(&body);
    assert_eq!(profile["uid"], "carol");
    assert_eq!(profile["email"], "carol@example.com");
    assert_eq!(profile["language"], "English");
}

#[tokio::test]
async fn test_profile_registration_rejects_unknown_language() {
    let app = app();
    let (status, _) = call(
        &app.router,
        "PUT",
        "/users/me",
        Some("carol-token"),
        Some(json!({ "email": "carol@example.com", "name": "Carol", "language": "Klingon" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_search_by_email() {
    let app = seeded().await;

    let (status, body) = call(
        &app.router,
        "GET",
        "/users/search?email=BOB@example.com",
        Some("alice-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let found = json_of(&body);
    assert_eq!(found["contact"]["uid"], "bob");
    assert_eq!(found["status"], "User found! You can start a chat.");

    let (status, body) = call(
        &app.router,
        "GET",
        "/users/search?email=alice@example.com",
        Some("alice-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Cannot start chat with yourself.");

    let (status, body) = call(
        &app.router,
        "GET",
        "/users/search?email=nobody@example.com",
        Some("alice-token"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, "No user found with this email. Try again.");

    let (status, _) = call(&app.router, "GET", "/users/search", Some("alice-token"), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_send_translates_and_writes_four_records() {
    let app = seeded().await;

    let (status, body) = call(
        &app.router,
        "POST",
        "/conversations/bob/messages",
        Some("alice-token"),
        Some(json!({ "text": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    let report = json_of(&body);
    assert_eq!(report["original_text"], "Hello");
    assert_eq!(report["status"], "");
    // The sender never sees what the recipient received.
    assert!(report.get("recipient_text").is_none());
    assert!(report.get("translation").is_none());
    assert!(!body.contains("Hola"));
    for write in ["sender_copy", "recipient_copy", "sender_summary", "recipient_summary"] {
        assert_eq!(report[write]["written"], true, "{} not written", write);
    }

    let (_, body) = call(&app.router, "GET", "/conversations/bob/messages", Some("alice-token"), None).await;
    let alice_copy = json_of(&body);
    assert_eq!(alice_copy.as_array().unwrap().len(), 1);
    assert_eq!(alice_copy[0]["text"], "Hello");
    assert_eq!(alice_copy[0]["from_id"], "alice");

    let (_, body) = call(&app.router, "GET", "/conversations/alice/messages", Some("bob-token"), None).await;
    let bob_copy = json_of(&body);
    assert_eq!(bob_copy[0]["text"], "Hola");
    assert_eq!(bob_copy[0]["timestamp"], alice_copy[0]["timestamp"]);

    let (_, body) = call(&app.router, "GET", "/conversations", Some("bob-token"), None).await;
    let inbox = json_of(&body);
    assert_eq!(inbox[0]["counterpart_id"], "alice");
    assert_eq!(inbox[0]["text"], "Hola");
    assert_eq!(inbox[0]["email"], "alice@example.com");
}

#[tokio::test]
async fn test_untranslatable_text_falls_back_to_original() {
    let app = seeded().await;

    let (status, body) = call(
        &app.router,
        "POST",
        "/conversations/bob/messages",
        Some("alice-token"),
        Some(json!({ "text": "Good night" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let report = json_of(&body);
    assert_eq!(report["status"], "");
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 1);

    let (_, body) = call(&app.router, "GET", "/conversations/alice/messages", Some("bob-token"), None).await;
    assert_eq!(json_of(&body)[0]["text"], "Good night");
}

#[tokio::test]
async fn test_same_language_skips_the_engine() {
    let app = seeded().await;
    register(&app.router, "carol-token", "carol@example.com", Some("English")).await;

    let (status, body) = call(
        &app.router,
        "POST",
        "/conversations/carol/messages",
        Some("alice-token"),
        Some(json!({ "text": "Hi Carol" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json_of(&body)["status"], "");
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);

    let (_, body) = call(&app.router, "GET", "/conversations/alice/messages", Some("carol-token"), None).await;
    assert_eq!(json_of(&body)[0]["text"], "Hi Carol");
}

#[tokio::test]
async fn test_missing_language_writes_nothing() {
    let app = seeded().await;
    // A legacy profile written before languages were recorded.
    app.store
        .put_user(&User {
            id: "carol".into(),
            email: "carol@example.com".to_string(),
            name: "Carol".to_string(),
            profile_image_url: String::new(),
            language: None,
        })
        .await
        .unwrap();

    let (status, body) = call(
        &app.router,
        "POST",
        "/conversations/carol/messages",
        Some("alice-token"),
        Some(json!({ "text": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body, "Failed to fetch user languages.");

    let (_, body) = call(&app.router, "GET", "/conversations/carol/messages", Some("alice-token"), None).await;
    assert_eq!(json_of(&body), json!([]));
    let (_, body) = call(&app.router, "GET", "/conversations", Some("alice-token"), None).await;
    assert_eq!(json_of(&body), json!([]));
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_blank_message_is_rejected() {
    let app = seeded().await;
    let (status, _) = call(
        &app.router,
        "POST",
        "/conversations/bob/messages",
        Some("alice-token"),
        Some(json!({ "text": "   " })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = call(&app.router, "GET", "/conversations/bob/messages", Some("alice-token"), None).await;
    assert_eq!(json_of(&body), json!([]));
}

#[tokio::test]
async fn test_sending_to_unknown_user_is_not_found() {
    let app = seeded().await;
    let (status, _) = call(
        &app.router,
        "POST",
        "/conversations/ghost/messages",
        Some("alice-token"),
        Some(json!({ "text": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_logout_revokes_the_token() {
    let app = seeded().await;
    let (status, _) = call(&app.router, "POST", "/auth/logout", Some("alice-token"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = call(&app.router, "GET", "/users/me", Some("alice-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = call(&app.router, "GET", "/users/me", Some("bob-token"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_sending_to_yourself_is_rejected() {
    let app = seeded().await;
    let (status, body) = call(
        &app.router,
        "POST",
        "/conversations/alice/messages",
        Some("alice-token"),
        Some(json!({ "text": "Hello" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, "Send rejected: cannot send a message to yourself");

    let (_, body) = call(&app.router, "GET", "/conversations/alice/messages", Some("alice-token"), None).await;
    assert_eq!(json_of(&body), json!([]));
    let (_, body) = call(&app.router, "GET", "/conversations", Some("alice-token"), None).await;
    assert_eq!(json_of(&body), json!([]));
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_send_completes_after_the_client_hangs_up() {
    let app = seed(app_with(ScriptedEngine::slow(Duration::from_millis(100)))).await;

    // The request future is dropped while the translation is still running.
    let abandoned = tokio::time::timeout(
        Duration::from_millis(10),
        call(
            &app.router,
            "POST",
            "/conversations/bob/messages",
            Some("alice-token"),
            Some(json!({ "text": "Hello" })),
        ),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(app.engine.calls.load(Ordering::SeqCst), 1);

    let (_, body) = call(&app.router, "GET", "/conversations/bob/messages", Some("alice-token"), None).await;
    assert_eq!(json_of(&body)[0]["text"], "Hello");
    let (_, body) = call(&app.router, "GET", "/conversations/alice/messages", Some("bob-token"), None).await;
    assert_eq!(json_of(&body)[0]["text"], "Hola");
    let (_, body) = call(&app.router, "GET", "/conversations", Some("bob-token"), None).await;
    assert_eq!(json_of(&body)[0]["text"], "Hola");
}
