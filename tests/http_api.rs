/// End-to-end tests driving the full router in process

use account_service::{
    config::{AuthConfig, LoggingConfig, ServiceConfig, StorageConfig},
    db,
    mailer::{EmailSender, Mailer, OutgoingEmail},
    server::build_router,
    ApiResult, AppContext, ServerConfig,
};
use async_trait::async_trait;
use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};
use tower::ServiceExt;

#[derive(Default)]
struct Outbox {
    sent: Mutex<Vec<OutgoingEmail>>,
}

impl Outbox {
    fn sent(&self) -> Vec<OutgoingEmail> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl EmailSender for Outbox {
    async fn send(&self, email: OutgoingEmail) -> ApiResult<()> {
        self.sent.lock().unwrap().push(email);
        Ok(())
    }
}

struct TestApp {
    router: Router,
    outbox: Arc<Outbox>,
}

fn config() -> ServerConfig {
    ServerConfig {
        service: ServiceConfig {
            hostname: "localhost".to_string(),
            port: 5000,
            public_url: "http://localhost:5000".to_string(),
        },
        storage: StorageConfig {
            database_path: PathBuf::from(db::IN_MEMORY),
            max_connections: 1,
        },
        authentication: AuthConfig {
            jwt_secret: "integration-secret-with-plenty-of-length".to_string(),
            access_token_ttl: 7 * 24 * 3600,
            verification_token_ttl: 24 * 3600,
        },
        email: None,
        logging: LoggingConfig {
            level: "debug".to_string(),
            json: false,
        },
    }
}

async fn spawn_app() -> TestApp {
    let config = config();
    let pool = db::connect_in_memory().await.unwrap();
    db::run_migrations(&pool).await.unwrap();

    let outbox = Arc::new(Outbox::default());
    let mailer = Mailer::with_sender(outbox.clone(), &config.service.public_url);
    let ctx = AppContext::from_parts(config, pool, mailer);

    TestApp {
        router: build_router(ctx),
        outbox,
    }
}

impl TestApp {
    async fn request(
        &self,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };

        (status, value)
    }

    async fn wait_for_mail(&self, count: usize) -> Vec<OutgoingEmail> {
        for _ in 0..200 {
            let sent = self.outbox.sent();
            if sent.len() >= count {
                return sent;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("expected {} emails", count);
    }

    async fn register(&self, username: &str, email: &str) -> StatusCode {
        let (status, _) = self
            .request(
                Method::POST,
                "/register",
                None,
                Some(json!({
                    "username": username,
                    "email": email,
                    "password": "Secret123",
                    "name": "Test User"
                })),
            )
            .await;
        status
    }

    /// Register, confirm through the mailed link, and log in
    async fn verified_login(&self, username: &str, email: &str) -> String {
        let before = self.outbox.sent().len();
        assert_eq!(self.register(username, email).await, StatusCode::CREATED);

        let mail = self.wait_for_mail(before + 1).await;
        let path = confirmation_path(&mail[before].body);
        let (status, _) = self.request(Method::GET, &path, None, None).await;
        assert_eq!(status, StatusCode::OK);

        let (status, body) = self
            .request(
                Method::POST,
                "/login",
                None,
                Some(json!({"username": username, "password": "Secret123"})),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        body["access_token"].as_str().unwrap().to_string()
    }
}

fn confirmation_path(body: &str) -> String {
    let start = body.find("/user/confirm_email/").unwrap();
    body[start..].split_whitespace().next().unwrap().to_string()
}

#[tokio::test]
async fn test_alice_registration_flow() {
    let app = spawn_app().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/register",
            None,
            Some(json!({
                "username": "alice",
                "email": "a@x.com",
                "password": "Secret123",
                "name": "Alice"
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["message"]
        .as_str()
        .unwrap()
        .starts_with("User was created successfully."));

    let (status, body) = app
        .request(
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "alice", "password": "Secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "EmailNotVerified");

    let mail = app.wait_for_mail(1).await;
    assert_eq!(mail[0].to, "a@x.com");
    let path = confirmation_path(&mail[0].body);

    let (status, body) = app.request(Method::GET, &path, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "You have confirmed your account. Thanks!");

    let (status, body) = app.request(Method::GET, &path, None, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "AlreadyConfirmed");

    let (status, body) = app
        .request(
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "alice", "password": "Secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["access_token"].as_str().is_some());

    let expiry = body["expiry"].as_f64().unwrap();
    let expected = (chrono::Utc::now() + chrono::Duration::days(7)).timestamp() as f64;
    assert!((expiry - expected).abs() < 10.0);

    let (status, body) = app
        .request(
            Method::POST,
            "/user/resend_email",
            None,
            Some(json!({"email": "a@x.com"})),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "AlreadyVerified");
}

#[tokio::test]
async fn test_login_failures() {
    let app = spawn_app().await;
    app.verified_login("alice", "a@x.com").await;

    let (status, unknown) = app
        .request(
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "nobody", "password": "Secret123"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, wrong) = app
        .request(
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "alice", "password": "Wrong1234"})),
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(unknown, wrong);

    let (status, body) = app
        .request(Method::POST, "/login", None, Some(json!({"password": "Secret123"})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "MissingField");
}

#[tokio::test]
async fn test_register_validation_and_duplicates() {
    let app = spawn_app().await;

    let (status, body) = app
        .request(
            Method::POST,
            "/register",
            None,
            Some(json!({"username": "al", "email": "bad", "password": "weak"})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "ValidationError");
    let fields: Vec<&str> = body["fields"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["email", "password", "username"]);

    assert_eq!(app.register("alice", "a@x.com").await, StatusCode::CREATED);
    assert_eq!(app.register("alice2", "a@x.com").await, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_malformed_body_is_a_validation_error() {
    let app = spawn_app().await;

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["fields"][0]["field"], "body");
}

#[tokio::test]
async fn test_confirm_with_garbage_token() {
    let app = spawn_app().await;

    let (status, body) = app
        .request(Method::GET, "/user/confirm_email/not-a-token", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidToken");
}

#[tokio::test]
async fn test_protected_routes_require_bearer_token() {
    let app = spawn_app().await;

    for uri in ["/user", "/users", "/users/verified", "/users/1", "/home"] {
        let (status, body) = app.request(Method::GET, uri, None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{}", uri);
        assert_eq!(body["error"], "Unauthorized");
    }

    let (status, _) = app
        .request(Method::GET, "/user", Some("not.a.jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_verification_token_is_not_an_access_token() {
    let app = spawn_app().await;
    app.register("alice", "a@x.com").await;

    let mail = app.wait_for_mail(1).await;
    let path = confirmation_path(&mail[0].body);
    let token = path.rsplit('/').next().unwrap();

    let (status, _) = app.request(Method::GET, "/user", Some(token), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_lookup_and_listing() {
    let app = spawn_app().await;
    let alice = app.verified_login("alice", "a@x.com").await;
    app.verified_login("bobby", "b@x.com").await;
    assert_eq!(app.register("carol", "c@x.com").await, StatusCode::CREATED);

    let (status, me) = app.request(Method::GET, "/user", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["username"], "alice");
    assert_eq!(me["email"], "a@x.com");
    assert_eq!(me["is_email_verified"], true);

    let (status, body) = app.request(Method::GET, "/users/abc", Some(&alice), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "InvalidId");

    let (status, body) = app.request(Method::GET, "/users/999", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");

    let id = me["id"].as_i64().unwrap();
    let (status, body) = app
        .request(Method::GET, &format!("/users/{}", id), Some(&alice), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
    assert!(body.get("email").is_none());

    let (_, all) = app.request(Method::GET, "/users", Some(&alice), None).await;
    let names: Vec<&str> = all
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bobby", "carol"]);

    let (_, verified) = app
        .request(Method::GET, "/users/verified", Some(&alice), None)
        .await;
    let names: Vec<&str> = verified
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["bobby"]);
}

#[tokio::test]
async fn test_profile_update_password_change_and_delete() {
    let app = spawn_app().await;
    let token = app.verified_login("alice", "a@x.com").await;

    let (status, body) = app
        .request(
            Method::PUT,
            "/user",
            Some(&token),
            Some(json!({"bio": "Rustacean", "available_to_mentor": true})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User was updated successfully.");

    let (_, me) = app.request(Method::GET, "/user", Some(&token), None).await;
    assert_eq!(me["bio"], "Rustacean");
    assert_eq!(me["available_to_mentor"], true);

    let (status, body) = app
        .request(Method::PUT, "/user", Some(&token), Some(json!({})))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["fields"][0]["field"], "body");

    let (status, body) = app
        .request(
            Method::PUT,
            "/user/change_password",
            Some(&token),
            Some(json!({"current_password": "Nope12345", "new_password": "Better456"})),
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "IncorrectPassword");

    let (status, _) = app
        .request(
            Method::PUT,
            "/user/change_password",
            Some(&token),
            Some(json!({"current_password": "Secret123", "new_password": "Better456"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            Method::POST,
            "/login",
            None,
            Some(json!({"username": "a@x.com", "password": "Better456"})),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.request(Method::DELETE, "/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User was deleted successfully.");

    let (status, _) = app.request(Method::GET, "/user", Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_home_statistics() {
    let app = spawn_app().await;
    let token = app.verified_login("alice", "a@x.com").await;

    let (status, body) = app.request(Method::GET, "/home", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Test User");
    assert_eq!(body["pending_requests"], 0);
    assert_eq!(body["completed_relations"], 0);
}

#[tokio::test]
async fn test_health_metrics_and_fallback() {
    let app = spawn_app().await;

    let (status, body) = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.request(Method::GET, "/metrics", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_str().unwrap().contains("http_requests_total"));

    let (status, body) = app.request(Method::GET, "/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NotFound");
}
