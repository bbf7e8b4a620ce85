//! Integration tests: the real server on a random port, in-memory storage,
//! a manually advanced clock and the cheapest bcrypt cost.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::{json, Value};
use std::net::TcpListener;
use std::sync::Arc;
use uuid::Uuid;

use one_link::auth::{NewUser, PasswordHash, Principal, UserRecord};
use one_link::clock::ManualClock;
use one_link::configuration::{
    ApplicationSettings, DatabaseSettings, Environment, HashingSettings, JwtSettings, Settings,
    StorageBackend,
};
use one_link::startup::{run, AppContext};
use one_link::storage::{Link, LinkChanges, LinkStore, NewLink, StoreError, UserStore};

pub struct TestApp {
    pub address: String,
    pub clock: Arc<ManualClock>,
    pub client: reqwest::Client,
}

fn test_settings(environment: Environment) -> Settings {
    settings_with_origins(environment, Vec::new())
}

fn settings_with_origins(environment: Environment, allowed_origins: Vec<String>) -> Settings {
    Settings {
        database: DatabaseSettings {
            username: "postgres".to_string(),
            password: "password".to_string(),
            port: 5432,
            host: "localhost".to_string(),
            database_name: "one_link_test".to_string(),
        },
        application: ApplicationSettings {
            host: "127.0.0.1".to_string(),
            port: 0,
            environment,
            storage: StorageBackend::Memory,
            allowed_origins,
        },
        jwt: JwtSettings {
            secret: "integration-test-secret-at-least-32-bytes".to_string(),
            issuer: "one-link-test".to_string(),
        },
        hashing: HashingSettings { cost: 4 },
    }
}

fn serve(context: AppContext, clock: Arc<ManualClock>) -> TestApp {
    let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind random port");
    let port = listener.local_addr().unwrap().port();

    let server = run(listener, context).expect("Failed to create server");
    let _ = tokio::spawn(server);

    TestApp {
        address: format!("http://127.0.0.1:{}", port),
        clock,
        client: reqwest::Client::new(),
    }
}

fn spawn_app() -> TestApp {
    let clock = Arc::new(ManualClock::new());
    let context = AppContext::in_memory(&test_settings(Environment::Production), clock.clone());
    serve(context, clock)
}

impl TestApp {
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.address, path)
    }

    async fn signup(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/signup"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn login(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/auth/login"))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    /// Sign up and return the issued token
    async fn register(&self, handle: &str, email: &str) -> String {
        let response = self
            .signup(json!({"handle": handle, "email": email, "password": "Abc123"}))
            .await;
        assert_eq!(201, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        body["data"]["token"].as_str().unwrap().to_string()
    }

    async fn create_link(&self, token: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/links"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request.")
    }

    async fn get(&self, path: &str, token: Option<&str>) -> reqwest::Response {
        let mut request = self.client.get(self.url(path));
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        request.send().await.expect("Failed to execute request.")
    }
}

// --- Scenario ---

#[tokio::test]
async fn signup_login_and_token_lifecycle() {
    let app = spawn_app();

    // Signup
    let response = app
        .signup(json!({"handle": "alice", "email": "a@x.com", "password": "Abc123"}))
        .await;
    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["expiresIn"], "7 days");
    assert_eq!(body["data"]["user"]["handle"], "alice");
    let token = body["data"]["token"].as_str().unwrap().to_string();
    assert!(!token.is_empty());

    // Same handle, different email
    let response = app
        .signup(json!({"handle": "alice", "email": "other@x.com", "password": "Abc123"}))
        .await;
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Handle already exists");

    // Wrong password
    let response = app.login(json!({"email": "a@x.com", "password": "wrong"})).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid email or password");
    assert!(body.get("errors").is_none());

    // No token
    let response = app.get("/api/auth/me", None).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Access token required");

    // Valid token
    let response = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["user"]["email"], "a@x.com");

    // Eight days later
    app.clock.advance(Duration::days(8));
    let response = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Token expired");
}

// --- Signup ---

#[tokio::test]
async fn signup_duplicate_email_names_email() {
    let app = spawn_app();
    app.register("alice", "a@x.com").await;

    let response = app
        .signup(json!({"handle": "bob", "email": "A@X.com", "password": "Abc123"}))
        .await;
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email already exists");
}

#[tokio::test]
async fn signup_accepts_username_alias() {
    let app = spawn_app();
    let response = app
        .signup(json!({"username": "carol", "email": "c@x.com", "password": "Abc123"}))
        .await;
    assert_eq!(201, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["user"]["handle"], "carol");
}

#[tokio::test]
async fn signup_missing_fields_are_listed() {
    let app = spawn_app();
    let response = app.signup(json!({"handle": "alice"})).await;
    assert_eq!(400, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Handle, email, and password are required");
    assert_eq!(body["errors"]["email"], "Email is required");
    assert_eq!(body["errors"]["password"], "Password is required");
    assert!(body["errors"].get("handle").is_none());
}

#[tokio::test]
async fn signup_rejects_invalid_input_with_field_errors() {
    let app = spawn_app();
    let test_cases = vec![
        (
            json!({"handle": "al", "email": "a@x.com", "password": "Abc123"}),
            "handle",
        ),
        (
            json!({"handle": "al ice", "email": "a@x.com", "password": "Abc123"}),
            "handle",
        ),
        (
            json!({"handle": "alice", "email": "not-an-email", "password": "Abc123"}),
            "email",
        ),
        (
            json!({"handle": "alice", "email": "a@x.com", "password": "abc123"}),
            "password",
        ),
        (
            json!({"handle": "alice", "email": "a@x.com", "password": "Ab1"}),
            "password",
        ),
        (
            json!({"handle": "alice", "email": "a@x.com", "password": format!("Ab1{}", "a".repeat(70))}),
            "password",
        ),
    ];

    for (body, field) in test_cases {
        let response = app.signup(body.clone()).await;
        assert_eq!(400, response.status().as_u16(), "payload {}", body);
        let json: Value = response.json().await.unwrap();
        assert!(json["errors"].get(field).is_some(), "payload {}", body);
    }
}

#[tokio::test]
async fn concurrent_signups_with_same_handle_have_one_winner() {
    let app = spawn_app();

    let (first, second) = tokio::join!(
        app.signup(json!({"handle": "alice", "email": "a1@x.com", "password": "Abc123"})),
        app.signup(json!({"handle": "alice", "email": "a2@x.com", "password": "Abc123"})),
    );

    let mut statuses = vec![first.status().as_u16(), second.status().as_u16()];
    statuses.sort();
    assert_eq!(statuses, vec![201, 400]);

    let (loser, loser_email) = if first.status().as_u16() == 400 {
        (first, "a1@x.com")
    } else {
        (second, "a2@x.com")
    };
    let body: Value = loser.json().await.unwrap();
    assert_eq!(body["message"], "Handle already exists");

    // No row was written for the losing signup
    let response = app
        .login(json!({"email": loser_email, "password": "Abc123"}))
        .await;
    assert_eq!(401, response.status().as_u16());

    let response = app.get("/api/profiles/alice", None).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn malformed_json_gets_error_envelope() {
    let app = spawn_app();
    let response = app
        .client
        .post(app.url("/api/auth/signup"))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();

    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["message"], "Invalid JSON payload");
}

// --- Login ---

#[tokio::test]
async fn login_failures_are_indistinguishable() {
    let app = spawn_app();
    app.register("alice", "a@x.com").await;

    let wrong_password = app.login(json!({"email": "a@x.com", "password": "Wrong123"})).await;
    let unknown_email = app
        .login(json!({"email": "nobody@x.com", "password": "Abc123"}))
        .await;

    assert_eq!(wrong_password.status(), unknown_email.status());
    let wrong_password: Value = wrong_password.json().await.unwrap();
    let unknown_email: Value = unknown_email.json().await.unwrap();
    assert_eq!(wrong_password, unknown_email);
}

#[tokio::test]
async fn login_returns_token_and_is_case_insensitive() {
    let app = spawn_app();
    app.register("alice", "a@x.com").await;

    let response = app.login(json!({"email": "A@x.COM", "password": "Abc123"})).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["expiresIn"], "7 days");
    assert_eq!(body["data"]["user"]["handle"], "alice");
    assert!(body["data"]["token"].as_str().is_some());
}

#[tokio::test]
async fn login_requires_email_and_password() {
    let app = spawn_app();
    let response = app.login(json!({"email": "a@x.com"})).await;
    assert_eq!(400, response.status().as_u16());

    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Email and password are required");
    assert_eq!(body["errors"]["password"], "Password is required");
}

#[tokio::test]
async fn password_hash_never_leaves_the_server() {
    let app = spawn_app();
    let signup = app
        .signup(json!({"handle": "alice", "email": "a@x.com", "password": "Abc123"}))
        .await
        .text()
        .await
        .unwrap();
    let login = app
        .login(json!({"email": "a@x.com", "password": "Abc123"}))
        .await
        .text()
        .await
        .unwrap();

    for body in [signup, login] {
        assert!(!body.contains("password"), "{}", body);
        assert!(!body.contains("$2b$"), "{}", body);
        assert!(!body.contains("Abc123"), "{}", body);
    }
}

// --- Tokens ---

#[tokio::test]
async fn tampered_token_is_rejected_as_invalid() {
    let app = spawn_app();
    let token = app.register("alice", "a@x.com").await;

    let mut tampered: Vec<char> = token.chars().collect();
    let last = tampered.len() - 2;
    tampered[last] = if tampered[last] == 'A' { 'B' } else { 'A' };
    let tampered: String = tampered.into_iter().collect();

    let response = app.get("/api/auth/me", Some(&tampered)).await;
    assert_eq!(401, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid token");
}

#[tokio::test]
async fn logout_is_acknowledged_and_token_still_verifies() {
    let app = spawn_app();
    let token = app.register("alice", "a@x.com").await;

    let response = app
        .client
        .post(app.url("/api/auth/logout"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(200, response.status().as_u16());

    // Stateless tokens: nothing was revoked
    let response = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(200, response.status().as_u16());
}

#[tokio::test]
async fn responses_carry_request_id() {
    let app = spawn_app();
    let response = app.get("/health_check", None).await;

    assert!(response.status().is_success());
    let request_id = response.headers().get("x-request-id").unwrap();
    assert!(Uuid::parse_str(request_id.to_str().unwrap()).is_ok());
}

#[tokio::test]
async fn cors_allows_any_origin_by_default() {
    let app = spawn_app();
    let response = app
        .client
        .get(app.url("/health_check"))
        .header("Origin", "http://localhost:3000")
        .send()
        .await
        .unwrap();

    assert!(response.status().is_success());
    let allowed = response
        .headers()
        .get("access-control-allow-origin")
        .expect("Missing CORS header");
    assert!(["*", "http://localhost:3000"].contains(&allowed.to_str().unwrap()));
}

#[tokio::test]
async fn cors_honours_configured_origins() {
    let clock = Arc::new(ManualClock::new());
    let settings = settings_with_origins(
        Environment::Production,
        vec!["https://app.example.com".to_string()],
    );
    let app = serve(AppContext::in_memory(&settings, clock.clone()), clock);

    let preflight = app
        .client
        .request(reqwest::Method::OPTIONS, app.url("/api/auth/login"))
        .header("Origin", "https://app.example.com")
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", "content-type")
        .send()
        .await
        .unwrap();
    assert!(preflight.status().is_success());
    assert_eq!(
        preflight.headers().get("access-control-allow-origin").unwrap(),
        "https://app.example.com"
    );

    let foreign = app
        .client
        .get(app.url("/health_check"))
        .header("Origin", "https://evil.example.com")
        .send()
        .await
        .unwrap();
    assert!(foreign.headers().get("access-control-allow-origin").is_none());
}

// --- Password change ---

#[tokio::test]
async fn change_password_flow() {
    let app = spawn_app();
    let token = app.register("alice", "a@x.com").await;

    let wrong = app
        .client
        .put(app.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({"current_password": "Nope123", "new_password": "Xyz789a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, wrong.status().as_u16());
    let body: Value = wrong.json().await.unwrap();
    assert_eq!(body["message"], "Current password is incorrect");

    let weak = app
        .client
        .put(app.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({"current_password": "Abc123", "new_password": "weakpass"}))
        .send()
        .await
        .unwrap();
    assert_eq!(400, weak.status().as_u16());
    let body: Value = weak.json().await.unwrap();
    assert!(body["errors"].get("new_password").is_some());

    let ok = app
        .client
        .put(app.url("/api/auth/password"))
        .bearer_auth(&token)
        .json(&json!({"current_password": "Abc123", "new_password": "Xyz789a"}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, ok.status().as_u16());

    let old = app.login(json!({"email": "a@x.com", "password": "Abc123"})).await;
    assert_eq!(401, old.status().as_u16());
    let new = app.login(json!({"email": "a@x.com", "password": "Xyz789a"})).await;
    assert_eq!(200, new.status().as_u16());
}

// --- Links ---

#[tokio::test]
async fn links_default_order_and_listing() {
    let app = spawn_app();
    let token = app.register("alice", "a@x.com").await;

    let first = app
        .create_link(&token, json!({"title": "Blog", "url": "https://blog.example.com"}))
        .await;
    assert_eq!(201, first.status().as_u16());
    let first: Value = first.json().await.unwrap();
    assert_eq!(first["data"]["link"]["order"], 0);
    assert!(first["data"]["link"].get("owner_id").is_none());

    let second = app
        .create_link(&token, json!({"title": "  Shop  ", "url": "http://shop.example.com"}))
        .await;
    let second: Value = second.json().await.unwrap();
    assert_eq!(second["data"]["link"]["order"], 1);
    assert_eq!(second["data"]["link"]["title"], "Shop");

    let listed: Value = app.get("/api/links", Some(&token)).await.json().await.unwrap();
    let titles: Vec<&str> = listed["data"]["links"]
        .as_array()
        .unwrap()
        .iter()
        .map(|link| link["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, vec!["Blog", "Shop"]);
}

#[tokio::test]
async fn links_reject_invalid_input() {
    let app = spawn_app();
    let token = app.register("alice", "a@x.com").await;

    let test_cases = vec![
        (json!({"url": "https://x.com"}), "Title and URL are required"),
        (
            json!({"title": "a".repeat(101), "url": "https://x.com"}),
            "Title must be between 1 and 100 characters",
        ),
        (
            json!({"title": "Blog", "url": "javascript:alert(1)"}),
            "URL must be a valid http or https address",
        ),
        (
            json!({"title": "Blog", "url": "https://x.com", "order": -1}),
            "Order must be a non-negative number",
        ),
    ];

    for (body, message) in test_cases {
        let response = app.create_link(&token, body.clone()).await;
        assert_eq!(400, response.status().as_u16(), "payload {}", body);
        let json: Value = response.json().await.unwrap();
        assert_eq!(json["message"], message, "payload {}", body);
    }
}

#[tokio::test]
async fn links_require_authentication() {
    let app = spawn_app();
    let response = app.get("/api/links", None).await;
    assert_eq!(401, response.status().as_u16());
}

#[tokio::test]
async fn links_are_isolated_between_principals() {
    let app = spawn_app();
    let alice = app.register("alice", "a@x.com").await;
    let bob = app.register("bob", "b@x.com").await;

    let created: Value = app
        .create_link(&alice, json!({"title": "Blog", "url": "https://blog.example.com"}))
        .await
        .json()
        .await
        .unwrap();
    let link_id = created["data"]["link"]["id"].as_str().unwrap().to_string();

    // Bob sees none of Alice's links
    let listed: Value = app.get("/api/links", Some(&bob)).await.json().await.unwrap();
    assert_eq!(listed["data"]["links"].as_array().unwrap().len(), 0);

    // Bob cannot update or delete it
    let update = app
        .client
        .put(app.url(&format!("/api/links/{}", link_id)))
        .bearer_auth(&bob)
        .json(&json!({"title": "Pwned"}))
        .send()
        .await
        .unwrap();
    assert_eq!(404, update.status().as_u16());
    let body: Value = update.json().await.unwrap();
    assert_eq!(body["message"], "Link not found or access denied");

    let delete = app
        .client
        .delete(app.url(&format!("/api/links/{}", link_id)))
        .bearer_auth(&bob)
        .send()
        .await
        .unwrap();
    assert_eq!(404, delete.status().as_u16());

    // Alice can
    let update = app
        .client
        .put(app.url(&format!("/api/links/{}", link_id)))
        .bearer_auth(&alice)
        .json(&json!({"title": "Renamed", "order": 3}))
        .send()
        .await
        .unwrap();
    assert_eq!(200, update.status().as_u16());
    let body: Value = update.json().await.unwrap();
    assert_eq!(body["data"]["link"]["title"], "Renamed");
    assert_eq!(body["data"]["link"]["order"], 3);
    assert_eq!(body["data"]["link"]["url"], "https://blog.example.com");

    let delete = app
        .client
        .delete(app.url(&format!("/api/links/{}", link_id)))
        .bearer_auth(&alice)
        .send()
        .await
        .unwrap();
    assert_eq!(200, delete.status().as_u16());

    let listed: Value = app.get("/api/links", Some(&alice)).await.json().await.unwrap();
    assert_eq!(listed["data"]["links"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn malformed_link_id_is_rejected() {
    let app = spawn_app();
    let token = app.register("alice", "a@x.com").await;

    let response = app
        .client
        .delete(app.url("/api/links/not-a-uuid"))
        .bearer_auth(&token)
        .send()
        .await
        .unwrap();
    assert_eq!(400, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Invalid link ID");
}

// --- Profiles ---

#[tokio::test]
async fn profile_reports_ownership() {
    let app = spawn_app();
    let alice = app.register("alice", "a@x.com").await;
    let bob = app.register("bob", "b@x.com").await;
    app.create_link(&alice, json!({"title": "Blog", "url": "https://blog.example.com"}))
        .await;

    let cases = vec![(Some(alice.as_str()), true), (Some(bob.as_str()), false), (None, false)];
    for (token, is_owner) in cases {
        let response = app.get("/api/profiles/alice", token).await;
        assert_eq!(200, response.status().as_u16());
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["data"]["handle"], "alice");
        assert_eq!(body["data"]["is_owner"], is_owner);
        assert_eq!(body["data"]["links"].as_array().unwrap().len(), 1);
        assert!(body["data"].get("email").is_none());
    }
}

#[tokio::test]
async fn profile_with_bad_token_falls_back_to_visitor() {
    let app = spawn_app();
    app.register("alice", "a@x.com").await;

    let response = app.get("/api/profiles/alice", Some("garbage")).await;
    assert_eq!(200, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["data"]["is_owner"], false);
}

#[tokio::test]
async fn unknown_profile_and_route_are_404() {
    let app = spawn_app();

    let response = app.get("/api/profiles/nobody", None).await;
    assert_eq!(404, response.status().as_u16());

    let response = app.get("/does/not/exist", None).await;
    assert_eq!(404, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Route not found");
}

#[tokio::test]
async fn index_and_health_check() {
    let app = spawn_app();

    let health = app.get("/health_check", None).await;
    assert!(health.status().is_success());
    assert_eq!(Some(0), health.content_length());

    let index: Value = app.get("/", None).await.json().await.unwrap();
    assert_eq!(index["success"], true);
    assert!(index["data"]["endpoints"]["auth"]["signup"].is_string());
}

// --- Internal failures ---

/// Every call fails as if the database were down
struct BrokenStore;

fn outage() -> StoreError {
    StoreError::Backend("connection refused (os error 111)".to_string())
}

#[async_trait]
impl UserStore for BrokenStore {
    async fn find_by_handle_or_email(&self, _: &str, _: &str) -> Result<Option<UserRecord>, StoreError> {
        Err(outage())
    }

    async fn insert(&self, _: NewUser) -> Result<UserRecord, StoreError> {
        Err(outage())
    }

    async fn find_principal_by_id(&self, _: Uuid) -> Result<Option<Principal>, StoreError> {
        Err(outage())
    }

    async fn find_principal_by_handle(&self, _: &str) -> Result<Option<Principal>, StoreError> {
        Err(outage())
    }

    async fn find_by_email(&self, _: &str) -> Result<Option<UserRecord>, StoreError> {
        Err(outage())
    }

    async fn update_password_hash(&self, _: Uuid, _: &PasswordHash) -> Result<bool, StoreError> {
        Err(outage())
    }
}

#[async_trait]
impl LinkStore for BrokenStore {
    async fn list_for_owner(&self, _: Uuid) -> Result<Vec<Link>, StoreError> {
        Err(outage())
    }

    async fn max_position(&self, _: Uuid) -> Result<Option<i32>, StoreError> {
        Err(outage())
    }

    async fn insert(&self, _: NewLink) -> Result<Link, StoreError> {
        Err(outage())
    }

    async fn update_for_owner(&self, _: Uuid, _: Uuid, _: LinkChanges) -> Result<Option<Link>, StoreError> {
        Err(outage())
    }

    async fn delete_for_owner(&self, _: Uuid, _: Uuid) -> Result<bool, StoreError> {
        Err(outage())
    }
}

fn spawn_broken_app(environment: Environment) -> TestApp {
    let clock = Arc::new(ManualClock::new());
    let store = Arc::new(BrokenStore);
    let context = AppContext::new(&test_settings(environment), store.clone(), store, clock.clone());
    serve(context, clock)
}

#[tokio::test]
async fn storage_fault_detail_is_hidden_in_production() {
    let app = spawn_broken_app(Environment::Production);
    let response = app.login(json!({"email": "a@x.com", "password": "Abc123"})).await;

    assert_eq!(500, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body, json!({"success": false, "message": "Internal server error"}));
}

#[tokio::test]
async fn storage_fault_detail_is_echoed_in_development() {
    let app = spawn_broken_app(Environment::Development);
    let response = app.login(json!({"email": "a@x.com", "password": "Abc123"})).await;

    assert_eq!(500, response.status().as_u16());
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["message"], "Internal server error");
    assert_eq!(body["error"], "connection refused (os error 111)");
}

#[tokio::test]
async fn storage_fault_during_authentication_is_500() {
    let clock = Arc::new(ManualClock::new());
    let settings = test_settings(Environment::Production);

    // Token minted against a healthy store, presented to a broken one
    let healthy = AppContext::in_memory(&settings, clock.clone());
    let principal = healthy
        .credentials
        .register("alice", "a@x.com", "Abc123")
        .await
        .unwrap();
    let token = healthy.tokens.issue(&principal).unwrap();

    let app = spawn_broken_app(Environment::Production);
    let response = app.get("/api/auth/me", Some(&token)).await;
    assert_eq!(500, response.status().as_u16());
}
