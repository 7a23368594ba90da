//! API integration tests
//!
//! Drive the full router in-process over the in-memory store, with a fake
//! identity provider standing in for the Auth0 tenant.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Method, Request, StatusCode},
    Router,
};
use jsonwebtoken::{EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use library_reservation_server::{
    api,
    config::{AppConfig, StorageBackend},
    models::auth::{AccountUpdate, AuthTokens, NewAccount},
    repository::Repository,
    services::{
        identity::{IdentityProvider, ProviderError},
        Services,
    },
    AppState,
};

const NAMESPACE: &str = "http://customerInfo";

/// Provider that remembers accounts in memory and mints unsigned id tokens
#[derive(Default)]
struct FakeProvider {
    // email -> (password, local user id)
    accounts: Mutex<HashMap<String, (String, String)>>,
    revoked: Mutex<Vec<String>>,
}

fn id_token(user_id: &str) -> String {
    let claims = json!({ NAMESPACE: { "userId": user_id } });
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test")).unwrap()
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, ProviderError> {
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(username) {
            Some((stored, user_id)) if stored == password => Ok(AuthTokens {
                access_token: id_token(user_id),
                refresh_token: Some(format!("refresh-{}", user_id)),
                id_token: Some(id_token(user_id)),
                expires_in: 86400,
                token_type: "Bearer".to_string(),
            }),
            _ => Err(ProviderError::Rejected {
                status: 403,
                body: "Wrong email or password".to_string(),
            }),
        }
    }

    async fn create_account(&self, account: &NewAccount) -> Result<String, ProviderError> {
        let user_id = account.info.user_id.clone().unwrap_or_default();
        self.accounts
            .lock()
            .unwrap()
            .insert(account.email.clone(), (account.password.clone(), user_id.clone()));
        Ok(format!("auth0|{}", user_id))
    }

    async fn update_account(
        &self,
        _provider_id: &str,
        _update: &AccountUpdate,
    ) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn delete_account(&self, _provider_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), ProviderError> {
        self.revoked.lock().unwrap().push(refresh_token.to_string());
        Ok(())
    }
}

struct TestApp {
    router: Router,
    provider: Arc<FakeProvider>,
}

impl TestApp {
    fn new() -> Self {
        let provider = Arc::new(FakeProvider::default());
        let services = Services::new(Repository::in_memory(), provider.clone(), NAMESPACE);
        let mut config = AppConfig::default();
        config.storage.backend = StorageBackend::Memory;
        let state = AppState {
            config: Arc::new(config),
            services: Arc::new(services),
        };

        Self {
            router: api::create_router(state),
            provider,
        }
    }

    async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let mut request = Request::builder()
            .method(method)
            .uri(format!("/api/v1{}", uri))
            .header("content-type", "application/json");
        if let Some(token) = token {
            request = request.header(AUTHORIZATION, format!("Bearer {}", token));
        }
        let body = body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty);

        let response = self
            .router
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn create_user(&self, email: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/users",
                Some(json!({
                    "email": email,
                    "password": "hunter22",
                    "first_name": "Ada",
                    "last_name": "Lovelace"
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }

    async fn create_book(&self, title: &str) -> Value {
        let (status, body) = self
            .send(
                Method::POST,
                "/books",
                Some(json!({
                    "title": title,
                    "author": "Frank Herbert",
                    "description": "Desert planet"
                })),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        body
    }
}

#[tokio::test]
async fn test_health_check() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert!(body.get("storage").is_none());

    let (status, body) = app.send(Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_create_user_hides_refresh_token() {
    let app = TestApp::new();
    let user = app.create_user("ada@example.org").await;

    assert_eq!(user["email"], "ada@example.org");
    assert!(user["provider_id"].as_str().unwrap().starts_with("auth0|"));
    assert!(user.get("refresh_token").is_none());

    let (status, body) = app
        .send(
            Method::POST,
            "/users",
            Some(json!({
                "email": "ada@example.org",
                "password": "other",
                "first_name": "Augusta",
                "last_name": "King"
            })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn test_create_user_rejects_bad_email() {
    let app = TestApp::new();
    let (status, body) = app
        .send(
            Method::POST,
            "/users",
            Some(json!({ "email": "nope", "password": "pw", "first_name": "A", "last_name": "L" })),
            None,
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_login_me_logout() {
    let app = TestApp::new();
    let user = app.create_user("ada@example.org").await;

    let (status, tokens) = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "ada@example.org", "password": "hunter22" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let access = tokens["access_token"].as_str().unwrap().to_string();

    let (status, me) = app.send(Method::GET, "/auth/me", None, Some(&access)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], user["id"]);

    let (status, _) = app.send(Method::POST, "/auth/logout", None, Some(&access)).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(
        *app.provider.revoked.lock().unwrap(),
        vec![format!("refresh-{}", user["id"].as_str().unwrap())]
    );
}

#[tokio::test]
async fn test_login_wrong_password_is_bad_request() {
    let app = TestApp::new();
    app.create_user("ada@example.org").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/auth/login",
            Some(json!({ "username": "ada@example.org", "password": "wrong" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_me_requires_bearer_token() {
    let app = TestApp::new();

    let (status, body) = app.send(Method::GET, "/auth/me", None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"], "Forbidden");

    let (status, _) = app.send(Method::GET, "/auth/me", None, Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_update_user_keeps_blank_fields() {
    let app = TestApp::new();
    let user = app.create_user("ada@example.org").await;
    let id = user["id"].as_str().unwrap();

    let (status, updated) = app
        .send(
            Method::PATCH,
            &format!("/users/{}", id),
            Some(json!({ "first_name": "Augusta", "last_name": "" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["first_name"], "Augusta");
    assert_eq!(updated["last_name"], "Lovelace");

    let (status, _) = app.send(Method::DELETE, &format!("/users/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app.send(Method::GET, &format!("/users/{}", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_duplicate_book_conflicts() {
    let app = TestApp::new();
    app.create_book("Dune").await;

    let (status, _) = app
        .send(
            Method::POST,
            "/books",
            Some(json!({ "title": "Dune", "author": "Frank Herbert", "description": "Again" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_update_book_to_existing_author_title_conflicts() {
    let app = TestApp::new();
    app.create_book("Dune").await;
    let other = app.create_book("Children of Dune").await;

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/books/{}", other["id"].as_str().unwrap()),
            Some(json!({ "title": "Dune" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Conflict");
}

#[tokio::test]
async fn test_update_user_rejects_malformed_email() {
    let app = TestApp::new();
    let user = app.create_user("ada@example.org").await;

    let (status, body) = app
        .send(
            Method::PATCH,
            &format!("/users/{}", user["id"].as_str().unwrap()),
            Some(json!({ "email": "not-an-email" })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_reservation_lifecycle() {
    let app = TestApp::new();
    let user = app.create_user("ada@example.org").await;
    let book = app.create_book("Dune").await;
    let user_id = user["id"].as_str().unwrap();
    let book_id = book["id"].as_str().unwrap();

    let (status, reservation) = app
        .send(
            Method::POST,
            "/reservations",
            Some(json!({ "book_id": book_id, "user_id": user_id })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let reservation_id = reservation["id"].as_str().unwrap();
    assert!(reservation["returned_date"].is_null());

    let (_, available) = app.send(Method::GET, "/books/available", None, None).await;
    assert_eq!(available, json!([]));

    // The book is taken
    let (status, _) = app
        .send(
            Method::POST,
            "/reservations",
            Some(json!({ "book_id": book_id, "user_id": user_id })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, active) = app
        .send(Method::GET, &format!("/users/{}/reservations/active", user_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(active[0]["title"], "Dune");
    assert_eq!(active[0]["is_active"], true);

    let (status, ended) = app
        .send(Method::PATCH, &format!("/reservations/{}/return", reservation_id), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert!(ended["returned_date"].is_string());

    let (status, _) = app
        .send(Method::PATCH, &format!("/reservations/{}/return", reservation_id), None, None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, available) = app.send(Method::GET, "/books/available", None, None).await;
    assert_eq!(available[0]["id"], book_id);

    let (status, latest) = app
        .send(
            Method::GET,
            &format!("/users/{}/reservations/books/{}", user_id, book_id),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["is_active"], false);

    let (status, _) = app
        .send(Method::DELETE, &format!("/reservations/{}", reservation_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (status, _) = app
        .send(Method::GET, &format!("/reservations/{}", reservation_id), None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_reservations_of_unknown_user() {
    let app = TestApp::new();

    let (status, body) = app
        .send(Method::GET, "/users/ghost/reservations", None, None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_delete_book_removes_reservations() {
    let app = TestApp::new();
    let user = app.create_user("ada@example.org").await;
    let book = app.create_book("Dune").await;
    let book_id = book["id"].as_str().unwrap();

    let (_, reservation) = app
        .send(
            Method::POST,
            "/reservations",
            Some(json!({ "book_id": book_id, "user_id": user["id"] })),
            None,
        )
        .await;

    let (status, _) = app.send(Method::DELETE, &format!("/books/{}", book_id), None, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app
        .send(
            Method::GET,
            &format!("/reservations/{}", reservation["id"].as_str().unwrap()),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, all) = app.send(Method::GET, "/reservations", None, None).await;
    assert_eq!(all, json!([]));
}
