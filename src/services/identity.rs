//! Identity bridge between the external provider and local users.
//!
//! `IdentityProvider` is the raw provider API (implemented by [`Auth0Client`]).
//! `IdentityService` wraps it with input validation, claim extraction and the
//! error normalization the rest of the server relies on.

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use chrono::Duration;
use jsonwebtoken::{DecodingKey, Validation};
use reqwest::{RequestBuilder, Response, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{
    config::IdentityConfig,
    error::{AppError, AppResult},
    models::{
        auth::{AccountUpdate, AuthTokens, CustomerInfo, LoginRequest, NewAccount, Role},
        patch::{is_blank, provided},
        user::{UpdateUser, User},
    },
};

use super::token_cache::{FetchedToken, InvalidTokenLifetime, ManagementTokenCache};

const LOGIN_SCOPE: &str = "openid profile offline_access";
const PASSWORD_REALM_GRANT: &str = "http://auth0.com/oauth/grant-type/password-realm";

/// Failures talking to the identity provider
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("request failed: {0}")]
    Transport(String),

    #[error("provider rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            ProviderError::Decode(e.to_string())
        } else {
            ProviderError::Transport(e.to_string())
        }
    }
}

impl From<InvalidTokenLifetime> for ProviderError {
    fn from(e: InvalidTokenLifetime) -> Self {
        ProviderError::Decode(e.to_string())
    }
}

/// Raw identity provider operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Exchange user credentials for a token bundle
    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, ProviderError>;

    /// Register an account, returning the provider's account id
    async fn create_account(&self, account: &NewAccount) -> Result<String, ProviderError>;

    async fn update_account(
        &self,
        provider_id: &str,
        update: &AccountUpdate,
    ) -> Result<(), ProviderError>;

    async fn delete_account(&self, provider_id: &str) -> Result<(), ProviderError>;

    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), ProviderError>;
}

/// Nested user id inside the namespaced claim
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CustomerInfoClaim {
    user_id: Option<String>,
}

#[derive(Clone)]
pub struct IdentityService {
    provider: Arc<dyn IdentityProvider>,
    claim_namespace: String,
}

impl IdentityService {
    pub fn new(provider: Arc<dyn IdentityProvider>, claim_namespace: impl Into<String>) -> Self {
        Self {
            provider,
            claim_namespace: claim_namespace.into(),
        }
    }

    /// Log a user in with the provider
    pub async fn login(&self, request: &LoginRequest) -> AppResult<AuthTokens> {
        let (Some(username), Some(password)) = (
            provided(request.username.as_deref()),
            provided(request.password.as_deref()),
        ) else {
            return Err(AppError::Validation("Username and password are required".to_string()));
        };

        self.provider.login(username, password).await.map_err(|e| {
            tracing::info!("Login rejected by identity provider: {}", e);
            AppError::Validation("Invalid username or password".to_string())
        })
    }

    /// Extract the local user id from an `Authorization: Bearer <token>` header value
    pub fn extract_user_id(&self, header: &str) -> AppResult<String> {
        let token = header
            .strip_prefix("Bearer ")
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::Forbidden("Invalid authorization header format".to_string()))?;

        self.user_id_from_token(token)
    }

    /// Extract the local user id from a raw token's namespaced claim.
    /// The signature is not checked; the token is only read.
    pub fn user_id_from_token(&self, token: &str) -> AppResult<String> {
        let claims = decode_claims(token)
            .ok_or_else(|| AppError::Forbidden("Malformed token".to_string()))?;

        let info = claims
            .get(&self.claim_namespace)
            .ok_or_else(|| AppError::Forbidden("Token is missing the customer claim".to_string()))?;

        serde_json::from_value::<CustomerInfoClaim>(info.clone())
            .ok()
            .and_then(|info| info.user_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| AppError::Forbidden("Token claim carries no user id".to_string()))
    }

    /// Register `user` with the provider, tagged with `role`
    pub async fn create_remote_account(
        &self,
        user: &User,
        password: &str,
        role: Role,
    ) -> AppResult<String> {
        if [&user.first_name, &user.last_name, &user.email, &user.id]
            .into_iter()
            .any(|field| is_blank(Some(field.as_str())))
        {
            return Err(AppError::Validation(
                "First name, last name, email and user id are required".to_string(),
            ));
        }

        let account = NewAccount {
            email: user.email.clone(),
            password: password.to_string(),
            info: CustomerInfo {
                first_name: Some(user.first_name.clone()),
                last_name: Some(user.last_name.clone()),
                user_id: Some(user.id.clone()),
                roles: vec![role],
            },
        };

        self.provider
            .create_account(&account)
            .await
            .map_err(|e| AppError::Provider(format!("Failed to create account: {}", e)))
    }

    /// Push the provided fields of `update` to the provider account
    pub async fn update_remote_account(&self, update: &UpdateUser, provider_id: &str) -> AppResult<()> {
        let changes = AccountUpdate {
            first_name: provided(update.first_name.as_deref()).map(str::to_string),
            last_name: provided(update.last_name.as_deref()).map(str::to_string),
            email: provided(update.email.as_deref()).map(str::to_string),
        };

        if changes.is_empty() {
            tracing::debug!("No provider-side changes for account {}", provider_id);
            return Ok(());
        }

        self.provider
            .update_account(provider_id, &changes)
            .await
            .map_err(|e| AppError::Provider(format!("Failed to update account: {}", e)))
    }

    pub async fn delete_remote_account(&self, provider_id: &str) -> AppResult<()> {
        self.provider
            .delete_account(provider_id)
            .await
            .map_err(|e| AppError::Provider(format!("Failed to delete account: {}", e)))
    }

    pub async fn revoke_refresh_token(&self, refresh_token: &str) -> AppResult<()> {
        self.provider
            .revoke_refresh_token(refresh_token)
            .await
            .map_err(|e| AppError::Provider(format!("Failed to revoke refresh token: {}", e)))
    }
}

/// Decode a JWT payload into a claim map without verifying it
fn decode_claims(token: &str) -> Option<HashMap<String, Value>> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    jsonwebtoken::decode::<HashMap<String, Value>>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}

// ---------------------------------------------------------------------------
// Auth0 implementation
// ---------------------------------------------------------------------------

/// Body for the `/oauth/token` endpoint, shared by all grants
#[derive(Serialize)]
struct TokenRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    audience: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    username: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    realm: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    scope: Option<&'a str>,
}

#[derive(Deserialize)]
struct ClientCredentialsResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Serialize)]
struct CreateAccountBody<'a> {
    email: &'a str,
    password: &'a str,
    connection: &'a str,
    app_metadata: CreateAccountMetadata<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateAccountMetadata<'a> {
    customer_info: &'a CustomerInfo,
}

#[derive(Deserialize)]
struct CreatedAccount {
    user_id: String,
}

#[derive(Serialize)]
struct UpdateAccountBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    email: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    app_metadata: Option<NameMetadata<'a>>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct NameMetadata<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    first_name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    last_name: Option<&'a str>,
}

#[derive(Serialize)]
struct RevokeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    token: &'a str,
}

/// Auth0 authentication and management API client
pub struct Auth0Client {
    http: reqwest::Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    connection: String,
    tokens: ManagementTokenCache,
}

impl Auth0Client {
    pub fn new(config: &IdentityConfig) -> Self {
        let domain = config.domain.trim_end_matches('/');
        let base_url = if domain.starts_with("http://") || domain.starts_with("https://") {
            domain.to_string()
        } else {
            format!("https://{}", domain)
        };
        let grace_period = Duration::try_seconds(config.token_grace_seconds)
            .filter(|grace| *grace >= Duration::zero())
            .unwrap_or_else(|| {
                tracing::warn!(
                    "Ignoring token grace period of {} seconds, using 60",
                    config.token_grace_seconds
                );
                Duration::seconds(60)
            });

        Self {
            http: reqwest::Client::new(),
            base_url,
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            connection: config.connection.clone(),
            tokens: ManagementTokenCache::new(grace_period),
        }
    }

    fn url(&self, segments: &[&str]) -> Result<Url, ProviderError> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| ProviderError::Transport(format!("invalid provider URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::Transport("provider URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn management_audience(&self) -> String {
        format!("{}/api/v2/", self.base_url)
    }

    async fn management_token(&self) -> Result<String, ProviderError> {
        self.tokens
            .get_or_fetch(|| self.fetch_management_token())
            .await
    }

    /// Send a management API request with the cached token. A 401 drops the
    /// cached token and the request is retried once with a fresh one.
    async fn send_management<F>(&self, build: F) -> Result<Response, ProviderError>
    where
        F: Fn() -> Result<RequestBuilder, ProviderError>,
    {
        let token = self.management_token().await?;
        let response = build()?.bearer_auth(token).send().await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return ensure_success(response).await;
        }

        tracing::warn!("Management token rejected by provider, fetching a new one");
        self.tokens.invalidate().await;
        let token = self.management_token().await?;
        let response = build()?.bearer_auth(token).send().await?;
        ensure_success(response).await
    }

    /// Client-credentials grant for the management API
    async fn fetch_management_token(&self) -> Result<FetchedToken, ProviderError> {
        let audience = self.management_audience();
        let request = TokenRequest {
            grant_type: "client_credentials",
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: Some(&audience),
            username: None,
            password: None,
            realm: None,
            scope: None,
        };

        let response = self
            .http
            .post(self.url(&["oauth", "token"])?)
            .json(&request)
            .send()
            .await?;
        let token: ClientCredentialsResponse = ensure_success(response).await?.json().await?;

        Ok(FetchedToken {
            access_token: token.access_token,
            expires_in: token.expires_in,
        })
    }
}

async fn ensure_success(response: Response) -> Result<Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ProviderError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl IdentityProvider for Auth0Client {
    async fn login(&self, username: &str, password: &str) -> Result<AuthTokens, ProviderError> {
        let request = TokenRequest {
            grant_type: PASSWORD_REALM_GRANT,
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            audience: None,
            username: Some(username),
            password: Some(password),
            realm: Some(&self.connection),
            scope: Some(LOGIN_SCOPE),
        };

        let response = self
            .http
            .post(self.url(&["oauth", "token"])?)
            .json(&request)
            .send()
            .await?;
        Ok(ensure_success(response).await?.json().await?)
    }

    async fn create_account(&self, account: &NewAccount) -> Result<String, ProviderError> {
        let body = CreateAccountBody {
            email: &account.email,
            password: &account.password,
            connection: &self.connection,
            app_metadata: CreateAccountMetadata {
                customer_info: &account.info,
            },
        };

        let response = self
            .send_management(|| Ok(self.http.post(self.url(&["api", "v2", "users"])?).json(&body)))
            .await?;
        let created: CreatedAccount = response.json().await?;
        Ok(created.user_id)
    }

    async fn update_account(
        &self,
        provider_id: &str,
        update: &AccountUpdate,
    ) -> Result<(), ProviderError> {
        let names = (update.first_name.is_some() || update.last_name.is_some()).then(|| NameMetadata {
            first_name: update.first_name.as_deref(),
            last_name: update.last_name.as_deref(),
        });
        let body = UpdateAccountBody {
            email: update.email.as_deref(),
            app_metadata: names,
        };

        self.send_management(|| {
            Ok(self
                .http
                .patch(self.url(&["api", "v2", "users", provider_id])?)
                .json(&body))
        })
        .await?;
        Ok(())
    }

    async fn delete_account(&self, provider_id: &str) -> Result<(), ProviderError> {
        self.send_management(|| Ok(self.http.delete(self.url(&["api", "v2", "users", provider_id])?)))
            .await?;
        Ok(())
    }

    async fn revoke_refresh_token(&self, refresh_token: &str) -> Result<(), ProviderError> {
        let request = RevokeRequest {
            client_id: &self.client_id,
            client_secret: &self.client_secret,
            token: refresh_token,
        };

        let response = self
            .http
            .post(self.url(&["oauth", "revoke"])?)
            .json(&request)
            .send()
            .await?;
        ensure_success(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use serde_json::json;

    const NAMESPACE: &str = "http://customerInfo";

    fn token(claims: Value) -> String {
        jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(b"test")).unwrap()
    }

    fn service(provider: MockIdentityProvider) -> IdentityService {
        IdentityService::new(Arc::new(provider), NAMESPACE)
    }

    fn user() -> User {
        User {
            id: "u1".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            email: "ada@example.org".to_string(),
            provider_id: None,
            refresh_token: None,
        }
    }

    #[test]
    fn test_extract_user_id_requires_bearer_prefix() {
        let identity = service(MockIdentityProvider::new());
        let err = identity.extract_user_id("NotBearer xyz").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = identity.extract_user_id("Bearer ").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[test]
    fn test_extract_user_id_reads_namespaced_claim() {
        let identity = service(MockIdentityProvider::new());
        let jwt = token(json!({
            "sub": "auth0|1",
            NAMESPACE: { "firstName": "Ada", "userId": "u1", "roles": ["user", null] }
        }));

        let user_id = identity.extract_user_id(&format!("Bearer {}", jwt)).unwrap();
        assert_eq!(user_id, "u1");
    }

    #[test]
    fn test_extract_user_id_rejects_missing_claim() {
        let identity = service(MockIdentityProvider::new());

        let without_claim = token(json!({ "sub": "auth0|1" }));
        let err = identity.extract_user_id(&format!("Bearer {}", without_claim)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let without_user_id = token(json!({ NAMESPACE: { "firstName": "Ada" } }));
        let err = identity.extract_user_id(&format!("Bearer {}", without_user_id)).unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let err = identity.extract_user_id("Bearer not.a.jwt").unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));
    }

    #[tokio::test]
    async fn test_login_requires_credentials() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_login().never();
        let identity = service(provider);

        let request = LoginRequest {
            username: Some("ada".to_string()),
            password: Some(String::new()),
        };
        let err = identity.login(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_login_rejection_is_invalid_input() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_login().times(1).returning(|_, _| {
            Err(ProviderError::Rejected {
                status: 403,
                body: "invalid_grant".to_string(),
            })
        });
        let identity = service(provider);

        let request = LoginRequest {
            username: Some("ada".to_string()),
            password: Some("wrong".to_string()),
        };
        let err = identity.login(&request).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_remote_account_tags_role() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_create_account()
            .withf(|account| {
                account.email == "ada@example.org"
                    && account.info.user_id.as_deref() == Some("u1")
                    && account.info.roles == vec![Role::Admin]
            })
            .times(1)
            .returning(|_| Ok("auth0|42".to_string()));
        let identity = service(provider);

        let provider_id = identity
            .create_remote_account(&user(), "secret", Role::Admin)
            .await
            .unwrap();
        assert_eq!(provider_id, "auth0|42");
    }

    #[tokio::test]
    async fn test_create_remote_account_validates_fields() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_create_account().never();
        let identity = service(provider);

        let mut incomplete = user();
        incomplete.last_name = String::new();
        let err = identity
            .create_remote_account(&incomplete, "secret", Role::User)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn test_create_remote_account_failure_is_internal() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_create_account()
            .returning(|_| Err(ProviderError::Transport("connection refused".to_string())));
        let identity = service(provider);

        let err = identity
            .create_remote_account(&user(), "secret", Role::User)
            .await
            .unwrap_err();
        assert_eq!(err.status(), axum::http::StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn test_update_remote_account_sends_only_provided_fields() {
        let mut provider = MockIdentityProvider::new();
        provider
            .expect_update_account()
            .withf(|id, update| {
                id == "auth0|42"
                    && *update
                        == AccountUpdate {
                            first_name: None,
                            last_name: Some("King".to_string()),
                            email: Some("ada@king.org".to_string()),
                        }
            })
            .times(1)
            .returning(|_, _| Ok(()));
        let identity = service(provider);

        let update = UpdateUser {
            first_name: Some(String::new()),
            last_name: Some("King".to_string()),
            email: Some("ada@king.org".to_string()),
        };
        identity.update_remote_account(&update, "auth0|42").await.unwrap();
    }

    #[tokio::test]
    async fn test_revoke_failure_is_internal() {
        let mut provider = MockIdentityProvider::new();
        provider.expect_revoke_refresh_token().returning(|_| {
            Err(ProviderError::Rejected {
                status: 500,
                body: String::new(),
            })
        });
        let identity = service(provider);

        let err = identity.revoke_refresh_token("rt").await.unwrap_err();
        assert!(matches!(err, AppError::Provider(_)));
    }

    mod auth0 {
        use super::*;
        use wiremock::{
            matchers::{method, path},
            Mock, MockServer, ResponseTemplate,
        };

        fn client(server: &MockServer) -> Auth0Client {
            Auth0Client::new(&IdentityConfig {
                domain: server.uri(),
                ..IdentityConfig::default()
            })
        }

        fn token_response(expires_in: i64) -> ResponseTemplate {
            ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "mgmt-token",
                "expires_in": expires_in,
                "token_type": "Bearer"
            }))
        }

        #[tokio::test]
        async fn test_rejected_management_token_is_refreshed_once() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .respond_with(token_response(86400))
                .expect(2)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .and(path("/api/v2/users/abc123"))
                .respond_with(ResponseTemplate::new(401))
                .up_to_n_times(1)
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .and(path("/api/v2/users/abc123"))
                .respond_with(ResponseTemplate::new(204))
                .expect(1)
                .mount(&server)
                .await;

            client(&server).delete_account("abc123").await.unwrap();
        }

        #[tokio::test]
        async fn test_second_rejection_is_returned() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .respond_with(token_response(86400))
                .expect(2)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .and(path("/api/v2/users/abc123"))
                .respond_with(ResponseTemplate::new(401))
                .expect(2)
                .mount(&server)
                .await;

            let err = client(&server).delete_account("abc123").await.unwrap_err();
            assert!(matches!(err, ProviderError::Rejected { status: 401, .. }));
        }

        #[tokio::test]
        async fn test_out_of_range_token_lifetime_is_decode_error() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .respond_with(token_response(i64::MAX))
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .respond_with(ResponseTemplate::new(204))
                .expect(0)
                .mount(&server)
                .await;

            let err = client(&server).delete_account("abc123").await.unwrap_err();
            assert!(matches!(err, ProviderError::Decode(_)));
        }

        #[tokio::test]
        async fn test_out_of_range_grace_period_falls_back() {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .and(path("/oauth/token"))
                .respond_with(token_response(3600))
                .expect(1)
                .mount(&server)
                .await;
            Mock::given(method("DELETE"))
                .respond_with(ResponseTemplate::new(204))
                .expect(2)
                .mount(&server)
                .await;

            let client = Auth0Client::new(&IdentityConfig {
                domain: server.uri(),
                token_grace_seconds: i64::MIN,
                ..IdentityConfig::default()
            });
            client.delete_account("a").await.unwrap();
            client.delete_account("b").await.unwrap();
        }
    }

    #[test]
    fn test_auth0_urls() {
        let client = Auth0Client::new(&IdentityConfig {
            domain: "tenant.auth0.com".to_string(),
            ..IdentityConfig::default()
        });

        assert_eq!(
            client.url(&["oauth", "token"]).unwrap().as_str(),
            "https://tenant.auth0.com/oauth/token"
        );
        assert_eq!(client.management_audience(), "https://tenant.auth0.com/api/v2/");
        assert!(client
            .url(&["api", "v2", "users", "auth0|42"])
            .unwrap()
            .path()
            .starts_with("/api/v2/users/auth0"));
    }
}
