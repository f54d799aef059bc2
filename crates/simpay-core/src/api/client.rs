//! HTTP client for the SimPay mock API.
//!
//! This module provides the `ApiClient` struct, which implements both remote
//! gateways over HTTP. Feed requests carry the bearer token read from the
//! `SecureTokenStore` at request time.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::{header, Client};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{SecureTokenStore, CREDENTIAL_KEY};
use crate::models::{Credential, FeedEntry, Identity};

use super::error::{AuthFailure, FeedFailure};
use super::gateway::{AuthGateway, AuthGrant, FeedGateway};
use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Default base URL of the mock backend
pub const DEFAULT_BASE_URL: &str = "http://localhost:3000/mock";

/// Default HTTP request timeout in milliseconds.
/// Bounds every gateway call, since the core itself never times out.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct CredentialsRequest<'a> {
    #[serde(rename = "cpfOrEmail")]
    cpf_or_email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct AuthResponse {
    #[serde(rename = "accessToken")]
    access_token: String,
    user: Identity,
}

#[derive(Debug, Deserialize)]
struct FeedResponse {
    #[serde(default)]
    items: Vec<FeedEntry>,
}

/// API client for the SimPay backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    tokens: Option<Arc<dyn SecureTokenStore>>,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            tokens: None,
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    /// Attach the store the bearer token is read from.
    pub fn with_token_store(mut self, tokens: Arc<dyn SecureTokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    #[cfg(test)]
    fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Current bearer token, if any. A store failure just means no header.
    async fn bearer_token(&self) -> Option<String> {
        let tokens = self.tokens.as_ref()?;
        match tokens.get(CREDENTIAL_KEY).await {
            Ok(token) => token.filter(|t| !t.is_empty()),
            Err(e) => {
                warn!(error = %e, "Failed to read token for request");
                None
            }
        }
    }

    async fn auth_headers(&self) -> header::HeaderMap {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.bearer_token().await {
            match header::HeaderValue::from_str(&format!("Bearer {}", token)) {
                Ok(value) => {
                    headers.insert(header::AUTHORIZATION, value);
                }
                Err(e) => warn!(error = %e, "Stored token is not a valid header value"),
            }
        }
        headers
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let response = self
                .client
                .get(&url)
                .headers(self.auth_headers().await)
                .send()
                .await?;

            if response.status().as_u16() == 429 {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited);
                }
                warn!(url = %url, retry = retries, backoff_ms = backoff.as_millis() as u64, "Rate limited, backing off");
                tokio::time::sleep(backoff).await;
                backoff *= 2; // Exponential backoff
                continue;
            }

            let response = Self::check_response(response).await?;
            return Ok(response.json().await?);
        }
    }

    async fn post_credentials(
        &self,
        path: &str,
        subject_id: &str,
        secret: &str,
    ) -> Result<AuthGrant, ApiError> {
        let response = self
            .client
            .post(self.url(path))
            .json(&CredentialsRequest {
                cpf_or_email: subject_id,
                password: secret,
            })
            .send()
            .await?;

        let response = Self::check_response(response).await?;
        let auth: AuthResponse = response.json().await?;

        if auth.access_token.is_empty() {
            return Err(ApiError::InvalidResponse("empty access token".to_string()));
        }
        debug!(subject = %auth.user.subject_id, "Auth response received");

        Ok(AuthGrant {
            credential: Credential::new(auth.access_token),
            identity: auth.user,
        })
    }
}

#[async_trait]
impl AuthGateway for ApiClient {
    async fn authenticate(&self, subject_id: &str, secret: &str) -> Result<AuthGrant, AuthFailure> {
        self.post_credentials("auth/login", subject_id, secret)
            .await
            .map_err(ApiError::classify_login)
    }

    async fn register(&self, subject_id: &str, secret: &str) -> Result<AuthGrant, AuthFailure> {
        self.post_credentials("auth/create-password", subject_id, secret)
            .await
            .map_err(ApiError::classify_registration)
    }
}

#[async_trait]
impl FeedGateway for ApiClient {
    async fn fetch_feed(&self) -> Result<Vec<FeedEntry>, FeedFailure> {
        let response: FeedResponse = self
            .get("home-feed")
            .await
            .map_err(ApiError::classify_feed)?;
        debug!(items = response.items.len(), "Feed response received");
        Ok(response.items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::auth::MemoryTokenStore;

    fn client_for(server: &MockServer) -> ApiClient {
        ApiClient::new(format!("{}/mock/", server.uri()), Duration::from_secs(2))
            .expect("build client")
            .with_initial_backoff(Duration::from_millis(1))
    }

    #[tokio::test]
    async fn test_login_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mock/auth/login"))
            .and(body_json(json!({"cpfOrEmail": "teste@simpay.com", "password": "Password123"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "accessToken": "fake-token-1-abc",
                "user": {"cpfOrEmail": "teste@simpay.com", "name": "Usuário Teste"}
            })))
            .mount(&server)
            .await;

        let grant = client_for(&server)
            .authenticate("teste@simpay.com", "Password123")
            .await
            .expect("login succeeds");
        assert_eq!(grant.credential.as_str(), "fake-token-1-abc");
        assert_eq!(grant.identity.display_name, "Usuário Teste");
    }

    #[tokio::test]
    async fn test_login_unauthorized_is_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mock/auth/login"))
            .respond_with(ResponseTemplate::new(401).set_body_string("Credenciais inválidas."))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .authenticate("teste@simpay.com", "wrong")
            .await
            .expect_err("login fails");
        assert_eq!(err, AuthFailure::InvalidCredentials);
    }

    #[tokio::test]
    async fn test_register_conflict_is_already_registered() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/mock/auth/create-password"))
            .respond_with(ResponseTemplate::new(409))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .register("teste@simpay.com", "Password123")
            .await
            .expect_err("register fails");
        assert_eq!(err, AuthFailure::AlreadyRegistered);
    }

    #[tokio::test]
    async fn test_feed_attaches_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mock/home-feed"))
            .and(header("authorization", "Bearer fake-token-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [
                    {"id": "2", "title": "B", "subtitle": "", "createdAt": "2025-01-11T12:00:00Z"},
                    {"id": "1", "title": "A", "subtitle": "", "createdAt": "2025-01-10T12:00:00Z"}
                ]
            })))
            .mount(&server)
            .await;

        let tokens = Arc::new(MemoryTokenStore::with_credential("fake-token-9"));
        let entries = client_for(&server)
            .with_token_store(tokens)
            .fetch_feed()
            .await
            .expect("feed loads");
        let ids: Vec<_> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, ["2", "1"]);
    }

    #[tokio::test]
    async fn test_feed_server_error_is_classified() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mock/home-feed"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let err = client_for(&server).fetch_feed().await.expect_err("feed fails");
        assert_eq!(err, FeedFailure::Server("boom".to_string()));
    }

    #[tokio::test]
    async fn test_feed_retries_rate_limit_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mock/home-feed"))
            .respond_with(ResponseTemplate::new(429))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mock/home-feed"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
            .mount(&server)
            .await;

        let entries = client_for(&server).fetch_feed().await.expect("feed loads");
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_failure() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind");
            listener.local_addr().expect("addr").port()
        };
        let client = ApiClient::new(format!("http://127.0.0.1:{}/mock", port), Duration::from_millis(500))
            .expect("build client");
        assert_eq!(client.fetch_feed().await, Err(FeedFailure::Network));
        assert_eq!(
            client.authenticate("teste@simpay.com", "Password123").await,
            Err(AuthFailure::Network)
        );
    }
}
