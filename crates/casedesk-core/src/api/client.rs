//! HTTP gateway to the back-office authentication endpoints.
//!
//! This module provides the `AuthGateway` trait consumed by the session
//! store and `HttpAuthGateway`, its implementation over `reqwest`.

use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::{Client, Method};
use serde::{de::DeserializeOwned, de::IgnoredAny, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::models::{Identity, LoginResponse, RefreshResponse};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

const LOGIN_PATH: &str = "auth/login/";
const LOGOUT_PATH: &str = "auth/logout/";
const ME_PATH: &str = "auth/me/";
const REFRESH_PATH: &str = "auth/refresh/";

/// Connect timeout in seconds, applied on top of the overall request timeout.
const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// Remote authority for logging in and out and for token exchange.
///
/// Every operation is a single request/response round trip and propagates
/// the authority's failure unchanged. Implementations hold no session state;
/// tokens are passed in explicitly.
pub trait AuthGateway: Send + Sync {
    /// Exchange email and password for a credential pair and identity.
    fn login<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, ApiError>>;

    /// Invalidate the refresh token on the server.
    fn logout<'a>(
        &'a self,
        access_token: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<(), ApiError>>;

    /// Fetch the user and memberships behind an access token.
    fn fetch_current_identity<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Identity, ApiError>>;

    /// Exchange a refresh token for a new access token (and possibly a rotated refresh token).
    fn refresh_access_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, ApiError>>;
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    refresh: &'a str,
}

/// Gateway over HTTP.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpAuthGateway {
    client: Client,
    base_url: String,
    initial_backoff: Duration,
}

impl HttpAuthGateway {
    /// Create a gateway for the API rooted at `base_url` (e.g. `https://host/api`)
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS).min(timeout))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            initial_backoff: Duration::from_millis(INITIAL_BACKOFF_MS),
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_url, config.request_timeout())
    }

    /// Override the first back-off delay used when the server answers 429.
    pub fn with_rate_limit_backoff(mut self, initial: Duration) -> Self {
        self.initial_backoff = initial;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send<T: DeserializeOwned, B: Serialize>(
        &self,
        method: Method,
        path: &str,
        bearer: Option<&str>,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = self.url(path);
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            let mut request = self.client.request(method.clone(), &url);
            if let Some(token) = bearer {
                request = request.bearer_auth(token);
            }
            if let Some(body) = body {
                request = request.json(body);
            }

            debug!(method = %method, url = %url, "Sending request");
            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response.json().await.map_err(|e| {
                        ApiError::InvalidResponse(format!(
                            "Failed to parse JSON response from {}: {}",
                            url, e
                        ))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        url = %url,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }
}

impl AuthGateway for HttpAuthGateway {
    fn login<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, Result<LoginResponse, ApiError>> {
        Box::pin(async move {
            let body = LoginRequest { email, password };
            self.send(Method::POST, LOGIN_PATH, None, Some(&body)).await
        })
    }

    fn logout<'a>(
        &'a self,
        access_token: &'a str,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            let body = RefreshRequest {
                refresh: refresh_token,
            };
            let _: IgnoredAny = self
                .send(Method::POST, LOGOUT_PATH, Some(access_token), Some(&body))
                .await?;
            Ok(())
        })
    }

    fn fetch_current_identity<'a>(
        &'a self,
        access_token: &'a str,
    ) -> BoxFuture<'a, Result<Identity, ApiError>> {
        Box::pin(async move {
            self.send::<Identity, ()>(Method::GET, ME_PATH, Some(access_token), None)
                .await
        })
    }

    fn refresh_access_token<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, Result<RefreshResponse, ApiError>> {
        Box::pin(async move {
            let body = RefreshRequest {
                refresh: refresh_token,
            };
            self.send(Method::POST, REFRESH_PATH, None, Some(&body)).await
        })
    }
}
