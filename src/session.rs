//! Client-side session: login, token refresh and the refresh-and-retry
//! wrapper used by every protected request.

use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use std::{
    future::Future,
    sync::{Arc, Mutex, PoisonError},
};
use tracing::{debug, info, warn};

use crate::{
    auth,
    error::ApiError,
    models::{Credentials, LoginResponse, TokenPair, User},
    token_store::{TokenStore, ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY},
};

/// The backend's login and refresh endpoints.
#[async_trait]
pub trait AuthEndpoint: Send + Sync {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError>;
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError>;
}

pub struct HttpAuth {
    client: Client,
    base_url: String,
}

impl HttpAuth {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn post_json<T: DeserializeOwned>(&self, path: &str, body: &Value, fallback: &str) -> Result<T, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        let response = self.client.post(&url).json(body).send().await?;
        let status = response.status();
        debug!(url = %url, status = %status, "Auth endpoint responded");

        if !status.is_success() {
            let bytes = response.bytes().await.unwrap_or_default();
            let message = serde_json::from_slice::<Value>(&bytes)
                .ok()
                .and_then(|v| v.get("message").and_then(Value::as_str).map(str::to_string))
                .unwrap_or_else(|| fallback.to_string());
            return Err(ApiError::Auth(message));
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AuthEndpoint for HttpAuth {
    async fn login(&self, credentials: &Credentials) -> Result<LoginResponse, ApiError> {
        let body = json!({ "username": credentials.username, "password": credentials.password });
        self.post_json("login", &body, "Login failed").await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, ApiError> {
        self.post_json("refresh", &json!({ "refreshToken": refresh_token }), "Token refresh failed")
            .await
    }
}

pub struct Session {
    auth: Arc<dyn AuthEndpoint>,
    tokens: Arc<dyn TokenStore>,
    user: Mutex<Option<User>>,
    // Serializes refreshes so concurrent 401s don't spend a rotated refresh token twice
    refresh_lock: tokio::sync::Mutex<()>,
}

impl Session {
    pub fn new(auth: Arc<dyn AuthEndpoint>, tokens: Arc<dyn TokenStore>) -> Self {
        Self {
            auth,
            tokens,
            user: Mutex::new(None),
            refresh_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn access_token(&self) -> Option<String> {
        self.tokens.get(ACCESS_TOKEN_KEY)
    }

    pub fn is_authenticated(&self) -> bool {
        self.access_token().is_some()
    }

    /// The signed-in user, falling back to the stored token's claims after a restart.
    pub fn current_user(&self) -> Option<User> {
        let cached = self.user.lock().unwrap_or_else(PoisonError::into_inner).clone();
        cached.or_else(|| {
            let token = self.access_token()?;
            let claims = auth::peek_claims(&token).ok()?;
            claims.display_name().map(|name| User { username: name.to_string() })
        })
    }

    fn store_tokens(&self, access: &str, refresh: &str) {
        for (key, value) in [(ACCESS_TOKEN_KEY, access), (REFRESH_TOKEN_KEY, refresh)] {
            if let Err(e) = self.tokens.set(key, value) {
                warn!("Failed to persist {}: {:?}", key, e);
            }
        }
    }

    pub async fn login(&self, credentials: &Credentials) -> Result<User, ApiError> {
        let response = self.auth.login(credentials).await.map_err(|e| {
            warn!(username = %credentials.username, error = %e, "Login failed");
            e
        })?;

        self.store_tokens(&response.access_token, &response.refresh_token);
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = Some(response.user.clone());
        info!(username = %response.user.username, "Login successful");
        Ok(response.user)
    }

    pub async fn refresh(&self) -> Result<(), ApiError> {
        let refresh_token = self
            .tokens
            .get(REFRESH_TOKEN_KEY)
            .ok_or_else(|| ApiError::Auth("No refresh token available".into()))?;

        let pair = self.auth.refresh(&refresh_token).await?;
        self.store_tokens(&pair.access_token, &pair.refresh_token);
        debug!("Access token refreshed");
        Ok(())
    }

    pub fn logout(&self) {
        for key in [ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY] {
            if let Err(e) = self.tokens.remove(key) {
                warn!("Failed to remove {} from token store: {:?}", key, e);
            }
        }
        *self.user.lock().unwrap_or_else(PoisonError::into_inner) = None;
        info!("Session cleared");
    }

    // Refreshes unless another request already did so since `stale` was read.
    // A failed refresh ends the session.
    async fn refresh_or_expire(&self, stale: Option<&str>) -> Result<(), ApiError> {
        let _guard = self.refresh_lock.lock().await;

        let current = self.access_token();
        if current.is_some() && current.as_deref() != stale {
            debug!("Token already refreshed by a concurrent request");
            return Ok(());
        }

        match self.refresh().await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(error = %e, "Token refresh failed, ending session");
                self.logout();
                Err(ApiError::SessionExpired)
            }
        }
    }

    /// Runs a protected request with the current access token.
    ///
    /// An `Unauthorized` result triggers one refresh and one retry. A token
    /// whose `exp` has already passed is refreshed up front instead, and that
    /// counts as the single refresh.
    pub async fn protected<T, F, Fut>(&self, request: F) -> Result<T, ApiError>
    where
        F: Fn(Option<String>) -> Fut + Send + Sync,
        Fut: Future<Output = Result<T, ApiError>> + Send,
        T: Send,
    {
        let mut token = self.access_token();
        let mut refreshed = false;

        if token.as_deref().is_some_and(auth::token_expired) {
            debug!("Access token expired locally, refreshing before request");
            self.refresh_or_expire(token.as_deref()).await?;
            token = self.access_token();
            refreshed = true;
        }

        match request(token.clone()).await {
            Err(ApiError::Unauthorized) if !refreshed => {
                warn!("Protected request unauthorized, attempting token refresh");
                self.refresh_or_expire(token.as_deref()).await?;
                request(self.access_token()).await
            }
            other => other,
        }
    }
}
