// src/services/token.rs

//! Bearer token providers for the catalog API.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;

use crate::error::{AppError, Result};
use crate::models::TokenConfig;
use crate::utils::http::snippet;

/// Supplies bearer tokens to the catalog client.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return a token that is valid right now, refreshing it if stale.
    async fn bearer_token(&self) -> Result<String>;
}

/// Serves one fixed token.
#[derive(Debug, Clone)]
pub struct StaticToken(String);

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn bearer_token(&self) -> Result<String> {
        Ok(self.0.clone())
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    value: String,
    refresh_at: Option<Instant>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.refresh_at.is_none_or(|at| Instant::now() < at)
    }
}

/// OAuth client-credentials provider with an in-memory cache.
pub struct ClientCredentials {
    client: Client,
    config: TokenConfig,
    cached: Mutex<Option<CachedToken>>,
}

impl ClientCredentials {
    pub fn new(client: Client, config: TokenConfig) -> Self {
        Self {
            client,
            config,
            cached: Mutex::new(None),
        }
    }

    /// `Basic` credential built from the consumer key and secret.
    fn basic_auth(&self) -> String {
        let raw = format!("{}:{}", self.config.consumer_key, self.config.consumer_secret);
        format!("Basic {}", general_purpose::STANDARD.encode(raw))
    }

    async fn request_token(&self) -> Result<CachedToken> {
        log::debug!("Requesting catalog token from {}", self.config.token_url);

        let response = self
            .client
            .post(&self.config.token_url)
            .header(reqwest::header::AUTHORIZATION, self.basic_auth())
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(format!(
                "grant_type=client_credentials&scope={}",
                self.config.scope
            ))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = snippet(&response.text().await.unwrap_or_default(), 200);
            return Err(AppError::token(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        let token: TokenResponse = response.json().await?;
        let margin = Duration::from_secs(self.config.refresh_margin_secs);
        let refresh_at = token
            .expires_in
            .map(|secs| Instant::now() + Duration::from_secs(secs).saturating_sub(margin));

        log::info!(
            "Obtained catalog token (expires in {})",
            token
                .expires_in
                .map_or("unknown".to_string(), |s| format!("{s}s"))
        );

        Ok(CachedToken {
            value: token.access_token,
            refresh_at,
        })
    }
}

#[async_trait]
impl TokenProvider for ClientCredentials {
    async fn bearer_token(&self) -> Result<String> {
        // Held across the request so concurrent sections share one refresh.
        let mut cached = self.cached.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        let token = self.request_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }
}

/// Build the token provider described by the configuration.
pub fn provider_from_config(
    client: &Client,
    config: &TokenConfig,
) -> Result<Arc<dyn TokenProvider>> {
    if let Some(token) = config.static_token.as_deref().filter(|t| !t.is_empty()) {
        return Ok(Arc::new(StaticToken::new(token)));
    }
    if config.has_source() {
        return Ok(Arc::new(ClientCredentials::new(
            client.clone(),
            config.clone(),
        )));
    }
    Err(AppError::config(
        "no catalog token configured (token.static_token or consumer_key/consumer_secret)",
    ))
}
