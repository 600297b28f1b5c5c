//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Catalog service endpoints and HTTP behavior
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Access token source for the catalog API
    #[serde(default)]
    pub token: TokenConfig,

    /// Mail transport for status change notifications
    #[serde(default)]
    pub mail: MailConfig,

    /// Reconciliation pass settings
    #[serde(default)]
    pub reconcile: ReconcileConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Override values from environment variables when present.
    ///
    /// Secrets are usually left out of the TOML file and supplied here.
    pub fn apply_env_overrides(&mut self) {
        if let Some(secs) = env_parse("CATALOG_TIMEOUT_SECS") {
            self.catalog.timeout_secs = secs;
        }
        if let Ok(url) = std::env::var("CATALOG_BASE_URL") {
            self.catalog.api_base_url = url;
        }
        if let Some(n) = env_parse("MAX_CONCURRENT") {
            self.reconcile.max_concurrent = n;
        }
        if let Some(secs) = env_parse("FETCH_TIMEOUT_SECS") {
            self.reconcile.fetch_timeout_secs = secs;
        }
        if let Ok(key) = std::env::var("CATALOG_CONSUMER_KEY") {
            self.token.consumer_key = key;
        }
        if let Ok(secret) = std::env::var("CATALOG_CONSUMER_SECRET") {
            self.token.consumer_secret = secret;
        }
        if let Ok(token) = std::env::var("CATALOG_TOKEN") {
            self.token.static_token = Some(token);
        }
        if let Ok(endpoint) = std::env::var("MAIL_ENDPOINT") {
            self.mail.endpoint = endpoint;
        }
        if let Ok(api_key) = std::env::var("MAIL_API_KEY") {
            self.mail.api_key = Some(api_key);
        }
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.catalog.user_agent.trim().is_empty() {
            return Err(AppError::validation("catalog.user_agent is empty"));
        }
        if self.catalog.timeout_secs == 0 {
            return Err(AppError::validation("catalog.timeout_secs must be > 0"));
        }
        if self.reconcile.max_concurrent == 0 {
            return Err(AppError::validation("reconcile.max_concurrent must be > 0"));
        }
        if self.reconcile.fetch_timeout_secs == 0 {
            return Err(AppError::validation(
                "reconcile.fetch_timeout_secs must be > 0",
            ));
        }
        if self.reconcile.notify_timeout_secs == 0 {
            return Err(AppError::validation(
                "reconcile.notify_timeout_secs must be > 0",
            ));
        }

        match self.catalog.variant {
            CatalogVariant::Api => {
                url::Url::parse(&self.catalog.api_base_url)?;
                if !self.token.has_source() {
                    return Err(AppError::validation(
                        "api catalog needs token.static_token or token.consumer_key/consumer_secret",
                    ));
                }
            }
            CatalogVariant::Legacy => {
                if self.catalog.legacy_url_prefix.trim().is_empty() {
                    return Err(AppError::validation("catalog.legacy_url_prefix is empty"));
                }
            }
        }

        if self.mail.transport == MailTransport::Http {
            url::Url::parse(&self.mail.endpoint)?;
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

/// Which generation of the catalog service to query.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CatalogVariant {
    /// REST API returning JSON section details
    #[default]
    Api,
    /// Course guide HTML page
    Legacy,
}

/// Catalog service endpoints and HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub variant: CatalogVariant,

    /// Base URL of the REST API (without trailing `/Terms`)
    #[serde(default = "defaults::api_base_url")]
    pub api_base_url: String,

    /// Course guide page URL up to and including `content=`
    #[serde(default = "defaults::legacy_url_prefix")]
    pub legacy_url_prefix: String,

    /// Term marker prepended to the course in the course guide query
    #[serde(default = "defaults::legacy_term")]
    pub legacy_term: String,

    /// Value of the course guide `termArray` parameter
    #[serde(default = "defaults::legacy_term_array")]
    pub legacy_term_array: String,

    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Client-level request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            variant: CatalogVariant::default(),
            api_base_url: defaults::api_base_url(),
            legacy_url_prefix: defaults::legacy_url_prefix(),
            legacy_term: defaults::legacy_term(),
            legacy_term_array: defaults::legacy_term_array(),
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
        }
    }
}

/// Bearer token source for the catalog API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// OAuth token endpoint for the client-credentials grant
    #[serde(default = "defaults::token_url")]
    pub token_url: String,

    #[serde(default)]
    pub consumer_key: String,

    #[serde(default)]
    pub consumer_secret: String,

    /// Fixed token; when set, no refresh is ever attempted
    #[serde(default)]
    pub static_token: Option<String>,

    #[serde(default = "defaults::scope")]
    pub scope: String,

    /// Refresh this many seconds before the token expires
    #[serde(default = "defaults::refresh_margin")]
    pub refresh_margin_secs: u64,
}

impl TokenConfig {
    /// Whether a token can be obtained at all.
    pub fn has_source(&self) -> bool {
        self.static_token.as_deref().is_some_and(|t| !t.is_empty())
            || (!self.consumer_key.is_empty() && !self.consumer_secret.is_empty())
    }
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            token_url: defaults::token_url(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            static_token: None,
            scope: defaults::scope(),
            refresh_margin_secs: defaults::refresh_margin(),
        }
    }
}

/// How notifications leave the process.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MailTransport {
    /// POST each message to an HTTP mail relay
    Http,
    /// Only log messages (dry run)
    #[default]
    Log,
}

/// Mail transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    #[serde(default)]
    pub transport: MailTransport,

    /// Mail relay endpoint for the `http` transport
    #[serde(default)]
    pub endpoint: String,

    /// Bearer key for the mail relay
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "defaults::sender")]
    pub sender: String,

    #[serde(default = "defaults::subject")]
    pub subject: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            transport: MailTransport::default(),
            endpoint: String::new(),
            api_key: None,
            sender: defaults::sender(),
            subject: defaults::subject(),
        }
    }
}

/// Reconciliation pass settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Maximum sections processed concurrently
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound on one catalog fetch
    #[serde(default = "defaults::fetch_timeout")]
    pub fetch_timeout_secs: u64,

    /// Upper bound on one notification send
    #[serde(default = "defaults::notify_timeout")]
    pub notify_timeout_secs: u64,

    /// Rewrite the stored status even when it did not change
    #[serde(default = "defaults::persist_unchanged")]
    pub persist_unchanged: bool,
}

impl ReconcileConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn notify_timeout(&self) -> Duration {
        Duration::from_secs(self.notify_timeout_secs)
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            max_concurrent: defaults::max_concurrent(),
            fetch_timeout_secs: defaults::fetch_timeout(),
            notify_timeout_secs: defaults::notify_timeout(),
            persist_unchanged: defaults::persist_unchanged(),
        }
    }
}

mod defaults {
    // Catalog defaults
    pub fn api_base_url() -> String {
        "http://api-gw.it.umich.edu/Curriculum/SOC/v1".into()
    }
    pub fn legacy_url_prefix() -> String {
        "http://www.lsa.umich.edu/cg/cg_sections.aspx?content=".into()
    }
    pub fn legacy_term() -> String {
        "1960".into()
    }
    pub fn legacy_term_array() -> String {
        "f_13_1960".into()
    }
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; class-checker/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }

    // Token defaults
    pub fn token_url() -> String {
        "https://api-km.it.umich.edu/token".into()
    }
    pub fn scope() -> String {
        "PRODUCTION".into()
    }
    pub fn refresh_margin() -> u64 {
        60
    }

    // Mail defaults
    pub fn sender() -> String {
        "Umich Class Checker <umclasschecker@gmail.com>".into()
    }
    pub fn subject() -> String {
        "Umich Class Status Change".into()
    }

    // Reconcile defaults
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn fetch_timeout() -> u64 {
        20
    }
    pub fn notify_timeout() -> u64 {
        10
    }
    pub fn persist_unchanged() -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn api_config() -> Config {
        let mut config = Config::default();
        config.token.static_token = Some("abc".to_string());
        config
    }

    #[test]
    fn bundled_config_parses() {
        let config: Config = toml::from_str(include_str!("../../storage/config.toml")).unwrap();
        assert_eq!(config.catalog.variant, CatalogVariant::Api);
        assert_eq!(config.mail.transport, MailTransport::Log);
        assert_eq!(config.reconcile.max_concurrent, 5);
    }

    #[test]
    fn validate_api_config_with_token_ok() {
        assert!(api_config().validate().is_ok());
    }

    #[test]
    fn validate_rejects_api_without_token_source() {
        assert!(Config::default().validate().is_err());
    }

    #[test]
    fn validate_accepts_legacy_without_token() {
        let mut config = Config::default();
        config.catalog.variant = CatalogVariant::Legacy;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn validate_rejects_zero_concurrency() {
        let mut config = api_config();
        config.reconcile.max_concurrent = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_http_mail_without_endpoint() {
        let mut config = api_config();
        config.mail.transport = MailTransport::Http;
        assert!(config.validate().is_err());

        config.mail.endpoint = "https://mail.example.com/send".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parse_partial_toml_fills_defaults() {
        let config: Config = toml::from_str(
            r#"
            [catalog]
            variant = "legacy"

            [reconcile]
            max_concurrent = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.catalog.variant, CatalogVariant::Legacy);
        assert_eq!(config.catalog.legacy_term_array, "f_13_1960");
        assert_eq!(config.reconcile.max_concurrent, 2);
        assert_eq!(config.reconcile.fetch_timeout_secs, 20);
        assert_eq!(config.mail.subject, "Umich Class Status Change");
    }

    #[test]
    fn token_source_requires_key_and_secret() {
        let mut token = TokenConfig::default();
        assert!(!token.has_source());
        token.consumer_key = "key".to_string();
        assert!(!token.has_source());
        token.consumer_secret = "secret".to_string();
        assert!(token.has_source());
    }
}
