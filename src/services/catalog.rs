// src/services/catalog.rs

//! Catalog client.
//!
//! Issues one GET per section against either the JSON section detail API or
//! the HTML course guide, and hands the raw body back for parsing.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use url::Url;

use crate::error::{AppError, QueryError, Result};
use crate::models::{CatalogConfig, CatalogVariant, SectionId};
use crate::services::TokenProvider;

/// Fetches the raw catalog response for one section.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    async fn fetch(&self, id: &SectionId) -> std::result::Result<String, QueryError>;
}

/// HTTP client for the configured catalog variant.
pub struct CatalogClient {
    client: Client,
    config: CatalogConfig,
    api_base: Url,
    tokens: Option<Arc<dyn TokenProvider>>,
}

impl CatalogClient {
    /// Create a catalog client.
    ///
    /// The API variant needs a token provider; the legacy page is public.
    pub fn new(
        client: Client,
        config: CatalogConfig,
        tokens: Option<Arc<dyn TokenProvider>>,
    ) -> Result<Self> {
        let api_base = Url::parse(&config.api_base_url)?;
        if api_base.cannot_be_a_base() {
            return Err(AppError::config(format!(
                "catalog.api_base_url '{}' cannot be a base URL",
                config.api_base_url
            )));
        }
        if config.variant == CatalogVariant::Api && tokens.is_none() {
            return Err(AppError::config("api catalog requires a token provider"));
        }

        Ok(Self {
            client,
            config,
            api_base,
            tokens,
        })
    }

    pub fn variant(&self) -> CatalogVariant {
        self.config.variant
    }

    /// URL queried for a section.
    pub fn section_url(&self, id: &SectionId) -> String {
        match self.config.variant {
            CatalogVariant::Api => self.api_url(id).to_string(),
            CatalogVariant::Legacy => self.legacy_url(id),
        }
    }

    /// `{base}/Terms/{term}/Schools/{school}/Subjects/{subject}/CatalogNbrs/{number}/Sections/{section}`
    fn api_url(&self, id: &SectionId) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().extend([
                "Terms",
                &id.term,
                "Schools",
                &id.school,
                "Subjects",
                &id.subject,
                "CatalogNbrs",
                &id.number,
                "Sections",
                &id.section,
            ]);
        }
        url
    }

    /// Course guide query: term marker, subject, number and section run
    /// together in `content`, followed by the fixed `termArray`.
    fn legacy_url(&self, id: &SectionId) -> String {
        format!(
            "{}{}{}{}{}&termArray={}",
            self.config.legacy_url_prefix,
            self.config.legacy_term,
            id.subject,
            id.number,
            id.section,
            self.config.legacy_term_array
        )
    }
}

#[async_trait]
impl CatalogFetcher for CatalogClient {
    async fn fetch(&self, id: &SectionId) -> std::result::Result<String, QueryError> {
        let url = self.section_url(id);
        log::debug!("Fetching {id} from {url}");

        let mut request = self.client.get(&url);
        if self.config.variant == CatalogVariant::Api {
            if let Some(tokens) = &self.tokens {
                let token = tokens
                    .bearer_token()
                    .await
                    .map_err(|e| QueryError::unreachable(format!("{id}: {e}")))?;
                request = request
                    .bearer_auth(token)
                    .header(reqwest::header::ACCEPT, "application/json");
            }
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            if body.trim().is_empty() {
                return Err(QueryError::unreachable(format!(
                    "{id}: catalog returned {status}"
                )));
            }
            log::debug!("Catalog returned {status} for {id}; parsing error body");
        }

        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::StaticToken;
    use mockito::Matcher;

    fn sample_id() -> SectionId {
        SectionId::new("2010", "ENG", "EECS", "281", "001")
    }

    fn api_client(base: &str) -> CatalogClient {
        let config = CatalogConfig {
            api_base_url: base.to_string(),
            ..CatalogConfig::default()
        };
        CatalogClient::new(Client::new(), config, Some(Arc::new(StaticToken::new("abc"))))
            .unwrap()
    }

    fn legacy_client(prefix: &str) -> CatalogClient {
        let config = CatalogConfig {
            variant: CatalogVariant::Legacy,
            legacy_url_prefix: prefix.to_string(),
            ..CatalogConfig::default()
        };
        CatalogClient::new(Client::new(), config, None).unwrap()
    }

    #[test]
    fn test_api_url() {
        let client = api_client("http://api-gw.it.umich.edu/Curriculum/SOC/v1/");
        assert_eq!(
            client.section_url(&sample_id()),
            "http://api-gw.it.umich.edu/Curriculum/SOC/v1/Terms/2010/Schools/ENG/Subjects/EECS/CatalogNbrs/281/Sections/001"
        );
    }

    #[test]
    fn test_legacy_url() {
        let client = legacy_client("http://www.lsa.umich.edu/cg/cg_sections.aspx?content=");
        assert_eq!(
            client.section_url(&sample_id()),
            "http://www.lsa.umich.edu/cg/cg_sections.aspx?content=1960EECS281001&termArray=f_13_1960"
        );
    }

    #[test]
    fn test_api_requires_token_provider() {
        let result = CatalogClient::new(Client::new(), CatalogConfig::default(), None);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_api_fetch_sends_bearer_token() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/Terms/2010/Schools/ENG/Subjects/EECS/CatalogNbrs/281/Sections/001",
            )
            .match_header("authorization", "Bearer abc")
            .match_header("accept", "application/json")
            .with_status(200)
            .with_body(r#"{"getSOCSectionDetailResponse":{"AvailableSeats":"4"}}"#)
            .create_async()
            .await;

        let body = api_client(&server.url()).fetch(&sample_id()).await.unwrap();
        assert!(body.contains("AvailableSeats"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_legacy_fetch_query_string() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/cg/cg_sections.aspx")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("content".into(), "1960EECS281001".into()),
                Matcher::UrlEncoded("termArray".into(), "f_13_1960".into()),
            ]))
            .with_status(200)
            .with_body("<html></html>")
            .create_async()
            .await;

        let client = legacy_client(&format!("{}/cg/cg_sections.aspx?content=", server.url()));
        assert_eq!(client.fetch(&sample_id()).await.unwrap(), "<html></html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_without_body_is_unreachable() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(503)
            .create_async()
            .await;

        let err = api_client(&server.url()).fetch(&sample_id()).await.unwrap_err();
        assert!(matches!(err, QueryError::Unreachable(_)));
    }

    #[tokio::test]
    async fn test_error_status_with_body_is_passed_through() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", Matcher::Any)
            .with_status(404)
            .with_body(r#"{"error":"no such section"}"#)
            .create_async()
            .await;

        let body = api_client(&server.url()).fetch(&sample_id()).await.unwrap();
        assert!(body.contains("no such section"));
    }

    #[tokio::test]
    async fn test_connection_refused_is_unreachable() {
        let client = api_client("http://127.0.0.1:1");
        let err = client.fetch(&sample_id()).await.unwrap_err();
        assert!(matches!(err, QueryError::Unreachable(_)));
    }
}
