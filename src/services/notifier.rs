// src/services/notifier.rs

//! Status change notifications.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AppError, Result};
use crate::models::{MailConfig, MailTransport, SectionId};
use crate::utils::http::snippet;

/// Sends a status change message to a subscriber.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, subscriber: &str, id: &SectionId, open: bool) -> Result<()>;
}

/// A rendered notification email.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub sender: String,
    pub to: Vec<String>,
    pub subject: String,
    pub body: String,
}

impl Message {
    /// Render the status change email for a section.
    pub fn status_change(
        config: &MailConfig,
        subscriber: &str,
        id: &SectionId,
        open: bool,
    ) -> Self {
        let status_message = if open {
            " opened up! Register as soon as you can!"
        } else {
            " filled up! Crap. Sorry."
        };

        Self {
            sender: config.sender.clone(),
            to: vec![subscriber.to_string()],
            subject: config.subject.clone(),
            body: format!(
                "Hey!\n\nThe Umich Class Checker noticed that {} {}, section {}{}\n\nHave a good one!",
                id.subject, id.number, id.section, status_message
            ),
        }
    }
}

/// Delivers messages by POSTing them as JSON to a mail relay.
pub struct HttpMailNotifier {
    client: Client,
    config: MailConfig,
}

impl HttpMailNotifier {
    pub fn new(client: Client, config: MailConfig) -> Self {
        Self { client, config }
    }
}

#[async_trait]
impl Notifier for HttpMailNotifier {
    async fn notify(&self, subscriber: &str, id: &SectionId, open: bool) -> Result<()> {
        let message = Message::status_change(&self.config, subscriber, id, open);

        let mut request = self.client.post(&self.config.endpoint).json(&message);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AppError::notify(subscriber, e))?;
        let status = response.status();
        if !status.is_success() {
            let body = snippet(&response.text().await.unwrap_or_default(), 200);
            return Err(AppError::notify(
                subscriber,
                format!("mail relay returned {status}: {body}"),
            ));
        }

        log::info!("Mailed {subscriber} about {id}");
        Ok(())
    }
}

/// Logs messages instead of sending them.
pub struct LogNotifier {
    config: MailConfig,
}

impl LogNotifier {
    pub fn new(config: MailConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, subscriber: &str, id: &SectionId, open: bool) -> Result<()> {
        let message = Message::status_change(&self.config, subscriber, id, open);
        log::info!(
            "[dry-run] To: {} | Subject: {} | {}",
            subscriber,
            message.subject,
            message.body.replace('\n', " ")
        );
        Ok(())
    }
}

/// Build the notifier for the configured transport.
pub fn notifier_from_config(client: &Client, config: &MailConfig) -> Arc<dyn Notifier> {
    match config.transport {
        MailTransport::Http => Arc::new(HttpMailNotifier::new(client.clone(), config.clone())),
        MailTransport::Log => Arc::new(LogNotifier::new(config.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn sample_id() -> SectionId {
        SectionId::new("2010", "ENG", "EECS", "281", "001")
    }

    #[test]
    fn test_opened_message() {
        let message =
            Message::status_change(&MailConfig::default(), "s@umich.edu", &sample_id(), true);
        assert_eq!(message.subject, "Umich Class Status Change");
        assert_eq!(message.to, vec!["s@umich.edu".to_string()]);
        assert!(message.body.contains(
            "noticed that EECS 281, section 001 opened up! Register as soon as you can!"
        ));
    }

    #[test]
    fn test_filled_message() {
        let message =
            Message::status_change(&MailConfig::default(), "s@umich.edu", &sample_id(), false);
        assert!(
            message
                .body
                .contains("EECS 281, section 001 filled up! Crap. Sorry.")
        );
        assert!(!message.body.contains("opened up"));
    }

    #[tokio::test]
    async fn test_http_notifier_posts_message() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/send")
            .match_header("authorization", "Bearer relay-key")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "to": ["s@umich.edu"],
                "subject": "Umich Class Status Change",
            })))
            .with_status(202)
            .create_async()
            .await;

        let config = MailConfig {
            transport: MailTransport::Http,
            endpoint: format!("{}/send", server.url()),
            api_key: Some("relay-key".to_string()),
            ..MailConfig::default()
        };
        let notifier = HttpMailNotifier::new(Client::new(), config);
        notifier.notify("s@umich.edu", &sample_id(), true).await.unwrap();

        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_http_notifier_relay_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/send")
            .with_status(500)
            .with_body("relay down")
            .create_async()
            .await;

        let config = MailConfig {
            transport: MailTransport::Http,
            endpoint: format!("{}/send", server.url()),
            ..MailConfig::default()
        };
        let notifier = HttpMailNotifier::new(Client::new(), config);
        let err = notifier
            .notify("s@umich.edu", &sample_id(), false)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Notify { .. }));
    }

    #[tokio::test]
    async fn test_log_notifier_never_fails() {
        let notifier = LogNotifier::new(MailConfig::default());
        assert!(notifier.notify("s@umich.edu", &sample_id(), true).await.is_ok());
    }
}
