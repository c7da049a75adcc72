//! SendGrid email notifications.

use std::fmt;

use serde::Serialize;

use crate::{ApiError, Notifier, build_http, read_success_body, validate_credential};

const SENDGRID_API_URL: &str = "https://api.sendgrid.com/v3/mail/send";
const SERVICE: &str = "SendGrid";

/// Sends plain-text emails through the SendGrid v3 API.
pub struct SendGridNotifier {
    http: reqwest::Client,
    api_key: String,
    from: String,
    to: String,
    url: String,
}

impl fmt::Debug for SendGridNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendGridNotifier")
            .field("api_key", &"[REDACTED]")
            .field("from", &self.from)
            .field("to", &self.to)
            .finish_non_exhaustive()
    }
}

impl SendGridNotifier {
    pub fn new(
        api_key: impl Into<String>,
        from: impl Into<String>,
        to: impl Into<String>,
    ) -> Result<Self, ApiError> {
        let api_key = api_key.into();
        let from = from.into();
        let to = to.into();
        validate_credential(SERVICE, &api_key, "API key cannot be empty")?;
        validate_credential(SERVICE, &from, "sender address cannot be empty")?;
        validate_credential(SERVICE, &to, "recipient address cannot be empty")?;

        Ok(Self {
            http: build_http()?,
            api_key,
            from,
            to,
            url: SENDGRID_API_URL.to_string(),
        })
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    async fn send(&self, subject: &str, body: &str) -> Result<(), ApiError> {
        let mail = build_mail(&self.from, &self.to, subject, body);
        let response = self
            .http
            .post(&self.url)
            .bearer_auth(&self.api_key)
            .json(&mail)
            .send()
            .await?;
        read_success_body(SERVICE, response).await?;
        Ok(())
    }
}

impl Notifier for SendGridNotifier {
    async fn notify(&self, subject: &str, body: &str) -> bool {
        match self.send(subject, body).await {
            Ok(()) => {
                tracing::info!(to = %self.to, "failure notification sent");
                true
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to send failure notification");
                false
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct Mail<'a> {
    personalizations: [Personalization<'a>; 1],
    from: Address<'a>,
    subject: &'a str,
    content: [Content<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    value: &'a str,
}

fn build_mail<'a>(from: &'a str, to: &'a str, subject: &'a str, body: &'a str) -> Mail<'a> {
    Mail {
        personalizations: [Personalization {
            to: [Address { email: to }],
        }],
        from: Address { email: from },
        subject,
        content: [Content {
            kind: "text/plain",
            value: body,
        }],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notifier_requires_all_fields() {
        assert!(SendGridNotifier::new("", "a@example.com", "b@example.com").is_err());
        assert!(SendGridNotifier::new("key", "", "b@example.com").is_err());
        assert!(SendGridNotifier::new("key", "a@example.com", " ").is_err());
        assert!(SendGridNotifier::new("key", "a@example.com", "b@example.com").is_ok());
    }

    #[test]
    fn notifier_debug_redacts_key() {
        let notifier = SendGridNotifier::new("SG.secret", "a@example.com", "b@example.com").unwrap();
        let debug = format!("{notifier:?}");
        assert!(!debug.contains("SG.secret"));
        assert!(debug.contains("b@example.com"));
    }

    #[test]
    fn mail_payload_matches_v3_shape() {
        let mail = build_mail("from@example.com", "to@example.com", "Sync failed", "details");
        let json = serde_json::to_value(&mail).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "personalizations": [{"to": [{"email": "to@example.com"}]}],
                "from": {"email": "from@example.com"},
                "subject": "Sync failed",
                "content": [{"type": "text/plain", "value": "details"}]
            })
        );
    }

    #[tokio::test]
    async fn notify_reports_unreachable_server_as_false() {
        let notifier = SendGridNotifier::new("key", "a@example.com", "b@example.com")
            .unwrap()
            .with_url("http://127.0.0.1:9/v3/mail/send");
        assert!(!notifier.notify("subject", "body").await);
    }
}
