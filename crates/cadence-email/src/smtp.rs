// SPDX-FileCopyrightText: 2026 Cadence Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SMTP relay transport.
//!
//! Each email goes out as `multipart/alternative` (plain text and HTML). The
//! `Message-ID` is derived from the idempotency key, so a resend of the same
//! `EmailSend` carries the same id and downstream de-duplication can see it.

use async_trait::async_trait;
use cadence_config::model::SmtpConfig;
use cadence_core::types::{AdapterType, HealthStatus, OutboundEmail};
use cadence_core::{CadenceError, PluginAdapter, TransportAdapter};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info, warn};

/// `<key@domain>` where the domain comes from the sender address.
pub fn message_id_for(idempotency_key: &str, from_address: &str) -> String {
    let domain = from_address
        .rsplit_once('@')
        .map(|(_, domain)| domain.trim_end_matches('>').trim())
        .filter(|domain| !domain.is_empty())
        .unwrap_or("cadence.local");
    format!("<{idempotency_key}@{domain}>")
}

pub struct SmtpTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    from_address: String,
    host: String,
}

impl SmtpTransport {
    pub fn new(config: &SmtpConfig) -> Result<Self, CadenceError> {
        let host = config
            .host
            .as_deref()
            .map(str::trim)
            .filter(|h| !h.is_empty())
            .ok_or_else(|| CadenceError::Config("smtp.host is required for SMTP delivery".into()))?;
        let from: Mailbox = config.from_address.parse().map_err(|e| {
            CadenceError::Config(format!("smtp.from_address `{}`: {e}", config.from_address))
        })?;

        let builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(host)
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::relay(host)
        }
        .map_err(|e| CadenceError::Config(format!("smtp relay `{host}`: {e}")))?;

        let mut builder = builder.port(config.port);
        if let (Some(user), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(user.clone(), password.clone()));
        }

        info!(host, port = config.port, starttls = config.starttls, "SMTP transport configured");
        Ok(Self {
            mailer: builder.build(),
            from,
            from_address: config.from_address.clone(),
            host: host.to_string(),
        })
    }

    /// Build the MIME message for one email.
    pub fn build_message(&self, email: &OutboundEmail) -> Result<Message, CadenceError> {
        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| CadenceError::Internal(format!("recipient `{}`: {e}", email.to)))?;
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(email.subject.clone())
            .message_id(Some(message_id_for(&email.idempotency_key, &self.from_address)))
            .multipart(MultiPart::alternative_plain_html(
                email.body_text.clone(),
                email.body_html.clone(),
            ))
            .map_err(|e| CadenceError::Internal(format!("building message: {e}")))
    }
}

#[async_trait]
impl PluginAdapter for SmtpTransport {
    fn name(&self) -> &str {
        "smtp"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Transport
    }

    async fn health_check(&self) -> Result<HealthStatus, CadenceError> {
        match self.mailer.test_connection().await {
            Ok(true) => Ok(HealthStatus::Healthy),
            Ok(false) => Ok(HealthStatus::Unhealthy(format!("{} refused the connection", self.host))),
            Err(e) => Ok(HealthStatus::Unhealthy(format!("{}: {e}", self.host))),
        }
    }
}

#[async_trait]
impl TransportAdapter for SmtpTransport {
    async fn send_email(&self, email: &OutboundEmail) -> Result<String, CadenceError> {
        let message = self.build_message(email)?;
        let message_id = message_id_for(&email.idempotency_key, &self.from_address);

        match self.mailer.send(message).await {
            Ok(response) => {
                debug!(to = %email.to, message_id = %message_id, code = %response.code(), "SMTP accepted email");
                Ok(message_id)
            }
            Err(e) => {
                warn!(to = %email.to, permanent = e.is_permanent(), error = %e, "SMTP send failed");
                Err(CadenceError::Transport {
                    message: format!("SMTP send to {}: {e}", email.to),
                    source: Some(Box::new(e)),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SmtpConfig {
        SmtpConfig {
            host: Some("smtp.acme.test".into()),
            from_address: "Cadence <outreach@cadence.test>".into(),
            ..SmtpConfig::default()
        }
    }

    #[test]
    fn message_id_uses_sender_domain() {
        assert_eq!(
            message_id_for("send-1", "Cadence <outreach@cadence.test>"),
            "<send-1@cadence.test>"
        );
        assert_eq!(message_id_for("send-1", "no-domain"), "<send-1@cadence.local>");
    }

    #[tokio::test]
    async fn message_is_multipart_with_stable_id() {
        let transport = SmtpTransport::new(&config()).unwrap();
        let email = OutboundEmail {
            to: "ada@acme.test".into(),
            subject: "Hello Acme".into(),
            body_html: "<p>Hello</p>".into(),
            body_text: "Hello".into(),
            idempotency_key: "send-1".into(),
        };
        let raw = String::from_utf8(transport.build_message(&email).unwrap().formatted()).unwrap();
        assert!(raw.contains("Message-ID: <send-1@cadence.test>"));
        assert!(raw.contains("Subject: Hello Acme"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("text/plain"));
        assert!(raw.contains("text/html"));
    }

    #[tokio::test]
    async fn bad_recipient_is_not_transient() {
        let transport = SmtpTransport::new(&config()).unwrap();
        let email = OutboundEmail {
            to: "not an address".into(),
            subject: "Hi".into(),
            body_html: String::new(),
            body_text: String::new(),
            idempotency_key: "send-2".into(),
        };
        let err = transport.build_message(&email).unwrap_err();
        assert!(!err.is_transient());
    }

    #[test]
    fn missing_host_is_a_config_error() {
        let err = SmtpTransport::new(&SmtpConfig::default()).err().unwrap();
        assert!(matches!(err, CadenceError::Config(_)));
    }
}
