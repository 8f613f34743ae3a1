//! Outbound mail.
//!
//! Delivery is fire-and-forget: [`send_in_background`] spawns a task and
//! only logs the outcome.

use std::sync::Arc;

use async_trait::async_trait;
use reservo_core::Reservation;
use reservo_core::config::MailConfig;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use thiserror::Error;

/// Mail errors.
#[derive(Debug, Error)]
pub enum MailError {
    /// Transport failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The relay refused the message.
    #[error("Relay rejected message with status {status}: {body}")]
    Rejected {
        /// HTTP status returned by the relay.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// A plain-text message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    /// Sender.
    pub from: String,
    /// Recipient.
    pub to: String,
    /// Subject line.
    pub subject: String,
    /// Body text.
    pub text: String,
}

/// Something that can deliver mail.
#[async_trait]
pub trait Mailer: Send + Sync {
    /// Short transport name for logs.
    fn name(&self) -> &'static str;

    /// Deliver one message.
    async fn send(&self, message: &MailMessage) -> Result<(), MailError>;
}

/// Posts messages as JSON to an HTTP mail relay.
pub struct HttpMailer {
    client: reqwest::Client,
    endpoint: String,
    user: Option<String>,
    password: Option<SecretString>,
}

impl HttpMailer {
    /// Create a mailer for `endpoint`.
    #[must_use]
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            user: None,
            password: None,
        }
    }

    /// Use HTTP basic auth against the relay.
    #[must_use]
    pub fn with_credentials(mut self, user: String, password: Option<SecretString>) -> Self {
        self.user = Some(user);
        self.password = password;
        self
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        let mut request = self.client.post(&self.endpoint).json(message);
        if let Some(user) = &self.user {
            request = request.basic_auth(user, self.password.as_ref().map(|p| p.expose_secret()));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MailError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

impl std::fmt::Debug for HttpMailer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpMailer")
            .field("endpoint", &self.endpoint)
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Logs messages instead of sending them.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    fn name(&self) -> &'static str {
        "log"
    }

    async fn send(&self, message: &MailMessage) -> Result<(), MailError> {
        tracing::info!(to = %message.to, subject = %message.subject, "Mail relay not configured, message logged");
        Ok(())
    }
}

/// Pick a mailer for the configuration.
#[must_use]
pub fn mailer_from_config(config: &MailConfig) -> Arc<dyn Mailer> {
    match &config.endpoint {
        Some(endpoint) => {
            let mut mailer = HttpMailer::new(endpoint.clone());
            if let Some(user) = &config.user {
                mailer = mailer.with_credentials(user.clone(), config.password.clone());
            }
            Arc::new(mailer)
        }
        None => Arc::new(LogMailer),
    }
}

/// Confirmation message for a new reservation.
#[must_use]
pub fn reservation_confirmation(from: &str, reservation: &Reservation) -> MailMessage {
    let mut text = format!(
        "Hello {},\n\nYour reservation is confirmed.\n\n\
         Reference: {}\nDate: {}\nTime: {}\nGuests: {}\n",
        reservation.name, reservation.id, reservation.date, reservation.time, reservation.guests,
    );
    if let Some(venue) = &reservation.venue_name {
        text.push_str(&format!("Venue: {venue}\n"));
    }
    if let Some(location) = &reservation.venue_location {
        text.push_str(&format!("Location: {location}\n"));
    }
    if let Some(requests) = &reservation.special_requests {
        text.push_str(&format!("Special requests: {requests}\n"));
    }
    text.push_str("\nWe look forward to seeing you.\n");

    MailMessage {
        from: from.to_string(),
        to: reservation.email.clone(),
        subject: format!("Reservation confirmed for {}", reservation.date),
        text,
    }
}

/// Send on a spawned task; failures are logged.
pub fn send_in_background(mailer: Arc<dyn Mailer>, message: MailMessage) {
    tokio::spawn(async move {
        match mailer.send(&message).await {
            Ok(()) => tracing::debug!(to = %message.to, "Mail sent"),
            Err(e) => tracing::warn!(to = %message.to, error = %e, "Mail delivery failed"),
        }
    });
}
