use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use super::slack::SlackChannel;
use super::{AlertEvent, Severity};
use crate::config::{AlertsConfig, ConfigError, EmailConfig};

/// Timeout for a single notification request
pub const CHANNEL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug)]
pub enum ChannelError {
    /// Request could not be sent or timed out
    Http(reqwest::Error),

    /// Receiver answered with a non-success status
    Status { status: u16, body: String },

    /// Building or sending an email failed
    Email(String),

    /// Channel cannot work in this build or with this configuration
    Unavailable(String),
}

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChannelError::Http(err) => write!(f, "request failed: {}", err),
            ChannelError::Status { status, body } => {
                write!(f, "receiver returned status {}: {}", status, body)
            }
            ChannelError::Email(msg) => write!(f, "email delivery failed: {}", msg),
            ChannelError::Unavailable(msg) => write!(f, "channel unavailable: {}", msg),
        }
    }
}

impl std::error::Error for ChannelError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ChannelError::Http(err) => Some(err),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for ChannelError {
    fn from(err: reqwest::Error) -> Self {
        ChannelError::Http(err)
    }
}

/// A notification sink for alert events
#[async_trait]
pub trait AlertChannel: Send + Sync {
    fn name(&self) -> &str;

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError>;
}

/// POST `body` as JSON and treat any non-2xx answer as an error
pub(crate) async fn post_json<T: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    headers: HeaderMap,
    body: &T,
) -> Result<(), ChannelError> {
    let response = client
        .post(url)
        .headers(headers)
        .timeout(CHANNEL_TIMEOUT)
        .json(body)
        .send()
        .await?;

    let status = response.status();
    if status.is_success() {
        return Ok(());
    }

    let body = response.text().await.unwrap_or_default();
    Err(ChannelError::Status {
        status: status.as_u16(),
        body,
    })
}

// ============================================================================
// Log
// ============================================================================

/// Writes the alert to the tracing output at a level matching its severity
#[derive(Debug, Default)]
pub struct LogChannel;

impl LogChannel {
    pub fn format(event: &AlertEvent) -> String {
        format!(
            "ALERT [{}] {}: {} (Value: {}, Threshold: {})",
            event.severity.as_str().to_uppercase(),
            event.hostname,
            event.message,
            event.observed_value,
            event.threshold
        )
    }
}

#[async_trait]
impl AlertChannel for LogChannel {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let line = Self::format(event);
        match event.severity {
            Severity::Critical | Severity::Error => error!("{line}"),
            Severity::Warning => warn!("{line}"),
            Severity::Info => info!("{line}"),
        }
        Ok(())
    }
}

// ============================================================================
// Webhook
// ============================================================================

/// POSTs the event JSON to an arbitrary URL
#[derive(Debug, Clone)]
pub struct WebhookChannel {
    client: Client,
    url: String,
    headers: HeaderMap,
}

impl WebhookChannel {
    pub fn new(
        url: impl ToString,
        headers: &std::collections::HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut header_map = HeaderMap::new();
        for (name, value) in headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ConfigError::Invalid(format!("webhook header '{name}': {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ConfigError::Invalid(format!("webhook header '{name}': {e}")))?;
            header_map.insert(name, value);
        }

        Ok(Self {
            client: Client::new(),
            url: url.to_string(),
            headers: header_map,
        })
    }
}

#[async_trait]
impl AlertChannel for WebhookChannel {
    fn name(&self) -> &str {
        "webhook"
    }

    #[instrument(skip(self, event), fields(host = %event.hostname))]
    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        post_json(&self.client, &self.url, self.headers.clone(), event).await?;
        info!("webhook alert sent for {}", event.hostname);
        Ok(())
    }
}

// ============================================================================
// Email
// ============================================================================

pub struct EmailChannel {
    config: EmailConfig,
}

impl EmailChannel {
    pub fn new(config: EmailConfig) -> Self {
        Self { config }
    }

    pub fn subject(event: &AlertEvent) -> String {
        format!(
            "[{}] Alert from {}",
            event.severity.as_str().to_uppercase(),
            event.hostname
        )
    }

    pub fn body(event: &AlertEvent) -> String {
        format!(
            "Alert Details:\n\n\
            Hostname: {}\n\
            Alert Type: {}\n\
            Severity: {}\n\
            Message: {}\n\
            Timestamp: {}\n\n\
            Value: {}\n\
            Threshold: {}\n",
            event.hostname,
            event.alert_type,
            event.severity.as_str().to_uppercase(),
            event.message,
            event.timestamp.to_rfc3339(),
            event.observed_value,
            event.threshold
        )
    }
}

#[cfg(feature = "email")]
fn send_email(config: &EmailConfig, subject: &str, body: &str) -> Result<(), ChannelError> {
    use lettre::transport::smtp::authentication::Credentials;
    use lettre::{Message, SmtpTransport, Transport};

    let builder = if config.use_tls {
        SmtpTransport::starttls_relay(&config.smtp_server)
            .map_err(|e| ChannelError::Email(e.to_string()))?
    } else {
        SmtpTransport::builder_dangerous(&config.smtp_server)
    };
    let transport = builder
        .port(config.smtp_port)
        .credentials(Credentials::new(
            config.username.clone(),
            config.password.clone(),
        ))
        .timeout(Some(CHANNEL_TIMEOUT))
        .build();

    let from = config.from_address.as_ref().unwrap_or(&config.username);
    let mut message = Message::builder()
        .from(
            from.parse()
                .map_err(|e| ChannelError::Email(format!("invalid from address: {e}")))?,
        )
        .subject(subject);
    for to_address in &config.to_addresses {
        message = message.to(to_address
            .parse()
            .map_err(|e| ChannelError::Email(format!("invalid recipient '{to_address}': {e}")))?);
    }
    let message = message
        .body(body.to_string())
        .map_err(|e| ChannelError::Email(e.to_string()))?;

    transport
        .send(&message)
        .map_err(|e| ChannelError::Email(e.to_string()))?;
    Ok(())
}

#[cfg(not(feature = "email"))]
fn send_email(_config: &EmailConfig, _subject: &str, _body: &str) -> Result<(), ChannelError> {
    Err(ChannelError::Unavailable(
        "email alerts require the 'email' feature to be enabled".into(),
    ))
}

#[async_trait]
impl AlertChannel for EmailChannel {
    fn name(&self) -> &str {
        "email"
    }

    #[instrument(skip(self, event), fields(host = %event.hostname))]
    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let config = self.config.clone();
        let subject = Self::subject(event);
        let body = Self::body(event);

        // the SMTP transport is blocking
        tokio::task::spawn_blocking(move || send_email(&config, &subject, &body))
            .await
            .map_err(|e| ChannelError::Email(format!("email task failed: {e}")))??;

        info!("email alert sent for {}", event.hostname);
        Ok(())
    }
}

// ============================================================================
// Construction
// ============================================================================

/// Build the channel list named in the alerts configuration, in config order
pub fn build_channels(config: &AlertsConfig) -> Result<Vec<Box<dyn AlertChannel>>, ConfigError> {
    let mut channels: Vec<Box<dyn AlertChannel>> = Vec::with_capacity(config.channels.len());

    for name in &config.channels {
        let channel: Box<dyn AlertChannel> = match name.as_str() {
            "log" => Box::new(LogChannel),
            "slack" => {
                let url = config.slack_webhook_url.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(
                        "alerts.slack_webhook_url is required for the slack channel".into(),
                    )
                })?;
                Box::new(SlackChannel::new(url))
            }
            "webhook" => {
                let url = config.webhook_url.as_ref().ok_or_else(|| {
                    ConfigError::Invalid(
                        "alerts.webhook_url is required for the webhook channel".into(),
                    )
                })?;
                Box::new(WebhookChannel::new(url, &config.webhook_headers)?)
            }
            "email" => {
                let email = config.email.clone().ok_or_else(|| {
                    ConfigError::Invalid("alerts.email is required for the email channel".into())
                })?;
                if !cfg!(feature = "email") {
                    warn!("email channel configured but the 'email' feature is disabled");
                }
                Box::new(EmailChannel::new(email))
            }
            other => {
                return Err(ConfigError::Invalid(format!(
                    "unknown alert channel '{other}'"
                )));
            }
        };
        channels.push(channel);
    }

    Ok(channels)
}
