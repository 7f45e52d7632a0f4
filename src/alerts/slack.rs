use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use reqwest::header::HeaderMap;
use serde::Serialize;
use tracing::{info, instrument};

use super::channels::{AlertChannel, ChannelError, post_json};
use super::{AlertEvent, Severity};

#[derive(Debug, Clone, Serialize)]
pub struct Message {
    pub text: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon_emoji: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Attachment {
    pub color: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<AttachmentField>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub footer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AttachmentField {
    pub title: String,
    pub value: String,
    pub short: bool,
}

pub struct MessageBuilder {
    text: String,
    username: String,
    icon_emoji: Option<String>,
    attachments: Vec<Attachment>,
}

impl MessageBuilder {
    pub fn new(text: impl ToString) -> Self {
        Self {
            text: text.to_string(),
            username: "MetricsCollector".to_string(),
            icon_emoji: None,
            attachments: Vec::new(),
        }
    }

    pub fn username(mut self, username: impl ToString) -> Self {
        self.username = username.to_string();
        self
    }

    pub fn icon_emoji(mut self, emoji: impl ToString) -> Self {
        self.icon_emoji = Some(emoji.to_string());
        self
    }

    pub fn add_attachment(mut self, attachment: Attachment) -> Self {
        self.attachments.push(attachment);
        self
    }

    pub fn build(self) -> Message {
        Message {
            text: self.text,
            username: self.username,
            icon_emoji: self.icon_emoji,
            attachments: self.attachments,
        }
    }
}

pub fn color_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "#FF0000", // Red
        Severity::Error => "#FF6600",    // Orange
        Severity::Warning => "#FFCC00",  // Yellow
        Severity::Info => "#0099CC",     // Blue
    }
}

pub fn emoji_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔥",
        Severity::Error => "❌",
        Severity::Warning => "⚠️",
        Severity::Info => "ℹ️",
    }
}

/// Render an alert as a chat message with a severity-coloured attachment
pub fn build_alert_message(event: &AlertEvent) -> Message {
    let emoji = emoji_for(event.severity);

    let text = format!(
        "{emoji} *{} ALERT*\n\
        *Host:* {}\n\
        *Message:* {}\n\
        *Time:* {}\n\
        *Value:* {}\n\
        *Threshold:* {}\n",
        event.severity.as_str().to_uppercase(),
        event.hostname,
        event.message,
        event.timestamp.to_rfc3339(),
        event.observed_value,
        event.threshold,
    );

    let mut fields = vec![
        AttachmentField {
            title: "Alert Type".to_string(),
            value: event.alert_type.to_string(),
            short: true,
        },
        AttachmentField {
            title: "Hostname".to_string(),
            value: event.hostname.clone(),
            short: true,
        },
    ];
    if let Some(mount) = &event.mountpoint {
        fields.push(AttachmentField {
            title: "Mount".to_string(),
            value: mount.clone(),
            short: true,
        });
    }

    MessageBuilder::new(text)
        .icon_emoji(emoji)
        .add_attachment(Attachment {
            color: color_for(event.severity).to_string(),
            fields,
            footer: Some("Metrics Collector".to_string()),
            ts: Some(Utc::now().timestamp()),
        })
        .build()
}

/// Posts alerts to a Slack incoming webhook
#[derive(Debug, Clone)]
pub struct SlackChannel {
    client: Client,
    webhook_url: String,
}

impl SlackChannel {
    pub fn new(webhook_url: impl ToString) -> Self {
        Self {
            client: Client::new(),
            webhook_url: webhook_url.to_string(),
        }
    }
}

#[async_trait]
impl AlertChannel for SlackChannel {
    fn name(&self) -> &str {
        "slack"
    }

    #[instrument(skip(self, event), fields(host = %event.hostname))]
    async fn send(&self, event: &AlertEvent) -> Result<(), ChannelError> {
        let message = build_alert_message(event);
        post_json(&self.client, &self.webhook_url, HeaderMap::new(), &message).await?;
        info!("slack alert sent for {}", event.hostname);
        Ok(())
    }
}
