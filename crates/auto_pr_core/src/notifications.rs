//! Chat notifications for pull request outcomes and workflow errors.
//!
//! Messages go to a Discord and/or a Slack incoming webhook. A channel is active only
//! when its webhook URL is set. Delivery failures are logged and recorded in the
//! returned [`DeliveryResult`]s; they never fail the workflow.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use chrono::{DateTime, FixedOffset, Local};
use github_client::PullRequest;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::NotificationSettings;
use crate::errors::NotificationError;

#[cfg(test)]
#[path = "notifications_tests.rs"]
mod tests;

/// Timeout for a single webhook call.
pub const WEBHOOK_TIMEOUT: Duration = Duration::from_secs(10);

const SEPARATOR: &str = "━━━━━━━━━━━━━━━━━━━━━━";
const COLOR_MERGED: u32 = 0x2ecc71;
const COLOR_OPEN: u32 = 0x3498db;

/// Outcome being reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationStatus {
    Success,
    Merged,
    Failed,
    Created,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Success => "success",
            NotificationStatus::Merged => "merged",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Created => "created",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            NotificationStatus::Success => "✅",
            NotificationStatus::Merged => "🚀",
            NotificationStatus::Failed => "❌",
            NotificationStatus::Created => "🆕",
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationChannel {
    Discord,
    Slack,
}

impl fmt::Display for NotificationChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationChannel::Discord => f.write_str("discord"),
            NotificationChannel::Slack => f.write_str("slack"),
        }
    }
}

/// A webhook to deliver to. The URL is a secret and is never logged.
#[derive(Clone)]
pub struct NotificationEndpoint {
    pub channel: NotificationChannel,
    pub url: String,
}

impl fmt::Debug for NotificationEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationEndpoint")
            .field("channel", &self.channel)
            .field("url", &"[REDACTED]")
            .finish()
    }
}

/// Result of delivering a message to one endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryResult {
    pub channel: NotificationChannel,
    pub success: bool,
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    pub error: Option<NotificationError>,
}

/// Formats and posts notifications to the configured webhooks.
#[derive(Debug, Clone)]
pub struct NotificationDispatcher {
    http: reqwest::Client,
    endpoints: Vec<NotificationEndpoint>,
    repository: String,
    settings: NotificationSettings,
}

impl NotificationDispatcher {
    /// Creates a dispatcher for `repository` (`owner/name`).
    ///
    /// Channels without a webhook URL are skipped. When `settings.enabled` is false no
    /// channel is used.
    pub fn new(
        repository: impl Into<String>,
        discord_webhook: Option<String>,
        slack_webhook: Option<String>,
        settings: NotificationSettings,
    ) -> Self {
        let mut endpoints = Vec::new();
        if settings.enabled {
            if let Some(url) = discord_webhook {
                endpoints.push(NotificationEndpoint {
                    channel: NotificationChannel::Discord,
                    url,
                });
            }
            if let Some(url) = slack_webhook {
                endpoints.push(NotificationEndpoint {
                    channel: NotificationChannel::Slack,
                    url,
                });
            }
        }

        if endpoints.is_empty() {
            info!("No notifications configured");
        } else {
            let names: Vec<String> = endpoints.iter().map(|e| e.channel.to_string()).collect();
            info!(channels = ?names, "Notifications enabled");
        }

        Self {
            http: reqwest::Client::new(),
            endpoints,
            repository: repository.into(),
            settings,
        }
    }

    pub fn channels(&self) -> Vec<NotificationChannel> {
        self.endpoints.iter().map(|e| e.channel).collect()
    }

    /// Sends a status message about `pr` to every channel.
    pub async fn notify(&self, pr: &PullRequest, status: NotificationStatus) -> Vec<DeliveryResult> {
        if self.endpoints.is_empty() {
            debug!("No notification channels configured, skipping");
            return Vec::new();
        }

        let now: DateTime<FixedOffset> = Local::now().into();
        let message = format_status_message(&self.repository, pr, status, &now);

        let mut results = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let payload = match endpoint.channel {
                NotificationChannel::Discord => discord_payload(&message, pr, &self.settings, &now),
                NotificationChannel::Slack => slack_payload(&message, pr),
            };
            results.push(self.deliver(endpoint, &payload).await);
        }
        results
    }

    /// Sends an error report to every channel.
    ///
    /// `kind` names the error category; `context` entries are listed in key order.
    pub async fn notify_error(
        &self,
        error: &str,
        kind: &str,
        context: &BTreeMap<String, String>,
    ) -> Vec<DeliveryResult> {
        if self.endpoints.is_empty() {
            return Vec::new();
        }
        if !self.settings.notify_on_error {
            debug!("Error notifications disabled, skipping");
            return Vec::new();
        }

        let now: DateTime<FixedOffset> = Local::now().into();
        let message = format_error_message(error, kind, context, &now);

        let mut results = Vec::with_capacity(self.endpoints.len());
        for endpoint in &self.endpoints {
            let payload = match endpoint.channel {
                NotificationChannel::Discord => json!({ "content": message }),
                NotificationChannel::Slack => json!({ "text": message }),
            };
            results.push(self.deliver(endpoint, &payload).await);
        }
        results
    }

    async fn deliver(&self, endpoint: &NotificationEndpoint, payload: &Value) -> DeliveryResult {
        let started = Instant::now();
        let outcome = self
            .http
            .post(&endpoint.url)
            .timeout(WEBHOOK_TIMEOUT)
            .json(payload)
            .send()
            .await;
        let response_time_ms = started.elapsed().as_millis() as u64;

        let (status_code, error) = match outcome {
            Ok(response) if response.status().is_success() => {
                debug!(channel = %endpoint.channel, "Notification sent");
                (Some(response.status().as_u16()), None)
            }
            Ok(response) => {
                let status = response.status().as_u16();
                (
                    Some(status),
                    Some(NotificationError::Rejected {
                        channel: endpoint.channel.to_string(),
                        status,
                    }),
                )
            }
            Err(e) => (
                None,
                Some(NotificationError::Transport {
                    channel: endpoint.channel.to_string(),
                    // Strip the URL from the message, it embeds the webhook secret.
                    message: e.without_url().to_string(),
                }),
            ),
        };

        if let Some(error) = &error {
            warn!(channel = %endpoint.channel, "{}", error);
        }

        DeliveryResult {
            channel: endpoint.channel,
            success: error.is_none(),
            status_code,
            response_time_ms,
            error,
        }
    }
}

/// The plain text status message shared by all channels.
pub fn format_status_message(
    repository: &str,
    pr: &PullRequest,
    status: NotificationStatus,
    now: &DateTime<FixedOffset>,
) -> String {
    format!(
        "{emoji} **Auto PR Creator - {upper}**\n\
         {SEPARATOR}\n\
         **Repository:** `{repository}`\n\
         **PR #{number}:** {title}\n\
         **Status:** {status}\n\
         **Time:** {time}\n\
         {SEPARATOR}\n\
         🔗 {url}",
        emoji = status.emoji(),
        upper = status.as_str().to_uppercase(),
        number = pr.number,
        title = pr.title,
        time = now.format("%Y-%m-%d %H:%M:%S"),
        url = pr.html_url,
    )
}

/// The plain text error message shared by all channels.
pub fn format_error_message(
    error: &str,
    kind: &str,
    context: &BTreeMap<String, String>,
    now: &DateTime<FixedOffset>,
) -> String {
    let mut message = format!(
        "❌ **Auto PR Creator - ERROR**\n\
         {SEPARATOR}\n\
         **Error:** `{error}`\n\
         **Type:** `{kind}`\n\
         **Time:** {}\n",
        now.format("%Y-%m-%d %H:%M:%S")
    );
    if !context.is_empty() {
        let rendered: Vec<String> = context.iter().map(|(k, v)| format!("{k}={v}")).collect();
        message.push_str(&format!("**Context:** `{}`\n", rendered.join(", ")));
    }
    message.push_str(SEPARATOR);
    message
}

/// Discord payload: the message plus one embed describing the pull request.
pub fn discord_payload(
    message: &str,
    pr: &PullRequest,
    settings: &NotificationSettings,
    now: &DateTime<FixedOffset>,
) -> Value {
    json!({
        "content": message,
        "username": settings.username,
        "avatar_url": settings.avatar_url,
        "embeds": [{
            "title": pr.title,
            "url": pr.html_url,
            "color": if pr.merged { COLOR_MERGED } else { COLOR_OPEN },
            "fields": [
                {
                    "name": "Branch",
                    "value": format!("`{}` → `{}`", pr.head.ref_name, pr.base.ref_name),
                    "inline": true
                },
                {
                    "name": "Created by",
                    "value": pr.author_login().unwrap_or("auto"),
                    "inline": true
                }
            ],
            "timestamp": now.to_rfc3339()
        }]
    })
}

/// Slack payload: the message as a section block, a divider and a link.
pub fn slack_payload(message: &str, pr: &PullRequest) -> Value {
    json!({
        "text": message,
        "blocks": [
            {
                "type": "section",
                "text": { "type": "mrkdwn", "text": message }
            },
            { "type": "divider" },
            {
                "type": "context",
                "elements": [
                    { "type": "mrkdwn", "text": format!("<{}|View Pull Request>", pr.html_url) }
                ]
            }
        ]
    })
}
