//! Domain types for notification dispatch and broadcast results.
use crate::error::NotifyError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What kind of event a notification announces.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Bill,
    Complaint,
    Announcement,
    System,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Bill => "bill",
            Category::Complaint => "complaint",
            Category::Announcement => "announcement",
            Category::System => "system",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bill" => Some(Category::Bill),
            "complaint" => Some(Category::Complaint),
            "announcement" => Some(Category::Announcement),
            "system" => Some(Category::System),
            _ => None,
        }
    }
}

/// Content of one notification. Immutable once built; every channel sees
/// the same payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub title: String,
    pub message: String,
    pub category: Category,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Map<String, Value>>,
}

impl NotificationPayload {
    pub fn new(title: impl Into<String>, message: impl Into<String>, category: Category) -> Self {
        Self {
            title: title.into(),
            message: message.into(),
            category,
            urgent: false,
            data: None,
        }
    }

    pub fn urgent(mut self) -> Self {
        self.urgent = true;
        self
    }

    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = Some(data);
        self
    }

    /// Rejects payloads with a blank title or message before any channel is
    /// attempted.
    pub fn validate(&self) -> Result<(), NotifyError> {
        if self.title.trim().is_empty() {
            return Err(NotifyError::Validation("title must be non-empty"));
        }
        if self.message.trim().is_empty() {
            return Err(NotifyError::Validation("message must be non-empty"));
        }
        Ok(())
    }
}

/// Which channels a dispatch should attempt. Callers pass this explicitly;
/// it is never inferred from the payload.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelSelection {
    #[serde(default = "default_true")]
    pub in_app: bool,
    #[serde(default)]
    pub email: bool,
    #[serde(default)]
    pub push: bool,
}

fn default_true() -> bool {
    true
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            in_app: true,
            email: false,
            push: false,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    InApp,
    Email,
    Push,
}

impl Channel {
    /// Label used as the prefix of aggregated error strings.
    pub fn label(&self) -> &'static str {
        match self {
            Channel::InApp => "In-app",
            Channel::Email => "Email",
            Channel::Push => "Push",
        }
    }
}

/// Transport confirmation for a successful email/push send.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub message_id: String,
    pub sent_at: DateTime<Utc>,
}

/// Result of one delivery attempt on one channel. Exactly one variant is
/// ever produced per attempted channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeliveryOutcome {
    Delivered {
        channel: Channel,
        recipient: String,
        message_id: String,
        sent_at: DateTime<Utc>,
    },
    Failed {
        channel: Channel,
        recipient: String,
        error: String,
    },
}

impl DeliveryOutcome {
    pub fn delivered(channel: Channel, recipient: impl Into<String>, receipt: Receipt) -> Self {
        DeliveryOutcome::Delivered {
            channel,
            recipient: recipient.into(),
            message_id: receipt.message_id,
            sent_at: receipt.sent_at,
        }
    }

    pub fn failed(channel: Channel, recipient: impl Into<String>, error: impl Into<String>) -> Self {
        DeliveryOutcome::Failed {
            channel,
            recipient: recipient.into(),
            error: error.into(),
        }
    }

    pub fn is_delivered(&self) -> bool {
        matches!(self, DeliveryOutcome::Delivered { .. })
    }
}

/// Per-recipient aggregate across the three channels. A `None` slot means
/// the channel was not attempted, which is distinct from a `Failed` outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchResult {
    pub user_id: i64,
    pub in_app: Option<DeliveryOutcome>,
    pub email: Option<DeliveryOutcome>,
    pub push: Option<DeliveryOutcome>,
    pub errors: Vec<String>,
}

impl DispatchResult {
    pub fn new(user_id: i64) -> Self {
        Self {
            user_id,
            in_app: None,
            email: None,
            push: None,
            errors: Vec::new(),
        }
    }

    /// Entry for a recipient whose dispatch failed outright (e.g. directory
    /// lookup error): no channel slots, a single error.
    pub fn degraded(user_id: i64, error: impl Into<String>) -> Self {
        Self {
            user_id,
            in_app: None,
            email: None,
            push: None,
            errors: vec![error.into()],
        }
    }

    /// Rebuild the error list by scanning slots in channel-attempt order:
    /// in-app, then email, then push.
    pub fn collect_errors(&mut self) {
        self.errors.clear();
        for slot in [&self.in_app, &self.email, &self.push] {
            if let Some(DeliveryOutcome::Failed { channel, error, .. }) = slot {
                self.errors
                    .push(format!("{} notification failed: {}", channel.label(), error));
            }
        }
    }
}

/// Outcome of a building-wide fan-out; one entry per approved occupant, in
/// directory order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResult {
    pub total_users: usize,
    pub results: Vec<DispatchResult>,
}
