//! Database entity and view models used by repositories.
//!
//! Keep these structs focused on the data returned by queries. Delivery
//! logic lives in `dispatch`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a user in the directory. Only approved users are
/// eligible broadcast recipients.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Pending,
    Approved,
    Rejected,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Pending => "pending",
            UserStatus::Approved => "approved",
            UserStatus::Rejected => "rejected",
        }
    }

    pub fn parse_status(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(UserStatus::Pending),
            "approved" => Some(UserStatus::Approved),
            "rejected" => Some(UserStatus::Rejected),
            _ => None,
        }
    }
}

/// A persisted in-app notification row. Created unread; only the read flag
/// ever changes after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub building_id: Option<i64>,
    pub category: String,
    pub title: String,
    pub message: String,
    pub urgent: bool,
    pub is_read: bool,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Contact slice used by the dispatcher for the email/push channels.
#[derive(Debug, Clone, Default)]
pub struct Contact {
    pub email: Option<String>,
    pub push_token: Option<String>,
}
