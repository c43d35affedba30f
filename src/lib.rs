//! Multi-channel notification delivery for the flat-management backend.
//!
//! A dispatch writes a durable in-app record and fans the same payload out
//! to the email and push channels, each independently retried with
//! exponential backoff; a broadcast repeats that for every approved
//! occupant of a building without letting one recipient's failure abort
//! the rest.

pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod model;
pub mod retry;
pub mod transport;

pub use dispatch::Notifier;
pub use error::NotifyError;
pub use model::{
    BroadcastResult, Category, Channel, ChannelSelection, DeliveryOutcome, DispatchResult,
    NotificationPayload, Receipt,
};
pub use retry::RetryPolicy;
