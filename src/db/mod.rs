//! Persistent store: entity models, SQL repositories, and the store trait
//! consumed by the dispatcher.
//!
//! - `model`: typed rows and view models returned by repositories.
//! - `repo`: SQL-only functions that map rows into entities.
//!
//! The dispatcher never talks to the pool directly; it goes through
//! [`NotificationStore`] so tests can substitute a recording or failing
//! implementation.

pub mod model;
pub mod repo;

pub use model::{Contact, Notification, UserStatus};
pub use repo::*;

use crate::model::NotificationPayload;
use anyhow::Result;
use async_trait::async_trait;

/// Store and directory operations the delivery core consumes.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    /// Create the durable in-app record for one dispatch.
    async fn create_in_app(
        &self,
        user_id: i64,
        building_id: Option<i64>,
        payload: &NotificationPayload,
    ) -> Result<Notification>;

    /// Contact fields for one recipient; errors when the user is unknown.
    async fn get_contact(&self, user_id: i64) -> Result<Contact>;

    /// Approved occupants of a building, in directory order.
    async fn list_approved_occupants(&self, building_id: i64) -> Result<Vec<i64>>;

    async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<Option<Notification>>;

    async fn mark_all_read(&self, user_id: i64) -> Result<u64>;

    async fn unread_count(&self, user_id: i64) -> Result<i64>;

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>>;
}

/// Production store backed by the sqlite pool.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: Pool,
}

impl SqliteStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &Pool {
        &self.pool
    }
}

#[async_trait]
impl NotificationStore for SqliteStore {
    async fn create_in_app(
        &self,
        user_id: i64,
        building_id: Option<i64>,
        payload: &NotificationPayload,
    ) -> Result<Notification> {
        repo::create_notification(&self.pool, user_id, building_id, payload).await
    }

    async fn get_contact(&self, user_id: i64) -> Result<Contact> {
        repo::get_contact(&self.pool, user_id).await
    }

    async fn list_approved_occupants(&self, building_id: i64) -> Result<Vec<i64>> {
        repo::list_approved_occupants(&self.pool, building_id).await
    }

    async fn mark_read(&self, notification_id: i64, user_id: i64) -> Result<Option<Notification>> {
        repo::mark_read(&self.pool, notification_id, user_id).await
    }

    async fn mark_all_read(&self, user_id: i64) -> Result<u64> {
        repo::mark_all_read(&self.pool, user_id).await
    }

    async fn unread_count(&self, user_id: i64) -> Result<i64> {
        repo::unread_count(&self.pool, user_id).await
    }

    async fn list_for_user(&self, user_id: i64) -> Result<Vec<Notification>> {
        repo::list_for_user(&self.pool, user_id).await
    }
}
