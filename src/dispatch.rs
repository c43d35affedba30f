//! Notification dispatcher and building broadcaster.
//!
//! One dispatch fans a payload out across the selected channels. The in-app
//! record is written unconditionally when selected and is never retried;
//! email and push are best-effort sends wrapped in the retry policy. A
//! channel failure lands in that channel's slot and never aborts its
//! siblings.
use crate::db::NotificationStore;
use crate::error::NotifyError;
use crate::model::{
    BroadcastResult, Channel, ChannelSelection, DeliveryOutcome, DispatchResult,
    NotificationPayload,
};
use crate::retry::RetryPolicy;
use crate::transport::{EmailTransport, PushTransport};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const DEFAULT_BROADCAST_CONCURRENCY: usize = 8;

pub struct Notifier {
    store: Arc<dyn NotificationStore>,
    email: Arc<dyn EmailTransport>,
    push: Arc<dyn PushTransport>,
    retry: RetryPolicy,
    broadcast_concurrency: usize,
}

impl Notifier {
    pub fn new(
        store: Arc<dyn NotificationStore>,
        email: Arc<dyn EmailTransport>,
        push: Arc<dyn PushTransport>,
    ) -> Self {
        Self {
            store,
            email,
            push,
            retry: RetryPolicy::default(),
            broadcast_concurrency: DEFAULT_BROADCAST_CONCURRENCY,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_broadcast_concurrency(mut self, limit: usize) -> Self {
        self.broadcast_concurrency = limit.max(1);
        self
    }

    /// Deliver one payload to one recipient across the selected channels.
    ///
    /// Channel failures are aggregated into the returned result; only a
    /// rejected payload or a failed contact lookup produces an `Err`.
    #[instrument(skip_all)]
    pub async fn dispatch(
        &self,
        user_id: i64,
        building_id: Option<i64>,
        payload: &NotificationPayload,
        channels: ChannelSelection,
    ) -> Result<DispatchResult, NotifyError> {
        payload.validate()?;
        self.dispatch_to(user_id, building_id, payload, channels)
            .await
    }

    /// Dispatch without re-validating; broadcast validates once up front.
    async fn dispatch_to(
        &self,
        user_id: i64,
        building_id: Option<i64>,
        payload: &NotificationPayload,
        channels: ChannelSelection,
    ) -> Result<DispatchResult, NotifyError> {
        let mut result = DispatchResult::new(user_id);
        let wants_contact = channels.email || channels.push;

        // The in-app write and the contact lookup have no ordering
        // dependency on each other.
        let in_app_fut = async {
            if !channels.in_app {
                return None;
            }
            Some(self.send_in_app(user_id, building_id, payload).await)
        };
        let contact_fut = async {
            if !wants_contact {
                return Ok(None);
            }
            self.store.get_contact(user_id).await.map(Some)
        };
        let (in_app_slot, contact) = tokio::join!(in_app_fut, contact_fut);
        result.in_app = in_app_slot;

        let contact = contact.map_err(NotifyError::Directory)?.unwrap_or_default();

        // Email and push are independent of each other; a missing address or
        // token leaves the slot unpopulated rather than recording a failure.
        let email_fut = async {
            if !channels.email {
                return None;
            }
            let address = contact.email.as_deref()?;
            Some(self.send_email_with_retry(address, payload).await)
        };
        let push_fut = async {
            if !channels.push {
                return None;
            }
            let token = contact.push_token.as_deref()?;
            Some(self.send_push_with_retry(token, payload).await)
        };
        let (email_slot, push_slot) = tokio::join!(email_fut, push_fut);
        result.email = email_slot;
        result.push = push_slot;

        result.collect_errors();
        Ok(result)
    }

    /// Deliver one payload to every approved occupant of a building.
    ///
    /// One recipient's dispatch error becomes a degraded entry in the
    /// result list; it never aborts the remaining recipients.
    #[instrument(skip_all)]
    pub async fn broadcast(
        &self,
        building_id: i64,
        payload: &NotificationPayload,
        channels: ChannelSelection,
    ) -> Result<BroadcastResult, NotifyError> {
        payload.validate()?;

        let occupants = self
            .store
            .list_approved_occupants(building_id)
            .await
            .map_err(NotifyError::Directory)?;
        let total_users = occupants.len();
        info!(building_id, total_users, "broadcasting to building");

        // Bounded, order-preserving fan-out.
        let results = stream::iter(occupants.into_iter().map(|uid| async move {
            match self
                .dispatch_to(uid, Some(building_id), payload, channels)
                .await
            {
                Ok(res) => res,
                Err(err) => {
                    warn!(%err, user_id = uid, "recipient dispatch failed");
                    DispatchResult::degraded(uid, err.to_string())
                }
            }
        }))
        .buffered(self.broadcast_concurrency)
        .collect::<Vec<_>>()
        .await;

        Ok(BroadcastResult {
            total_users,
            results,
        })
    }

    async fn send_in_app(
        &self,
        user_id: i64,
        building_id: Option<i64>,
        payload: &NotificationPayload,
    ) -> DeliveryOutcome {
        match self.store.create_in_app(user_id, building_id, payload).await {
            Ok(record) => DeliveryOutcome::Delivered {
                channel: Channel::InApp,
                recipient: user_id.to_string(),
                message_id: record.id.to_string(),
                sent_at: record.created_at,
            },
            Err(err) => {
                warn!(%err, user_id, "in-app record write failed");
                DeliveryOutcome::failed(Channel::InApp, user_id.to_string(), err.to_string())
            }
        }
    }

    async fn send_email_with_retry(
        &self,
        address: &str,
        payload: &NotificationPayload,
    ) -> DeliveryOutcome {
        match self
            .retry
            .run(|| self.email.send_email(address, payload))
            .await
        {
            Ok(receipt) => DeliveryOutcome::delivered(Channel::Email, address, receipt),
            Err(err) => DeliveryOutcome::failed(Channel::Email, address, err.to_string()),
        }
    }

    async fn send_push_with_retry(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> DeliveryOutcome {
        match self
            .retry
            .run(|| self.push.send_push(token, payload))
            .await
        {
            Ok(receipt) => DeliveryOutcome::delivered(Channel::Push, token, receipt),
            Err(err) => DeliveryOutcome::failed(Channel::Push, token, err.to_string()),
        }
    }

    // Read-side pass-throughs consumed by the HTTP layer.

    pub async fn unread_count(&self, user_id: i64) -> Result<i64, NotifyError> {
        self.store
            .unread_count(user_id)
            .await
            .map_err(NotifyError::Storage)
    }

    pub async fn mark_as_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> Result<Option<crate::db::Notification>, NotifyError> {
        self.store
            .mark_read(notification_id, user_id)
            .await
            .map_err(NotifyError::Storage)
    }

    pub async fn mark_all_as_read(&self, user_id: i64) -> Result<u64, NotifyError> {
        self.store
            .mark_all_read(user_id)
            .await
            .map_err(NotifyError::Storage)
    }

    pub async fn list_for_user(
        &self,
        user_id: i64,
    ) -> Result<Vec<crate::db::Notification>, NotifyError> {
        self.store
            .list_for_user(user_id)
            .await
            .map_err(NotifyError::Storage)
    }
}
