//! Building-wide broadcast scenarios: fan-out ordering, degraded
//! recipients, and the read-side operations.
use async_trait::async_trait;
use chrono::Utc;
use flat_notify::db::{self, Contact, Notification, NotificationStore, SqliteStore, UserStatus};
use flat_notify::dispatch::Notifier;
use flat_notify::error::NotifyError;
use flat_notify::model::{Category, ChannelSelection, NotificationPayload, Receipt};
use flat_notify::retry::RetryPolicy;
use flat_notify::transport::{EmailTransport, PushTransport};
use std::sync::Arc;
use std::time::Duration;

async fn setup_pool() -> sqlx::SqlitePool {
    let pool = sqlx::SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    pool
}

#[derive(Clone, Default)]
struct AlwaysOkEmail;

#[async_trait]
impl EmailTransport for AlwaysOkEmail {
    async fn send_email(
        &self,
        address: &str,
        _payload: &NotificationPayload,
    ) -> Result<Receipt, NotifyError> {
        Ok(Receipt {
            message_id: format!("email-{address}"),
            sent_at: Utc::now(),
        })
    }
}

#[derive(Clone, Default)]
struct AlwaysOkPush;

#[async_trait]
impl PushTransport for AlwaysOkPush {
    async fn send_push(
        &self,
        token: &str,
        _payload: &NotificationPayload,
    ) -> Result<Receipt, NotifyError> {
        Ok(Receipt {
            message_id: format!("push-{token}"),
            sent_at: Utc::now(),
        })
    }
}

/// Delegating store whose contact lookup fails for one user id.
struct FlakyDirectory {
    inner: SqliteStore,
    fail_for: i64,
}

#[async_trait]
impl NotificationStore for FlakyDirectory {
    async fn create_in_app(
        &self,
        user_id: i64,
        building_id: Option<i64>,
        payload: &NotificationPayload,
    ) -> anyhow::Result<Notification> {
        self.inner.create_in_app(user_id, building_id, payload).await
    }

    async fn get_contact(&self, user_id: i64) -> anyhow::Result<Contact> {
        if user_id == self.fail_for {
            return Err(anyhow::anyhow!("directory offline"));
        }
        self.inner.get_contact(user_id).await
    }

    async fn list_approved_occupants(&self, building_id: i64) -> anyhow::Result<Vec<i64>> {
        self.inner.list_approved_occupants(building_id).await
    }

    async fn mark_read(
        &self,
        notification_id: i64,
        user_id: i64,
    ) -> anyhow::Result<Option<Notification>> {
        self.inner.mark_read(notification_id, user_id).await
    }

    async fn mark_all_read(&self, user_id: i64) -> anyhow::Result<u64> {
        self.inner.mark_all_read(user_id).await
    }

    async fn unread_count(&self, user_id: i64) -> anyhow::Result<i64> {
        self.inner.unread_count(user_id).await
    }

    async fn list_for_user(&self, user_id: i64) -> anyhow::Result<Vec<Notification>> {
        self.inner.list_for_user(user_id).await
    }
}

fn announcement() -> NotificationPayload {
    NotificationPayload::new("Water outage", "Maintenance on Saturday", Category::Announcement)
}

fn plain_notifier(pool: &sqlx::SqlitePool) -> Notifier {
    Notifier::new(
        Arc::new(SqliteStore::new(pool.clone())),
        Arc::new(AlwaysOkEmail),
        Arc::new(AlwaysOkPush),
    )
    .with_retry_policy(RetryPolicy::new(2, vec![Duration::from_millis(1)]))
}

#[tokio::test]
async fn empty_building_broadcast_is_not_an_error() {
    let pool = setup_pool().await;
    let notifier = plain_notifier(&pool);

    let result = notifier
        .broadcast(42, &announcement(), ChannelSelection::default())
        .await
        .unwrap();

    assert_eq!(result.total_users, 0);
    assert!(result.results.is_empty());
}

#[tokio::test]
async fn broadcast_reaches_every_approved_occupant_in_order() {
    let pool = setup_pool().await;
    let u1 = db::create_user(&pool, "A", Some(1), None, None, UserStatus::Approved)
        .await
        .unwrap();
    let u2 = db::create_user(&pool, "B", Some(1), None, None, UserStatus::Approved)
        .await
        .unwrap();
    // Pending occupant and a neighbor building stay out of the fan-out.
    db::create_user(&pool, "C", Some(1), None, None, UserStatus::Pending)
        .await
        .unwrap();
    db::create_user(&pool, "D", Some(2), None, None, UserStatus::Approved)
        .await
        .unwrap();
    let u3 = db::create_user(&pool, "E", Some(1), None, None, UserStatus::Approved)
        .await
        .unwrap();

    let notifier = plain_notifier(&pool);
    let result = notifier
        .broadcast(1, &announcement(), ChannelSelection::default())
        .await
        .unwrap();

    assert_eq!(result.total_users, 3);
    assert_eq!(result.results.len(), 3);
    let ids: Vec<i64> = result.results.iter().map(|r| r.user_id).collect();
    assert_eq!(ids, vec![u1, u2, u3]);
    for entry in &result.results {
        assert!(entry.in_app.as_ref().unwrap().is_delivered());
        assert!(entry.errors.is_empty());
    }

    for uid in [u1, u2, u3] {
        assert_eq!(db::unread_count(&pool, uid).await.unwrap(), 1);
    }
}

#[tokio::test]
async fn one_failing_directory_lookup_does_not_abort_the_batch() {
    let pool = setup_pool().await;
    let u1 = db::create_user(
        &pool,
        "A",
        Some(1),
        Some("a@example.com"),
        None,
        UserStatus::Approved,
    )
    .await
    .unwrap();
    let u2 = db::create_user(
        &pool,
        "B",
        Some(1),
        Some("b@example.com"),
        None,
        UserStatus::Approved,
    )
    .await
    .unwrap();
    let u3 = db::create_user(
        &pool,
        "C",
        Some(1),
        Some("c@example.com"),
        None,
        UserStatus::Approved,
    )
    .await
    .unwrap();

    let store = FlakyDirectory {
        inner: SqliteStore::new(pool.clone()),
        fail_for: u2,
    };
    let notifier = Notifier::new(Arc::new(store), Arc::new(AlwaysOkEmail), Arc::new(AlwaysOkPush))
        .with_retry_policy(RetryPolicy::new(2, vec![Duration::from_millis(1)]));

    let channels = ChannelSelection {
        in_app: true,
        email: true,
        push: false,
    };
    let result = notifier.broadcast(1, &announcement(), channels).await.unwrap();

    assert_eq!(result.total_users, 3);
    assert_eq!(result.results.len(), 3);

    let ok1 = &result.results[0];
    assert_eq!(ok1.user_id, u1);
    assert!(ok1.email.as_ref().unwrap().is_delivered());
    assert!(ok1.errors.is_empty());

    // The failing recipient's entry carries the error with every channel
    // slot unpopulated.
    let degraded = &result.results[1];
    assert_eq!(degraded.user_id, u2);
    assert!(degraded.in_app.is_none());
    assert!(degraded.email.is_none());
    assert!(degraded.push.is_none());
    assert_eq!(degraded.errors.len(), 1);
    assert!(degraded.errors[0].contains("directory offline"));

    let ok3 = &result.results[2];
    assert_eq!(ok3.user_id, u3);
    assert!(ok3.email.as_ref().unwrap().is_delivered());
}

#[tokio::test]
async fn mark_all_read_is_idempotent_after_broadcast() {
    let pool = setup_pool().await;
    let uid = db::create_user(&pool, "A", Some(1), None, None, UserStatus::Approved)
        .await
        .unwrap();

    let notifier = plain_notifier(&pool);
    notifier
        .broadcast(1, &announcement(), ChannelSelection::default())
        .await
        .unwrap();
    notifier
        .dispatch(uid, Some(1), &announcement(), ChannelSelection::default())
        .await
        .unwrap();

    assert_eq!(notifier.unread_count(uid).await.unwrap(), 2);
    assert_eq!(notifier.mark_all_as_read(uid).await.unwrap(), 2);
    assert_eq!(notifier.mark_all_as_read(uid).await.unwrap(), 0);
    assert_eq!(notifier.unread_count(uid).await.unwrap(), 0);
}

#[tokio::test]
async fn mark_single_record_read_through_notifier() {
    let pool = setup_pool().await;
    let uid = db::create_user(&pool, "A", Some(1), None, None, UserStatus::Approved)
        .await
        .unwrap();

    let notifier = plain_notifier(&pool);
    notifier
        .dispatch(uid, Some(1), &announcement(), ChannelSelection::default())
        .await
        .unwrap();

    let records = notifier.list_for_user(uid).await.unwrap();
    assert_eq!(records.len(), 1);
    assert!(!records[0].is_read);

    let updated = notifier.mark_as_read(records[0].id, uid).await.unwrap().unwrap();
    assert!(updated.is_read);
    assert_eq!(notifier.unread_count(uid).await.unwrap(), 0);

    // Unknown record id resolves to None rather than an error.
    assert!(notifier.mark_as_read(9999, uid).await.unwrap().is_none());
}

#[tokio::test]
async fn invalid_payload_aborts_broadcast_before_lookup() {
    let pool = setup_pool().await;
    db::create_user(&pool, "A", Some(1), None, None, UserStatus::Approved)
        .await
        .unwrap();

    let notifier = plain_notifier(&pool);
    let payload = NotificationPayload::new("title", "   ", Category::Announcement);
    let err = notifier
        .broadcast(1, &payload, ChannelSelection::default())
        .await
        .unwrap_err();
    assert!(matches!(err, NotifyError::Validation(_)));

    let occupants = db::list_approved_occupants(&pool, 1).await.unwrap();
    assert_eq!(db::unread_count(&pool, occupants[0]).await.unwrap(), 0);
}
