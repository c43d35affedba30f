use super::model::{Contact, Notification, UserStatus};
use crate::model::NotificationPayload;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use tracing::instrument;

pub type Pool = SqlitePool;

pub async fn init_pool(database_url: &str) -> Result<Pool> {
    let pool = SqlitePool::connect(database_url).await?;
    // Enable WAL and stricter durability.
    sqlx::query("PRAGMA journal_mode=WAL;")
        .execute(&pool)
        .await?;
    sqlx::query("PRAGMA synchronous=FULL;")
        .execute(&pool)
        .await?;
    Ok(pool)
}

pub async fn run_migrations(pool: &Pool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

#[instrument(skip_all)]
pub async fn create_user(
    pool: &Pool,
    name: &str,
    building_id: Option<i64>,
    email: Option<&str>,
    push_token: Option<&str>,
    status: UserStatus,
) -> Result<i64> {
    let rec = sqlx::query(
        "INSERT INTO users (name, building_id, email, push_token, status) VALUES (?, ?, ?, ?, ?) RETURNING id",
    )
    .bind(name)
    .bind(building_id)
    .bind(email)
    .bind(push_token)
    .bind(status.as_str())
    .fetch_one(pool)
    .await?;
    Ok(rec.get::<i64, _>("id"))
}

/// Write the durable in-app record for one dispatch. Rows start unread;
/// the payload's data map is serialized to JSON text.
#[instrument(skip_all)]
pub async fn create_notification(
    pool: &Pool,
    user_id: i64,
    building_id: Option<i64>,
    payload: &NotificationPayload,
) -> Result<Notification> {
    let data_json = payload
        .data
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .context("failed to serialize notification data")?;

    let row = sqlx::query(
        "INSERT INTO notifications (user_id, building_id, category, title, message, urgent, is_read, data) \
         VALUES (?, ?, ?, ?, ?, ?, 0, ?) \
         RETURNING id, user_id, building_id, category, title, message, urgent, is_read, data, created_at",
    )
    .bind(user_id)
    .bind(building_id)
    .bind(payload.category.as_str())
    .bind(&payload.title)
    .bind(&payload.message)
    .bind(payload.urgent)
    .bind(data_json)
    .fetch_one(pool)
    .await
    .context("failed to insert notification")?;

    notification_from_row(&row)
}

#[instrument(skip_all)]
pub async fn get_contact(pool: &Pool, user_id: i64) -> Result<Contact> {
    let row = sqlx::query("SELECT email, push_token FROM users WHERE id = ?")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;

    let Some(row) = row else {
        return Err(anyhow!("user {} not found", user_id));
    };

    Ok(Contact {
        email: row
            .try_get::<Option<String>, _>("email")
            .ok()
            .flatten()
            .filter(|s| !s.trim().is_empty()),
        push_token: row
            .try_get::<Option<String>, _>("push_token")
            .ok()
            .flatten()
            .filter(|s| !s.trim().is_empty()),
    })
}

/// Approved occupants of a building, in directory (id) order.
#[instrument(skip_all)]
pub async fn list_approved_occupants(pool: &Pool, building_id: i64) -> Result<Vec<i64>> {
    let ids = sqlx::query_scalar::<_, i64>(
        "SELECT id FROM users WHERE building_id = ? AND status = ? ORDER BY id",
    )
    .bind(building_id)
    .bind(UserStatus::Approved.as_str())
    .fetch_all(pool)
    .await?;
    Ok(ids)
}

#[instrument(skip_all)]
pub async fn unread_count(pool: &Pool, user_id: i64) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
            .bind(user_id)
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Flip a single record to read, scoped to its owner. Returns the updated
/// row, or `None` when no record with that id belongs to the user.
#[instrument(skip_all)]
pub async fn mark_read(
    pool: &Pool,
    notification_id: i64,
    user_id: i64,
) -> Result<Option<Notification>> {
    let row = sqlx::query(
        "UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ? \
         RETURNING id, user_id, building_id, category, title, message, urgent, is_read, data, created_at",
    )
    .bind(notification_id)
    .bind(user_id)
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(notification_from_row).transpose()
}

/// Flip every unread record for a user. Returns how many rows changed, so a
/// second consecutive call returns 0.
#[instrument(skip_all)]
pub async fn mark_all_read(pool: &Pool, user_id: i64) -> Result<u64> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

#[instrument(skip_all)]
pub async fn list_for_user(pool: &Pool, user_id: i64) -> Result<Vec<Notification>> {
    let rows = sqlx::query(
        "SELECT id, user_id, building_id, category, title, message, urgent, is_read, data, created_at \
         FROM notifications WHERE user_id = ? ORDER BY created_at DESC, id DESC",
    )
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(notification_from_row).collect()
}

fn notification_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Notification> {
    Ok(Notification {
        id: row.get("id"),
        user_id: row.get("user_id"),
        building_id: row.try_get::<Option<i64>, _>("building_id").ok().flatten(),
        category: row.get("category"),
        title: row.get("title"),
        message: row.get("message"),
        urgent: row.get::<bool, _>("urgent"),
        is_read: row.get::<bool, _>("is_read"),
        data: row.try_get::<Option<String>, _>("data").ok().flatten(),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
    })
}
