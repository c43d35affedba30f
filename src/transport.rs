//! Email and push channel senders.
//!
//! Each sender makes exactly one outbound call per invocation and keeps no
//! state; retry is the dispatcher's concern. The HTTP implementations talk
//! to a JSON relay endpoint (mail relay, push gateway) and report transport
//! trouble as `NotifyError::ChannelUnavailable`.
use crate::error::NotifyError;
use crate::model::{NotificationPayload, Receipt};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt;
use tracing::debug;
use uuid::Uuid;

#[async_trait]
pub trait EmailTransport: Send + Sync {
    async fn send_email(
        &self,
        address: &str,
        payload: &NotificationPayload,
    ) -> Result<Receipt, NotifyError>;
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send_push(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<Receipt, NotifyError>;
}

#[derive(Clone)]
pub struct HttpEmailTransport {
    http: Client,
    base_url: Url,
    token: String,
    from: String,
}

impl fmt::Debug for HttpEmailTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpEmailTransport")
            .field("base_url", &self.base_url)
            .field("from", &self.from)
            .finish_non_exhaustive()
    }
}

impl HttpEmailTransport {
    pub fn new(endpoint: Url, token: String, from: String) -> Self {
        let http = Client::builder()
            .user_agent("flat-notify/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: endpoint,
            token,
            from,
        }
    }

    pub fn build_request(&self, body: &Value) -> Result<reqwest::Request, NotifyError> {
        let endpoint = self
            .base_url
            .join("v1/messages")
            .map_err(|err| NotifyError::ChannelUnavailable(format!("invalid mail endpoint: {err}")))?;
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .map_err(|err| NotifyError::ChannelUnavailable(format!("failed to build mail request: {err}")))
    }
}

#[async_trait]
impl EmailTransport for HttpEmailTransport {
    async fn send_email(
        &self,
        address: &str,
        payload: &NotificationPayload,
    ) -> Result<Receipt, NotifyError> {
        let body = build_email_request(&self.from, address, payload);
        let request = self.build_request(&body)?;
        debug!(url = %request.url(), to = address, "sending email");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|err| NotifyError::ChannelUnavailable(format!("mail relay unreachable: {err}")))?;
        receipt_from_response(response, "email").await
    }
}

#[derive(Clone)]
pub struct HttpPushTransport {
    http: Client,
    base_url: Url,
    token: String,
}

impl fmt::Debug for HttpPushTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpPushTransport")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl HttpPushTransport {
    pub fn new(endpoint: Url, token: String) -> Self {
        let http = Client::builder()
            .user_agent("flat-notify/0.1")
            .build()
            .expect("reqwest client");
        Self {
            http,
            base_url: endpoint,
            token,
        }
    }

    pub fn build_request(&self, body: &Value) -> Result<reqwest::Request, NotifyError> {
        let endpoint = self
            .base_url
            .join("v1/send")
            .map_err(|err| NotifyError::ChannelUnavailable(format!("invalid push endpoint: {err}")))?;
        self.http
            .post(endpoint)
            .header("Authorization", format!("Bearer {}", self.token))
            .header("Content-Type", "application/json")
            .json(body)
            .build()
            .map_err(|err| NotifyError::ChannelUnavailable(format!("failed to build push request: {err}")))
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn send_push(
        &self,
        token: &str,
        payload: &NotificationPayload,
    ) -> Result<Receipt, NotifyError> {
        let body = build_push_request(token, payload);
        let request = self.build_request(&body)?;
        debug!(url = %request.url(), "sending push");
        let response = self
            .http
            .execute(request)
            .await
            .map_err(|err| NotifyError::ChannelUnavailable(format!("push gateway unreachable: {err}")))?;
        receipt_from_response(response, "push").await
    }
}

pub fn build_email_request(from: &str, to: &str, payload: &NotificationPayload) -> Value {
    json!({
        "from": from,
        "to": to,
        "subject": payload.title,
        "text": payload.message,
        "headers": {
            "X-Category": payload.category.as_str(),
            "X-Urgent": payload.urgent,
        },
    })
}

pub fn build_push_request(token: &str, payload: &NotificationPayload) -> Value {
    let mut body = json!({
        "token": token,
        "title": payload.title,
        "body": payload.message,
        "category": payload.category.as_str(),
        "urgent": payload.urgent,
    });
    if let Some(data) = &payload.data {
        body["data"] = Value::Object(data.clone());
    }
    body
}

#[derive(Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

async fn receipt_from_response(
    response: reqwest::Response,
    kind: &str,
) -> Result<Receipt, NotifyError> {
    if response.status() == StatusCode::TOO_MANY_REQUESTS || response.status().is_server_error() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(NotifyError::ChannelUnavailable(format!(
            "{kind} relay returned {status}: {body}"
        )));
    }
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(NotifyError::ChannelUnavailable(format!(
            "{kind} relay rejected message ({status}): {body}"
        )));
    }

    // Some relays return no id; fall back to a locally generated one so the
    // receipt always carries a message identifier.
    let parsed: SendResponse = response.json().await.unwrap_or(SendResponse { id: None });
    let message_id = parsed
        .id
        .unwrap_or_else(|| format!("{kind}-{}", Uuid::new_v4()));
    Ok(Receipt {
        message_id,
        sent_at: Utc::now(),
    })
}
