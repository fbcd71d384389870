//! Messaging platform adapter (Bot Framework connector REST API).
//!
//! This crate implements the `gracebot-core` ReplyTransport over HTTP and
//! exposes the webhook the platform posts inbound activities to.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Url;
use serde::Deserialize;

pub mod handlers;
pub mod router;

use gracebot_core::{activity::Activity, errors::Error, ports::ReplyTransport, Result};

/// Body returned by the connector when an activity was accepted.
#[derive(Debug, Default, Deserialize)]
struct ResourceResponse {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Clone, Debug)]
pub struct ConnectorClient {
    http: reqwest::Client,
    token: Option<String>,
}

impl ConnectorClient {
    pub fn new(token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::External(format!("http client build failed: {e}")))?;
        Ok(Self { http, token })
    }

    fn map_err(e: reqwest::Error) -> Error {
        Error::External(format!("connector error: {e}"))
    }
}

/// `{serviceUrl}/v3/conversations/{conversationId}/activities[/{replyToId}]`
pub fn activities_url(
    service_url: &str,
    conversation_id: &str,
    reply_to_id: Option<&str>,
) -> Result<Url> {
    let mut url = Url::parse(service_url).map_err(|e| Error::Validation {
        field: "serviceUrl",
        reason: format!("{service_url:?} is not a URL: {e}"),
    })?;
    {
        let mut segments = url.path_segments_mut().map_err(|_| Error::Validation {
            field: "serviceUrl",
            reason: format!("{service_url:?} cannot be a base URL"),
        })?;
        segments
            .pop_if_empty()
            .extend(["v3", "conversations", conversation_id, "activities"]);
        if let Some(id) = reply_to_id {
            segments.push(id);
        }
    }
    Ok(url)
}

/// Id for a reply the platform accepted without assigning one.
fn generated_reply_id(original: &Activity) -> String {
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or_default();
    match original.id.as_deref() {
        Some(id) => format!("{id}-reply-{nanos}"),
        None => format!("reply-{nanos}"),
    }
}

#[async_trait]
impl ReplyTransport for ConnectorClient {
    async fn respond(&self, reply_text: &str, original: &Activity) -> Result<Activity> {
        let service_url = original.service_url.as_deref().ok_or(Error::Validation {
            field: "serviceUrl",
            reason: "cannot reply without a service URL".to_string(),
        })?;
        let conversation_id = original.conversation_id().ok_or(Error::Validation {
            field: "conversation",
            reason: "cannot reply outside a conversation".to_string(),
        })?;

        let mut reply = original.create_reply(reply_text);
        let url = activities_url(service_url, conversation_id, original.id.as_deref())?;

        let mut req = self.http.post(url).json(&reply);
        if let Some(token) = &self.token {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await.map_err(Self::map_err)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::External(format!(
                "connector rejected reply: {status} {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        let body = resp.text().await.map_err(Self::map_err)?;
        let accepted: ResourceResponse = if body.trim().is_empty() {
            ResourceResponse::default()
        } else {
            serde_json::from_str(&body)?
        };

        reply.id = Some(
            accepted
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| generated_reply_id(original)),
        );
        tracing::debug!(
            reply_id = reply.id.as_deref().unwrap_or_default(),
            conversation_id,
            "reply sent"
        );
        Ok(reply)
    }
}
