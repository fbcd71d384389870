use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{activity::Activity, Result};

/// Hexagonal port for sending replies back to the messaging platform.
///
/// Implementations build the reply with [`Activity::create_reply`] and return
/// the activity as sent, including the id the platform assigned to it.
#[async_trait]
pub trait ReplyTransport: Send + Sync {
    async fn respond(&self, reply_text: &str, original: &Activity) -> Result<Activity>;
}

/// An entity recognized in the classified text.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct IntentEntity {
    pub entity: String,
    pub kind: String,
    pub score: Option<f64>,
}

/// Provider-agnostic classification result.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct IntentResult {
    pub query: String,
    pub top_intent: Option<String>,
    pub score: f64,
    pub entities: Vec<IntentEntity>,
}

/// Hexagonal port for the language-understanding service.
#[async_trait]
pub trait IntentClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> Result<IntentResult>;
}
