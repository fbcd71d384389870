//! Wire-format activity as exchanged with the messaging platform.
//!
//! Field names follow the Bot Framework JSON schema (`serviceUrl`, `replyToId`,
//! ...). Every field is optional on the wire; which ones are required is decided
//! by the persistence converter, not here.

use std::fmt;

use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};

/// Activity type. Unknown values are kept verbatim in `Other`.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ActivityType {
    Message,
    Typing,
    ConversationUpdate,
    ContactRelationUpdate,
    EndOfConversation,
    Event,
    Invoke,
    MessageReaction,
    DeleteUserData,
    Other(String),
}

impl ActivityType {
    pub fn as_str(&self) -> &str {
        match self {
            ActivityType::Message => "message",
            ActivityType::Typing => "typing",
            ActivityType::ConversationUpdate => "conversationUpdate",
            ActivityType::ContactRelationUpdate => "contactRelationUpdate",
            ActivityType::EndOfConversation => "endOfConversation",
            ActivityType::Event => "event",
            ActivityType::Invoke => "invoke",
            ActivityType::MessageReaction => "messageReaction",
            ActivityType::DeleteUserData => "deleteUserData",
            ActivityType::Other(s) => s,
        }
    }
}

impl From<&str> for ActivityType {
    fn from(s: &str) -> Self {
        match s {
            "message" => ActivityType::Message,
            "typing" => ActivityType::Typing,
            "conversationUpdate" => ActivityType::ConversationUpdate,
            "contactRelationUpdate" => ActivityType::ContactRelationUpdate,
            "endOfConversation" => ActivityType::EndOfConversation,
            "event" => ActivityType::Event,
            "invoke" => ActivityType::Invoke,
            "messageReaction" => ActivityType::MessageReaction,
            "deleteUserData" => ActivityType::DeleteUserData,
            other => ActivityType::Other(other.to_string()),
        }
    }
}

impl From<String> for ActivityType {
    fn from(s: String) -> Self {
        ActivityType::from(s.as_str())
    }
}

impl From<ActivityType> for String {
    fn from(t: ActivityType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user or bot taking part in a conversation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChannelAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
        }
    }
}

/// The conversation (thread) an activity belongs to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationAccount {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_group: Option<bool>,
}

impl ConversationAccount {
    pub fn new(id: impl Into<String>, name: impl Into<String>, is_group: bool) -> Self {
        Self {
            id: id.into(),
            name: Some(name.into()),
            is_group: Some(is_group),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(
        rename = "type",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub activity_type: Option<ActivityType>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<FixedOffset>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recipient: Option<ChannelAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<ConversationAccount>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to_id: Option<String>,
}

impl Activity {
    pub fn is_message(&self) -> bool {
        self.activity_type == Some(ActivityType::Message)
    }

    pub fn text_or_empty(&self) -> &str {
        self.text.as_deref().unwrap_or("")
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation.as_ref().map(|c| c.id.as_str())
    }

    /// Build an outbound reply to this activity.
    ///
    /// Sender and recipient are swapped and `reply_to_id` points at this
    /// activity. The id is left empty; the platform assigns it on send.
    pub fn create_reply(&self, text: impl Into<String>) -> Activity {
        Activity {
            id: None,
            activity_type: Some(ActivityType::Message),
            timestamp: Some(Utc::now().fixed_offset()),
            text: Some(text.into()),
            service_url: self.service_url.clone(),
            channel_id: self.channel_id.clone(),
            from: self.recipient.clone(),
            recipient: self.from.clone(),
            conversation: self.conversation.clone(),
            reply_to_id: self.id.clone(),
        }
    }
}
