//! Field-by-field conversion between `Activity` and `ActivityModel`.
//!
//! `to_activity(&to_model(a)?)? == a` must hold for every persisted field.
//! Required fields (id, type, timestamp) are never defaulted.

use chrono::{DateTime, SecondsFormat};

use crate::{
    activity::{Activity, ActivityType, ChannelAccount, ConversationAccount},
    errors::Error,
    persistence::ActivityModel,
    Result,
};

pub fn to_model(activity: &Activity) -> Result<ActivityModel> {
    let id = activity
        .id
        .as_deref()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::missing("id"))?;
    let activity_type = activity
        .activity_type
        .as_ref()
        .map(ActivityType::as_str)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| Error::missing("type"))?;
    let timestamp = activity
        .timestamp
        .ok_or_else(|| Error::missing("timestamp"))?;

    let (from_id, from_name) = split_channel(activity.from.as_ref());
    let (recipient_id, recipient_name) = split_channel(activity.recipient.as_ref());
    let (conversation_id, conversation_name, conversation_is_group) =
        split_conversation(activity.conversation.as_ref());

    Ok(ActivityModel {
        id: id.to_string(),
        activity_type: activity_type.to_string(),
        timestamp: timestamp.to_rfc3339_opts(SecondsFormat::Nanos, false),
        text: activity.text.clone(),
        service_url: activity.service_url.clone(),
        channel_id: activity.channel_id.clone(),
        from_id,
        from_name,
        recipient_id,
        recipient_name,
        conversation_id,
        conversation_name,
        conversation_is_group,
        reply_to_id: activity.reply_to_id.clone(),
    })
}

pub fn to_activity(model: &ActivityModel) -> Result<Activity> {
    if model.id.is_empty() {
        return Err(Error::missing("id"));
    }
    if model.activity_type.is_empty() {
        return Err(Error::missing("type"));
    }
    if model.timestamp.is_empty() {
        return Err(Error::missing("timestamp"));
    }
    let timestamp =
        DateTime::parse_from_rfc3339(&model.timestamp).map_err(|e| Error::Validation {
            field: "timestamp",
            reason: format!("{:?} is not RFC 3339: {e}", model.timestamp),
        })?;

    Ok(Activity {
        id: Some(model.id.clone()),
        activity_type: Some(ActivityType::from(model.activity_type.as_str())),
        timestamp: Some(timestamp),
        text: model.text.clone(),
        service_url: model.service_url.clone(),
        channel_id: model.channel_id.clone(),
        from: join_channel(&model.from_id, &model.from_name, "from_id")?,
        recipient: join_channel(&model.recipient_id, &model.recipient_name, "recipient_id")?,
        conversation: join_conversation(model)?,
        reply_to_id: model.reply_to_id.clone(),
    })
}

impl TryFrom<&Activity> for ActivityModel {
    type Error = Error;

    fn try_from(activity: &Activity) -> Result<Self> {
        to_model(activity)
    }
}

impl TryFrom<&ActivityModel> for Activity {
    type Error = Error;

    fn try_from(model: &ActivityModel) -> Result<Self> {
        to_activity(model)
    }
}

fn split_channel(account: Option<&ChannelAccount>) -> (Option<String>, Option<String>) {
    match account {
        Some(a) => (Some(a.id.clone()), a.name.clone()),
        None => (None, None),
    }
}

fn split_conversation(
    account: Option<&ConversationAccount>,
) -> (Option<String>, Option<String>, Option<bool>) {
    match account {
        Some(c) => (Some(c.id.clone()), c.name.clone(), c.is_group),
        None => (None, None, None),
    }
}

fn join_channel(
    id: &Option<String>,
    name: &Option<String>,
    field: &'static str,
) -> Result<Option<ChannelAccount>> {
    match (id, name) {
        (Some(id), name) => Ok(Some(ChannelAccount {
            id: id.clone(),
            name: name.clone(),
        })),
        (None, None) => Ok(None),
        (None, Some(_)) => Err(Error::Validation {
            field,
            reason: "account name stored without an id".to_string(),
        }),
    }
}

fn join_conversation(model: &ActivityModel) -> Result<Option<ConversationAccount>> {
    match &model.conversation_id {
        Some(id) => Ok(Some(ConversationAccount {
            id: id.clone(),
            name: model.conversation_name.clone(),
            is_group: model.conversation_is_group,
        })),
        None if model.conversation_name.is_none() && model.conversation_is_group.is_none() => {
            Ok(None)
        }
        None => Err(Error::Validation {
            field: "conversation_id",
            reason: "conversation details stored without an id".to_string(),
        }),
    }
}
