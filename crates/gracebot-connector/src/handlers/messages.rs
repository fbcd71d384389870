use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};

use gracebot_core::{activity::Activity, app::Outcome, errors::Error};

use crate::{handlers::ApiError, router::AppState};

/// `POST /api/messages`: one inbound activity, one unit of work.
///
/// Redelivery of an activity that was already answered is acknowledged
/// without a second reply.
pub async fn handle_messages(
    State(state): State<Arc<AppState>>,
    Json(activity): Json<Activity>,
) -> Result<StatusCode, ApiError> {
    let activity_id = activity.id.clone().unwrap_or_default();

    match state.app.handle_activity(&activity).await {
        Ok(outcome) => {
            let kind = match &outcome {
                Outcome::Ignored => "ignored",
                Outcome::Filtered { .. } => "filtered",
                Outcome::Defined { .. } => "defined",
                Outcome::Fallback { .. } => "fallback",
            };
            tracing::info!(activity_id = %activity_id, outcome = kind, "activity handled");
            Ok(StatusCode::OK)
        }
        Err(Error::DuplicateActivity(id)) if id == activity_id => {
            tracing::info!(activity_id = %activity_id, "duplicate delivery acknowledged");
            Ok(StatusCode::OK)
        }
        Err(e) => {
            tracing::error!(activity_id = %activity_id, error = %e, "activity handling failed");
            Err(ApiError(e))
        }
    }
}
