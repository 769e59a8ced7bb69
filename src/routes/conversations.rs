use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::conversations::{ConversationDetail, ConversationSummary};
use crate::error::AppResult;
use crate::extractors::CurrentProfile;
use crate::ids::{ConversationId, ProfileId};
use crate::messages::MessageDraft;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/conversations", get(list_conversations))
        .route(
            "/conversations/start/{participant_id}",
            post(start_conversation),
        )
        .route("/conversations/{id}", get(get_conversation))
        .route("/conversations/{id}/messages", post(send_message))
}

/// Most recent activity first, each with its last message or null.
async fn list_conversations(
    State(state): State<AppState>,
    profile: CurrentProfile,
) -> AppResult<Json<Vec<ConversationSummary>>> {
    Ok(Json(state.conversations.list_for_profile(&profile.id).await?))
}

async fn start_conversation(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Path(participant_id): Path<String>,
) -> AppResult<Response> {
    let (conversation, created) = state
        .conversations
        .start(&profile.id, &ProfileId::new(participant_id))
        .await?;
    let status = if created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(conversation)).into_response())
}

async fn get_conversation(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Path(id): Path<String>,
) -> AppResult<Json<ConversationDetail>> {
    Ok(Json(
        state
            .conversations
            .get(&ConversationId::new(id), &profile.id)
            .await?,
    ))
}

/// Same path as a realtime frame: stored, then pushed to connected members.
async fn send_message(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Path(id): Path<String>,
    Json(draft): Json<MessageDraft>,
) -> AppResult<Response> {
    let message = state
        .hub
        .deliver(&ConversationId::new(id), &profile.id, draft)
        .await?;
    Ok((StatusCode::CREATED, Json(message)).into_response())
}
