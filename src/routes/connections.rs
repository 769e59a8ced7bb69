use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, patch};
use axum::{Json, Router};
use serde::Deserialize;

use crate::connections::{ConnectionRequest, RequestRole, RequestStatus, StatusOutcome};
use crate::error::AppResult;
use crate::extractors::CurrentProfile;
use crate::ids::{ProfileId, RequestId};
use crate::state::AppState;

// -- Request types --

#[derive(Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub role: RequestRole,
}

#[derive(Deserialize)]
pub struct CreateRequestBody {
    pub receiver: String,
}

#[derive(Deserialize)]
pub struct UpdateStatusBody {
    pub status: RequestStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/connection-requests",
            get(list_requests).post(create_request),
        )
        .route(
            "/connection-requests/{id}",
            patch(update_status).delete(withdraw_request),
        )
}

async fn list_requests(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Query(query): Query<ListQuery>,
) -> AppResult<Json<Vec<ConnectionRequest>>> {
    Ok(Json(
        state
            .connections
            .list_requests(&profile.id, query.role)
            .await?,
    ))
}

async fn create_request(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Json(body): Json<CreateRequestBody>,
) -> AppResult<Response> {
    let request = state
        .connections
        .create_request(&profile.id, &ProfileId::new(body.receiver))
        .await?;
    Ok((StatusCode::CREATED, Json(request)).into_response())
}

async fn update_status(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Path(id): Path<String>,
    Json(body): Json<UpdateStatusBody>,
) -> AppResult<Json<StatusOutcome>> {
    let outcome = state
        .connections
        .update_status(&RequestId::new(id), body.status, &profile.id)
        .await?;
    Ok(Json(outcome))
}

async fn withdraw_request(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Path(id): Path<String>,
) -> AppResult<StatusCode> {
    state
        .connections
        .withdraw(&RequestId::new(id), &profile.id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
