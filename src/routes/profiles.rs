use axum::extract::{DefaultBodyLimit, Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::error::AppResult;
use crate::extractors::CurrentUser;
use crate::ids::ProfileId;
use crate::profiles::domain::MAX_PROFILE_IMAGES;
use crate::profiles::{BookmarkOutcome, Profile, ProfileInput};
use crate::routes::body_limit;
use crate::state::AppState;

pub fn router(max_image_bytes: usize) -> Router<AppState> {
    Router::new()
        .route(
            "/profiles",
            get(list_profiles).post(create_profile).layer(DefaultBodyLimit::max(
                body_limit(max_image_bytes, MAX_PROFILE_IMAGES),
            )),
        )
        .route(
            "/profiles/me",
            get(my_profile).patch(update_profile).delete(delete_profile),
        )
        .route("/profiles/{id}", get(get_profile))
        .route("/bookmarks", get(list_bookmarks))
        .route("/bookmarks/{profile_id}", post(bookmark))
}

async fn list_profiles(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.profiles.list().await?))
}

async fn my_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.get_by_user(&user.id).await?))
}

async fn create_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(input): Json<ProfileInput>,
) -> AppResult<Response> {
    let profile = state.profiles.create(&user.id, input).await?;
    Ok((StatusCode::CREATED, Json(profile)).into_response())
}

async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(patch): Json<ProfileInput>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.update(&user.id, patch).await?))
}

async fn delete_profile(State(state): State<AppState>, user: CurrentUser) -> AppResult<StatusCode> {
    state.profiles.delete(&user.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn get_profile(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<String>,
) -> AppResult<Json<Profile>> {
    Ok(Json(state.profiles.get(&ProfileId::new(id)).await?))
}

async fn bookmark(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(profile_id): Path<String>,
) -> AppResult<StatusCode> {
    let outcome = state
        .profiles
        .bookmark(&user.id, &ProfileId::new(profile_id))
        .await?;
    Ok(match outcome {
        BookmarkOutcome::Created => StatusCode::CREATED,
        BookmarkOutcome::AlreadyBookmarked => StatusCode::OK,
    })
}

async fn list_bookmarks(
    State(state): State<AppState>,
    user: CurrentUser,
) -> AppResult<Json<Vec<Profile>>> {
    Ok(Json(state.profiles.bookmarks(&user.id).await?))
}
