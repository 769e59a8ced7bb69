use axum::extract::{Path, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/media/{file_name}", get(serve))
}

async fn serve(State(state): State<AppState>, Path(file_name): Path<String>) -> AppResult<Response> {
    let content = state
        .attachments
        .get(&file_name)
        .await?
        .ok_or(AppError::NotFound)?;

    let mime = mime_guess::from_path(&file_name).first_or_octet_stream();

    Ok(([(header::CONTENT_TYPE, mime.as_ref().to_string())], content).into_response())
}
