use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::session;
use crate::error::AppError;
use crate::ids::{ProfileId, UserId};
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: UserId,
    /// The session token the request came with.
    pub token: String,
}

/// Extractor that requires authentication.
/// Returns 401 if no valid session found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token =
            extract_session_token(parts, &state.config.auth.cookie_name).ok_or(AppError::Unauthorized)?;

        match session::user_for_token(&state.db, &token)? {
            Some(id) => Ok(CurrentUser { id, token }),
            None => Err(AppError::Unauthorized),
        }
    }
}

/// The authenticated user's profile. Everything past the profile directory
/// acts as a profile, so a user without one is turned away.
#[derive(Debug, Clone)]
pub struct CurrentProfile {
    pub id: ProfileId,
    pub user_id: UserId,
}

impl FromRequestParts<AppState> for CurrentProfile {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;

        match state.profiles.get_by_user(&user.id).await {
            Ok(profile) => Ok(CurrentProfile {
                id: profile.id,
                user_id: user.id,
            }),
            Err(AppError::NotFound) => Err(AppError::Forbidden("A profile is required".into())),
            Err(e) => Err(e),
        }
    }
}

/// Chat socket upgrades are the only requests that may carry the token in
/// the query string.
fn is_chat_socket(parts: &Parts) -> bool {
    let path = parts.uri.path();
    path.starts_with("/conversations/") && path.ends_with("/ws")
}

/// Bearer header first, then the session cookie, then `?token=` on chat
/// socket upgrades.
fn extract_session_token(parts: &Parts, cookie_name: &str) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    let from_cookie = parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let (key, val) = cookie.split_once('=')?;
            (key.trim() == cookie_name).then(|| val.trim().to_string())
        });
    if from_cookie.is_some() {
        return from_cookie;
    }

    if !is_chat_socket(parts) {
        return None;
    }
    parts.uri.query().and_then(|query| {
        query.split('&').find_map(|pair| {
            let (key, val) = pair.split_once('=')?;
            (key == "token" && !val.is_empty()).then(|| val.to_string())
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(req: Request<()>) -> Parts {
        req.into_parts().0
    }

    #[test]
    fn bearer_header_wins() {
        let p = parts(
            Request::builder()
                .uri("/x?token=query")
                .header(header::AUTHORIZATION, "Bearer abc")
                .header(header::COOKIE, "bandhan_session=cookie")
                .body(())
                .unwrap(),
        );
        assert_eq!(extract_session_token(&p, "bandhan_session").as_deref(), Some("abc"));
    }

    #[test]
    fn cookie_then_query() {
        let p = parts(
            Request::builder()
                .uri("/x?token=query")
                .header(header::COOKIE, "theme=dark; bandhan_session=cookie")
                .body(())
                .unwrap(),
        );
        assert_eq!(extract_session_token(&p, "bandhan_session").as_deref(), Some("cookie"));

        let p = parts(
            Request::builder()
                .uri("/conversations/c1/ws?a=1&token=query")
                .body(())
                .unwrap(),
        );
        assert_eq!(extract_session_token(&p, "bandhan_session").as_deref(), Some("query"));
    }

    #[test]
    fn query_token_only_counts_on_chat_sockets() {
        for uri in ["/conversations?token=query", "/profiles/me?token=query", "/ws?token=query"] {
            let p = parts(Request::builder().uri(uri).body(()).unwrap());
            assert_eq!(extract_session_token(&p, "bandhan_session"), None, "{}", uri);
        }
    }

    #[test]
    fn missing_token() {
        let p = parts(
            Request::builder()
                .uri("/x?token=")
                .header(header::COOKIE, "other=1")
                .body(())
                .unwrap(),
        );
        assert_eq!(extract_session_token(&p, "bandhan_session"), None);
    }
}
