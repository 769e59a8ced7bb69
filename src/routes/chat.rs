use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::response::Response;
use axum::routing::get;
use axum::Router;
use futures::{SinkExt, StreamExt};

use crate::error::AppResult;
use crate::extractors::CurrentProfile;
use crate::ids::{ConversationId, ProfileId};
use crate::realtime::ChatHub;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/conversations/{id}/ws", get(chat_ws))
}

/// Participation is checked before the upgrade, so outsiders get a plain
/// 403/404 instead of a socket.
async fn chat_ws(
    State(state): State<AppState>,
    profile: CurrentProfile,
    Path(id): Path<String>,
    ws: WebSocketUpgrade,
) -> AppResult<Response> {
    let conversation = state
        .conversations
        .get_for_participant(&ConversationId::new(id), &profile.id)
        .await?;

    let hub = state.hub.clone();
    Ok(ws.on_upgrade(move |socket| run_channel(socket, hub, conversation.id, profile.id)))
}

async fn run_channel(socket: WebSocket, hub: ChatHub, conversation: ConversationId, profile: ProfileId) {
    let (session, mut rx) = hub.join(conversation, profile);
    let (mut sender, mut receiver) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if sender.send(Message::Text(frame.to_string().into())).await.is_err() {
                break;
            }
        }
    });

    loop {
        tokio::select! {
            inbound = receiver.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    hub.handle_frame(&session, text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    tracing::debug!("Socket error on {}: {}", session.conversation, e);
                    break;
                }
            },
            // Writer ends when the peer stops accepting frames
            _ = &mut writer => break,
        }
    }

    hub.leave(&session);
    writer.abort();
}
