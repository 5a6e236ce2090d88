/// Direct message endpoints and the realtime WebSocket feed
///
/// Clients connect to /api/messages/ws and receive one JSON frame per
/// message event involving their own account, in send order.
use crate::{
    auth::AuthContext,
    content::messages::{ConversationPartner, DirectMessage},
    context::AppContext,
    error::{HubError, HubResult},
};
use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
    routing::{get, post},
    Json, Router,
};
use futures::{sink::SinkExt, stream::StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::error::RecvError;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/api/messages", post(send_message))
        .route("/api/messages/partners", get(partners))
        .route("/api/messages/unread", get(unread_count))
        .route("/api/messages/ws", get(subscribe))
        .route("/api/messages/:peer_id", get(conversation))
        .route("/api/messages/:peer_id/read", post(mark_read))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SendMessageRequest {
    receiver_id: String,
    content: String,
}

async fn send_message(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Json(request): Json<SendMessageRequest>,
) -> HubResult<Json<DirectMessage>> {
    let message = ctx
        .message_manager
        .send(
            &auth.user_id,
            auth.role,
            auth.profile.state,
            &request.receiver_id,
            &request.content,
        )
        .await?;
    Ok(Json(message))
}

async fn partners(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<Vec<ConversationPartner>>> {
    let partners = ctx.message_manager.partners(&auth.user_id).await?;
    Ok(Json(partners))
}

#[derive(Debug, Serialize)]
struct UnreadCount {
    unread: i64,
}

async fn unread_count(
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> HubResult<Json<UnreadCount>> {
    let unread = ctx.message_manager.unread_count(&auth.user_id).await?;
    Ok(Json(UnreadCount { unread }))
}

#[derive(Debug, Deserialize)]
struct ConversationQuery {
    limit: Option<i64>,
}

async fn conversation(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(peer_id): Path<String>,
    Query(query): Query<ConversationQuery>,
) -> HubResult<Json<Vec<DirectMessage>>> {
    let limit = query.limit.unwrap_or(100);
    if !(1..=500).contains(&limit) {
        return Err(HubError::Validation(
            "limit must be between 1 and 500".to_string(),
        ));
    }

    let messages = ctx
        .message_manager
        .conversation(&auth.user_id, &peer_id, limit)
        .await?;
    Ok(Json(messages))
}

async fn mark_read(
    State(ctx): State<AppContext>,
    auth: AuthContext,
    Path(peer_id): Path<String>,
) -> HubResult<Json<serde_json::Value>> {
    let marked = ctx.message_manager.mark_read(&auth.user_id, &peer_id).await?;
    Ok(Json(serde_json::json!({ "marked": marked })))
}

async fn subscribe(
    ws: WebSocketUpgrade,
    State(ctx): State<AppContext>,
    auth: AuthContext,
) -> Response {
    let user_id = auth.user_id;
    ws.on_upgrade(move |socket| handle_socket(socket, ctx, user_id))
}

async fn handle_socket(socket: WebSocket, ctx: AppContext, user_id: String) {
    tracing::debug!(user_id = %user_id, "Realtime subscriber connected");

    let mut events = ctx.realtime.subscribe();
    let (mut sender, mut receiver) = socket.split();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    if !event.concerns(&user_id) {
                        continue;
                    }
                    let frame = match serde_json::to_string(&event) {
                        Ok(frame) => frame,
                        Err(e) => {
                            tracing::error!("Failed to serialize message event: {}", e);
                            break;
                        }
                    };
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                // A lagged subscriber skips the overwritten events and
                // keeps receiving from the current position.
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(
                        user_id = %user_id,
                        skipped = skipped,
                        "Realtime subscriber lagged"
                    );
                }
                Err(RecvError::Closed) => break,
            },
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(_)) => break,
            },
        }
    }

    tracing::debug!(user_id = %user_id, "Realtime subscriber disconnected");
}
