//! WebSocket upgrade handler implementing real-time event surface,
//! backed directly by the Session Manager.

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use nlq_core::{DbKind, Session};
use nlq_planner::{AgentResponse, PipelineOptions};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
enum ClientEvent {
    JoinSession { session_id: Uuid, user_id: String },
    SendMessage { session_id: Uuid, message: String, db_url: Option<String>, db_type: Option<DbKind>, dry_run: Option<bool> },
    Typing { session_id: Uuid, is_typing: bool },
    CreateSession { user_id: String },
    GetSession { session_id: Uuid, user_id: String },
    DeleteSession { session_id: Uuid, user_id: String },
    ListSessions { user_id: String },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
enum ServerEvent {
    SessionJoined { session: Session },
    MessageReceived { session_id: Uuid, text: String },
    AgentThinking { session_id: Uuid },
    AgentResponse { session_id: Uuid, response: AgentResponse },
    TypingIndicator { session_id: Uuid, is_typing: bool },
    SessionsList { sessions: Vec<Session> },
    SessionCreated { session: Session },
    SessionDeleted { session_id: Uuid },
    Error { message: String, code: Option<String> },
}

pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();

    // The handshake's bearer token is stubbed to carry the userId
    // directly; the first event naming a userId pins it for the rest of the
    // connection, and every later event is checked against that pin.
    let mut authenticated_user_id: Option<String> = None;

    while let Some(Ok(msg)) = receiver.next().await {
        let Message::Text(text) = msg else { continue };

        let event: ClientEvent = match serde_json::from_str(&text) {
            Ok(e) => e,
            Err(e) => {
                send_event(&mut sender, &ServerEvent::Error { message: format!("malformed event: {e}"), code: None }).await;
                continue;
            }
        };

        if let Some(claimed) = claimed_user_id(&event) {
            match &authenticated_user_id {
                Some(pinned) if pinned != claimed => {
                    send_event(
                        &mut sender,
                        &ServerEvent::Error { message: "userId does not match this connection's session".to_string(), code: Some("UNAUTHORIZED".to_string()) },
                    )
                    .await;
                    continue;
                }
                Some(_) => {}
                None => authenticated_user_id = Some(claimed.clone()),
            }
        }

        if let Err(err) = dispatch(&state, &authenticated_user_id, event, &mut sender).await {
            warn!(error = %err, "error dispatching websocket event");
            send_event(&mut sender, &ServerEvent::Error { message: err.to_string(), code: Some(err.kind_tag().to_string()) }).await;
        }
    }
}

fn claimed_user_id(event: &ClientEvent) -> Option<&String> {
    match event {
        ClientEvent::JoinSession { user_id, .. }
        | ClientEvent::CreateSession { user_id }
        | ClientEvent::GetSession { user_id, .. }
        | ClientEvent::DeleteSession { user_id, .. }
        | ClientEvent::ListSessions { user_id } => Some(user_id),
        ClientEvent::SendMessage { .. } | ClientEvent::Typing { .. } => None,
    }
}

async fn dispatch(
    state: &AppState,
    current_user: &Option<String>,
    event: ClientEvent,
    sender: &mut futures::stream::SplitSink<WebSocket, Message>,
) -> Result<(), nlq_core::AgentError> {
    match event {
        ClientEvent::JoinSession { session_id, user_id } => {
            let session = state.sessions.get_session(session_id, &user_id).await?;
            send_event(sender, &ServerEvent::SessionJoined { session }).await;
        }
        ClientEvent::CreateSession { user_id } => {
            let session = state.sessions.create_session(&user_id).await?;
            send_event(sender, &ServerEvent::SessionCreated { session }).await;
        }
        ClientEvent::GetSession { session_id, user_id } => {
            let session = state.sessions.get_session(session_id, &user_id).await?;
            send_event(sender, &ServerEvent::SessionJoined { session }).await;
        }
        ClientEvent::DeleteSession { session_id, user_id } => {
            state.sessions.delete_session(session_id, &user_id).await?;
            send_event(sender, &ServerEvent::SessionDeleted { session_id }).await;
        }
        ClientEvent::ListSessions { user_id } => {
            let sessions = state.sessions.list(&user_id).await?;
            send_event(sender, &ServerEvent::SessionsList { sessions }).await;
        }
        ClientEvent::Typing { session_id, is_typing } => {
            send_event(sender, &ServerEvent::TypingIndicator { session_id, is_typing }).await;
        }
        ClientEvent::SendMessage { session_id, message, db_url, db_type, dry_run } => {
            let user_id = current_user
            .clone()
            .ok_or_else(|| nlq_core::AgentError::Unauthorized("send-message requires a prior join-session".to_string()))?;

            send_event(sender, &ServerEvent::MessageReceived { session_id, text: message.clone() }).await;
            send_event(sender, &ServerEvent::AgentThinking { session_id }).await;

            let override_endpoint = db_url.map(|url| (url, db_type));
            let options = PipelineOptions { verbose: true, dry_run: dry_run.unwrap_or(false), force_schema_refresh: false };

            let outcome = state.sessions.send(session_id, &user_id, &message, override_endpoint, options).await?;
            info!(session_id = %session_id, query_id = %outcome.response.query_id, "handled websocket turn");
            send_event(sender, &ServerEvent::AgentResponse { session_id, response: outcome.response }).await;
        }
    }
    Ok(())
}

async fn send_event(sender: &mut futures::stream::SplitSink<WebSocket, Message>, event: &ServerEvent) {
    match serde_json::to_string(event) {
        Ok(text) => {
            let _ = sender.send(Message::Text(text)).await;
        }
        Err(e) => warn!(error = %e, "failed to serialize server event"),
    }
}
