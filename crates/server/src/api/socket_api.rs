//! WebSocket bridge for sign-in prompt pages.
//!
//! Each connection gets a fresh connection id and a registry slot. The page
//! drives the protocol with JSON messages tagged by `op`:
//!
//! - `{"op": "link", "stamp": "<uuid>"}` binds the connection to its session
//!   and answers with the connection token the wallet must sign.
//! - `{"op": "reconnect", "previous_connection_id": "...", "sid": "sid:..."}`
//!   re-attaches a returning page; a fresh bearer token is pushed when the
//!   previous sign-in still stands.
//!
//! Authorization codes and tokens minted elsewhere in the flow arrive on the
//! same socket as pushes.

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::api::ApiState;

#[derive(Debug, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SocketRequest {
    Link {
        stamp: Uuid,
    },
    Reconnect {
        previous_connection_id: String,
        sid: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "op", rename_all = "snake_case")]
enum SocketReply<'a> {
    Connected { connection_id: &'a str },
    Sid { sid: String },
    Reconnect { ok: bool },
    Error { error: &'a str },
}

pub async fn socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(state, socket))
}

async fn handle_socket(state: ApiState, socket: WebSocket) {
    let connection_id = Uuid::new_v4().to_string();
    let (mut ws_sender, mut ws_reader) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();

    state.registry.register(&connection_id, tx.clone());
    info!(connection_id, "socket connected");

    send_reply(
        &tx,
        &SocketReply::Connected {
            connection_id: &connection_id,
        },
    );

    let writer = tokio::spawn(async move {
        while let Some(payload) = rx.recv().await {
            if ws_sender.send(Message::Text(payload.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(next) = ws_reader.next().await {
        let msg = match next {
            Ok(m) => m,
            Err(err) => {
                warn!(connection_id, "socket read error: {err}");
                break;
            }
        };
        let Message::Text(text) = msg else {
            continue;
        };
        let request = match serde_json::from_str::<SocketRequest>(&text) {
            Ok(r) => r,
            Err(err) => {
                debug!(connection_id, "dropping malformed socket message: {err}");
                send_reply(&tx, &SocketReply::Error { error: "malformed message" });
                continue;
            }
        };

        match request {
            SocketRequest::Link { stamp } => {
                match state.flow.link_connection(stamp, &connection_id).await {
                    Ok(sid) => send_reply(&tx, &SocketReply::Sid { sid: sid.to_string() }),
                    Err(err) => {
                        debug!(connection_id, "link refused: {err}");
                        send_reply(&tx, &SocketReply::Error { error: "link refused" });
                    }
                }
            }
            SocketRequest::Reconnect {
                previous_connection_id,
                sid,
            } => {
                match state
                    .flow
                    .reconnect(&connection_id, &previous_connection_id, &sid)
                    .await
                {
                    Ok(ok) => send_reply(&tx, &SocketReply::Reconnect { ok }),
                    Err(err) => {
                        warn!(connection_id, "reconnect failed: {err}");
                        send_reply(&tx, &SocketReply::Reconnect { ok: false });
                    }
                }
            }
        }
    }

    state.registry.unregister(&connection_id);
    writer.abort();
    info!(connection_id, "socket disconnected");
}

fn send_reply(tx: &mpsc::UnboundedSender<String>, reply: &SocketReply<'_>) {
    if let Ok(payload) = serde_json::to_string(reply) {
        let _ = tx.send(payload);
    }
}
