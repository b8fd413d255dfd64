use axum::{
    body::Bytes,
    debug_handler,
    extract::{
        ws::{Message, Utf8Bytes, WebSocket},
        State, WebSocketUpgrade,
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::{sync::mpsc, time::Instant};

use crate::{
    auth::{bearer, Verifier},
    config::Heartbeat,
    delivery::Messenger,
    extract::AppQuery,
    AppError,
};

use super::{hub::OUTBOX_CAPACITY, session::Session, Hub};

#[derive(Deserialize)]
pub struct HandshakeQuery {
    token: Option<String>,
}

/// Authenticates before upgrading: a bad credential never gets a socket.
#[debug_handler(state = crate::AppState)]
pub async fn gateway_ws(
    AppQuery(HandshakeQuery { token }): AppQuery<HandshakeQuery>,
    State(verifier): State<Verifier>,
    State(hub): State<Hub>,
    State(messenger): State<Messenger>,
    State(heartbeat): State<Heartbeat>,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> Response {
    let token = bearer(&headers).or(token.as_deref());
    let account = match verifier.verify(token).await {
        Ok(account) => account,
        Err(err) => {
            tracing::info!(cause = err.code(), "gateway handshake rejected");
            return (StatusCode::UNAUTHORIZED, AppError::from(err).to_string()).into_response();
        }
    };

    ws.on_upgrade(async move |socket| {
        run(socket, Session::new(account, hub, messenger), heartbeat).await;
    })
}

async fn run(socket: WebSocket, session: Session, heartbeat: Heartbeat) {
    let (outbox, mut inbox) = mpsc::channel::<Utf8Bytes>(OUTBOX_CAPACITY);
    let (mut sender, mut receiver) = socket.split();

    session.hub.connect(session.conn, session.account.id, outbox);
    tracing::info!(
        conn = %session.conn,
        user = %session.account.id,
        name = %format_args!("{} {}", session.account.first_name, session.account.last_name),
        "gateway connected"
    );

    let mut writer = tokio::spawn(async move {
        let mut ping = tokio::time::interval(heartbeat.interval);
        ping.tick().await;
        loop {
            tokio::select! {
                frame = inbox.recv() => {
                    let Some(frame) = frame else {
                        break;
                    };
                    if sender.send(Message::Text(frame)).await.is_err() {
                        break;
                    }
                }
                _ = ping.tick() => {
                    if sender.send(Message::Ping(Bytes::new())).await.is_err() {
                        break;
                    }
                }
            }
        }
        let _ = sender.close().await;
    });

    let mut last_seen = Instant::now();
    let mut watchdog = tokio::time::interval(heartbeat.interval);
    loop {
        tokio::select! {
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    last_seen = Instant::now();
                    session.dispatch(text.as_str()).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => last_seen = Instant::now(),
                Some(Err(err)) => {
                    tracing::debug!(conn = %session.conn, error = %err, "gateway read failed");
                    break;
                }
            },
            _ = watchdog.tick() => {
                if last_seen.elapsed() > heartbeat.timeout {
                    tracing::info!(conn = %session.conn, user = %session.account.id, "heartbeat timeout");
                    break;
                }
            }
            _ = &mut writer => break,
        }
    }

    session.hub.disconnect(session.conn);
    writer.abort();
    tracing::info!(conn = %session.conn, user = %session.account.id, "gateway disconnected");
}
