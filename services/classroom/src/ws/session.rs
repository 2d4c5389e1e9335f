//! Manages one WebSocket connection and the dialog it drives.

use super::protocol::{ClientMessage, ServerMessage};
use crate::state::AppState;
use anyhow::Result;
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use classroom_core::orchestrator::{Event, Orchestrator};
use futures_util::{
    SinkExt, StreamExt,
    stream::{SplitSink, SplitStream},
};
use std::sync::Arc;
use tokio::{sync::Mutex, task::JoinSet};
use tracing::{Instrument, error, info, instrument, warn};

type SocketSink = Arc<Mutex<SplitSink<WebSocket, Message>>>;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Entry point for a new connection: one fresh dialog per socket.
#[instrument(name = "ws_session", skip_all, fields(session_id))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let session_id: u32 = rand::random();
    tracing::Span::current().record("session_id", session_id);
    info!("New WebSocket connection. Starting dialog...");

    let (socket_tx, socket_rx) = socket.split();
    let socket_tx = Arc::new(Mutex::new(socket_tx));
    let orchestrator = state.new_orchestrator();

    if let Err(e) = run_dialog_session(orchestrator, socket_tx, socket_rx).await {
        error!(error = ?e, "Dialog session terminated with error.");
    }
    info!("WebSocket connection closed and dialog dropped.");
}

/// Forwards every view change to the client and turns client messages into events.
///
/// Submissions and help requests each run in their own task so that a help
/// request is not queued behind a student workflow. Dropping the task set on
/// exit aborts whatever is still running.
async fn run_dialog_session(
    orchestrator: Orchestrator,
    socket_tx: SocketSink,
    mut socket_rx: SplitStream<WebSocket>,
) -> Result<()> {
    send_msg(
        &mut *socket_tx.lock().await,
        ServerMessage::View {
            view: orchestrator.view(),
        },
    )
    .await?;

    let mut view_rx = orchestrator.subscribe();
    let forwarder = tokio::spawn(
        {
            let socket_tx = socket_tx.clone();
            async move {
                while view_rx.changed().await.is_ok() {
                    let view = view_rx.borrow_and_update().clone();
                    let mut sink = socket_tx.lock().await;
                    if send_msg(&mut sink, ServerMessage::View { view }).await.is_err() {
                        warn!("Failed to push view update; client likely gone.");
                        break;
                    }
                }
            }
        }
        .in_current_span(),
    );

    let mut dispatches = JoinSet::new();
    spawn_dispatch(&mut dispatches, &orchestrator, Event::Start);

    while let Some(msg_result) = socket_rx.next().await {
        match msg_result {
            Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                Ok(ClientMessage::SendMessage { text }) => {
                    spawn_dispatch(&mut dispatches, &orchestrator, Event::Submit(text));
                }
                Ok(ClientMessage::RequestHelp) => {
                    spawn_dispatch(&mut dispatches, &orchestrator, Event::RequestHelp);
                }
                Ok(ClientMessage::Paste { text }) => {
                    orchestrator.dispatch(Event::Paste(text)).await;
                }
                Ok(ClientMessage::ExportTranscript) => {
                    let transcript = orchestrator.transcript().await;
                    send_msg(
                        &mut *socket_tx.lock().await,
                        ServerMessage::Transcript { transcript },
                    )
                    .await?;
                }
                Err(e) => {
                    warn!(error = %e, "Ignoring malformed client message.");
                    send_msg(
                        &mut *socket_tx.lock().await,
                        ServerMessage::Error {
                            message: format!("Invalid message: {e}"),
                        },
                    )
                    .await?;
                }
            },
            Ok(Message::Close(_)) => {
                info!("Client sent close frame. Shutting down session.");
                break;
            }
            Ok(Message::Binary(_)) => warn!("Ignoring binary frame."),
            Ok(Message::Ping(_) | Message::Pong(_)) => {}
            Err(e) => {
                error!("Error receiving from client WebSocket: {:?}", e);
                break;
            }
        }
        while dispatches.try_join_next().is_some() {}
    }

    forwarder.abort();
    Ok(())
}

fn spawn_dispatch(dispatches: &mut JoinSet<()>, orchestrator: &Orchestrator, event: Event) {
    let orchestrator = orchestrator.clone();
    dispatches.spawn(
        async move {
            let outcome = orchestrator.dispatch(event).await;
            tracing::debug!(?outcome, "Event handled");
        }
        .in_current_span(),
    );
}

/// A helper function to serialize and send a `ServerMessage` to the client.
pub(crate) async fn send_msg(
    socket_tx: &mut SplitSink<WebSocket, Message>,
    msg: ServerMessage,
) -> Result<()> {
    let serialized = serde_json::to_string(&msg)?;
    socket_tx.send(Message::Text(serialized.into())).await?;
    Ok(())
}
