//! Per-connection state machine
//!
//! `Open`: registered in the client set and acknowledged; a writer task
//! drains the client's queue onto the socket while this task reads
//! commands. Any transport fault or close frame moves to `Closed`, which
//! unregisters the client. Nothing here can stall a broadcast tick: the
//! loop only ever touches the client's bounded queue.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::stream::{SplitSink, StreamExt};
use futures::SinkExt;
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

use contracts::ServerMessage;
use dispatcher::ClientId;

use crate::server::AppState;

#[instrument(name = "client_connection", skip_all, fields(client_id))]
pub(crate) async fn client_connection(socket: WebSocket, state: AppState) {
    let (handle, outbound) = state.registry.register(state.queue_capacity);
    let client_id = handle.id();
    tracing::Span::current().record("client_id", tracing::field::display(client_id));
    observability::record_client_connected();
    info!(client_id = %client_id, clients = state.registry.len(), "client connected");

    let (mut sink, mut stream) = socket.split();

    let acknowledged = match ServerMessage::connected().to_json() {
        Ok(ack) => sink.send(Message::Text(ack.into())).await.is_ok(),
        Err(e) => {
            warn!(client_id = %client_id, error = %e, "connection ack encoding failed");
            false
        }
    };

    if acknowledged {
        let writer = tokio::spawn(write_outbound(sink, outbound, client_id));

        while let Some(frame) = stream.next().await {
            let text = match frame {
                Ok(Message::Text(text)) => text.as_str().to_owned(),
                Ok(Message::Binary(bytes)) => String::from_utf8_lossy(&bytes).into_owned(),
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => {
                    debug!(client_id = %client_id, error = %e, "receive failed");
                    break;
                }
            };

            let reply = state.commands.handle_frame(&text).await;
            let payload = match reply.to_json() {
                Ok(payload) => payload,
                Err(e) => {
                    warn!(client_id = %client_id, error = %e, "reply encoding failed");
                    continue;
                }
            };
            if handle.sender().send(Arc::from(payload)).await.is_err() {
                // writer is gone; the socket is dead
                break;
            }
        }

        writer.abort();
    }

    state.registry.unregister(client_id);
    observability::record_client_disconnected();
    info!(client_id = %client_id, clients = state.registry.len(), "client disconnected");
}

/// Sole writer to the socket
async fn write_outbound(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Arc<str>>,
    client_id: ClientId,
) {
    while let Some(payload) = outbound.recv().await {
        if let Err(e) = sink.send(Message::Text(payload.as_ref().into())).await {
            debug!(client_id = %client_id, error = %e, "send failed");
            break;
        }
    }
    let _ = sink.close().await;
}
