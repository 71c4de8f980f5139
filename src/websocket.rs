use std::net::SocketAddr;

use tokio::sync::mpsc;

use futures::{sink::Sink, SinkExt, StreamExt};

use axum::{
    extract::{
        ws::{Message, WebSocket},
        ConnectInfo, WebSocketUpgrade,
    },
    http::{header::SEC_WEBSOCKET_PROTOCOL, HeaderMap},
    response::IntoResponse,
    Extension, TypedHeader,
};

use futures::stream::Stream;

use tracing::{debug, info, info_span, trace, warn, Instrument};

use crate::hub::{ClientId, HubHandle};

/// The first sub-protocol the client offered, if any.
/// It is echoed back verbatim during the upgrade.
fn first_offered_protocol(headers: &HeaderMap) -> Option<String> {
    let offered = headers.get(SEC_WEBSOCKET_PROTOCOL)?.to_str().ok()?;

    offered
        .split(',')
        .map(str::trim)
        .find(|protocol| !protocol.is_empty())
        .map(ToString::to_string)
}

pub(crate) async fn ws_handler(
    ws: WebSocketUpgrade,
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Extension(hub): Extension<HubHandle>,
) -> impl IntoResponse {
    if let Some(TypedHeader(user_agent)) = user_agent {
        info!("`{}`@`{addr}` connected", user_agent.as_str());
    }

    let ws = match first_offered_protocol(&headers) {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };

    ws.on_upgrade(move |socket| {
        let id = ClientId::new();

        let span = info_span!("Client", %id);

        handle_client(socket, id, hub).instrument(span)
    })
}

/// Drain the client's incoming side.
/// Clients don't speak in this protocol; we only care about them going away.
pub(crate) async fn read<S>(mut receiver: S)
where
    S: Unpin,
    S: Stream<Item = Result<Message, axum::Error>>,
{
    while let Some(Ok(msg)) = receiver.next().await {
        match msg {
            Message::Text(text) => {
                trace!(%text, "ignoring client text");
            }
            Message::Binary(_) => {
                debug!("client sent binary data");
            }
            Message::Ping(_) => {
                debug!("socket ping");
            }
            Message::Pong(_) => {
                debug!("socket pong");
            }
            Message::Close(_) => {
                debug!("client disconnected");
            }
        }
    }

    debug!("client receive side done");
}

/// Forward hub messages (already serialized) as text frames.
pub(crate) async fn write(
    mut sender: impl Sink<Message> + Unpin,
    mut receiver: mpsc::UnboundedReceiver<String>,
) {
    while let Some(wire) = receiver.recv().await {
        if sender.send(Message::Text(wire)).await.is_err() {
            debug!("client disconnected");
            return;
        }
        trace!("message flushed");
    }
}

pub(crate) async fn handle_client(websocket: WebSocket, id: ClientId, hub: HubHandle) {
    let (stream_sender, stream_receiver) = websocket.split();
    let (message_sender, message_receiver) = mpsc::unbounded_channel::<String>();

    // Joining first guarantees the status snapshot precedes any data.
    hub.join(id, message_sender);

    let read_handle = tokio::spawn(read(stream_receiver).instrument(info_span!("Read")));
    let write_handle =
        tokio::spawn(write(stream_sender, message_receiver).instrument(info_span!("Write")));

    match read_handle.await {
        Ok(()) => debug!("Read task joined"),
        Err(e) => warn!("Read task join error: {e:?}"),
    }

    hub.leave(id);

    debug!("Aborting write task");
    // This ensures the underlying TCP connection gets closed,
    // which signals the client that the session is over.
    write_handle.abort();
}
