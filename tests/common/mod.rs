#![allow(dead_code)]

use std::time::Duration;

use axum::http::StatusCode;
use color_eyre::Result;
use futures::StreamExt;
use sensor_bridge::{config::Config, hub::HubHandle, messages::ClientMessage};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::info;

/// Start a server on an arbitrary port, without a connection manager.
/// Tests drive the hub directly, playing the device's role.
pub async fn start_server() -> (u16, HubHandle) {
    let hub = HubHandle::new();
    let (port_tx, port_rx) = oneshot::channel();

    let server_hub = hub.clone();
    tokio::spawn(async move {
        sensor_bridge::server::run_any_port(Config::default(), server_hub, port_tx).await
    });

    let port = port_rx
        .await
        .expect("Server should reply with allocated port");

    (port, hub)
}

pub async fn connect(port: u16) -> Result<WebSocketStream<MaybeTlsStream<TcpStream>>> {
    info!("Connecting to server on port {port}");
    let (stream, http_response) =
        tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/client")).await?;

    assert_eq!(http_response.status(), StatusCode::SWITCHING_PROTOCOLS);

    Ok(stream)
}

pub async fn receive(
    client: &mut WebSocketStream<MaybeTlsStream<TcpStream>>,
) -> Result<ClientMessage> {
    let message = timeout(Duration::from_secs(5), client.next())
        .await?
        .ok_or_else(|| color_eyre::eyre::eyre!("Stream closed"))??;

    let message = message.to_text()?;
    let message = serde_json::from_str(message)?;

    Ok(message)
}
