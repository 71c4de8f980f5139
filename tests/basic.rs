use color_eyre::Result;
use common::{connect, receive, start_server};
use pretty_assertions::assert_eq;
use sensor_bridge::messages::ClientMessage;
use tungstenite::client::IntoClientRequest;

mod common;

#[tokio::test]
async fn can_connect() -> Result<()> {
    let (port, _hub) = start_server().await;
    connect(port).await?;

    Ok(())
}

#[tokio::test]
async fn new_client_gets_status_snapshot() -> Result<()> {
    let (port, _hub) = start_server().await;
    let mut client = connect(port).await?;

    // No device session exists, so the snapshot says disconnected.
    assert_eq!(receive(&mut client).await?, ClientMessage::status(false));

    Ok(())
}

#[tokio::test]
async fn typed_client_sees_messages() -> Result<()> {
    let (port, hub) = start_server().await;

    let mut client = sensor_bridge::client::ClientHandle::new(port).await?;

    assert_eq!(
        client.next_message().await,
        Some(ClientMessage::status(false))
    );

    hub.broadcast(ClientMessage::example_data());
    assert_eq!(
        client.next_message().await,
        Some(ClientMessage::example_data())
    );

    Ok(())
}

#[tokio::test]
async fn first_offered_subprotocol_is_echoed() -> Result<()> {
    let (port, _hub) = start_server().await;

    let mut request = format!("ws://127.0.0.1:{port}/client").into_client_request()?;
    request.headers_mut().insert(
        "Sec-WebSocket-Protocol",
        "telemetry.v1, something-else".parse().unwrap(),
    );

    let (_stream, response) = tokio_tungstenite::connect_async(request).await?;

    assert_eq!(
        response
            .headers()
            .get("Sec-WebSocket-Protocol")
            .map(|protocol| protocol.to_str().unwrap()),
        Some("telemetry.v1")
    );

    Ok(())
}

#[tokio::test]
async fn no_subprotocol_means_none_echoed() -> Result<()> {
    let (port, _hub) = start_server().await;

    let request = format!("ws://127.0.0.1:{port}/client").into_client_request()?;
    let (_stream, response) = tokio_tungstenite::connect_async(request).await?;

    assert_eq!(response.headers().get("Sec-WebSocket-Protocol"), None);

    Ok(())
}
