use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tracing::debug;
use tungstenite::Message;

use crate::messages::ClientMessage;

/// A typed client for the bridge, mostly useful for tests and examples.
///
/// The bridge never expects anything from a client; this wrapper only
/// receives.
pub struct ClientHandle {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

impl ClientHandle {
    /// Connect to a bridge on the given port (on localhost).
    pub async fn new(port: u16) -> Result<Self, tungstenite::Error> {
        let (stream, _http_response) =
            tokio_tungstenite::connect_async(format!("ws://127.0.0.1:{port}/client")).await?;

        debug!("Connected");

        Ok(Self { stream })
    }

    /// The next message from the bridge.
    ///
    /// Returns `None` when the connection closes, and panics if nothing
    /// arrives within a generous timeout (this is a test affordance).
    pub async fn next_message(&mut self) -> Option<ClientMessage> {
        loop {
            let frame = timeout(Duration::from_secs(5), self.stream.next())
                .await
                .expect("Should receive a message before timing out")?;

            match frame {
                Ok(Message::Text(text)) => {
                    let message =
                        serde_json::from_str(&text).expect("Server messages should deserialize");
                    return Some(message);
                }
                Ok(Message::Close(_)) | Err(_) => return None,
                Ok(_) => continue,
            }
        }
    }
}
