use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// A message sent to connected websocket clients.
///
/// Two variants exist on the wire:
///
/// ```json
/// { "type": "status", "connected": true }
/// { "type": "data", "data": "{\"temperature\":21.5}" }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Whether the bridge currently has a live device connection.
    Status {
        /// True when a device session is active.
        connected: bool,
    },

    /// One telemetry line from the device, forwarded verbatim.
    Data {
        /// The trimmed line exactly as it was read.
        data: String,
    },
}

impl ClientMessage {
    /// A status message.
    pub fn status(connected: bool) -> Self {
        Self::Status { connected }
    }

    /// A data message.
    pub fn data<S: Into<String>>(data: S) -> Self {
        Self::Data { data: data.into() }
    }

    /// The wire representation.
    pub fn serialize(&self) -> String {
        serde_json::to_string(self).expect("Serialize should work")
    }

    /// An example data message, for user convenience.
    pub fn example_data() -> Self {
        Self::data(r#"{"temperature":21.5,"waterDetected":false}"#)
    }
}

impl Display for ClientMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClientMessage::Status { connected } => write!(f, "status: connected={connected}"),
            ClientMessage::Data { data } => {
                let s = data.chars().take(48).collect::<String>();
                write!(f, "data: {s}")
            }
        }
    }
}
