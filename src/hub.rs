//! The hub tracks connected websocket clients and fans device messages
//! out to all of them.
//!
//! Delivery is best-effort and at-most-once: there is no buffering for
//! clients that join late, and a failed delivery to one client does not
//! affect the others. A client is only removed when its own connection
//! goes away, never because a send failed.

use std::{collections::HashMap, fmt::Display};

use tokio::sync::mpsc;
use tracing::{debug, info_span, trace, warn, Instrument};
use uuid::Uuid;

use crate::messages::ClientMessage;

/// Identifies one connected client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    /// A fresh id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Requests the hub handles, in arrival order.
#[derive(Debug)]
enum HubRequest {
    Join {
        id: ClientId,
        sender: mpsc::UnboundedSender<String>,
    },
    Leave(ClientId),
    Broadcast(ClientMessage),
}

struct Hub {
    requests: mpsc::UnboundedReceiver<HubRequest>,

    /// The clients currently attached.
    /// The hub holds senders only; it never closes a client itself.
    clients: HashMap<ClientId, mpsc::UnboundedSender<String>>,

    /// The last connectivity state we broadcast.
    /// New joiners get this as their initial snapshot.
    device_connected: bool,
}

impl Hub {
    async fn run(&mut self) {
        while let Some(request) = self.requests.recv().await {
            self.handle_request(request);
        }

        debug!("All hub handles dropped, stopping");
    }

    fn handle_request(&mut self, request: HubRequest) {
        match request {
            HubRequest::Join { id, sender } => self.join(id, sender),
            HubRequest::Leave(id) => self.leave(id),
            HubRequest::Broadcast(message) => self.broadcast(message),
        }
    }

    fn join(&mut self, id: ClientId, sender: mpsc::UnboundedSender<String>) {
        debug!(%id, "Client joined");

        // New joiners are not left without a connectivity signal.
        let snapshot = ClientMessage::status(self.device_connected).serialize();
        if sender.send(snapshot).is_err() {
            warn!(%id, "Client went away before its status snapshot");
        }

        self.clients.insert(id, sender);
    }

    fn leave(&mut self, id: ClientId) {
        // Idempotent: leaving twice is fine.
        if self.clients.remove(&id).is_some() {
            debug!(%id, "Client left");
        }
    }

    fn broadcast(&mut self, message: ClientMessage) {
        if let ClientMessage::Status { connected } = &message {
            self.device_connected = *connected;
        }

        // Serialize once, deliver to each client independently.
        let wire = message.serialize();

        trace!(%message, clients = self.clients.len(), "Broadcasting");

        for (id, sender) in &self.clients {
            if sender.send(wire.clone()).is_err() {
                // Isolated: the client's own disconnect notification
                // will remove it via `leave`.
                warn!(%id, "Delivery failed");
            }
        }
    }
}

/// Cheaply cloneable handle to the hub.
#[derive(Debug, Clone)]
pub struct HubHandle {
    requests: mpsc::UnboundedSender<HubRequest>,
}

impl HubHandle {
    /// Spawn the hub and get a handle to it.
    pub fn new() -> Self {
        let (requests_tx, requests_rx) = mpsc::unbounded_channel();

        let mut hub = Hub {
            requests: requests_rx,
            clients: HashMap::new(),
            device_connected: false,
        };

        tokio::spawn(async move { hub.run().await }.instrument(info_span!("Hub")));

        Self {
            requests: requests_tx,
        }
    }

    fn send(&self, request: HubRequest) {
        self.requests
            .send(request)
            .expect("The hub should outlive its handles");
    }

    /// Register a client.
    /// It will immediately be sent a status snapshot.
    pub fn join(&self, id: ClientId, sender: mpsc::UnboundedSender<String>) {
        self.send(HubRequest::Join { id, sender });
    }

    /// Remove a client. Idempotent.
    pub fn leave(&self, id: ClientId) {
        self.send(HubRequest::Leave(id));
    }

    /// Send a message to every currently attached client.
    /// With zero clients this is simply a drop.
    pub fn broadcast(&self, message: ClientMessage) {
        self.send(HubRequest::Broadcast(message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tokio::sync::mpsc::UnboundedReceiver;

    async fn recv(rx: &mut UnboundedReceiver<String>) -> String {
        tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
            .await
            .expect("Should not time out")
            .expect("Sender should be alive")
    }

    fn join_new_client(hub: &HubHandle) -> (ClientId, UnboundedReceiver<String>) {
        let id = ClientId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        hub.join(id, tx);

        (id, rx)
    }

    #[tokio::test]
    async fn join_snapshot_starts_disconnected() {
        let hub = HubHandle::new();
        let (_, mut rx) = join_new_client(&hub);

        assert_eq!(recv(&mut rx).await, r#"{"type":"status","connected":false}"#);
    }

    #[tokio::test]
    async fn late_joiner_sees_current_status() {
        let hub = HubHandle::new();
        hub.broadcast(ClientMessage::status(true));

        let (_, mut rx) = join_new_client(&hub);

        assert_eq!(recv(&mut rx).await, r#"{"type":"status","connected":true}"#);
    }

    #[tokio::test]
    async fn snapshot_precedes_data() {
        let hub = HubHandle::new();
        hub.broadcast(ClientMessage::status(true));

        let (_, mut rx) = join_new_client(&hub);
        hub.broadcast(ClientMessage::data("{}"));

        assert_eq!(recv(&mut rx).await, r#"{"type":"status","connected":true}"#);
        assert_eq!(recv(&mut rx).await, r#"{"type":"data","data":"{}"}"#);
    }

    #[tokio::test]
    async fn broadcast_reaches_all_clients() {
        let hub = HubHandle::new();
        let (_, mut rx_a) = join_new_client(&hub);
        let (_, mut rx_b) = join_new_client(&hub);

        hub.broadcast(ClientMessage::data(r#"{"n":1}"#));

        // Skip the snapshots.
        recv(&mut rx_a).await;
        recv(&mut rx_b).await;

        assert_eq!(recv(&mut rx_a).await, r#"{"type":"data","data":"{\"n\":1}"}"#);
        assert_eq!(recv(&mut rx_b).await, r#"{"type":"data","data":"{\"n\":1}"}"#);
    }

    #[tokio::test]
    async fn failed_delivery_is_isolated() {
        let hub = HubHandle::new();

        let (_, rx_dead) = join_new_client(&hub);
        let (_, mut rx_alive) = join_new_client(&hub);

        recv(&mut rx_alive).await;

        // Client A's receiving end goes away without a leave.
        drop(rx_dead);

        hub.broadcast(ClientMessage::data("{}"));

        // Client B still gets the message.
        assert_eq!(recv(&mut rx_alive).await, r#"{"type":"data","data":"{}"}"#);
    }

    #[tokio::test]
    async fn leave_is_idempotent() {
        let hub = HubHandle::new();
        let (id, mut rx) = join_new_client(&hub);

        recv(&mut rx).await;

        hub.leave(id);
        hub.leave(id);

        hub.broadcast(ClientMessage::data("{}"));

        // The sender side is gone once the hub processed the leave.
        assert_eq!(
            tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv())
                .await
                .expect("Should not time out"),
            None
        );
    }
}
