//! Connection hub: the production `Dispatcher`

use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use uuid::Uuid;

use crate::game::Dispatcher;
use crate::ws::protocol::ServerMsg;

/// Per-connection direct queue depth
const DIRECT_QUEUE_CAPACITY: usize = 32;
/// Fan-out buffer; slow readers skip ahead
const BROADCAST_CAPACITY: usize = 64;

/// Tracks open connections and delivers server messages to them
pub struct ConnectionHub {
    direct: DashMap<Uuid, mpsc::Sender<ServerMsg>>,
    fanout: broadcast::Sender<ServerMsg>,
}

/// Receiving ends handed to a connection's writer task
pub struct ConnectionChannels {
    pub direct_rx: mpsc::Receiver<ServerMsg>,
    pub fanout_rx: broadcast::Receiver<ServerMsg>,
}

impl ConnectionHub {
    pub fn new() -> Self {
        let (fanout, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            direct: DashMap::new(),
            fanout,
        }
    }

    /// Open channels for a new connection
    pub fn register(&self, id: Uuid) -> ConnectionChannels {
        let (direct_tx, direct_rx) = mpsc::channel(DIRECT_QUEUE_CAPACITY);
        self.direct.insert(id, direct_tx);
        ConnectionChannels {
            direct_rx,
            fanout_rx: self.fanout.subscribe(),
        }
    }

    pub fn unregister(&self, id: &Uuid) {
        self.direct.remove(id);
    }

    pub fn connection_count(&self) -> usize {
        self.direct.len()
    }
}

impl Default for ConnectionHub {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher for ConnectionHub {
    fn emit(&self, to: Uuid, msg: ServerMsg) {
        let Some(tx) = self.direct.get(&to) else {
            debug!(connection_id = %to, "Emit to unknown connection dropped");
            return;
        };
        if let Err(e) = tx.try_send(msg) {
            debug!(connection_id = %to, error = %e, "Direct message dropped");
        }
    }

    fn broadcast(&self, msg: ServerMsg) {
        // No receivers is not an error
        let _ = self.fanout.send(msg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn emit_reaches_only_the_target() {
        let hub = ConnectionHub::new();
        let a = Uuid::from_u128(1);
        let b = Uuid::from_u128(2);
        let mut chan_a = hub.register(a);
        let mut chan_b = hub.register(b);

        hub.emit(a, ServerMsg::IdentityAssigned { id: a });

        assert_eq!(
            chan_a.direct_rx.recv().await,
            Some(ServerMsg::IdentityAssigned { id: a })
        );
        assert!(chan_b.direct_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_reaches_everyone() {
        let hub = ConnectionHub::new();
        let mut chan_a = hub.register(Uuid::from_u128(1));
        let mut chan_b = hub.register(Uuid::from_u128(2));
        let msg = ServerMsg::Chat {
            sender: "Alice".to_string(),
            message: "hello".to_string(),
        };

        hub.broadcast(msg.clone());

        assert_eq!(tokio_test::assert_ok!(chan_a.fanout_rx.recv().await), msg);
        assert_eq!(tokio_test::assert_ok!(chan_b.fanout_rx.recv().await), msg);
    }

    #[test]
    fn emit_after_unregister_is_dropped() {
        let hub = ConnectionHub::new();
        let id = Uuid::from_u128(1);
        let _channels = hub.register(id);
        hub.unregister(&id);

        hub.emit(id, ServerMsg::Pong { t: 1 });
        assert_eq!(hub.connection_count(), 0);
    }

    #[test]
    fn full_direct_queue_drops_instead_of_blocking() {
        let hub = ConnectionHub::new();
        let id = Uuid::from_u128(1);
        let mut channels = hub.register(id);

        for t in 0..(DIRECT_QUEUE_CAPACITY as u64 + 10) {
            hub.emit(id, ServerMsg::Pong { t });
        }

        let mut received = 0;
        while channels.direct_rx.try_recv().is_ok() {
            received += 1;
        }
        assert_eq!(received, DIRECT_QUEUE_CAPACITY);
    }
}
