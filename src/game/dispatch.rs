//! Outbound emission seam between the simulation and the transport

use crate::ws::protocol::ServerMsg;

use super::session::ConnectionId;

/// Fire-and-forget delivery of server messages. Implementations must not
/// block; undeliverable messages are dropped.
pub trait Dispatcher: Send + Sync {
    /// Send to one connection
    fn emit(&self, to: ConnectionId, msg: ServerMsg);

    /// Send to every connection
    fn broadcast(&self, msg: ServerMsg);
}

#[cfg(test)]
pub mod testing {
    use std::collections::HashMap;

    use parking_lot::Mutex;
    use uuid::Uuid;

    use super::*;
    use crate::ws::protocol::PlayerSnapshot;

    /// Dispatcher that records everything it is asked to send
    #[derive(Default)]
    pub struct RecordingDispatcher {
        emitted: Mutex<Vec<(ConnectionId, ServerMsg)>>,
        broadcasts: Mutex<Vec<ServerMsg>>,
    }

    impl RecordingDispatcher {
        pub fn emitted(&self) -> Vec<(ConnectionId, ServerMsg)> {
            self.emitted.lock().clone()
        }

        pub fn broadcasts(&self) -> Vec<ServerMsg> {
            self.broadcasts.lock().clone()
        }

        /// Player maps of every broadcast snapshot, oldest first
        pub fn snapshots(&self) -> Vec<(u64, HashMap<Uuid, PlayerSnapshot>)> {
            self.broadcasts
                .lock()
                .iter()
                .filter_map(|msg| match msg {
                    ServerMsg::Snapshot { tick, players } => Some((*tick, players.clone())),
                    _ => None,
                })
                .collect()
        }

        pub fn clear(&self) {
            self.emitted.lock().clear();
            self.broadcasts.lock().clear();
        }
    }

    impl Dispatcher for RecordingDispatcher {
        fn emit(&self, to: ConnectionId, msg: ServerMsg) {
            self.emitted.lock().push((to, msg));
        }

        fn broadcast(&self, msg: ServerMsg) {
            self.broadcasts.lock().push(msg);
        }
    }
}
