use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

/// Identity of one connected session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClientId(u64);

impl std::fmt::Display for ClientId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Outbound half of a session. The connection task drains the receiver and
/// writes each string as one text frame.
pub type FrameSender = mpsc::UnboundedSender<String>;

/// The set of currently connected output sessions.
///
/// Sends never block: each session has an unbounded queue, so a slow or dead
/// client cannot hold up delivery to the others or stall the clock.
pub struct ClientRegistry {
    next_id: AtomicU64,
    sessions: Mutex<BTreeMap<ClientId, FrameSender>>,
}

impl Default for ClientRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            sessions: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn add(&self, sender: FrameSender) -> ClientId {
        let id = ClientId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.sessions.lock().insert(id, sender);
        log::info!("Client {id} connected ({} total)", self.len());
        id
    }

    /// Remove a session. Unknown ids are ignored, so repeated disconnect
    /// signals are harmless.
    pub fn remove(&self, id: ClientId) {
        if self.sessions.lock().remove(&id).is_some() {
            log::info!("Client {id} disconnected ({} total)", self.len());
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Send `frame` to every registered session. Closed sessions are skipped
    /// but stay registered until their connection task removes them.
    pub fn broadcast(&self, frame: &str) {
        let snapshot: Vec<(ClientId, FrameSender)> = self
            .sessions
            .lock()
            .iter()
            .map(|(id, tx)| (*id, tx.clone()))
            .collect();

        for (id, tx) in snapshot {
            if tx.is_closed() {
                continue;
            }
            if tx.send(frame.to_string()).is_err() {
                log::debug!("Dropped frame for closed client {id}");
            }
        }
    }

    /// Send `frame` to one session. Returns false if it is gone.
    pub fn send_to(&self, id: ClientId, frame: &str) -> bool {
        let tx = self.sessions.lock().get(&id).cloned();
        match tx {
            Some(tx) => tx.send(frame.to_string()).is_ok(),
            None => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            out.push(msg);
        }
        out
    }

    #[test]
    fn broadcast_reaches_every_session() {
        let registry = ClientRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        registry.add(tx1);
        registry.add(tx2);

        registry.broadcast("dataUpdated");
        assert_eq!(drain(&mut rx1), vec!["dataUpdated"]);
        assert_eq!(drain(&mut rx2), vec!["dataUpdated"]);
    }

    #[test]
    fn closed_session_does_not_block_others() {
        let registry = ClientRegistry::new();
        let (tx_dead, rx_dead) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        registry.add(tx_dead);
        registry.add(tx_live);
        drop(rx_dead);

        registry.broadcast("stop");
        assert_eq!(drain(&mut rx_live), vec!["stop"]);
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ClientRegistry::new();
        let (tx, _rx) = mpsc::unbounded_channel();
        let id = registry.add(tx);
        registry.remove(id);
        registry.remove(id);
        assert!(registry.is_empty());
    }

    #[test]
    fn send_to_targets_one_session() {
        let registry = ClientRegistry::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        let first = registry.add(tx1);
        registry.add(tx2);

        assert!(registry.send_to(first, "projectList"));
        assert_eq!(drain(&mut rx1), vec!["projectList"]);
        assert!(drain(&mut rx2).is_empty());

        registry.remove(first);
        assert!(!registry.send_to(first, "projectList"));
    }
    #[test]
    fn broadcast_tolerates_concurrent_disconnects() {
        let registry = ClientRegistry::new();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        registry.add(tx_live);

        std::thread::scope(|scope| {
            scope.spawn(|| {
                for _ in 0..500 {
                    let (tx, rx) = mpsc::unbounded_channel();
                    let id = registry.add(tx);
                    drop(rx);
                    registry.remove(id);
                    registry.remove(id);
                }
            });
            for i in 0..500 {
                registry.broadcast(&format!("time|{i}"));
            }
        });

        let received = drain(&mut rx_live);
        let expected: Vec<String> = (0..500).map(|i| format!("time|{i}")).collect();
        assert_eq!(received, expected);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn session_removed_after_snapshot_is_skipped() {
        let registry = ClientRegistry::new();
        let (tx_gone, rx_gone) = mpsc::unbounded_channel();
        let (tx_live, mut rx_live) = mpsc::unbounded_channel();
        let gone = registry.add(tx_gone);
        registry.add(tx_live);

        // The connection task drops its receiver before deregistering.
        drop(rx_gone);
        registry.broadcast("play|0|a.mp3|hi");
        registry.remove(gone);
        registry.broadcast("stop");

        assert_eq!(drain(&mut rx_live), vec!["play|0|a.mp3|hi", "stop"]);
        assert_eq!(registry.len(), 1);
    }
}
