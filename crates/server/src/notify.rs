//! Real-time push of codes and tokens to connected prompt pages.
//!
//! Delivery is best-effort: the flows never fail because a browser already
//! navigated away. A missing or closed connection is logged and dropped.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::mpsc;

pub trait AuthNotifier: Send + Sync {
    fn push(&self, connection_id: &str, payload: String);
}

/// Registry of live socket connections, keyed by connection id.
#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    connections: Arc<DashMap<String, mpsc::UnboundedSender<String>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, connection_id: &str, sender: mpsc::UnboundedSender<String>) {
        self.connections.insert(connection_id.to_string(), sender);
    }

    pub fn unregister(&self, connection_id: &str) {
        self.connections.remove(connection_id);
    }

    pub fn len(&self) -> usize {
        self.connections.len()
    }

    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }
}

impl AuthNotifier for ConnectionRegistry {
    fn push(&self, connection_id: &str, payload: String) {
        match self.connections.get(connection_id) {
            Some(sender) => {
                if sender.send(payload).is_err() {
                    tracing::debug!(connection_id, "connection closed before push");
                }
            }
            None => {
                tracing::debug!(connection_id, "no live connection for push");
            }
        }
    }
}
