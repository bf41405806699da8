//! Connected-client registry
//!
//! Each client is represented by the sending half of a bounded outbound
//! queue; a per-connection writer task drains the other half onto the
//! socket. Membership changes only on register/unregister.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Opaque client identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sending side of one client's outbound queue
#[derive(Debug, Clone)]
pub struct ClientHandle {
    id: ClientId,
    tx: mpsc::Sender<Arc<str>>,
}

impl ClientHandle {
    pub fn id(&self) -> ClientId {
        self.id
    }

    pub fn sender(&self) -> &mpsc::Sender<Arc<str>> {
        &self.tx
    }
}

/// Set of live clients
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientHandle>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a client with a queue of `capacity` messages
    pub fn register(&self, capacity: usize) -> (ClientHandle, mpsc::Receiver<Arc<str>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = ClientHandle {
            id: ClientId::new(),
            tx,
        };
        self.clients.write().insert(handle.id, handle.clone());
        (handle, rx)
    }

    /// Remove a client. Returns false if it was already gone.
    pub fn unregister(&self, id: ClientId) -> bool {
        self.clients.write().remove(&id).is_some()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.read().contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }

    /// Copy of the current membership; the lock is released on return.
    pub fn handles(&self) -> Vec<ClientHandle> {
        self.clients.read().values().cloned().collect()
    }
}
