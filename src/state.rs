//! `AppState`: the handles every connection needs to reach the cluster
//! and the reply correlator, plus the shutdown signal. Grounded on
//! `services/server`'s `state.rs` (a small `Clone` struct carried through
//! `axum::Router::with_state`).

use tokio::sync::broadcast;

use crate::cluster::{spawn_cluster, ClusterHandle};
use crate::key_queue::KeyQueue;

/// Capacity of the shutdown broadcast channel. One value is ever sent;
/// the capacity only needs to be non-zero.
const SHUTDOWN_CHANNEL_CAPACITY: usize = 1;

#[derive(Clone)]
pub struct AppState {
    pub cluster: ClusterHandle,
    pub key_queue: KeyQueue,
    pub shutdown: broadcast::Sender<()>,
}

impl AppState {
    pub fn new() -> Self {
        let (shutdown, _) = broadcast::channel(SHUTDOWN_CHANNEL_CAPACITY);
        Self {
            cluster: spawn_cluster(),
            key_queue: KeyQueue::new(),
            shutdown,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
