//! KeyQueue: storage for in-flight reply correlations.
//!
//! A plain `RwLock`-guarded map rather than an actor — access here is
//! ephemeral and touched by both the requesting task and the
//! responder-handling task, so a dedicated lock is simpler than
//! threading every access through a hub's command channel.
//!
//! The stored sink is an `UnboundedSender<Event>` rather than a
//! one-shot: `get` must hand back a usable sink without removing the
//! entry (that's `delete`'s job), and a one-shot `Sender` can't be
//! inspected without being consumed. An unbounded sender is `Clone`
//! and its `send` takes `&self`, so `set` inserts, `get` peeks, and
//! `delete` idempotently removes.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

use crate::protocol::Event;

pub type ReplySink = mpsc::UnboundedSender<Event>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateKey(pub String);

#[derive(Clone, Default)]
pub struct KeyQueue {
    awaits: Arc<RwLock<HashMap<String, ReplySink>>>,
}

impl KeyQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Correlation key: event id concatenated with the requester's name.
    pub fn key(event_id: &str, client_name: &str) -> String {
        format!("{event_id}{client_name}")
    }

    pub async fn set(&self, key: String, sink: ReplySink) -> Result<(), DuplicateKey> {
        let mut awaits = self.awaits.write().await;
        if awaits.contains_key(&key) {
            return Err(DuplicateKey(key));
        }
        awaits.insert(key, sink);
        Ok(())
    }

    pub async fn get(&self, key: &str) -> Option<ReplySink> {
        self.awaits.read().await.get(key).cloned()
    }

    pub async fn delete(&self, key: &str) {
        self.awaits.write().await.remove(key);
    }
}
