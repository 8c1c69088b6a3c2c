//! Client: the per-connection actor.
//!
//! `ClientHandle` is the lightweight, cloneable value a `Hub` stores in
//! its member pool — just enough to address a member (name + outbound
//! sink). `Client` is the richer, `Arc`-shared handle the connection
//! task and event handlers hold: it additionally tracks the client's
//! currently-attached hub and a reference to the cluster, since
//! handling an event needs both.

use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::info;

use crate::cluster::ClusterHandle;
use crate::hub::HubHandle;

/// Outbound buffer depth. A bounded `mpsc::channel` whose producer
/// awaits on send never drops an event; a small buffer just gives a
/// brief write stall some slack before it backs up the sender.
pub const OUTBOUND_BUFFER: usize = 8;

/// What a `Hub` stores for each member: enough to deliver bytes and to
/// match by name. Deliberately thin — the hub pool doesn't need the
/// rest of `Client`'s state.
#[derive(Clone)]
pub struct ClientHandle {
    pub name: String,
    pub outbound: mpsc::Sender<String>,
}

impl ClientHandle {
    /// A full outbound buffer blocks the caller rather than dropping
    /// the event.
    pub async fn send(&self, data: String) {
        let _ = self.outbound.send(data).await;
    }
}

/// The full per-connection actor: name, outbound sink, and the
/// client's current hub + cluster, shared via `Arc` so that concurrently
/// spawned event-dispatch tasks can all see (and move) the same client.
pub struct Client {
    pub name: String,
    outbound: mpsc::Sender<String>,
    current_hub: Mutex<HubHandle>,
    pub cluster: ClusterHandle,
}

impl Client {
    pub fn new(
        name: String,
        outbound: mpsc::Sender<String>,
        initial_hub: HubHandle,
        cluster: ClusterHandle,
    ) -> Arc<Self> {
        info!(client = %name, "client connected");
        Arc::new(Self {
            name,
            outbound,
            current_hub: Mutex::new(initial_hub),
            cluster,
        })
    }

    pub fn handle(&self) -> ClientHandle {
        ClientHandle {
            name: self.name.clone(),
            outbound: self.outbound.clone(),
        }
    }

    pub async fn current_hub(&self) -> HubHandle {
        self.current_hub.lock().await.clone()
    }

    pub async fn send(&self, data: String) {
        let _ = self.outbound.send(data).await;
    }

    /// Serialize `event` and push it on this client's own outbound sink.
    pub async fn send_event(&self, event: &crate::protocol::Event) {
        if let Some(data) = event.to_json() {
            self.send(data).await;
        }
    }

    /// Join `new_hub`, detaching from whatever hub this client is
    /// currently in. The new hub's `add` command carries the previous
    /// hub so the detach (a `remove` enqueued on the old hub) happens
    /// as part of processing `add`, not here.
    ///
    /// A no-op when `new_hub` is the hub the client is already in: were
    /// `add` issued anyway, it would carry `detach_from` equal to
    /// `new_hub` itself, and the hub's `Add` handler enqueues that
    /// detach's `remove` on its own channel before the insert — which
    /// would remove the client it had just re-inserted on the next loop
    /// iteration, orphaning it.
    pub async fn attach(&self, new_hub: HubHandle) {
        let previous = {
            let mut current = self.current_hub.lock().await;
            let previous = current.clone();
            if previous.id == new_hub.id {
                return;
            }
            *current = new_hub.clone();
            previous
        };
        new_hub.add(self.handle(), Some(previous)).await;
    }

    /// First join on connect: no previous hub to detach from.
    pub async fn join_initial(&self, hub: HubHandle) {
        hub.add(self.handle(), None).await;
    }

    /// Enqueues a `remove` on the currently attached hub's channel.
    /// Does not itself destroy an emptied hub — the transport close
    /// path does that after observing `length() == 0`.
    pub async fn die(&self) {
        info!(client = %self.name, "client disconnected");
        let hub = self.current_hub().await;
        hub.remove(&self.name).await;
    }
}
