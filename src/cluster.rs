//! Cluster: the top-level registry of hubs, serialized the same way a
//! `Hub` serializes its members — one actor owning a `HashMap`, talked
//! to only through a command channel.
//!
//! The general hub is created synchronously as part of `spawn_cluster`,
//! before the cluster's own run loop starts accepting commands, so it
//! is always present by the time any client can reach the cluster.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};

use crate::hub::{spawn_hub, HubHandle, GENERAL_HUB_ID};
use crate::protocol::Event;

const COMMAND_CHANNEL_CAPACITY: usize = 1;

pub enum ClusterCommand {
    Add {
        hub: HubHandle,
    },
    Get {
        id: String,
        reply: oneshot::Sender<Option<HubHandle>>,
    },
    Remove {
        id: String,
    },
    All {
        reply: oneshot::Sender<Vec<String>>,
    },
    /// Locate the hub by id and broadcast `event` to its members. A
    /// hub the cluster doesn't hold is a no-op — there is nobody to
    /// deliver to.
    Emit {
        id: String,
        event: Event,
    },
    Die,
}

#[derive(Clone)]
pub struct ClusterHandle {
    tx: mpsc::Sender<ClusterCommand>,
    general: HubHandle,
}

impl ClusterHandle {
    /// The immortal, always-present hub every client joins on connect.
    pub fn general(&self) -> HubHandle {
        self.general.clone()
    }

    async fn dispatch(&self, command: ClusterCommand) {
        let _ = self.tx.send(command).await;
    }

    pub async fn add(&self, hub: HubHandle) {
        self.dispatch(ClusterCommand::Add { hub }).await;
    }

    pub async fn get(&self, id: &str) -> Option<HubHandle> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(ClusterCommand::Get { id: id.to_owned(), reply }).await;
        rx.await.ok().flatten()
    }

    /// Remove a hub by id and, if it was actually present, broadcast
    /// its removal to the general hub's members. Removing an id the
    /// cluster never held (or the general hub's own id) is a no-op.
    pub async fn remove(&self, id: &str) {
        if id == GENERAL_HUB_ID {
            return;
        }
        let (reply, rx) = oneshot::channel();
        self.dispatch(ClusterCommand::Get { id: id.to_owned(), reply }).await;
        if rx.await.ok().flatten().is_none() {
            return;
        }
        self.dispatch(ClusterCommand::Remove { id: id.to_owned() }).await;
        self.general.emit(&Event::hub_removed(id)).await;
    }

    pub async fn all(&self) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(ClusterCommand::All { reply }).await;
        rx.await.unwrap_or_default()
    }

    /// Locate the hub with `id` and broadcast `event` to it. A thin
    /// cluster-level wrapper over `HubHandle::emit` for callers that
    /// only have a hub's id, not its handle.
    pub async fn emit(&self, id: &str, event: &Event) {
        self.dispatch(ClusterCommand::Emit { id: id.to_owned(), event: event.clone() }).await;
    }

    pub async fn die(&self) {
        self.dispatch(ClusterCommand::Die).await;
    }
}

pub fn spawn_cluster() -> ClusterHandle {
    let general = spawn_hub(GENERAL_HUB_ID);
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let handle = ClusterHandle { tx, general: general.clone() };
    tokio::spawn(run(rx, general));
    handle
}

async fn run(mut rx: mpsc::Receiver<ClusterCommand>, general: HubHandle) {
    let mut hubs: HashMap<String, HubHandle> = HashMap::new();
    hubs.insert(general.id.clone(), general);

    while let Some(command) = rx.recv().await {
        match command {
            ClusterCommand::Add { hub } => {
                hubs.insert(hub.id.clone(), hub);
            }
            ClusterCommand::Get { id, reply } => {
                let _ = reply.send(hubs.get(&id).cloned());
            }
            ClusterCommand::Remove { id } => {
                hubs.remove(&id);
            }
            ClusterCommand::All { reply } => {
                let _ = reply.send(hubs.keys().cloned().collect());
            }
            ClusterCommand::Emit { id, event } => {
                if let Some(hub) = hubs.get(&id) {
                    hub.emit(&event).await;
                }
            }
            ClusterCommand::Die => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn general_hub_exists_at_construction() {
        let cluster = spawn_cluster();
        assert_eq!(cluster.general().id, GENERAL_HUB_ID);
        assert!(cluster.get(GENERAL_HUB_ID).await.is_some());
        assert_eq!(cluster.all().await, vec![GENERAL_HUB_ID.to_owned()]);
    }

    #[tokio::test]
    async fn add_then_get_returns_the_hub() {
        let cluster = spawn_cluster();
        let hub = spawn_hub("r1");
        cluster.add(hub.clone()).await;

        let found = cluster.get("r1").await.expect("r1 should be found");
        assert_eq!(found.id, "r1");
    }

    #[tokio::test]
    async fn get_on_absent_hub_returns_none() {
        let cluster = spawn_cluster();
        assert!(cluster.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn all_lists_general_plus_added_hubs() {
        let cluster = spawn_cluster();
        cluster.add(spawn_hub("r1")).await;
        cluster.add(spawn_hub("r2")).await;

        let mut ids = cluster.all().await;
        ids.sort();
        assert_eq!(ids, vec!["general".to_owned(), "r1".to_owned(), "r2".to_owned()]);
    }

    #[tokio::test]
    async fn remove_drops_the_hub_and_notifies_general() {
        let cluster = spawn_cluster();
        cluster.add(spawn_hub("r1")).await;

        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        cluster
            .general()
            .add(crate::client::ClientHandle { name: "alice".to_owned(), outbound: tx }, None)
            .await;

        cluster.remove("r1").await;

        assert!(cluster.get("r1").await.is_none());
        let data = rx.recv().await.expect("general should see the hub-removed notice");
        let event: Event = serde_json::from_str(&data).unwrap();
        assert_eq!(event.action, crate::protocol::Action::HubRemoved);
    }

    #[tokio::test]
    async fn removing_an_absent_hub_does_not_notify_general() {
        let cluster = spawn_cluster();
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        cluster
            .general()
            .add(crate::client::ClientHandle { name: "alice".to_owned(), outbound: tx }, None)
            .await;

        cluster.remove("ghost").await;
        cluster.general().die().await;

        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn removing_general_is_a_no_op() {
        let cluster = spawn_cluster();
        cluster.remove(GENERAL_HUB_ID).await;
        assert!(cluster.get(GENERAL_HUB_ID).await.is_some());
    }

    #[tokio::test]
    async fn emit_delivers_to_the_named_hubs_members() {
        let cluster = spawn_cluster();
        let hub = spawn_hub("r1");
        let (tx, mut rx) = tokio::sync::mpsc::channel(8);
        hub.add(crate::client::ClientHandle { name: "alice".to_owned(), outbound: tx }, None)
            .await;
        cluster.add(hub).await;

        cluster.emit("r1", &Event::new_hub_created("r2")).await;

        let data = rx.recv().await.expect("alice should see the emitted event");
        let event: Event = serde_json::from_str(&data).unwrap();
        assert_eq!(event.action, crate::protocol::Action::NewHubCreated);
    }

    #[tokio::test]
    async fn emit_to_an_absent_hub_is_a_no_op() {
        let cluster = spawn_cluster();
        cluster.emit("ghost", &Event::new_hub_created("r2")).await;
        // No observable effect; just confirm the cluster actor survives it.
        assert!(cluster.get(GENERAL_HUB_ID).await.is_some());
    }
}
