//! Hub: a named room, serialized by a single command-channel actor.
//! One `tokio::spawn`ed loop owns a `HashMap` of members; every other
//! task talks to it only through commands sent over a channel, never
//! by touching the map directly.

use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot};
use tracing::info;

use crate::client::ClientHandle;
use crate::protocol::Event;

/// The general hub's well-known id. Immortal: nothing ever removes it
/// from the cluster, and the transport close path special-cases it so
/// an empty `general` is never torn down.
pub const GENERAL_HUB_ID: &str = "general";

/// Command-channel capacity. A capacity-1 `mpsc` channel makes every
/// send block until the hub's actor has consumed the previous command,
/// giving a rendezvous handoff rather than a queue that can build up.
const COMMAND_CHANNEL_CAPACITY: usize = 1;

pub enum HubCommand {
    /// Store `client` under its name. If it was already attached to
    /// another hub (`detach_from`), enqueue a `Remove` there first —
    /// attaching to a new hub always detaches from the old one.
    Add {
        client: ClientHandle,
        detach_from: Option<HubHandle>,
    },
    Get {
        key: String,
        reply: oneshot::Sender<Option<ClientHandle>>,
    },
    Remove {
        key: String,
    },
    All {
        reply: oneshot::Sender<Vec<String>>,
    },
    Length {
        reply: oneshot::Sender<usize>,
    },
    Emit {
        data: String,
    },
    Die,
}

/// A cheap, cloneable reference to a running hub: its id and the
/// sending half of its command channel.
#[derive(Clone)]
pub struct HubHandle {
    pub id: String,
    tx: mpsc::Sender<HubCommand>,
}

impl HubHandle {
    pub fn is_general(&self) -> bool {
        self.id == GENERAL_HUB_ID
    }

    async fn dispatch(&self, command: HubCommand) {
        // The hub only stops accepting commands once it has processed
        // `Die`; a closed channel past that point means the hub is
        // already gone, which every caller treats as a no-op.
        let _ = self.tx.send(command).await;
    }

    pub async fn add(&self, client: ClientHandle, detach_from: Option<HubHandle>) {
        self.dispatch(HubCommand::Add { client, detach_from }).await;
    }

    pub async fn get(&self, key: &str) -> Option<ClientHandle> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(HubCommand::Get { key: key.to_owned(), reply }).await;
        rx.await.ok().flatten()
    }

    pub async fn remove(&self, key: &str) {
        self.dispatch(HubCommand::Remove { key: key.to_owned() }).await;
    }

    pub async fn all(&self) -> Vec<String> {
        let (reply, rx) = oneshot::channel();
        self.dispatch(HubCommand::All { reply }).await;
        rx.await.unwrap_or_default()
    }

    pub async fn length(&self) -> usize {
        let (reply, rx) = oneshot::channel();
        self.dispatch(HubCommand::Length { reply }).await;
        rx.await.unwrap_or(0)
    }

    pub async fn emit(&self, event: &Event) {
        if let Some(data) = event.to_json() {
            self.dispatch(HubCommand::Emit { data }).await;
        }
    }

    pub async fn die(&self) {
        self.dispatch(HubCommand::Die).await;
    }
}

/// Spawn a new hub's run loop and return a handle to it.
pub fn spawn_hub(id: impl Into<String>) -> HubHandle {
    let id = id.into();
    let (tx, rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
    let handle = HubHandle { id: id.clone(), tx };
    tokio::spawn(run(id, rx));
    handle
}

async fn run(id: String, mut rx: mpsc::Receiver<HubCommand>) {
    let mut pool: HashMap<String, ClientHandle> = HashMap::new();
    info!(hub = %id, "hub created");

    while let Some(command) = rx.recv().await {
        match command {
            HubCommand::Add { client, detach_from } => {
                if let Some(prev) = detach_from {
                    prev.remove(&client.name).await;
                }
                pool.insert(client.name.clone(), client);
            }
            HubCommand::Get { key, reply } => {
                let _ = reply.send(pool.get(&key).cloned());
            }
            HubCommand::Remove { key } => {
                if pool.remove(&key).is_some() {
                    let notice = Event::client_removed(key);
                    if let Some(data) = notice.to_json() {
                        for member in pool.values() {
                            member.send(data.clone()).await;
                        }
                    }
                }
            }
            HubCommand::All { reply } => {
                let _ = reply.send(pool.keys().cloned().collect());
            }
            HubCommand::Length { reply } => {
                let _ = reply.send(pool.len());
            }
            HubCommand::Emit { data } => {
                for member in pool.values() {
                    member.send(data.clone()).await;
                }
            }
            HubCommand::Die => break,
        }
    }
    info!(hub = %id, "hub removed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc as tmpsc;

    fn test_client(name: &str) -> (ClientHandle, tmpsc::Receiver<String>) {
        let (tx, rx) = tmpsc::channel(8);
        (ClientHandle { name: name.to_owned(), outbound: tx }, rx)
    }

    #[tokio::test]
    async fn add_then_get_returns_the_client() {
        let hub = spawn_hub("r1");
        let (client, _rx) = test_client("alice");
        hub.add(client, None).await;

        let found = hub.get("alice").await.expect("alice should be found");
        assert_eq!(found.name, "alice");
        assert_eq!(hub.length().await, 1);
    }

    #[tokio::test]
    async fn get_on_absent_client_returns_none() {
        let hub = spawn_hub("r1");
        assert!(hub.get("ghost").await.is_none());
    }

    #[tokio::test]
    async fn remove_broadcasts_client_removed_to_remaining_members() {
        let hub = spawn_hub("r1");
        let (alice, _alice_rx) = test_client("alice");
        let (bob, mut bob_rx) = test_client("bob");
        hub.add(alice, None).await;
        hub.add(bob, None).await;

        hub.remove("alice").await;

        let data = bob_rx.recv().await.expect("bob should see the notice");
        let event: Event = serde_json::from_str(&data).unwrap();
        assert_eq!(event.action, crate::protocol::Action::ClientRemoved);
        assert_eq!(hub.length().await, 1);
    }

    #[tokio::test]
    async fn removing_an_absent_client_does_not_broadcast() {
        let hub = spawn_hub("r1");
        let (bob, mut bob_rx) = test_client("bob");
        hub.add(bob, None).await;

        hub.remove("ghost").await;
        hub.die().await;
        assert!(bob_rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn add_detaches_client_from_previous_hub() {
        let old_hub = spawn_hub("old");
        let new_hub = spawn_hub("new");
        let (client, _rx) = test_client("alice");
        old_hub.add(client.clone(), None).await;
        assert_eq!(old_hub.length().await, 1);

        new_hub.add(client, Some(old_hub.clone())).await;

        assert_eq!(new_hub.length().await, 1);
        assert_eq!(old_hub.length().await, 0);
    }

    #[tokio::test]
    async fn all_lists_member_names() {
        let hub = spawn_hub("r1");
        let (alice, _) = test_client("alice");
        let (bob, _) = test_client("bob");
        hub.add(alice, None).await;
        hub.add(bob, None).await;

        let mut names = hub.all().await;
        names.sort();
        assert_eq!(names, vec!["alice".to_owned(), "bob".to_owned()]);
    }

    #[tokio::test]
    async fn emit_delivers_to_every_member_exactly_once() {
        let hub = spawn_hub("r1");
        let (alice, mut alice_rx) = test_client("alice");
        let (bob, mut bob_rx) = test_client("bob");
        hub.add(alice, None).await;
        hub.add(bob, None).await;

        hub.emit(&Event::new_hub_created("r2")).await;

        assert!(alice_rx.recv().await.is_some());
        assert!(bob_rx.recv().await.is_some());
    }

    #[tokio::test]
    async fn die_stops_the_run_loop() {
        let hub = spawn_hub("r1");
        hub.die().await;
        // Further commands on a dead hub are accepted (send succeeds
        // into a closed channel's buffer or is silently dropped) but
        // never observed — there is no run loop left to answer them.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert_eq!(hub.length().await, 0);
    }
}
