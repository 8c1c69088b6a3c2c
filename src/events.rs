//! Event layer: decodes the closed action set and dispatches each to its
//! handler. Pure function of `(Client, Event)` plus whatever the client's
//! hub/cluster handles expose — no state lives here except the
//! [`KeyQueue`] passed in for the reply-request/response pair.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::warn;

use crate::client::Client;
use crate::error::RelayError;
use crate::hub::spawn_hub;
use crate::key_queue::KeyQueue;
use crate::protocol::{Action, Event, NamePayload};

/// How long a `EVENT_CLIENT_REPLY_REQUEST` waits for a matching response
/// before the requester is told the addressee did not respond.
pub const REPLY_DEADLINE: Duration = Duration::from_secs(5);

/// Decode and route one inbound event. Unknown actions are ignored, same
/// as outbound-only notifications arriving on the inbound path (nothing
/// ever legitimately sends those inbound, but a client could).
pub async fn dispatch(client: &Arc<Client>, key_queue: &KeyQueue, event: Event) {
    match event.action {
        Action::NewHubRequest => handle_new_hub_request(client, event).await,
        Action::HubConnect => handle_hub_connect(client, event).await,
        Action::GetHubs => handle_get_hubs(client, event).await,
        Action::GetClients => handle_get_clients(client, event).await,
        Action::OfferConnection | Action::AnswerConnection | Action::CandidateConnection => {
            handle_direct_relay(client, event).await
        }
        Action::ClientReplyRequest => handle_reply_request(client, key_queue, event).await,
        Action::ClientReplyResponse => handle_reply_response(client, key_queue, event).await,
        Action::NewHubCreated
        | Action::HubRemoved
        | Action::ClientConnected
        | Action::ClientRemoved
        | Action::Error
        | Action::Confirm
        | Action::Unknown => {}
    }
}

async fn handle_new_hub_request(client: &Arc<Client>, event: Event) {
    let Some(payload) = event.decode_payload::<NamePayload>() else {
        warn!(client = %client.name, action = "EVENT_NEW_HUB_REQUEST", "malformed payload");
        return;
    };

    if client.cluster.get(&payload.name).await.is_some() {
        let err = RelayError::HubAlreadyExists(payload.name);
        client.send_event(&Event::error(event.id, client.name.clone(), err.info())).await;
        return;
    }

    let new_hub = spawn_hub(payload.name.clone());
    client.cluster.add(new_hub.clone()).await;
    client.attach(new_hub).await;
    client
        .cluster
        .general()
        .emit(&Event::new_hub_created(payload.name))
        .await;
    client.send_event(&Event::confirm(event.id, client.name.clone())).await;
}

async fn handle_hub_connect(client: &Arc<Client>, event: Event) {
    let Some(payload) = event.decode_payload::<NamePayload>() else {
        warn!(client = %client.name, action = "EVENT_HUB_CONNECT", "malformed payload");
        return;
    };

    let Some(hub) = client.cluster.get(&payload.name).await else {
        let err = RelayError::HubNotFound(payload.name);
        client.send_event(&Event::error(event.id, client.name.clone(), err.info())).await;
        return;
    };

    client.attach(hub.clone()).await;
    hub.emit(&Event::client_connected(client.name.clone())).await;
    client.send_event(&Event::confirm(event.id, client.name.clone())).await;
}

async fn handle_get_hubs(client: &Arc<Client>, event: Event) {
    let hubs = client.cluster.all().await;
    client
        .send_event(&Event::get_hubs(event.id, client.name.clone(), hubs))
        .await;
}

async fn handle_get_clients(client: &Arc<Client>, event: Event) {
    let hub = client.current_hub().await;
    let clients = hub.all().await;
    client
        .send_event(&Event::get_clients(event.id, client.name.clone(), clients))
        .await;
}

/// Offer/answer/candidate: resolve `event.to` in the sender's current hub
/// and forward the whole envelope unchanged.
async fn handle_direct_relay(client: &Arc<Client>, event: Event) {
    let Some(to) = event.to.clone() else { return };
    let hub = client.current_hub().await;
    let Some(addressee) = hub.get(&to).await else {
        let err = RelayError::ClientNotFound(to);
        client.send_event(&Event::error(event.id, client.name.clone(), err.info())).await;
        return;
    };
    if let Some(data) = event.to_json() {
        addressee.send(data).await;
    }
}

async fn handle_reply_request(client: &Arc<Client>, key_queue: &KeyQueue, event: Event) {
    let Some(to) = event.to.clone() else { return };
    let hub = client.current_hub().await;
    let Some(addressee) = hub.get(&to).await else {
        let err = RelayError::ClientNotFound(to);
        client.send_event(&Event::error(event.id, client.name.clone(), err.info())).await;
        return;
    };

    let key = KeyQueue::key(&event.id, &client.name);
    let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
    if key_queue.set(key.clone(), reply_tx).await.is_err() {
        // The same requester reused an id that's already in flight. Not
        // Not specified; drop it rather than clobber the pending wait.
        warn!(client = %client.name, id = %event.id, "duplicate reply-request id");
        return;
    }

    let Some(data) = event.to_json() else {
        key_queue.delete(&key).await;
        return;
    };
    addressee.send(data).await;

    let outcome = tokio::time::timeout(REPLY_DEADLINE, reply_rx.recv()).await;
    key_queue.delete(&key).await;

    match outcome {
        Ok(Some(response)) => client.send_event(&response).await,
        Ok(None) | Err(_) => {
            let err = RelayError::ClientDidNotRespond(to);
            client.send_event(&Event::error(event.id, client.name.clone(), err.info())).await;
        }
    }
}

/// `event` here is the `EVENT_CLIENT_REPLY_RESPONSE` itself, sent by the
/// peer that was asked to reply. `event.to` names the original requester.
async fn handle_reply_response(client: &Arc<Client>, key_queue: &KeyQueue, event: Event) {
    let Some(to) = event.to.clone() else { return };
    let key = KeyQueue::key(&event.id, &to);

    match key_queue.get(&key).await {
        Some(sink) => {
            // A send error just means the requester already timed out and
            // dropped its receiver; §9's open question (ii) says this
            // EVENT_CONFIRM still goes out regardless, for wire compatibility.
            let _ = sink.send(event.clone());
            client
                .send_event(&Event::confirm(event.id.clone(), client.name.clone()))
                .await;
        }
        None => {
            let err = RelayError::ClientNotWaiting;
            client.send_event(&Event::error(event.id, client.name.clone(), err.info())).await;
        }
    }
}
