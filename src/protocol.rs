//! Wire protocol: the event envelope, action tags, and payload shapes.
//!
//! The envelope's payload is kept as a raw `serde_json::Value` rather
//! than folded into the action tag itself — each handler decodes its
//! own payload shape on demand instead of the whole enum carrying
//! every variant's fields.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// `to` sentinel meaning "broadcast to every member of the hub".
pub const TO_EVERYONE: &str = "*";

const ID_LEN: usize = 12;
const ID_CHARSET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

/// 12 random alphanumeric characters, used for event correlation ids.
pub fn generate_id() -> String {
    let mut rng = rand::thread_rng();
    (0..ID_LEN)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    #[serde(rename = "EVENT_NEW_HUB_REQUEST")]
    NewHubRequest,
    #[serde(rename = "EVENT_NEW_HUB_CREATED")]
    NewHubCreated,
    #[serde(rename = "EVENT_HUB_CONNECT")]
    HubConnect,
    #[serde(rename = "EVENT_HUB_REMOVED")]
    HubRemoved,
    #[serde(rename = "EVENT_GET_HUBS")]
    GetHubs,
    #[serde(rename = "EVENT_GET_CLIENTS")]
    GetClients,
    #[serde(rename = "EVENT_CLIENT_CONNECTED")]
    ClientConnected,
    #[serde(rename = "EVENT_CLIENT_REMOVED")]
    ClientRemoved,
    #[serde(rename = "EVENT_OFFER_CONNECTION")]
    OfferConnection,
    #[serde(rename = "EVENT_ANSWER_CONNECTION")]
    AnswerConnection,
    #[serde(rename = "EVENT_CANDIDATE_CONNECTION")]
    CandidateConnection,
    #[serde(rename = "EVENT_CLIENT_REPLY_REQUEST")]
    ClientReplyRequest,
    #[serde(rename = "EVENT_CLIENT_REPLY_RESPONSE")]
    ClientReplyResponse,
    #[serde(rename = "EVENT_ERROR")]
    Error,
    #[serde(rename = "EVENT_CONFIRM")]
    Confirm,
    /// Anything not in the closed set above. Dispatch silently ignores it.
    #[serde(other)]
    Unknown,
}

/// The envelope every inbound/outbound frame is wrapped in.
///
/// `to` is omitted from the wire when absent, and so is `payload`.
/// Both directions (inbound actions and outbound notifications) share
/// this one envelope shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl Event {
    pub fn new(id: impl Into<String>, action: Action, to: Option<String>, payload: impl Serialize) -> Self {
        Self {
            id: id.into(),
            action,
            to,
            payload: serde_json::to_value(payload).ok(),
        }
    }

    /// Decode this event's payload as `T`, discarding it if malformed.
    pub fn decode_payload<T: for<'de> Deserialize<'de>>(&self) -> Option<T> {
        self.payload
            .clone()
            .and_then(|v| serde_json::from_value(v).ok())
    }

    pub fn confirm(original_id: impl Into<String>, to: impl Into<String>) -> Self {
        Self::new(original_id, Action::Confirm, Some(to.into()), ConfirmPayload { success: true })
    }

    pub fn error(original_id: impl Into<String>, to: impl Into<String>, info: impl Into<String>) -> Self {
        Self::new(
            original_id,
            Action::Error,
            Some(to.into()),
            ErrorPayload { info: info.into() },
        )
    }

    pub fn new_hub_created(name: impl Into<String>) -> Self {
        Self::new(
            generate_id(),
            Action::NewHubCreated,
            Some(TO_EVERYONE.to_owned()),
            NamePayload { name: name.into() },
        )
    }

    pub fn hub_removed(name: impl Into<String>) -> Self {
        Self::new(
            generate_id(),
            Action::HubRemoved,
            Some(TO_EVERYONE.to_owned()),
            NamePayload { name: name.into() },
        )
    }

    pub fn client_connected(name: impl Into<String>) -> Self {
        Self::new(
            generate_id(),
            Action::ClientConnected,
            Some(TO_EVERYONE.to_owned()),
            NamePayload { name: name.into() },
        )
    }

    pub fn client_removed(name: impl Into<String>) -> Self {
        Self::new(
            generate_id(),
            Action::ClientRemoved,
            Some(TO_EVERYONE.to_owned()),
            NamePayload { name: name.into() },
        )
    }

    pub fn get_hubs(original_id: impl Into<String>, to: impl Into<String>, hubs: Vec<String>) -> Self {
        Self::new(original_id, Action::GetHubs, Some(to.into()), HubsPayload { hubs })
    }

    pub fn get_clients(original_id: impl Into<String>, to: impl Into<String>, clients: Vec<String>) -> Self {
        Self::new(
            original_id,
            Action::GetClients,
            Some(to.into()),
            ClientsPayload { clients },
        )
    }

    /// Serialize to the JSON text carried over the wire.
    pub fn to_json(&self) -> Option<String> {
        serde_json::to_string(self).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamePayload {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HubsPayload {
    pub hubs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientsPayload {
    pub clients: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub info: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfirmPayload {
    pub success: bool,
}
