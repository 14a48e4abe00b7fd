/**
 * Pad Wire Protocol
 *
 * Typed frames exchanged with pad clients over the WebSocket. Client frames
 * are decoded by `decode_client_frame`, which unwraps the socket.io style
 * envelopes and dispatches on the `type` discriminator. Server frames are
 * serialized through `ServerFrame::to_json`.
 *
 * Pad frames look like `{"type":"COLLABROOM","data":{"type":"<subtype>",...}}`.
 * `CLIENT_VARS` and `CHANGESET_REQ` replies travel at the top level, and
 * disconnect notices are bare `{"disconnect":"<reason>"}` objects.
 */
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::shared::apool::PoolJson;
use crate::shared::error::SharedError;

// ========== Client → server ==========

/// Color a client asks for: a palette index or a `#rrggbb` string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorId {
    Index(usize),
    Hex(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_id: Option<ColorId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReady {
    pub pad_id: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub user_info: UserInfo,
    #[serde(default)]
    pub reconnect: Option<bool>,
    #[serde(default, rename = "client_rev")]
    pub client_rev: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserChanges {
    pub base_rev: i64,
    pub changeset: String,
    #[serde(default)]
    pub apool: PoolJson,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessageIn {
    pub text: String,
    #[serde(default)]
    pub time: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetRequest {
    pub start: i64,
    pub granularity: i64,
    #[serde(rename = "requestID")]
    pub request_id: Value,
}

/// Subtypes carried inside a client `COLLABROOM` frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CollabRoomMessage {
    #[serde(rename = "USER_CHANGES")]
    UserChanges(UserChanges),
    #[serde(rename = "USERINFO_UPDATE", rename_all = "camelCase")]
    UserInfoUpdate { user_info: UserInfo },
    #[serde(rename = "CHAT_MESSAGE")]
    ChatMessage { message: ChatMessageIn },
    #[serde(rename = "GET_CHAT_MESSAGES")]
    GetChatMessages { start: i64, end: i64 },
    #[serde(rename = "SAVE_REVISION")]
    SaveRevision,
    #[serde(rename = "PAD_DELETE", rename_all = "camelCase")]
    PadDelete { pad_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "CLIENT_READY")]
    ClientReady(ClientReady),
    #[serde(rename = "COLLABROOM")]
    CollabRoom { data: CollabRoomMessage },
    #[serde(rename = "CHANGESET_REQ")]
    ChangesetReq { data: ChangesetRequest },
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserInfoUpdateBody {
    #[serde(default)]
    user_info: UserInfo,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    message: ChatMessageIn,
}

#[derive(Deserialize)]
struct ChatRangeBody {
    start: i64,
    end: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PadDeleteBody {
    pad_id: String,
}

fn type_of(value: &Value) -> Result<&str, SharedError> {
    value
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| SharedError::message("frame has no type"))
}

fn field<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, SharedError> {
    serde_json::from_value(value).map_err(SharedError::from)
}

/// Strips `{"event":"message","data":{...}}` and `["message", {...}]` wrappers.
fn unwrap_envelope(value: Value) -> Value {
    match value {
        Value::Array(mut items) if items.len() == 2 && items[0].is_string() => items.swap_remove(1),
        Value::Object(mut map) if map.contains_key("event") && map.get("type").is_none() => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn decode_collab_room(data: Value) -> Result<Option<CollabRoomMessage>, SharedError> {
    let kind = type_of(&data)?.to_string();
    let message = match kind.as_str() {
        "USER_CHANGES" => CollabRoomMessage::UserChanges(field(data)?),
        "USERINFO_UPDATE" => {
            let body: UserInfoUpdateBody = field(data)?;
            CollabRoomMessage::UserInfoUpdate {
                user_info: body.user_info,
            }
        }
        "CHAT_MESSAGE" => {
            let body: ChatMessageBody = field(data)?;
            CollabRoomMessage::ChatMessage { message: body.message }
        }
        "GET_CHAT_MESSAGES" => {
            let body: ChatRangeBody = field(data)?;
            CollabRoomMessage::GetChatMessages {
                start: body.start,
                end: body.end,
            }
        }
        "SAVE_REVISION" => CollabRoomMessage::SaveRevision,
        "PAD_DELETE" => {
            let body: PadDeleteBody = field(data)?;
            CollabRoomMessage::PadDelete { pad_id: body.pad_id }
        }
        _ => return Ok(None),
    };
    Ok(Some(message))
}

/// Decodes one text frame from a pad client.
///
/// Returns `Ok(None)` for a well-formed frame of a type the server does not
/// handle. Malformed JSON, a missing `type`, or a known type with bad fields
/// is an error.
pub fn decode_client_frame(text: &str) -> Result<Option<ClientMessage>, SharedError> {
    let value: Value = serde_json::from_str(text)?;
    let mut value = unwrap_envelope(value);
    let kind = type_of(&value)?.to_string();
    let message = match kind.as_str() {
        "CLIENT_READY" => {
            let ready: ClientReady = field(value)?;
            if ready.pad_id.is_empty() {
                return Err(SharedError::validation("padId", "must not be empty"));
            }
            ClientMessage::ClientReady(ready)
        }
        "COLLABROOM" => {
            let data = value
                .get_mut("data")
                .map(Value::take)
                .ok_or_else(|| SharedError::message("COLLABROOM frame has no data"))?;
            match decode_collab_room(data)? {
                Some(data) => ClientMessage::CollabRoom { data },
                None => return Ok(None),
            }
        }
        "CHANGESET_REQ" => {
            let data = value
                .get_mut("data")
                .map(Value::take)
                .ok_or_else(|| SharedError::message("CHANGESET_REQ frame has no data"))?;
            ClientMessage::ChangesetReq { data: field(data)? }
        }
        _ => return Ok(None),
    };
    Ok(Some(message))
}

// ========== Server → client ==========

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserNewInfo {
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub color_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeaveInfo {
    pub user_id: String,
    pub color_id: String,
}

/// One stored chat line as clients see it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessageOut {
    pub text: String,
    pub time: i64,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewChanges {
    pub new_rev: i64,
    pub changeset: String,
    pub apool: PoolJson,
    pub author: Option<String>,
    pub current_time: i64,
    pub time_delta: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientReconnect {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head_rev: Option<i64>,
    pub new_rev: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub changeset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apool: Option<PoolJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_time: Option<i64>,
    #[serde(skip_serializing_if = "std::ops::Not::not", default)]
    pub no_changes: bool,
}

/// A revision bookmarked by a user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedRevision {
    pub rev_num: i64,
    pub saved_by: String,
    pub label: String,
    pub id: String,
    pub timestamp: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type")]
pub enum CollabRoomOut {
    #[serde(rename = "ACCEPT_COMMIT", rename_all = "camelCase")]
    AcceptCommit { new_rev: i64 },
    #[serde(rename = "NEW_CHANGES")]
    NewChanges(NewChanges),
    #[serde(rename = "USER_NEWINFO", rename_all = "camelCase")]
    UserNewInfo { user_info: UserNewInfo },
    #[serde(rename = "USER_LEAVE", rename_all = "camelCase")]
    UserLeave { user_info: UserLeaveInfo },
    #[serde(rename = "CHAT_MESSAGE")]
    ChatMessage(ChatMessageOut),
    #[serde(rename = "CHAT_MESSAGES")]
    ChatMessages { messages: Vec<ChatMessageOut> },
    #[serde(rename = "CLIENT_RECONNECT")]
    ClientReconnect(ClientReconnect),
    #[serde(rename = "NEW_SAVEDREV", rename_all = "camelCase")]
    NewSavedRev { saved_revisions: Vec<SavedRevision> },
    #[serde(rename = "SHOW_ERROR", rename_all = "camelCase")]
    ShowError { message_id: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialAttributedText {
    pub text: String,
    pub attribs: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoricalAuthor {
    pub name: Option<String>,
    pub color_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollabClientVars {
    pub initial_attributed_text: InitialAttributedText,
    pub client_ip: String,
    pub pad_id: String,
    pub historical_author_data: BTreeMap<String, HistoricalAuthor>,
    pub apool: PoolJson,
    pub rev: i64,
    pub time: i64,
}

/// A trailing revision shipped with CLIENT_VARS, expressed in the same
/// wire pool as the initial text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitialChangeset {
    pub rev: i64,
    pub changeset: String,
    pub author: Option<String>,
    pub time: i64,
}

/// Options forwarded to the editor untouched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PadOptions {
    pub no_colors: bool,
    pub show_controls: bool,
    pub show_chat: bool,
    pub show_line_numbers: bool,
    pub use_monospace_font: bool,
    pub user_name: Option<String>,
    pub user_color: Option<String>,
    pub rtl: bool,
    pub always_show_chat: bool,
    pub chat_and_users: bool,
    pub lang: Option<String>,
}

impl Default for PadOptions {
    fn default() -> Self {
        Self {
            no_colors: false,
            show_controls: true,
            show_chat: true,
            show_line_numbers: true,
            use_monospace_font: false,
            user_name: None,
            user_color: None,
            rtl: false,
            always_show_chat: false,
            chat_and_users: false,
            lang: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientVars {
    #[serde(rename = "collab_client_vars")]
    pub collab_client_vars: CollabClientVars,
    pub color_palette: Vec<String>,
    pub client_ip: String,
    pub user_color: String,
    pub user_name: Option<String>,
    pub user_id: String,
    pub pad_id: String,
    pub read_only_id: String,
    pub read_only: bool,
    pub server_timestamp: i64,
    pub initial_revision_list: Vec<String>,
    pub initial_changesets: Vec<InitialChangeset>,
    pub saved_revisions: Vec<SavedRevision>,
    pub chat_head: i64,
    pub num_connected_users: usize,
    pub pad_options: PadOptions,
    pub session_refresh_interval: u64,
    pub automatic_reconnection_timeout: u64,
    pub initial_title: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetInfo {
    pub forwards_changesets: Vec<String>,
    pub backwards_changesets: Vec<String>,
    pub apool: PoolJson,
    pub actual_end_num: i64,
    pub time_deltas: Vec<i64>,
    pub start: i64,
    pub granularity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangesetResponse {
    #[serde(rename = "requestID")]
    pub request_id: Value,
    pub data: ChangesetInfo,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisconnectReason {
    Userdup,
    Deleted,
    RateLimited,
    BadChangeset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data")]
pub enum ServerMessage {
    #[serde(rename = "COLLABROOM")]
    CollabRoom(CollabRoomOut),
    #[serde(rename = "CLIENT_VARS")]
    ClientVars(Box<ClientVars>),
    #[serde(rename = "CHANGESET_REQ")]
    ChangesetReq(ChangesetResponse),
}

/// Everything the server writes to a pad socket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ServerFrame {
    Message(ServerMessage),
    Disconnect { disconnect: DisconnectReason },
    AccessStatus {
        #[serde(rename = "accessStatus")]
        access_status: String,
    },
}

impl ServerFrame {
    pub fn collab(out: CollabRoomOut) -> Self {
        Self::Message(ServerMessage::CollabRoom(out))
    }

    pub fn disconnect(reason: DisconnectReason) -> Self {
        Self::Disconnect { disconnect: reason }
    }

    pub fn deny() -> Self {
        Self::AccessStatus {
            access_status: "deny".to_string(),
        }
    }

    pub fn to_json(&self) -> Result<String, SharedError> {
        serde_json::to_string(self).map_err(SharedError::from)
    }
}

impl From<ServerMessage> for ServerFrame {
    fn from(message: ServerMessage) -> Self {
        Self::Message(message)
    }
}
