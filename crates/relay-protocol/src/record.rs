//! Record types for relay communication.

use relay_core::DisplayName;
use serde::{Deserialize, Serialize};

/// Sent to a client whose login was refused (empty or taken name).
pub const LOGIN_REJECTED: &str = "Tên đã tồn tại hoặc không hợp lệ.";

/// Tail of the join announcement, after the quoted name.
pub const JOIN_SUFFIX: &str = "đã tham gia phòng chat.";

/// Tail of the leave announcement, after the quoted name.
pub const LEAVE_SUFFIX: &str = "đã rời phòng chat.";

/// Records that clients send to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientRecord {
    /// Claim a display name; must be the first record of a session
    Login {
        /// Requested name (validated by the session, not here)
        #[serde(default, skip_serializing_if = "Option::is_none")]
        username: Option<String>,
    },

    /// Chat text to fan out to everyone
    ChatMessage {
        /// Message payload, relayed as-is (`null` when absent)
        #[serde(default)]
        message: serde_json::Value,
    },

    /// Any record whose `type` is missing or not recognised
    #[serde(other)]
    Unknown,
}

impl ClientRecord {
    /// Creates a login record.
    pub fn login(username: impl Into<String>) -> Self {
        Self::Login {
            username: Some(username.into()),
        }
    }

    /// Creates a chat record carrying a text message.
    pub fn chat(message: impl Into<String>) -> Self {
        Self::ChatMessage {
            message: serde_json::Value::String(message.into()),
        }
    }

    /// Returns the wire name of the record type (for logging).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Login { .. } => "login",
            Self::ChatMessage { .. } => "chat_message",
            Self::Unknown => "unknown",
        }
    }
}

/// Records that the relay sends to clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerRecord {
    /// Login rejected; sent only to the offending client
    Error {
        /// Human-readable reason
        message: String,
    },

    /// Join/leave notice
    Announcement {
        /// Notice text
        message: String,
    },

    /// Current members in join order
    UserList {
        /// Display names
        users: Vec<DisplayName>,
    },

    /// A chat message fanned out to everyone
    ChatMessage {
        /// Name of the session that sent it, never taken from the client
        sender: DisplayName,
        /// Message payload copied from the client record
        message: serde_json::Value,
    },
}

impl ServerRecord {
    /// Creates the login rejection error.
    pub fn login_rejected() -> Self {
        Self::Error {
            message: LOGIN_REJECTED.to_string(),
        }
    }

    /// Creates the announcement for a member joining.
    pub fn joined(name: &DisplayName) -> Self {
        Self::Announcement {
            message: format!("👋 '{name}' {JOIN_SUFFIX}"),
        }
    }

    /// Creates the announcement for a member leaving.
    pub fn left(name: &DisplayName) -> Self {
        Self::Announcement {
            message: format!("👋 '{name}' {LEAVE_SUFFIX}"),
        }
    }

    /// Creates a user list.
    pub fn user_list(users: Vec<DisplayName>) -> Self {
        Self::UserList { users }
    }

    /// Creates an outbound chat message.
    pub fn chat(sender: DisplayName, message: serde_json::Value) -> Self {
        Self::ChatMessage { sender, message }
    }

    /// Returns the wire name of the record type (for logging).
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Error { .. } => "error",
            Self::Announcement { .. } => "announcement",
            Self::UserList { .. } => "user_list",
            Self::ChatMessage { .. } => "chat_message",
        }
    }
}
