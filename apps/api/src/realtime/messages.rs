//! WebSocket message types.
//!
//! Every frame is a JSON object tagged by `type`.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::league::{LeagueEvent, LeagueUpdate, ScoreUpdate};

#[derive(Debug, thiserror::Error)]
pub enum WsError {
    #[error("Invalid message: {0}")]
    InvalidMessage(String),
    #[error("Serialization failed: {0}")]
    SerializationError(#[from] serde_json::Error),
}

// ==================== Client -> Server ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Subscribe to a league's room
    JoinLeague { league_id: Uuid },
    /// Unsubscribe from a league's room
    LeaveLeague { league_id: Uuid },
    /// Re-assert identity with a refreshed token; rooms are kept
    Auth { token: String },
    Ping,
}

impl ClientMessage {
    pub fn from_json(json: &str) -> Result<Self, WsError> {
        serde_json::from_str(json).map_err(|e| WsError::InvalidMessage(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(WsError::from)
    }
}

// ==================== Server -> Client ====================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        connection_id: Uuid,
        version: String,
    },
    Joined {
        league_id: Uuid,
    },
    Left {
        league_id: Uuid,
    },
    AuthResult {
        success: bool,
        message: String,
    },
    Pong {
        timestamp: i64,
    },
    Error {
        code: String,
        message: String,
    },
    LeagueUpdate(LeagueUpdate),
    ScoreUpdate(ScoreUpdate),
}

impl ServerMessage {
    pub fn from_json(json: &str) -> Result<Self, WsError> {
        serde_json::from_str(json).map_err(|e| WsError::InvalidMessage(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String, WsError> {
        serde_json::to_string(self).map_err(WsError::from)
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            code: code.into(),
            message: message.into(),
        }
    }

    /// The league event carried by this frame, if any
    pub fn into_event(self) -> Option<LeagueEvent> {
        match self {
            ServerMessage::LeagueUpdate(update) => Some(LeagueEvent::LeagueUpdate(update)),
            ServerMessage::ScoreUpdate(update) => Some(LeagueEvent::ScoreUpdate(update)),
            _ => None,
        }
    }
}

impl From<LeagueEvent> for ServerMessage {
    fn from(event: LeagueEvent) -> Self {
        match event {
            LeagueEvent::LeagueUpdate(update) => ServerMessage::LeagueUpdate(update),
            LeagueEvent::ScoreUpdate(update) => ServerMessage::ScoreUpdate(update),
        }
    }
}
