use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::enums::TurnRole;

/// One message in a conversation, either inbound (user) or outbound
/// (assistant). Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    pub seq: i64,
    pub role: TurnRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// What the state machine is waiting for from this user, if anything.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PendingAction {
    #[default]
    None,
    AwaitingPin {
        booking_hint: Option<String>,
    },
}

impl PendingAction {
    /// Column pair for persistence: (pending_action, booking_hint).
    pub fn to_columns(&self) -> (&'static str, Option<String>) {
        match self {
            PendingAction::None => ("none", None),
            PendingAction::AwaitingPin { booking_hint } => {
                ("awaiting_pin", booking_hint.clone())
            }
        }
    }

    pub fn from_columns(
        action: &str,
        hint: Option<String>,
    ) -> Result<Self, crate::db::DatabaseError> {
        match action {
            "none" => Ok(PendingAction::None),
            "awaiting_pin" => Ok(PendingAction::AwaitingPin { booking_hint: hint }),
            other => Err(crate::db::DatabaseError::InvalidEnum {
                field: "pending_action".into(),
                value: other.into(),
            }),
        }
    }
}

/// Per-user conversation session. Created lazily on first message,
/// never deleted.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: String,
    pub pending: PendingAction,
    pub started_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
