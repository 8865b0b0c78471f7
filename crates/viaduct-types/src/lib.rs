//! Shared types for the Viaduct workspace.
//!
//! This crate provides the connection lifecycle types published by the bridge
//! and the database-identifier validation shared by the engine (which embeds
//! the identifier in a filename) and the bridge (which embeds it in a DNS
//! name). No crate in the workspace depends on anything *except*
//! `viaduct-types` for cross-cutting definitions, which keeps the dependency
//! graph clean.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a bridge connection.
///
/// Transitions are driven by transport events:
/// `Connecting → Open` on handshake completion, `Open → Closing → Closed` on
/// a local disconnect, `Open → Closed` on a remote close, and
/// `Connecting`/`Open` `→ Errored` on a transport error. `Closed` and
/// `Errored` are terminal; a new connection starts over at `Connecting`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Instance resolution and transport handshake are in progress.
    Connecting,
    /// The socket is established and the relay is pumping frames.
    Open,
    /// A local disconnect is closing the socket.
    Closing,
    /// The connection ended (local or remote close).
    Closed,
    /// The connection ended due to a transport-level failure.
    Errored,
}

impl ConnectionState {
    /// Returns the lowercase string label for this state.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closing => "closing",
            Self::Closed => "closed",
            Self::Errored => "errored",
        }
    }

    /// Whether this state ends the connection's lifecycle.
    ///
    /// `Errored` is reported the same way as `Closed` ("not connected") but
    /// is logged distinctly by the relay.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Closed | Self::Errored)
    }
}

/// Snapshot of the bridge's connection status, as observed by external
/// callers (the UI/state layer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeStatus {
    /// Current lifecycle state.
    pub state: ConnectionState,

    /// Identifier of the database the active session targets. Present from
    /// `connecting` through `open`; cleared on any terminal transition.
    pub database_id: Option<String>,

    /// When the current session reached `open`. Cleared with `database_id`.
    pub connected_at: Option<DateTime<Utc>>,
}

impl BridgeStatus {
    /// Whether a relay session is currently established.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

impl Default for BridgeStatus {
    fn default() -> Self {
        Self {
            state: ConnectionState::Closed,
            database_id: None,
            connected_at: None,
        }
    }
}

/// Maximum length of a database identifier (one DNS label).
pub const MAX_DATABASE_ID_LEN: usize = 63;

/// A database identifier failed validation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid database id {id:?}: {reason}")]
pub struct InvalidDatabaseId {
    /// The rejected identifier.
    pub id: String,
    /// Why it was rejected.
    pub reason: &'static str,
}

/// Validates a caller-supplied database identifier.
///
/// The identifier names a local database file and is embedded as a subdomain
/// label of the proxy domain, so it must be a valid lowercase DNS label:
/// 1–63 characters of `[a-z0-9-]`, not starting or ending with a hyphen.
///
/// # Errors
///
/// Returns [`InvalidDatabaseId`] describing the first violated rule.
pub fn validate_database_id(id: &str) -> Result<(), InvalidDatabaseId> {
    let reject = |reason| {
        Err(InvalidDatabaseId {
            id: id.to_string(),
            reason,
        })
    };

    if id.is_empty() {
        return reject("identifier is empty");
    }
    if id.len() > MAX_DATABASE_ID_LEN {
        return reject("identifier exceeds 63 characters");
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return reject("identifier may only contain lowercase letters, digits, and hyphens");
    }
    if id.starts_with('-') || id.ends_with('-') {
        return reject("identifier may not start or end with a hyphen");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_ids_pass() {
        for id in ["db-abc", "a", "x1", "prod-2024", "0-0"] {
            assert!(validate_database_id(id).is_ok(), "expected {id:?} to pass");
        }
    }

    #[test]
    fn invalid_ids_are_rejected() {
        let too_long = "a".repeat(64);
        let cases = [
            "",
            "Db-Abc",
            "db_abc",
            "db.abc",
            "-db",
            "db-",
            "db abc",
            too_long.as_str(),
        ];
        for id in cases {
            assert!(
                validate_database_id(id).is_err(),
                "expected {id:?} to be rejected"
            );
        }
    }

    #[test]
    fn rejection_carries_id_and_reason() {
        let err = validate_database_id("Bad").unwrap_err();
        assert_eq!(err.id, "Bad");
        assert!(err.reason.contains("lowercase"));
    }

    #[test]
    fn connection_state_serializes_snake_case() {
        let json = serde_json::to_value(ConnectionState::Connecting).unwrap();
        assert_eq!(json, "connecting");
        assert_eq!(ConnectionState::Errored.as_str(), "errored");
    }

    #[test]
    fn terminal_states() {
        assert!(ConnectionState::Closed.is_terminal());
        assert!(ConnectionState::Errored.is_terminal());
        assert!(!ConnectionState::Open.is_terminal());
        assert!(!ConnectionState::Connecting.is_terminal());
        assert!(!ConnectionState::Closing.is_terminal());
    }

    #[test]
    fn default_status_reads_disconnected() {
        let status = BridgeStatus::default();
        assert!(!status.is_connected());
        assert!(status.database_id.is_none());
        assert!(status.connected_at.is_none());
    }
}
