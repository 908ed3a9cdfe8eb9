//! Per-connection session lifecycle.

use std::fmt;

use crate::DisplayName;

/// Lifecycle state of a single session.
///
/// ```text
/// Unauthenticated ──login ok──▶ Authenticated(name) ──closure/error──▶ Closed
///        │                                                              ▲
///        └────────────── bad login / malformed / closure ───────────────┘
/// ```
///
/// `Closed` is terminal.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Connected, no login accepted yet.
    #[default]
    Unauthenticated,

    /// Login accepted; the name is held in the registry.
    Authenticated(DisplayName),

    /// Session finished.
    Closed,
}

impl SessionState {
    /// Returns the authenticated name, if any.
    pub fn name(&self) -> Option<&DisplayName> {
        match self {
            Self::Authenticated(name) => Some(name),
            _ => None,
        }
    }

    /// Returns true once the session has finished.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }

    /// Moves to `Authenticated(name)`.
    ///
    /// Only valid from `Unauthenticated`; returns false and leaves the state
    /// untouched otherwise, so a session can never log in twice.
    pub fn authenticate(&mut self, name: DisplayName) -> bool {
        match self {
            Self::Unauthenticated => {
                *self = Self::Authenticated(name);
                true
            }
            _ => false,
        }
    }

    /// Moves to `Closed`, returning the state that was left.
    pub fn close(&mut self) -> SessionState {
        std::mem::replace(self, Self::Closed)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unauthenticated => write!(f, "unauthenticated"),
            Self::Authenticated(name) => write!(f, "authenticated as '{name}'"),
            Self::Closed => write!(f, "closed"),
        }
    }
}
