//! Current backend client and caller identity.

use std::fmt;
use std::sync::{Arc, RwLock};

use pitchside_api_types::Principal;
use tracing::info;

use super::VenueBackend;
use crate::cache::lock::{read, write};

/// Whether a backend client is usable, and on whose behalf.
#[derive(Clone)]
pub enum SessionState {
    /// Identity provider has not finished bootstrapping; reads stay disabled.
    Initializing,
    /// A client exists. `principal` is `None` for an anonymous caller.
    Ready {
        actor: Arc<dyn VenueBackend>,
        principal: Option<Principal>,
    },
}

impl fmt::Debug for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initializing => f.write_str("Initializing"),
            Self::Ready { principal, .. } => f
                .debug_struct("Ready")
                .field("principal", principal)
                .finish_non_exhaustive(),
        }
    }
}

/// Shared, swappable session.
pub struct Session {
    state: RwLock<SessionState>,
}

impl Session {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(SessionState::Initializing),
        }
    }

    /// Start with a ready client.
    pub fn ready(actor: Arc<dyn VenueBackend>, principal: Option<Principal>) -> Self {
        Self {
            state: RwLock::new(SessionState::Ready { actor, principal }),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        read(&self.state, "session.snapshot").clone()
    }

    pub fn actor(&self) -> Option<Arc<dyn VenueBackend>> {
        match &*read(&self.state, "session.actor") {
            SessionState::Ready { actor, .. } => Some(Arc::clone(actor)),
            SessionState::Initializing => None,
        }
    }

    pub fn principal(&self) -> Option<Principal> {
        match &*read(&self.state, "session.principal") {
            SessionState::Ready { principal, .. } => principal.clone(),
            SessionState::Initializing => None,
        }
    }

    /// Replace the current client.
    pub fn establish(&self, actor: Arc<dyn VenueBackend>, principal: Option<Principal>) {
        info!(
            principal = principal.as_ref().map(Principal::as_str),
            "Session established"
        );
        *write(&self.state, "session.establish") = SessionState::Ready { actor, principal };
    }

    /// Back to the bootstrapping state.
    pub fn reset(&self) {
        *write(&self.state, "session.reset") = SessionState::Initializing;
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}
