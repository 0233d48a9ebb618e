//! Sessions and the per-request authentication context

use crate::core::store::ResourceId;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;

/// Number of alphanumeric characters in a session token.
///
/// 48 characters over a 62-symbol alphabet is roughly 285 bits of entropy,
/// comfortably past the 128-bit guessing-resistance floor.
pub const TOKEN_LENGTH: usize = 48;

/// A server-issued authentication session.
///
/// Bound to one user and one client at login time and immutable afterwards;
/// the only lifecycle transition is revocation (deletion of the backing
/// instance).
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Id of the backing session instance
    pub id: ResourceId,

    /// Opaque random token presented by the client on each request
    pub token: String,

    /// Id of the user this session authenticates
    pub user_id: ResourceId,

    /// Id of the client application the user logged in through
    pub client_id: ResourceId,

    /// When the session was issued
    pub created: DateTime<Utc>,

    /// When the session stops being honored, if it expires at all
    pub expires: Option<DateTime<Utc>>,
}

impl Session {
    /// Whether the session has expired as of `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|expires| expires <= now)
    }
}

/// Authentication state of one request.
///
/// A request with no token, an unknown token, or an expired token is
/// `Anonymous`; resources decide per field whether anonymous access sees
/// anything.
#[derive(Debug, Clone)]
pub enum AuthContext {
    /// No valid session presented
    Anonymous,

    /// A valid, unexpired session
    Session(Session),
}

impl AuthContext {
    /// Whether a valid session backs this request
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthContext::Session(_))
    }

    /// The authenticated user's id, if any
    pub fn user_id(&self) -> Option<ResourceId> {
        match self {
            AuthContext::Session(session) => Some(session.user_id),
            AuthContext::Anonymous => None,
        }
    }

    /// The session, if any
    pub fn session(&self) -> Option<&Session> {
        match self {
            AuthContext::Session(session) => Some(session),
            AuthContext::Anonymous => None,
        }
    }
}

/// Generate a fresh session token from the thread-local CSPRNG.
///
/// Uniqueness is not guaranteed here; the session manager re-checks the
/// store and regenerates on collision.
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}
