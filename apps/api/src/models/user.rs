use serde::{Deserialize, Serialize};

/// The caller as resolved by the upstream gatekeeper.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentUser {
    /// Opaque identity, in practice the caller's email address.
    pub identity: String,
}
