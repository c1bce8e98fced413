//! Canonical two-party conversation keys.
//!
//! A conversation between `a` and `b` is stored under
//! `min(a, b) + "_" + max(a, b)`, using ordinary byte-wise string ordering.
//! The key needs no registry: both clients compute it independently and
//! always agree.

use serde::{Deserialize, Serialize};

use crate::constants::KEY_SEPARATOR;
use crate::error::IdentityError;
use crate::types::ParticipantId;

/// Order-independent identifier of a two-party conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(transparent)]
pub struct ConversationKey(String);

impl ConversationKey {
    /// Key for a conversation between two validated participants.
    pub fn between(a: &ParticipantId, b: &ParticipantId) -> Self {
        let (lo, hi) = if a.as_str() <= b.as_str() {
            (a.as_str(), b.as_str())
        } else {
            (b.as_str(), a.as_str())
        };
        Self(format!("{lo}{KEY_SEPARATOR}{hi}"))
    }

    /// Whether this is the conversation between `a` and `b`, in either order.
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        derive_conversation_key(a, b).map_or(false, |key| key == *self)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ConversationKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Derive the conversation key for two raw participant identifiers.
///
/// Fails with [`IdentityError::InvalidParticipant`] if either id is empty.
/// Self-conversations (`a == b`) are allowed and yield `a_a`.
pub fn derive_conversation_key(a: &str, b: &str) -> Result<ConversationKey, IdentityError> {
    let a = ParticipantId::new(a)?;
    let b = ParticipantId::new(b)?;
    Ok(ConversationKey::between(&a, &b))
}
