use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Opaque account identifier issued by the identity provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(try_from = "String", into = "String")]
pub struct ParticipantId(String);

impl ParticipantId {
    pub fn new(id: impl Into<String>) -> Result<Self, IdentityError> {
        let id = id.into();
        if id.is_empty() {
            return Err(IdentityError::InvalidParticipant);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First eight characters, for log lines.
    pub fn short(&self) -> &str {
        match self.0.char_indices().nth(8) {
            Some((idx, _)) => &self.0[..idx],
            None => &self.0,
        }
    }
}

impl TryFrom<String> for ParticipantId {
    type Error = IdentityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ParticipantId> for String {
    fn from(id: ParticipantId) -> Self {
        id.0
    }
}

impl AsRef<str> for ParticipantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl PartialEq<str> for ParticipantId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ParticipantId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_id() {
        assert_eq!(ParticipantId::new(""), Err(IdentityError::InvalidParticipant));
    }

    #[test]
    fn short_is_char_boundary_safe() {
        let id = ParticipantId::new("ääääääääää").unwrap();
        assert_eq!(id.short(), "ää".repeat(4));
        assert_eq!(ParticipantId::new("u1").unwrap().short(), "u1");
    }

    #[test]
    fn deserialize_rejects_empty() {
        assert!(serde_json::from_str::<ParticipantId>("\"\"").is_err());
        let id: ParticipantId = serde_json::from_str("\"u1\"").unwrap();
        assert_eq!(id, "u1");
    }
}
