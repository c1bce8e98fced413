use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Invalid participant: identifier must not be empty")]
    InvalidParticipant,
}

/// Why a record read back from the remote store could not be used.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("Malformed record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("Record field `{0}` is empty")]
    EmptyField(&'static str),
}
