//! Types shared by every GharBato messaging crate: participant identity,
//! conversation keys, the message and call-invitation models, and the remote
//! store layout.

pub mod constants;
pub mod error;
pub mod identity;
pub mod models;
pub mod types;

pub use error::{IdentityError, RecordError};
pub use identity::{derive_conversation_key, ConversationKey};
pub use models::{CallInvitation, InvitationRecord, Message, MessageRecord};
pub use types::ParticipantId;
