/// Separator between the two participant ids of a conversation key.
/// Participant ids issued by the identity provider never contain it.
pub const KEY_SEPARATOR: char = '_';

/// Root node holding every two-party conversation.
pub const CONVERSATIONS_ROOT: &str = "conversations";

/// Child node of a conversation holding its messages.
pub const MESSAGES_NODE: &str = "messages";

/// Root node holding one single-slot invitation mailbox per participant.
pub const CALL_INVITATIONS_ROOT: &str = "call_invitations";

/// Default maximum message body length, in characters.
pub const DEFAULT_MAX_BODY_LEN: usize = 4096;
