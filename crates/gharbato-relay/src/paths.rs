//! Remote store layout:
//!
//! - `conversations/{conversationKey}/messages/{autoId}` → one message
//! - `call_invitations/{targetParticipantId}` → one pending invitation

use gharbato_shared::constants::{CALL_INVITATIONS_ROOT, CONVERSATIONS_ROOT, MESSAGES_NODE};
use gharbato_shared::ConversationKey;
use gharbato_store::{Result, StorePath};

pub fn messages(key: &ConversationKey) -> Result<StorePath> {
    StorePath::from_segments([CONVERSATIONS_ROOT, key.as_str(), MESSAGES_NODE])
}

pub fn message(key: &ConversationKey, message_id: &str) -> Result<StorePath> {
    messages(key)?.child(message_id)
}

pub fn invitation_slot(target_id: &str) -> Result<StorePath> {
    StorePath::from_segments([CALL_INVITATIONS_ROOT, target_id])
}

#[cfg(test)]
mod tests {
    use gharbato_shared::derive_conversation_key;

    use super::*;

    #[test]
    fn layout_matches_remote_tree() {
        let key = derive_conversation_key("u2", "u1").unwrap();
        assert_eq!(messages(&key).unwrap().as_str(), "conversations/u1_u2/messages");
        assert_eq!(
            message(&key, "abc").unwrap().as_str(),
            "conversations/u1_u2/messages/abc"
        );
        assert_eq!(invitation_slot("u2").unwrap().as_str(), "call_invitations/u2");
    }

    #[test]
    fn unaddressable_ids_are_rejected() {
        assert!(invitation_slot("").is_err());
        assert!(invitation_slot("a/b").is_err());
        let key = derive_conversation_key("a.b", "c").unwrap();
        assert!(messages(&key).is_err());
    }
}
