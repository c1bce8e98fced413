//! Domain models exchanged through the remote store.
//!
//! Each model has a wire record (`*Record`) mirroring the exact JSON layout
//! stored remotely, camelCase field names included, and a validated domain
//! struct built from it. Records that fail to parse are reported as
//! [`RecordError`] so callers can skip them without aborting a whole read.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RecordError;
use crate::types::ParticipantId;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// Stored layout of `conversations/{key}/messages/{autoId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MessageRecord {
    pub sender_id: String,
    pub receiver_id: String,
    pub body: String,
    /// Server clock, milliseconds since the Unix epoch.
    pub sent_at: i64,
    #[serde(default)]
    pub read: bool,
}

/// A single chat message between two participants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Push id assigned by the store; empty until persisted.
    pub id: String,
    pub sender_id: ParticipantId,
    pub receiver_id: ParticipantId,
    pub body: String,
    /// Server-assigned send time, milliseconds since the Unix epoch.
    pub sent_at: i64,
    /// Flipped to `true` by the receiver.
    pub read: bool,
}

impl Message {
    /// Build a message from the record stored under `id`.
    pub fn from_record(id: &str, value: &Value) -> Result<Self, RecordError> {
        let record: MessageRecord = serde_json::from_value(value.clone())?;
        Self::try_from_parts(id, record)
    }

    fn try_from_parts(id: &str, record: MessageRecord) -> Result<Self, RecordError> {
        let sender_id =
            ParticipantId::new(record.sender_id).map_err(|_| RecordError::EmptyField("senderId"))?;
        let receiver_id = ParticipantId::new(record.receiver_id)
            .map_err(|_| RecordError::EmptyField("receiverId"))?;

        Ok(Self {
            id: id.to_string(),
            sender_id,
            receiver_id,
            body: record.body,
            sent_at: record.sent_at,
            read: record.read,
        })
    }

    /// JSON written for a new message. `sent_at` is normally the store's
    /// server-timestamp placeholder so the server clock, not the sender's,
    /// orders the conversation.
    pub fn outgoing_record(
        sender_id: &ParticipantId,
        receiver_id: &ParticipantId,
        body: &str,
        sent_at: Value,
    ) -> Value {
        serde_json::json!({
            "senderId": sender_id.as_str(),
            "receiverId": receiver_id.as_str(),
            "body": body,
            "sentAt": sent_at,
            "read": false,
        })
    }

    pub fn is_persisted(&self) -> bool {
        !self.id.is_empty()
    }

    pub fn sent_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.sent_at).single()
    }
}

// ---------------------------------------------------------------------------
// Call invitation
// ---------------------------------------------------------------------------

/// Stored layout of `call_invitations/{targetId}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InvitationRecord {
    pub call_id: String,
    pub caller_id: String,
    #[serde(default)]
    pub caller_name: String,
    #[serde(default)]
    pub is_video: bool,
    pub created_at: i64,
}

/// A pending call invitation sitting in a participant's mailbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CallInvitation {
    pub call_id: String,
    pub caller_id: ParticipantId,
    pub caller_name: String,
    pub is_video: bool,
    /// Server-assigned creation time, milliseconds since the Unix epoch.
    pub created_at: i64,
}

impl CallInvitation {
    pub fn from_record(value: &Value) -> Result<Self, RecordError> {
        let record: InvitationRecord = serde_json::from_value(value.clone())?;
        if record.call_id.is_empty() {
            return Err(RecordError::EmptyField("callId"));
        }
        let caller_id =
            ParticipantId::new(record.caller_id).map_err(|_| RecordError::EmptyField("callerId"))?;

        Ok(Self {
            call_id: record.call_id,
            caller_id,
            caller_name: record.caller_name,
            is_video: record.is_video,
            created_at: record.created_at,
        })
    }

    pub fn outgoing_record(
        call_id: &str,
        caller_id: &ParticipantId,
        caller_name: &str,
        is_video: bool,
        created_at: Value,
    ) -> Value {
        serde_json::json!({
            "callId": call_id,
            "callerId": caller_id.as_str(),
            "callerName": caller_name,
            "isVideo": is_video,
            "createdAt": created_at,
        })
    }

    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.created_at).single()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn message_from_complete_record() {
        let value = json!({
            "senderId": "u1",
            "receiverId": "u2",
            "body": "is the flat in Lalitpur still available?",
            "sentAt": 1_700_000_000_000i64,
            "read": true,
        });
        let msg = Message::from_record("m1", &value).unwrap();
        assert_eq!(msg.id, "m1");
        assert_eq!(msg.sender_id, "u1");
        assert_eq!(msg.receiver_id, "u2");
        assert!(msg.read);
        assert!(msg.is_persisted());
        assert_eq!(msg.sent_at_utc().unwrap().timestamp(), 1_700_000_000);
    }

    #[test]
    fn message_read_defaults_to_false() {
        let value = json!({"senderId": "u1", "receiverId": "u2", "body": "hi", "sentAt": 5});
        assert!(!Message::from_record("m1", &value).unwrap().read);
    }

    #[test]
    fn message_missing_body_is_malformed() {
        let value = json!({"senderId": "u1", "receiverId": "u2", "sentAt": 5});
        assert!(matches!(
            Message::from_record("m1", &value),
            Err(RecordError::Malformed(_))
        ));
    }

    #[test]
    fn message_with_unresolved_timestamp_is_malformed() {
        let value = json!({"senderId": "u1", "receiverId": "u2", "body": "hi", "sentAt": {".sv": "timestamp"}});
        assert!(Message::from_record("m1", &value).is_err());
    }

    #[test]
    fn message_with_empty_sender_is_rejected() {
        let value = json!({"senderId": "", "receiverId": "u2", "body": "hi", "sentAt": 5});
        assert!(matches!(
            Message::from_record("m1", &value),
            Err(RecordError::EmptyField("senderId"))
        ));
    }

    #[test]
    fn outgoing_message_record_uses_wire_names() {
        let sender = ParticipantId::new("u1").unwrap();
        let receiver = ParticipantId::new("u2").unwrap();
        let value = Message::outgoing_record(&sender, &receiver, "hello", json!(42));
        assert_eq!(
            value,
            json!({"senderId": "u1", "receiverId": "u2", "body": "hello", "sentAt": 42, "read": false})
        );
        let msg = Message::from_record("id", &value).unwrap();
        assert_eq!(msg.body, "hello");
    }

    #[test]
    fn invitation_from_record() {
        let value = json!({
            "callId": "call-7",
            "callerId": "u1",
            "callerName": "Sita",
            "isVideo": true,
            "createdAt": 10,
        });
        let inv = CallInvitation::from_record(&value).unwrap();
        assert_eq!(inv.call_id, "call-7");
        assert_eq!(inv.caller_id, "u1");
        assert_eq!(inv.caller_name, "Sita");
        assert!(inv.is_video);
    }

    #[test]
    fn invitation_created_at_converts_from_server_millis() {
        let value = json!({"callId": "c", "callerId": "u1", "createdAt": 1_700_000_000_123i64});
        let inv = CallInvitation::from_record(&value).unwrap();
        let created = inv.created_at_utc().unwrap();
        assert_eq!(created.timestamp(), 1_700_000_000);
        assert_eq!(created.timestamp_subsec_millis(), 123);
    }

    #[test]
    fn invitation_without_call_id_is_rejected() {
        let value = json!({"callId": "", "callerId": "u1", "createdAt": 10});
        assert!(matches!(
            CallInvitation::from_record(&value),
            Err(RecordError::EmptyField("callId"))
        ));
        let value = json!({"callerId": "u1", "createdAt": 10});
        assert!(CallInvitation::from_record(&value).is_err());
    }
}
