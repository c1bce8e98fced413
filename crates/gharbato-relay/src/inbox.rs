//! Single-slot queue for incoming call invitations.
//!
//! [`InvitationInbox`] is an [`InvitationListener`] that parks the latest
//! invitation until the application takes it. Each invitation is handed out
//! at most once: `take` empties the slot, a newer invitation replaces an
//! untaken one, and a cleared mailbox empties it.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use gharbato_shared::CallInvitation;
use tokio::sync::Notify;

use crate::error::RelayError;
use crate::listener::InvitationListener;

#[derive(Default)]
struct Slot {
    pending: Option<CallInvitation>,
    error: Option<RelayError>,
}

#[derive(Default)]
struct Inner {
    slot: Mutex<Slot>,
    notify: Notify,
}

/// Cloneable handle; clones share the same slot.
#[derive(Clone, Default)]
pub struct InvitationInbox {
    inner: Arc<Inner>,
}

impl InvitationInbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove and return the pending invitation.
    pub fn take(&self) -> Option<CallInvitation> {
        self.slot().pending.take()
    }

    /// Look at the pending invitation without consuming it.
    pub fn peek(&self) -> Option<CallInvitation> {
        self.slot().pending.clone()
    }

    /// Remove and return the listener failure, if one was reported.
    pub fn take_error(&self) -> Option<RelayError> {
        self.slot().error.take()
    }

    /// Wait for the next invitation and consume it.
    ///
    /// Intended for a single consumer. Returns the listener failure instead
    /// if the subscription feeding this inbox ended.
    pub async fn recv(&self) -> Result<CallInvitation, RelayError> {
        loop {
            {
                let mut slot = self.slot();
                if let Some(invitation) = slot.pending.take() {
                    return Ok(invitation);
                }
                if let Some(error) = slot.error.take() {
                    return Err(error);
                }
            }
            self.inner.notify.notified().await;
        }
    }

    fn slot(&self) -> MutexGuard<'_, Slot> {
        self.inner.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InvitationListener for InvitationInbox {
    fn on_invitation(&mut self, invitation: CallInvitation) {
        self.slot().pending = Some(invitation);
        self.inner.notify.notify_one();
    }

    fn on_error(&mut self, error: RelayError) {
        self.slot().error = Some(error);
        self.inner.notify.notify_one();
    }

    fn on_cleared(&mut self) {
        self.slot().pending = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use gharbato_shared::ParticipantId;

    use super::*;

    fn invitation(call_id: &str) -> CallInvitation {
        CallInvitation {
            call_id: call_id.to_string(),
            caller_id: ParticipantId::new("u1").unwrap(),
            caller_name: "Sita".to_string(),
            is_video: false,
            created_at: 1,
        }
    }

    #[test]
    fn take_consumes_exactly_once() {
        let mut inbox = InvitationInbox::new();
        inbox.on_invitation(invitation("A"));
        assert_eq!(inbox.peek().unwrap().call_id, "A");
        assert_eq!(inbox.take().unwrap().call_id, "A");
        assert!(inbox.take().is_none());
    }

    #[test]
    fn newer_invitation_replaces_untaken_one() {
        let mut inbox = InvitationInbox::new();
        inbox.on_invitation(invitation("A"));
        inbox.on_invitation(invitation("B"));
        assert_eq!(inbox.take().unwrap().call_id, "B");
        assert!(inbox.take().is_none());
    }

    #[test]
    fn cleared_mailbox_empties_inbox() {
        let mut inbox = InvitationInbox::new();
        inbox.on_invitation(invitation("A"));
        inbox.on_cleared();
        assert!(inbox.take().is_none());
    }

    #[tokio::test]
    async fn recv_waits_for_delivery() {
        let inbox = InvitationInbox::new();
        let mut feeder = inbox.clone();

        let waiter = tokio::spawn({
            let inbox = inbox.clone();
            async move { inbox.recv().await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        feeder.on_invitation(invitation("late"));

        let got = tokio::time::timeout(Duration::from_secs(2), waiter)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(got.call_id, "late");
        assert!(inbox.take().is_none());
    }

    #[tokio::test]
    async fn recv_surfaces_listener_failure() {
        let inbox = InvitationInbox::new();
        let mut feeder = inbox.clone();
        feeder.on_error(RelayError::StoreClosed);
        assert_eq!(inbox.recv().await.unwrap_err(), RelayError::StoreClosed);
        assert!(inbox.take_error().is_none());
    }
}
