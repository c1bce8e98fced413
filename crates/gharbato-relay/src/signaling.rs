//! Call invitations through a single-slot mailbox per participant.
//!
//! ```text
//!   Idle --invite--> Pending --accept / decline (callee)--> Idle
//!                       |
//!                       +------cancel (caller)------------> Idle
//! ```
//!
//! The mailbox at `call_invitations/{target}` holds at most one invitation.
//! A second `invite` overwrites the first without telling the first caller;
//! between a racing clear and invite, whichever write lands last wins.
//! Call-session state after acceptance belongs to the video SDK.

use std::sync::Arc;

use gharbato_shared::{CallInvitation, ParticipantId};
use gharbato_store::{server_timestamp, RemoteStore, StorePath, WatchEvent};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{RelayError, SignalError};
use crate::listener::InvitationListener;
use crate::paths;
use crate::subscription::{DeliveryGate, Subscription};

/// Mailbox state for one target participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    Pending,
}

/// Hand-off data for the video SDK once the callee accepts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AcceptedCall {
    pub call_id: String,
    pub caller_id: ParticipantId,
    pub callee_id: ParticipantId,
    pub is_video: bool,
}

/// Place, observe and clear call invitations.
#[derive(Clone)]
pub struct CallSignaling {
    store: Arc<dyn RemoteStore>,
}

impl CallSignaling {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// Fresh random call id.
    pub fn new_call_id() -> String {
        Uuid::new_v4().to_string()
    }

    /// Put an invitation in `target_id`'s mailbox, replacing any pending one.
    pub async fn invite(
        &self,
        target_id: &str,
        call_id: &str,
        is_video: bool,
        caller_id: &str,
        caller_name: &str,
    ) -> Result<(), SignalError> {
        if target_id.is_empty() {
            return Err(SignalError::InvalidInvitation("target id is empty".into()));
        }
        if call_id.is_empty() {
            return Err(SignalError::InvalidInvitation("call id is empty".into()));
        }
        let caller = ParticipantId::new(caller_id)
            .map_err(|_| SignalError::InvalidInvitation("caller id is empty".into()))?;
        let slot = paths::invitation_slot(target_id)?;

        let record =
            CallInvitation::outgoing_record(call_id, &caller, caller_name, is_video, server_timestamp());
        self.store.set(&slot, record).await.map_err(|e| {
            warn!(target = %target_id, call = %call_id, error = %e, "invitation write failed");
            SignalError::from(e)
        })?;

        info!(
            target = %target_id,
            call = %call_id,
            caller = %caller.short(),
            video = is_video,
            "call invitation placed"
        );
        Ok(())
    }

    /// Watch `self_id`'s mailbox.
    ///
    /// A pending invitation is delivered right away. Each new invitation is
    /// delivered once; emptying the mailbox calls `on_cleared`. Must be called
    /// from within a tokio runtime.
    pub fn observe_invitations<L: InvitationListener>(
        &self,
        self_id: &str,
        listener: L,
    ) -> Subscription {
        let store = self.store.clone();
        let slot = if self_id.is_empty() {
            Err(RelayError::InvalidPath("participant id is empty".into()))
        } else {
            paths::invitation_slot(self_id).map_err(RelayError::from)
        };
        let label = slot
            .as_ref()
            .map(|p| p.to_string())
            .unwrap_or_else(|_| format!("call_invitations/{self_id}"));

        Subscription::spawn(label, move |gate| async move {
            match slot {
                Ok(slot) => run_invitation_feed(store, slot, gate, listener).await,
                Err(e) => {
                    let mut listener = listener;
                    report_failure(&gate, &mut listener, e);
                }
            }
        })
    }

    /// Empty `self_id`'s mailbox. Succeeds when it is already empty.
    pub async fn clear_invitation(&self, self_id: &str) -> Result<(), SignalError> {
        if self_id.is_empty() {
            return Err(SignalError::InvalidInvitation("participant id is empty".into()));
        }
        let slot = paths::invitation_slot(self_id)?;
        let removed = self.store.remove(&slot).await?;
        debug!(participant = %self_id, removed, "invitation mailbox cleared");
        Ok(())
    }

    /// Invitation currently waiting for `target_id`, if any.
    pub async fn pending(&self, target_id: &str) -> Result<Option<CallInvitation>, SignalError> {
        if target_id.is_empty() {
            return Err(SignalError::InvalidInvitation("target id is empty".into()));
        }
        let slot = paths::invitation_slot(target_id)?;
        let value = self.store.get(&slot).await?;
        Ok(value.and_then(|value| parse_invitation(&slot, &value)))
    }

    pub async fn phase(&self, target_id: &str) -> Result<CallPhase, SignalError> {
        Ok(match self.pending(target_id).await? {
            Some(_) => CallPhase::Pending,
            None => CallPhase::Idle,
        })
    }

    /// Callee accepts `invitation`: the mailbox is emptied and the SDK
    /// hand-off is returned.
    ///
    /// Fails with [`SignalError::InvalidInvitation`] if the mailbox no longer
    /// holds this call (cancelled, or superseded by another caller); the
    /// mailbox is then left untouched.
    pub async fn accept(
        &self,
        self_id: &str,
        invitation: &CallInvitation,
    ) -> Result<AcceptedCall, SignalError> {
        let callee = ParticipantId::new(self_id)
            .map_err(|_| SignalError::InvalidInvitation("participant id is empty".into()))?;

        match self.pending(self_id).await? {
            Some(current) if current.call_id == invitation.call_id => {}
            _ => {
                return Err(SignalError::InvalidInvitation(format!(
                    "call {} is no longer pending",
                    invitation.call_id
                )))
            }
        }
        self.clear_invitation(self_id).await?;

        info!(call = %invitation.call_id, callee = %callee.short(), "call accepted");
        Ok(AcceptedCall {
            call_id: invitation.call_id.clone(),
            caller_id: invitation.caller_id.clone(),
            callee_id: callee,
            is_video: invitation.is_video,
        })
    }

    /// Callee turns the pending invitation down.
    pub async fn decline(&self, self_id: &str) -> Result<(), SignalError> {
        self.clear_invitation(self_id).await?;
        info!(participant = %self_id, "call declined");
        Ok(())
    }

    /// Caller withdraws the invitation sent to `target_id`.
    pub async fn cancel(&self, target_id: &str) -> Result<(), SignalError> {
        self.clear_invitation(target_id).await?;
        info!(target = %target_id, "call cancelled");
        Ok(())
    }
}

fn parse_invitation(slot: &StorePath, value: &serde_json::Value) -> Option<CallInvitation> {
    match CallInvitation::from_record(value) {
        Ok(invitation) => Some(invitation),
        Err(e) => {
            warn!(slot = %slot, error = %e, "ignoring malformed invitation");
            None
        }
    }
}

async fn run_invitation_feed<L: InvitationListener>(
    store: Arc<dyn RemoteStore>,
    slot: StorePath,
    gate: DeliveryGate,
    mut listener: L,
) {
    let mut watch = match store.watch(&slot) {
        Ok(watch) => watch,
        Err(e) => return report_failure(&gate, &mut listener, e.into()),
    };
    info!(slot = %slot, "invitation listener attached");

    let mut last: Option<CallInvitation> = None;
    loop {
        let current = match store.get(&slot).await {
            Ok(value) => value.and_then(|value| parse_invitation(&slot, &value)),
            Err(e) => return report_failure(&gate, &mut listener, e.into()),
        };

        let keep_going = match &current {
            Some(invitation) if last.as_ref() != Some(invitation) => {
                let invitation = invitation.clone();
                gate.deliver(|| listener.on_invitation(invitation))
            }
            None if last.is_some() => gate.deliver(|| listener.on_cleared()),
            _ => gate.is_open(),
        };
        if !keep_going {
            break;
        }
        last = current;

        match watch.next().await {
            Some(WatchEvent::Changed) => {}
            Some(WatchEvent::Lagged(missed)) => {
                debug!(slot = %slot, missed, "invitation feed lagged, re-reading");
            }
            Some(WatchEvent::Revoked(e)) => return report_failure(&gate, &mut listener, e.into()),
            None => return report_failure(&gate, &mut listener, RelayError::StoreClosed),
        }
    }
    debug!(slot = %slot, "invitation listener detached");
}

fn report_failure<L: InvitationListener>(gate: &DeliveryGate, listener: &mut L, error: RelayError) {
    warn!(error = %error, "invitation listener failed");
    gate.deliver(|| listener.on_error(error));
    gate.close();
}
