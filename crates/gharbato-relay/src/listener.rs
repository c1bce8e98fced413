//! Listener contracts for live subscriptions.
//!
//! Both the data handler and the error handler are required methods, so a
//! listener that ignores failures has to say so explicitly.

use gharbato_shared::{CallInvitation, Message};

use crate::error::RelayError;

/// Receives the ordered message view of one conversation.
pub trait MessageListener: Send + 'static {
    /// Called with the full, `sent_at`-ordered view after every change.
    fn on_update(&mut self, messages: &[Message]);

    /// Called at most once; no further callbacks follow.
    fn on_error(&mut self, error: RelayError);
}

/// Receives invitations arriving in one participant's mailbox.
pub trait InvitationListener: Send + 'static {
    /// A new invitation now occupies the mailbox.
    fn on_invitation(&mut self, invitation: CallInvitation);

    /// Called at most once; no further callbacks follow.
    fn on_error(&mut self, error: RelayError);

    /// The mailbox was emptied (accepted, declined or cancelled).
    fn on_cleared(&mut self) {}
}

/// [`MessageListener`] built from two closures.
pub struct MessageHandlers<U, E> {
    on_update: U,
    on_error: E,
}

pub fn message_handlers<U, E>(on_update: U, on_error: E) -> MessageHandlers<U, E>
where
    U: FnMut(&[Message]) + Send + 'static,
    E: FnMut(RelayError) + Send + 'static,
{
    MessageHandlers {
        on_update,
        on_error,
    }
}

impl<U, E> MessageListener for MessageHandlers<U, E>
where
    U: FnMut(&[Message]) + Send + 'static,
    E: FnMut(RelayError) + Send + 'static,
{
    fn on_update(&mut self, messages: &[Message]) {
        (self.on_update)(messages)
    }

    fn on_error(&mut self, error: RelayError) {
        (self.on_error)(error)
    }
}

/// [`InvitationListener`] built from two closures.
pub struct InvitationHandlers<I, E> {
    on_invitation: I,
    on_error: E,
}

pub fn invitation_handlers<I, E>(on_invitation: I, on_error: E) -> InvitationHandlers<I, E>
where
    I: FnMut(CallInvitation) + Send + 'static,
    E: FnMut(RelayError) + Send + 'static,
{
    InvitationHandlers {
        on_invitation,
        on_error,
    }
}

impl<I, E> InvitationListener for InvitationHandlers<I, E>
where
    I: FnMut(CallInvitation) + Send + 'static,
    E: FnMut(RelayError) + Send + 'static,
{
    fn on_invitation(&mut self, invitation: CallInvitation) {
        (self.on_invitation)(invitation)
    }

    fn on_error(&mut self, error: RelayError) {
        (self.on_error)(error)
    }
}
