//! Idempotent main-contactor driver.
//!
//! A command is emitted only when it differs from the command still
//! waiting for confirmation and the observed feedback does not already
//! agree with it. Calling [`ContactorDriver::start`] or
//! [`ContactorDriver::stop`] every cycle never floods the device.

use bms_common::rack::state::{ContactorCommand, ContactorFeedback};
use tracing::debug;

use crate::codec::{self, CodecError, Quantity, RegisterWrite};

/// Tracks the last unconfirmed contactor command.
#[derive(Debug, Clone, Default)]
pub struct ContactorDriver {
    pending: Option<ContactorCommand>,
}

impl ContactorDriver {
    pub const fn new() -> Self {
        Self { pending: None }
    }

    /// Command awaiting confirmation by feedback.
    #[inline]
    pub const fn pending(&self) -> Option<ContactorCommand> {
        self.pending
    }

    /// Drop the pending command once feedback confirms it.
    ///
    /// Called every cycle so a later command in the same direction is sent
    /// again after the device changed state on its own.
    pub fn observe(&mut self, feedback: Option<ContactorFeedback>) {
        let confirmed = match (self.pending, feedback) {
            (
                Some(ContactorCommand::Start),
                Some(ContactorFeedback::OnGrid | ContactorFeedback::ConnectionInitiating),
            ) => true,
            (Some(ContactorCommand::Stop), Some(ContactorFeedback::CutOff)) => true,
            _ => false,
        };
        if confirmed {
            self.pending = None;
        }
    }

    /// Close the contactor.
    ///
    /// No-op while feedback is `OnGrid` or `ConnectionInitiating`. Deferred
    /// while feedback is unread or undefined.
    pub fn start(&mut self, feedback: Option<ContactorFeedback>) -> Option<ContactorCommand> {
        match feedback {
            Some(ContactorFeedback::OnGrid | ContactorFeedback::ConnectionInitiating) => {
                self.pending = None;
                None
            }
            None | Some(ContactorFeedback::Undefined) => None,
            Some(ContactorFeedback::CutOff) => self.issue(ContactorCommand::Start),
        }
    }

    /// Open the contactor.
    ///
    /// No-op while feedback is `CutOff`. Undetermined feedback still issues
    /// STOP, the safe direction.
    pub fn stop(&mut self, feedback: Option<ContactorFeedback>) -> Option<ContactorCommand> {
        match feedback {
            Some(ContactorFeedback::CutOff) => {
                self.pending = None;
                None
            }
            _ => self.issue(ContactorCommand::Stop),
        }
    }

    fn issue(&mut self, command: ContactorCommand) -> Option<ContactorCommand> {
        if self.pending == Some(command) {
            return None;
        }
        debug!(?command, "Contactor command issued");
        self.pending = Some(command);
        Some(command)
    }

    /// The write carrying the last command failed; allow a resend.
    pub fn on_write_failed(&mut self) {
        self.pending = None;
    }

    /// Forget everything, e.g. after a target change.
    pub fn reset(&mut self) {
        self.pending = None;
    }
}

/// Encode a contactor command for the BMS contactor control register.
pub fn command_write(command: ContactorCommand) -> Result<RegisterWrite, CodecError> {
    codec::encode(Quantity::BmsContactorControl, command as i64)
}

// ─── Tests ──────────────────────────────────────────────────────────
