//! Register transport seam.
//!
//! The supervisor never frames protocol requests itself. A host supplies
//! an implementation of [`RegisterTransport`] that reads contiguous
//! holding-register blocks and writes single registers. Delivery and
//! wire-level retries are the transport's concern.

use thiserror::Error;

/// Error returned by a register transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// No response within the transport's deadline.
    #[error("timeout accessing register 0x{address:04X}")]
    Timeout { address: u16 },

    /// Device rejected the address.
    #[error("illegal register address 0x{0:04X}")]
    IllegalAddress(u16),

    /// Framing, CRC or other link error.
    #[error("communication error: {0}")]
    CommunicationError(String),

    /// Link is down and will not recover without operator action.
    #[error("transport disconnected")]
    Disconnected,
}

impl TransportError {
    /// Returns true if the run loop cannot continue.
    #[inline]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Disconnected)
    }
}

/// Block-oriented register access.
pub trait RegisterTransport {
    /// Human-readable transport name for logs.
    fn name(&self) -> &str;

    /// Read `count` consecutive holding registers starting at `start`.
    ///
    /// On success the returned vector holds exactly `count` words.
    fn read_holding(&mut self, start: u16, count: u16) -> Result<Vec<u16>, TransportError>;

    /// Write one holding register.
    fn write_single(&mut self, address: u16, value: u16) -> Result<(), TransportError>;
}

impl<T: RegisterTransport + ?Sized> RegisterTransport for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn read_holding(&mut self, start: u16, count: u16) -> Result<Vec<u16>, TransportError> {
        (**self).read_holding(start, count)
    }

    fn write_single(&mut self, address: u16, value: u16) -> Result<(), TransportError> {
        (**self).write_single(address, value)
    }
}

// ─── Tests ──────────────────────────────────────────────────────────
