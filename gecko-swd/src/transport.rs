// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! SWD transport boundary
//!
//! `gecko-swd` never clocks SWD bits itself.  An adapter driver implements
//! [`SwdTransport`] to issue single DP and AP register transactions, and
//! [`DebugPort`](crate::DebugPort) builds everything else on top.

use core::fmt;

use crate::SwdError;

/// Which port a transaction addresses (the APnDP bit)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Port {
    Dp,
    Ap,
}

/// A single SWD transaction, identified by its register byte address.
///
/// Used for logging, and converted to the transport's `(Port, A[3:2])`
/// form with [`Self::port()`] and [`Self::wire_address()`].
///
/// ```rust
/// use gecko_swd::{Port, SwdOp};
///
/// let op = SwdOp::ApRead(0xFC);
/// assert_eq!(op.port(), Port::Ap);
/// assert_eq!(op.wire_address(), 3);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwdOp {
    DpRead(u8),
    DpWrite(u8),
    ApRead(u8),
    ApWrite(u8),
}

impl SwdOp {
    pub fn port(&self) -> Port {
        match self {
            SwdOp::DpRead(_) | SwdOp::DpWrite(_) => Port::Dp,
            SwdOp::ApRead(_) | SwdOp::ApWrite(_) => Port::Ap,
        }
    }

    /// The register's byte address
    pub fn address(&self) -> u8 {
        match self {
            SwdOp::DpRead(a) | SwdOp::DpWrite(a) | SwdOp::ApRead(a) | SwdOp::ApWrite(a) => *a,
        }
    }

    /// The 2-bit address sent on the wire
    pub fn wire_address(&self) -> u8 {
        (self.address() >> 2) & 0x3
    }

    /// The 4-bit AP register bank.  Always zero for DP operations.
    pub fn bank(&self) -> u8 {
        match self.port() {
            Port::Dp => 0,
            Port::Ap => (self.address() >> 4) & 0xF,
        }
    }

    pub fn is_read(&self) -> bool {
        matches!(self, SwdOp::DpRead(_) | SwdOp::ApRead(_))
    }
}

impl fmt::Display for SwdOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SwdOp::DpRead(a) => write!(f, "DP Read 0x{a:02X}"),
            SwdOp::DpWrite(a) => write!(f, "DP Write 0x{a:02X}"),
            SwdOp::ApRead(a) => write!(f, "AP Read 0x{a:02X}"),
            SwdOp::ApWrite(a) => write!(f, "AP Write 0x{a:02X}"),
        }
    }
}

/// A bit-level SWD adapter.
///
/// `addr` is always the 2-bit register address A[3:2].  Bank selection is
/// handled by [`DebugPort`](crate::DebugPort) through the DP SELECT
/// register, so the transport never needs to know about it.
///
/// AP reads are posted: the value returned by `read_swd(Port::Ap, _)` is the
/// result of the *previous* AP read.  Reading RDBUFF retrieves the last one.
///
/// Errors are returned unchanged to the caller.  A transport may retry WAIT
/// responses internally.
pub trait SwdTransport {
    /// Perform one read transaction.
    fn read_swd(&mut self, port: Port, addr: u8) -> Result<u32, SwdError>;

    /// Perform one write transaction.  With `ignore_ack` set the transport
    /// must not fail the write on a non-OK acknowledgement.
    fn write_swd(
        &mut self,
        port: Port,
        addr: u8,
        value: u32,
        ignore_ack: bool,
    ) -> Result<(), SwdError>;
}

impl<T: SwdTransport + ?Sized> SwdTransport for &mut T {
    fn read_swd(&mut self, port: Port, addr: u8) -> Result<u32, SwdError> {
        (**self).read_swd(port, addr)
    }

    fn write_swd(
        &mut self,
        port: Port,
        addr: u8,
        value: u32,
        ignore_ack: bool,
    ) -> Result<(), SwdError> {
        (**self).write_swd(port, addr, value, ignore_ack)
    }
}

impl<T: SwdTransport + ?Sized> SwdTransport for Box<T> {
    fn read_swd(&mut self, port: Port, addr: u8) -> Result<u32, SwdError> {
        (**self).read_swd(port, addr)
    }

    fn write_swd(
        &mut self,
        port: Port,
        addr: u8,
        value: u32,
        ignore_ack: bool,
    ) -> Result<(), SwdError> {
        (**self).write_swd(port, addr, value, ignore_ack)
    }
}
