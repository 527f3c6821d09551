// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! gecko-swd library
//!
//! Debug and flash programming of EFM32 microcontrollers over the
//! [ARM SWD protocol](https://developer.arm.com/documentation/ihi0031/latest/).
//!
//! The following diagram shows the key `gecko-swd` concepts.
//!
//! ```text
//!      program_image()      Direct or flash loader strategy
//! ----------------------
//!     DebugInterface      \  halt/run/reset, identify, MSC flash engine,
//! ----------------------   \ flash loader mailbox
//!         MemAp             |--  SwdError
//! ----------------------   /
//!       DebugPort         /  IDCODE, power-up, SELECT caching, RDBUFF
//! ----------------------
//!     SwdTransport       >=====  SWD adapter  =====<   EFM32 target
//! ```
//!
//! * [`DebugInterface`] provides core control, part identification and the
//!   flash programming engine.
//! * [`MemAp`] provides word, block and half-word access to the target's
//!   address space, plus core register writes.
//! * [`DebugPort`] provides DP register access and routed AP register
//!   access, caching the AP/bank selection.
//! * [`SwdTransport`] is implemented by the adapter driver, which performs
//!   the individual SWD transactions.
//!
//! `gecko-swd` uses the [`gecko_core`] library for typed register
//! definitions and the [`gecko_loader`] library for the flash loader
//! mailbox protocol.
//!
//! Every operation is synchronous.  A `DebugPort` and everything built on it
//! must be owned by a single caller at a time.
//!
//! The `sim` feature adds `sim::SimTarget`, an emulated EFM32 implementing
//! [`SwdTransport`], used by this crate's tests.

pub mod config;
pub mod debug;
pub mod flash;
pub mod interface;
pub mod loader;
pub mod map;
pub mod program;
#[cfg(feature = "sim")]
pub mod sim;
pub mod transport;

#[doc(inline)]
pub use crate::config::{Config, Timing};
#[doc(inline)]
pub use crate::debug::{DebugInterface, TargetRunState};
#[doc(inline)]
pub use crate::interface::DebugPort;
#[doc(inline)]
pub use crate::map::MemAp;
#[doc(inline)]
pub use crate::program::{FirmwareImage, ProgramStats, Strategy, program_image};
#[doc(inline)]
pub use crate::transport::{Port, SwdOp, SwdTransport};

use core::fmt;
use gecko_loader::Command;
use serde::Serialize;

/// Core error type used by all gecko-swd objects
///
/// Transport errors are passed through unchanged.  Everything else is a
/// fatal condition for the current operation and carries the register
/// values and poll counts needed to diagnose it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SwdError {
    /// The target answered WAIT.  The transport gave up retrying.
    WaitAck,

    /// The target answered FAULT.  A sticky error is set in CTRL/STAT and
    /// must be cleared through ABORT before further AP traffic.
    FaultAck,

    /// No valid acknowledgement.  The value received is included.
    NoAck(u8),

    /// A parity error was detected while reading from the target.  The data
    /// cannot be trusted.
    ReadParity,

    /// The adapter itself failed, for example a USB or serial error.
    Transport(String),

    /// CTRL/STAT did not report the debug and system domains powered up
    /// after the power-up request.  Nothing else can be done with the
    /// target.
    PowerUpFailure { ctrl_stat: u32 },

    /// DHCSR.S_RESET_ST was still set after the poll budget was spent.
    ResetTimeout { dhcsr: u32, polls: u32 },

    /// The core was not halted after a reset-and-halt sequence.
    HaltVerificationFailure { dhcsr: u32 },

    /// DHCSR.S_REGRDY never set, so a core register transfer could not be
    /// started.
    RegisterNotReady {
        register: u8,
        dhcsr: u32,
        polls: u32,
    },

    /// MSC_STATUS.BUSY never cleared.  This indicates a flash controller
    /// fault.
    FlashBusyTimeout {
        address: u32,
        status: u32,
        polls: u32,
    },

    /// The MSC refused an erase or write (LOCKED or INVADDR).
    FlashFault { address: u32, status: u32 },

    /// The flash loader status word never reported ready.
    FlashLoaderNotReady { status: u32, polls: u32 },

    /// The flash loader completed a request with a non-OK result code.
    LoaderRequestFailed { command: Command, code: u32 },

    /// The flash loader stayed busy for the whole poll budget.
    LoaderRequestTimeout {
        command: Command,
        status: u32,
        polls: u32,
    },

    /// The device information page names a family we cannot program.
    UnsupportedPart { family: u8 },

    /// The firmware image does not fit in the part's flash.
    ImageTooLarge { image_bytes: u32, flash_bytes: u32 },

    /// A firmware or loader image could not be used.
    InvalidImage(String),

    /// While there wasn't a SWD protocol level error, the requested
    /// operation failed, for example the loader wrote an invalid mailbox
    /// word.
    OperationFailed(String),
}

impl SwdError {
    /// Returns true if the error came from the SWD link and the debug port
    /// needs to be reconnected.
    pub fn requires_reset(&self) -> bool {
        matches!(
            self,
            SwdError::NoAck(_) | SwdError::FaultAck | SwdError::ReadParity | SwdError::Transport(_)
        )
    }

    /// Returns true if the error is a transient error that can be retried.
    pub fn requires_retry(&self) -> bool {
        matches!(self, SwdError::WaitAck)
    }

    /// Returns true if a bounded polling loop ran out of budget.
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            SwdError::ResetTimeout { .. }
                | SwdError::RegisterNotReady { .. }
                | SwdError::FlashBusyTimeout { .. }
                | SwdError::FlashLoaderNotReady { .. }
                | SwdError::LoaderRequestTimeout { .. }
        )
    }

    /// Returns a string representation of the error kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SwdError::WaitAck => "Wait ACK",
            SwdError::FaultAck => "Fault ACK",
            SwdError::NoAck(_) => "No ACK",
            SwdError::ReadParity => "Read Parity Error",
            SwdError::Transport(_) => "Transport Error",
            SwdError::PowerUpFailure { .. } => "Power Up Failure",
            SwdError::ResetTimeout { .. } => "Reset Timeout",
            SwdError::HaltVerificationFailure { .. } => "Halt Verification Failure",
            SwdError::RegisterNotReady { .. } => "Register Not Ready",
            SwdError::FlashBusyTimeout { .. } => "Flash Busy Timeout",
            SwdError::FlashFault { .. } => "Flash Fault",
            SwdError::FlashLoaderNotReady { .. } => "Flash Loader Not Ready",
            SwdError::LoaderRequestFailed { .. } => "Loader Request Failed",
            SwdError::LoaderRequestTimeout { .. } => "Loader Request Timeout",
            SwdError::UnsupportedPart { .. } => "Unsupported Part",
            SwdError::ImageTooLarge { .. } => "Image Too Large",
            SwdError::InvalidImage(_) => "Invalid Image",
            SwdError::OperationFailed(_) => "Operation Failed",
        }
    }

    fn detail(&self) -> Option<String> {
        let detail = match self {
            SwdError::WaitAck | SwdError::FaultAck | SwdError::ReadParity => return None,
            SwdError::NoAck(ack) => format!("{ack}"),
            SwdError::Transport(msg)
            | SwdError::InvalidImage(msg)
            | SwdError::OperationFailed(msg) => msg.clone(),
            SwdError::PowerUpFailure { ctrl_stat } => format!("CTRL/STAT 0x{ctrl_stat:08X}"),
            SwdError::ResetTimeout { dhcsr, polls } => {
                format!("DHCSR 0x{dhcsr:08X} after {polls} polls")
            }
            SwdError::HaltVerificationFailure { dhcsr } => format!("DHCSR 0x{dhcsr:08X}"),
            SwdError::RegisterNotReady {
                register,
                dhcsr,
                polls,
            } => format!("register {register}, DHCSR 0x{dhcsr:08X} after {polls} polls"),
            SwdError::FlashBusyTimeout {
                address,
                status,
                polls,
            } => format!("0x{address:08X}, MSC_STATUS 0x{status:08X} after {polls} polls"),
            SwdError::FlashFault { address, status } => {
                format!("0x{address:08X}, MSC_STATUS 0x{status:08X}")
            }
            SwdError::FlashLoaderNotReady { status, polls } => {
                format!("status {status} after {polls} polls")
            }
            SwdError::LoaderRequestFailed { command, code } => format!("{command}: result {code}"),
            SwdError::LoaderRequestTimeout {
                command,
                status,
                polls,
            } => format!("{command}: status {status} after {polls} polls"),
            SwdError::UnsupportedPart { family } => format!("family code {family}"),
            SwdError::ImageTooLarge {
                image_bytes,
                flash_bytes,
            } => format!("{image_bytes} bytes, flash is {flash_bytes} bytes"),
        };
        Some(detail)
    }
}

impl Serialize for SwdError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("SwdError", 2)?;
        state.serialize_field("kind", self.as_str())?;
        state.serialize_field("detail", &self.detail().unwrap_or_default())?;
        state.end()
    }
}

impl fmt::Display for SwdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.detail() {
            Some(detail) => write!(f, "{}: {detail}", self.as_str()),
            None => write!(f, "{}", self.as_str()),
        }
    }
}

impl std::error::Error for SwdError {}
