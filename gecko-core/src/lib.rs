// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! gecko-core - Core debug and MCU concepts used to program EFM32 parts.
//!
//! Designed to be used in conjunction with the `gecko-swd` library, which
//! drives these registers over Serial Wire Debug (SWD).
//!
//! * [`arm`] holds typed ARM Debug Port, MEM-AP and Cortex-M debug
//!   registers.
//! * [`efm32`] holds the EFM32 flash controller (MSC) registers, the device
//!   information words and the family table.
//!
//! This library is `no_std` compatible, and requires an `alloc`
//! implementation.

#![no_std]

pub mod arm;
pub mod efm32;

extern crate alloc;
use core::fmt;

use crate::arm::Cortex;
use crate::arm::dp::IdCode;
use crate::efm32::Efm32Details;

/// Represents a target's microcontroller unit.
///
/// `gecko-swd` identifies the MCU using this object.  See
/// `gecko_swd::DebugInterface::identify()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mcu {
    /// An EFM32 part, with its identification words decoded.
    Efm32 {
        idcode: IdCode,
        details: Efm32Details,
    },

    /// An unknown MCU, identified by its IDCODE.
    Unknown(IdCode),
}

impl Mcu {
    /// Returns the MCU's debug port IDCODE.
    pub fn idcode(&self) -> IdCode {
        match self {
            Mcu::Efm32 { idcode, .. } => *idcode,
            Mcu::Unknown(idcode) => *idcode,
        }
    }

    /// Returns the core type, if the IDCODE is one we recognise.
    pub fn cortex(&self) -> Option<Cortex> {
        self.idcode().cortex()
    }

    /// Returns the decoded EFM32 details if available.
    pub fn details(&self) -> Option<&Efm32Details> {
        match self {
            Mcu::Efm32 { details, .. } => Some(details),
            Mcu::Unknown(_) => None,
        }
    }

    /// Returns MCU's flash base address if available.
    pub fn flash_base(&self) -> Option<u32> {
        self.details().map(|_| efm32::FLASH_BASE)
    }

    /// Returns the MCU's RAM base address if available.
    pub fn ram_base(&self) -> Option<u32> {
        self.details().map(|_| efm32::RAM_BASE)
    }

    /// Returns the MCU's flash size in bytes if available.
    pub fn flash_size_bytes(&self) -> Option<u32> {
        self.details().map(Efm32Details::flash_size_bytes)
    }

    /// Returns the MCU's RAM size in bytes if available.
    pub fn ram_size_bytes(&self) -> Option<u32> {
        self.details().map(|details| details.ram_kib() * 1024)
    }

    /// Returns the flash erase page size in bytes if available.
    pub fn page_size(&self) -> Option<u32> {
        self.details().map(Efm32Details::page_size)
    }

    /// Returns the TAR auto-increment wrap mask for this MCU.
    pub fn tar_wrap(&self) -> u32 {
        self.details()
            .map(Efm32Details::tar_wrap)
            .unwrap_or(efm32::DEFAULT_TAR_WRAP)
    }
}

impl fmt::Display for Mcu {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mcu::Efm32 { idcode, details } => {
                if f.alternate() {
                    write!(f, "{details:#} (IDCODE: {idcode})")
                } else {
                    write!(f, "{details}")
                }
            }
            Mcu::Unknown(idcode) => write!(f, "Unknown MCU (IDCODE: {idcode})"),
        }
    }
}
