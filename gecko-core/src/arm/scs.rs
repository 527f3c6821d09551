// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Cortex-M System Control Space debug registers
//!
//! See the ARMv7-M Architecture Reference Manual, part C1.  The same
//! registers exist, at the same addresses, on ARMv6-M (Cortex-M0/M0+).

use core::fmt;

use crate::arm::register::MemoryMappedRegister;
use crate::register_data;

/// Debug Halting Control and Status Register
///
/// Writes must carry the debug key in the top half-word.  Reads return the
/// `S_*` status bits there instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dhcsr(u32);

register_data!(rw Dhcsr);

impl MemoryMappedRegister for Dhcsr {
    const ADDRESS: u32 = 0xE000_EDF0;
    type Value = Dhcsr;
}

impl Dhcsr {
    pub const DBGKEY: u32 = 0xA05F << 16;

    pub const C_DEBUGEN: u32 = 1 << 0;
    pub const C_HALT: u32 = 1 << 1;
    pub const C_STEP: u32 = 1 << 2;

    pub const S_REGRDY: u32 = 1 << 16;
    pub const S_HALT: u32 = 1 << 17;
    pub const S_SLEEP: u32 = 1 << 18;
    pub const S_LOCKUP: u32 = 1 << 19;
    pub const S_RESET_ST: u32 = 1 << 25;

    /// Debug enabled, core running
    pub const fn run() -> Self {
        Dhcsr(Self::DBGKEY | Self::C_DEBUGEN)
    }

    /// Debug enabled, core halted
    pub const fn stop() -> Self {
        Dhcsr(Self::DBGKEY | Self::C_HALT | Self::C_DEBUGEN)
    }

    /// Debug disabled, releasing any halt
    pub const fn unhalt() -> Self {
        Dhcsr(Self::DBGKEY)
    }

    /// Single step one instruction
    pub const fn step() -> Self {
        Dhcsr(Self::DBGKEY | Self::C_STEP | Self::C_DEBUGEN)
    }

    pub fn is_halted(&self) -> bool {
        self.0 & Self::S_HALT != 0
    }

    pub fn is_regrdy(&self) -> bool {
        self.0 & Self::S_REGRDY != 0
    }

    /// The core has been reset since DHCSR was last read.  Clears on read.
    pub fn is_reset(&self) -> bool {
        self.0 & Self::S_RESET_ST != 0
    }

    pub fn is_locked_up(&self) -> bool {
        self.0 & Self::S_LOCKUP != 0
    }

    pub fn is_sleeping(&self) -> bool {
        self.0 & Self::S_SLEEP != 0
    }
}

/// Debug Core Register Selector Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dcrsr(u32);

register_data!(rw Dcrsr);

impl MemoryMappedRegister for Dcrsr {
    const ADDRESS: u32 = 0xE000_EDF4;
    type Value = Dcrsr;
}

impl Dcrsr {
    const REGWNR: u32 = 1 << 16;
    const REGSEL_MASK: u32 = 0x7F;

    /// Transfer DCRDR into `reg`
    pub const fn write(reg: CoreRegister) -> Self {
        Dcrsr(Self::REGWNR | (reg.index() as u32 & Self::REGSEL_MASK))
    }

    /// Transfer `reg` into DCRDR
    pub const fn read(reg: CoreRegister) -> Self {
        Dcrsr(reg.index() as u32 & Self::REGSEL_MASK)
    }
}

/// Debug Core Register Data Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dcrdr(u32);

register_data!(rw Dcrdr);

impl MemoryMappedRegister for Dcrdr {
    const ADDRESS: u32 = 0xE000_EDF8;
    type Value = Dcrdr;
}

impl Dcrdr {
    pub fn data(&self) -> u32 {
        self.0
    }
}

/// Debug Exception and Monitor Control Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Demcr(u32);

register_data!(rw Demcr);

impl MemoryMappedRegister for Demcr {
    const ADDRESS: u32 = 0xE000_EDFC;
    type Value = Demcr;
}

impl Demcr {
    pub const VC_CORERESET: u32 = 1 << 0;

    /// Halt on the reset vector
    pub const fn halt_on_reset() -> Self {
        Demcr(Self::VC_CORERESET)
    }

    pub fn vc_corereset(&self) -> bool {
        self.0 & Self::VC_CORERESET != 0
    }
}

/// Application Interrupt and Reset Control Register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Aircr(u32);

register_data!(rw Aircr);

impl MemoryMappedRegister for Aircr {
    const ADDRESS: u32 = 0xE000_ED0C;
    type Value = Aircr;
}

impl Aircr {
    pub const VECTKEY: u32 = 0x05FA << 16;

    pub const VECTRESET: u32 = 1 << 0;
    pub const VECTCLRACTIVE: u32 = 1 << 1;
    pub const SYSRESETREQ: u32 = 1 << 2;

    /// Whole-system reset request
    pub const fn system_reset() -> Self {
        Aircr(Self::VECTKEY | Self::SYSRESETREQ)
    }

    /// Core-only reset, leaving peripherals and the debug logic untouched
    pub const fn local_reset() -> Self {
        Aircr(Self::VECTKEY | Self::VECTCLRACTIVE | Self::VECTRESET)
    }
}

/// Core registers reachable through DCRSR.  Only the ones `gecko-swd`
/// seeds are named.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreRegister {
    /// General purpose register R0-R12
    R(u8),
    /// Stack pointer (R13)
    Sp,
    /// Link register (R14)
    Lr,
    /// Program counter (R15, DebugReturnAddress)
    Pc,
    /// Program status register
    Xpsr,
}

impl CoreRegister {
    pub const fn index(&self) -> u8 {
        match self {
            CoreRegister::R(n) => *n & 0xF,
            CoreRegister::Sp => 13,
            CoreRegister::Lr => 14,
            CoreRegister::Pc => 15,
            CoreRegister::Xpsr => 16,
        }
    }
}

impl fmt::Display for CoreRegister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreRegister::R(n) => write!(f, "R{n}"),
            CoreRegister::Sp => write!(f, "SP"),
            CoreRegister::Lr => write!(f, "LR"),
            CoreRegister::Pc => write!(f, "PC"),
            CoreRegister::Xpsr => write!(f, "xPSR"),
        }
    }
}
