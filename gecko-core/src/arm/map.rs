// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Memory Access Port Registers

use crate::arm::register::{ApRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_data;
use alloc::{format, string::String};

/// Control/Status Word Register descriptor (read-write)
pub struct CswRegister;

impl RegisterDescriptor for CswRegister {
    const ADDRESS: u8 = 0x00;
    type Value = Csw;
}

impl ReadableRegister for CswRegister {}
impl WritableRegister for CswRegister {}
impl ApRegister for CswRegister {}

/// Control/Status Word register data
///
/// Only the low byte (size and address increment) is ever changed by
/// `gecko-swd`.  The top 24 bits carry implementation-specific bus
/// attributes and are preserved on every read-modify-write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csw(u32);

register_data!(rw Csw);

impl Csw {
    const SIZE_MASK: u32 = 0b111;
    const ADDRINC_MASK: u32 = 0b11;
    const ADDRINC_SHIFT: u32 = 4;

    /// Bits outside the transfer mode byte
    pub const PRESERVED_MASK: u32 = 0xFFFF_FF00;

    pub const SIZE_8BIT: u32 = 0b000;
    pub const SIZE_16BIT: u32 = 0b001;
    pub const SIZE_32BIT: u32 = 0b010;

    pub const ADDRINC_OFF: u32 = 0b00;
    pub const ADDRINC_SINGLE: u32 = 0b01;
    pub const ADDRINC_PACKED: u32 = 0b10;

    /// MasterType: accesses are tagged as coming from the debugger
    pub const MASTER_DEBUG: u32 = 1 << 29;
    /// HPROT1: privileged access
    pub const HPROT_PRIVILEGED: u32 = 1 << 25;

    /// 32-bit, auto-incrementing, privileged debugger accesses.
    pub const fn default_config() -> Self {
        Csw(Self::MASTER_DEBUG
            | Self::HPROT_PRIVILEGED
            | (Self::ADDRINC_SINGLE << Self::ADDRINC_SHIFT)
            | Self::SIZE_32BIT)
    }

    /// Returns a copy with the transfer mode replaced and every other bit
    /// kept.
    pub const fn with_mode(self, addrinc: u32, size: u32) -> Self {
        Csw((self.0 & Self::PRESERVED_MASK)
            | ((addrinc & Self::ADDRINC_MASK) << Self::ADDRINC_SHIFT)
            | (size & Self::SIZE_MASK))
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Get size field
    pub fn size(&self) -> u32 {
        self.0 & Self::SIZE_MASK
    }

    /// Get address increment field
    pub fn addrinc(&self) -> u32 {
        (self.0 >> Self::ADDRINC_SHIFT) & Self::ADDRINC_MASK
    }

    /// Bytes moved by one DRW access in this mode.  Packed transfers always
    /// move a whole word.
    pub fn bytes_per_transfer(&self) -> u32 {
        if self.addrinc() == Self::ADDRINC_PACKED {
            return 4;
        }
        match self.size() {
            Self::SIZE_8BIT => 1,
            Self::SIZE_16BIT => 2,
            _ => 4,
        }
    }

    /// Get transfer configuration description
    pub fn transfer_config(&self) -> String {
        let size = match self.size() {
            Self::SIZE_8BIT => "8-bit",
            Self::SIZE_16BIT => "16-bit",
            Self::SIZE_32BIT => "32-bit",
            _ => "Reserved",
        };

        let addrinc = match self.addrinc() {
            Self::ADDRINC_OFF => "Off",
            Self::ADDRINC_SINGLE => "Single",
            Self::ADDRINC_PACKED => "Packed",
            _ => "Reserved",
        };

        format!("Size: {size}, AddrInc: {addrinc}")
    }
}

impl Default for Csw {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Transfer Address Register descriptor (read-write)
pub struct TarRegister;

impl RegisterDescriptor for TarRegister {
    const ADDRESS: u8 = 0x04;
    type Value = Tar;
}

impl ReadableRegister for TarRegister {}
impl WritableRegister for TarRegister {}
impl ApRegister for TarRegister {}

/// Transfer Address Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Tar(u32);

register_data!(rw Tar);

impl Tar {
    pub fn address(&self) -> u32 {
        self.0
    }
}

/// Data Read/Write Register descriptor (read-write)
pub struct DrwRegister;

impl RegisterDescriptor for DrwRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = Drw;
}

impl ReadableRegister for DrwRegister {}
impl WritableRegister for DrwRegister {}
impl ApRegister for DrwRegister {}

/// Data Read/Write Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Drw(u32);

register_data!(rw Drw);

impl Drw {
    pub fn data(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn default_config_value() {
        let csw = Csw::default();
        assert_eq!(csw.value(), 0x2200_0012);
        assert_eq!(csw.size(), Csw::SIZE_32BIT);
        assert_eq!(csw.addrinc(), Csw::ADDRINC_SINGLE);
    }

    #[test_case(Csw::ADDRINC_OFF, Csw::SIZE_32BIT, 0xA300_0002, 4; "non incrementing word")]
    #[test_case(Csw::ADDRINC_PACKED, Csw::SIZE_16BIT, 0xA300_0021, 4; "packed half words")]
    #[test_case(Csw::ADDRINC_SINGLE, Csw::SIZE_16BIT, 0xA300_0011, 2; "single half word")]
    #[test_case(Csw::ADDRINC_SINGLE, Csw::SIZE_8BIT, 0xA300_0010, 1; "single byte")]
    fn with_mode_keeps_top_bits(addrinc: u32, size: u32, expected: u32, bytes: u32) {
        let current = Csw::from(0xA300_00D2);
        let csw = current.with_mode(addrinc, size);
        assert_eq!(csw.value(), expected);
        assert_eq!(csw.bytes_per_transfer(), bytes);
    }
}
