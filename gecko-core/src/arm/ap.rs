// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Generic Access Port Registers

use crate::arm::register::{ApRegister, ReadableRegister, RegisterDescriptor};
use crate::register_data;
use alloc::{format, string::String};

/// Access Port Identification Register descriptor
pub struct IdrRegister;

impl RegisterDescriptor for IdrRegister {
    const ADDRESS: u8 = 0xFC;
    type Value = Idr;
}

impl ReadableRegister for IdrRegister {}
impl ApRegister for IdrRegister {}

/// Access Port Identification Register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Idr(u32);

register_data!(r Idr);

impl Idr {
    const REVISION_SHIFT: u32 = 28;
    const DESIGNER_MASK: u32 = 0x7FF;
    const DESIGNER_SHIFT: u32 = 17;
    const CLASS_MASK: u32 = 0xF;
    const CLASS_SHIFT: u32 = 13;
    const TYPE_MASK: u32 = 0xF;

    /// Memory Access Port
    pub const CLASS_MEM_AP: u32 = 0x8;

    pub const AP_TYPE_AMBA_AHB3: u32 = 0x1;

    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// Get revision field (bits 31:28)
    pub fn revision(&self) -> u32 {
        self.0 >> Self::REVISION_SHIFT
    }

    /// Get designer field (bits 27:17)
    pub fn designer(&self) -> u32 {
        (self.0 >> Self::DESIGNER_SHIFT) & Self::DESIGNER_MASK
    }

    /// Get class field (bits 16:13)
    pub fn class(&self) -> u32 {
        (self.0 >> Self::CLASS_SHIFT) & Self::CLASS_MASK
    }

    /// Get AP type field (bits 3:0)
    pub fn ap_type(&self) -> u32 {
        self.0 & Self::TYPE_MASK
    }

    /// Whether this AP is a MEM-AP on an AHB bus
    pub fn is_ahb_mem_ap(&self) -> bool {
        self.class() == Self::CLASS_MEM_AP && self.ap_type() == Self::AP_TYPE_AMBA_AHB3
    }

    /// Whether this matches one of the AHB-AP IDRs found on EFM32 parts
    pub fn is_known(&self) -> bool {
        IDR_AHB_AP_KNOWN.contains(self)
    }

    /// Get formatted information string
    pub fn idr_info(&self) -> String {
        format!(
            "Designer: 0x{:03X}, Class: 0x{:X}, Type: 0x{:X}, Rev: 0x{:X}",
            self.designer(),
            self.class(),
            self.ap_type(),
            self.revision()
        )
    }
}

/// Cortex-M0+ AHB-AP IDR value
pub const IDR_AHB_AP_CORTEX_M0_PLUS: Idr = Idr::new(0x04770031);

/// Cortex-M3 and Cortex-M4 AHB-AP IDR value
pub const IDR_AHB_AP_CORTEX_M3_M4: Idr = Idr::new(0x24770011);

pub const IDR_AHB_AP_KNOWN: [Idr; 2] = [IDR_AHB_AP_CORTEX_M0_PLUS, IDR_AHB_AP_CORTEX_M3_M4];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_idrs_are_ahb_mem_aps() {
        for idr in IDR_AHB_AP_KNOWN {
            assert_eq!(idr.class(), Idr::CLASS_MEM_AP, "{idr}");
            assert_eq!(idr.designer(), 0x23B, "{idr}");
            assert!(idr.is_known());
        }
        assert!(IDR_AHB_AP_CORTEX_M3_M4.is_ahb_mem_ap());
        assert!(!Idr::new(0).is_known());
    }
}
