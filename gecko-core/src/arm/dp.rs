// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Port Registers

use crate::arm::Cortex;
use crate::arm::register::{DpRegister, ReadableRegister, RegisterDescriptor, WritableRegister};
use crate::register_data;
use alloc::{format, string::String};
use core::fmt;

/// IDCODE Register descriptor (read-only)
pub struct IdCodeRegister;

impl RegisterDescriptor for IdCodeRegister {
    const ADDRESS: u8 = 0x00;
    type Value = IdCode;
}

impl ReadableRegister for IdCodeRegister {}
impl DpRegister for IdCodeRegister {}

/// ARM Debug Port IDCODE register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IdCode(u32);

register_data!(r IdCode);

impl IdCode {
    const JEP106_ARM: u16 = 0x23B;

    pub const fn from_u32(value: u32) -> Self {
        IdCode(value)
    }

    pub fn data(&self) -> u32 {
        self.0
    }

    /// Get revision field (bits 31:28)
    pub fn revision(&self) -> u8 {
        ((self.0 >> 28) & 0xF) as u8
    }

    /// Get part number (bits 27:20)
    pub fn part_number(&self) -> u8 {
        ((self.0 >> 20) & 0xFF) as u8
    }

    /// Get version (bits 15:12)
    pub fn version(&self) -> u8 {
        ((self.0 >> 12) & 0xF) as u8
    }

    /// Get JEDEC designer ID (bits 11:1)
    pub fn designer_id(&self) -> u16 {
        ((self.0 >> 1) & 0x7FF) as u16
    }

    /// Bit 0 reads as one on every valid IDCODE
    pub fn is_valid(&self) -> bool {
        (self.0 & 1) == 1
    }

    /// Get manufacturer name if known
    pub fn designer_name(&self) -> &'static str {
        match self.designer_id() {
            Self::JEP106_ARM => "ARM Ltd",
            _ => "Unknown",
        }
    }

    /// The core this debug port belongs to, if it is one we accept.
    pub fn cortex(&self) -> Option<Cortex> {
        Cortex::from_idcode(*self)
    }

    /// Whether this IDCODE is one of the accepted debug ports.  Others are
    /// still usable, but untested.
    pub fn is_accepted(&self) -> bool {
        self.cortex().is_some()
    }
}

impl fmt::LowerHex for IdCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

/// ABORT Register descriptor (write-only)
pub struct AbortRegister;

impl RegisterDescriptor for AbortRegister {
    const ADDRESS: u8 = 0x00;
    type Value = Abort;
}

impl WritableRegister for AbortRegister {}
impl DpRegister for AbortRegister {}

/// ARM Debug Port ABORT register data
///
/// Built from the individual clear requests:
///
/// ```
/// use gecko_core::arm::dp::Abort;
/// let abort = Abort::default().orunerrclr(true).stkerrclr(true);
/// assert_eq!(u32::from(abort), 0x14);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Abort(u32);

register_data!(w Abort);

impl Abort {
    const DAPABORT: u32 = 1 << 0;
    const STKCMPCLR: u32 = 1 << 1;
    const STKERRCLR: u32 = 1 << 2;
    const WDERRCLR: u32 = 1 << 3;
    const ORUNERRCLR: u32 = 1 << 4;

    /// Builds the value from each named field at once.
    pub const fn new(
        orun: bool,
        wdata: bool,
        sticky_err: bool,
        sticky_cmp: bool,
        dap: bool,
    ) -> Self {
        let mut value = 0;
        if orun {
            value |= Self::ORUNERRCLR;
        }
        if wdata {
            value |= Self::WDERRCLR;
        }
        if sticky_err {
            value |= Self::STKERRCLR;
        }
        if sticky_cmp {
            value |= Self::STKCMPCLR;
        }
        if dap {
            value |= Self::DAPABORT;
        }
        Abort(value)
    }

    /// Clears every sticky flag, without aborting the current transaction.
    pub const fn clear_all() -> Self {
        Self::new(true, true, true, true, false)
    }

    fn with(self, bit: u32, enable: bool) -> Self {
        if enable {
            Abort(self.0 | bit)
        } else {
            Abort(self.0 & !bit)
        }
    }

    /// Abort the current AP transaction
    pub fn dapabort(self, enable: bool) -> Self {
        self.with(Self::DAPABORT, enable)
    }

    /// Clear STICKYCMP
    pub fn stkcmpclr(self, enable: bool) -> Self {
        self.with(Self::STKCMPCLR, enable)
    }

    /// Clear STICKYERR
    pub fn stkerrclr(self, enable: bool) -> Self {
        self.with(Self::STKERRCLR, enable)
    }

    /// Clear WDATAERR
    pub fn wderrclr(self, enable: bool) -> Self {
        self.with(Self::WDERRCLR, enable)
    }

    /// Clear STICKYORUN
    pub fn orunerrclr(self, enable: bool) -> Self {
        self.with(Self::ORUNERRCLR, enable)
    }
}

/// CTRL/STAT Register descriptor (read-write)
pub struct CtrlStatRegister;

impl RegisterDescriptor for CtrlStatRegister {
    const ADDRESS: u8 = 0x04;
    type Value = CtrlStat;
}

impl ReadableRegister for CtrlStatRegister {}
impl WritableRegister for CtrlStatRegister {}
impl DpRegister for CtrlStatRegister {}

/// ARM Debug Port CTRL/STAT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CtrlStat(u32);

register_data!(rw CtrlStat);

impl CtrlStat {
    const ORUNDETECT: u32 = 1 << 0;
    const STICKYORUN: u32 = 1 << 1;

    const TRNMODE_MASK: u32 = 0b11;
    const TRNMODE_SHIFT: u32 = 2;

    const STICKYCMP: u32 = 1 << 4;
    const STICKYERR: u32 = 1 << 5;
    const READOK: u32 = 1 << 6;
    const WDATAERR: u32 = 1 << 7;

    const MASKLANE_MASK: u32 = 0xF;
    const MASKLANE_SHIFT: u32 = 8;

    const TRNCNT_MASK: u32 = 0xFFF;
    const TRNCNT_SHIFT: u32 = 12;

    const CDBGPWRUPREQ: u32 = 1 << 28;
    const CDBGPWRUPACK: u32 = 1 << 29;
    const CSYSPWRUPREQ: u32 = 1 << 30;
    const CSYSPWRUPACK: u32 = 1 << 31;

    /// CSYSPWRUPREQ, CDBGPWRUPREQ and CDBGRSTREQ
    pub const POWER_UP_REQUEST: u32 = 0x5400_0000;

    /// Top byte of CTRL/STAT once both domains have acknowledged power-up
    pub const POWERED_TOP_BYTE: u8 = 0xF4;

    pub const TRNMODE_NORMAL: u32 = 0b00;
    pub const TRNMODE_VERIFY: u32 = 0b01;
    pub const TRNMODE_COMPARE: u32 = 0b10;

    /// Builds a CTRL/STAT write keeping the power-up requests asserted.
    pub const fn control(trn_count: u32, mask_lane: u32, trn_mode: u32, orun_detect: bool) -> Self {
        CtrlStat(
            Self::POWER_UP_REQUEST
                | ((trn_count & Self::TRNCNT_MASK) << Self::TRNCNT_SHIFT)
                | ((mask_lane & Self::MASKLANE_MASK) << Self::MASKLANE_SHIFT)
                | ((trn_mode & Self::TRNMODE_MASK) << Self::TRNMODE_SHIFT)
                | (if orun_detect { Self::ORUNDETECT } else { 0 }),
        )
    }

    /// The bare power-up request
    pub const fn power_up_request() -> Self {
        CtrlStat(Self::POWER_UP_REQUEST)
    }

    /// Get raw register value
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Whether the top byte shows the debug and system domains powered.
    pub fn is_powered(&self) -> bool {
        (self.0 >> 24) as u8 == Self::POWERED_TOP_BYTE
    }

    pub fn orundetect(&self) -> bool {
        self.0 & Self::ORUNDETECT != 0
    }

    pub fn stickyorun(&self) -> bool {
        self.0 & Self::STICKYORUN != 0
    }

    pub fn trnmode(&self) -> u32 {
        (self.0 >> Self::TRNMODE_SHIFT) & Self::TRNMODE_MASK
    }

    pub fn stickycmp(&self) -> bool {
        self.0 & Self::STICKYCMP != 0
    }

    pub fn stickyerr(&self) -> bool {
        self.0 & Self::STICKYERR != 0
    }

    pub fn readok(&self) -> bool {
        self.0 & Self::READOK != 0
    }

    pub fn wdataerr(&self) -> bool {
        self.0 & Self::WDATAERR != 0
    }

    pub fn masklane(&self) -> u32 {
        (self.0 >> Self::MASKLANE_SHIFT) & Self::MASKLANE_MASK
    }

    pub fn trncnt(&self) -> u32 {
        (self.0 >> Self::TRNCNT_SHIFT) & Self::TRNCNT_MASK
    }

    pub fn cdbgpwrupreq(&self) -> bool {
        self.0 & Self::CDBGPWRUPREQ != 0
    }

    pub fn cdbgpwrupack(&self) -> bool {
        self.0 & Self::CDBGPWRUPACK != 0
    }

    pub fn csyspwrupreq(&self) -> bool {
        self.0 & Self::CSYSPWRUPREQ != 0
    }

    pub fn csyspwrupack(&self) -> bool {
        self.0 & Self::CSYSPWRUPACK != 0
    }

    pub fn has_errors(&self) -> bool {
        self.stickyorun() || self.stickycmp() || self.stickyerr() || self.wdataerr()
    }

    /// Get error state description
    pub fn error_states(&self) -> String {
        let names = [
            (self.stickyorun(), "STICKYORUN"),
            (self.stickycmp(), "STICKYCMP"),
            (self.stickyerr(), "STICKYERR"),
            (self.wdataerr(), "WDATAERR"),
        ];
        let mut errors = String::new();
        for (_, name) in names.iter().filter(|(set, _)| *set) {
            if !errors.is_empty() {
                errors.push_str(", ");
            }
            errors.push_str(name);
        }

        if errors.is_empty() {
            format!("No errors{}", if self.readok() { " (READOK)" } else { "" })
        } else {
            format!("Errors: {errors}")
        }
    }

    /// Get power state description
    pub fn power_states(&self) -> String {
        format!(
            "Debug: {}/{}, System: {}/{}",
            if self.cdbgpwrupreq() { "REQ" } else { "off" },
            if self.cdbgpwrupack() { "ACK" } else { "nak" },
            if self.csyspwrupreq() { "REQ" } else { "off" },
            if self.csyspwrupack() { "ACK" } else { "nak" }
        )
    }
}

/// SELECT Register descriptor (write)
pub struct SelectRegister;

impl RegisterDescriptor for SelectRegister {
    const ADDRESS: u8 = 0x08;
    type Value = Select;
}

impl WritableRegister for SelectRegister {}
impl DpRegister for SelectRegister {}

/// ARM Debug Port SELECT register data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select(u32);

register_data!(rw Select);

impl Select {
    const APSEL_MASK: u32 = 0xFF;
    const APSEL_SHIFT: u32 = 24;

    const APBANKSEL_MASK: u32 = 0xF;
    const APBANKSEL_SHIFT: u32 = 4;

    /// Selects register bank `bank` of access port `apsel`.
    pub const fn new(apsel: u8, bank: u8) -> Self {
        Select(
            ((apsel as u32 & Self::APSEL_MASK) << Self::APSEL_SHIFT)
                | ((bank as u32 & Self::APBANKSEL_MASK) << Self::APBANKSEL_SHIFT),
        )
    }

    /// Selects the bank holding AP register `addr`.
    pub const fn for_ap_register(apsel: u8, addr: u8) -> Self {
        Self::new(apsel, (addr >> 4) & 0xF)
    }

    pub fn value(&self) -> u32 {
        self.0
    }

    /// Get access port select
    pub fn apsel(&self) -> u8 {
        ((self.0 >> Self::APSEL_SHIFT) & Self::APSEL_MASK) as u8
    }

    /// Get AP bank select
    pub fn apbanksel(&self) -> u8 {
        ((self.0 >> Self::APBANKSEL_SHIFT) & Self::APBANKSEL_MASK) as u8
    }
}

/// RDBUFF Register descriptor (read-only)
pub struct RdBuffRegister;

impl RegisterDescriptor for RdBuffRegister {
    const ADDRESS: u8 = 0x0C;
    type Value = RdBuff;
}

impl ReadableRegister for RdBuffRegister {}
impl DpRegister for RdBuffRegister {}

/// ARM Debug Port RDBUFF register data
///
/// Holds the result of the previous AP read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RdBuff(u32);

register_data!(r RdBuff);

impl RdBuff {
    pub fn data(&self) -> u32 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn control_packs_fields() {
        let ctrl = CtrlStat::control(0xABC, 0x5, CtrlStat::TRNMODE_COMPARE, true);
        assert_eq!(
            ctrl.value(),
            0x5400_0000 | 0xABC << 12 | 0x5 << 8 | 0x2 << 2 | 1
        );
        assert_eq!(ctrl.trncnt(), 0xABC);
        assert_eq!(ctrl.masklane(), 0x5);
        assert_eq!(ctrl.trnmode(), CtrlStat::TRNMODE_COMPARE);
        assert!(ctrl.orundetect());
    }

    #[test]
    fn control_masks_oversized_fields() {
        let ctrl = CtrlStat::control(0x1FFF, 0x1F, 0x7, false);
        assert_eq!(
            ctrl.value(),
            0x5400_0000 | 0xFFF << 12 | 0xF << 8 | 0x3 << 2
        );
    }

    #[test_case(0xF400_0000, true; "powered")]
    #[test_case(0xF400_0040, true; "powered with readok")]
    #[test_case(0xF000_0040, false; "reset request dropped")]
    #[test_case(0x5400_0000, false; "request only")]
    #[test_case(0x0000_0000, false; "off")]
    fn powered_pattern(raw: u32, expected: bool) {
        assert_eq!(CtrlStat::from(raw).is_powered(), expected);
    }

    #[test]
    fn abort_fields() {
        let abort = |orun, wdata, err, cmp, dap| u32::from(Abort::new(orun, wdata, err, cmp, dap));
        assert_eq!(abort(true, false, false, false, false), 0x10);
        assert_eq!(abort(false, true, false, false, false), 0x08);
        assert_eq!(abort(false, false, true, false, false), 0x04);
        assert_eq!(abort(false, false, false, true, false), 0x02);
        assert_eq!(abort(false, false, false, false, true), 0x01);
        assert_eq!(u32::from(Abort::clear_all()), 0x1E);

        let toggled = Abort::default().dapabort(true).dapabort(false);
        assert_eq!(u32::from(toggled), 0);
    }

    #[test]
    fn select_layout() {
        let select = Select::new(0, 0xF);
        assert_eq!(select.value(), 0x0000_00F0);
        let select = Select::new(0x12, 0x3);
        assert_eq!(select.value(), 0x1200_0030);
        assert_eq!(select.apsel(), 0x12);
        assert_eq!(select.apbanksel(), 0x3);
        assert_eq!(Select::for_ap_register(0, 0xFC), Select::new(0, 0xF));
    }

    #[test]
    fn idcode_fields() {
        let idcode = IdCode::from(0x2BA0_1477);
        assert!(idcode.is_valid());
        assert_eq!(idcode.revision(), 2);
        assert_eq!(idcode.part_number(), 0xBA);
        assert_eq!(idcode.designer_name(), "ARM Ltd");
        assert!(idcode.is_accepted());
        assert!(!IdCode::from(0x4C01_3477).is_accepted());
    }
}
