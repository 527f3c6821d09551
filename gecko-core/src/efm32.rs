// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! gecko-core - EFM32 specific objects

use alloc::{format, string::String};
use core::fmt;
use static_assertions::const_assert;

use crate::arm::register::MemoryMappedRegister;
use crate::register_data;

/// Start of main flash
pub const FLASH_BASE: u32 = 0x0000_0000;

/// Start of SRAM
pub const RAM_BASE: u32 = 0x2000_0000;

/// Value of an erased flash byte
pub const ERASED_BYTE: u8 = 0xFF;

/// Value of an erased flash word
pub const ERASED_WORD: u32 = u32::from_le_bytes([ERASED_BYTE; 4]);

// Memory System Controller register base address
const MSC_REG_BASE: u32 = 0x400C_0000;

/// MSC_WRITECTL register
///
/// Enables flash writes and erases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MscWriteCtl(u32);

register_data!(rw MscWriteCtl);

impl MemoryMappedRegister for MscWriteCtl {
    const ADDRESS: u32 = MSC_REG_BASE + 0x008;
    type Value = MscWriteCtl;
}

impl MscWriteCtl {
    pub const WREN_BIT: u32 = 0;

    pub const fn write_enable() -> Self {
        MscWriteCtl(1 << Self::WREN_BIT)
    }

    pub const fn write_disable() -> Self {
        MscWriteCtl(0)
    }

    pub fn wren(&self) -> bool {
        (self.0 >> Self::WREN_BIT) & 1 != 0
    }
}

/// MSC_WRITECMD register
///
/// Each write triggers one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MscWriteCmd(u32);

register_data!(rw MscWriteCmd);

impl MemoryMappedRegister for MscWriteCmd {
    const ADDRESS: u32 = MSC_REG_BASE + 0x00C;
    type Value = MscWriteCmd;
}

impl MscWriteCmd {
    pub const LADDRIM_BIT: u32 = 0;
    pub const ERASEPAGE_BIT: u32 = 1;
    pub const WRITEEND_BIT: u32 = 2;
    pub const WRITEONCE_BIT: u32 = 3;

    /// Load MSC_ADDRB into the internal address register
    pub const fn load_address() -> Self {
        MscWriteCmd(1 << Self::LADDRIM_BIT)
    }

    /// Erase the page holding the loaded address
    pub const fn erase_page() -> Self {
        MscWriteCmd(1 << Self::ERASEPAGE_BIT)
    }

    /// Program MSC_WDATA at the loaded address
    pub const fn write_trigger() -> Self {
        MscWriteCmd(1 << Self::WRITEONCE_BIT)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }
}

/// MSC_ADDRB register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MscAddrb(u32);

register_data!(rw MscAddrb);

impl MemoryMappedRegister for MscAddrb {
    const ADDRESS: u32 = MSC_REG_BASE + 0x010;
    type Value = MscAddrb;
}

/// MSC_WDATA register
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MscWdata(u32);

register_data!(rw MscWdata);

impl MemoryMappedRegister for MscWdata {
    const ADDRESS: u32 = MSC_REG_BASE + 0x018;
    type Value = MscWdata;
}

/// MSC_STATUS register
///
/// Used to check the status of flash operations, including errors and busy
/// state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MscStatus(u32);

register_data!(rw MscStatus);

impl MemoryMappedRegister for MscStatus {
    const ADDRESS: u32 = MSC_REG_BASE + 0x01C;
    type Value = MscStatus;
}

impl MscStatus {
    pub const BUSY_BIT: u32 = 0;
    pub const LOCKED_BIT: u32 = 1;
    pub const INVADDR_BIT: u32 = 2;
    pub const WDATAREADY_BIT: u32 = 3;

    /// Whether an erase or write is in progress.
    pub fn busy(&self) -> bool {
        (self.0 >> Self::BUSY_BIT) & 1 != 0
    }

    /// The last command targeted a locked page.
    pub fn locked(&self) -> bool {
        (self.0 >> Self::LOCKED_BIT) & 1 != 0
    }

    /// The last command targeted an address outside flash.
    pub fn invaddr(&self) -> bool {
        (self.0 >> Self::INVADDR_BIT) & 1 != 0
    }

    /// MSC_WDATA can accept the next word.
    pub fn wdataready(&self) -> bool {
        (self.0 >> Self::WDATAREADY_BIT) & 1 != 0
    }

    /// Whether the last command was refused.
    pub fn errors(&self) -> bool {
        self.locked() || self.invaddr()
    }
}

/// Device information page: part number, family and production revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PartInfo(u32);

register_data!(r PartInfo);

impl MemoryMappedRegister for PartInfo {
    const ADDRESS: u32 = 0x0FE0_81FC;
    type Value = PartInfo;
}

impl PartInfo {
    /// Bits 15:0, e.g. 890 for an EFM32G890
    pub fn part_number(&self) -> u16 {
        (self.0 & 0xFFFF) as u16
    }

    /// Bits 23:16, see [`Efm32Family`]
    pub fn family_code(&self) -> u8 {
        ((self.0 >> 16) & 0xFF) as u8
    }

    /// Bits 31:24
    pub fn production_revision(&self) -> u8 {
        (self.0 >> 24) as u8
    }
}

/// Device information page: memory sizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MemInfo(u32);

register_data!(r MemInfo);

impl MemoryMappedRegister for MemInfo {
    const ADDRESS: u32 = 0x0FE0_81F8;
    type Value = MemInfo;
}

impl MemInfo {
    pub fn flash_kib(&self) -> u32 {
        self.0 & 0xFFFF
    }

    pub fn ram_kib(&self) -> u32 {
        self.0 >> 16
    }
}

/// ROM table peripheral ID 2, bits 7:4 hold the major revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pid2(u32);

register_data!(r Pid2);

impl MemoryMappedRegister for Pid2 {
    const ADDRESS: u32 = 0xE00F_FFE8;
    type Value = Pid2;
}

/// ROM table peripheral ID 3, bits 7:4 hold the minor revision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pid3(u32);

register_data!(r Pid3);

impl MemoryMappedRegister for Pid3 {
    const ADDRESS: u32 = 0xE00F_FFEC;
    type Value = Pid3;
}

/// Chip revision letter from the ROM table peripheral IDs.
pub fn revision_letter(pid2: Pid2, pid3: Pid3) -> char {
    let rev = (pid2.0 & 0xF0) | ((pid3.0 & 0xF0) >> 4);
    char::from_u32(u32::from(b'A') + rev).unwrap_or('?')
}

/// EFM32 product family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Efm32Family {
    Gecko,
    GiantGecko,
    TinyGecko,
    LeopardGecko,
    WonderGecko,
    ZeroGecko,
}

/// Per-family constants, keyed by the PART_INFO family code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FamilyInfo {
    pub family: Efm32Family,
    pub code: u8,
    pub prefix: &'static str,
    pub page_size: u32,
    pub tar_wrap: u32,
}

/// TAR auto-increment wrap used when the family is not yet known
pub const DEFAULT_TAR_WRAP: u32 = 0x3FF;

pub const FAMILIES: [FamilyInfo; 6] = [
    FamilyInfo {
        family: Efm32Family::Gecko,
        code: 71,
        prefix: "G",
        page_size: 512,
        tar_wrap: 0xFFF,
    },
    FamilyInfo {
        family: Efm32Family::GiantGecko,
        code: 72,
        prefix: "GG",
        page_size: 4096,
        tar_wrap: 0xFFF,
    },
    FamilyInfo {
        family: Efm32Family::TinyGecko,
        code: 73,
        prefix: "TG",
        page_size: 512,
        tar_wrap: 0xFFF,
    },
    FamilyInfo {
        family: Efm32Family::LeopardGecko,
        code: 74,
        prefix: "LG",
        page_size: 2048,
        tar_wrap: 0xFFF,
    },
    FamilyInfo {
        family: Efm32Family::WonderGecko,
        code: 75,
        prefix: "WG",
        page_size: 2048,
        tar_wrap: 0xFFF,
    },
    FamilyInfo {
        family: Efm32Family::ZeroGecko,
        code: 76,
        prefix: "ZG",
        page_size: 1024,
        tar_wrap: 0x3FF,
    },
];

const fn table_is_consistent() -> bool {
    let mut i = 0;
    while i < FAMILIES.len() {
        let info = &FAMILIES[i];
        if info.page_size % 4 != 0 || (info.tar_wrap + 1) % 4 != 0 {
            return false;
        }
        i += 1;
    }
    true
}

const_assert!(table_is_consistent());

impl Efm32Family {
    /// Look up a family by its PART_INFO code
    pub fn from_code(code: u8) -> Option<Efm32Family> {
        FAMILIES
            .iter()
            .find(|info| info.code == code)
            .map(|info| info.family)
    }

    pub fn info(&self) -> &'static FamilyInfo {
        let row = match self {
            Efm32Family::Gecko => 0,
            Efm32Family::GiantGecko => 1,
            Efm32Family::TinyGecko => 2,
            Efm32Family::LeopardGecko => 3,
            Efm32Family::WonderGecko => 4,
            Efm32Family::ZeroGecko => 5,
        };
        &FAMILIES[row]
    }

    pub fn code(&self) -> u8 {
        self.info().code
    }

    /// Letters following "EFM32" in the part name
    pub fn prefix(&self) -> &'static str {
        self.info().prefix
    }

    /// Flash erase page size in bytes
    pub fn page_size(&self) -> u32 {
        self.info().page_size
    }

    /// Mask of the address bits TAR auto-increment covers
    pub fn tar_wrap(&self) -> u32 {
        self.info().tar_wrap
    }
}

impl fmt::Display for Efm32Family {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Efm32Family::Gecko => "Gecko",
            Efm32Family::GiantGecko => "Giant Gecko",
            Efm32Family::TinyGecko => "Tiny Gecko",
            Efm32Family::LeopardGecko => "Leopard Gecko",
            Efm32Family::WonderGecko => "Wonder Gecko",
            Efm32Family::ZeroGecko => "Zero Gecko",
        };
        write!(f, "EFM32 {name}")
    }
}

/// Everything read from an EFM32's device information page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Efm32Details {
    family: Efm32Family,
    part_number: u16,
    production_revision: u8,
    flash_kib: u32,
    ram_kib: u32,
    revision: char,
}

impl Efm32Details {
    /// Decode the identification words.  Returns the raw family code if it
    /// is not one we know.
    pub fn from_raw(
        part_info: PartInfo,
        mem_info: MemInfo,
        pid2: Pid2,
        pid3: Pid3,
    ) -> Result<Self, u8> {
        let code = part_info.family_code();
        let family = Efm32Family::from_code(code).ok_or(code)?;
        Ok(Self {
            family,
            part_number: part_info.part_number(),
            production_revision: part_info.production_revision(),
            flash_kib: mem_info.flash_kib(),
            ram_kib: mem_info.ram_kib(),
            revision: revision_letter(pid2, pid3),
        })
    }

    pub fn family(&self) -> Efm32Family {
        self.family
    }

    pub fn part_number(&self) -> u16 {
        self.part_number
    }

    pub fn production_revision(&self) -> u8 {
        self.production_revision
    }

    pub fn revision(&self) -> char {
        self.revision
    }

    pub fn flash_kib(&self) -> u32 {
        self.flash_kib
    }

    pub fn flash_size_bytes(&self) -> u32 {
        self.flash_kib * 1024
    }

    pub fn ram_kib(&self) -> u32 {
        self.ram_kib
    }

    pub fn page_size(&self) -> u32 {
        self.family.page_size()
    }

    /// Number of erase pages covering all of flash
    pub fn page_count(&self) -> u32 {
        self.flash_size_bytes() / self.page_size()
    }

    pub fn tar_wrap(&self) -> u32 {
        self.family.tar_wrap()
    }

    /// Full part name, for example `EFM32G890F128`
    pub fn part_name(&self) -> String {
        format!(
            "EFM32{}{}F{}",
            self.family.prefix(),
            self.part_number,
            self.flash_kib
        )
    }
}

impl fmt::Display for Efm32Details {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (rev {}, production ID {})",
            self.part_name(),
            self.revision,
            self.production_revision
        )?;
        if f.alternate() {
            write!(
                f,
                ", {}, {} KiB flash in {} byte pages, {} KiB RAM",
                self.family,
                self.flash_kib,
                self.page_size(),
                self.ram_kib
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;
    use test_case::test_case;

    #[test]
    fn erased_word_is_erased_bytes() {
        assert_eq!(ERASED_WORD, 0xFFFF_FFFF);
        assert_eq!(ERASED_WORD.to_le_bytes(), [ERASED_BYTE; 4]);
    }

    #[test_case(71, Efm32Family::Gecko, 512, 0xFFF)]
    #[test_case(72, Efm32Family::GiantGecko, 4096, 0xFFF)]
    #[test_case(73, Efm32Family::TinyGecko, 512, 0xFFF)]
    #[test_case(74, Efm32Family::LeopardGecko, 2048, 0xFFF)]
    #[test_case(75, Efm32Family::WonderGecko, 2048, 0xFFF)]
    #[test_case(76, Efm32Family::ZeroGecko, 1024, 0x3FF)]
    fn family_table(code: u8, family: Efm32Family, page_size: u32, tar_wrap: u32) {
        let found = Efm32Family::from_code(code).unwrap();
        assert_eq!(found, family);
        assert_eq!(found.code(), code);
        assert_eq!(found.page_size(), page_size);
        assert_eq!(found.tar_wrap(), tar_wrap);
        assert_eq!(found.info().family, family);
    }

    #[test]
    fn unknown_family_code() {
        assert_eq!(Efm32Family::from_code(0), None);
        assert_eq!(Efm32Family::from_code(77), None);
        let part = PartInfo::from(0x1150_0000 | 890);
        assert_eq!(
            Efm32Details::from_raw(part, MemInfo::from(0), Pid2::from(0), Pid3::from(0)),
            Err(0x50)
        );
    }

    #[test]
    fn decode_gecko_part() {
        // EFM32G890F128, production ID 17, 128 KiB flash, 16 KiB RAM, rev C
        let part = PartInfo::from(0x1147_0000 | 890);
        let mem = MemInfo::from(0x0010_0080);
        let (pid2, pid3) = (Pid2::from(0x0B), Pid3::from(0x20));
        let details = Efm32Details::from_raw(part, mem, pid2, pid3).unwrap();

        assert_eq!(details.family(), Efm32Family::Gecko);
        assert_eq!(details.flash_size_bytes(), 128 * 1024);
        assert_eq!(details.ram_kib(), 16);
        assert_eq!(details.page_count(), 256);
        assert_eq!(details.part_name(), "EFM32G890F128");
        assert_eq!(
            details.to_string(),
            "EFM32G890F128 (rev C, production ID 17)"
        );
    }

    #[test]
    fn msc_status_bits() {
        assert!(MscStatus::from(0x1).busy());
        assert!(MscStatus::from(0x2).errors());
        assert!(MscStatus::from(0x4).errors());
        assert!(MscStatus::from(0x8).wdataready());
        assert!(!MscStatus::from(0x9).errors());
        assert_eq!(u32::from(MscWriteCmd::write_trigger()), 0x8);
        assert_eq!(MscWriteCtl::ADDRESS, 0x400C_0008);
        assert_eq!(MscStatus::ADDRESS, 0x400C_001C);
    }
}
