// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Contains ARM specific objects and routines

pub mod ap;
pub mod dp;
pub mod map;
pub mod register;
pub mod scs;

use core::fmt;

use dp::IdCode;

/// ARM Cortex core type, as identified by its SW-DP IDCODE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cortex {
    /// Cortex-M0 (as found on NUC1xx parts)
    M0,
    /// Cortex-M0+ (EFM32 Zero Gecko)
    M0Plus,
    /// Cortex-M3 (EFM32 Gecko, Giant, Tiny, Leopard)
    M3,
    /// Cortex-M4 (EFM32 Wonder Gecko)
    M4,
}

impl Cortex {
    pub const IDCODE_M0: IdCode = IdCode::from_u32(0x0BB11477);
    pub const IDCODE_M0_PLUS: IdCode = IdCode::from_u32(0x0BC11477);
    pub const IDCODE_M3: IdCode = IdCode::from_u32(0x1BA01477);
    pub const IDCODE_M4: IdCode = IdCode::from_u32(0x2BA01477);

    /// Every IDCODE the debug port layer accepts without warning
    pub const ACCEPTED: [Cortex; 4] = [Cortex::M3, Cortex::M4, Cortex::M0, Cortex::M0Plus];

    /// Returns the DP IDCODE for this core type
    pub fn idcode(&self) -> IdCode {
        match self {
            Cortex::M0 => Self::IDCODE_M0,
            Cortex::M0Plus => Self::IDCODE_M0_PLUS,
            Cortex::M3 => Self::IDCODE_M3,
            Cortex::M4 => Self::IDCODE_M4,
        }
    }

    /// Returns the core type as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            Cortex::M0 => "Cortex-M0",
            Cortex::M0Plus => "Cortex-M0+",
            Cortex::M3 => "Cortex-M3",
            Cortex::M4 => "Cortex-M4",
        }
    }

    pub fn from_idcode(idcode: IdCode) -> Option<Cortex> {
        Self::ACCEPTED
            .into_iter()
            .find(|core| core.idcode() == idcode)
    }
}

impl fmt::Display for Cortex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ARM {}", self.as_str())
    }
}
