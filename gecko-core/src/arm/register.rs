// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Register Access Traits
//!
//! These give strongly typed access to the registers `gecko-swd` drives:
//!
//! * DP registers, via `gecko_swd::DebugPort::read_dp_register` and
//!   `gecko_swd::DebugPort::write_dp_register`
//! * AP registers, via `gecko_swd::DebugPort::read_ap_register` and
//!   `gecko_swd::DebugPort::write_ap_register`
//! * memory-mapped registers (Cortex-M SCS, EFM32 MSC), via
//!   `gecko_swd::MemAp::read_register` and `gecko_swd::MemAp::write_register`

/// Base trait for DP and AP register descriptors.
///
/// `ADDRESS` is the byte address of the register.  For the DP this is one
/// of 0x0, 0x4, 0x8, 0xC.  For an AP it is the full 8-bit offset, the upper
/// nibble of which selects the register bank.
pub trait RegisterDescriptor {
    const ADDRESS: u8;
    type Value;

    /// The 2-bit in-bank address sent on the wire (A[3:2])
    fn wire_address() -> u8 {
        (Self::ADDRESS >> 2) & 0x3
    }

    /// The 4-bit register bank
    fn bank() -> u8 {
        (Self::ADDRESS >> 4) & 0xF
    }
}

/// Registers that can be read
pub trait ReadableRegister: RegisterDescriptor {
    /// Convert raw 32-bit data to register value
    fn from_raw(data: u32) -> Self::Value
    where
        Self::Value: From<u32>,
    {
        Self::Value::from(data)
    }
}

/// Registers that can be written
pub trait WritableRegister: RegisterDescriptor {
    /// Convert register value to raw 32-bit data
    fn to_raw(value: Self::Value) -> u32
    where
        Self::Value: Into<u32>,
    {
        value.into()
    }
}

/// Debug Port registers (accessed via DP operations)
pub trait DpRegister: RegisterDescriptor {}

/// Access Port registers (accessed via AP operations)
pub trait ApRegister: RegisterDescriptor {}

/// Registers living in the target's address space, reached through a
/// MEM-AP rather than directly over SWD.
pub trait MemoryMappedRegister {
    const ADDRESS: u32;
    type Value: From<u32> + Into<u32>;
}

/// Generate the conversions and `Display` for a register data type.
///
/// `r` types can be built from a raw read, `w` types converted to a raw
/// write, `rw` both.  All get `Display` as `0x%08X`.
#[macro_export]
macro_rules! register_data {
    (@display $name:ident) => {
        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "0x{:08X}", self.0)
            }
        }
    };
    (@from_raw $name:ident) => {
        impl From<u32> for $name {
            fn from(value: u32) -> Self {
                $name(value)
            }
        }
    };
    (@to_raw $name:ident) => {
        impl From<$name> for u32 {
            fn from(value: $name) -> u32 {
                value.0
            }
        }
    };
    (r $name:ident) => {
        $crate::register_data!(@from_raw $name);
        $crate::register_data!(@to_raw $name);
        $crate::register_data!(@display $name);
    };
    (w $name:ident) => {
        $crate::register_data!(@to_raw $name);
        $crate::register_data!(@display $name);
    };
    (rw $name:ident) => {
        $crate::register_data!(@from_raw $name);
        $crate::register_data!(@to_raw $name);
        $crate::register_data!(@display $name);
    };
}
