// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! gecko-loader - the mailbox protocol shared by the host and the flash
//! loader running in EFM32 RAM.
//!
//! The loader image is written to [`RAM_START`].  Its first two words are
//! the initial stack pointer and entry point.  The words from
//! [`STATE_LOCATION`] onwards are reserved by the image for the mailbox:
//!
//! ```text
//!   offset  word
//!   0x10    status          NotReady / Ready / Busy / Error
//!   0x14    command         None / ErasePages / Write
//!   0x18    arg: address    flash address
//!   0x1C    arg: length     page count (erase) or byte count (write)
//!   0x20    arg: crc        CRC-32 of the staged payload (write)
//!   0x24    result          ResultCode of the last request
//!   0x28    buffer address  staging buffer, published by the loader
//!   0x2C    buffer size     staging buffer size in bytes
//! ```
//!
//! A request is issued by the host:
//!
//! 1. (write only) copy the payload into the staging buffer
//! 2. write the three argument words
//! 3. set status to [`Status::Busy`]
//! 4. write the command word
//!
//! The loader performs the request, stores a [`ResultCode`], clears the
//! command word and sets status to [`Status::Ready`] or [`Status::Error`].
//!
//! This crate is `no_std` and platform agnostic, so it can be built into the
//! loader itself.

#![no_std]

use core::fmt;
use crc::{CRC_32_ISO_HDLC, Crc};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

/// Address the loader image is written to
pub const RAM_START: u32 = 0x2000_0000;

/// Address of the loader status word, the first mailbox word
pub const STATE_LOCATION: u32 = RAM_START + 0x10;

/// Words from the start of the image reserved for the mailbox
pub const MAILBOX_END_OFFSET: u32 = 0x30;

/// Status word values
pub const STATUS_NOT_READY: u32 = 0;
pub const STATUS_READY: u32 = 1;
pub const STATUS_BUSY: u32 = 2;
pub const STATUS_ERROR: u32 = 3;

/// Command word values
pub const CMD_NONE: u32 = 0;
pub const CMD_ERASE_PAGES: u32 = 1;
pub const CMD_WRITE: u32 = 2;

/// Result word values
pub const RESULT_OK: u32 = 0;
pub const RESULT_UNKNOWN_COMMAND: u32 = 1;
pub const RESULT_BAD_ADDRESS: u32 = 2;
pub const RESULT_CRC_MISMATCH: u32 = 3;
pub const RESULT_FLASH_FAULT: u32 = 4;

const PAYLOAD_CRC: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);

/// Addresses of each mailbox word for a loader placed at `base`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Mailbox {
    base: u32,
}

impl Default for Mailbox {
    fn default() -> Self {
        Self::new(RAM_START)
    }
}

impl Mailbox {
    pub const fn new(base: u32) -> Self {
        Self { base }
    }

    pub const fn status(&self) -> u32 {
        self.base + 0x10
    }

    pub const fn command(&self) -> u32 {
        self.base + 0x14
    }

    /// The three argument words, in order
    pub const fn args(&self) -> u32 {
        self.base + 0x18
    }

    pub const fn result(&self) -> u32 {
        self.base + 0x24
    }

    pub const fn buffer_address(&self) -> u32 {
        self.base + 0x28
    }

    pub const fn buffer_size(&self) -> u32 {
        self.base + 0x2C
    }
}

/// Loader status word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    NotReady = STATUS_NOT_READY,
    Ready = STATUS_READY,
    Busy = STATUS_BUSY,
    Error = STATUS_ERROR,
}

impl Status {
    pub fn to_word(self) -> u32 {
        self as u32
    }

    pub fn from_word(word: u32) -> Result<Self, ProtocolError> {
        match word {
            STATUS_NOT_READY => Ok(Self::NotReady),
            STATUS_READY => Ok(Self::Ready),
            STATUS_BUSY => Ok(Self::Busy),
            STATUS_ERROR => Ok(Self::Error),
            _ => Err(ProtocolError::Status(word)),
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Status::NotReady => write!(f, "Not Ready"),
            Status::Ready => write!(f, "Ready"),
            Status::Busy => write!(f, "Busy"),
            Status::Error => write!(f, "Error"),
        }
    }
}

/// Loader command word
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Command {
    None = CMD_NONE,
    ErasePages = CMD_ERASE_PAGES,
    Write = CMD_WRITE,
}

impl Command {
    pub fn to_word(self) -> u32 {
        self as u32
    }

    pub fn from_word(word: u32) -> Result<Self, ProtocolError> {
        match word {
            CMD_NONE => Ok(Self::None),
            CMD_ERASE_PAGES => Ok(Self::ErasePages),
            CMD_WRITE => Ok(Self::Write),
            _ => Err(ProtocolError::Command(word)),
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::None => write!(f, "None"),
            Command::ErasePages => write!(f, "Erase Pages"),
            Command::Write => write!(f, "Write"),
        }
    }
}

/// Outcome of the last request, as stored by the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum ResultCode {
    Ok = RESULT_OK,
    UnknownCommand = RESULT_UNKNOWN_COMMAND,
    BadAddress = RESULT_BAD_ADDRESS,
    CrcMismatch = RESULT_CRC_MISMATCH,
    FlashFault = RESULT_FLASH_FAULT,
}

impl ResultCode {
    pub fn to_word(self) -> u32 {
        self as u32
    }

    pub fn from_word(word: u32) -> Result<Self, ProtocolError> {
        match word {
            RESULT_OK => Ok(Self::Ok),
            RESULT_UNKNOWN_COMMAND => Ok(Self::UnknownCommand),
            RESULT_BAD_ADDRESS => Ok(Self::BadAddress),
            RESULT_CRC_MISMATCH => Ok(Self::CrcMismatch),
            RESULT_FLASH_FAULT => Ok(Self::FlashFault),
            _ => Err(ProtocolError::Result(word)),
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResultCode::Ok => write!(f, "OK"),
            ResultCode::UnknownCommand => write!(f, "Unknown Command"),
            ResultCode::BadAddress => write!(f, "Bad Address"),
            ResultCode::CrcMismatch => write!(f, "CRC Mismatch"),
            ResultCode::FlashFault => write!(f, "Flash Fault"),
        }
    }
}

/// Mailbox word that did not decode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    Status(u32),
    Command(u32),
    Result(u32),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Status(word) => write!(f, "invalid status word 0x{word:08X}"),
            ProtocolError::Command(word) => write!(f, "invalid command word 0x{word:08X}"),
            ProtocolError::Result(word) => write!(f, "invalid result word 0x{word:08X}"),
        }
    }
}

/// A request to the loader
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    /// Erase `count` pages starting with the page holding `address`
    ErasePages { address: u32, count: u32 },

    /// Program `length` bytes from the staging buffer to `address`.
    /// `crc` covers exactly those bytes.
    Write { address: u32, length: u32, crc: u32 },
}

impl Request {
    /// Build a write request for `payload`, which the host stages.
    pub fn write(address: u32, payload: &[u8]) -> Self {
        Request::Write {
            address,
            length: payload.len() as u32,
            crc: payload_crc(payload),
        }
    }

    pub fn command(&self) -> Command {
        match self {
            Request::ErasePages { .. } => Command::ErasePages,
            Request::Write { .. } => Command::Write,
        }
    }

    /// The argument words, written from [`Mailbox::args`]
    pub fn args(&self) -> [u32; 3] {
        match *self {
            Request::ErasePages { address, count } => [address, count, 0],
            Request::Write {
                address,
                length,
                crc,
            } => [address, length, crc],
        }
    }

    /// Decode a request from the command and argument words.  Returns
    /// `Ok(None)` for [`Command::None`].
    pub fn from_words(command: u32, args: [u32; 3]) -> Result<Option<Self>, ProtocolError> {
        let request = match Command::from_word(command)? {
            Command::None => None,
            Command::ErasePages => Some(Request::ErasePages {
                address: args[0],
                count: args[1],
            }),
            Command::Write => Some(Request::Write {
                address: args[0],
                length: args[1],
                crc: args[2],
            }),
        };
        trace!("Value: loader request {request:?}");
        Ok(request)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::ErasePages { address, count } => {
                write!(f, "Erase {count} pages from 0x{address:08X}")
            }
            Request::Write {
                address,
                length,
                crc,
            } => write!(
                f,
                "Write {length} bytes to 0x{address:08X} (crc 0x{crc:08X})"
            ),
        }
    }
}

/// CRC-32 (ISO-HDLC, as used by zlib) of a staged payload
pub fn payload_crc(payload: &[u8]) -> u32 {
    PAYLOAD_CRC.checksum(payload)
}

/// Packs bytes into little-endian words, padding the final word with the
/// erased flash value 0xFF.
pub fn pack_words(bytes: &[u8]) -> impl Iterator<Item = u32> + '_ {
    bytes.chunks(4).map(|chunk| {
        let mut word = [0xFF; 4];
        word[..chunk.len()].copy_from_slice(chunk);
        u32::from_le_bytes(word)
    })
}
