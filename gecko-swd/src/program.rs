// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Whole-image programming
//!
//! [`program_image()`] runs the complete sequence a flashing tool needs:
//! connect, identify, check the image fits, halt, unlock, erase, program,
//! lock and reset.  Part identification happens before anything is erased,
//! so an unsupported part or an oversized image leaves the target untouched.

use core::fmt;
use embassy_time::{Duration, Instant};
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::efm32::{ERASED_BYTE, Efm32Details, FLASH_BASE};
use gecko_loader::pack_words;

use crate::SwdError;
use crate::config::Config;
use crate::debug::DebugInterface;
use crate::flash::ProgressEvent;
use crate::loader::LoaderImage;
use crate::transport::SwdTransport;

/// A firmware image to be written from the start of flash.
///
/// Held as bytes padded with the erased value 0xFF to a whole number of
/// words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareImage {
    bytes: Vec<u8>,
}

impl FirmwareImage {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut bytes = bytes.to_vec();
        let padded = bytes.len().next_multiple_of(4);
        bytes.resize(padded, ERASED_BYTE);
        Self { bytes }
    }

    pub fn from_words(words: &[u32]) -> Self {
        let bytes = words.iter().flat_map(|word| word.to_le_bytes()).collect();
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// The image as little-endian words
    pub fn words(&self) -> Vec<u32> {
        pack_words(&self.bytes).collect()
    }

    pub fn len_bytes(&self) -> u32 {
        self.bytes.len() as u32
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Number of erase pages the image touches
    pub fn pages(&self, page_size: u32) -> u32 {
        self.len_bytes().div_ceil(page_size)
    }
}

/// How flash is erased and programmed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Strategy {
    /// The host drives the MSC for every page and word.
    Direct,

    /// The given flash loader is uploaded and does the work.
    Loader(LoaderImage),
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Direct => write!(f, "direct"),
            Strategy::Loader(_) => write!(f, "flash loader"),
        }
    }
}

/// Outcome of a successful [`program_image()`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramStats {
    pub part: Efm32Details,
    pub bytes: u32,
    pub elapsed: Duration,
}

impl ProgramStats {
    /// Bytes programmed per second, over the whole sequence
    pub fn throughput(&self) -> u64 {
        let micros = self.elapsed.as_micros().max(1);
        u64::from(self.bytes) * 1_000_000 / micros
    }

    pub fn kib_per_second(&self) -> f64 {
        self.throughput() as f64 / 1024.0
    }
}

impl fmt::Display for ProgramStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Programmed {} bytes to {} in {}.{:03}s ({:.2} KiB/s)",
            self.bytes,
            self.part.part_name(),
            self.elapsed.as_millis() / 1000,
            self.elapsed.as_millis() % 1000,
            self.kib_per_second()
        )
    }
}

/// Programs `firmware` into the target behind `transport`.
///
/// Arguments:
/// - `transport`: The SWD adapter.  Pass `&mut transport` to keep it.
/// - `config`: MEM-AP index and timing.
/// - `firmware`: The image, written from address 0.
/// - `strategy`: Direct MSC programming, or through a flash loader.
/// - `progress`: Receives erase and program progress.
///
/// Returns:
/// - `Ok(ProgramStats)`: the part was programmed and reset.
/// - `Err(SwdError::UnsupportedPart)` or `Err(SwdError::ImageTooLarge)`:
///   nothing was changed on the target.
/// - `Err(SwdError)`: the first fatal error encountered.
///
/// ```rust
/// use gecko_swd::{Config, FirmwareImage, Strategy, program_image};
/// use gecko_swd::sim::SimTarget;
///
/// let mut target = SimTarget::default();
/// let firmware = FirmwareImage::from_words(&[0x1111_1111, 0x2222_2222, 0x3333_3333]);
/// let stats = program_image(&mut target, &Config::immediate(), &firmware, &Strategy::Direct, |_| {}).unwrap();
/// println!("{stats}");
/// assert_eq!(target.memory_word(0x8), 0x3333_3333);
/// ```
pub fn program_image<T: SwdTransport>(
    transport: T,
    config: &Config,
    firmware: &FirmwareImage,
    strategy: &Strategy,
    mut progress: impl FnMut(ProgressEvent),
) -> Result<ProgramStats, SwdError> {
    let start = Instant::now();

    if firmware.is_empty() {
        return Err(SwdError::InvalidImage(
            "firmware image is empty".to_string(),
        ));
    }

    let mut debug = DebugInterface::connect(transport, config)?;
    let details = debug.identify()?;

    let flash_bytes = details.flash_size_bytes();
    if firmware.len_bytes() > flash_bytes {
        error!(
            "Image is {} bytes, {} has {flash_bytes} bytes of flash",
            firmware.len_bytes(),
            details.part_name()
        );
        return Err(SwdError::ImageTooLarge {
            image_bytes: firmware.len_bytes(),
            flash_bytes,
        });
    }

    info!(
        "Programming {} bytes to {details} using {strategy} programming",
        firmware.len_bytes()
    );

    debug.halt()?;

    match strategy {
        Strategy::Direct => {
            debug.flash_unlock()?;
            debug.flash_erase(details.flash_kib(), details.page_size(), &mut progress)?;
            debug.flash_program(&firmware.words(), &mut progress)?;
        }
        Strategy::Loader(image) => {
            debug.upload_flash_loader(details.family(), image)?;
            let session = debug.verify_flash_loader_ready()?;
            debug.flash_unlock()?;
            let pages = firmware.pages(details.page_size());
            debug.erase_pages_with_loader(&session, FLASH_BASE, pages, &mut progress)?;
            debug.flash_program_with_loader(
                &session,
                FLASH_BASE,
                firmware.as_bytes(),
                &mut progress,
            )?;
        }
    }

    debug.flash_lock()?;
    debug.system_reset()?;

    let stats = ProgramStats {
        part: details,
        bytes: firmware.len_bytes(),
        elapsed: start.elapsed(),
    };
    info!("{stats}");
    Ok(stats)
}
