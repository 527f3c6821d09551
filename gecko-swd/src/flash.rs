// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Direct flash programming through the EFM32 Memory System Controller
//!
//! The host drives the MSC itself, one register transaction at a time.
//! This is slow but needs nothing running on the target.  See
//! [`loader`](crate::loader) for the faster alternative.
//!
//! The flash must be unlocked with [`DebugInterface::flash_unlock()`] before
//! erasing or programming, and every page programmed must first be erased.

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::efm32::{FLASH_BASE, MscAddrb, MscStatus, MscWdata, MscWriteCmd, MscWriteCtl};

use crate::SwdError;
use crate::debug::DebugInterface;
use crate::transport::SwdTransport;

/// Pages erased between erase progress reports
pub const ERASE_PROGRESS_PAGES: u32 = 8;

/// Bytes programmed between program progress reports
pub const PROGRAM_PROGRESS_BYTES: u32 = 0x40;

/// The long-running flash operations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    /// Counted in pages
    Erase,
    /// Counted in bytes
    Program,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Erase => write!(f, "Erase"),
            Operation::Program => write!(f, "Program"),
        }
    }
}

/// Progress of an erase or program, delivered to the caller's callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { operation: Operation, total: u32 },
    Advanced {
        operation: Operation,
        done: u32,
        total: u32,
    },
    Finished { operation: Operation, total: u32 },
}

/// Returns the length of `len` bytes programmed from `address`, provided
/// they stay within the 32-bit address space.
pub(crate) fn program_span(address: u32, len: usize) -> Result<u32, SwdError> {
    u32::try_from(len)
        .ok()
        .filter(|&len| address.checked_add(len).is_some())
        .ok_or_else(|| {
            SwdError::OperationFailed(format!(
                "{len} bytes at 0x{address:08X} overrun the address space"
            ))
        })
}

impl<T: SwdTransport> DebugInterface<T> {
    /// Enables flash writes and erases (MSC_WRITECTL.WREN).
    pub fn flash_unlock(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Unlocking flash");
        self.mem_ap()
            .write_register::<MscWriteCtl>(MscWriteCtl::write_enable())
    }

    /// Disables flash writes and erases.
    pub fn flash_lock(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Locking flash");
        self.mem_ap()
            .write_register::<MscWriteCtl>(MscWriteCtl::write_disable())
    }

    /// Erases flash, page by page, from address 0.
    ///
    /// Arguments:
    /// - `flash_kib`: Flash size in KiB.
    /// - `page_size`: Erase page size in bytes.  `flash_kib * 1024 /
    ///   page_size` pages are erased.
    /// - `progress`: Called on start, every [`ERASE_PROGRESS_PAGES`] pages
    ///   and at the end.
    ///
    /// Returns:
    /// - `Ok(())`: every page was erased.
    /// - `Err(SwdError::FlashBusyTimeout)`: the MSC stayed busy.
    /// - `Err(SwdError::FlashFault)`: the MSC refused a page.
    pub fn flash_erase(
        &mut self,
        flash_kib: u32,
        page_size: u32,
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<(), SwdError> {
        if page_size == 0 {
            return Err(SwdError::OperationFailed(
                "zero flash page size".to_string(),
            ));
        }

        let flash_bytes = flash_kib.checked_mul(1024).ok_or_else(|| {
            SwdError::OperationFailed(format!("flash size {flash_kib} KiB out of range"))
        })?;

        let operation = Operation::Erase;
        let pages = flash_bytes / page_size;
        info!("Erasing {pages} pages of {page_size} bytes");
        progress(ProgressEvent::Started {
            operation,
            total: pages,
        });

        for page in 0..pages {
            let addr = FLASH_BASE + page * page_size;
            trace!("Exec:  Erase page {page} at 0x{addr:08X}");
            let mem = self.mem_ap();
            mem.write_register::<MscAddrb>(MscAddrb::from(addr))?;
            mem.write_register::<MscWriteCmd>(MscWriteCmd::load_address())?;
            mem.write_register::<MscWriteCmd>(MscWriteCmd::erase_page())?;
            self.wait_flash_idle(addr)?;

            let done = page + 1;
            if done % ERASE_PROGRESS_PAGES == 0 && done < pages {
                progress(ProgressEvent::Advanced {
                    operation,
                    done,
                    total: pages,
                });
            }
        }

        progress(ProgressEvent::Finished {
            operation,
            total: pages,
        });
        info!("Erase complete");
        Ok(())
    }

    /// Programs `words` from the start of flash.
    pub fn flash_program(
        &mut self,
        words: &[u32],
        progress: impl FnMut(ProgressEvent),
    ) -> Result<(), SwdError> {
        self.flash_program_at(FLASH_BASE, words, progress)
    }

    /// Programs `words` to consecutive flash words starting at `address`.
    ///
    /// Each word is loaded with MSC_ADDRB and MSC_WDATA, written with
    /// WRITEONCE, and MSC_STATUS polled until the MSC is idle again.
    ///
    /// Returns:
    /// - `Ok(())`: every word was programmed.
    /// - `Err(SwdError::FlashBusyTimeout)`: the MSC stayed busy.
    /// - `Err(SwdError::FlashFault)`: the MSC refused a word, for example
    ///   because its page is locked.
    pub fn flash_program_at(
        &mut self,
        address: u32,
        words: &[u32],
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<(), SwdError> {
        if address & 0x3 != 0 {
            return Err(SwdError::OperationFailed(format!(
                "flash address 0x{address:08X} not word aligned"
            )));
        }

        let total = program_span(address, words.len() * 4)?;

        let operation = Operation::Program;
        info!("Programming {total} bytes at 0x{address:08X}");
        progress(ProgressEvent::Started { operation, total });

        for (ii, &word) in words.iter().enumerate() {
            let addr = address + (ii as u32) * 4;
            trace!("Exec:  Program 0x{word:08X} at 0x{addr:08X}");
            let mem = self.mem_ap();
            mem.write_register::<MscAddrb>(MscAddrb::from(addr))?;
            mem.write_register::<MscWriteCmd>(MscWriteCmd::load_address())?;
            mem.write_register::<MscWdata>(MscWdata::from(word))?;
            mem.write_register::<MscWriteCmd>(MscWriteCmd::write_trigger())?;
            self.wait_flash_idle(addr)?;

            let done = (ii as u32 + 1) * 4;
            if done % PROGRAM_PROGRESS_BYTES == 0 && done < total {
                progress(ProgressEvent::Advanced {
                    operation,
                    done,
                    total,
                });
            }
        }

        progress(ProgressEvent::Finished { operation, total });
        info!("Program complete");
        Ok(())
    }

    // Polls MSC_STATUS until BUSY clears, failing on LOCKED or INVADDR.
    fn wait_flash_idle(&mut self, address: u32) -> Result<(), SwdError> {
        let budget = self.timing().flash_busy_polls;
        let mut status = MscStatus::default();
        for polls in 1..=budget {
            status = self.mem_ap().read_register::<MscStatus>()?;
            if status.errors() {
                error!(
                    "Flash refused at 0x{address:08X}: MSC_STATUS {status} locked {} invaddr {}",
                    status.locked(),
                    status.invaddr()
                );
                return Err(SwdError::FlashFault {
                    address,
                    status: status.into(),
                });
            }
            if !status.busy() {
                if polls > 1 {
                    trace!("Value: MSC idle after {polls} polls");
                }
                return Ok(());
            }
            if polls % 1000 == 0 {
                debug!("... waiting for flash operation at 0x{address:08X} to complete");
            }
        }

        error!("Flash still busy at 0x{address:08X}: MSC_STATUS {status} after {budget} polls");
        Err(SwdError::FlashBusyTimeout {
            address,
            status: status.into(),
            polls: budget,
        })
    }
}
