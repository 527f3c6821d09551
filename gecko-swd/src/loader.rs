// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Flash programming through a flash loader running in target RAM
//!
//! A small loader program is uploaded to RAM and started.  The host then
//! sends it erase and write requests through the mailbox defined by
//! [`gecko_loader`], and the loader drives the MSC locally.  This avoids
//! the several SWD transactions per word direct programming needs.
//!
//! ```rust
//! use gecko_swd::{Config, DebugInterface};
//! use gecko_swd::loader::LoaderImage;
//! use gecko_swd::sim::SimTarget;
//!
//! let target = SimTarget::default();
//! let image = LoaderImage::from_words(target.loader_image_words()).unwrap();
//!
//! let mut debug = DebugInterface::connect(target, &Config::immediate()).unwrap();
//! let details = debug.identify().unwrap();
//! debug.upload_flash_loader(details.family(), &image).unwrap();
//! let session = debug.verify_flash_loader_ready().unwrap();
//!
//! debug.flash_unlock().unwrap();
//! debug.erase_pages_with_loader(&session, 0, 1, |_| {}).unwrap();
//! debug.flash_program_with_loader(&session, 0, &[0x11, 0x22, 0x33, 0x44], |_| {}).unwrap();
//! assert_eq!(debug.read_mem(0).unwrap(), 0x4433_2211);
//! ```

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::arm::scs::CoreRegister;
use gecko_core::efm32::Efm32Family;
use gecko_loader::{Mailbox, RAM_START, Request, ResultCode, Status, pack_words};

use crate::SwdError;
use crate::debug::DebugInterface;
use crate::flash::{Operation, ProgressEvent, program_span};
use crate::transport::SwdTransport;

/// A flash loader program, as words to be written from [`RAM_START`].
///
/// Word 0 is the initial stack pointer and word 1 the entry point.  The
/// mailbox words from [`gecko_loader::STATE_LOCATION`] onwards are
/// overwritten by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoaderImage {
    words: Vec<u32>,
}

impl LoaderImage {
    /// Builds an image from a raw binary, little-endian, padded with 0xFF to
    /// a whole number of words.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SwdError> {
        Self::from_words(pack_words(bytes).collect())
    }

    /// Builds an image from words.
    ///
    /// Returns `Err(SwdError::InvalidImage)` if there are fewer than two
    /// words, as the stack pointer and entry point are required.
    pub fn from_words(words: Vec<u32>) -> Result<Self, SwdError> {
        if words.len() < 2 {
            return Err(SwdError::InvalidImage(format!(
                "flash loader is {} words, needs at least 2",
                words.len()
            )));
        }
        Ok(Self { words })
    }

    pub fn stack_pointer(&self) -> u32 {
        self.words[0]
    }

    pub fn entry_point(&self) -> u32 {
        self.words[1]
    }

    pub fn words(&self) -> &[u32] {
        &self.words
    }

    pub fn len_bytes(&self) -> u32 {
        (self.words.len() * 4) as u32
    }
}

/// A flash loader that has reported ready, with the staging buffer it
/// published.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlashLoaderSession {
    mailbox: Mailbox,
    buffer_address: u32,
    buffer_size: u32,
}

impl FlashLoaderSession {
    pub fn mailbox(&self) -> &Mailbox {
        &self.mailbox
    }

    pub fn buffer_address(&self) -> u32 {
        self.buffer_address
    }

    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    // Largest write chunk: the buffer rounded down to whole words.
    fn chunk_size(&self) -> usize {
        (self.buffer_size & !0x3) as usize
    }
}

impl<T: SwdTransport> DebugInterface<T> {
    /// Uploads the flash loader to RAM and starts it.
    ///
    /// The core is reset and halted, the image written word by word from
    /// [`RAM_START`], the mailbox status set to not ready, SP and PC seeded
    /// from the first two words and the core run.
    ///
    /// Follow with [`Self::verify_flash_loader_ready()`].
    pub fn upload_flash_loader(
        &mut self,
        family: Efm32Family,
        image: &LoaderImage,
    ) -> Result<(), SwdError> {
        info!(
            "Uploading {} byte flash loader for {family}",
            image.len_bytes()
        );
        self.reset_and_halt()?;

        let mailbox = Mailbox::default();
        let mem = self.mem_ap();
        mem.set_tar_wrap(family.tar_wrap());
        mem.set_default_config()?;

        for (ii, &word) in image.words().iter().enumerate() {
            mem.write_word(RAM_START + (ii as u32) * 4, word)?;
        }
        mem.write_word(mailbox.status(), Status::NotReady.to_word())?;

        mem.write_cpu_register(CoreRegister::Sp, image.stack_pointer())?;
        mem.write_cpu_register(CoreRegister::Pc, image.entry_point())?;
        debug!(
            "OK:    Flash loader written, SP 0x{:08X} PC 0x{:08X}",
            image.stack_pointer(),
            image.entry_point()
        );

        self.run()
    }

    /// Polls the loader's status word until it reports ready.
    ///
    /// Returns:
    /// - `Ok(FlashLoaderSession)`: the loader is ready for requests.
    /// - `Err(SwdError::FlashLoaderNotReady)`: the loader did not report
    ///   ready within the poll budget, or reported anything other than not
    ///   ready or ready.  Carries the last status word read.
    /// - `Err(SwdError::OperationFailed)`: the published staging buffer is
    ///   misaligned or runs past the end of the address space.
    pub fn verify_flash_loader_ready(&mut self) -> Result<FlashLoaderSession, SwdError> {
        let mailbox = Mailbox::default();
        let budget = self.timing().loader_ready_polls;
        let mut word = Status::NotReady.to_word();

        for polls in 1..=budget {
            word = self.mem_ap().read_word(mailbox.status())?;
            match Status::from_word(word) {
                Ok(Status::NotReady) => continue,
                Ok(Status::Ready) => {
                    let mem = self.mem_ap();
                    let buffer_address = mem.read_word(mailbox.buffer_address())?;
                    let buffer_size = mem.read_word(mailbox.buffer_size())?;
                    if buffer_address & 0x3 != 0
                        || buffer_address.checked_add(buffer_size).is_none()
                    {
                        error!(
                            "Unusable loader buffer {buffer_size} bytes at 0x{buffer_address:08X}"
                        );
                        return Err(SwdError::OperationFailed(format!(
                            "flash loader buffer of {buffer_size} bytes at 0x{buffer_address:08X}"
                        )));
                    }
                    debug!("OK:    Flash loader ready after {polls} polls");
                    debug!("Value: buffer {buffer_size} bytes at 0x{buffer_address:08X}");
                    return Ok(FlashLoaderSession {
                        mailbox,
                        buffer_address,
                        buffer_size,
                    });
                }
                _ => {
                    error!("Flash loader reported status 0x{word:08X} while starting");
                    return Err(SwdError::FlashLoaderNotReady {
                        status: word,
                        polls,
                    });
                }
            }
        }

        error!("Flash loader not ready: status 0x{word:08X} after {budget} polls");
        Err(SwdError::FlashLoaderNotReady {
            status: word,
            polls: budget,
        })
    }

    /// Sends one request to the loader and waits for it to complete.
    ///
    /// `payload` is copied to the staging buffer first.  It must be empty
    /// for requests which don't take one.
    ///
    /// Returns:
    /// - `Ok(())`: the loader completed the request.
    /// - `Err(SwdError::LoaderRequestFailed)`: the loader reported an error.
    /// - `Err(SwdError::LoaderRequestTimeout)`: the loader stayed busy.
    /// - `Err(SwdError::OperationFailed)`: the payload didn't fit, or the
    ///   loader wrote a status word outside the protocol.
    pub fn loader_request(
        &mut self,
        session: &FlashLoaderSession,
        request: &Request,
        payload: &[u8],
    ) -> Result<(), SwdError> {
        if payload.len() > session.buffer_size as usize {
            return Err(SwdError::OperationFailed(format!(
                "{} byte payload exceeds {} byte loader buffer",
                payload.len(),
                session.buffer_size
            )));
        }

        trace!("Exec:  Loader request: {request}");
        let mailbox = session.mailbox;
        let command = request.command();
        let mem = self.mem_ap();

        for (ii, word) in pack_words(payload).enumerate() {
            mem.write_word(session.buffer_address + (ii as u32) * 4, word)?;
        }
        for (ii, &arg) in request.args().iter().enumerate() {
            mem.write_word(mailbox.args() + (ii as u32) * 4, arg)?;
        }
        mem.write_word(mailbox.status(), Status::Busy.to_word())?;
        mem.write_word(mailbox.command(), command.to_word())?;

        let budget = self.timing().loader_request_polls;
        let mut word = Status::Busy.to_word();
        for _ in 0..budget {
            word = self.mem_ap().read_word(mailbox.status())?;
            match Status::from_word(word) {
                Ok(Status::Busy) => continue,
                Ok(Status::Ready) => {
                    trace!("Value: Loader request complete");
                    return Ok(());
                }
                Ok(Status::Error) => {
                    let code = self.mem_ap().read_word(mailbox.result())?;
                    match ResultCode::from_word(code) {
                        Ok(result) => error!("Flash loader {command} failed: {result}"),
                        Err(e) => error!("Flash loader {command} failed: {e}"),
                    }
                    return Err(SwdError::LoaderRequestFailed { command, code });
                }
                Ok(Status::NotReady) => {
                    error!("Flash loader restarted during {command}");
                    return Err(SwdError::OperationFailed(format!(
                        "flash loader not ready during {command}"
                    )));
                }
                Err(e) => {
                    error!("Flash loader wrote {e} during {command}");
                    return Err(SwdError::OperationFailed(format!("{e}")));
                }
            }
        }

        error!("Flash loader {command} timed out: status 0x{word:08X} after {budget} polls");
        Err(SwdError::LoaderRequestTimeout {
            command,
            status: word,
            polls: budget,
        })
    }

    /// Erases `count` pages starting at `address` with a single loader
    /// request.
    pub fn erase_pages_with_loader(
        &mut self,
        session: &FlashLoaderSession,
        address: u32,
        count: u32,
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<(), SwdError> {
        let operation = Operation::Erase;
        info!("Erasing {count} pages from 0x{address:08X} with flash loader");
        progress(ProgressEvent::Started {
            operation,
            total: count,
        });

        let request = Request::ErasePages { address, count };
        self.loader_request(session, &request, &[])?;

        progress(ProgressEvent::Finished {
            operation,
            total: count,
        });
        info!("Erase complete");
        Ok(())
    }

    /// Programs `bytes` to flash at `address`, in staging buffer sized
    /// chunks.
    pub fn flash_program_with_loader(
        &mut self,
        session: &FlashLoaderSession,
        address: u32,
        bytes: &[u8],
        mut progress: impl FnMut(ProgressEvent),
    ) -> Result<(), SwdError> {
        let chunk_size = session.chunk_size();
        if chunk_size == 0 {
            return Err(SwdError::OperationFailed(format!(
                "flash loader buffer size {} is unusable",
                session.buffer_size
            )));
        }

        let total = program_span(address, bytes.len())?;

        let operation = Operation::Program;
        info!("Programming {total} bytes at 0x{address:08X} with flash loader");
        progress(ProgressEvent::Started { operation, total });

        let mut done = 0;
        for chunk in bytes.chunks(chunk_size) {
            let request = Request::write(address + done, chunk);
            self.loader_request(session, &request, chunk)?;

            done += chunk.len() as u32;
            if done < total {
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
}
