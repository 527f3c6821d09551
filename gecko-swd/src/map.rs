// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Memory Access Port
//!
//! [`MemAp`] reaches the target's address space through one MEM-AP: single
//! words, auto-incrementing blocks, fixed-address blocks for FIFOs, packed
//! half-words and Cortex-M core register writes.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::arm::ap::{IDR_AHB_AP_KNOWN, Idr, IdrRegister};
use gecko_core::arm::map::{Csw, CswRegister, DrwRegister, Tar, TarRegister};
use gecko_core::arm::register::{MemoryMappedRegister, RegisterDescriptor};
use gecko_core::arm::scs::{CoreRegister, Dcrdr, Dcrsr, Dhcsr};
use gecko_core::efm32::DEFAULT_TAR_WRAP;

use crate::SwdError;
use crate::config::Timing;
use crate::interface::DebugPort;
use crate::transport::SwdTransport;

/// Memory access through a MEM-AP.
///
/// Owns the [`DebugPort`].  Every method leaves CSW in the default 32-bit
/// auto-incrementing mode when it returns successfully, whatever mode it
/// used internally.
///
/// Block transfers re-write TAR each time the address crosses a TAR
/// auto-increment wrap boundary.  The boundary defaults to 1 KiB and is set
/// per part with [`Self::set_tar_wrap()`].
#[derive(Debug)]
pub struct MemAp<T: SwdTransport> {
    dp: DebugPort<T>,
    ap: u8,
    csw: Csw,
    idr: Idr,
    tar_wrap: u32,
    timing: Timing,
}

impl<T: SwdTransport> MemAp<T> {
    /// Configures MEM-AP `ap` for default 32-bit auto-incrementing access.
    ///
    /// An IDR which isn't a known Cortex-M AHB-AP is logged and accepted.
    pub fn new(dp: DebugPort<T>, ap: u8, timing: Timing) -> Result<Self, SwdError> {
        let mut mem = Self {
            dp,
            ap,
            csw: Csw::default_config(),
            idr: Idr::default(),
            tar_wrap: DEFAULT_TAR_WRAP,
            timing,
        };

        mem.set_default_config()?;

        let idr = mem.dp.read_ap_register(ap, IdrRegister)?;
        mem.idr = idr;
        if IDR_AHB_AP_KNOWN.contains(&idr) {
            trace!("Value: MEM-AP IDR {idr}");
        } else {
            warn!("Unknown MEM-AP IDR {idr} {}", idr.idr_info());
        }

        Ok(mem)
    }

    /// Writes the default CSW: 32-bit transfers, single auto-increment,
    /// debugger master type and privileged access.
    pub fn set_default_config(&mut self) -> Result<(), SwdError> {
        let csw = Csw::default_config();
        self.dp.write_ap_register(self.ap, CswRegister, csw)?;
        self.csw = csw;

        // Bits 31:24 vary between implementations, so only compare the rest
        let readback = self.dp.read_ap_register(self.ap, CswRegister)?;
        trace!("Value: CSW readback {readback}");
        if readback.value() & 0x00FF_FFFF != csw.value() & 0x00FF_FFFF {
            warn!("CSW configuration mismatch after write: expected {csw}, got {readback}");
        }

        Ok(())
    }

    /// Changes the transfer mode, preserving the upper 24 bits of CSW.
    ///
    /// Arguments:
    /// - `addrinc`: One of the `Csw::ADDRINC_*` values.
    /// - `size`: One of the `Csw::SIZE_*` values.
    pub fn set_csw(&mut self, addrinc: u32, size: u32) -> Result<(), SwdError> {
        let current = self.dp.read_ap_register(self.ap, CswRegister)?;
        let csw = current.with_mode(addrinc, size);
        trace!("Exec:  CSW {current} -> {csw} ({})", csw.transfer_config());
        self.dp.write_ap_register(self.ap, CswRegister, csw)?;
        self.csw = csw;
        Ok(())
    }

    /// The CSW value last written.
    pub fn csw(&self) -> Csw {
        self.csw
    }

    /// The MEM-AP's IDR, as read when it was configured.
    pub fn idr(&self) -> Idr {
        self.idr
    }

    pub fn ap_index(&self) -> u8 {
        self.ap
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Sets the TAR auto-increment wrap mask, for example 0x3FF for a 1 KiB
    /// boundary.
    pub fn set_tar_wrap(&mut self, tar_wrap: u32) {
        trace!("Exec:  TAR wrap 0x{tar_wrap:X}");
        self.tar_wrap = tar_wrap;
    }

    pub fn tar_wrap(&self) -> u32 {
        self.tar_wrap
    }

    pub fn dp(&self) -> &DebugPort<T> {
        &self.dp
    }

    /// Access to the debug port, for DP level operations such as ABORT.
    pub fn dp_mut(&mut self) -> &mut DebugPort<T> {
        &mut self.dp
    }

    /// Releases the debug port.
    pub fn into_debug_port(self) -> DebugPort<T> {
        self.dp
    }

    /// Reads a 32-bit value from the target's memory at the specified address.
    ///
    /// Arguments:
    /// - `addr`: The address in the target's memory to read from.  Must be
    ///   word aligned.
    ///
    /// Returns:
    /// - `Ok(u32)`: the value read.
    /// - `Err(SwdError)`: if the address was unaligned or the transport
    ///   failed.
    pub fn read_word(&mut self, addr: u32) -> Result<u32, SwdError> {
        check_aligned(addr, 4)?;
        self.set_tar(addr)?;
        let drw = self.dp.read_ap_register(self.ap, DrwRegister)?;
        trace!("Value: [0x{addr:08X}] {drw}");
        Ok(drw.data())
    }

    /// Writes a 32-bit value to the target's memory at the specified address.
    ///
    /// The write is followed by a RDBUFF read, so a faulting write is
    /// reported here rather than by the next transaction.
    ///
    /// Arguments:
    /// - `addr`: The address in the target's memory to write to.  Must be
    ///   word aligned.
    /// - `data`: The value to write.
    pub fn write_word(&mut self, addr: u32, data: u32) -> Result<(), SwdError> {
        check_aligned(addr, 4)?;
        trace!("Exec:  [0x{addr:08X}] <- 0x{data:08X}");
        self.set_tar(addr)?;
        self.write_drw(data)?;
        self.dp.read_rb()?;
        Ok(())
    }

    /// Reads `count` consecutive words starting at `addr`.
    ///
    /// Each run of words up to a TAR wrap boundary costs one TAR write,
    /// `n` DRW reads and one RDBUFF read.  The first DRW read of each run
    /// returns stale data and is discarded.
    pub fn read_block(&mut self, addr: u32, count: usize) -> Result<Vec<u32>, SwdError> {
        check_aligned(addr, 4)?;
        self.ensure_default_mode()?;

        let mut buf = vec![0; count];
        let mut current_addr = addr;
        let mut done = 0;

        while done < count {
            let chunk_size = (count - done).min(self.words_to_wrap(current_addr));
            self.set_tar(current_addr)?;

            let chunk = &mut buf[done..done + chunk_size];
            for ii in 0..chunk_size {
                let posted = self.dp.read_ap(self.ap, DrwRegister::ADDRESS)?;
                if ii > 0 {
                    chunk[ii - 1] = posted;
                }
            }
            chunk[chunk_size - 1] = self.dp.read_rb()?;

            current_addr = current_addr.wrapping_add((chunk_size * 4) as u32);
            done += chunk_size;
        }

        trace!("Value: read {count} words from 0x{addr:08X}");
        Ok(buf)
    }

    /// Writes `data` to consecutive words starting at `addr`.
    ///
    /// Each DRW write is preceded by the block write pacing delay.
    pub fn write_block(&mut self, addr: u32, data: &[u32]) -> Result<(), SwdError> {
        check_aligned(addr, 4)?;
        self.ensure_default_mode()?;

        let mut remaining = data;
        let mut current_addr = addr;

        while !remaining.is_empty() {
            let chunk_size = remaining.len().min(self.words_to_wrap(current_addr));
            self.set_tar(current_addr)?;

            let (chunk, rest) = remaining.split_at(chunk_size);
            for &word in chunk {
                self.timing.block_write_pacing();
                self.write_drw(word)?;
            }

            remaining = rest;
            current_addr = current_addr.wrapping_add((chunk_size * 4) as u32);
        }

        self.dp.read_rb()?;
        trace!("Exec:  wrote {} words to 0x{addr:08X}", data.len());
        Ok(())
    }

    /// Writes every word of `data` to the same address, for write-only
    /// FIFOs and data registers.
    pub fn write_block_non_inc(&mut self, addr: u32, data: &[u32]) -> Result<(), SwdError> {
        check_aligned(addr, 4)?;
        self.set_csw(Csw::ADDRINC_OFF, Csw::SIZE_32BIT)?;

        let result = self.write_fixed(addr, data);
        self.restore_default_mode(result)
    }

    fn write_fixed(&mut self, addr: u32, data: &[u32]) -> Result<(), SwdError> {
        self.set_tar(addr)?;
        for &word in data {
            self.write_drw(word)?;
        }
        self.dp.read_rb()?;
        Ok(())
    }

    /// Writes consecutive half-words starting at `addr`.
    ///
    /// Pairs are sent as packed 16-bit transfers, two half-words per DRW
    /// write, with acknowledgement checking disabled.  A half-word not
    /// sharing its word with another one is sent as a single 16-bit
    /// transfer on the correct byte lanes.
    ///
    /// Arguments:
    /// - `addr`: Start address.  Must be half-word aligned.
    /// - `data`: The half-words to write.
    pub fn write_half_words(&mut self, addr: u32, data: &[u16]) -> Result<(), SwdError> {
        check_aligned(addr, 2)?;
        let result = self.write_half_words_inner(addr, data);
        self.restore_default_mode(result)
    }

    fn write_half_words_inner(&mut self, addr: u32, data: &[u16]) -> Result<(), SwdError> {
        let mut remaining = data;
        let mut current_addr = addr;

        if current_addr & 2 != 0 {
            if let Some((&first, rest)) = remaining.split_first() {
                self.write_single_half_word(current_addr, first)?;
                remaining = rest;
                current_addr = current_addr.wrapping_add(2);
            }
        }

        let pairs = remaining.len() / 2;
        if pairs > 0 {
            self.set_csw(Csw::ADDRINC_PACKED, Csw::SIZE_16BIT)?;

            let mut done = 0;
            while done < pairs {
                let chunk_size = (pairs - done).min(self.words_to_wrap(current_addr));
                self.set_tar(current_addr)?;

                for pair in remaining[done * 2..(done + chunk_size) * 2].chunks_exact(2) {
                    let word = u32::from(pair[0]) | (u32::from(pair[1]) << 16);
                    self.timing.half_word_pacing();
                    self.dp.write_ap(self.ap, DrwRegister::ADDRESS, word, true)?;
                }

                current_addr = current_addr.wrapping_add((chunk_size * 4) as u32);
                done += chunk_size;
            }
            remaining = &remaining[pairs * 2..];
        }

        if let Some(&last) = remaining.first() {
            self.write_single_half_word(current_addr, last)?;
        }

        self.dp.read_rb()?;
        trace!("Exec:  wrote {} half-words to 0x{addr:08X}", data.len());
        Ok(())
    }

    fn write_single_half_word(&mut self, addr: u32, half: u16) -> Result<(), SwdError> {
        if self.csw.addrinc() != Csw::ADDRINC_SINGLE || self.csw.size() != Csw::SIZE_16BIT {
            self.set_csw(Csw::ADDRINC_SINGLE, Csw::SIZE_16BIT)?;
        }
        self.set_tar(addr)?;
        let lane_shift = (addr & 2) * 8;
        self.timing.half_word_pacing();
        self.write_drw(u32::from(half) << lane_shift)
    }

    /// Reads a memory-mapped register.
    ///
    /// ```rust
    /// # use gecko_swd::{DebugPort, MemAp, Timing};
    /// # use gecko_swd::sim::SimTarget;
    /// use gecko_core::arm::scs::Dhcsr;
    ///
    /// # let dp = DebugPort::connect(SimTarget::default()).unwrap();
    /// # let mut mem = MemAp::new(dp, 0, Timing::immediate()).unwrap();
    /// let dhcsr = mem.read_register::<Dhcsr>().unwrap();
    /// println!("Halted: {}", dhcsr.is_halted());
    /// ```
    pub fn read_register<R: MemoryMappedRegister>(&mut self) -> Result<R::Value, SwdError> {
        self.read_word(R::ADDRESS).map(R::Value::from)
    }

    /// Writes a memory-mapped register.
    pub fn write_register<R: MemoryMappedRegister>(
        &mut self,
        value: R::Value,
    ) -> Result<(), SwdError> {
        self.write_word(R::ADDRESS, value.into())
    }

    /// Writes a core register through DCRDR and DCRSR.
    ///
    /// The core must be halted.  DHCSR is polled for S_REGRDY first, up to
    /// the register-ready poll budget.
    ///
    /// Returns:
    /// - `Ok(())`: the transfer was started.
    /// - `Err(SwdError::RegisterNotReady)`: S_REGRDY never set.
    pub fn write_cpu_register(&mut self, reg: CoreRegister, value: u32) -> Result<(), SwdError> {
        let budget = self.timing.register_ready_polls;
        let mut dhcsr = Dhcsr::default();
        let mut ready = false;
        for _ in 0..budget {
            dhcsr = self.read_register::<Dhcsr>()?;
            if dhcsr.is_regrdy() {
                ready = true;
                break;
            }
        }
        if !ready {
            error!("Core register {reg} not ready: DHCSR {dhcsr} after {budget} polls");
            return Err(SwdError::RegisterNotReady {
                register: reg.index(),
                dhcsr: dhcsr.into(),
                polls: budget,
            });
        }

        trace!("Exec:  {reg} <- 0x{value:08X}");
        self.write_register::<Dcrdr>(Dcrdr::from(value))?;
        self.write_register::<Dcrsr>(Dcrsr::write(reg))
    }

    /// Lets the core run.  Not verified.
    pub fn run(&mut self) -> Result<(), SwdError> {
        self.write_register::<Dhcsr>(Dhcsr::run())
    }

    fn set_tar(&mut self, addr: u32) -> Result<(), SwdError> {
        let ap = self.ap;
        self.dp.write_ap_register(ap, TarRegister, Tar::from(addr))
    }

    // Posted write to DRW at the current TAR.
    fn write_drw(&mut self, value: u32) -> Result<(), SwdError> {
        let ap = self.ap;
        self.dp.write_ap(ap, DrwRegister::ADDRESS, value, false)
    }

    // Words that can be transferred from `addr` before TAR wraps.
    fn words_to_wrap(&self, addr: u32) -> usize {
        let boundary = self.tar_wrap.wrapping_add(1);
        let offset = addr & self.tar_wrap;
        (boundary.wrapping_sub(offset) / 4).max(1) as usize
    }

    fn ensure_default_mode(&mut self) -> Result<(), SwdError> {
        if self.csw.addrinc() != Csw::ADDRINC_SINGLE || self.csw.size() != Csw::SIZE_32BIT {
            self.set_csw(Csw::ADDRINC_SINGLE, Csw::SIZE_32BIT)?;
        }
        Ok(())
    }

    // Puts CSW back to 32-bit single increment.  The transfer's own error
    // takes precedence over a failure to restore.
    fn restore_default_mode(&mut self, result: Result<(), SwdError>) -> Result<(), SwdError> {
        let restore = self.set_csw(Csw::ADDRINC_SINGLE, Csw::SIZE_32BIT);
        match result {
            Ok(()) => restore,
            Err(e) => {
                if let Err(restore_err) = restore {
                    warn!("Failed to restore CSW after error {e}: {restore_err}");
                }
                Err(e)
            }
        }
    }
}

fn check_aligned(addr: u32, align: u32) -> Result<(), SwdError> {
    if addr & (align - 1) != 0 {
        warn!("Address 0x{addr:08X} is not {align} byte aligned");
        return Err(SwdError::OperationFailed(format!(
            "address 0x{addr:08X} not {align} byte aligned"
        )));
    }
    Ok(())
}
