// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Simulated EFM32 target
//!
//! [`SimTarget`] implements [`SwdTransport`] on top of an emulation of the
//! parts of an EFM32 that `gecko-swd` talks to:
//!
//! * the SW-DP: IDCODE, CTRL/STAT power-up handshake, SELECT, RDBUFF and
//!   posted AP reads
//! * the AHB-AP: CSW size and increment modes (including packed 16-bit),
//!   TAR auto-increment wrapping at the family's boundary, DRW and IDR
//! * sparse memory, with flash reading as erased until programmed
//! * the Cortex-M debug registers: DHCSR key and halt semantics, a reset
//!   that holds S_RESET_ST for a set number of DHCSR reads, DEMCR
//!   halt-on-reset, and a core register file through DCRSR/DCRDR
//! * the MSC: WREN, address latch, page erase and single word write, with
//!   a configurable number of busy polls, LOCKED and INVADDR
//! * the device information page and ROM table IDs
//! * a flash loader, started by running the core with PC at its entry
//!   point, which serves `gecko_loader` mailbox requests
//!
//! Every behaviour is deterministic.  Faults are injected with the `with_*`
//! builder methods, and what the host did can be inspected afterwards.
//!
//! ```rust
//! use gecko_swd::{Config, DebugInterface};
//! use gecko_swd::sim::SimTarget;
//!
//! let target = SimTarget::default().with_reset_polls(10);
//! let mut debug = DebugInterface::connect(target, &Config::immediate()).unwrap();
//! debug.reset_and_halt().unwrap();
//! ```

use std::collections::HashMap;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::arm::Cortex;
use gecko_core::arm::ap::IDR_AHB_AP_CORTEX_M3_M4;
use gecko_core::arm::dp::CtrlStat;
use gecko_core::arm::map::Csw;
use gecko_core::arm::register::MemoryMappedRegister;
use gecko_core::arm::scs::{Aircr, CoreRegister, Dcrdr, Dcrsr, Demcr, Dhcsr};
use gecko_core::efm32::{
    DEFAULT_TAR_WRAP, ERASED_BYTE, ERASED_WORD, Efm32Family, MemInfo, MscAddrb, MscStatus, MscWdata,
    MscWriteCmd, MscWriteCtl, PartInfo, Pid2, Pid3,
};
use gecko_loader::{Command, Mailbox, RAM_START, Request, ResultCode, Status, payload_crc};

use crate::SwdError;
use crate::transport::{Port, SwdOp, SwdTransport};

/// Entry point of the loader returned by [`SimTarget::loader_image_words()`].
/// Running the core with PC here starts the emulated loader.
pub const LOADER_ENTRY: u32 = RAM_START + 0x31;

/// Initial stack pointer of the simulated loader
pub const LOADER_STACK: u32 = RAM_START + 0x2000;

/// Default staging buffer published by the simulated loader
pub const LOADER_BUFFER: u32 = RAM_START + 0x400;
pub const LOADER_BUFFER_SIZE: u32 = 1024;

/// One SWD transaction seen by the simulated target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transaction {
    pub op: SwdOp,
    pub value: u32,
    pub ignore_ack: bool,
}

#[derive(Debug, Clone, Default)]
struct LoaderSim {
    ready_after: u32,
    status_reads: u32,
    running: bool,
    ready: bool,
    stalled: bool,
    fail_with: Option<ResultCode>,
    buffer_address: u32,
    buffer_size: u32,
    requests: Vec<Request>,
}

/// A simulated EFM32 target.
///
/// [`SimTarget::default()`] is an EFM32G890F128, revision C: a Cortex-M3
/// with 128 KiB of flash in 512 byte pages and 16 KiB of RAM.
#[derive(Debug, Clone)]
pub struct SimTarget {
    // Debug port
    idcode: u32,
    ctrl_stat: u32,
    refuse_power_up: bool,
    select: u32,
    select_writes: usize,
    rdbuff: u32,
    aborts: Vec<u32>,

    // MEM-AP
    csw: u32,
    tar: u32,
    tar_wrap: u32,
    idr: u32,
    faulting_address: Option<u32>,

    // Memory, keyed by word address
    memory: HashMap<u32, u32>,

    // Core
    dhcsr_ctrl: u32,
    halted: bool,
    demcr: u32,
    ignore_halt_on_reset: bool,
    reset_polls: u32,
    reset_reads_remaining: u32,
    core_registers: [u32; 17],
    dcrdr: u32,
    regrdy_never: bool,
    local_resets: usize,
    system_resets: usize,

    // Memory System Controller
    wren: bool,
    addrb: u32,
    latched: u32,
    wdata: u32,
    msc_errors: u32,
    busy_polls: u32,
    busy_remaining: u32,
    stuck_busy: bool,
    locked: bool,
    erased_pages: Vec<u32>,
    programmed_words: Vec<(u32, u32)>,

    // Device identification
    part_info: u32,
    mem_info: u32,
    pid2: u32,
    pid3: u32,

    loader: LoaderSim,
    log: Vec<Transaction>,
}

impl Default for SimTarget {
    fn default() -> Self {
        Self {
            idcode: Cortex::IDCODE_M3.data(),
            ctrl_stat: 0,
            refuse_power_up: false,
            select: 0,
            select_writes: 0,
            rdbuff: 0,
            aborts: Vec::new(),

            csw: 0x0300_0040 | Csw::SIZE_32BIT,
            tar: 0,
            tar_wrap: Efm32Family::Gecko.tar_wrap(),
            idr: IDR_AHB_AP_CORTEX_M3_M4.into(),
            faulting_address: None,

            memory: HashMap::new(),

            dhcsr_ctrl: 0,
            halted: false,
            demcr: 0,
            ignore_halt_on_reset: false,
            reset_polls: 3,
            reset_reads_remaining: 0,
            core_registers: [0; 17],
            dcrdr: 0,
            regrdy_never: false,
            local_resets: 0,
            system_resets: 0,

            wren: false,
            addrb: 0,
            latched: 0,
            wdata: 0,
            msc_errors: 0,
            busy_polls: 1,
            busy_remaining: 0,
            stuck_busy: false,
            locked: false,
            erased_pages: Vec::new(),
            programmed_words: Vec::new(),

            part_info: (17 << 24) | (u32::from(Efm32Family::Gecko.code()) << 16) | 890,
            mem_info: (16 << 16) | 128,
            pid2: 0x0A,
            pid3: 0x20,

            loader: LoaderSim {
                buffer_address: LOADER_BUFFER,
                buffer_size: LOADER_BUFFER_SIZE,
                ..Default::default()
            },
            log: Vec::new(),
        }
    }
}

impl SimTarget {
    /// Replaces the device information page.  An unknown family code
    /// keeps the default TAR wrap.
    pub fn with_part(
        mut self,
        family_code: u8,
        part_number: u16,
        flash_kib: u32,
        ram_kib: u32,
    ) -> Self {
        self.part_info = (17 << 24) | (u32::from(family_code) << 16) | u32::from(part_number);
        self.mem_info = (ram_kib << 16) | (flash_kib & 0xFFFF);
        self.tar_wrap = Efm32Family::from_code(family_code)
            .map(|family| family.tar_wrap())
            .unwrap_or(DEFAULT_TAR_WRAP);
        self
    }

    pub fn with_idcode(mut self, idcode: u32) -> Self {
        self.idcode = idcode;
        self
    }

    pub fn with_idr(mut self, idr: u32) -> Self {
        self.idr = idr;
        self
    }

    /// CTRL/STAT never acknowledges the power-up request.
    pub fn refusing_power_up(mut self) -> Self {
        self.refuse_power_up = true;
        self
    }

    /// DHCSR reads showing S_RESET_ST after each reset.
    pub fn with_reset_polls(mut self, polls: u32) -> Self {
        self.reset_polls = polls;
        self
    }

    /// The core keeps running after reset, whatever DEMCR says.
    pub fn ignoring_halt_on_reset(mut self) -> Self {
        self.ignore_halt_on_reset = true;
        self
    }

    /// DHCSR never shows S_REGRDY.
    pub fn with_regrdy_never(mut self) -> Self {
        self.regrdy_never = true;
        self
    }

    /// MSC_STATUS reads showing BUSY after each erase or write.
    pub fn with_flash_busy_polls(mut self, polls: u32) -> Self {
        self.busy_polls = polls;
        self
    }

    /// MSC_STATUS shows BUSY forever once a command is issued.
    pub fn with_stuck_busy(mut self) -> Self {
        self.stuck_busy = true;
        self
    }

    /// Every flash page is locked.
    pub fn with_locked_flash(mut self) -> Self {
        self.locked = true;
        self
    }

    /// DRW accesses with TAR at `addr` answer FAULT.
    pub fn with_faulting_address(mut self, addr: u32) -> Self {
        self.faulting_address = Some(addr);
        self
    }

    /// Loader status reads returning not ready before the loader is ready.
    pub fn with_loader_ready_polls(mut self, polls: u32) -> Self {
        self.loader.ready_after = polls;
        self
    }

    /// The loader accepts requests but never completes them.
    pub fn with_loader_stalled(mut self) -> Self {
        self.loader.stalled = true;
        self
    }

    /// The loader fails every request with `code`.
    pub fn with_loader_failing(mut self, code: ResultCode) -> Self {
        self.loader.fail_with = Some(code);
        self
    }

    pub fn with_loader_buffer(mut self, address: u32, size: u32) -> Self {
        self.loader.buffer_address = address;
        self.loader.buffer_size = size;
        self
    }

    /// Pre-loads a word of memory, including flash.
    pub fn with_memory_word(mut self, addr: u32, value: u32) -> Self {
        self.memory.insert(addr & !0x3, value);
        self
    }

    /// A flash loader image the simulated target will run: stack pointer,
    /// entry point, reserved mailbox words and some code.
    pub fn loader_image_words(&self) -> Vec<u32> {
        let mut words = vec![LOADER_STACK, LOADER_ENTRY, 0, 0];
        words.extend([0; 8]);
        words.extend([0x4770_BF00; 4]);
        words
    }

    /// Reads a word of memory without any SWD traffic.
    pub fn memory_word(&self, addr: u32) -> u32 {
        let addr = addr & !0x3;
        match self.memory.get(&addr) {
            Some(value) => *value,
            None if self.in_flash(addr) => ERASED_WORD,
            None => 0,
        }
    }

    /// Number of SELECT writes issued
    pub fn select_writes(&self) -> usize {
        self.select_writes
    }

    /// Every ABORT value written
    pub fn aborts(&self) -> &[u32] {
        &self.aborts
    }

    pub fn csw(&self) -> u32 {
        self.csw
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn demcr(&self) -> u32 {
        self.demcr
    }

    pub fn core_register(&self, reg: CoreRegister) -> u32 {
        self.core_registers[usize::from(reg.index())]
    }

    pub fn local_resets(&self) -> usize {
        self.local_resets
    }

    pub fn system_resets(&self) -> usize {
        self.system_resets
    }

    pub fn flash_write_enabled(&self) -> bool {
        self.wren
    }

    /// Page addresses erased by the MSC or the loader, in order
    pub fn erased_pages(&self) -> &[u32] {
        &self.erased_pages
    }

    /// `(address, data)` of every flash word written, in order
    pub fn programmed_words(&self) -> &[(u32, u32)] {
        &self.programmed_words
    }

    pub fn loader_running(&self) -> bool {
        self.loader.running
    }

    /// Requests the loader has served
    pub fn loader_requests(&self) -> &[Request] {
        &self.loader.requests
    }

    /// Every SWD transaction, in order
    pub fn transactions(&self) -> &[Transaction] {
        &self.log
    }

    pub fn clear_transactions(&mut self) {
        self.log.clear();
    }

    fn flash_size(&self) -> u32 {
        MemInfo::from(self.mem_info).flash_kib() * 1024
    }

    fn in_flash(&self, addr: u32) -> bool {
        addr < self.flash_size()
    }

    fn page_size(&self) -> u32 {
        let code = PartInfo::from(self.part_info).family_code();
        Efm32Family::from_code(code)
            .map(|family| family.page_size())
            .unwrap_or(512)
    }

    fn dhcsr(&mut self) -> u32 {
        let mut value = self.dhcsr_ctrl;
        if !self.regrdy_never {
            value |= Dhcsr::S_REGRDY;
        }
        if self.halted {
            value |= Dhcsr::S_HALT;
        }
        if self.reset_reads_remaining > 0 {
            self.reset_reads_remaining -= 1;
            value |= Dhcsr::S_RESET_ST;
        }
        value
    }

    fn msc_status(&mut self) -> u32 {
        let mut value = self.msc_errors | (1 << MscStatus::WDATAREADY_BIT);
        if self.busy_remaining > 0 {
            if !self.stuck_busy {
                self.busy_remaining -= 1;
            }
            value |= 1 << MscStatus::BUSY_BIT;
        }
        value
    }

    fn read_memory(&mut self, addr: u32) -> u32 {
        let addr = addr & !0x3;
        match addr {
            Dhcsr::ADDRESS => self.dhcsr(),
            Dcrdr::ADDRESS => self.dcrdr,
            Demcr::ADDRESS => self.demcr,
            Aircr::ADDRESS => 0xFA05_0000,
            MscWriteCtl::ADDRESS => u32::from(self.wren),
            MscAddrb::ADDRESS => self.addrb,
            MscWdata::ADDRESS => self.wdata,
            MscStatus::ADDRESS => self.msc_status(),
            PartInfo::ADDRESS => self.part_info,
            MemInfo::ADDRESS => self.mem_info,
            Pid2::ADDRESS => self.pid2,
            Pid3::ADDRESS => self.pid3,
            _ => {
                if self.loader.running && addr == Mailbox::default().status() {
                    self.loader_status_read();
                }
                self.memory_word(addr)
            }
        }
    }

    fn write_memory(&mut self, addr: u32, value: u32) {
        let addr = addr & !0x3;
        match addr {
            Dhcsr::ADDRESS => self.write_dhcsr(value),
            Dcrsr::ADDRESS => {
                let index = (value & 0x1F) as usize;
                if index < self.core_registers.len() {
                    if value & (1 << 16) != 0 {
                        self.core_registers[index] = self.dcrdr;
                    } else {
                        self.dcrdr = self.core_registers[index];
                    }
                }
            }
            Dcrdr::ADDRESS => self.dcrdr = value,
            Demcr::ADDRESS => self.demcr = value,
            Aircr::ADDRESS => self.write_aircr(value),
            MscWriteCtl::ADDRESS => self.wren = value & 1 != 0,
            MscAddrb::ADDRESS => self.addrb = value,
            MscWdata::ADDRESS => self.wdata = value,
            MscWriteCmd::ADDRESS => self.write_msc_cmd(value),
            _ if self.in_flash(addr) => {
                trace!("Sim: bus write to flash 0x{addr:08X} ignored");
            }
            _ => {
                self.memory.insert(addr, value);
            }
        }
    }

    fn write_dhcsr(&mut self, value: u32) {
        if value & 0xFFFF_0000 != Dhcsr::DBGKEY {
            trace!("Sim: DHCSR write without key ignored");
            return;
        }
        self.dhcsr_ctrl = value & 0xF;
        let was_halted = self.halted;
        // A step executes one instruction and halts again
        self.halted = value & Dhcsr::C_HALT != 0 || (was_halted && value & Dhcsr::C_STEP != 0);

        if was_halted && !self.halted && self.core_registers[15] == LOADER_ENTRY {
            trace!("Sim: flash loader started");
            self.loader.running = true;
            self.loader.ready = false;
            self.loader.status_reads = 0;
        }
    }

    fn write_aircr(&mut self, value: u32) {
        if value & 0xFFFF_0000 != Aircr::VECTKEY {
            return;
        }
        if value & (Aircr::VECTRESET | Aircr::SYSRESETREQ) == 0 {
            return;
        }
        if value & Aircr::SYSRESETREQ != 0 {
            self.system_resets += 1;
        } else {
            self.local_resets += 1;
        }

        self.reset_reads_remaining = self.reset_polls;
        self.halted = self.demcr & Demcr::VC_CORERESET != 0 && !self.ignore_halt_on_reset;
        self.loader.running = false;
        self.core_registers = [0; 17];
    }

    fn write_msc_cmd(&mut self, value: u32) {
        if value & (1 << MscWriteCmd::LADDRIM_BIT) != 0 {
            self.latched = self.addrb;
            self.msc_errors = 0;
        }
        if value & (1 << MscWriteCmd::ERASEPAGE_BIT) != 0 && self.wren {
            let page = self.latched & !(self.page_size() - 1);
            match self.flash_check(page) {
                Some(errors) => self.msc_errors = errors,
                None => self.erase_page(page),
            }
            self.busy_remaining = self.busy_polls;
        }
        if value & (1 << MscWriteCmd::WRITEONCE_BIT) != 0 && self.wren {
            let addr = self.latched;
            match self.flash_check(addr) {
                Some(errors) => self.msc_errors = errors,
                None => {
                    self.program_word(addr, self.wdata);
                    self.latched = addr.wrapping_add(4);
                }
            }
            self.busy_remaining = self.busy_polls;
        }
    }

    // MSC_STATUS error bits for an operation at `addr`, if it is refused.
    fn flash_check(&self, addr: u32) -> Option<u32> {
        if !self.in_flash(addr) {
            Some(1 << MscStatus::INVADDR_BIT)
        } else if self.locked {
            Some(1 << MscStatus::LOCKED_BIT)
        } else {
            None
        }
    }

    fn erase_page(&mut self, page: u32) {
        trace!("Sim: erase page 0x{page:08X}");
        let end = page + self.page_size();
        self.memory.retain(|&addr, _| addr < page || addr >= end);
        self.erased_pages.push(page);
    }

    // Flash programming can only clear bits.
    fn program_word(&mut self, addr: u32, data: u32) {
        trace!("Sim: program 0x{data:08X} at 0x{addr:08X}");
        let value = self.memory_word(addr) & data;
        self.memory.insert(addr, value);
        self.programmed_words.push((addr, data));
    }

    fn loader_status_read(&mut self) {
        let mailbox = Mailbox::default();
        if !self.loader.ready {
            if self.loader.status_reads < self.loader.ready_after {
                self.loader.status_reads += 1;
                return;
            }
            trace!("Sim: flash loader ready");
            self.loader.ready = true;
            let published = [
                (mailbox.buffer_address(), self.loader.buffer_address),
                (mailbox.buffer_size(), self.loader.buffer_size),
                (mailbox.status(), Status::Ready.to_word()),
            ];
            self.memory.extend(published);
            return;
        }

        let status = self.memory_word(mailbox.status());
        let command = self.memory_word(mailbox.command());
        if status != Status::Busy.to_word()
            || command == Command::None.to_word()
            || self.loader.stalled
        {
            return;
        }

        let args = [
            self.memory_word(mailbox.args()),
            self.memory_word(mailbox.args() + 4),
            self.memory_word(mailbox.args() + 8),
        ];
        let result = match Request::from_words(command, args) {
            Ok(Some(request)) => {
                self.loader.requests.push(request);
                match self.loader.fail_with {
                    Some(code) => code,
                    None => self.serve_request(&request),
                }
            }
            Ok(None) | Err(_) => ResultCode::UnknownCommand,
        };

        let status = if result == ResultCode::Ok {
            Status::Ready
        } else {
            Status::Error
        };
        let completed = [
            (mailbox.result(), result.to_word()),
            (mailbox.command(), Command::None.to_word()),
            (mailbox.status(), status.to_word()),
        ];
        self.memory.extend(completed);
    }

    fn serve_request(&mut self, request: &Request) -> ResultCode {
        match *request {
            Request::ErasePages { address, count } => {
                let page_size = self.page_size();
                let first = address & !(page_size - 1);
                for ii in 0..count {
                    let page = first + ii * page_size;
                    match self.flash_check(page) {
                        Some(errors) if errors & (1 << MscStatus::INVADDR_BIT) != 0 => {
                            return ResultCode::BadAddress;
                        }
                        Some(_) => return ResultCode::FlashFault,
                        None => self.erase_page(page),
                    }
                }
                ResultCode::Ok
            }
            Request::Write {
                address,
                length,
                crc,
            } => {
                if length > self.loader.buffer_size || address & 0x3 != 0 {
                    return ResultCode::BadAddress;
                }
                let buffer = self.loader.buffer_address;
                let payload: Vec<u8> = (0..length.div_ceil(4))
                    .flat_map(|ii| self.memory_word(buffer + ii * 4).to_le_bytes())
                    .take(length as usize)
                    .collect();
                if payload_crc(&payload) != crc {
                    return ResultCode::CrcMismatch;
                }
                for (ii, chunk) in payload.chunks(4).enumerate() {
                    let addr = address + (ii as u32) * 4;
                    match self.flash_check(addr) {
                        Some(errors) if errors & (1 << MscStatus::INVADDR_BIT) != 0 => {
                            return ResultCode::BadAddress;
                        }
                        Some(_) => return ResultCode::FlashFault,
                        None => {
                            let mut word = [ERASED_BYTE; 4];
                            word[..chunk.len()].copy_from_slice(chunk);
                            self.program_word(addr, u32::from_le_bytes(word));
                        }
                    }
                }
                ResultCode::Ok
            }
        }
    }

    fn advance_tar(&mut self, bytes: u32) {
        let csw = Csw::from(self.csw);
        if csw.addrinc() == Csw::ADDRINC_OFF {
            return;
        }
        self.tar = (self.tar & !self.tar_wrap) | (self.tar.wrapping_add(bytes) & self.tar_wrap);
    }

    fn check_fault(&self) -> Result<(), SwdError> {
        match self.faulting_address {
            Some(addr) if addr & !0x3 == self.tar & !0x3 => Err(SwdError::FaultAck),
            _ => Ok(()),
        }
    }

    fn read_drw(&mut self) -> Result<u32, SwdError> {
        self.check_fault()?;
        let csw = Csw::from(self.csw);
        let word = self.read_memory(self.tar);
        let value = match csw.size() {
            Csw::SIZE_32BIT => word,
            Csw::SIZE_16BIT => word & (0xFFFF << ((self.tar & 0x2) * 8)),
            _ => word & (0xFF << ((self.tar & 0x3) * 8)),
        };
        self.advance_tar(csw.bytes_per_transfer());
        Ok(value)
    }

    fn write_drw(&mut self, value: u32) -> Result<(), SwdError> {
        self.check_fault()?;
        let csw = Csw::from(self.csw);
        match (csw.size(), csw.addrinc()) {
            (Csw::SIZE_16BIT, Csw::ADDRINC_PACKED) => {
                self.write_half_word(self.tar, value as u16);
                self.write_half_word(self.tar.wrapping_add(2), (value >> 16) as u16);
            }
            (Csw::SIZE_16BIT, _) => {
                let half = (value >> ((self.tar & 0x2) * 8)) as u16;
                self.write_half_word(self.tar, half);
            }
            (Csw::SIZE_8BIT, _) => {
                let shift = (self.tar & 0x3) * 8;
                let word = self.memory_word(self.tar) & !(0xFF << shift);
                self.write_memory(self.tar, word | (value & (0xFF << shift)));
            }
            _ => self.write_memory(self.tar, value),
        }
        self.advance_tar(csw.bytes_per_transfer());
        Ok(())
    }

    fn write_half_word(&mut self, addr: u32, half: u16) {
        let shift = (addr & 0x2) * 8;
        let word = self.memory_word(addr) & !(0xFFFF << shift);
        self.write_memory(addr, word | (u32::from(half) << shift));
    }

    fn ap_register(&self, wire: u8) -> u8 {
        let bank = ((self.select >> 4) & 0xF) as u8;
        (bank << 4) | (wire << 2)
    }

    fn ap_selected(&self) -> bool {
        self.select >> 24 == 0
    }
}

impl SwdTransport for SimTarget {
    fn read_swd(&mut self, port: Port, addr: u8) -> Result<u32, SwdError> {
        let wire = addr & 0x3;
        match port {
            Port::Dp => {
                let value = match wire {
                    0 => self.idcode,
                    1 => self.ctrl_stat,
                    _ => self.rdbuff,
                };
                self.log.push(Transaction {
                    op: SwdOp::DpRead(wire << 2),
                    value,
                    ignore_ack: false,
                });
                Ok(value)
            }
            Port::Ap => {
                let register = self.ap_register(wire);
                let value = if !self.ap_selected() {
                    0
                } else {
                    match register {
                        0x00 => self.csw,
                        0x04 => self.tar,
                        0x0C => self.read_drw()?,
                        0xFC => self.idr,
                        _ => 0,
                    }
                };
                self.log.push(Transaction {
                    op: SwdOp::ApRead(register),
                    value,
                    ignore_ack: false,
                });
                // Posted: return the previous AP read's result
                let posted = self.rdbuff;
                self.rdbuff = value;
                Ok(posted)
            }
        }
    }

    fn write_swd(
        &mut self,
        port: Port,
        addr: u8,
        value: u32,
        ignore_ack: bool,
    ) -> Result<(), SwdError> {
        let wire = addr & 0x3;
        match port {
            Port::Dp => {
                self.log.push(Transaction {
                    op: SwdOp::DpWrite(wire << 2),
                    value,
                    ignore_ack,
                });
                match wire {
                    0 => self.aborts.push(value),
                    1 => {
                        let requested = value & CtrlStat::POWER_UP_REQUEST;
                        self.ctrl_stat = if self.refuse_power_up {
                            requested
                        } else {
                            // Each request bit acknowledged in the bit above it
                            requested | ((requested & 0x5000_0000) << 1)
                        };
                    }
                    2 => {
                        self.select = value;
                        self.select_writes += 1;
                    }
                    _ => {}
                }
                Ok(())
            }
            Port::Ap => {
                let register = self.ap_register(wire);
                self.log.push(Transaction {
                    op: SwdOp::ApWrite(register),
                    value,
                    ignore_ack,
                });
                if !self.ap_selected() {
                    return Ok(());
                }
                match register {
                    0x00 => self.csw = value,
                    0x04 => self.tar = value,
                    0x0C => self.write_drw(value)?,
                    _ => {}
                }
                Ok(())
            }
        }
    }
}
