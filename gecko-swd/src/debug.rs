// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! Debug Interface
//!
//! This module implements [`DebugInterface`], the high-level object used to
//! control and program an EFM32 target: halting, resetting and running the
//! core, identifying the part, and (in the [`flash`](crate::flash) and
//! [`loader`](crate::loader) modules) erasing and programming its flash.
//!
//! If this module does not give you the control you need, use
//! [`Self::mem_ap()`](DebugInterface::mem_ap) for word and block access, or
//! go down to the [`DebugPort`] from there.

use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::Mcu;
use gecko_core::arm::dp::IdCode;
use gecko_core::arm::scs::{Aircr, Demcr, Dhcsr};
use gecko_core::efm32::{Efm32Details, MemInfo, PartInfo, Pid2, Pid3};

use crate::SwdError;
use crate::config::{Config, Timing};
use crate::interface::DebugPort;
use crate::map::MemAp;
use crate::transport::SwdTransport;

/// The core's state, as read from DHCSR.  Never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetRunState {
    Running,
    Halted,
    InReset,
}

impl From<Dhcsr> for TargetRunState {
    fn from(dhcsr: Dhcsr) -> Self {
        if dhcsr.is_reset() {
            TargetRunState::InReset
        } else if dhcsr.is_halted() {
            TargetRunState::Halted
        } else {
            TargetRunState::Running
        }
    }
}

impl fmt::Display for TargetRunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetRunState::Running => write!(f, "Running"),
            TargetRunState::Halted => write!(f, "Halted"),
            TargetRunState::InReset => write!(f, "In Reset"),
        }
    }
}

/// ARM Debug Interface object
///
/// This is used by applications to control and program an EFM32 target.
///
/// The simplest way to create a `DebugInterface` is to use the
/// [`Self::connect()`] method, which takes any [`SwdTransport`]:
///
/// ```rust
/// use gecko_swd::{Config, DebugInterface};
/// use gecko_swd::sim::SimTarget;
///
/// let mut debug = DebugInterface::connect(SimTarget::default(), &Config::immediate()).unwrap();
/// let details = debug.identify().unwrap();
/// println!("Found {details}");
///
/// debug.reset_and_halt().unwrap();
/// let value = debug.read_mem(0x2000_0000).unwrap();
/// println!("Value at 0x2000_0000: 0x{value:08X}");
/// ```
#[derive(Debug)]
pub struct DebugInterface<T: SwdTransport> {
    mem: MemAp<T>,
    timing: Timing,
    mcu: Option<Mcu>,
}

impl<T: SwdTransport> DebugInterface<T> {
    /// Creates a new `DebugInterface` using an already configured [`MemAp`].
    pub fn new(mem: MemAp<T>) -> Self {
        let timing = *mem.timing();
        Self {
            mem,
            timing,
            mcu: None,
        }
    }

    /// Connects to the target: powers up the debug port and configures the
    /// MEM-AP named by `config`.
    ///
    /// Returns:
    /// - `Ok(DebugInterface)`: ready for use.  The part has not yet been
    ///   identified; see [`Self::identify()`].
    /// - `Err(SwdError::PowerUpFailure)`: the debug domain didn't power up.
    /// - `Err(SwdError)`: any transport error.
    pub fn connect(transport: T, config: &Config) -> Result<Self, SwdError> {
        let dp = DebugPort::connect(transport)?;
        let mem = MemAp::new(dp, config.ap_index, config.timing)?;
        Ok(Self::new(mem))
    }

    /// Returns the IDCODE read when connecting.
    pub fn idcode(&self) -> IdCode {
        self.mem.dp().idcode()
    }

    /// Returns the MCU details, once [`Self::identify()`] has succeeded.
    pub fn mcu(&self) -> Option<Mcu> {
        self.mcu
    }

    pub fn timing(&self) -> &Timing {
        &self.timing
    }

    /// Returns the underlying [`MemAp`], for lower-level memory access.
    pub fn mem_ap(&mut self) -> &mut MemAp<T> {
        &mut self.mem
    }

    /// Releases the transport.
    pub fn into_transport(self) -> T {
        self.mem.into_debug_port().into_transport()
    }

    /// Reads a 32-bit value from the target's memory at the specified address.
    pub fn read_mem(&mut self, addr: u32) -> Result<u32, SwdError> {
        self.mem.read_word(addr)
    }

    /// Writes a 32-bit value to the target's memory at the specified address.
    ///
    /// Writing to flash this way has no effect.  Use the flash engine.
    pub fn write_mem(&mut self, addr: u32, data: u32) -> Result<(), SwdError> {
        self.mem.write_word(addr, data)
    }

    /// Requests a halt.  Not verified: poll [`Self::run_state()`] to confirm.
    pub fn halt(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Halt");
        self.mem.write_register::<Dhcsr>(Dhcsr::stop())
    }

    /// Clears the halt request, leaving debug enabled.
    pub fn unhalt(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Unhalt");
        self.mem.write_register::<Dhcsr>(Dhcsr::unhalt())
    }

    /// Lets the core run with debug enabled.
    pub fn run(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Run");
        self.mem.run()
    }

    /// Single steps a halted core.
    pub fn step(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  Step");
        self.mem.write_register::<Dhcsr>(Dhcsr::step())
    }

    /// Requests a system reset through AIRCR.  Does not wait for it.
    pub fn system_reset(&mut self) -> Result<(), SwdError> {
        debug!("Exec:  System reset");
        self.mem.write_register::<Aircr>(Aircr::system_reset())
    }

    /// Resets the core and stops it on the first instruction.
    ///
    /// The core is halted, halt-on-reset is enabled in DEMCR and a local
    /// reset is requested.  DHCSR is then polled until S_RESET_ST clears,
    /// up to the reset poll budget, and finally checked for S_HALT.
    ///
    /// This must be used before a flash loader is uploaded, as seeding SP
    /// and PC needs a halted core.
    ///
    /// Returns:
    /// - `Ok(())`: the core is halted.
    /// - `Err(SwdError::ResetTimeout)`: the core stayed in reset.
    /// - `Err(SwdError::HaltVerificationFailure)`: the core came out of
    ///   reset but is not halted.
    pub fn reset_and_halt(&mut self) -> Result<(), SwdError> {
        self.halt()?;
        self.timing.settle();

        self.mem.write_register::<Demcr>(Demcr::halt_on_reset())?;
        self.mem.write_register::<Aircr>(Aircr::local_reset())?;

        let budget = self.timing.reset_polls;
        let mut polls = 0;
        loop {
            let dhcsr = self.mem.read_register::<Dhcsr>()?;
            polls += 1;
            if !dhcsr.is_reset() {
                trace!("Value: DHCSR {dhcsr} out of reset after {polls} polls");
                break;
            }
            if polls >= budget {
                error!("Core still in reset: DHCSR {dhcsr} after {polls} polls");
                return Err(SwdError::ResetTimeout {
                    dhcsr: dhcsr.into(),
                    polls,
                });
            }
        }

        self.timing.settle();

        let dhcsr = self.mem.read_register::<Dhcsr>()?;
        if !dhcsr.is_halted() {
            error!("Core not halted after reset: DHCSR {dhcsr}");
            return Err(SwdError::HaltVerificationFailure {
                dhcsr: dhcsr.into(),
            });
        }

        debug!("OK:    Core reset and halted");
        Ok(())
    }

    /// Reads DHCSR and reports the core's state.
    pub fn run_state(&mut self) -> Result<TargetRunState, SwdError> {
        let dhcsr = self.mem.read_register::<Dhcsr>()?;
        Ok(TargetRunState::from(dhcsr))
    }

    /// Reads the device information page and ROM table IDs and decodes the
    /// part.  On success the MEM-AP's TAR wrap is set for the family.
    ///
    /// Returns:
    /// - `Ok(Efm32Details)`: the decoded part.
    /// - `Err(SwdError::UnsupportedPart)`: the family code is not one that
    ///   can be programmed.  The MCU is then recorded as [`Mcu::Unknown`].
    pub fn identify(&mut self) -> Result<Efm32Details, SwdError> {
        let part_info = self.mem.read_register::<PartInfo>()?;
        let mem_info = self.mem.read_register::<MemInfo>()?;
        let pid2 = self.mem.read_register::<Pid2>()?;
        let pid3 = self.mem.read_register::<Pid3>()?;
        trace!("Value: PART_INFO {part_info} MEM_INFO {mem_info} PID2 {pid2} PID3 {pid3}");

        let details = match Efm32Details::from_raw(part_info, mem_info, pid2, pid3) {
            Ok(details) => details,
            Err(family) => {
                error!("Unsupported part: family code {family} in PART_INFO {part_info}");
                self.mcu = Some(Mcu::Unknown(self.idcode()));
                return Err(SwdError::UnsupportedPart { family });
            }
        };

        let mcu = Mcu::Efm32 {
            idcode: self.idcode(),
            details,
        };
        self.mem.set_tar_wrap(mcu.tar_wrap());
        self.mcu = Some(mcu);

        info!("Identified {mcu:#}");
        Ok(details)
    }
}
