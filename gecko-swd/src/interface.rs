// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! ARM Debug Port
//!
//! This module implements [`DebugPort`], which turns the single
//! transactions of an [`SwdTransport`] into DP register access and routed,
//! bank-selected AP register access.

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use gecko_core::arm::dp::{
    Abort, AbortRegister, CtrlStat, CtrlStatRegister, IdCode, IdCodeRegister, RdBuffRegister,
    Select, SelectRegister,
};
use gecko_core::arm::register::{ApRegister, DpRegister, ReadableRegister, WritableRegister};

use crate::SwdError;
use crate::transport::{SwdOp, SwdTransport};

/// The single logical connection to a target's debug port.
///
/// `DebugPort` caches the AP index and register bank last written to the
/// DP SELECT register, and only rewrites SELECT when an AP access needs a
/// different one.  The cache assumes nothing else writes SELECT: all
/// traffic to the target must go through one `DebugPort`.
///
/// Create using [`DebugPort::connect()`]:
///
/// ```rust
/// use gecko_swd::DebugPort;
/// use gecko_swd::sim::SimTarget;
///
/// let mut dp = DebugPort::connect(SimTarget::default()).unwrap();
/// println!("IDCODE: {}", dp.idcode());
/// ```
#[derive(Debug)]
pub struct DebugPort<T: SwdTransport> {
    transport: T,
    idcode: IdCode,
    selected: Select,
}

impl<T: SwdTransport> DebugPort<T> {
    /// Connects to the debug port and powers up the debug and system
    /// domains.
    ///
    /// An IDCODE outside the accepted set is logged as a warning and the
    /// connection continues.
    ///
    /// Returns:
    /// - `Ok(DebugPort)`: powered up, with AP 0 bank 0 selected.
    /// - `Err(SwdError::PowerUpFailure)`: CTRL/STAT did not show both
    ///   domains powered.
    /// - `Err(SwdError)`: any transport error.
    pub fn connect(transport: T) -> Result<Self, SwdError> {
        let mut dp = DebugPort {
            transport,
            idcode: IdCode::default(),
            selected: Select::default(),
        };

        let idcode = dp.read_dp_register(IdCodeRegister)?;
        dp.idcode = idcode;
        match idcode.cortex() {
            Some(core) => debug!("OK:    IDCODE {idcode} ({core})"),
            None => warn!("Unexpected IDCODE {idcode}, continuing"),
        }

        dp.power_up()?;

        dp.select(0, 0)?;

        Ok(dp)
    }

    fn power_up(&mut self) -> Result<(), SwdError> {
        self.write_dp_register(CtrlStatRegister, CtrlStat::power_up_request())?;

        let status = self.status()?;
        if !status.is_powered() {
            error!(
                "Debug power-up failed: CTRL/STAT {status} ({})",
                status.power_states()
            );
            return Err(SwdError::PowerUpFailure {
                ctrl_stat: status.value(),
            });
        }

        debug!("OK:    Debug domain powered up {}", status.power_states());
        Ok(())
    }

    /// The IDCODE read when connecting.
    pub fn idcode(&self) -> IdCode {
        self.idcode
    }

    /// The AP index and bank last written to SELECT.
    pub fn selected(&self) -> (u8, u8) {
        (self.selected.apsel(), self.selected.apbanksel())
    }

    /// Access to the underlying transport.
    ///
    /// Writing DP SELECT through this bypasses the bank cache.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Releases the transport.
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Write a Debug Port register
    ///
    /// Arguments:
    /// - `reg`: The register to write, which must implement the `DpRegister`
    ///   trait.
    /// - `value`: The typed value to write.
    pub fn write_dp_register<R>(&mut self, _reg: R, value: R::Value) -> Result<(), SwdError>
    where
        R: WritableRegister + DpRegister,
        u32: From<R::Value>,
    {
        let op = SwdOp::DpWrite(R::ADDRESS);
        let raw = R::to_raw(value);
        trace!("Exec:  {op} 0x{raw:08X}");
        self.transport
            .write_swd(op.port(), op.wire_address(), raw, false)
    }

    /// Read a Debug Port register
    ///
    /// Arguments:
    /// - `reg`: The register to read, which must implement the `DpRegister`
    ///   trait.
    ///
    /// Returns:
    /// - `Ok(value)` the typed register value.
    /// - `Err(SwdError)` if the transport failed.
    pub fn read_dp_register<R>(&mut self, _reg: R) -> Result<R::Value, SwdError>
    where
        R: ReadableRegister + DpRegister,
        R::Value: From<u32>,
    {
        let op = SwdOp::DpRead(R::ADDRESS);
        let raw = self.transport.read_swd(op.port(), op.wire_address())?;
        trace!("Value: {op} 0x{raw:08X}");
        Ok(R::from_raw(raw))
    }

    /// Reads CTRL/STAT.
    pub fn status(&mut self) -> Result<CtrlStat, SwdError> {
        self.read_dp_register(CtrlStatRegister)
    }

    /// Writes ABORT.
    ///
    /// ```rust
    /// # use gecko_swd::DebugPort;
    /// # use gecko_swd::sim::SimTarget;
    /// use gecko_core::arm::dp::Abort;
    ///
    /// # let mut dp = DebugPort::connect(SimTarget::default()).unwrap();
    /// dp.abort(Abort::new(true, true, true, true, false)).unwrap();
    /// ```
    pub fn abort(&mut self, abort: Abort) -> Result<(), SwdError> {
        self.write_dp_register(AbortRegister, abort)
    }

    /// Writes CTRL/STAT.  Build the value with [`CtrlStat::control()`] so the
    /// power-up requests stay asserted.
    pub fn control(&mut self, ctrl: CtrlStat) -> Result<(), SwdError> {
        self.write_dp_register(CtrlStatRegister, ctrl)
    }

    /// Reads RDBUFF: the result of the last AP read.
    pub fn read_rb(&mut self) -> Result<u32, SwdError> {
        let rdbuff = self.read_dp_register(RdBuffRegister)?;
        Ok(rdbuff.data())
    }

    /// Unconditionally writes SELECT and updates the cache.
    ///
    /// It is unnecessary to call this directly when using [`Self::read_ap`]
    /// and [`Self::write_ap`], which select the right bank themselves.
    pub fn select(&mut self, ap: u8, bank: u8) -> Result<(), SwdError> {
        let select = Select::new(ap, bank);
        self.write_dp_register(SelectRegister, select)?;
        self.selected = select;
        Ok(())
    }

    // Writes SELECT only if (ap, bank) differs from the last one written.
    fn ensure_selected(&mut self, ap: u8, addr: u8) -> Result<(), SwdError> {
        let wanted = Select::for_ap_register(ap, addr);
        if wanted != self.selected {
            trace!(
                "Exec:  SELECT AP {} bank {}",
                wanted.apsel(),
                wanted.apbanksel()
            );
            self.select(wanted.apsel(), wanted.apbanksel())?;
        }
        Ok(())
    }

    /// Issues a raw AP read.
    ///
    /// AP reads are posted, so the value returned is the result of the
    /// previous AP read.  Follow with [`Self::read_rb()`] to get this one.
    ///
    /// Arguments:
    /// - `ap`: The access port index.
    /// - `addr`: The AP register byte address.  Bits 7:4 select the bank,
    ///   bits 3:2 the register within it.
    pub fn read_ap(&mut self, ap: u8, addr: u8) -> Result<u32, SwdError> {
        self.ensure_selected(ap, addr)?;
        let op = SwdOp::ApRead(addr);
        let raw = self.transport.read_swd(op.port(), op.wire_address())?;
        trace!("Value: {op} 0x{raw:08X} (posted)");
        Ok(raw)
    }

    /// Issues a raw AP write.
    ///
    /// Arguments:
    /// - `ap`: The access port index.
    /// - `addr`: The AP register byte address.
    /// - `value`: The value to write.
    /// - `ignore_ack`: Don't fail on a non-OK acknowledgement.  Used for
    ///   packed transfers, whose acknowledgement timing some adapters get
    ///   wrong.
    pub fn write_ap(
        &mut self,
        ap: u8,
        addr: u8,
        value: u32,
        ignore_ack: bool,
    ) -> Result<(), SwdError> {
        self.ensure_selected(ap, addr)?;
        let op = SwdOp::ApWrite(addr);
        trace!("Exec:  {op} 0x{value:08X}");
        self.transport
            .write_swd(op.port(), op.wire_address(), value, ignore_ack)
    }

    /// Write an Access Port register
    pub fn write_ap_register<R>(&mut self, ap: u8, _reg: R, value: R::Value) -> Result<(), SwdError>
    where
        R: WritableRegister + ApRegister,
        u32: From<R::Value>,
    {
        self.write_ap(ap, R::ADDRESS, R::to_raw(value), false)
    }

    /// Read an Access Port register
    ///
    /// Unlike [`Self::read_ap()`], this completes the read through RDBUFF and
    /// returns this register's value.
    pub fn read_ap_register<R>(&mut self, ap: u8, _reg: R) -> Result<R::Value, SwdError>
    where
        R: ReadableRegister + ApRegister,
        R::Value: From<u32>,
    {
        self.read_ap(ap, R::ADDRESS)?;
        let raw = self.read_rb()?;
        Ok(R::from_raw(raw))
    }
}
