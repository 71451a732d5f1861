//! Emulated RISC-V Platform-Level Interrupt Controller.
//!
//! [`VPlic`] multiplexes a configurable number of interrupt sources onto a set
//! of (hart, privilege mode) contexts described by a compact descriptor string
//! such as `"M,MS,MS"`. Peripheral models raise and lower source lines, harts
//! access the memory-mapped registers through [`BaseDeviceOps`], and every
//! context drives one external-interrupt line through a [`HartIrqSink`].
//!
//! All shared state lives in atomic words. Concurrent raises, claims and
//! completions never take a lock.

#![cfg_attr(not(test), no_std)]

extern crate alloc;
#[macro_use]
extern crate log;

mod arbiter;
mod bitfield;
mod config;
mod consts;
mod decoder;
mod output;
mod snapshot;
mod topology;
mod utils;

pub use arbiter::Arbiter;
pub use bitfield::{AtomicBitfield, HexWords};
pub use config::PlicConfig;
pub use consts::*;
pub use decoder::{DecodeError, PlicRegister, RegisterDecoder};
pub use output::{HartIrqSink, MipLines, OutputDriver};
pub use snapshot::PlicSnapshot;
pub use topology::{hart_config_for, parse_hart_config, PlicContext, PlicMode};

use alloc::vec::Vec;

use axaddrspace::{device::AccessWidth, GuestPhysAddr, GuestPhysAddrRange};
use axdevice_base::{BaseDeviceOps, EmuDeviceType};
use axerrno::{AxError, AxResult};

pub struct VPlic<S> {
    /// The address of the VPlic in the guest physical address space.
    pub addr: GuestPhysAddr,
    /// The size of the VPlic in bytes.
    pub size: usize,
    /// Contexts in address order.
    contexts: Vec<PlicContext>,
    decoder: RegisterDecoder,
    arbiter: Arbiter,
    output: OutputDriver<S>,
}

impl<S: HartIrqSink> VPlic<S> {
    /// Creates a controller at `addr` from `config`, driving harts through `sink`.
    ///
    /// Fails with [`AxError::InvalidInput`] on a malformed descriptor or
    /// register geometry; the caller is expected to abort startup.
    pub fn new(addr: GuestPhysAddr, config: &PlicConfig<'_>, sink: S) -> AxResult<Self> {
        let contexts = parse_hart_config(config.hart_config)?;
        config.validate(contexts.len())?;
        let decoder =
            RegisterDecoder::new(config, contexts.len()).ok_or(AxError::InvalidInput)?;

        info!(
            "plic: created at {:#x} size {:#x}, {} sources, {} contexts ({})",
            addr.as_usize(),
            config.aperture_size,
            config.num_sources,
            contexts.len(),
            config.hart_config,
        );

        Ok(Self {
            addr,
            size: config.aperture_size,
            arbiter: Arbiter::new(
                config.num_sources as usize,
                config.num_priorities,
                contexts.len(),
            ),
            output: OutputDriver::new(contexts.len(), sink),
            decoder,
            contexts,
        })
    }

    pub fn contexts(&self) -> &[PlicContext] {
        &self.contexts
    }

    pub fn num_contexts(&self) -> usize {
        self.contexts.len()
    }

    pub fn num_sources(&self) -> usize {
        self.arbiter.num_sources()
    }

    /// The arbitration state, for inspection.
    pub fn arbiter(&self) -> &Arbiter {
        &self.arbiter
    }

    pub fn sink(&self) -> &S {
        self.output.sink()
    }

    /// Finds the context of `hart_id` in `mode`.
    pub fn find_context(&self, hart_id: usize, mode: PlicMode) -> Option<&PlicContext> {
        self.contexts
            .iter()
            .find(|c| c.hart_id == hart_id && c.mode == mode)
    }

    /// A handle a peripheral model can keep to drive source `source`.
    pub fn irq_line(&self, source: u32) -> IrqLine<'_, S> {
        IrqLine { plic: self, source }
    }

    /// Asserts source `source`.
    pub fn raise_source(&self, source: u32) {
        self.set_source_level(source, true);
    }

    /// Deasserts source `source`.
    pub fn lower_source(&self, source: u32) {
        self.set_source_level(source, false);
    }

    /// Drives source `source` to `level` and recomputes every context.
    ///
    /// Source 0 and ids past the configured count are ignored.
    pub fn set_source_level(&self, source: u32, level: bool) {
        let id = source as usize;
        if id == 0 || id >= self.arbiter.num_sources() {
            warn!("plic: ignoring level {level} on invalid source {source}");
            return;
        }
        trace!("plic: source {source} level {level}");
        self.arbiter.set_pending(id, level);
        self.update();
    }

    /// Whether a source is currently owed to context `addr_id`.
    pub fn has_pending_interrupt(&self, addr_id: usize) -> bool {
        self.arbiter.has_pending_interrupt(addr_id)
    }

    /// Claims the next source for context `addr_id`, 0 if none.
    pub fn claim(&self, addr_id: usize) -> u32 {
        let source = self.arbiter.claim(addr_id);
        self.update();
        source
    }

    /// Signals that context `addr_id` finished servicing `source`.
    pub fn complete(&self, addr_id: usize, source: u32) {
        if self.arbiter.complete(addr_id, source as usize) {
            self.update();
        }
    }

    /// Level of the output line of context `addr_id`.
    pub fn output_level(&self, addr_id: usize) -> bool {
        self.output.level(addr_id)
    }

    /// Recomputes and drives the output line of every context.
    pub fn update(&self) {
        for context in &self.contexts {
            let level = self.arbiter.has_pending_interrupt(context.addr_id);
            self.output.drive(context, level);
        }

        if log_enabled!(log::Level::Trace) {
            self.log_state();
        }
    }

    fn log_state(&self) {
        let words = self.arbiter.bitfield_words();
        trace!("pending       : {}", self.arbiter.pending().hex(0, words));
        trace!("claimed       : {}", self.arbiter.claimed().hex(0, words));
        for context in &self.contexts {
            trace!(
                "{context} enable: {}",
                self.arbiter
                    .enable()
                    .hex(context.addr_id * words, words)
            );
        }
    }

    /// Copies out the state needed to resume arbitration.
    pub fn snapshot(&self) -> PlicSnapshot {
        PlicSnapshot::capture(&self.arbiter)
    }

    /// Loads a snapshot taken from a controller of the same shape and
    /// recomputes the outputs.
    pub fn restore(&self, snapshot: &PlicSnapshot) -> AxResult {
        snapshot.apply(&self.arbiter)?;
        self.update();
        Ok(())
    }

    /// Reads the 32-bit register at `offset` from the aperture start.
    ///
    /// Invalid offsets are logged and read as 0.
    pub fn read_register(&self, offset: usize) -> u32 {
        let reg = match self.decoder.decode(offset) {
            Ok(reg) => reg,
            Err(err) => {
                error!("plic: invalid register read ({err}): {offset:#x}");
                return 0;
            }
        };
        match reg {
            PlicRegister::Priority { source } => {
                let value = self.arbiter.priority(source);
                trace!("plic: read priority: irq={source} priority={value}");
                value
            }
            PlicRegister::Pending { word } => {
                let value = self.arbiter.pending_word(word);
                trace!("plic: read pending: word={word} value={value:#x}");
                value
            }
            PlicRegister::Enable { context, word } => {
                let value = self.arbiter.enable_word(context, word);
                trace!(
                    "plic: read enable: {} word={word} value={value:#x}",
                    self.contexts[context]
                );
                value
            }
            PlicRegister::Threshold { context } => {
                let value = self.arbiter.threshold(context);
                trace!(
                    "plic: read threshold: {} threshold={value}",
                    self.contexts[context]
                );
                value
            }
            PlicRegister::ClaimComplete { context } => {
                let value = self.claim(context);
                trace!("plic: read claim: {} irq={value}", self.contexts[context]);
                value
            }
        }
    }

    /// Writes the 32-bit register at `offset` from the aperture start.
    ///
    /// Invalid offsets, writes to the pending window and out-of-range
    /// priority or threshold values are logged and discarded.
    pub fn write_register(&self, offset: usize, value: u32) {
        let reg = match self.decoder.decode(offset) {
            Ok(reg) => reg,
            Err(err) => {
                error!("plic: invalid register write ({err}): {offset:#x}");
                return;
            }
        };
        match reg {
            PlicRegister::Priority { source } => {
                trace!("plic: write priority: irq={source} priority={value}");
                if self.arbiter.set_priority(source, value) {
                    self.update();
                } else {
                    warn!("plic: ignoring priority {value} for irq {source}");
                }
            }
            PlicRegister::Pending { .. } => {
                error!("plic: invalid pending write: {offset:#x}");
            }
            PlicRegister::Enable { context, word } => {
                trace!(
                    "plic: write enable: {} word={word} value={value:#x}",
                    self.contexts[context]
                );
                self.arbiter.set_enable_word(context, word, value);
                self.update();
            }
            PlicRegister::Threshold { context } => {
                trace!(
                    "plic: write threshold: {} threshold={value}",
                    self.contexts[context]
                );
                if self.arbiter.set_threshold(context, value) {
                    self.update();
                } else {
                    warn!(
                        "plic: ignoring threshold {value} for {}",
                        self.contexts[context]
                    );
                }
            }
            PlicRegister::ClaimComplete { context } => {
                trace!(
                    "plic: write complete: {} irq={value}",
                    self.contexts[context]
                );
                self.complete(context, value);
            }
        }
    }
}

impl<S: HartIrqSink + 'static> BaseDeviceOps<GuestPhysAddrRange> for VPlic<S> {
    fn emu_type(&self) -> axdevice_base::EmuDeviceType {
        EmuDeviceType::PPPTGlobal
    }

    fn address_range(&self) -> GuestPhysAddrRange {
        GuestPhysAddrRange::from_start_size(self.addr, self.size)
    }

    fn handle_read(
        &self,
        addr: <GuestPhysAddrRange as axaddrspace::device::DeviceAddrRange>::Addr,
        width: axaddrspace::device::AccessWidth,
    ) -> axerrno::AxResult<usize> {
        let reg = addr - self.addr;
        if width != AccessWidth::Dword {
            error!("plic: invalid register read width {width:?}: {reg:#x}");
            return Ok(0);
        }
        Ok(self.read_register(reg) as usize)
    }

    fn handle_write(
        &self,
        addr: <GuestPhysAddrRange as axaddrspace::device::DeviceAddrRange>::Addr,
        width: axaddrspace::device::AccessWidth,
        val: usize,
    ) -> axerrno::AxResult {
        let reg = addr - self.addr;
        if width != AccessWidth::Dword {
            error!("plic: invalid register write width {width:?}: {reg:#x}");
            return Ok(());
        }
        if val > u32::MAX as usize {
            error!("plic: invalid register write value {val:#x}: {reg:#x}");
            return Ok(());
        }
        self.write_register(reg, val as u32);
        Ok(())
    }
}

/// A source line held by a peripheral model.
pub struct IrqLine<'a, S> {
    plic: &'a VPlic<S>,
    source: u32,
}

impl<S: HartIrqSink> IrqLine<'_, S> {
    pub fn source(&self) -> u32 {
        self.source
    }

    pub fn raise(&self) {
        self.plic.raise_source(self.source);
    }

    pub fn lower(&self) {
        self.plic.lower_source(self.source);
    }

    /// Any level above zero asserts the line.
    pub fn set_level(&self, level: i32) {
        self.plic.set_source_level(self.source, level > 0);
    }
}

impl<S> Clone for IrqLine<'_, S> {
    fn clone(&self) -> Self {
        Self {
            plic: self.plic,
            source: self.source,
        }
    }
}
