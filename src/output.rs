//! Per-context output lines and their delivery to harts.

use alloc::boxed::Box;
use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use crate::consts::{MIP_MEIP, MIP_SEIP};
use crate::topology::{PlicContext, PlicMode};

/// Consumer of the PLIC's external-interrupt lines, usually the hart model.
pub trait HartIrqSink: Send + Sync {
    /// Drives the external interrupt line of `mode` on hart `hart_id` to `level`.
    ///
    /// Only called for [`PlicMode::Machine`] and [`PlicMode::Supervisor`].
    fn set_external_irq(&self, hart_id: usize, mode: PlicMode, level: bool);
}

impl<T: HartIrqSink + ?Sized> HartIrqSink for Arc<T> {
    fn set_external_irq(&self, hart_id: usize, mode: PlicMode, level: bool) {
        (**self).set_external_irq(hart_id, mode, level)
    }
}

impl<T: HartIrqSink + ?Sized> HartIrqSink for &T {
    fn set_external_irq(&self, hart_id: usize, mode: PlicMode, level: bool) {
        (**self).set_external_irq(hart_id, mode, level)
    }
}

/// One level line per context, forwarded to a [`HartIrqSink`].
pub struct OutputDriver<S> {
    lines: Box<[AtomicBool]>,
    sink: S,
}

impl<S: HartIrqSink> OutputDriver<S> {
    pub fn new(num_contexts: usize, sink: S) -> Self {
        Self {
            lines: (0..num_contexts).map(|_| AtomicBool::new(false)).collect(),
            sink,
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Current level of the line of context `addr_id`.
    pub fn level(&self, addr_id: usize) -> bool {
        self.lines
            .get(addr_id)
            .is_some_and(|l| l.load(Ordering::Acquire))
    }

    /// Drives the line of `context` to `level`.
    ///
    /// User and hypervisor contexts keep their line but reach no hart.
    pub fn drive(&self, context: &PlicContext, level: bool) {
        if let Some(line) = self.lines.get(context.addr_id) {
            line.store(level, Ordering::Release);
        }
        match context.mode {
            PlicMode::Machine | PlicMode::Supervisor => {
                self.sink
                    .set_external_irq(context.hart_id, context.mode, level)
            }
            PlicMode::User | PlicMode::Hypervisor => {}
        }
    }
}

/// A sink holding one `mip` word per hart.
///
/// Machine contexts drive `MEIP`, supervisor contexts drive `SEIP`.
/// Lines of harts beyond `num_harts` are dropped.
pub struct MipLines {
    mip: Box<[AtomicUsize]>,
}

impl MipLines {
    pub fn new(num_harts: usize) -> Self {
        Self {
            mip: (0..num_harts).map(|_| AtomicUsize::new(0)).collect(),
        }
    }

    pub fn num_harts(&self) -> usize {
        self.mip.len()
    }

    /// Current `mip` bits of `hart_id`, 0 for unknown harts.
    pub fn mip(&self, hart_id: usize) -> usize {
        self.mip
            .get(hart_id)
            .map_or(0, |m| m.load(Ordering::Acquire))
    }

    /// Whether the external interrupt of `mode` is pending on `hart_id`.
    pub fn is_pending(&self, hart_id: usize, mode: PlicMode) -> bool {
        match mip_bit(mode) {
            Some(bit) => self.mip(hart_id) & bit != 0,
            None => false,
        }
    }
}

impl HartIrqSink for MipLines {
    fn set_external_irq(&self, hart_id: usize, mode: PlicMode, level: bool) {
        let (Some(mip), Some(bit)) = (self.mip.get(hart_id), mip_bit(mode)) else {
            return;
        };
        if level {
            mip.fetch_or(bit, Ordering::AcqRel);
        } else {
            mip.fetch_and(!bit, Ordering::AcqRel);
        }
    }
}

fn mip_bit(mode: PlicMode) -> Option<usize> {
    match mode {
        PlicMode::Machine => Some(MIP_MEIP),
        PlicMode::Supervisor => Some(MIP_SEIP),
        _ => None,
    }
}
