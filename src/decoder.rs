//! Classification of register offsets into the four PLIC windows.

use core::fmt;

use crate::config::PlicConfig;
use crate::consts::{PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET, PLIC_CONTEXT_THRESHOLD_OFFSET};
use crate::utils::stride_shift;

/// A decoded register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlicRegister {
    /// Priority of `source`.
    Priority { source: usize },
    /// Read-only pending word `word`.
    Pending { word: usize },
    /// Enable word `word` of context `context`.
    Enable { context: usize, word: usize },
    /// Priority threshold of context `context`.
    Threshold { context: usize },
    /// Claim (read) / complete (write) register of context `context`.
    ClaimComplete { context: usize },
}

/// Why an offset does not name a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// Low two bits are not zero.
    Misaligned,
    /// Outside every window, or a hole inside one.
    Unmapped,
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Misaligned => f.write_str("misaligned"),
            DecodeError::Unmapped => f.write_str("unmapped"),
        }
    }
}

/// Base/stride arithmetic over the register aperture.
///
/// Strides are powers of two, so the context index is a shift and the offset
/// inside a context's block is a mask.
#[derive(Debug, Clone)]
pub struct RegisterDecoder {
    priority_base: usize,
    pending_base: usize,
    enable_base: usize,
    enable_shift: u32,
    context_base: usize,
    context_shift: u32,
    num_sources: usize,
    num_contexts: usize,
    bitfield_words: usize,
}

impl RegisterDecoder {
    /// Builds a decoder for a validated config. Returns `None` if a stride is
    /// not a power of two.
    pub fn new(config: &PlicConfig<'_>, num_contexts: usize) -> Option<Self> {
        Some(Self {
            priority_base: config.priority_base,
            pending_base: config.pending_base,
            enable_base: config.enable_base,
            enable_shift: stride_shift(config.enable_stride)?,
            context_base: config.context_base,
            context_shift: stride_shift(config.context_stride)?,
            num_sources: config.num_sources as usize,
            num_contexts,
            bitfield_words: config.bitfield_words(),
        })
    }

    /// Decodes `offset`, relative to the aperture start.
    ///
    /// Windows are tried in order: priority, pending, enable, context.
    pub fn decode(&self, offset: usize) -> Result<PlicRegister, DecodeError> {
        if offset & 0x3 != 0 {
            return Err(DecodeError::Misaligned);
        }

        if let Some(off) = window(offset, self.priority_base, self.num_sources << 2) {
            return Ok(PlicRegister::Priority { source: off >> 2 });
        }
        if let Some(off) = window(offset, self.pending_base, self.bitfield_words << 2) {
            return Ok(PlicRegister::Pending { word: off >> 2 });
        }
        if let Some(off) = window(
            offset,
            self.enable_base,
            self.num_contexts << self.enable_shift,
        ) {
            let context = off >> self.enable_shift;
            let word = (off & ((1 << self.enable_shift) - 1)) >> 2;
            if word < self.bitfield_words {
                return Ok(PlicRegister::Enable { context, word });
            }
            return Err(DecodeError::Unmapped);
        }
        if let Some(off) = window(
            offset,
            self.context_base,
            self.num_contexts << self.context_shift,
        ) {
            let context = off >> self.context_shift;
            return match off & ((1 << self.context_shift) - 1) {
                PLIC_CONTEXT_THRESHOLD_OFFSET => Ok(PlicRegister::Threshold { context }),
                PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET => Ok(PlicRegister::ClaimComplete { context }),
                _ => Err(DecodeError::Unmapped),
            };
        }

        Err(DecodeError::Unmapped)
    }
}

/// Offset of `addr` inside `[base, base + len)`, if it lies there.
#[inline]
fn window(addr: usize, base: usize, len: usize) -> Option<usize> {
    let off = addr.checked_sub(base)?;
    (off < len).then_some(off)
}
