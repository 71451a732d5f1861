use axerrno::{AxError, AxResult};

use crate::consts::*;
use crate::utils::{bitfield_words, stride_shift};

/// Construction-time parameters of a PLIC instance.
///
/// All bases and strides are byte offsets relative to the start of the
/// register aperture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlicConfig<'a> {
    /// Hart/mode descriptor, see [`parse_hart_config`](crate::parse_hart_config).
    pub hart_config: &'a str,
    /// Number of sources, source 0 included.
    pub num_sources: u32,
    /// Highest legal priority and threshold value.
    pub num_priorities: u32,
    pub priority_base: usize,
    pub pending_base: usize,
    pub enable_base: usize,
    /// Must be a power of two.
    pub enable_stride: usize,
    pub context_base: usize,
    /// Must be a power of two.
    pub context_stride: usize,
    pub aperture_size: usize,
}

impl<'a> PlicConfig<'a> {
    /// Config using the SiFive register geometry.
    pub const fn with_default_layout(
        hart_config: &'a str,
        num_sources: u32,
        num_priorities: u32,
    ) -> Self {
        Self {
            hart_config,
            num_sources,
            num_priorities,
            priority_base: PLIC_PRIORITY_OFFSET,
            pending_base: PLIC_PENDING_OFFSET,
            enable_base: PLIC_ENABLE_OFFSET,
            enable_stride: PLIC_ENABLE_STRIDE,
            context_base: PLIC_CONTEXT_CTRL_OFFSET,
            context_stride: PLIC_CONTEXT_STRIDE,
            aperture_size: PLIC_APERTURE_SIZE,
        }
    }

    /// Number of 32-bit words in the pending, claimed and per-context enable bitmaps.
    pub const fn bitfield_words(&self) -> usize {
        bitfield_words(self.num_sources as usize)
    }

    /// Checks the geometry for `num_contexts` contexts.
    pub fn validate(&self, num_contexts: usize) -> AxResult {
        let words = self.bitfield_words();

        if self.num_sources == 0 || self.num_sources as usize > PLIC_MAX_SOURCES {
            error!("plic: unsupported number of sources {}", self.num_sources);
            return Err(AxError::InvalidInput);
        }
        if stride_shift(self.enable_stride).is_none() {
            error!(
                "plic: enable stride {:#x} is not a power of two",
                self.enable_stride
            );
            return Err(AxError::InvalidInput);
        }
        if stride_shift(self.context_stride).is_none() {
            error!(
                "plic: context stride {:#x} is not a power of two",
                self.context_stride
            );
            return Err(AxError::InvalidInput);
        }
        if self.enable_stride < words * 4 {
            error!(
                "plic: enable stride {:#x} cannot hold {} words",
                self.enable_stride, words
            );
            return Err(AxError::InvalidInput);
        }
        if self.context_stride < PLIC_CONTEXT_CLAIM_COMPLETE_OFFSET + 4 {
            error!(
                "plic: context stride {:#x} cannot hold threshold and claim registers",
                self.context_stride
            );
            return Err(AxError::InvalidInput);
        }

        let (Some(enable_len), Some(context_len)) = (
            num_contexts.checked_mul(self.enable_stride),
            num_contexts.checked_mul(self.context_stride),
        ) else {
            error!("plic: {num_contexts} contexts overflow the register windows");
            return Err(AxError::InvalidInput);
        };
        let windows = [
            ("priority", self.priority_base, self.num_sources as usize * 4),
            ("pending", self.pending_base, words * 4),
            ("enable", self.enable_base, enable_len),
            ("context", self.context_base, context_len),
        ];
        for (name, base, len) in windows {
            match base.checked_add(len) {
                Some(end) if end <= self.aperture_size => {}
                _ => {
                    error!(
                        "plic: {name} window [{base:#x}, +{len:#x}) exceeds aperture {:#x}",
                        self.aperture_size
                    );
                    return Err(AxError::InvalidInput);
                }
            }
        }
        // Every window ends inside the aperture, so `base + len` cannot overflow.
        for (i, &(name, base, len)) in windows.iter().enumerate() {
            for &(other, other_base, other_len) in &windows[i + 1..] {
                if len != 0
                    && other_len != 0
                    && base < other_base + other_len
                    && other_base < base + len
                {
                    error!(
                        "plic: {name} window at {base:#x} overlaps {other} window at {other_base:#x}"
                    );
                    return Err(AxError::InvalidInput);
                }
            }
        }

        Ok(())
    }
}
