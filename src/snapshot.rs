use alloc::vec::Vec;
use core::sync::atomic::Ordering;

use axerrno::{ax_err, AxResult};

use crate::arbiter::Arbiter;

/// Arbitration state needed to resume a controller of the same shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlicSnapshot {
    /// One entry per source.
    pub priorities: Vec<u32>,
    pub pending: Vec<u32>,
    pub claimed: Vec<u32>,
    /// `bitfield_words` entries per context, contexts in address order.
    pub enable: Vec<u32>,
    /// One entry per context.
    pub thresholds: Vec<u32>,
}

impl PlicSnapshot {
    pub(crate) fn capture(arbiter: &Arbiter) -> Self {
        Self {
            priorities: arbiter
                .priorities()
                .iter()
                .map(|p| p.load(Ordering::Acquire))
                .collect(),
            pending: arbiter.pending().to_vec(),
            claimed: arbiter.claimed().to_vec(),
            enable: arbiter.enable().to_vec(),
            thresholds: arbiter
                .thresholds()
                .iter()
                .map(|t| t.load(Ordering::Acquire))
                .collect(),
        }
    }

    /// Writes this snapshot into `arbiter`. Nothing is written on a shape mismatch.
    pub(crate) fn apply(&self, arbiter: &Arbiter) -> AxResult {
        let words = arbiter.bitfield_words();
        if self.priorities.len() != arbiter.num_sources()
            || self.pending.len() != words
            || self.claimed.len() != words
            || self.enable.len() != words * arbiter.num_contexts()
            || self.thresholds.len() != arbiter.num_contexts()
        {
            return ax_err!(InvalidInput, "plic: snapshot shape does not match controller");
        }
        let max = arbiter.num_priorities();
        if self.priorities.iter().chain(&self.thresholds).any(|&p| p > max) {
            return ax_err!(InvalidInput, "plic: snapshot priority exceeds num_priorities");
        }

        for (cell, &value) in arbiter.priorities().iter().zip(&self.priorities) {
            cell.store(value, Ordering::Release);
        }
        for (cell, &value) in arbiter.thresholds().iter().zip(&self.thresholds) {
            cell.store(value, Ordering::Release);
        }
        for (i, &value) in self.pending.iter().enumerate() {
            arbiter.pending().set_word(i, value);
        }
        for (i, &value) in self.claimed.iter().enumerate() {
            arbiter.claimed().set_word(i, value);
        }
        for (i, &value) in self.enable.iter().enumerate() {
            arbiter.enable().set_word(i, value);
        }
        Ok(())
    }
}
