//! Interrupt arbitration.
//!
//! A source moves Idle -> Pending (line raised) -> Claimed (read of a
//! context's claim register) -> Idle (completion). A source raised again while
//! claimed keeps its pending bit and is handed out again once completed.
//!
//! Source `s` is owed to context `c` iff
//! `pending[s] && !claimed[s] && enabled[c][s] && priority[s] > threshold[c]`.
//!
//! Selection scans sources in ascending id order and takes the first one whose
//! priority exceeds the context's threshold. This is not a highest-priority
//! pick: with two eligible sources, the lower id wins regardless of which has
//! the higher priority.
//!
//! Each bit update is atomic on its own; a claim's scan and its pending/claimed
//! updates are not one transaction.

use alloc::boxed::Box;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::bitfield::AtomicBitfield;

/// Shared arbitration state for all sources and contexts.
pub struct Arbiter {
    num_sources: usize,
    num_priorities: u32,
    words: usize,
    priority: Box<[AtomicU32]>,
    threshold: Box<[AtomicU32]>,
    pending: AtomicBitfield,
    claimed: AtomicBitfield,
    /// `num_contexts * words` words, one run of `words` per context.
    enable: AtomicBitfield,
}

impl Arbiter {
    pub fn new(num_sources: usize, num_priorities: u32, num_contexts: usize) -> Self {
        let words = crate::utils::bitfield_words(num_sources);
        Self {
            num_sources,
            num_priorities,
            words,
            priority: (0..num_sources).map(|_| AtomicU32::new(0)).collect(),
            threshold: (0..num_contexts).map(|_| AtomicU32::new(0)).collect(),
            pending: AtomicBitfield::new(words),
            claimed: AtomicBitfield::new(words),
            enable: AtomicBitfield::new(num_contexts * words),
        }
    }

    pub fn num_sources(&self) -> usize {
        self.num_sources
    }

    pub fn num_priorities(&self) -> u32 {
        self.num_priorities
    }

    pub fn num_contexts(&self) -> usize {
        self.threshold.len()
    }

    /// Words per bitmap.
    pub fn bitfield_words(&self) -> usize {
        self.words
    }

    /// Sets or clears the pending bit of `source`.
    pub fn set_pending(&self, source: usize, pending: bool) {
        self.pending.set(source, pending);
    }

    /// Sets or clears the claimed bit of `source`.
    pub fn set_claimed(&self, source: usize, claimed: bool) {
        self.claimed.set(source, claimed);
    }

    pub fn is_pending(&self, source: usize) -> bool {
        self.pending.get(source)
    }

    pub fn is_claimed(&self, source: usize) -> bool {
        self.claimed.get(source)
    }

    pub fn pending_word(&self, word: usize) -> u32 {
        self.pending.word(word)
    }

    pub fn claimed_word(&self, word: usize) -> u32 {
        self.claimed.word(word)
    }

    pub fn priority(&self, source: usize) -> u32 {
        self.priority
            .get(source)
            .map_or(0, |p| p.load(Ordering::Acquire))
    }

    /// Stores `value` as the priority of `source`.
    ///
    /// Returns `false`, leaving the priority untouched, when `value` exceeds
    /// `num_priorities` or `source` is out of range.
    pub fn set_priority(&self, source: usize, value: u32) -> bool {
        match self.priority.get(source) {
            Some(p) if value <= self.num_priorities => {
                p.store(value, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    pub fn threshold(&self, context: usize) -> u32 {
        self.threshold
            .get(context)
            .map_or(0, |t| t.load(Ordering::Acquire))
    }

    /// Stores `value` as the threshold of `context`.
    ///
    /// Returns `false`, leaving the threshold untouched, when `value` exceeds
    /// `num_priorities` or `context` is out of range.
    pub fn set_threshold(&self, context: usize, value: u32) -> bool {
        match self.threshold.get(context) {
            Some(t) if value <= self.num_priorities => {
                t.store(value, Ordering::Release);
                true
            }
            _ => false,
        }
    }

    pub fn enable_word(&self, context: usize, word: usize) -> u32 {
        if context >= self.num_contexts() || word >= self.words {
            return 0;
        }
        self.enable.word(context * self.words + word)
    }

    /// Overwrites one enable word of `context`. Out-of-range targets are ignored.
    pub fn set_enable_word(&self, context: usize, word: usize, value: u32) -> bool {
        if context >= self.num_contexts() || word >= self.words {
            return false;
        }
        self.enable.set_word(context * self.words + word, value)
    }

    pub fn is_enabled(&self, context: usize, source: usize) -> bool {
        context < self.num_contexts()
            && source < self.num_sources
            && self.enable.get(context * self.words * 32 + source)
    }

    /// Enables or disables a single source for `context`.
    pub fn set_enabled(&self, context: usize, source: usize, enabled: bool) -> bool {
        if context >= self.num_contexts() || source >= self.num_sources {
            return false;
        }
        self.enable.set(context * self.words * 32 + source, enabled);
        true
    }

    /// First source owed to `context`, in ascending id order.
    fn first_eligible(&self, context: usize) -> Option<usize> {
        if context >= self.num_contexts() {
            return None;
        }
        let threshold = self.threshold(context);
        for i in 0..self.words {
            let mut candidates =
                self.pending.word(i) & !self.claimed.word(i) & self.enable_word(context, i);
            while candidates != 0 {
                let bit = candidates.trailing_zeros() as usize;
                let source = (i << 5) + bit;
                if self.priority(source) > threshold {
                    return Some(source);
                }
                candidates &= candidates - 1;
            }
        }
        None
    }

    /// Whether any source is currently owed to `context`.
    pub fn has_pending_interrupt(&self, context: usize) -> bool {
        self.first_eligible(context).is_some()
    }

    /// Hands the first eligible source to `context`, moving it from pending to
    /// claimed. Returns 0 when nothing is owed.
    pub fn claim(&self, context: usize) -> u32 {
        match self.first_eligible(context) {
            Some(source) => {
                self.set_pending(source, false);
                self.set_claimed(source, true);
                source as u32
            }
            None => 0,
        }
    }

    /// Clears the claimed bit of `source`. Out-of-range ids are ignored and
    /// return `false`.
    pub fn complete(&self, _context: usize, source: usize) -> bool {
        if source >= self.num_sources {
            return false;
        }
        self.set_claimed(source, false);
        true
    }

    pub(crate) fn pending(&self) -> &AtomicBitfield {
        &self.pending
    }

    pub(crate) fn claimed(&self) -> &AtomicBitfield {
        &self.claimed
    }

    pub(crate) fn enable(&self) -> &AtomicBitfield {
        &self.enable
    }

    pub(crate) fn priorities(&self) -> &[AtomicU32] {
        &self.priority
    }

    pub(crate) fn thresholds(&self) -> &[AtomicU32] {
        &self.threshold
    }
}
