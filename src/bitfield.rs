//! Word-granular atomic bitmaps.
//!
//! Pending, claimed and enable state are shared by every source producer and
//! every hart. Each single-bit update is a compare-and-swap loop over the
//! containing 32-bit word, so two sources that share a word never lose each
//! other's update. There is no lock above the word level.

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;
use core::sync::atomic::{AtomicU32, Ordering};

use crate::utils::word_and_mask;

/// A fixed-size bitmap stored as an array of [`AtomicU32`] words.
pub struct AtomicBitfield {
    words: Box<[AtomicU32]>,
}

impl AtomicBitfield {
    /// Creates a bitfield of `words` zeroed 32-bit words.
    pub fn new(words: usize) -> Self {
        Self {
            words: (0..words).map(|_| AtomicU32::new(0)).collect(),
        }
    }

    /// Number of 32-bit words.
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Reads word `index`, or 0 when out of range.
    #[inline]
    pub fn word(&self, index: usize) -> u32 {
        self.words
            .get(index)
            .map_or(0, |w| w.load(Ordering::Acquire))
    }

    /// Overwrites word `index`. Returns `false` when out of range.
    pub fn set_word(&self, index: usize, value: u32) -> bool {
        match self.words.get(index) {
            Some(w) => {
                w.store(value, Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Reads bit `bit`.
    pub fn get(&self, bit: usize) -> bool {
        let (index, mask) = word_and_mask(bit);
        self.word(index) & mask != 0
    }

    /// Sets or clears bit `bit` and returns its previous value.
    ///
    /// The containing word is updated with a compare-and-swap retry loop;
    /// concurrent updates to other bits of the same word are preserved.
    /// Out-of-range bits are ignored and read back as `false`.
    pub fn set(&self, bit: usize, value: bool) -> bool {
        let (index, mask) = word_and_mask(bit);
        let Some(cell) = self.words.get(index) else {
            return false;
        };
        let mut old = cell.load(Ordering::Acquire);
        loop {
            let new = if value { old | mask } else { old & !mask };
            match cell.compare_exchange_weak(old, new, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return old & mask != 0,
                Err(current) => old = current,
            }
        }
    }

    /// Copies every word out.
    pub fn to_vec(&self) -> Vec<u32> {
        self.words
            .iter()
            .map(|w| w.load(Ordering::Acquire))
            .collect()
    }

    /// Formats words `[start, start + len)` as hex, most significant word first.
    pub fn hex(&self, start: usize, len: usize) -> HexWords<'_> {
        HexWords {
            field: self,
            start,
            len,
        }
    }
}

impl fmt::Debug for AtomicBitfield {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AtomicBitfield({})", self.hex(0, self.len()))
    }
}

/// Hex rendering of a word range of an [`AtomicBitfield`].
pub struct HexWords<'a> {
    field: &'a AtomicBitfield,
    start: usize,
    len: usize,
}

impl fmt::Display for HexWords<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for i in (self.start..self.start + self.len).rev() {
            write!(f, "{:08x}", self.field.word(i))?;
        }
        Ok(())
    }
}
