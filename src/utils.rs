/// Number of 32-bit words needed to hold one bit per source.
pub(crate) const fn bitfield_words(num_sources: usize) -> usize {
    (num_sources + 31) >> 5
}

/// Splits a source id into its bitfield word index and the bit mask within that word.
#[inline]
pub(crate) const fn word_and_mask(source: usize) -> (usize, u32) {
    (source >> 5, 1 << (source & 31))
}

/// Returns `log2(stride)` when `stride` is a non-zero power of two.
pub(crate) const fn stride_shift(stride: usize) -> Option<u32> {
    if stride.is_power_of_two() {
        Some(stride.trailing_zeros())
    } else {
        None
    }
}
