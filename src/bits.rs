//! Round-count arithmetic for the log-round barriers.

/// Ceiling of `log2(n)` for `n >= 1`.
///
/// This is the number of pairwise-exchange rounds needed for full
/// dissemination among `n` participants; the tournament barrier plays one
/// more level on top of it.
#[inline]
#[must_use]
pub(crate) fn log2_ceil(n: usize) -> u32 {
    n.next_power_of_two().trailing_zeros()
}
