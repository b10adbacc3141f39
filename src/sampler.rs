//! Per-event probabilistic sampling.

use rand::Rng;

/// Decide whether an event with the given sample rate should be dropped.
///
/// Rate `<=1` never drops. Otherwise draws a uniform integer in `[0, rate)`
/// and drops iff it is non-zero, giving a drop probability of `1 - 1/rate`.
pub fn should_drop(rate: u32, rng: &mut impl Rng) -> bool {
    if rate <= 1 {
        return false;
    }
    rng.gen_range(0..rate) != 0
}
