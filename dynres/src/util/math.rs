//! Math utilites.

/// Rounds up `src` to the power of two `factor`.
pub fn round_up_pot(src: u64, factor: u64) -> u64 {
    debug_assert_eq!(factor.count_ones(), 1); // .is_power_of_two()
    let minus1 = factor - 1;
    (src + minus1) & !minus1
}

/// Power of two closest to `src`. Ties resolve towards the larger one.
pub fn nearest_pot(src: u32) -> u32 {
    if src <= 1 {
        return 1;
    }
    let above = src.next_power_of_two();
    let below = above >> 1;
    if src - below < above - src {
        below
    } else {
        above
    }
}

/// Nearest power of two, clamped to the inclusive bounds `[min, max]`. Bounds
/// that are not powers of two themselves are snapped to their nearest one, and
/// an inverted pair collapses to the snapped minimum.
pub fn nearest_pot_clamped(src: u32, min: u32, max: u32) -> u32 {
    let min = nearest_pot(min);
    let max = nearest_pot(max).max(min);
    nearest_pot(src).clamp(min, max)
}
