//! Space-charge proxy used for beam-beam kicks.
//!
//! The field seen at height `y` is the number of opposing particles strictly
//! above `y` minus the number strictly below it. It is bounded by the size of
//! the opposing slice and changes sign as `y` crosses the opposing
//! distribution, which gives the qualitative pinch without a field solve.

/// Signed particle-count imbalance of `opposing` around `y`.
/// Particles exactly at `y` count on neither side.
#[inline]
pub fn field_value(y: f64, opposing: &[f64]) -> i64 {
    opposing.iter().fold(0i64, |acc, &other| {
        if other > y {
            acc + 1
        } else if other < y {
            acc - 1
        } else {
            acc
        }
    })
}

/// Velocity kick for a particle at `y`.
#[inline]
pub fn kick(y: f64, opposing: &[f64], kick_coefficient: f64) -> f64 {
    kick_coefficient * field_value(y, opposing) as f64
}

/// Kick for every particle of `targets`, in particle order.
pub fn slice_kicks(targets: &[f64], opposing: &[f64], kick_coefficient: f64) -> Vec<f64> {
    targets
        .iter()
        .map(|&y| kick(y, opposing, kick_coefficient))
        .collect()
}
