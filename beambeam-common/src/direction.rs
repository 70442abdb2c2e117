use serde::{Deserialize, Serialize};

/// Longitudinal drift direction of a bunch, fixed for its lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Drifts towards +z.
    Forward,
    /// Drifts towards -z.
    Backward,
}

impl Direction {
    /// +1.0 or -1.0.
    pub fn sign(self) -> f64 {
        match self {
            Direction::Forward => 1.0,
            Direction::Backward => -1.0,
        }
    }
}
