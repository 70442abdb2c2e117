use serde::{Deserialize, Serialize};

/// Slices whose longitudinal coordinates differ by less than this are colliding.
pub const OVERLAP_TOLERANCE: f64 = 0.01;

/// Simulation parameters derived from the configuration, used frequently during simulation steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimParams {
    // Bunch shape
    pub slice_count: usize,
    pub particles_per_slice: usize,
    pub slice_spacing: f64, // DZ, also the drift per step
    pub particle_spacing: f64, // DY
    pub y_max: f64, // Half-extent of the initial particle fan
    pub bunch_length: f64,

    // Coupling
    pub kick_coefficient: f64,
    pub overlap_tolerance: f64,

    // Fixed initial placement, reused at every cycle start
    pub electron_start: f64,
    pub positron_start: f64,
    pub electron_offset: f64,
    pub positron_offset: f64,

    // Cycle
    pub gap: f64,
    pub steps_per_collision: u32,
}

impl SimParams {
    /// Particles in one bunch.
    pub fn particles_per_bunch(&self) -> usize {
        self.slice_count * self.particles_per_slice
    }
}
