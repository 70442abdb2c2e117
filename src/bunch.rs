use beambeam_common::{BunchSnapshot, Direction, SimParams};

/// Particle state of one bunch, stored slice-major in flat vectors.
///
/// Every particle of a slice shares one longitudinal coordinate, so that
/// coordinate is held once per slice. Vertical position and velocity are
/// held per particle at index `slice * particles_per_slice + particle`.
#[derive(Debug, Clone, PartialEq)]
pub struct Bunch {
    direction: Direction,
    slice_count: usize,
    particles_per_slice: usize,
    slice_spacing: f64,

    slice_z: Vec<f64>,
    vertical: Vec<f64>,
    vertical_velocity: Vec<f64>,
}

impl Bunch {
    /// Builds a bunch with slice 0 at `start_longitudinal`, slices `DZ` apart,
    /// and each slice's particles fanned evenly about `vertical_offset`.
    /// All velocities start at zero.
    pub fn new(params: &SimParams, start_longitudinal: f64, direction: Direction, vertical_offset: f64) -> Self {
        assert!(params.slice_count > 0, "bunch needs at least one slice");
        assert!(params.particles_per_slice > 0, "bunch needs at least one particle per slice");
        assert!(params.slice_spacing > 0.0, "slice spacing must be positive");

        let slice_count = params.slice_count;
        let particles_per_slice = params.particles_per_slice;

        let slice_z: Vec<f64> = (0..slice_count)
            .map(|i| start_longitudinal + i as f64 * params.slice_spacing)
            .collect();

        // Same fan for every slice.
        let fan: Vec<f64> = (0..particles_per_slice)
            .map(|j| -params.y_max + j as f64 * params.particle_spacing + vertical_offset)
            .collect();
        let mut vertical = Vec::with_capacity(slice_count * particles_per_slice);
        for _ in 0..slice_count {
            vertical.extend_from_slice(&fan);
        }

        Self {
            direction,
            slice_count,
            particles_per_slice,
            slice_spacing: params.slice_spacing,
            slice_z,
            vertical_velocity: vec![0.0; vertical.len()],
            vertical,
        }
    }

    /// Moves every slice one spacing along the drift direction.
    pub fn drift(&mut self) {
        let dz = self.direction.sign() * self.slice_spacing;
        self.slice_z.iter_mut().for_each(|z| *z += dz);
    }

    /// Advances vertical positions by one step of the current velocities.
    pub fn integrate_vertical(&mut self) {
        self.vertical
            .iter_mut()
            .zip(&self.vertical_velocity)
            .for_each(|(y, vy)| *y += vy);
    }

    pub fn slice_longitudinal(&self, index: usize) -> f64 {
        self.check_slice(index);
        self.slice_z[index]
    }

    /// Vertical positions of one slice, ordered by particle index.
    pub fn slice_vertical_positions(&self, index: usize) -> &[f64] {
        &self.vertical[self.slice_range(index)]
    }

    pub fn slice_vertical_velocities(&self, index: usize) -> &[f64] {
        &self.vertical_velocity[self.slice_range(index)]
    }

    /// Adds one velocity increment per particle of the given slice.
    pub fn apply_kick(&mut self, index: usize, kicks: &[f64]) {
        assert_eq!(
            kicks.len(),
            self.particles_per_slice,
            "kick vector length must equal particles_per_slice"
        );
        let range = self.slice_range(index);
        self.vertical_velocity[range]
            .iter_mut()
            .zip(kicks)
            .for_each(|(vy, k)| *vy += k);
    }

    /// Longitudinal coordinate of one particle.
    pub fn longitudinal(&self, slice: usize, particle: usize) -> f64 {
        assert!(particle < self.particles_per_slice, "particle index {} out of range", particle);
        self.slice_longitudinal(slice)
    }

    /// Longitudinal coordinate of every particle, slice-major.
    pub fn longitudinal_positions(&self) -> Vec<f64> {
        self.slice_z
            .iter()
            .flat_map(|&z| std::iter::repeat(z).take(self.particles_per_slice))
            .collect()
    }

    pub fn slice_positions(&self) -> &[f64] {
        &self.slice_z
    }

    pub fn vertical_positions(&self) -> &[f64] {
        &self.vertical
    }

    pub fn vertical_velocities(&self) -> &[f64] {
        &self.vertical_velocity
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn slice_count(&self) -> usize {
        self.slice_count
    }

    pub fn particles_per_slice(&self) -> usize {
        self.particles_per_slice
    }

    /// Mean vertical position of the whole bunch.
    pub fn centroid(&self) -> f64 {
        self.vertical.iter().sum::<f64>() / self.vertical.len() as f64
    }

    pub fn snapshot(&self) -> BunchSnapshot {
        BunchSnapshot::from(self)
    }

    fn check_slice(&self, index: usize) {
        assert!(
            index < self.slice_count,
            "slice index {} out of range for {} slices",
            index,
            self.slice_count
        );
    }

    fn slice_range(&self, index: usize) -> std::ops::Range<usize> {
        self.check_slice(index);
        let start = index * self.particles_per_slice;
        start..start + self.particles_per_slice
    }
}

impl From<&Bunch> for BunchSnapshot {
    fn from(bunch: &Bunch) -> Self {
        BunchSnapshot {
            direction: bunch.direction,
            slice_count: bunch.slice_count,
            particles_per_slice: bunch.particles_per_slice,
            slice_longitudinal: bunch.slice_z.clone(),
            vertical: bunch.vertical.clone(),
            vertical_velocity: bunch.vertical_velocity.clone(),
        }
    }
}
