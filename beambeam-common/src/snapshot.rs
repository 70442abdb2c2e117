use serde::{Serialize, Deserialize};
use anyhow::{Context, Result};
use crate::direction::Direction;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

/// The observable state of one bunch at a frame boundary.
///
/// Per-particle arrays are slice-major: particle `p` of slice `s` lives at
/// index `s * particles_per_slice + p`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BunchSnapshot {
    pub direction: Direction,
    pub slice_count: usize,
    pub particles_per_slice: usize,
    /// Longitudinal coordinate shared by every particle of each slice.
    pub slice_longitudinal: Vec<f64>,
    pub vertical: Vec<f64>,
    pub vertical_velocity: Vec<f64>,
}

/// A snapshot of both bunches after one frame of the collision cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Global frame index since the engine was created.
    pub frame: u64,
    /// 1-based number of the collision cycle this frame belongs to.
    pub collision: u64,
    /// Position within the cycle; 0 is the reset frame.
    pub step_in_cycle: u32,
    pub steps_per_collision: u32,
    /// Slice pairs that exchanged kicks during this frame.
    pub overlapping_pairs: u32,
    pub kick_coefficient: f64,
    /// Initial vertical distance between the two bunch centres.
    pub vertical_separation: f64,
    pub electrons: BunchSnapshot,
    pub positrons: BunchSnapshot,
}

/// Vertical centroids of both bunches at one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CentroidSample {
    pub collision: u64,
    pub step: u32,
    pub electron_centroid: f64,
    pub positron_centroid: f64,
}

impl From<&Snapshot> for CentroidSample {
    fn from(snapshot: &Snapshot) -> Self {
        Self {
            collision: snapshot.collision,
            step: snapshot.step_in_cycle,
            electron_centroid: snapshot.electrons.centroid(),
            positron_centroid: snapshot.positrons.centroid(),
        }
    }
}

impl BunchSnapshot {
    /// Mean vertical position over all particles.
    pub fn centroid(&self) -> f64 {
        if self.vertical.is_empty() {
            return 0.0;
        }
        self.vertical.iter().sum::<f64>() / self.vertical.len() as f64
    }

    /// Root-mean-square vertical size about the centroid.
    pub fn rms_size(&self) -> f64 {
        if self.vertical.is_empty() {
            return 0.0;
        }
        let c = self.centroid();
        let var = self.vertical.iter().map(|y| (y - c) * (y - c)).sum::<f64>() / self.vertical.len() as f64;
        var.sqrt()
    }

    /// `(z, y)` for every particle, slice-major.
    pub fn points(&self) -> Vec<(f64, f64)> {
        let p = self.particles_per_slice;
        self.vertical
            .iter()
            .enumerate()
            .map(|(idx, &y)| (self.slice_longitudinal[idx / p], y))
            .collect()
    }

    /// `(y, vy)` pairs of the particles in one slice.
    /// Returns an empty vector for an out-of-range slice.
    pub fn phase_space(&self, slice: usize) -> Vec<(f64, f64)> {
        if slice >= self.slice_count {
            return Vec::new();
        }
        let start = slice * self.particles_per_slice;
        let end = start + self.particles_per_slice;
        self.vertical[start..end]
            .iter()
            .copied()
            .zip(self.vertical_velocity[start..end].iter().copied())
            .collect()
    }

    /// Counts vertical positions in `bins` equal-width bins over `[lo, hi]`.
    /// The last bin is closed on the right; values outside the range are dropped.
    pub fn vertical_histogram(&self, bins: usize, lo: f64, hi: f64) -> Vec<u32> {
        let mut counts = vec![0u32; bins];
        if bins == 0 || !(hi > lo) {
            return counts;
        }
        let width = (hi - lo) / bins as f64;
        for &y in &self.vertical {
            if !(y >= lo && y <= hi) {
                continue;
            }
            let idx = (((y - lo) / width).floor() as usize).min(bins - 1);
            counts[idx] += 1;
        }
        counts
    }
}

/// Loads a snapshot sequence written by the engine.
/// The decoder is chosen from the file extension (`.json`, `.msgpack`, anything else as bincode).
pub fn load_snapshots<P: AsRef<Path>>(path: P) -> Result<Vec<Snapshot>> {
    let path_ref = path.as_ref();
    let file = File::open(path_ref)
        .with_context(|| format!("Failed to open snapshot file '{}'", path_ref.display()))?;
    let reader = BufReader::new(file);

    let extension = path_ref.extension().and_then(|e| e.to_str()).unwrap_or("");
    let snapshots: Vec<Snapshot> = match extension {
        "json" => serde_json::from_reader(reader)
            .with_context(|| format!("Failed to decode JSON snapshots from '{}'", path_ref.display()))?,
        "msgpack" => rmp_serde::decode::from_read(reader)
            .with_context(|| format!("Failed to decode MessagePack snapshots from '{}'", path_ref.display()))?,
        _ => bincode::deserialize_from(reader)
            .with_context(|| format!("Failed to decode bincode snapshots from '{}'", path_ref.display()))?,
    };
    log::debug!("Loaded {} snapshots from {}", snapshots.len(), path_ref.display());
    Ok(snapshots)
}
