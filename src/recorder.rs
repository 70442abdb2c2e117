use crate::simulation::{CollisionCycle, StepObserver};
use beambeam_common::{CentroidSample, Snapshot};
use anyhow::Result;
use log::{info, trace};
use std::time::Instant;

/// Collects full snapshots at a fixed frame interval.
#[derive(Debug)]
pub struct SnapshotRecorder {
    interval: u64,
    seen: u64,
    snapshots: Vec<Snapshot>,
}

impl SnapshotRecorder {
    /// `interval` of 0 is treated as 1.
    pub fn new(interval: u32) -> Self {
        Self {
            interval: interval.max(1) as u64,
            seen: 0,
            snapshots: Vec::new(),
        }
    }

    pub fn snapshots(&self) -> &[Snapshot] {
        &self.snapshots
    }

    pub fn into_snapshots(self) -> Vec<Snapshot> {
        self.snapshots
    }
}

impl StepObserver for SnapshotRecorder {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
        // The first frame observed is always kept.
        if self.seen % self.interval == 0 {
            self.snapshots.push(sim.snapshot());
        }
        self.seen += 1;
        Ok(())
    }
}

/// Tracks the vertical centroid of both bunches every frame.
#[derive(Debug, Default)]
pub struct CentroidTracker {
    history: Vec<CentroidSample>,
}

impl CentroidTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> &[CentroidSample] {
        &self.history
    }

    /// Samples belonging to one collision cycle.
    pub fn collision(&self, collision: u64) -> impl Iterator<Item = &CentroidSample> + '_ {
        self.history.iter().filter(move |s| s.collision == collision)
    }
}

impl StepObserver for CentroidTracker {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
        self.history.push(CentroidSample {
            collision: sim.collision_number(),
            step: sim.step_in_cycle(),
            electron_centroid: sim.electrons().centroid(),
            positron_centroid: sim.positrons().centroid(),
        });
        Ok(())
    }
}

/// Logs run progress every `interval` frames.
#[derive(Debug)]
pub struct ProgressLogger {
    interval: u64,
    total_frames: u64,
    started: Instant,
}

impl ProgressLogger {
    pub fn new(interval: u32, total_frames: u64) -> Self {
        Self {
            interval: interval.max(1) as u64,
            total_frames,
            started: Instant::now(),
        }
    }
}

impl StepObserver for ProgressLogger {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
        let done = sim.frames_done();
        if done % self.interval == 0 || done == self.total_frames {
            let percent = if self.total_frames > 0 { 100.0 * done as f64 / self.total_frames as f64 } else { 100.0 };
            info!(
                "Frame [{}/{}] ({:.1}%) | Collision #{} step {}/{} | Centroids: {:+.4} / {:+.4} | Elapsed: {:.2} s",
                done,
                self.total_frames,
                percent,
                sim.collision_number(),
                sim.step_in_cycle(),
                sim.steps_per_collision(),
                sim.electrons().centroid(),
                sim.positrons().centroid(),
                self.started.elapsed().as_secs_f64()
            );
        } else {
            trace!("Frame [{}/{}] completed", done, self.total_frames);
        }
        Ok(())
    }
}
