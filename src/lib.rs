//! Two-bunch beam-beam collision engine.
//!
//! Two counter-propagating bunches, each cut into longitudinal slices, drift
//! through each other. Whenever two slices coincide they exchange vertical
//! velocity kicks, and the bunches are rebuilt from scratch at the start of
//! every collision cycle.

pub mod bunch;
pub mod export;
pub mod field;
pub mod interaction;
pub mod recorder;
pub mod simulation;

pub use bunch::Bunch;
pub use interaction::{InteractionReport, InteractionStage};
pub use beambeam_common::CentroidSample;
pub use recorder::{CentroidTracker, ProgressLogger, SnapshotRecorder};
pub use simulation::{CollisionCycle, RunSummary, StepObserver};
