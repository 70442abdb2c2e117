pub mod config;
pub mod direction;
pub mod sim_params;
pub mod snapshot;

// Re-export key types for easier use by dependent crates
pub use config::{BeamBeamConfig, BunchConfig, CollisionConfig, RunConfig, OutputConfig};
pub use direction::Direction;
pub use sim_params::{SimParams, OVERLAP_TOLERANCE};
pub use snapshot::{BunchSnapshot, CentroidSample, Snapshot, load_snapshots};
