use anyhow::Result;
use std::path::Path;
use std::time::Instant;
use log::{info, warn, error, debug};

use beambeam_common::BeamBeamConfig;
use beambeam_engine::export::{save_centroids, save_snapshots, SnapshotFormat};
use beambeam_engine::{CentroidTracker, CollisionCycle, ProgressLogger, SnapshotRecorder};

fn main() -> Result<()> {
    // Initialize the logger
    env_logger::init();

    info!("Starting Beam-Beam Simulation Engine...");

    // --- Load Configuration ---
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "config.toml".to_string());
    let config = if Path::new(&config_path).exists() {
        BeamBeamConfig::load(&config_path)?
    } else {
        warn!("Config file '{}' not found. Using the reference scenario.", config_path);
        BeamBeamConfig::default()
    };

    // --- Initialize Simulation ---
    let mut sim = CollisionCycle::new(&config)?;
    let params = sim.params().clone();
    debug!("Simulation Parameters: {:#?}", params);

    info!("Particles per bunch: {}", params.particles_per_bunch());
    info!("Bunch length: {}", params.bunch_length);
    info!("Steps per collision: {}", params.steps_per_collision);
    info!("Kick coefficient: {}", params.kick_coefficient);
    info!("Vertical separation: {}", config.collision.vertical_separation);
    info!("Number of collisions: {}", config.run.num_collisions);

    // --- Simulation Loop ---
    let total_frames = params.steps_per_collision as u64 * config.run.num_collisions as u64;
    info!("Recording snapshot every {} frames.", config.run.record_interval_steps);
    info!("Starting simulation loop for {} frames...", total_frames);

    let mut observers = (
        SnapshotRecorder::new(config.run.record_interval_steps),
        CentroidTracker::new(),
        ProgressLogger::new(config.run.progress_interval_steps, total_frames),
    );

    let start_time = Instant::now();
    let summary = sim.run(total_frames, &mut observers);
    let total_duration = start_time.elapsed();

    info!(
        "Simulation finished in {:.3} seconds: {} frames, {} collisions, {} overlapping slice pairs.",
        total_duration.as_secs_f64(),
        summary.frames,
        summary.cycles_completed,
        summary.overlap_events
    );
    if summary.observer_failures > 0 {
        warn!("{} observer calls failed during the run.", summary.observer_failures);
    }

    // --- Save Recorded Data ---
    let (recorder, tracker, _) = observers;
    let base_filename = &config.output.base_filename;

    if config.output.save_snapshots {
        let format = SnapshotFormat::from_name(config.output.format.as_deref().unwrap_or("bincode"));
        if let Err(e) = save_snapshots(recorder.snapshots(), base_filename, format) {
            error!("Failed to save snapshots: {:#}", e);
        }
    } else {
        info!("Skipping saving snapshots as per config (save_snapshots is false).");
    }

    if config.output.save_centroids {
        if let Err(e) = save_centroids(tracker.history(), base_filename) {
            error!("Failed to save centroid history: {:#}", e);
        }
    } else {
        info!("Skipping saving centroid history as per config.");
    }

    info!("Simulation Complete.");
    Ok(())
}
