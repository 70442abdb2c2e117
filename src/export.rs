use beambeam_common::{CentroidSample, Snapshot};
use anyhow::{Context, Result};
use log::{error, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Snapshot file encodings understood by the engine and the visualizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotFormat {
    Json,
    Bincode,
    MessagePack,
}

impl SnapshotFormat {
    /// Parses a format name, falling back to JSON for anything unknown.
    pub fn from_name(name: &str) -> Self {
        match name {
            "json" => SnapshotFormat::Json,
            "bincode" => SnapshotFormat::Bincode,
            "messagepack" => SnapshotFormat::MessagePack,
            other => {
                error!("Unknown output format: {}. Using JSON instead.", other);
                SnapshotFormat::Json
            }
        }
    }

    pub fn extension(self) -> &'static str {
        match self {
            SnapshotFormat::Json => "json",
            SnapshotFormat::Bincode => "bin",
            SnapshotFormat::MessagePack => "msgpack",
        }
    }
}

/// Writes all snapshots to `<base>_snapshots.<ext>` and returns the path written.
pub fn save_snapshots(snapshots: &[Snapshot], base_filename: &str, format: SnapshotFormat) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_snapshots.{}", base_filename, format.extension()));
    let file = File::create(&path)
        .with_context(|| format!("Error creating snapshot file '{}'", path.display()))?;
    let mut writer = BufWriter::new(file);

    match format {
        SnapshotFormat::Json => {
            serde_json::to_writer(&mut writer, snapshots)
                .context("Error serializing snapshots to JSON")?;
        }
        SnapshotFormat::Bincode => {
            bincode::serialize_into(&mut writer, snapshots)
                .context("Error serializing snapshots to bincode")?;
        }
        SnapshotFormat::MessagePack => {
            rmp_serde::encode::write(&mut writer, snapshots)
                .context("Error serializing snapshots to MessagePack")?;
        }
    }
    writer.flush()
        .with_context(|| format!("Error writing snapshot file '{}'", path.display()))?;

    info!("{} snapshots saved to {} ({:?} format)", snapshots.len(), path.display(), format);
    Ok(path)
}

/// Writes the centroid history to `<base>_centroids.csv` and returns the path written.
pub fn save_centroids(history: &[CentroidSample], base_filename: &str) -> Result<PathBuf> {
    let path = PathBuf::from(format!("{}_centroids.csv", base_filename));
    let mut writer = csv::Writer::from_path(&path)
        .with_context(|| format!("Error creating CSV file '{}'", path.display()))?;

    writer.write_record(["collision", "step", "electron_centroid", "positron_centroid"])?;
    for sample in history {
        writer.write_record(&[
            sample.collision.to_string(),
            sample.step.to_string(),
            format!("{:.6}", sample.electron_centroid),
            format!("{:.6}", sample.positron_centroid),
        ])?;
    }
    writer.flush()?;

    info!("Centroid history ({} rows) saved to {}", history.len(), path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::{CentroidTracker, SnapshotRecorder};
    use crate::simulation::CollisionCycle;
    use beambeam_common::{load_snapshots, BeamBeamConfig};
    use tempfile::TempDir;

    fn recorded_run() -> (Vec<Snapshot>, Vec<CentroidSample>) {
        let mut config = BeamBeamConfig::default();
        config.bunch.slice_count = 6;
        config.bunch.particles_per_slice = 5;
        config.collision.electron_start = -6.0;
        let mut sim = CollisionCycle::new(&config).unwrap();
        let mut observers = (SnapshotRecorder::new(2), CentroidTracker::new());
        sim.run(12, &mut observers);
        let (recorder, tracker) = observers;
        (recorder.into_snapshots(), tracker.history().to_vec())
    }

    #[test]
    fn format_names() {
        assert_eq!(SnapshotFormat::from_name("bincode"), SnapshotFormat::Bincode);
        assert_eq!(SnapshotFormat::from_name("messagepack").extension(), "msgpack");
        assert_eq!(SnapshotFormat::from_name("yaml"), SnapshotFormat::Json);
    }

    #[test]
    fn saved_snapshots_load_back_in_every_format() {
        let (snapshots, _) = recorded_run();
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("run");
        let base = base.to_str().unwrap();

        for format in [SnapshotFormat::Bincode, SnapshotFormat::MessagePack] {
            let path = save_snapshots(&snapshots, base, format).unwrap();
            assert_eq!(load_snapshots(&path).unwrap(), snapshots);
        }

        let path = save_snapshots(&snapshots, base, SnapshotFormat::Json).unwrap();
        let loaded = load_snapshots(&path).unwrap();
        assert_eq!(loaded.len(), snapshots.len());
        assert_eq!(loaded[3].frame, snapshots[3].frame);
    }

    #[test]
    fn centroid_csv_has_one_row_per_frame() {
        let (_, history) = recorded_run();
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("run");
        let path = save_centroids(&history, base.to_str().unwrap()).unwrap();

        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "collision");
        assert_eq!(&headers[3], "positron_centroid");
        let rows: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>().unwrap();
        assert_eq!(rows.len(), 12);
        assert_eq!(&rows[0][2], "-1.000000");
    }

    #[test]
    fn unwritable_destination_is_an_error() {
        let (snapshots, history) = recorded_run();
        assert!(save_snapshots(&snapshots, "/no/such/dir/run", SnapshotFormat::Bincode).is_err());
        assert!(save_centroids(&history, "/no/such/dir/run").is_err());
    }
}
