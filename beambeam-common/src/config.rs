use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::{SimParams, OVERLAP_TOLERANCE};
use std::path::Path;

// Shape of one bunch, shared by both beams
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct BunchConfig {
    pub slice_count: u32,
    pub particles_per_slice: u32,
    /// Longitudinal distance between adjacent slices (DZ).
    pub slice_spacing: f64,
    /// Initial vertical distance between adjacent particles of a slice (DY).
    pub particle_spacing: f64,
}

// Beam-beam coupling and the fixed initial placement of both bunches
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct CollisionConfig {
    /// Velocity kick per unit of field value (DY_KICK).
    pub kick_coefficient: f64,
    /// Vertical distance between the two bunch centres.
    /// Bunch 1 sits at -separation/2, bunch 2 at +separation/2.
    pub vertical_separation: f64,
    /// Longitudinal coordinate of slice 0 of the bunch drifting towards +z.
    pub electron_start: f64,
    /// Longitudinal coordinate of slice 0 of the bunch drifting towards -z.
    pub positron_start: f64,
    /// Extra steps appended to each cycle so the bunches are seen separating.
    pub margin_steps: u32,
}

// Length of a non-interactive run and reporting cadence
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub num_collisions: u32,
    pub record_interval_steps: u32,
    pub progress_interval_steps: u32,
}

// Configuration for output settings
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct OutputConfig {
    pub base_filename: String,
    pub save_snapshots: bool,
    pub format: Option<String>, // Output format: "json", "bincode", "messagepack"
    pub save_centroids: bool,
}

/// Main simulation configuration structure, loaded from a TOML file.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Default)]
pub struct BeamBeamConfig {
    #[serde(default)]
    pub bunch: BunchConfig,
    #[serde(default)]
    pub collision: CollisionConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for BunchConfig {
    fn default() -> Self {
        BunchConfig {
            slice_count: 50,
            particles_per_slice: 21,
            slice_spacing: 1.0,
            particle_spacing: 0.5,
        }
    }
}

impl Default for CollisionConfig {
    fn default() -> Self {
        // Bunch 1 occupies z = -50..=-1, bunch 2 occupies z = 1..=50.
        CollisionConfig {
            kick_coefficient: 0.0025,
            vertical_separation: 2.0,
            electron_start: -50.0,
            positron_start: 1.0,
            margin_steps: 20,
        }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            num_collisions: 3,
            record_interval_steps: 1,
            progress_interval_steps: 50,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            base_filename: "beam_beam".to_string(),
            save_snapshots: true,
            format: Some("bincode".to_string()),
            save_centroids: true,
        }
    }
}

impl BeamBeamConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        let config: BeamBeamConfig = toml::from_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML from '{}': {}", path_ref.display(), e))?;

        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations the engine cannot be built from.
    pub fn validate(&self) -> Result<()> {
        let bunch = &self.bunch;
        if bunch.slice_count == 0 {
            anyhow::bail!("slice_count must be greater than 0.");
        }
        if bunch.particles_per_slice == 0 {
            anyhow::bail!("particles_per_slice must be greater than 0.");
        }
        if !(bunch.slice_spacing.is_finite() && bunch.slice_spacing > 0.0) {
            anyhow::bail!("slice_spacing must be positive, got {}.", bunch.slice_spacing);
        }
        if !(bunch.particle_spacing.is_finite() && bunch.particle_spacing > 0.0) {
            anyhow::bail!("particle_spacing must be positive, got {}.", bunch.particle_spacing);
        }

        let collision = &self.collision;
        let finite = [
            ("kick_coefficient", collision.kick_coefficient),
            ("vertical_separation", collision.vertical_separation),
            ("electron_start", collision.electron_start),
            ("positron_start", collision.positron_start),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                anyhow::bail!("{} must be a finite number, got {}.", name, value);
            }
        }

        if self.run.num_collisions == 0 {
            anyhow::bail!("num_collisions must be greater than 0.");
        }
        if self.run.record_interval_steps == 0 {
            anyhow::bail!("record_interval_steps must be greater than 0.");
        }

        if self.steps_per_collision() == 0 {
            anyhow::bail!(
                "Derived steps_per_collision is 0 (gap {:.3}, bunch length {:.3}, margin {}).",
                self.gap(),
                self.bunch_length(),
                collision.margin_steps
            );
        }
        Ok(())
    }

    /// Distance from the first to the last slice of a bunch.
    pub fn bunch_length(&self) -> f64 {
        (self.bunch.slice_count.saturating_sub(1)) as f64 * self.bunch.slice_spacing
    }

    /// Initial longitudinal separation between the facing edges of the two bunches.
    pub fn gap(&self) -> f64 {
        self.collision.positron_start - (self.collision.electron_start + self.bunch_length())
    }

    /// Frames in one collision cycle, including the reset frame.
    pub fn steps_per_collision(&self) -> u32 {
        // Relative closing speed is 2 * DZ per step.
        let travel = (self.gap() + 2.0 * self.bunch_length()) / (2.0 * self.bunch.slice_spacing);
        let passes = if travel.is_finite() && travel > 0.0 { travel.floor() as u32 } else { 0 };
        passes.saturating_add(self.collision.margin_steps)
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> Result<SimParams> {
        self.validate()?;

        let slice_spacing = self.bunch.slice_spacing;
        let particle_spacing = self.bunch.particle_spacing;
        let y_max = (self.bunch.particles_per_slice - 1) as f64 * particle_spacing / 2.0;
        let half_separation = self.collision.vertical_separation / 2.0;

        let gap = self.gap();
        if gap < 0.0 {
            log::warn!(
                "Bunches overlap at cycle start (gap {:.3}); interaction begins on the first step.",
                gap
            );
        }

        Ok(SimParams {
            slice_count: self.bunch.slice_count as usize,
            particles_per_slice: self.bunch.particles_per_slice as usize,
            slice_spacing,
            particle_spacing,
            y_max,
            bunch_length: self.bunch_length(),
            kick_coefficient: self.collision.kick_coefficient,
            overlap_tolerance: OVERLAP_TOLERANCE,
            electron_start: self.collision.electron_start,
            positron_start: self.collision.positron_start,
            electron_offset: -half_separation,
            positron_offset: half_separation,
            gap,
            steps_per_collision: self.steps_per_collision(),
        })
    }
}
