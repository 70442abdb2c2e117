use crate::bunch::Bunch;
use crate::interaction::{InteractionReport, InteractionStage};
use beambeam_common::{BeamBeamConfig, Direction, SimParams, Snapshot};
use anyhow::Result;
use log::{debug, error, trace};

/// Something that watches the engine between frames.
///
/// Observers only ever see the engine through a shared reference, after a
/// frame has completed and before the next one starts.
pub trait StepObserver {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()>;
}

impl<T: StepObserver + ?Sized> StepObserver for &mut T {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
        (**self).on_step(sim)
    }
}

impl StepObserver for () {
    fn on_step(&mut self, _sim: &CollisionCycle) -> Result<()> {
        Ok(())
    }
}

impl<A: StepObserver, B: StepObserver> StepObserver for (A, B) {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
        // Both observers run even if the first one fails.
        let first = self.0.on_step(sim);
        let second = self.1.on_step(sim);
        first.and(second)
    }
}

impl<A: StepObserver, B: StepObserver, C: StepObserver> StepObserver for (A, B, C) {
    fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
        let first = self.0.on_step(sim);
        let second = self.1.on_step(sim);
        let third = self.2.on_step(sim);
        first.and(second).and(third)
    }
}

/// Totals for one call to [`CollisionCycle::run`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub frames: u64,
    /// Cycles that reached their last frame during this run.
    pub cycles_completed: u64,
    pub overlap_events: u64,
    pub observer_failures: u64,
}

/// Drives two counter-propagating bunches through repeated collisions.
///
/// Time is counted in frames. Frame `f` sits at step `f % steps_per_collision`
/// of its cycle. Step 0 rebuilds both bunches from the fixed initial
/// parameters; every other step drifts, interacts and integrates.
pub struct CollisionCycle {
    params: SimParams,
    stage: InteractionStage,
    electrons: Bunch,
    positrons: Bunch,
    /// Frames completed so far.
    frames_done: u64,
    last_report: InteractionReport,
}

impl CollisionCycle {
    /// Validates the configuration and builds both bunches.
    pub fn new(config: &BeamBeamConfig) -> Result<Self> {
        let params = config.get_sim_params()?;
        Ok(Self::from_params(params))
    }

    /// Builds the engine from already validated parameters.
    pub fn from_params(params: SimParams) -> Self {
        assert!(params.steps_per_collision > 0, "steps_per_collision must be positive");
        let (electrons, positrons) = initial_bunches(&params);
        Self {
            stage: InteractionStage::new(&params),
            params,
            electrons,
            positrons,
            frames_done: 0,
            last_report: InteractionReport::default(),
        }
    }

    /// Executes the next frame.
    pub fn advance(&mut self) -> &InteractionReport {
        let step = self.frame_step(self.frames_done);

        if step == 0 {
            // Fresh bunches every cycle; the old ones are dropped here.
            let (electrons, positrons) = initial_bunches(&self.params);
            self.electrons = electrons;
            self.positrons = positrons;
            self.last_report = InteractionReport::default();
            debug!("Collision #{} starts: bunches reset.", self.frames_done / self.steps_per_collision() as u64 + 1);
        } else {
            self.electrons.drift();
            self.positrons.drift();

            self.last_report = self.stage.apply(&mut self.electrons, &mut self.positrons);

            self.electrons.integrate_vertical();
            self.positrons.integrate_vertical();
        }

        self.frames_done += 1;
        &self.last_report
    }

    /// Advances `frames` frames, notifying `observer` after each one.
    ///
    /// Observer errors are logged and counted; they never stop the run.
    pub fn run<O: StepObserver + ?Sized>(&mut self, frames: u64, observer: &mut O) -> RunSummary {
        let mut summary = RunSummary::default();
        let spc = self.steps_per_collision();

        for _ in 0..frames {
            let overlaps = self.advance().overlapping_pairs();
            summary.frames += 1;
            summary.overlap_events += overlaps as u64;
            if self.step_in_cycle() == spc - 1 {
                summary.cycles_completed += 1;
            }

            if let Err(e) = observer.on_step(self) {
                summary.observer_failures += 1;
                error!("Observer failed at frame {}: {:#}", self.frame(), e);
            }
            trace!(
                "Frame {} (collision #{}, step {}/{}) done, {} overlapping slice pairs",
                self.frame(),
                self.collision_number(),
                self.step_in_cycle(),
                spc,
                overlaps
            );
        }
        summary
    }

    fn frame_step(&self, frame: u64) -> u32 {
        (frame % self.steps_per_collision() as u64) as u32
    }

    /// Index of the most recently completed frame, or 0 before the first one.
    pub fn frame(&self) -> u64 {
        self.frames_done.saturating_sub(1)
    }

    pub fn frames_done(&self) -> u64 {
        self.frames_done
    }

    /// Step of the most recently completed frame within its cycle.
    pub fn step_in_cycle(&self) -> u32 {
        self.frame_step(self.frame())
    }

    /// 1-based number of the cycle of the most recently completed frame.
    pub fn collision_number(&self) -> u64 {
        self.frame() / self.steps_per_collision() as u64 + 1
    }

    pub fn steps_per_collision(&self) -> u32 {
        self.params.steps_per_collision
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn electrons(&self) -> &Bunch {
        &self.electrons
    }

    pub fn positrons(&self) -> &Bunch {
        &self.positrons
    }

    pub fn last_report(&self) -> &InteractionReport {
        &self.last_report
    }

    /// Full copy of the observable state after the last frame.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            frame: self.frame(),
            collision: self.collision_number(),
            step_in_cycle: self.step_in_cycle(),
            steps_per_collision: self.steps_per_collision(),
            overlapping_pairs: self.last_report.overlapping_pairs(),
            kick_coefficient: self.params.kick_coefficient,
            vertical_separation: self.params.positron_offset - self.params.electron_offset,
            electrons: self.electrons.snapshot(),
            positrons: self.positrons.snapshot(),
        }
    }
}

fn initial_bunches(params: &SimParams) -> (Bunch, Bunch) {
    (
        Bunch::new(params, params.electron_start, Direction::Forward, params.electron_offset),
        Bunch::new(params, params.positron_start, Direction::Backward, params.positron_offset),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> BeamBeamConfig {
        let mut config = BeamBeamConfig::default();
        config.bunch.slice_count = 4;
        config.bunch.particles_per_slice = 5;
        config.collision.electron_start = -4.0;
        config.collision.margin_steps = 2;
        config
    }

    struct FailingObserver {
        calls: u64,
    }

    impl StepObserver for FailingObserver {
        fn on_step(&mut self, _sim: &CollisionCycle) -> Result<()> {
            self.calls += 1;
            anyhow::bail!("render target unavailable")
        }
    }

    struct FrameLog(Vec<(u64, u64, u32)>);

    impl StepObserver for FrameLog {
        fn on_step(&mut self, sim: &CollisionCycle) -> Result<()> {
            self.0.push((sim.frame(), sim.collision_number(), sim.step_in_cycle()));
            Ok(())
        }
    }

    #[test]
    fn rejects_invalid_configuration() {
        let mut config = small_config();
        config.bunch.slice_spacing = 0.0;
        assert!(CollisionCycle::new(&config).is_err());
    }

    #[test]
    fn first_frame_is_a_reset() {
        let mut sim = CollisionCycle::new(&small_config()).unwrap();
        let initial = (sim.electrons().clone(), sim.positrons().clone());
        let report = sim.advance();
        assert!(report.pairs.is_empty());
        assert_eq!(sim.electrons(), &initial.0);
        assert_eq!(sim.positrons(), &initial.1);
        assert_eq!(sim.step_in_cycle(), 0);
        assert_eq!(sim.collision_number(), 1);
    }

    #[test]
    fn step_drifts_then_interacts_then_integrates() {
        let mut sim = CollisionCycle::new(&small_config()).unwrap();
        // Bunch 1 at z = -4..=-1, bunch 2 at z = 1..=4.
        sim.advance();
        sim.advance();
        // After one drift they sit at -3..=0 and 0..=3: slice 3 meets slice 0.
        assert_eq!(sim.last_report().pairs, vec![(3, 0)]);
        assert_eq!(sim.electrons().slice_longitudinal(3), 0.0);

        // The kick was applied and integrated within the same step.
        let vy = sim.electrons().slice_vertical_velocities(3).to_vec();
        assert!(vy.iter().any(|&v| v != 0.0));
        let fresh = CollisionCycle::new(&small_config()).unwrap();
        let y0 = fresh.electrons().slice_vertical_positions(3);
        let y1 = sim.electrons().slice_vertical_positions(3);
        for k in 0..5 {
            assert_eq!(y1[k], y0[k] + vy[k]);
        }
        // Slices that met nothing are still at rest.
        assert!(sim.electrons().slice_vertical_velocities(0).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn cycle_boundary_rebuilds_bunches() {
        let config = small_config();
        let mut sim = CollisionCycle::new(&config).unwrap();
        let spc = sim.steps_per_collision() as u64;
        assert_eq!(spc, 6);

        for _ in 0..spc {
            sim.advance();
        }
        assert_eq!(sim.step_in_cycle(), spc as u32 - 1);
        assert!(sim.electrons().vertical_velocities().iter().any(|&v| v != 0.0));

        sim.advance();
        assert_eq!(sim.step_in_cycle(), 0);
        assert_eq!(sim.collision_number(), 2);
        let fresh = CollisionCycle::new(&config).unwrap();
        assert_eq!(sim.electrons(), fresh.electrons());
        assert_eq!(sim.positrons(), fresh.positrons());
    }

    #[test]
    fn observers_see_every_frame_in_order() {
        let mut sim = CollisionCycle::new(&small_config()).unwrap();
        let mut log = FrameLog(Vec::new());
        let summary = sim.run(8, &mut log);

        assert_eq!(summary.frames, 8);
        assert_eq!(summary.cycles_completed, 1);
        assert_eq!(summary.observer_failures, 0);
        assert_eq!(log.0[0], (0, 1, 0));
        assert_eq!(log.0[5], (5, 1, 5));
        assert_eq!(log.0[6], (6, 2, 0));
        assert_eq!(log.0[7], (7, 2, 1));
    }

    #[test]
    fn observer_failures_do_not_disturb_physics() {
        let config = small_config();
        let mut with_failure = CollisionCycle::new(&config).unwrap();
        let mut plain = CollisionCycle::new(&config).unwrap();

        let mut failing = FailingObserver { calls: 0 };
        let summary = with_failure.run(10, &mut failing);
        plain.run(10, &mut ());

        assert_eq!(failing.calls, 10);
        assert_eq!(summary.observer_failures, 10);
        assert_eq!(with_failure.electrons(), plain.electrons());
        assert_eq!(with_failure.positrons(), plain.positrons());
    }

    #[test]
    fn paired_observers_both_run() {
        let mut sim = CollisionCycle::new(&small_config()).unwrap();
        let mut pair = (FailingObserver { calls: 0 }, FrameLog(Vec::new()));
        let summary = sim.run(3, &mut pair);
        assert_eq!(summary.observer_failures, 3);
        assert_eq!(pair.0.calls, 3);
        assert_eq!(pair.1 .0.len(), 3);
    }

    #[test]
    fn observing_twice_yields_identical_state() {
        let mut sim = CollisionCycle::new(&small_config()).unwrap();
        for _ in 0..4 {
            sim.advance();
        }
        let first = sim.snapshot();
        let second = sim.snapshot();
        assert_eq!(first, second);
        assert_eq!(first.frame, 3);
        assert_eq!(first.step_in_cycle, 3);
        assert_eq!(first.kick_coefficient, 0.0025);
        assert_eq!(first.vertical_separation, 2.0);
    }
}
