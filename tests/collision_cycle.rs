use beambeam_common::{BeamBeamConfig, Snapshot};
use beambeam_engine::{CentroidTracker, CollisionCycle, SnapshotRecorder};

fn reference_engine() -> CollisionCycle {
    CollisionCycle::new(&BeamBeamConfig::default()).expect("reference scenario is valid")
}

/// One full cycle of the reference scenario: 50 slices x 21 particles,
/// DZ = 1, DY = 0.5, kick 0.0025, separation 2, starts at -50 and 1.
#[test]
fn reference_cycle_geometry() {
    let mut sim = reference_engine();
    assert_eq!(sim.steps_per_collision(), 70);

    let mut max_pairs = 0;
    let mut total_pairs = 0u64;
    let mut last_overlap_step = 0;
    for _ in 0..70 {
        let pairs = sim.advance().overlapping_pairs();
        if pairs > 0 {
            last_overlap_step = sim.step_in_cycle();
        }
        max_pairs = max_pairs.max(pairs);
        total_pairs += pairs as u64;
    }

    // Only slice pairs with an odd index difference ever coincide.
    assert_eq!(total_pairs, 1250);
    assert_eq!(max_pairs, 49);
    // The tail of the cycle is the margin where the bunches separate.
    assert_eq!(last_overlap_step, 50);
    assert_eq!(sim.electrons().slice_longitudinal(0), -50.0 + 69.0);
    assert_eq!(sim.positrons().slice_longitudinal(0), 1.0 - 69.0);
}

#[test]
fn combined_centroid_is_conserved_through_a_collision() {
    let mut sim = reference_engine();
    let mut tracker = CentroidTracker::new();
    sim.run(70, &mut tracker);

    let history = tracker.history();
    let first = history[0];
    let last = history[69];
    assert!((first.electron_centroid + 1.0).abs() < 1e-12);
    assert!((first.positron_centroid - 1.0).abs() < 1e-12);

    for sample in history {
        let combined = sample.electron_centroid + sample.positron_centroid;
        assert!(combined.abs() < 1e-9, "combined centroid drifted to {} at step {}", combined, sample.step);
    }

    // The bunches attract each other: bunch 1 is pulled up, bunch 2 down.
    assert!(last.electron_centroid > first.electron_centroid);
    assert!(last.positron_centroid < first.positron_centroid);
}

#[test]
fn centred_collision_keeps_each_centroid() {
    let mut config = BeamBeamConfig::default();
    config.collision.vertical_separation = 0.0;
    let mut sim = CollisionCycle::new(&config).unwrap();
    let mut tracker = CentroidTracker::new();
    sim.run(70, &mut tracker);

    for sample in tracker.history() {
        assert!(sample.electron_centroid.abs() < 1e-9);
        assert!(sample.positron_centroid.abs() < 1e-9);
    }
}

#[test]
fn velocities_are_spread_after_a_collision() {
    let mut sim = reference_engine();
    for _ in 0..70 {
        sim.advance();
    }

    let vy = sim.electrons().vertical_velocities();
    let nonzero = vy.iter().filter(|&&v| v != 0.0).count();
    assert!(nonzero > vy.len() / 2, "only {} of {} particles were kicked", nonzero, vy.len());

    let min = vy.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = vy.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    assert!(max - min > 0.1, "velocity spread {} too small", max - min);
    // Bounded by one full-slice kick per opposing slice.
    let bound = 50.0 * 21.0 * 0.0025;
    assert!(vy.iter().all(|v| v.abs() <= bound));
}

#[test]
fn longitudinal_coordinate_is_shared_within_every_slice() {
    let mut sim = reference_engine();
    for _ in 0..90 {
        sim.advance();
        for bunch in [sim.electrons(), sim.positrons()] {
            let z = bunch.longitudinal_positions();
            for (slice, row) in z.chunks(bunch.particles_per_slice()).enumerate() {
                assert!(row.iter().all(|&v| v == bunch.slice_longitudinal(slice)));
            }
            for slice in 1..bunch.slice_count() {
                let spacing = bunch.slice_longitudinal(slice) - bunch.slice_longitudinal(slice - 1);
                assert_eq!(spacing, 1.0);
            }
        }
    }
}

#[test]
fn every_cycle_replays_the_first_bit_for_bit() {
    let mut sim = reference_engine();
    let mut recorder = SnapshotRecorder::new(1);
    sim.run(70 * 3, &mut recorder);

    let snapshots = recorder.into_snapshots();
    let cycle = |n: u64| -> Vec<&Snapshot> { snapshots.iter().filter(|s| s.collision == n).collect() };
    let (first, second, third) = (cycle(1), cycle(2), cycle(3));
    assert_eq!(first.len(), 70);
    assert_eq!(second.len(), 70);

    for ((a, b), c) in first.iter().zip(&second).zip(&third) {
        assert_eq!(a.step_in_cycle, b.step_in_cycle);
        assert_eq!(a.electrons, b.electrons);
        assert_eq!(a.positrons, b.positrons);
        assert_eq!(a.overlapping_pairs, c.overlapping_pairs);
        assert_eq!(a.electrons, c.electrons);
    }
}

#[test]
fn fresh_engines_are_identical() {
    let mut a = reference_engine();
    let mut b = reference_engine();
    for _ in 0..40 {
        a.advance();
        b.advance();
    }
    assert_eq!(a.snapshot(), b.snapshot());
}

#[test]
fn bunches_overlapping_at_cycle_start_interact_immediately() {
    let mut config = BeamBeamConfig::default();
    config.collision.positron_start = -10.0;

    let mut sim = CollisionCycle::new(&config).expect("overlapping start is allowed");
    assert_eq!(sim.steps_per_collision(), 64);
    assert_eq!(sim.advance().overlapping_pairs(), 0);
    // After one drift bunch 1 spans -49..=0 and bunch 2 spans -11..=38.
    assert_eq!(sim.advance().overlapping_pairs(), 12);

    let mut fresh = CollisionCycle::new(&config).unwrap();
    let summary = fresh.run(64, &mut ());
    assert_eq!(summary.frames, 64);
    assert_eq!(summary.cycles_completed, 1);
    assert_eq!(summary.overlap_events, 1220);
    assert_eq!(summary.observer_failures, 0);
}
