use crate::bunch::Bunch;
use crate::field::slice_kicks;
use beambeam_common::SimParams;
use log::trace;

/// Outcome of one interaction pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InteractionReport {
    /// `(slice of bunch 1, slice of bunch 2)` for every colliding pair, in visit order.
    pub pairs: Vec<(usize, usize)>,
}

impl InteractionReport {
    pub fn overlapping_pairs(&self) -> u32 {
        self.pairs.len() as u32
    }
}

/// Finds co-located slice pairs of two bunches and exchanges beam-beam kicks.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionStage {
    kick_coefficient: f64,
    tolerance: f64,
}

impl InteractionStage {
    pub fn new(params: &SimParams) -> Self {
        Self {
            kick_coefficient: params.kick_coefficient,
            tolerance: params.overlap_tolerance,
        }
    }

    /// True when two slices are at the same place. The comparison is strict.
    #[inline]
    pub fn slices_overlap(&self, z1: f64, z2: f64) -> bool {
        (z1 - z2).abs() < self.tolerance
    }

    /// Tests every slice of `first` against every slice of `second` and, for each
    /// overlapping pair, kicks both slices using the other's current positions.
    ///
    /// Each pair is visited exactly once. Both kick vectors of a pair are computed
    /// before either is applied; kicks only touch velocities, so positions read by
    /// later pairs are the same pre-kick positions.
    pub fn apply(&self, first: &mut Bunch, second: &mut Bunch) -> InteractionReport {
        let mut report = InteractionReport::default();

        for i in 0..first.slice_count() {
            let z1 = first.slice_longitudinal(i);

            for j in 0..second.slice_count() {
                let z2 = second.slice_longitudinal(j);
                if !self.slices_overlap(z1, z2) {
                    continue;
                }

                let (kicks1, kicks2) = {
                    let y1 = first.slice_vertical_positions(i);
                    let y2 = second.slice_vertical_positions(j);
                    (
                        slice_kicks(y1, y2, self.kick_coefficient),
                        slice_kicks(y2, y1, self.kick_coefficient),
                    )
                };

                first.apply_kick(i, &kicks1);
                second.apply_kick(j, &kicks2);

                trace!("Slices ({}, {}) collide at z = {:.3}", i, j, z1);
                report.pairs.push((i, j));
            }
        }

        report
    }
}
