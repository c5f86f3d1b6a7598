use std::sync::Arc;

use nalgebra::{SMatrix, SVector};

use crate::fit_state::{FitState, Mode};
use crate::helix::Helix;
use crate::hit::{Hit, MetaIterConfig};
use crate::material::MaterialCrossing;

/// Parameter-space prior constraint.
///
/// Every fit folds the weight of its seed estimate into the first update; a
/// `PriorHit` expresses that seed as a measurement constraint so the driver can
/// treat it uniformly with detector hits. It constrains all six helix
/// parameters directly, with the seed covariance as its resolution.
#[derive(Debug)]
pub struct PriorHit {
    /// Seed estimate, parameter form.
    constraint: FitState<6>,
    /// Temperature-inflated copy of the seed used for the current iteration.
    scaled: FitState<6>,
    /// Cached weight-form dual of `scaled`; carries `Status::Invalid` when the
    /// seed covariance is singular, per the recoverable-flag policy.
    weight: FitState<6>,
    time: f64,
    active: bool,
}

impl PriorHit {
    /// Build from a parameter-form seed estimate and its reference time.
    pub fn new(constraint: FitState<6>, time: f64) -> Self {
        debug_assert_eq!(constraint.mode(), Mode::Parameter);
        let weight = constraint.inverted();
        Self {
            scaled: constraint.clone(),
            constraint,
            weight,
            time,
            active: true,
        }
    }

    fn mahalanobis(&self, reference: &FitState<6>) -> f64 {
        let delta: SVector<f64, 6> = reference.vector() - self.scaled.vector();
        let combined: SMatrix<f64, 6, 6> = reference.matrix() + self.scaled.matrix();
        match combined.cholesky() {
            Some(decomposition) => delta.dot(&decomposition.solve(&delta)).sqrt(),
            None => f64::INFINITY,
        }
    }
}

impl Hit for PriorHit {
    fn weight(&self) -> FitState<6> {
        self.weight.clone()
    }

    fn ndof(&self) -> u32 {
        if self.active {
            6
        } else {
            0
        }
    }

    fn chi(&self, reference: &FitState<6>) -> f64 {
        self.mahalanobis(reference)
    }

    fn time(&self) -> f64 {
        self.time
    }

    fn update_for_iteration(&mut self, reference: &Helix, config: &MetaIterConfig) {
        let inflation = 1.0 + config.temperature;
        self.scaled = FitState::new(*self.constraint.vector(), self.constraint.matrix() * inflation);
        self.weight = self.scaled.inverted();
        self.active = self.chi(reference.params()) <= config.chi_cut;
    }

    fn update(&mut self, _reference: &Helix) {
        // a parameter-space prior has no shape-dependent internals
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn material_xing(&self) -> Option<&Arc<dyn MaterialCrossing>> {
        None
    }
}
