//! # Measurement constraint contract
//!
//! A [`Hit`] is a single detector measurement expressed as a constraint on the
//! fit: evaluated against a reference trajectory, it contributes a weight-form
//! [`FitState`] that the fit driver accumulates with the trajectory's own prior
//! weight before converting the sum back to parameter form.
//!
//! Concrete hits are detector-specific (time-only, position-only, combined, ...)
//! and heterogeneous; a driver holds them as `Box<dyn Hit>` (or `Arc`) and never
//! needs a common concrete representation. Hits are identity-bearing objects:
//! two hits are never "equal", since internal calibration is per instance, so
//! the contract deliberately excludes `Clone`.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::fit_state::FitState;
use crate::helix::Helix;
use crate::material::MaterialCrossing;

/// Per-meta-iteration tuning forwarded to every hit.
///
/// One meta-iteration is a pass of the global fit in which measurement
/// calibration may change: the annealing temperature inflates resolutions early
/// on, and the chi cut decides which hits stay active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetaIterConfig {
    /// Index of this meta-iteration within the fit schedule.
    pub iteration: usize,
    /// Annealing temperature; 0 means native resolutions.
    pub temperature: f64,
    /// Hits whose normalized residual exceeds this value are deactivated.
    pub chi_cut: f64,
}

impl Default for MetaIterConfig {
    fn default() -> Self {
        Self {
            iteration: 0,
            temperature: 0.0,
            chi_cut: f64::INFINITY,
        }
    }
}

/// Contract every measurement constraint satisfies.
pub trait Hit: std::fmt::Debug {
    /// Information-form contribution of this measurement against the current
    /// reference trajectory. Deterministic given the hit's internal state, and
    /// never mutates the hit. The result of an inactive hit is not meaningful
    /// and must be ignored by callers.
    fn weight(&self) -> FitState<6>;

    /// Number of measurement degrees of freedom constrained; 0 when inactive.
    fn ndof(&self) -> u32;

    /// Normalized residual between the given reference parameters and this
    /// measurement's expectation, scaled by the combined errors.
    fn chi(&self, reference: &FitState<6>) -> f64;

    /// Time of this measurement on the reference trajectory's timeline, in ns.
    fn time(&self) -> f64;

    /// Recalibrate for a new meta-iteration: resolution models, material
    /// crossing, activity. May change [`Hit::is_active`].
    fn update_for_iteration(&mut self, reference: &Helix, config: &MetaIterConfig);

    /// Refresh only the quantities that depend on the reference trajectory's
    /// shape, leaving per-iteration tuning and activity unchanged.
    fn update(&mut self, reference: &Helix);

    /// Whether this hit currently contributes to the fit.
    fn is_active(&self) -> bool;

    /// Material associated with this measurement; `None` means no material in
    /// the particle's path.
    fn material_xing(&self) -> Option<&Arc<dyn MaterialCrossing>>;

    /// Whether this measurement has associated material.
    fn has_material(&self) -> bool {
        self.material_xing().is_some()
    }
}
