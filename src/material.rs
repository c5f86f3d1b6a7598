use std::fmt;

use crate::constants::MeV;

/// Material interaction associated with a measurement.
///
/// A crossing may be referenced both by the hit that owns the measurement and
/// by an aggregator computing the total material budget of a fit, so instances
/// are shared (`Arc<dyn MaterialCrossing>`) and live as long as the longest
/// holder. The concrete energy-loss distributions (Moyal, Bremsstrahlung,
/// delta-ray, ...) live outside this crate; only their sampling contract is
/// consumed here.
pub trait MaterialCrossing: fmt::Debug {
    /// Expected energy loss through the crossing, in MeV.
    fn mean_energy_loss(&self) -> MeV;

    /// Stochastic energy-loss sample, in MeV, for a uniform random input
    /// `u` in [0, 1). Deterministic in `u`, so drivers own the randomness.
    fn sample_energy_loss(&self, u: f64) -> MeV;
}
