use std::sync::Arc;

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::constants::{Mm, Ns};
use crate::fit_state::{FitState, Mode};
use crate::helix::Helix;
use crate::hit::{Hit, MetaIterConfig};
use crate::material::MaterialCrossing;

/// Three-dimensional space-point measurement with isotropic resolution.
///
/// The hit linearizes the trajectory position at its measurement time through
/// [`Helix::position_deriv`] and expresses the point constraint in information
/// form: with jacobian `H`, resolution `σ` and residual `r` against the
/// reference, the weight matrix is `HᵀH/σ²` and the weight vector
/// `Hᵀ(r + H·p_ref)/σ²`. The linearization is refreshed by [`Hit::update`]
/// whenever the reference trajectory changes shape.
#[derive(Debug)]
pub struct SpacePointHit {
    point: Vector3<Mm>,
    time: Ns,
    /// Native detector resolution (mm).
    sigma: Mm,
    /// Resolution for the current meta-iteration, after annealing.
    effective_sigma: Mm,
    active: bool,
    xing: Option<Arc<dyn MaterialCrossing>>,
    // linearization against the current reference trajectory
    jacobian: SMatrix<f64, 3, 6>,
    residual: Vector3<Mm>,
    ref_params: SVector<f64, 6>,
}

impl SpacePointHit {
    /// Build from a measured lab-frame point, its time on the reference
    /// timeline, and an isotropic resolution; linearizes against `reference`
    /// immediately.
    pub fn new(point: Vector3<Mm>, time: Ns, sigma: Mm, reference: &Helix) -> Self {
        let mut hit = Self {
            point,
            time,
            sigma,
            effective_sigma: sigma,
            active: true,
            xing: None,
            jacobian: SMatrix::zeros(),
            residual: Vector3::zeros(),
            ref_params: SVector::zeros(),
        };
        hit.update(reference);
        hit
    }

    /// Attach the material crossed on the way to this measurement.
    pub fn set_material(&mut self, xing: Arc<dyn MaterialCrossing>) {
        self.xing = Some(xing);
    }

    pub fn point(&self) -> &Vector3<Mm> {
        &self.point
    }

    pub fn sigma(&self) -> Mm {
        self.sigma
    }

    /// Residual of `reference` against the measured point, and its combined
    /// 3x3 covariance (measurement plus projected parameter covariance).
    fn projected_residual(&self, reference: &FitState<6>) -> (Vector3<f64>, Matrix3<f64>) {
        let shift = self.jacobian * (reference.vector() - self.ref_params);
        let residual = self.residual - shift;
        let var = self.effective_sigma * self.effective_sigma;
        let combined = Matrix3::identity() * var
            + self.jacobian * reference.matrix() * self.jacobian.transpose();
        (residual, combined)
    }
}

impl Hit for SpacePointHit {
    fn weight(&self) -> FitState<6> {
        let inv_var = 1.0 / (self.effective_sigma * self.effective_sigma);
        let wmat = self.jacobian.transpose() * self.jacobian * inv_var;
        let wvec = self.jacobian.transpose()
            * (self.residual + self.jacobian * self.ref_params)
            * inv_var;
        FitState::with_mode(wvec, wmat, Mode::Weight)
    }

    fn ndof(&self) -> u32 {
        if self.active {
            3
        } else {
            0
        }
    }

    fn chi(&self, reference: &FitState<6>) -> f64 {
        let (residual, combined) = self.projected_residual(reference);
        match combined.cholesky() {
            Some(decomposition) => residual.dot(&decomposition.solve(&residual)).sqrt(),
            None => f64::INFINITY,
        }
    }

    fn time(&self) -> Ns {
        self.time
    }

    fn update_for_iteration(&mut self, reference: &Helix, config: &MetaIterConfig) {
        self.effective_sigma = self.sigma * (1.0 + config.temperature);
        self.update(reference);
        let chi = self.chi(reference.params());
        self.active = chi.is_finite() && chi <= config.chi_cut;
    }

    fn update(&mut self, reference: &Helix) {
        self.jacobian = reference.position_deriv(self.time);
        self.residual = self.point - reference.position3(self.time);
        self.ref_params = *reference.params().vector();
    }

    fn is_active(&self) -> bool {
        self.active
    }

    fn material_xing(&self) -> Option<&Arc<dyn MaterialCrossing>> {
        self.xing.as_ref()
    }
}

#[cfg(test)]
mod space_point_hit_test {
    use super::*;
    use crate::constants::{FourMomentum, FourPosition, ELECTRON_MASS};
    use crate::time_range::TimeRange;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn reference() -> Helix {
        let mom = FourMomentum::new(
            80.0,
            60.0,
            50.0,
            (80.0f64 * 80.0 + 60.0 * 60.0 + 50.0 * 50.0 + ELECTRON_MASS * ELECTRON_MASS).sqrt(),
        );
        Helix::new(
            FourPosition::new(10.0, -20.0, 35.0, 1.5),
            mom,
            -1,
            nalgebra::Vector3::new(0.0, 0.0, 1.0),
            TimeRange::new(-100.0, 100.0),
        )
        .unwrap()
    }

    #[test]
    fn test_on_trajectory_point_has_zero_chi() {
        let reference = reference();
        let time = 8.0;
        let hit = SpacePointHit::new(reference.position3(time), time, 0.1, &reference);
        let chi = hit.chi(reference.params());
        assert_abs_diff_eq!(chi, 0.0, epsilon = 1e-9);
        assert_eq!(hit.ndof(), 3);
        assert!(!hit.has_material());
    }

    #[test]
    fn test_displaced_point_has_finite_chi() {
        let reference = reference();
        let time = 8.0;
        let point = reference.position3(time) + Vector3::new(0.3, -0.1, 0.2);
        let hit = SpacePointHit::new(point, time, 0.1, &reference);
        let chi = hit.chi(reference.params());
        assert!(chi.is_finite());
        assert!(chi > 1.0);
    }

    #[test]
    fn test_weight_is_deterministic_and_information_form() {
        let reference = reference();
        let time = -4.0;
        let point = reference.position3(time) + Vector3::new(0.05, 0.02, -0.04);
        let hit = SpacePointHit::new(point, time, 0.2, &reference);

        let first = hit.weight();
        let second = hit.weight();
        assert_eq!(first, second);
        assert_eq!(first.mode(), Mode::Weight);

        // the weight matrix is HᵀH/σ², so it is symmetric positive semi-definite
        let wmat = first.matrix();
        assert_relative_eq!(*wmat, wmat.transpose(), epsilon = 1e-12);
        for trial in [
            SVector::<f64, 6>::from_row_slice(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0]),
            SVector::<f64, 6>::from_row_slice(&[0.3, -0.4, 1.2, 0.0, -2.0, 0.7]),
        ] {
            assert!(trial.dot(&(wmat * trial)) >= -1e-12);
        }
    }

    #[test]
    fn test_outlier_deactivated_by_iteration_update() {
        let reference = reference();
        let time = 8.0;
        let far_point = reference.position3(time) + Vector3::new(50.0, 0.0, 0.0);
        let mut hit = SpacePointHit::new(far_point, time, 0.1, &reference);

        let config = MetaIterConfig {
            chi_cut: 5.0,
            ..MetaIterConfig::default()
        };
        hit.update_for_iteration(&reference, &config);
        assert!(!hit.is_active());
        assert_eq!(hit.ndof(), 0);

        // annealing inflates the resolution enough to keep the hit
        let hot = MetaIterConfig {
            temperature: 5000.0,
            chi_cut: 5.0,
            ..MetaIterConfig::default()
        };
        hit.update_for_iteration(&reference, &hot);
        assert!(hit.is_active());
    }

    #[test]
    fn test_material_attachment_is_shared() {
        #[derive(Debug)]
        struct FlatLoss;
        impl MaterialCrossing for FlatLoss {
            fn mean_energy_loss(&self) -> f64 {
                0.5
            }
            fn sample_energy_loss(&self, u: f64) -> f64 {
                u
            }
        }

        let reference = reference();
        let mut hit = SpacePointHit::new(reference.position3(0.0), 0.0, 0.1, &reference);
        let xing: Arc<dyn MaterialCrossing> = Arc::new(FlatLoss);
        hit.set_material(Arc::clone(&xing));

        assert!(hit.has_material());
        let held = hit.material_xing().unwrap();
        assert_relative_eq!(held.mean_energy_loss(), 0.5);
        assert_relative_eq!(held.sample_energy_loss(0.25), 0.25);
        // shared ownership: both handles point at the same crossing
        assert_eq!(Arc::strong_count(&xing), 2);
    }
}
