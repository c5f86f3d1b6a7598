//! # Helical trajectory model
//!
//! [`Helix`] is the trajectory a kinematic Kalman fit propagates and updates: the
//! path of a charged particle in a (locally) constant magnetic field, described by
//! six parameters in a frame whose z-axis is aligned with the nominal field:
//!
//! | index | name | unit | meaning |
//! |-------|------|------|---------|
//! | 0 | Radius  | mm | transverse radius, signed by charge and field |
//! | 1 | Lambda  | mm | longitudinal wavelength |
//! | 2 | CenterX | mm | cylinder center x |
//! | 3 | CenterY | mm | cylinder center y |
//! | 4 | Phi0    | radians | azimuth at the z=0 plane |
//! | 5 | Time0   | ns | time at the z=0 plane |
//!
//! The parametrization carries its own Gaussian estimate (a parameter-form
//! [`FitState<6>`]), a validity [`TimeRange`], the nominal field it assumes
//! constant, and the immutable particle mass and charge. When the nominal field
//! does not point along the working z-axis, an alignment rotation is applied at
//! construction and its inverse is cached so every position, momentum and
//! derivative query reports in the lab frame.

use nalgebra::{Rotation3, SMatrix, SVector, Unit, Vector3};
use serde::{Deserialize, Serialize};
use std::fmt;

use itertools::izip;

use crate::constants::{
    FourMomentum, FourPosition, MeV, Mm, Ns, Radian, C_LIGHT, DPI, FIELD_ALIGN_TOL, MEV_TO_MM,
};
use crate::field::FieldSource;
use crate::fit_state::FitState;
use crate::kinfit_errors::KinFitError;
use crate::time_range::TimeRange;

// Parameter vector indices
pub const RAD: usize = 0;
pub const LAM: usize = 1;
pub const CX: usize = 2;
pub const CY: usize = 3;
pub const PHI0: usize = 4;
pub const T0: usize = 5;

/// Short parameter names, indexed like the parameter vector.
pub const PARAM_NAMES: [&str; 6] = ["Radius", "Lambda", "CenterX", "CenterY", "Phi0", "Time0"];

/// Parameter units, indexed like the parameter vector.
pub const PARAM_UNITS: [&str; 6] = ["mm", "mm", "mm", "mm", "radians", "ns"];

/// Human-readable parameter titles, indexed like the parameter vector.
pub const PARAM_TITLES: [&str; 6] = [
    "Transverse Radius",
    "Longitudinal Wavelength",
    "Cylinder Center X",
    "Cylinder Center Y",
    "Azimuth at Z=0 Plane",
    "Time at Z=0 Plane",
];

/// Physical perturbation directions for [`Helix::mom_deriv`].
///
/// The three directions are mutually distinguishing: a polar bend changes
/// radius and wavelength but neither the momentum magnitude nor the position; an
/// azimuthal bend changes only the azimuth and the center; a magnitude change
/// scales the momentum while leaving its direction unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MomDirection {
    /// Bend in the polar plane (changes the momentum polar angle).
    PolarBend,
    /// Bend in the azimuthal plane (changes the momentum azimuth).
    AzimuthalBend,
    /// Fractional change of the momentum magnitude.
    Magnitude,
}

/// Helical trajectory of a charged particle in a nominally constant field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Helix {
    state: FitState<6>,
    range: TimeRange,
    bnom: Vector3<f64>,
    mass: MeV,
    charge: i32,
    /// Reduced mass in mm, signed by charge and field orientation.
    mbar: f64,
    /// Rotation from the field-aligned working frame back to the lab frame,
    /// present only when the nominal field is off the working z-axis.
    to_lab: Option<Rotation3<f64>>,
}

/// Polar angle of a vector off the z-axis, in [0, π].
fn polar_angle(v: &Vector3<f64>) -> Radian {
    v.xy().norm().atan2(v.z)
}

/// Alignment rotation pair (lab → working, working → lab) for a nominal field,
/// or `None` when the field already lies along the working z-axis.
fn field_rotation(bnom: &Vector3<f64>) -> Result<Option<(Rotation3<f64>, Rotation3<f64>)>, KinFitError> {
    let theta = polar_angle(bnom);
    if theta.abs() <= FIELD_ALIGN_TOL {
        return Ok(None);
    }
    let bphi = bnom.y.atan2(bnom.x);
    let axis = Unit::new_normalize(Vector3::new(bphi.sin(), -bphi.cos(), 0.0));
    let to_field = Rotation3::from_axis_angle(&axis, theta);
    // verify the rotated field really sits on the working axis
    let residual = polar_angle(&(to_field * bnom));
    if residual.abs() > FIELD_ALIGN_TOL {
        return Err(KinFitError::MisalignedField(residual));
    }
    Ok(Some((to_field, to_field.inverse())))
}

impl Helix {
    /// Build a helix from a lab-frame phase-space point.
    ///
    /// `pos` is (x, y, z, t) in (mm, ns), `mom` is (px, py, pz, E) in MeV, and
    /// `bnom` is the nominal field in Tesla. The particle mass is derived from
    /// the four-momentum. The azimuth at z=0 is resolved with a winding-number
    /// correction so that `phi0` stays on the principal branch however many
    /// turns separate the given point from the z=0 plane.
    pub fn new(
        pos: FourPosition,
        mom: FourMomentum,
        charge: i32,
        bnom: Vector3<f64>,
        range: TimeRange,
    ) -> Result<Self, KinFitError> {
        if charge == 0 {
            return Err(KinFitError::ZeroCharge);
        }
        if bnom.norm() == 0.0 {
            return Err(KinFitError::ZeroField);
        }
        let energy = mom[3];
        let mut mom3 = mom.xyz();
        let mass2 = energy * energy - mom3.norm_squared();
        if mass2 < 0.0 {
            return Err(KinFitError::UnphysicalMomentum {
                energy,
                momentum: mom3.norm(),
            });
        }
        let mass = mass2.sqrt();

        // transform into the frame where z lies along the nominal field
        let rotations = field_rotation(&bnom)?;
        let mut pos3 = pos.xyz();
        if let Some((to_field, _)) = &rotations {
            pos3 = to_field * pos3;
            mom3 = to_field * mom3;
        }
        let time = pos[3];

        // momentum to curvature radius, in mm per MeV/c; signed by the charge
        let mom_to_rad = MEV_TO_MM / (charge as f64 * bnom.norm() * C_LIGHT);
        let mbar = -mass * mom_to_rad;

        let pt = mom3.xy().norm();
        let phibar = mom3.y.atan2(mom3.x);

        let rad = -pt * mom_to_rad;
        let lam = -mom3.z * mom_to_rad;

        let mut vector = SVector::<f64, 6>::zeros();
        vector[RAD] = rad;
        vector[LAM] = lam;

        // time at the z=0 plane
        let ebar = (rad * rad + lam * lam + mbar * mbar).sqrt();
        let omega = C_LIGHT.copysign(mbar) / ebar;
        let t0 = time - pos3.z / (omega * lam);
        vector[T0] = t0;

        // winding that puts phi0 on the principal branch
        let nwind = ((pos3.z / lam - phibar) / DPI).round();
        vector[PHI0] = phibar - omega * (time - t0) + DPI * nwind;

        // circle center
        vector[CX] = pos3.x + mom3.y * mom_to_rad;
        vector[CY] = pos3.y - mom3.x * mom_to_rad;

        Ok(Self {
            state: FitState::from_vector(vector),
            range,
            bnom,
            mass,
            charge,
            mbar,
            to_lab: rotations.map(|(_, to_lab)| to_lab),
        })
    }

    /// Convenience constructor for a nominal field along the working z-axis.
    pub fn with_axial_field(
        pos: FourPosition,
        mom: FourMomentum,
        charge: i32,
        bz: f64,
        range: TimeRange,
    ) -> Result<Self, KinFitError> {
        Self::new(pos, mom, charge, Vector3::new(0.0, 0.0, bz), range)
    }

    /// Build a helix directly from a pre-built parameter state.
    ///
    /// The parameters are interpreted in the field-aligned working frame; only
    /// the field-alignment rotation and the reduced mass are recomputed.
    pub fn from_state(
        state: FitState<6>,
        mass: MeV,
        charge: i32,
        bnom: Vector3<f64>,
        range: TimeRange,
    ) -> Result<Self, KinFitError> {
        if charge == 0 {
            return Err(KinFitError::ZeroCharge);
        }
        if bnom.norm() == 0.0 {
            return Err(KinFitError::ZeroField);
        }
        let rotations = field_rotation(&bnom)?;
        let mom_to_rad = MEV_TO_MM / (charge as f64 * bnom.norm() * C_LIGHT);
        Ok(Self {
            state,
            range,
            bnom,
            mass,
            charge,
            mbar: -mass * mom_to_rad,
            to_lab: rotations.map(|(_, to_lab)| to_lab),
        })
    }

    // ---------------------------------------------------------------------------------------------
    // Parameter and property accessors
    // ---------------------------------------------------------------------------------------------

    pub fn params(&self) -> &FitState<6> {
        &self.state
    }

    pub fn range(&self) -> &TimeRange {
        &self.range
    }

    pub fn bnom(&self) -> &Vector3<f64> {
        &self.bnom
    }

    pub fn mass(&self) -> MeV {
        self.mass
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn rad(&self) -> Mm {
        self.state.vector()[RAD]
    }

    pub fn lam(&self) -> Mm {
        self.state.vector()[LAM]
    }

    pub fn cx(&self) -> Mm {
        self.state.vector()[CX]
    }

    pub fn cy(&self) -> Mm {
        self.state.vector()[CY]
    }

    pub fn phi0(&self) -> Radian {
        self.state.vector()[PHI0]
    }

    pub fn t0(&self) -> Ns {
        self.state.vector()[T0]
    }

    /// Mutable access to `t0`, the one parameter detector-side recalibration is
    /// allowed to refine in place.
    pub fn t0_mut(&mut self) -> &mut Ns {
        &mut self.state.vector_mut()[T0]
    }

    // ---------------------------------------------------------------------------------------------
    // Rotational-unit kinematic quantities
    // ---------------------------------------------------------------------------------------------

    /// Momentum expressed in curvature units (mm).
    pub fn pbar(&self) -> f64 {
        (self.rad() * self.rad() + self.lam() * self.lam()).sqrt()
    }

    /// Energy expressed in curvature units (mm).
    pub fn ebar(&self) -> f64 {
        (self.rad() * self.rad() + self.lam() * self.lam() + self.mbar * self.mbar).sqrt()
    }

    /// Reduced mass in mm; the sign encodes charge and field orientation.
    pub fn mbar(&self) -> f64 {
        self.mbar
    }

    /// Total energy in MeV.
    pub fn energy(&self) -> MeV {
        self.mass * self.ebar() / self.mbar.abs()
    }

    /// Momentum magnitude in MeV/c.
    pub fn momentum_mag(&self) -> MeV {
        self.mass * self.pbar() / self.mbar.abs()
    }

    /// Angular velocity of the azimuthal phase in radians/ns; the sign is set
    /// by the magnetic force.
    pub fn omega(&self) -> f64 {
        C_LIGHT.copysign(self.mbar) / self.ebar()
    }

    /// Relativistic beta.
    pub fn beta(&self) -> f64 {
        self.pbar() / self.ebar()
    }

    /// Relativistic gamma.
    pub fn gamma(&self) -> f64 {
        (self.ebar() / self.mbar).abs()
    }

    /// Speed along the trajectory in mm/ns.
    pub fn speed(&self) -> f64 {
        C_LIGHT * self.beta()
    }

    /// Azimuthal phase advance since `t0`.
    pub fn dphi(&self, time: Ns) -> Radian {
        self.omega() * (time - self.t0())
    }

    /// Azimuthal phase at `time`.
    pub fn phi(&self, time: Ns) -> Radian {
        self.dphi(time) + self.phi0()
    }

    /// Time at which the trajectory crosses the given z position.
    pub fn ztime(&self, zpos: Mm) -> Ns {
        self.t0() + zpos / (self.omega() * self.lam())
    }

    // ---------------------------------------------------------------------------------------------
    // Lab-frame queries
    // ---------------------------------------------------------------------------------------------

    fn rotate_out(&self, v: Vector3<f64>) -> Vector3<f64> {
        match &self.to_lab {
            Some(rot) => rot * v,
            None => v,
        }
    }

    /// Lab-frame position at `time`, in mm.
    pub fn position3(&self, time: Ns) -> Vector3<Mm> {
        let df = self.dphi(time);
        let phival = df + self.phi0();
        let local = Vector3::new(
            self.cx() + self.rad() * phival.sin(),
            self.cy() - self.rad() * phival.cos(),
            df * self.lam(),
        );
        self.rotate_out(local)
    }

    /// Lab-frame space-time point at `time`.
    pub fn position4(&self, time: Ns) -> FourPosition {
        let pos = self.position3(time);
        FourPosition::new(pos.x, pos.y, pos.z, time)
    }

    /// Lab-frame momentum three-vector at `time`, in MeV/c.
    pub fn momentum3(&self, time: Ns) -> Vector3<MeV> {
        let phival = self.phi(time);
        let factor = self.mass / self.mbar;
        let local = Vector3::new(
            factor * self.rad() * phival.cos(),
            factor * self.rad() * phival.sin(),
            factor * self.lam(),
        );
        self.rotate_out(local)
    }

    /// Lab-frame four-momentum (px, py, pz, E) at `time`, in MeV.
    pub fn momentum4(&self, time: Ns) -> FourMomentum {
        let mom = self.momentum3(time);
        FourMomentum::new(mom.x, mom.y, mom.z, self.energy())
    }

    /// Lab-frame velocity at `time`, in mm/ns.
    pub fn velocity(&self, time: Ns) -> Vector3<f64> {
        self.momentum3(time) * (C_LIGHT / self.energy())
    }

    /// Lab-frame momentum direction at `time`.
    pub fn direction(&self, time: Ns) -> Vector3<f64> {
        self.momentum3(time).normalize()
    }

    /// Variance of the momentum magnitude implied by the parameter covariance.
    pub fn momentum_variance(&self) -> f64 {
        let scale = self.mass / (self.pbar() * self.mbar);
        let mut dmom = SVector::<f64, 6>::zeros();
        dmom[RAD] = self.rad() * scale;
        dmom[LAM] = self.lam() * scale;
        (dmom.transpose() * self.state.matrix() * dmom)[(0, 0)]
    }

    // ---------------------------------------------------------------------------------------------
    // Derivatives
    // ---------------------------------------------------------------------------------------------

    /// Sensitivity of the six parameters to an infinitesimal momentum change
    /// along a physical direction, together with the lab-frame unit vector of
    /// that direction at `time`.
    ///
    /// The polar-bend direction preserves the momentum magnitude and the
    /// position to first order; the azimuthal-bend direction preserves radius,
    /// wavelength and `t0`; the magnitude direction preserves the momentum
    /// direction.
    pub fn mom_deriv(&self, direction: MomDirection, time: Ns) -> (SVector<f64, 6>, Vector3<f64>) {
        let bval = self.beta();
        let omval = self.omega();
        let pb = self.pbar();
        let rad = self.rad();
        let lam = self.lam();
        let dt = time - self.t0();
        let phival = omval * dt + self.phi0();
        // unit normalization; the sign matters
        let norm = 1.0 / pb.copysign(self.mbar);

        let mut pder = SVector::<f64, 6>::zeros();
        let unit = match direction {
            MomDirection::PolarBend => {
                pder[RAD] = lam;
                pder[LAM] = -rad;
                pder[T0] = -dt * rad / lam;
                pder[PHI0] = -omval * dt * rad / lam;
                pder[CX] = -lam * phival.sin();
                pder[CY] = lam * phival.cos();
                Vector3::new(lam * phival.cos(), lam * phival.sin(), -rad) * norm
            }
            MomDirection::AzimuthalBend => {
                pder[PHI0] = 1.0_f64.copysign(omval) * pb / rad;
                pder[CX] = -1.0_f64.copysign(omval) * pb * phival.cos();
                pder[CY] = -1.0_f64.copysign(omval) * pb * phival.sin();
                Vector3::new(-phival.sin(), phival.cos(), 0.0)
            }
            MomDirection::Magnitude => {
                pder[RAD] = rad;
                pder[LAM] = lam;
                pder[T0] = dt * (1.0 - bval * bval);
                pder[PHI0] = omval * dt;
                pder[CX] = -rad * phival.sin();
                pder[CY] = rad * phival.cos();
                Vector3::new(rad * phival.cos(), rad * phival.sin(), lam) * norm
            }
        };
        (pder, self.rotate_out(unit))
    }

    /// Jacobian of the lab-frame position at `time` with respect to the six
    /// parameters, including the dependence of the angular velocity on radius
    /// and wavelength. This is the linearization matrix position-sensitive
    /// measurement constraints project through.
    pub fn position_deriv(&self, time: Ns) -> SMatrix<f64, 3, 6> {
        let rad = self.rad();
        let lam = self.lam();
        let om = self.omega();
        let ebar2 = self.ebar() * self.ebar();
        let dom_drad = -om * rad / ebar2;
        let dom_dlam = -om * lam / ebar2;
        let dt = time - self.t0();
        let phival = om * dt + self.phi0();
        let (sin_phi, cos_phi) = phival.sin_cos();

        let mut jac = SMatrix::<f64, 3, 6>::zeros();
        jac[(0, RAD)] = sin_phi + rad * cos_phi * dt * dom_drad;
        jac[(0, LAM)] = rad * cos_phi * dt * dom_dlam;
        jac[(0, CX)] = 1.0;
        jac[(0, PHI0)] = rad * cos_phi;
        jac[(0, T0)] = -rad * cos_phi * om;

        jac[(1, RAD)] = -cos_phi + rad * sin_phi * dt * dom_drad;
        jac[(1, LAM)] = rad * sin_phi * dt * dom_dlam;
        jac[(1, CY)] = 1.0;
        jac[(1, PHI0)] = rad * sin_phi;
        jac[(1, T0)] = -rad * sin_phi * om;

        jac[(2, RAD)] = dt * lam * dom_drad;
        jac[(2, LAM)] = om * dt + dt * lam * dom_dlam;
        jac[(2, T0)] = -om * lam;

        match &self.to_lab {
            Some(rot) => rot.matrix() * jac,
            None => jac,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Field-tolerance range adaptation
    // ---------------------------------------------------------------------------------------------

    /// Extend `drange.high` in fixed time steps while the spatial distortion
    /// caused by the true field deviating from the nominal field stays below
    /// `ptol` (mm). The step size is set by the direction tolerance `dtol`
    /// (radians). Greedy single pass: `drange.high` never decreases and never
    /// exceeds the trajectory's own validity bound.
    pub fn range_in_tolerance(
        &self,
        drange: &mut TimeRange,
        field: &dyn FieldSource,
        dtol: f64,
        ptol: f64,
    ) {
        if drange.high >= self.range.high {
            return;
        }
        let spd = self.speed();
        let sfac = spd * spd / (self.bnom.norm() * self.pbar());
        let tstep = dtol * self.ebar() / C_LIGHT;
        // accumulated spatial distortion estimate
        let mut dx: f64 = 0.0;
        while dx.abs() < ptol && drange.high < self.range.high {
            let tpos = self.position3(drange.high);
            let bvec = field.field_vector(&tpos);
            let dbvec = bvec - self.bnom;
            dx += sfac * drange.range() * tstep * dbvec.norm();
            drange.high += tstep;
        }
        drange.high = drange.high.min(self.range.high);
    }
}

impl fmt::Display for Helix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Helix {} parameters:", self.range)?;
        let diag = self.state.matrix().diagonal();
        for (name, unit, value, var) in izip!(
            PARAM_NAMES,
            PARAM_UNITS,
            self.state.vector().iter(),
            diag.iter()
        ) {
            write!(f, " {} {} {} +- {}", name, value, unit, var.abs().sqrt())?;
        }
        if self.to_lab.is_some() {
            write!(
                f,
                " with rotation around Bnom ({}, {}, {})",
                self.bnom.x, self.bnom.y, self.bnom.z
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod helix_test {
    use super::*;
    use crate::constants::ELECTRON_MASS;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    fn electron_mom4(px: f64, py: f64, pz: f64) -> FourMomentum {
        let energy =
            (px * px + py * py + pz * pz + ELECTRON_MASS * ELECTRON_MASS).sqrt();
        FourMomentum::new(px, py, pz, energy)
    }

    fn reference_helix() -> Helix {
        let pos = FourPosition::new(10.0, -20.0, 35.0, 1.5);
        let mom = electron_mom4(80.0, 60.0, 50.0);
        Helix::with_axial_field(pos, mom, -1, 1.0, TimeRange::new(-100.0, 100.0)).unwrap()
    }

    #[test]
    fn test_construction_rejects_bad_configurations() {
        let pos = FourPosition::new(0.0, 0.0, 0.0, 0.0);
        let mom = electron_mom4(100.0, 0.0, 50.0);
        let range = TimeRange::infinite();

        let neutral = Helix::with_axial_field(pos, mom, 0, 1.0, range);
        assert_eq!(neutral.unwrap_err(), KinFitError::ZeroCharge);

        let fieldless = Helix::new(pos, mom, -1, Vector3::zeros(), range);
        assert_eq!(fieldless.unwrap_err(), KinFitError::ZeroField);

        let tachyon = Helix::with_axial_field(
            pos,
            FourMomentum::new(100.0, 0.0, 0.0, 50.0),
            -1,
            1.0,
            range,
        );
        assert!(matches!(
            tachyon.unwrap_err(),
            KinFitError::UnphysicalMomentum { .. }
        ));
    }

    #[test]
    fn test_radius_magnitude_and_sign() {
        let pos = FourPosition::new(0.0, 0.0, 0.0, 0.0);
        let mom = electron_mom4(100.0, 0.0, 50.0);
        let helix =
            Helix::with_axial_field(pos, mom, -1, 1.0, TimeRange::infinite()).unwrap();

        // pt * 1000 / (|q| * B * c), sign positive for negative charge in +z field
        let expected = 100.0 * MEV_TO_MM / C_LIGHT;
        assert_relative_eq!(helix.rad(), expected, epsilon = 1e-10);
        assert_relative_eq!(helix.lam(), expected * 0.5, epsilon = 1e-10);
        assert_relative_eq!(helix.momentum_mag(), (100.0f64 * 100.0 + 50.0 * 50.0).sqrt(), epsilon = 1e-10);
    }

    #[test]
    fn test_phase_space_round_trip() {
        let pos = FourPosition::new(10.0, -20.0, 35.0, 1.5);
        let mom = electron_mom4(80.0, 60.0, 50.0);
        let helix = Helix::with_axial_field(pos, mom, -1, 1.0, TimeRange::infinite()).unwrap();

        assert_relative_eq!(helix.position3(1.5), pos.xyz(), epsilon = 1e-9);
        assert_relative_eq!(helix.momentum3(1.5), mom.xyz(), epsilon = 1e-9);
        assert_relative_eq!(helix.momentum4(1.5)[3], mom[3], epsilon = 1e-9);
        assert_relative_eq!(helix.mass(), ELECTRON_MASS, epsilon = 1e-9);
    }

    #[test]
    fn test_round_trip_with_rotated_field() {
        let pos = FourPosition::new(-5.0, 12.0, 40.0, 0.7);
        let mom = electron_mom4(70.0, -30.0, 90.0);
        let bnom = Vector3::new(0.2, -0.1, 1.0);
        let helix = Helix::new(pos, mom, 1, bnom, TimeRange::infinite()).unwrap();

        assert_relative_eq!(helix.position3(0.7), pos.xyz(), epsilon = 1e-8);
        assert_relative_eq!(helix.momentum3(0.7), mom.xyz(), epsilon = 1e-8);

        // velocity and direction are colinear with the momentum
        let dir = helix.direction(0.7);
        assert_relative_eq!(dir, mom.xyz().normalize(), epsilon = 1e-9);
        let vel = helix.velocity(0.7);
        assert_relative_eq!(vel.norm(), helix.speed(), epsilon = 1e-9);
    }

    #[test]
    fn test_field_alignment_is_verified() {
        // a heavily tilted field still aligns exactly after rotation
        let bnom = Vector3::new(1.0, 1.0, 0.2);
        let pos = FourPosition::new(0.0, 0.0, 0.0, 0.0);
        let mom = electron_mom4(100.0, 0.0, 50.0);
        let helix = Helix::new(pos, mom, -1, bnom, TimeRange::infinite()).unwrap();
        assert_relative_eq!(helix.position3(0.0), pos.xyz(), epsilon = 1e-8);
    }

    #[test]
    fn test_winding_disambiguation() {
        // start the helix several wavelengths away from the z=0 plane
        let mom = electron_mom4(100.0, -40.0, 30.0);
        let probe = Helix::with_axial_field(
            FourPosition::new(0.0, 0.0, 0.0, 0.0),
            mom,
            -1,
            1.0,
            TimeRange::infinite(),
        )
        .unwrap();
        let wavelength = probe.lam().abs() * DPI;
        let pos = FourPosition::new(25.0, -10.0, 4.3 * wavelength, 2.0);
        let helix =
            Helix::with_axial_field(pos, mom, -1, 1.0, TimeRange::new(-500.0, 500.0)).unwrap();

        assert!(helix.phi0().abs() <= std::f64::consts::PI + 1e-12);
        assert_relative_eq!(helix.position3(2.0), pos.xyz(), epsilon = 1e-8);

        // position stays continuous over the full validity range
        let mut previous = helix.position3(helix.range().low);
        let step = 0.05;
        let mut time = helix.range().low + step;
        let bound = helix.speed() * step * 1.0001;
        while time <= helix.range().high {
            let current = helix.position3(time);
            assert!((current - previous).norm() <= bound);
            previous = current;
            time += step;
        }
    }

    #[test]
    fn test_ztime_inverts_z_position() {
        let helix = reference_helix();
        let time = 7.3;
        let z = helix.position3(time).z;
        assert_relative_eq!(helix.ztime(z), time, epsilon = 1e-9);
    }

    #[test]
    fn test_deriv_directions_against_momentum() {
        let helix = reference_helix();
        for time in [-40.0, 1.5, 63.0] {
            let dir = helix.direction(time);
            let (_, polar) = helix.mom_deriv(MomDirection::PolarBend, time);
            let (_, azimuthal) = helix.mom_deriv(MomDirection::AzimuthalBend, time);
            let (_, magnitude) = helix.mom_deriv(MomDirection::Magnitude, time);

            assert_relative_eq!(polar.norm(), 1.0, epsilon = 1e-12);
            assert_relative_eq!(azimuthal.norm(), 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(polar.dot(&dir), 0.0, epsilon = 1e-12);
            assert_abs_diff_eq!(azimuthal.dot(&dir), 0.0, epsilon = 1e-12);
            assert_relative_eq!(magnitude, dir, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_deriv_first_order_invariants() {
        let helix = reference_helix();
        let time = 12.0;

        // polar bend preserves the momentum magnitude: pbar d(pbar) = rad drad + lam dlam = 0
        let (polar, _) = helix.mom_deriv(MomDirection::PolarBend, time);
        assert_abs_diff_eq!(
            helix.rad() * polar[RAD] + helix.lam() * polar[LAM],
            0.0,
            epsilon = 1e-9
        );

        // azimuthal bend leaves radius, wavelength and t0 unchanged
        let (azimuthal, _) = helix.mom_deriv(MomDirection::AzimuthalBend, time);
        assert_eq!(azimuthal[RAD], 0.0);
        assert_eq!(azimuthal[LAM], 0.0);
        assert_eq!(azimuthal[T0], 0.0);

        // magnitude change scales radius and wavelength proportionally
        let (magnitude, _) = helix.mom_deriv(MomDirection::Magnitude, time);
        assert_relative_eq!(magnitude[RAD], helix.rad(), epsilon = 1e-12);
        assert_relative_eq!(magnitude[LAM], helix.lam(), epsilon = 1e-12);
    }

    #[test]
    fn test_position_deriv_matches_finite_differences() {
        let helix = reference_helix();
        let time = 17.0;
        let jac = helix.position_deriv(time);

        let eps = 1e-6;
        for ipar in 0..6 {
            let mut vector = *helix.params().vector();
            vector[ipar] += eps;
            let shifted = Helix::from_state(
                FitState::from_vector(vector),
                helix.mass(),
                helix.charge(),
                *helix.bnom(),
                *helix.range(),
            )
            .unwrap();
            let numeric = (shifted.position3(time) - helix.position3(time)) / eps;
            for row in 0..3 {
                assert_abs_diff_eq!(jac[(row, ipar)], numeric[row], epsilon = 1e-4);
            }
        }
    }

    #[test]
    fn test_momentum_variance_from_covariance() {
        let mut matrix = SMatrix::<f64, 6, 6>::zeros();
        matrix[(RAD, RAD)] = 4.0;
        matrix[(LAM, LAM)] = 1.0;
        let reference = reference_helix();
        let state = FitState::new(*reference.params().vector(), matrix);
        let helix = Helix::from_state(
            state,
            reference.mass(),
            reference.charge(),
            *reference.bnom(),
            *reference.range(),
        )
        .unwrap();

        let scale = helix.mass() / (helix.pbar() * helix.mbar());
        let expected = (helix.rad() * scale).powi(2) * 4.0 + (helix.lam() * scale).powi(2);
        assert_relative_eq!(helix.momentum_variance(), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_t0_refinement() {
        let mut helix = reference_helix();
        let shifted = helix.t0() + 0.25;
        *helix.t0_mut() = shifted;
        assert_eq!(helix.t0(), shifted);
    }

    #[test]
    fn test_parameter_tables_match_dimension() {
        assert_eq!(PARAM_NAMES.len(), 6);
        assert_eq!(PARAM_UNITS.len(), 6);
        assert_eq!(PARAM_TITLES.len(), 6);
        assert_eq!(PARAM_NAMES[RAD], "Radius");
        assert_eq!(PARAM_NAMES[T0], "Time0");
        assert_eq!(PARAM_UNITS[PHI0], "radians");
        assert_eq!(PARAM_TITLES[LAM], "Longitudinal Wavelength");
    }

    #[test]
    fn test_display_lists_all_parameters() {
        let rendered = format!("{}", reference_helix());
        for name in PARAM_NAMES {
            assert!(rendered.contains(name));
        }
    }
}
