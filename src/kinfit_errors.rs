use thiserror::Error;

/// Errors raised when a trajectory or constraint is built from an invalid
/// configuration.
///
/// These are rejected-at-construction failures: an `Err` means the object must
/// not be used. Singular matrices encountered *during* a fit are not errors;
/// they are reported through [`Status::Invalid`](crate::fit_state::Status) on
/// the affected [`FitState`](crate::fit_state::FitState) so the fit loop can
/// recover.
#[derive(Error, Debug)]
pub enum KinFitError {
    #[error("nominal field does not align with the working z-axis after rotation (residual polar angle {0} rad)")]
    MisalignedField(f64),

    #[error("a helical parametrization requires a non-zero particle charge")]
    ZeroCharge,

    #[error("a helical parametrization requires a non-zero nominal field magnitude")]
    ZeroField,

    #[error("unphysical four-momentum: energy {energy} MeV below momentum {momentum} MeV/c")]
    UnphysicalMomentum { energy: f64, momentum: f64 },
}

impl PartialEq for KinFitError {
    fn eq(&self, other: &Self) -> bool {
        use KinFitError::*;
        match (self, other) {
            (MisalignedField(a), MisalignedField(b)) => a == b,
            (ZeroCharge, ZeroCharge) => true,
            (ZeroField, ZeroField) => true,
            (
                UnphysicalMomentum {
                    energy: e1,
                    momentum: p1,
                },
                UnphysicalMomentum {
                    energy: e2,
                    momentum: p2,
                },
            ) => e1 == e2 && p1 == p2,
            _ => false,
        }
    }
}
