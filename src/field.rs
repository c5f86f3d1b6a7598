use nalgebra::Vector3;

use crate::constants::Mm;

/// Read-only magnetic field lookup.
///
/// Implementations are assumed stateless (or at least pure) for the duration of
/// a query loop: [`Helix::range_in_tolerance`](crate::helix::Helix::range_in_tolerance)
/// samples the field repeatedly along a trajectory and relies on consistent
/// answers.
pub trait FieldSource {
    /// Field vector in Tesla at a lab-frame position in mm.
    fn field_vector(&self, position: &Vector3<Mm>) -> Vector3<f64>;
}

/// Spatially constant field, the reference implementation used for nominal
/// field configurations and fit setups without a measured field map.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UniformField {
    field: Vector3<f64>,
}

impl UniformField {
    pub fn new(field: Vector3<f64>) -> Self {
        Self { field }
    }

    /// Field of magnitude `bz` Tesla along the z-axis.
    pub fn axial(bz: f64) -> Self {
        Self::new(Vector3::new(0.0, 0.0, bz))
    }
}

impl FieldSource for UniformField {
    fn field_vector(&self, _position: &Vector3<Mm>) -> Vector3<f64> {
        self.field
    }
}
