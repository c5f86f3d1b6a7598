use kinfit::constants::{FourMomentum, FourPosition, ELECTRON_MASS};
use kinfit::helix::Helix;
use kinfit::time_range::TimeRange;
use nalgebra::Vector3;

/// Four-momentum of an electron with the given momentum components (MeV/c).
pub fn electron_mom4(px: f64, py: f64, pz: f64) -> FourMomentum {
    let energy = (px * px + py * py + pz * pz + ELECTRON_MASS * ELECTRON_MASS).sqrt();
    FourMomentum::new(px, py, pz, energy)
}

/// Reference electron trajectory in a 1 Tesla axial field.
pub fn truth_helix() -> Helix {
    Helix::new(
        FourPosition::new(10.0, -20.0, 35.0, 1.5),
        electron_mom4(80.0, 60.0, 50.0),
        -1,
        Vector3::new(0.0, 0.0, 1.0),
        TimeRange::new(-100.0, 100.0),
    )
    .unwrap()
}
