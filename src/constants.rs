//! # Constants and type definitions for kinfit
//!
//! This module centralizes the **physical constants**, **conversion factors**, and **common type
//! definitions** used throughout the `kinfit` library.
//!
//! ## Overview
//!
//! - Physical constants in tracker units (mm, ns, MeV, Tesla)
//! - Momentum ↔ curvature conversion for helical parametrizations
//! - Core type aliases used across the crate
//!
//! These definitions are used by all main modules, including the trajectory model,
//! the state containers, and the measurement constraints.

use nalgebra::Vector4;

// -------------------------------------------------------------------------------------------------
// Physical constants and unit conversions
// -------------------------------------------------------------------------------------------------

/// 2π, useful for trigonometric conversions
pub const DPI: f64 = 2. * std::f64::consts::PI;

/// Speed of light in mm/ns
pub const C_LIGHT: f64 = 299.792458;

/// Conversion factor from MeV/c to mm of curvature radius, for a field in Tesla.
///
/// The full momentum-to-radius factor is `MEV_TO_MM / (charge * B * C_LIGHT)`,
/// signed by the particle charge.
pub const MEV_TO_MM: f64 = 1000.0;

/// Maximum polar angle (radians) tolerated between the nominal field and the
/// working z-axis after frame alignment.
pub const FIELD_ALIGN_TOL: f64 = 1.0e-6;

/// Electron mass in MeV/c²
pub const ELECTRON_MASS: f64 = 0.51099891;

// -------------------------------------------------------------------------------------------------
// Type aliases
// -------------------------------------------------------------------------------------------------

/// Length in millimeters
pub type Mm = f64;
/// Time in nanoseconds
pub type Ns = f64;
/// Angle in radians
pub type Radian = f64;
/// Energy or momentum magnitude in MeV (c = 1 conventions)
pub type MeV = f64;
/// Magnetic field strength in Tesla
pub type Tesla = f64;

/// Space-time point (x, y, z, t) in (mm, mm, mm, ns)
pub type FourPosition = Vector4<f64>;

/// Four-momentum (px, py, pz, E) in MeV
pub type FourMomentum = Vector4<f64>;
