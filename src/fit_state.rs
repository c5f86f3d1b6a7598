//! # Gaussian fit state in parameter or weight form
//!
//! A [`FitState`] is the data payload of the kinematic Kalman fit: a fixed-dimension
//! vector together with a symmetric matrix, tagged with the **form** it currently
//! represents.
//!
//! - **Parameter form**: the vector is a mean, the matrix its covariance. This is the
//!   form a trajectory is expressed in.
//! - **Weight form**: the vector is an information vector, the matrix an inverse
//!   covariance. This is the form measurement constraints are expressed in, and the
//!   form in which constraints are accumulated by summation.
//!
//! The two forms are mathematically dual: `weight = covariance⁻¹` and
//! `weight_vector = weight * mean`. [`FitState::invert`] switches between them in
//! place. A singular matrix makes the conversion fail *recoverably*: the state is
//! flagged [`Status::Invalid`] and left otherwise untouched, because singular weight
//! matrices occur routinely while a fit converges and must not abort it.

use nalgebra::{SMatrix, SVector};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign};

/// Which dual form the (vector, matrix) pair currently represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Mean vector and covariance matrix.
    Parameter,
    /// Information vector and weight (inverse covariance) matrix.
    Weight,
}

impl Mode {
    fn toggled(self) -> Self {
        match self {
            Mode::Parameter => Mode::Weight,
            Mode::Weight => Mode::Parameter,
        }
    }
}

/// Whether the content of a state can be trusted.
///
/// A failed duality conversion marks the state `Invalid`; consumers must check
/// before using the content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Valid,
    Invalid,
}

/// Gaussian estimate of a `D`-dimensional quantity, in parameter or weight form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FitState<const D: usize> {
    vector: SVector<f64, D>,
    matrix: SMatrix<f64, D, D>,
    mode: Mode,
    status: Status,
}

impl<const D: usize> FitState<D> {
    /// Parameter-form state from a mean vector and covariance matrix.
    pub fn new(vector: SVector<f64, D>, matrix: SMatrix<f64, D, D>) -> Self {
        Self::with_mode(vector, matrix, Mode::Parameter)
    }

    /// State from an explicit vector, matrix and form tag.
    pub fn with_mode(vector: SVector<f64, D>, matrix: SMatrix<f64, D, D>, mode: Mode) -> Self {
        Self {
            vector,
            matrix,
            mode,
            status: Status::Valid,
        }
    }

    /// Parameter-form state from a vector alone; the matrix is left zero.
    pub fn from_vector(vector: SVector<f64, D>) -> Self {
        Self::with_mode(vector, SMatrix::zeros(), Mode::Parameter)
    }

    /// Empty state carrying only a form tag.
    pub fn zero(mode: Mode) -> Self {
        Self::with_mode(SVector::zeros(), SMatrix::zeros(), mode)
    }

    pub fn vector(&self) -> &SVector<f64, D> {
        &self.vector
    }

    pub fn matrix(&self) -> &SMatrix<f64, D, D> {
        &self.matrix
    }

    /// Mutable vector access, reserved for trajectory-side recalibration.
    pub(crate) fn vector_mut(&mut self) -> &mut SVector<f64, D> {
        &mut self.vector
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn status(&self) -> Status {
        self.status
    }

    pub fn is_valid(&self) -> bool {
        self.status == Status::Valid
    }

    /// Switch between parameter and weight form in place.
    ///
    /// On success the matrix is replaced by its inverse, the vector by the
    /// product of the *new* matrix with the *old* vector, the form tag is
    /// toggled and the status is (re)set to [`Status::Valid`].
    ///
    /// On a singular matrix the conversion fails recoverably: the status is set
    /// to [`Status::Invalid`], vector, matrix and form tag are left untouched,
    /// and `false` is returned. Callers must check before trusting the content.
    pub fn invert(&mut self) -> bool {
        match self.matrix.try_inverse() {
            Some(inverse) => {
                self.matrix = inverse;
                self.vector = self.matrix * self.vector;
                self.mode = self.mode.toggled();
                self.status = Status::Valid;
                true
            }
            None => {
                self.status = Status::Invalid;
                false
            }
        }
    }

    /// Dual view of this state, produced without mutating it.
    ///
    /// The copy and the conversion are a single step, so no half-converted
    /// intermediate is ever observable. Check the status of the result.
    pub fn inverted(&self) -> Self {
        let mut dual = self.clone();
        dual.invert();
        dual
    }

    /// Replace this state with the inverted copy of `other`.
    pub fn invert_from(&mut self, other: &Self) {
        *self = other.inverted();
    }
}

/// Accumulation of same-form states, the reduction primitive of the fit:
/// constraints in weight form add element-wise.
impl<const D: usize> AddAssign<&FitState<D>> for FitState<D> {
    fn add_assign(&mut self, rhs: &FitState<D>) {
        debug_assert_eq!(self.mode, rhs.mode, "cannot accumulate mixed-form states");
        self.vector += rhs.vector;
        self.matrix += rhs.matrix;
        if rhs.status == Status::Invalid {
            self.status = Status::Invalid;
        }
    }
}

impl<const D: usize> Add<&FitState<D>> for FitState<D> {
    type Output = FitState<D>;

    fn add(mut self, rhs: &FitState<D>) -> FitState<D> {
        self += rhs;
        self
    }
}

impl<const D: usize> fmt::Display for FitState<D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.mode {
            Mode::Parameter => "parameters",
            Mode::Weight => "weights",
        };
        write!(f, "{:?} {} [", self.status, label)?;
        for (i, value) in self.vector.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} +- {}", value, self.matrix[(i, i)].abs().sqrt())?;
        }
        write!(f, "]")
    }
}
