use nalgebra::{Matrix3, Vector3};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PbcError {
    #[error("Periodic box is poorly defined: determinant {determinant} (matrix must be finite and non-singular)")]
    PoorDefined { determinant: f64 },
}

/// A (possibly triclinic) periodic simulation box.
///
/// The box vectors are the **columns** of `matrix`, so fractional coordinates are
/// `inverse * r` and Cartesian coordinates are `matrix * s`.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicBox {
    matrix: Matrix3<f64>,
    inverse: Matrix3<f64>,
}

impl PeriodicBox {
    pub fn new(matrix: Matrix3<f64>) -> Result<Self, PbcError> {
        let determinant = matrix.determinant();
        let scale: f64 = matrix.column_iter().map(|c| c.norm()).product();
        if !determinant.is_finite() || determinant.abs() <= f64::EPSILON * scale.max(f64::MIN_POSITIVE) {
            return Err(PbcError::PoorDefined { determinant });
        }
        let inverse = matrix
            .try_inverse()
            .ok_or(PbcError::PoorDefined { determinant })?;
        Ok(Self { matrix, inverse })
    }

    pub fn orthorhombic(lx: f64, ly: f64, lz: f64) -> Result<Self, PbcError> {
        Self::new(Matrix3::from_diagonal(&Vector3::new(lx, ly, lz)))
    }

    pub fn cubic(edge: f64) -> Result<Self, PbcError> {
        Self::orthorhombic(edge, edge, edge)
    }

    pub fn matrix(&self) -> &Matrix3<f64> {
        &self.matrix
    }

    pub fn inverse(&self) -> &Matrix3<f64> {
        &self.inverse
    }

    pub fn volume(&self) -> f64 {
        self.matrix.determinant().abs()
    }

    #[inline]
    pub fn to_fractional(&self, position: &Vector3<f64>) -> Vector3<f64> {
        self.inverse * position
    }

    /// Maps a position into the primary image `matrix * [0, 1)³`.
    #[inline]
    pub fn wrap(&self, position: &Vector3<f64>) -> Vector3<f64> {
        let fractional = self.to_fractional(position);
        self.matrix * fractional.map(|s| s - s.floor())
    }

    /// Shortest periodic image of a displacement vector.
    #[inline]
    pub fn minimum_image(&self, displacement: &Vector3<f64>) -> Vector3<f64> {
        let fractional = self.to_fractional(displacement);
        self.matrix * fractional.map(|s| s - s.round())
    }

    /// Distances between opposite faces of the box, one per box vector.
    pub fn perpendicular_widths(&self) -> Vector3<f64> {
        let a = self.matrix.column(0).into_owned();
        let b = self.matrix.column(1).into_owned();
        let c = self.matrix.column(2).into_owned();
        let volume = self.volume();
        Vector3::new(
            volume / b.cross(&c).norm(),
            volume / c.cross(&a).norm(),
            volume / a.cross(&b).norm(),
        )
    }
}
