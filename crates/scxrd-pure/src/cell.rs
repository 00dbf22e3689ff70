//! Real-space unit cells from UB matrices.
//!
//! The stored UB matrix is dimensionless; dividing by the wavelength gives
//! reciprocal-space units (Å⁻¹). The Cholesky factor of `(UB)ᵀ·UB` is the
//! upper-triangular B matrix, from which the reciprocal cell and then the
//! direct cell follow.

use core::f64::consts::PI;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::matrix::{Mat3, SINGULAR_EPSILON};

/// Mo Kα wavelength in Å.
pub const MO_K_ALPHA: f64 = 0.71073;
/// Cu Kα wavelength in Å.
pub const CU_K_ALPHA: f64 = 1.5418;
/// Wavelength assumed when none is given.
pub const DEFAULT_WAVELENGTH: f64 = MO_K_ALPHA;

/// Nine UB components, row-major.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UbMatrix(pub [f64; 9]);

impl UbMatrix {
    pub fn new(values: [f64; 9]) -> Self {
        UbMatrix(values)
    }

    pub fn to_mat3(&self) -> Mat3 {
        Mat3::from_row_major(&self.0)
    }
}

impl From<[f64; 9]> for UbMatrix {
    fn from(values: [f64; 9]) -> Self {
        UbMatrix(values)
    }
}

/// Direct-space cell: edges in Å, angles in degrees, volume in Å³.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CellParameters {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub volume: f64,
}

impl CellParameters {
    /// Build a cell and compute its volume from the six parameters.
    pub fn new(a: f64, b: f64, c: f64, alpha: f64, beta: f64, gamma: f64) -> Self {
        CellParameters {
            a,
            b,
            c,
            alpha,
            beta,
            gamma,
            volume: Self::volume_from_parameters(a, b, c, alpha, beta, gamma),
        }
    }

    /// `[a, b, c, alpha, beta, gamma]`.
    pub fn as_array(&self) -> [f64; 6] {
        [self.a, self.b, self.c, self.alpha, self.beta, self.gamma]
    }

    /// All six parameters are finite and positive, and angles are below 180°.
    pub fn is_valid(&self) -> bool {
        let lengths_ok = [self.a, self.b, self.c]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0);
        let angles_ok = [self.alpha, self.beta, self.gamma]
            .iter()
            .all(|v| v.is_finite() && *v > 0.0 && *v < 180.0);
        lengths_ok && angles_ok
    }

    /// Triclinic cell volume.
    pub fn volume_from_parameters(
        a: f64,
        b: f64,
        c: f64,
        alpha: f64,
        beta: f64,
        gamma: f64,
    ) -> f64 {
        let (ca, cb, cg) = (
            libm::cos(alpha.to_radians()),
            libm::cos(beta.to_radians()),
            libm::cos(gamma.to_radians()),
        );
        let root = 1.0 - ca * ca - cb * cb - cg * cg + 2.0 * ca * cb * cg;
        a * b * c * libm::sqrt(root.max(0.0))
    }
}

fn clamp_cos(v: f64) -> f64 {
    v.clamp(-1.0, 1.0)
}

fn degrees(cos: f64) -> f64 {
    libm::acos(clamp_cos(cos)) * 180.0 / PI
}

/// Resolve the direct cell of `ub` at `wavelength` Å.
///
/// Returns `None` for a non-positive wavelength or a degenerate matrix.
pub fn ub_to_cell(ub: &UbMatrix, wavelength: f64) -> Option<CellParameters> {
    if !wavelength.is_finite() || wavelength <= 0.0 {
        debug!(wavelength, "wavelength must be positive");
        return None;
    }
    let ub = ub.to_mat3().scale(1.0 / wavelength);

    let Some(l) = (ub.transpose() * ub).cholesky() else {
        debug!("UBᵀ·UB is not positive definite");
        return None;
    };
    let b = l.transpose().0;

    let a_star = b[0][0];
    let b_star = libm::sqrt(b[0][1] * b[0][1] + b[1][1] * b[1][1]);
    let c_star = libm::sqrt(b[0][2] * b[0][2] + b[1][2] * b[1][2] + b[2][2] * b[2][2]);
    if a_star <= 0.0 || b_star <= 0.0 || c_star <= 0.0 {
        debug!(a_star, b_star, c_star, "non-positive reciprocal edge");
        return None;
    }

    let cos_gamma_star = b[0][1] / b_star;
    let sin_gamma_star = b[1][1] / b_star;
    let cos_beta_star = b[0][2] / c_star;
    let sin_beta_star = libm::sqrt(b[1][2] * b[1][2] + b[2][2] * b[2][2]) / c_star;
    if libm::fabs(sin_beta_star) < SINGULAR_EPSILON {
        debug!("reciprocal beta angle is degenerate");
        return None;
    }

    let cos_alpha = clamp_cos(-b[1][2] / (c_star * sin_beta_star));
    let cos_alpha_star =
        clamp_cos(cos_beta_star * cos_gamma_star - cos_alpha * sin_beta_star * sin_gamma_star);
    let sin_alpha_star = libm::sqrt(1.0 - cos_alpha_star * cos_alpha_star);

    let volume_star = a_star
        * b_star
        * c_star
        * libm::sqrt(
            1.0 - cos_alpha_star * cos_alpha_star - cos_beta_star * cos_beta_star
                - cos_gamma_star * cos_gamma_star
                + 2.0 * cos_alpha_star * cos_beta_star * cos_gamma_star,
        );
    if !volume_star.is_finite() || libm::fabs(volume_star) < SINGULAR_EPSILON {
        debug!(volume_star, "reciprocal cell volume is degenerate");
        return None;
    }

    let cos_beta =
        (cos_alpha_star * cos_gamma_star - cos_beta_star) / (sin_alpha_star * sin_gamma_star);
    let cos_gamma =
        (cos_alpha_star * cos_beta_star - cos_gamma_star) / (sin_alpha_star * sin_beta_star);

    let cell = CellParameters {
        a: b_star * c_star * sin_alpha_star / volume_star,
        b: a_star * c_star * sin_beta_star / volume_star,
        c: a_star * b_star * sin_gamma_star / volume_star,
        alpha: degrees(cos_alpha),
        beta: degrees(cos_beta),
        gamma: degrees(cos_gamma),
        volume: 1.0 / volume_star,
    };
    if cell.as_array().iter().any(|v| !v.is_finite()) {
        debug!(?cell, "cell has non-finite parameters");
        return None;
    }
    Some(cell)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cubic_identity_cell() {
        let ub = UbMatrix::from(Mat3::diagonal(0.1, 0.1, 0.1).0.concat_rows());
        let cell = ub_to_cell(&ub, 1.0).unwrap();
        assert_relative_eq!(cell.a, 10.0, epsilon = 1e-9);
        assert_relative_eq!(cell.b, 10.0, epsilon = 1e-9);
        assert_relative_eq!(cell.c, 10.0, epsilon = 1e-9);
        assert_relative_eq!(cell.alpha, 90.0, epsilon = 1e-9);
        assert_relative_eq!(cell.beta, 90.0, epsilon = 1e-9);
        assert_relative_eq!(cell.gamma, 90.0, epsilon = 1e-9);
        assert_relative_eq!(cell.volume, 1000.0, epsilon = 1e-6);
    }

    #[test]
    fn wavelength_scales_edges() {
        let ub = UbMatrix([0.1, 0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0, 0.1]);
        let cell = ub_to_cell(&ub, MO_K_ALPHA).unwrap();
        assert_relative_eq!(cell.a, 10.0 * MO_K_ALPHA, epsilon = 1e-9);
    }

    #[test]
    fn zero_row_is_undetermined() {
        let ub = UbMatrix([0.1, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.1]);
        assert!(ub_to_cell(&ub, 1.0).is_none());
    }

    #[test]
    fn bad_wavelength_is_undetermined() {
        let ub = UbMatrix([0.1, 0.0, 0.0, 0.0, 0.1, 0.0, 0.0, 0.0, 0.1]);
        assert!(ub_to_cell(&ub, 0.0).is_none());
        assert!(ub_to_cell(&ub, -1.0).is_none());
        assert!(ub_to_cell(&ub, f64::NAN).is_none());
    }

    #[test]
    fn monoclinic_cell_recovered() {
        // Reciprocal basis of a=8, b=10, c=12, beta=100°.
        let beta = 100f64.to_radians();
        let (a, b, c) = (8.0, 10.0, 12.0);
        let direct = Mat3([
            [a, 0.0, c * libm::cos(beta)],
            [0.0, b, 0.0],
            [0.0, 0.0, c * libm::sin(beta)],
        ]);
        // Columns of UB are the reciprocal basis vectors.
        let recip = direct.inverse().unwrap().transpose();
        let ub = UbMatrix::from(recip.0.concat_rows());
        let cell = ub_to_cell(&ub, 1.0).unwrap();
        assert_relative_eq!(cell.a, a, epsilon = 1e-9);
        assert_relative_eq!(cell.b, b, epsilon = 1e-9);
        assert_relative_eq!(cell.c, c, epsilon = 1e-9);
        assert_relative_eq!(cell.alpha, 90.0, epsilon = 1e-9);
        assert_relative_eq!(cell.beta, 100.0, epsilon = 1e-9);
        assert_relative_eq!(cell.gamma, 90.0, epsilon = 1e-9);
        assert_relative_eq!(
            cell.volume,
            CellParameters::volume_from_parameters(a, b, c, 90.0, 100.0, 90.0),
            epsilon = 1e-6
        );
    }

    #[test]
    fn cell_helpers() {
        let cell = CellParameters::new(5.0, 5.0, 5.0, 90.0, 90.0, 90.0);
        assert_relative_eq!(cell.volume, 125.0, epsilon = 1e-9);
        assert_eq!(cell.as_array(), [5.0, 5.0, 5.0, 90.0, 90.0, 90.0]);
        assert!(cell.is_valid());
        assert!(!CellParameters::new(0.0, 5.0, 5.0, 90.0, 90.0, 90.0).is_valid());
        assert!(!CellParameters::new(5.0, 5.0, 5.0, 180.0, 90.0, 90.0).is_valid());
    }

    trait ConcatRows {
        fn concat_rows(&self) -> [f64; 9];
    }

    impl ConcatRows for [[f64; 3]; 3] {
        fn concat_rows(&self) -> [f64; 9] {
            let m = self;
            [
                m[0][0], m[0][1], m[0][2], m[1][0], m[1][1], m[1][2], m[2][0], m[2][1], m[2][2],
            ]
        }
    }
}
