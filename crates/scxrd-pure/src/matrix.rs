//! Fixed-size 3×3 matrix arithmetic for UB-matrix work.

use core::ops::Mul;

use serde::{Deserialize, Serialize};

/// Determinants and Cholesky divisors smaller than this are treated as zero.
pub const SINGULAR_EPSILON: f64 = 1e-10;

/// A row-major 3×3 matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mat3(pub [[f64; 3]; 3]);

impl Mat3 {
    pub const IDENTITY: Mat3 = Mat3([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]]);

    /// Build from nine row-major values.
    pub fn from_row_major(v: &[f64; 9]) -> Self {
        Mat3([[v[0], v[1], v[2]], [v[3], v[4], v[5]], [v[6], v[7], v[8]]])
    }

    pub fn diagonal(a: f64, b: f64, c: f64) -> Self {
        Mat3([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]])
    }

    pub fn transpose(&self) -> Self {
        let m = &self.0;
        Mat3([
            [m[0][0], m[1][0], m[2][0]],
            [m[0][1], m[1][1], m[2][1]],
            [m[0][2], m[1][2], m[2][2]],
        ])
    }

    /// Multiply every element by `s`.
    pub fn scale(&self, s: f64) -> Self {
        let mut out = self.0;
        for v in out.iter_mut().flatten() {
            *v *= s;
        }
        Mat3(out)
    }

    pub fn mul_vec(&self, v: [f64; 3]) -> [f64; 3] {
        let m = &self.0;
        [
            m[0][0] * v[0] + m[0][1] * v[1] + m[0][2] * v[2],
            m[1][0] * v[0] + m[1][1] * v[1] + m[1][2] * v[2],
            m[2][0] * v[0] + m[2][1] * v[1] + m[2][2] * v[2],
        ]
    }

    pub fn determinant(&self) -> f64 {
        let m = &self.0;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// Inverse via the adjugate, or `None` when `|det| < SINGULAR_EPSILON`.
    pub fn inverse(&self) -> Option<Self> {
        let det = self.determinant();
        if !det.is_finite() || libm::fabs(det) < SINGULAR_EPSILON {
            return None;
        }
        let m = &self.0;
        let adj = [
            [
                m[1][1] * m[2][2] - m[1][2] * m[2][1],
                m[0][2] * m[2][1] - m[0][1] * m[2][2],
                m[0][1] * m[1][2] - m[0][2] * m[1][1],
            ],
            [
                m[1][2] * m[2][0] - m[1][0] * m[2][2],
                m[0][0] * m[2][2] - m[0][2] * m[2][0],
                m[0][2] * m[1][0] - m[0][0] * m[1][2],
            ],
            [
                m[1][0] * m[2][1] - m[1][1] * m[2][0],
                m[0][1] * m[2][0] - m[0][0] * m[2][1],
                m[0][0] * m[1][1] - m[0][1] * m[1][0],
            ],
        ];
        Some(Mat3(adj).scale(1.0 / det))
    }

    /// Lower-triangular `L` with `self = L·Lᵀ`.
    ///
    /// Returns `None` unless the matrix is positive definite: every pivot must
    /// be positive and every divisor at least [`SINGULAR_EPSILON`] in magnitude.
    pub fn cholesky(&self) -> Option<Self> {
        let a = &self.0;
        let mut l = [[0.0f64; 3]; 3];
        for i in 0..3 {
            for j in 0..=i {
                let sum: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
                if i == j {
                    let pivot = a[i][i] - sum;
                    if pivot.is_nan() || pivot <= 0.0 {
                        return None;
                    }
                    l[i][j] = libm::sqrt(pivot);
                } else {
                    if libm::fabs(l[j][j]) < SINGULAR_EPSILON {
                        return None;
                    }
                    l[i][j] = (a[i][j] - sum) / l[j][j];
                }
            }
        }
        Some(Mat3(l))
    }
}

impl Mul for Mat3 {
    type Output = Mat3;

    fn mul(self, rhs: Mat3) -> Mat3 {
        let (a, b) = (&self.0, &rhs.0);
        let mut out = [[0.0f64; 3]; 3];
        for (i, row) in out.iter_mut().enumerate() {
            for (j, v) in row.iter_mut().enumerate() {
                *v = a[i][0] * b[0][j] + a[i][1] * b[1][j] + a[i][2] * b[2][j];
            }
        }
        Mat3(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn assert_mat_eq(a: &Mat3, b: &Mat3) {
        for i in 0..3 {
            for j in 0..3 {
                assert_relative_eq!(a.0[i][j], b.0[i][j], epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn determinant_of_diagonal() {
        assert_eq!(Mat3::diagonal(2.0, 3.0, 4.0).determinant(), 24.0);
        assert_eq!(Mat3::IDENTITY.determinant(), 1.0);
    }

    #[test]
    fn inverse_times_self_is_identity() {
        let m = Mat3([[2.0, 1.0, 0.5], [0.0, 3.0, -1.0], [1.0, 0.0, 4.0]]);
        let inv = m.inverse().unwrap();
        assert_mat_eq(&(m * inv), &Mat3::IDENTITY);
        assert_mat_eq(&(inv * m), &Mat3::IDENTITY);
    }

    #[test]
    fn singular_has_no_inverse() {
        let m = Mat3([[1.0, 2.0, 3.0], [2.0, 4.0, 6.0], [0.0, 1.0, 1.0]]);
        assert!(m.inverse().is_none());
        assert!(Mat3::diagonal(1e-4, 1e-4, 1e-4).inverse().is_none());
    }

    #[test]
    fn cholesky_reconstructs() {
        let b = Mat3([[0.1, 0.02, 0.0], [0.0, 0.12, 0.01], [0.03, 0.0, 0.09]]);
        let m = b.transpose() * b;
        let l = m.cholesky().unwrap();
        assert_mat_eq(&(l * l.transpose()), &m);
        assert_eq!(l.0[0][1], 0.0);
        assert_eq!(l.0[1][2], 0.0);
    }

    #[test]
    fn cholesky_rejects_indefinite() {
        assert!(Mat3::diagonal(1.0, -1.0, 1.0).cholesky().is_none());
        assert!(Mat3::diagonal(1.0, 0.0, 1.0).cholesky().is_none());
    }

    #[test]
    fn transpose_and_mul_vec() {
        let m = Mat3::from_row_major(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        assert_eq!(m.transpose().0[0], [1.0, 4.0, 7.0]);
        assert_eq!(m.mul_vec([1.0, 0.0, -1.0]), [-2.0, -2.0, -2.0]);
    }
}
