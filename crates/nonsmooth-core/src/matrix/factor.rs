//! Dense factorizations on top of nalgebra's LU and Cholesky decompositions.
//!
//! nalgebra does not fail on singular input, so the pivots are checked here
//! and the first bad one is reported as [`Error::SingularMatrix`]. Packed
//! factors follow the LAPACK `dgetrf` layout: the strict lower triangle holds
//! L (unit diagonal implied) and the upper triangle holds U, for the row
//! permuted matrix.

use nalgebra::{Cholesky, DMatrix, DVector, Dyn, linalg::LU};

use crate::error::{Error, Result};

pub(crate) type DenseLu = LU<f64, Dyn, Dyn>;

/// Largest absolute entry, used to scale the singularity threshold.
fn max_abs(a: &DMatrix<f64>) -> f64 {
    a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()))
}

/// Index of the first diagonal entry that is NaN or at most `threshold`
/// in magnitude.
fn bad_pivot(a: &DMatrix<f64>, threshold: f64) -> Option<usize> {
    a.diagonal().iter().position(|d| d.is_nan() || d.abs() <= threshold)
}

fn check_square(context: &'static str, a: &DMatrix<f64>) -> Result<usize> {
    let n = a.nrows();
    if n != a.ncols() {
        return Err(Error::shape(context, (n, n), a.shape()));
    }
    Ok(n)
}

/// LU factorization with partial pivoting.
pub(crate) fn lu(a: DMatrix<f64>) -> Result<DenseLu> {
    check_square("LU factorization", &a)?;
    let threshold = f64::EPSILON * max_abs(&a).max(f64::MIN_POSITIVE);
    let lu = LU::new(a);
    match bad_pivot(&lu.u(), threshold) {
        Some(pivot) => Err(Error::SingularMatrix { pivot }),
        None => Ok(lu),
    }
}

/// L and U packed into one matrix.
pub(crate) fn packed(lu: &DenseLu) -> DMatrix<f64> {
    let mut factors = lu.l();
    factors.fill_diagonal(0.0);
    factors += lu.u();
    factors
}

/// Solve `A x = b` in place with a factorization from [`lu`].
pub(crate) fn lu_solve(lu: &DenseLu, b: &mut [f64]) -> Result<()> {
    let mut rhs = DVector::from_column_slice(b);
    if !lu.solve_mut(&mut rhs) {
        let pivot = bad_pivot(&lu.u(), 0.0).unwrap_or(0);
        return Err(Error::SingularMatrix { pivot });
    }
    b.copy_from_slice(rhs.as_slice());
    Ok(())
}

/// Inverse through the LU factorization.
pub(crate) fn inverse(a: DMatrix<f64>) -> Result<DMatrix<f64>> {
    let lu = lu(a)?;
    match lu.try_inverse() {
        Some(inverse) => Ok(inverse),
        None => Err(Error::SingularMatrix {
            pivot: bad_pivot(&lu.u(), 0.0).unwrap_or(0),
        }),
    }
}

/// Cholesky factor `L` of `A = L Lᵀ`, with the strict upper triangle zero.
///
/// Only the lower triangle of `a` is read. The reported pivot is the order
/// of the first leading minor that is not positive definite.
pub(crate) fn cholesky(a: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let n = check_square("Cholesky factorization", a)?;
    if let Some(chol) = Cholesky::new(a.clone()) {
        let l = chol.unpack();
        return match bad_pivot(&l, 0.0) {
            Some(pivot) => Err(Error::SingularMatrix { pivot }),
            None => Ok(l),
        };
    }
    let pivot = (1..=n)
        .find(|&k| Cholesky::new(a.view((0, 0), (k, k)).into_owned()).is_none())
        .map_or(n.saturating_sub(1), |k| k - 1);
    Err(Error::SingularMatrix { pivot })
}

/// Solve `L Lᵀ x = b` in place.
pub(crate) fn cholesky_solve(l: &DMatrix<f64>, b: &mut [f64]) -> Result<()> {
    let mut rhs = DVector::from_column_slice(b);
    if !(l.solve_lower_triangular_mut(&mut rhs) && l.tr_solve_lower_triangular_mut(&mut rhs)) {
        let pivot = bad_pivot(l, 0.0).unwrap_or(0);
        return Err(Error::SingularMatrix { pivot });
    }
    b.copy_from_slice(rhs.as_slice());
    Ok(())
}

/// Forward substitution with the lower triangle of `l`.
pub(crate) fn lower_solve(l: &DMatrix<f64>, b: &mut [f64]) -> Result<()> {
    let mut rhs = DVector::from_column_slice(b);
    if !l.solve_lower_triangular_mut(&mut rhs) {
        let pivot = bad_pivot(l, 0.0).unwrap_or(0);
        return Err(Error::SingularMatrix { pivot });
    }
    b.copy_from_slice(rhs.as_slice());
    Ok(())
}

/// Back substitution with the upper triangle of `u`.
pub(crate) fn upper_solve(u: &DMatrix<f64>, b: &mut [f64]) -> Result<()> {
    let mut rhs = DVector::from_column_slice(b);
    if !u.solve_upper_triangular_mut(&mut rhs) {
        let pivot = bad_pivot(u, 0.0).unwrap_or(0);
        return Err(Error::SingularMatrix { pivot });
    }
    b.copy_from_slice(rhs.as_slice());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::dmatrix;

    #[test]
    fn test_lu_solve_simple() {
        // 2x + y = 5
        // x + 3y = 6
        let lu = lu(dmatrix![2.0, 1.0; 1.0, 3.0]).unwrap();
        let mut b = [5.0, 6.0];
        lu_solve(&lu, &mut b).unwrap();

        assert!((b[0] - 1.8).abs() < 1e-12);
        assert!((b[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_lu_requires_pivoting() {
        let lu = lu(dmatrix![0.0, 1.0; 1.0, 0.0]).unwrap();
        let mut b = [3.0, 7.0];
        lu_solve(&lu, &mut b).unwrap();
        assert!((b[0] - 7.0).abs() < 1e-14);
        assert!((b[1] - 3.0).abs() < 1e-14);
    }

    #[test]
    fn test_packed_factors_rebuild_permuted_matrix() {
        let a = dmatrix![1.0, 2.0, 0.0; 4.0, 1.0, 1.0; 2.0, 0.0, 3.0];
        let lu = lu(a.clone()).unwrap();
        let factors = packed(&lu);
        let mut l = factors.lower_triangle();
        l.fill_diagonal(1.0);
        let u = factors.upper_triangle();
        let mut pa = a;
        lu.p().permute_rows(&mut pa);
        assert!((l * u - pa).abs().max() < 1e-12);
    }

    #[test]
    fn test_lu_singular() {
        let result = lu(dmatrix![1.0, 2.0; 2.0, 4.0]);
        assert!(matches!(result, Err(Error::SingularMatrix { pivot: 1 })));
    }

    #[test]
    fn test_lu_rejects_rectangular() {
        let result = lu(DMatrix::zeros(2, 3));
        assert!(matches!(result, Err(Error::ShapeMismatch { .. })));
    }

    #[test]
    fn test_cholesky_spd() {
        let a = dmatrix![4.0, 2.0; 2.0, 3.0];
        let l = cholesky(&a).unwrap();
        assert_eq!(l[(0, 1)], 0.0);
        let rebuilt = &l * l.transpose();
        assert!((rebuilt - a).abs().max() < 1e-12);

        let mut b = [2.0, 1.0];
        cholesky_solve(&l, &mut b).unwrap();
        // 4x + 2y = 2, 2x + 3y = 1 => x = 0.5, y = 0
        assert!((b[0] - 0.5).abs() < 1e-12);
        assert!(b[1].abs() < 1e-12);
    }

    #[test]
    fn test_cholesky_not_positive_definite() {
        let a = dmatrix![1.0, 2.0; 2.0, 1.0];
        assert!(matches!(cholesky(&a), Err(Error::SingularMatrix { pivot: 1 })));
        let b = dmatrix![-1.0, 0.0; 0.0, 1.0];
        assert!(matches!(cholesky(&b), Err(Error::SingularMatrix { pivot: 0 })));
    }

    #[test]
    fn test_inverse() {
        let a = dmatrix![4.0, 7.0; 2.0, 6.0];
        let inv = inverse(a.clone()).unwrap();
        let product = &a * &inv;
        assert!((product - DMatrix::identity(2, 2)).abs().max() < 1e-12);
    }

    #[test]
    fn test_triangular_solves() {
        let l = dmatrix![2.0, 9.0; 1.0, 4.0];
        let mut b = [2.0, 9.0];
        lower_solve(&l, &mut b).unwrap();
        assert_eq!(b, [1.0, 2.0]);

        let u = dmatrix![2.0, 1.0; 9.0, 4.0];
        let mut b = [4.0, 8.0];
        upper_solve(&u, &mut b).unwrap();
        assert_eq!(b, [1.0, 2.0]);

        let singular = dmatrix![1.0, 0.0; 0.0, 0.0];
        let mut b = [1.0, 1.0];
        assert!(matches!(
            upper_solve(&singular, &mut b),
            Err(Error::SingularMatrix { pivot: 1 })
        ));
    }
}
