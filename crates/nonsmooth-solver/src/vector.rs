//! Small dense vector kernels used by the iterative solvers.

#[inline]
pub(crate) fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[inline]
pub(crate) fn norm2(a: &[f64]) -> f64 {
    dot(a, a).sqrt()
}

/// `‖a - b‖₂`.
#[inline]
pub(crate) fn distance(a: &[f64], b: &[f64]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
        .sqrt()
}

/// `y += alpha * x`.
#[inline]
pub(crate) fn axpy(alpha: f64, x: &[f64], y: &mut [f64]) {
    for (yi, xi) in y.iter_mut().zip(x) {
        *yi += alpha * xi;
    }
}

pub(crate) fn all_finite(a: &[f64]) -> bool {
    a.iter().all(|v| v.is_finite())
}

/// Divide by `norm` when it is meaningfully non-zero.
#[inline]
pub(crate) fn relative(error: f64, norm: f64) -> f64 {
    if norm.abs() > f64::EPSILON { error / norm } else { error }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernels() {
        let a = [3.0, 4.0];
        assert_eq!(norm2(&a), 5.0);
        assert_eq!(distance(&a, &[0.0, 0.0]), 5.0);
        let mut y = [1.0, 1.0];
        axpy(2.0, &a, &mut y);
        assert_eq!(y, [7.0, 9.0]);
        assert!(!all_finite(&[1.0, f64::NAN]));
        assert_eq!(relative(2.0, 0.0), 2.0);
        assert_eq!(relative(2.0, 4.0), 0.5);
    }
}
