//! Tolerance-scaled vector norms.

use ndarray as nd;
use num_traits::cast;

use crate::Float;

/// Root-mean-square norm of `a`, scaled component-wise by `abs_tol + rel_tol * |b[i]|`.
///
/// ```text
/// sqrt( (1/n) * sum_i ( a[i] / (abs_tol + rel_tol * |b[i]|) )^2 )
/// ```
///
/// An empty vector has norm zero.
///
/// ```
/// let error = ndarray::array![1e-6, -2e-6];
/// let y = ndarray::array![1., 0.];
/// let norm = dop853::scaled_rms_norm(error.view(), y.view(), 1e-6, 1e-6);
/// approx::assert_relative_eq!(norm, (0.125f64 + 2.).sqrt(), max_relative = 1e-12);
/// ```
pub fn scaled_rms_norm<F: Float>(
    a: nd::ArrayView1<F>,
    b: nd::ArrayView1<F>,
    abs_tol: F,
    rel_tol: F,
) -> F {
    if a.is_empty() {
        return F::zero();
    }
    (scaled_sum_of_squares(a, b, abs_tol, rel_tol) / cast(a.len()).unwrap()).sqrt()
}

/// Sum of squared components of `a`, each scaled by `abs_tol + rel_tol * |b[i]|`.
///
/// Accumulates in component order.
pub(crate) fn scaled_sum_of_squares<F: Float>(
    a: nd::ArrayView1<F>,
    b: nd::ArrayView1<F>,
    abs_tol: F,
    rel_tol: F,
) -> F {
    a.iter()
        .zip(b.iter())
        .fold(F::zero(), |acc, (&ai, &bi)| {
            let scaled = ai / (abs_tol + rel_tol * bi.abs());
            acc + scaled * scaled
        })
}
