//! Continuous extension of the solution over the last accepted step.

use ndarray as nd;
use num_traits::cast;

use crate::Float;
use crate::coefficients::{D, FSAL_STAGE, NUM_DENSE_COEFFICIENTS, NUM_STAGES};

/// Coefficients of the degree-7 interpolant valid on `[x_old, x_old + h]`.
///
/// Produced after every accepted step when dense output is enabled, and handed to the
/// [`Observer`](crate::Observer).
#[derive(Clone, Debug)]
pub struct DenseOutput<F: Float> {
    x_old: F,
    h: F,
    /// One row per coefficient, one column per state component.
    coefficients: nd::Array2<F>,
}

impl<F: Float> DenseOutput<F> {
    pub(crate) fn new(dimension: usize) -> Self {
        Self {
            x_old: F::zero(),
            h: F::zero(),
            coefficients: nd::Array2::zeros((NUM_DENSE_COEFFICIENTS, dimension)),
        }
    }

    /// Left end of the interval the interpolant is valid on.
    pub fn x_old(&self) -> F {
        self.x_old
    }

    /// Signed length of the interval the interpolant is valid on.
    pub fn step_size(&self) -> F {
        self.h
    }

    /// The raw coefficients, with shape `(8, n)`.
    pub fn coefficients(&self) -> nd::ArrayView2<'_, F> {
        self.coefficients.view()
    }

    /// Evaluate the interpolant at `x`, writing all components into `y`.
    ///
    /// `x` should lie within the last accepted step; outside of it the polynomial is
    /// extrapolated.
    pub fn evaluate(&self, x: F, mut y: nd::ArrayViewMut1<F>) {
        for (i, yi) in y.iter_mut().enumerate() {
            *yi = self.component(i, x);
        }
    }

    /// Evaluate component `i` of the interpolant at `x`.
    pub fn component(&self, i: usize, x: F) -> F {
        let r = self.coefficients.column(i);
        let s = (x - self.x_old) / self.h;
        let s1 = F::one() - s;
        let high = r[4] + s * (r[5] + s1 * (r[6] + s * r[7]));
        r[0] + s * (r[1] + s1 * (r[2] + s * (r[3] + s1 * high)))
    }

    /// The part of the coefficients that only needs the twelve step stages and the
    /// first-same-as-last stage.
    ///
    /// `k` holds the stage derivatives, one row per stage.
    pub(crate) fn assemble_from_step(
        &mut self,
        x_old: F,
        h: F,
        y: nd::ArrayView1<F>,
        y_new: nd::ArrayView1<F>,
        k: nd::ArrayView2<F>,
    ) {
        self.x_old = x_old;
        self.h = h;
        for (i, mut r) in self.coefficients.columns_mut().into_iter().enumerate() {
            let ydiff = y_new[i] - y[i];
            let bspl = h * k[[0, i]] - ydiff;
            r[0] = y[i];
            r[1] = ydiff;
            r[2] = bspl;
            r[3] = ydiff - h * k[[FSAL_STAGE, i]] - bspl;
            for (row, weights) in D.iter().enumerate() {
                r[4 + row] = weighted_sum(&weights[..=FSAL_STAGE], k, i);
            }
        }
    }

    /// Add the contribution of the three extra dense-output stages.
    pub(crate) fn finish(&mut self, k: nd::ArrayView2<F>) {
        let h = self.h;
        for (i, mut r) in self.coefficients.columns_mut().into_iter().enumerate() {
            for (row, weights) in D.iter().enumerate() {
                let extra = weights[FSAL_STAGE + 1..NUM_STAGES]
                    .iter()
                    .enumerate()
                    .fold(F::zero(), |acc, (j, &w)| {
                        acc + cast::<_, F>(w).unwrap() * k[[FSAL_STAGE + 1 + j, i]]
                    });
                r[4 + row] = h * (r[4 + row] + extra);
            }
        }
    }
}

/// `sum_j weights[j] * k[j, i]`, skipping zero weights.
pub(crate) fn weighted_sum<F: Float>(weights: &[f64], k: nd::ArrayView2<F>, i: usize) -> F {
    weights
        .iter()
        .enumerate()
        .filter(|&(_, &w)| w != 0.)
        .fold(F::zero(), |acc, (j, &w)| {
            acc + cast::<_, F>(w).unwrap() * k[[j, i]]
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn with_coefficients(x_old: f64, h: f64, columns: &[[f64; 8]]) -> DenseOutput<f64> {
        let mut dense = DenseOutput::new(columns.len());
        dense.x_old = x_old;
        dense.h = h;
        for (i, column) in columns.iter().enumerate() {
            for (j, &c) in column.iter().enumerate() {
                dense.coefficients[[j, i]] = c;
            }
        }
        dense
    }

    #[test]
    fn interpolant_matches_step_endpoints() {
        // r0 = y_old, r1 = y_new - y_old.
        let dense = with_coefficients(2., 0.5, &[[1., 3., 0.7, -0.2, 0.1, 9., -4., 2.]]);
        approx::assert_relative_eq!(dense.component(0, 2.), 1.);
        approx::assert_relative_eq!(dense.component(0, 2.5), 4., max_relative = 1e-14);
    }

    #[test]
    fn linear_coefficients_interpolate_linearly() {
        let dense = with_coefficients(
            0.,
            -2.,
            &[[1., 2., 0., 0., 0., 0., 0., 0.], [0., -1., 0., 0., 0., 0., 0., 0.]],
        );
        let mut y = ndarray::Array1::zeros(2);
        dense.evaluate(-0.5, y.view_mut());
        approx::assert_relative_eq!(y[0], 1.5, max_relative = 1e-14);
        approx::assert_relative_eq!(y[1], -0.25, max_relative = 1e-14);
    }

    #[test]
    fn weighted_sum_skips_zero_weights() {
        let k = ndarray::array![[1., 2.], [f64::NAN, f64::NAN], [3., 4.]];
        approx::assert_relative_eq!(weighted_sum(&[2., 0., -1.], k.view(), 1), 0.);
    }
}
