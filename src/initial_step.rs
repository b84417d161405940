//! Starting step size heuristic.
//!
//! Follows Hairer, Nørsett & Wanner, "Solving Ordinary Differential Equations I", Section
//! II.4: pick a step from the ratio of the solution and derivative magnitudes, take one
//! explicit Euler step to estimate the second derivative, and choose `h` such that
//! `h^order * max(|f0|, |f'|) = 0.01`.

use ndarray as nd;
use num_traits::{Float as _, One as _, cast};

use crate::norm::scaled_sum_of_squares;
use crate::{System, SystemEvaluationCounter};

/// Estimate the size of the first step.
///
/// `f0` must hold the derivative at `(x, y)` and `posneg` the direction of integration
/// (`±1`). `f1` and `y1` are scratch space. Costs one right-hand-side evaluation. The result
/// carries the sign of `posneg` and its magnitude never exceeds `max_step`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn initial_step_size<S: System>(
    system: &mut SystemEvaluationCounter<S>,
    x: S::Float,
    y: nd::ArrayView1<S::Float>,
    posneg: S::Float,
    f0: nd::ArrayView1<S::Float>,
    mut f1: nd::ArrayViewMut1<S::Float>,
    mut y1: nd::ArrayViewMut1<S::Float>,
    order: u8,
    max_step: S::Float,
    abs_tol: S::Float,
    rel_tol: S::Float,
) -> S::Float {
    let dnf = scaled_sum_of_squares(f0, y, abs_tol, rel_tol);
    let dny = scaled_sum_of_squares(y, y, abs_tol, rel_tol);

    let tiny: S::Float = cast(1e-10).unwrap();
    let mut h = if dnf <= tiny || dny <= tiny {
        cast(1e-6).unwrap()
    } else {
        (dny / dnf).sqrt() * cast(0.01).unwrap()
    };
    h = h.min(max_step) * posneg;

    // Explicit Euler step.
    nd::Zip::from(&mut y1)
        .and(&y)
        .and(&f0)
        .for_each(|y1, &y, &f0| *y1 = y + h * f0);
    system.system(x + h, y1.view(), f1.view_mut());

    // Estimate the second derivative of the solution.
    f1 -= &f0;
    let der2 = scaled_sum_of_squares(f1.view(), y, abs_tol, rel_tol).sqrt() / h;

    let der12 = der2.abs().max(dnf.sqrt());
    let h1 = if der12 <= cast(1e-15).unwrap() {
        (h.abs() * cast(1e-3).unwrap()).max(cast(1e-6).unwrap())
    } else {
        (cast::<_, S::Float>(0.01).unwrap() / der12).powf(S::Float::one() / cast(order).unwrap())
    };

    (h.abs() * cast(100).unwrap()).min(h1).min(max_step) * posneg
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FnSystem;

    fn estimate<S: System<Float = f64>>(
        system: &S,
        x: f64,
        y: nd::ArrayView1<f64>,
        posneg: f64,
        max_step: f64,
    ) -> (f64, usize) {
        let mut counter = SystemEvaluationCounter::new(system);
        let mut f0 = nd::Array1::zeros(y.raw_dim());
        counter.system(x, y, f0.view_mut());
        let mut f1 = nd::Array1::zeros(y.raw_dim());
        let mut y1 = nd::Array1::zeros(y.raw_dim());
        let h = initial_step_size(
            &mut counter,
            x,
            y,
            posneg,
            f0.view(),
            f1.view_mut(),
            y1.view_mut(),
            8,
            max_step,
            1e-6,
            1e-3,
        );
        (h, counter.num_system_evals)
    }

    #[test]
    fn exponential_growth() {
        let system = FnSystem::new(|_x, y: nd::ArrayView1<f64>, mut dydt: nd::ArrayViewMut1<f64>| {
            dydt.assign(&y)
        });
        let y = ndarray::array![1.];
        let (h, num_system_evals) = estimate(&system, 0., y.view(), 1., 10.);

        // The trial step is 0.01 and both derivative estimates equal 1 / sk.
        let sk = 1e-6 + 1e-3;
        let expected = (0.01 * sk).powf(1. / 8.);
        approx::assert_relative_eq!(h, expected, max_relative = 1e-12);
        assert_eq!(num_system_evals, 2);
    }

    #[test]
    fn respects_direction_and_max_step() {
        let system = FnSystem::new(|_x, _y, mut dydt: nd::ArrayViewMut1<f64>| dydt.fill(1e-12));
        let y = ndarray::array![1., 2.];
        let (h, _) = estimate(&system, 3., y.view(), -1., 1e-5);
        assert_eq!(h, -1e-5);
    }

    #[test]
    fn vanishing_derivatives_fall_back_to_minimal_step() {
        let system = FnSystem::new(|_x, _y, mut dydt: nd::ArrayViewMut1<f64>| dydt.fill(0.));
        let y = ndarray::array![0.];
        let (h, _) = estimate(&system, 0., y.view(), 1., 1.);
        approx::assert_relative_eq!(h, 1e-6, max_relative = 1e-12);
    }
}
