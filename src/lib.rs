//! Implementation of the Dormand-Prince 8(5,3) method for integrating ordinary differential
//! equations.
//!
//! [DOP853](https://en.wikipedia.org/wiki/Dormand%E2%80%93Prince_method) is an explicit
//! twelve-stage Runge-Kutta method of order 8. The local error is estimated with an embedded
//! 5th order formula blended with a 3rd order one, and the step size is adapted with a
//! Lund-stabilized (PI) controller. After each accepted step the integrator can assemble the
//! coefficients of a degree-7 interpolant, giving continuous output over the step at the cost
//! of three extra function evaluations.
//!
//! The implementation follows:
//! * Hairer, E., Nørsett, S.P., & Wanner, G. "Solving Ordinary Differential Equations I:
//!   Nonstiff Problems", 2nd ed., Springer, 1993. Sections II.4, II.6 and II.10.
//! * Dormand, J.R., & Prince, P.J. "A family of embedded Runge-Kutta formulae." Journal of
//!   Computational and Applied Mathematics 6 (1980): 19-26.
//!
//! As an example, consider a simple trigonometric system:
//!
//! ```
//! // Define ODE.
//! struct TrigSystem {
//!     omega: f64,
//! }
//!
//! impl dop853::System for TrigSystem {
//!     type Float = f64;
//!
//!     fn system(
//!         &self,
//!         _x: Self::Float,
//!         y: dop853::ArrayView1<Self::Float>,
//!         mut dydx: dop853::ArrayViewMut1<Self::Float>,
//!     ) {
//!         dydx[[0]] = y[[1]];
//!         dydx[[1]] = -self.omega.powi(2) * y[[0]];
//!     }
//! }
//!
//! let system = TrigSystem { omega: 1.2 };
//!
//! // Set up the integrator.
//! let integrator = dop853::Integrator::default()
//!     .with_abs_tol(1e-10)
//!     .with_rel_tol(1e-10);
//!
//! // Define initial conditions. The state is updated in place.
//! let x_end = 10.2;
//! let mut y = ndarray::array![1., 0.];
//!
//! let integration = integrator
//!     .integrate(&system, 0., y.view_mut(), x_end)
//!     .unwrap();
//! assert_eq!(integration.status, dop853::Status::Completed);
//! assert_eq!(integration.x, x_end);
//!
//! // Ensure result matches analytic solution.
//! approx::assert_relative_eq!((system.omega * x_end).cos(), y[[0]], epsilon = 1e-8);
//!
//! // Every step attempt costs 11 evaluations, every accepted step one more.
//! let stats = integration.stats;
//! assert_eq!(
//!     stats.num_system_evals,
//!     2 + 11 * stats.num_steps + stats.num_accepted
//! );
//! ```
//!
//! Intermediate results are delivered to an [`Observer`]. With dense output enabled, the
//! observer can sample the solution anywhere inside each accepted step:
//!
//! ```
//! struct Exp;
//!
//! impl dop853::System for Exp {
//!     type Float = f64;
//!
//!     fn system(
//!         &self,
//!         _x: f64,
//!         y: dop853::ArrayView1<f64>,
//!         mut dydx: dop853::ArrayViewMut1<f64>,
//!     ) {
//!         dydx.assign(&y);
//!     }
//! }
//!
//! // Record the solution at x = 0, 0.1, 0.2, ...
//! struct Sampler {
//!     next_x: f64,
//!     samples: Vec<(f64, f64)>,
//! }
//!
//! impl dop853::Observer<f64> for Sampler {
//!     fn observe(
//!         &mut self,
//!         _step: usize,
//!         _x_old: f64,
//!         x: f64,
//!         y: dop853::ArrayView1<f64>,
//!         dense: Option<&dop853::DenseOutput<f64>>,
//!     ) -> dop853::Control {
//!         match dense {
//!             None => {
//!                 self.samples.push((x, y[0]));
//!                 self.next_x += 0.1;
//!             }
//!             Some(dense) => {
//!                 while self.next_x <= x {
//!                     self.samples.push((self.next_x, dense.component(0, self.next_x)));
//!                     self.next_x += 0.1;
//!                 }
//!             }
//!         }
//!         dop853::Control::Continue
//!     }
//! }
//!
//! let integrator = dop853::Integrator::default()
//!     .with_abs_tol(1e-10)
//!     .with_rel_tol(1e-10)
//!     .with_dense_output(true);
//! let mut sampler = Sampler { next_x: 0., samples: Vec::new() };
//! let mut y = ndarray::array![1.];
//! integrator
//!     .integrate_with_observer(&Exp, 0., y.view_mut(), 1.05, &mut sampler)
//!     .unwrap();
//!
//! assert_eq!(sampler.samples.len(), 11);
//! for (x, y) in sampler.samples {
//!     approx::assert_relative_eq!(y, x.exp(), max_relative = 1e-8);
//! }
//! ```
//!
//! Right-hand sides defined with other linear algebra crates can be bridged through slices,
//! as long as the vectors are dynamically sized. For example, with [`nalgebra`]:
//!
//! ```
//! fn compute_dydx(omega: f32, y: nalgebra::DVectorView<f32>, mut dydx: nalgebra::DVectorViewMut<f32>) {
//!     dydx[0] = y[1];
//!     dydx[1] = -omega.powi(2) * y[0];
//! }
//!
//! let omega = 1.2;
//! let system = dop853::FnSystem::new(
//!     |_x: f32, y: dop853::ArrayView1<f32>, mut dydx: dop853::ArrayViewMut1<f32>| {
//!         let n = y.len();
//!         let y = nalgebra::DVectorView::from_slice(y.as_slice().unwrap(), n);
//!         let dydx = nalgebra::DVectorViewMut::from_slice(dydx.as_slice_mut().unwrap(), n);
//!         compute_dydx(omega, y, dydx);
//!     },
//! );
//!
//! let integrator = dop853::Integrator::default()
//!     .with_abs_tol(1e-5)
//!     .with_rel_tol(1e-5);
//! let mut y = ndarray::array![1f32, 0.];
//! integrator.integrate(&system, 0., y.view_mut(), 6.).unwrap();
//!
//! let (sin, cos) = (6. * omega).sin_cos();
//! approx::assert_relative_eq!(y[0], cos, epsilon = 1e-3);
//! approx::assert_relative_eq!(y[1], -omega * sin, epsilon = 1e-3);
//! ```

use std::marker::PhantomData;

pub use nd::ArrayView1;
pub use nd::ArrayViewMut1;
use ndarray as nd;

pub mod coefficients;
mod dense;
mod error;
mod initial_step;
mod integrator;
mod norm;
mod observer;
mod settings;

pub use dense::DenseOutput;
pub use error::{Error, Status};
pub use integrator::{Integration, Integrator};
pub use norm::scaled_rms_norm;
pub use observer::{Control, Observer};
pub use settings::Settings;

pub trait Float:
    num_traits::Float
    + core::iter::Sum
    + core::ops::AddAssign
    + core::ops::SubAssign
    + core::ops::MulAssign
    + core::fmt::Debug
    + nd::ScalarOperand
{
}

impl Float for f32 {}
impl Float for f64 {}

/// Trait for defining a system of first-order ordinary differential equations `y' = f(x, y)`.
pub trait System {
    /// The floating point type.
    type Float: Float;

    /// Evaluate the right-hand side at `(x, y)` and store the derivative in `dydx`.
    fn system(&self, x: Self::Float, y: ArrayView1<Self::Float>, dydx: ArrayViewMut1<Self::Float>);
}

/// A [`System`] defined by a closure or function.
pub struct FnSystem<F, G> {
    f: G,
    _float: PhantomData<fn() -> F>,
}

impl<F, G> FnSystem<F, G>
where
    F: Float,
    G: Fn(F, ArrayView1<F>, ArrayViewMut1<F>),
{
    /// Wrap `f`, which must store `f(x, y)` into its third argument.
    pub fn new(f: G) -> Self {
        Self {
            f,
            _float: PhantomData,
        }
    }
}

impl<F, G> System for FnSystem<F, G>
where
    F: Float,
    G: Fn(F, ArrayView1<F>, ArrayViewMut1<F>),
{
    type Float = F;

    fn system(&self, x: F, y: ArrayView1<F>, dydx: ArrayViewMut1<F>) {
        (self.f)(x, y, dydx)
    }
}

/// Statistics from an integration run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Number of system function evaluations.
    pub num_system_evals: usize,
    /// Number of step attempts, accepted or rejected.
    pub num_steps: usize,
    /// Number of accepted steps.
    pub num_accepted: usize,
    /// Number of rejected steps, not counting rejections before the first accepted step.
    pub num_rejected: usize,
}

pub(crate) struct SystemEvaluationCounter<'a, S: System> {
    system: &'a S,
    pub(crate) num_system_evals: usize,
}

impl<'a, S: System> SystemEvaluationCounter<'a, S> {
    pub(crate) fn new(system: &'a S) -> Self {
        Self {
            system,
            num_system_evals: 0,
        }
    }

    pub(crate) fn system(
        &mut self,
        x: S::Float,
        y: nd::ArrayView1<S::Float>,
        dydx: nd::ArrayViewMut1<S::Float>,
    ) {
        self.num_system_evals += 1;
        <S as System>::system(self.system, x, y, dydx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counter_counts_evaluations() {
        let system = FnSystem::new(|x: f64, y: ArrayView1<f64>, mut dydx: ArrayViewMut1<f64>| {
            dydx.assign(&(&y * x))
        });
        let mut counter = SystemEvaluationCounter::new(&system);
        let y = ndarray::array![1., 2.];
        let mut dydx = ndarray::Array1::zeros(2);
        counter.system(3., y.view(), dydx.view_mut());
        counter.system(0.5, y.view(), dydx.view_mut());
        assert_eq!(counter.num_system_evals, 2);
        assert_eq!(dydx, ndarray::array![0.5, 1.]);
    }
}
