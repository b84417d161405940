//! Callbacks receiving the solution after each accepted step.

use ndarray as nd;

use crate::{DenseOutput, Float};

/// Whether the integration should go on after an observer call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    /// Keep integrating.
    Continue,
    /// Stop the run; it ends with [`Status::Interrupted`](crate::Status::Interrupted).
    Stop,
}

/// Callback invoked with the solution as the integration progresses.
///
/// The observer is called once before the first step with `step == 0` and `x_old == x`,
/// then once after every accepted step with `step` counting accepted steps from 1. `dense`
/// holds the interpolant over `[x_old, x]` if dense output is enabled, and is always `None`
/// for the initial call.
///
/// Closures of the matching shape implement this trait:
///
/// ```
/// let mut last_x = None;
/// let mut observer = |_step: usize,
///                     _x_old: f64,
///                     x: f64,
///                     _y: ndarray::ArrayView1<f64>,
///                     _dense: Option<&dop853::DenseOutput<f64>>| {
///     last_x = Some(x);
///     dop853::Control::Continue
/// };
/// # let _ = &mut observer;
/// ```
pub trait Observer<F: Float> {
    /// Observe the solution `y` at `x`, reached by a step from `x_old`.
    fn observe(
        &mut self,
        step: usize,
        x_old: F,
        x: F,
        y: nd::ArrayView1<F>,
        dense: Option<&DenseOutput<F>>,
    ) -> Control;
}

impl<F, O> Observer<F> for O
where
    F: Float,
    O: FnMut(usize, F, F, nd::ArrayView1<F>, Option<&DenseOutput<F>>) -> Control,
{
    fn observe(
        &mut self,
        step: usize,
        x_old: F,
        x: F,
        y: nd::ArrayView1<F>,
        dense: Option<&DenseOutput<F>>,
    ) -> Control {
        self(step, x_old, x, y, dense)
    }
}

/// Observer used when the caller does not supply one. Never called.
pub(crate) struct NoObserver;

impl<F: Float> Observer<F> for NoObserver {
    fn observe(
        &mut self,
        _step: usize,
        _x_old: F,
        _x: F,
        _y: nd::ArrayView1<F>,
        _dense: Option<&DenseOutput<F>>,
    ) -> Control {
        Control::Continue
    }
}
