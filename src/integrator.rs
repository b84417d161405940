//! The adaptive step loop.

use ndarray as nd;
use ndarray::s;
use num_traits::cast;

use crate::coefficients::{A, B, BHH, C, ER, FSAL_STAGE, NUM_STAGES, NUM_STEP_STAGES, ORDER};
use crate::dense::{DenseOutput, weighted_sum};
use crate::initial_step::initial_step_size;
use crate::observer::NoObserver;
use crate::{
    Control, Error, Float, Observer, Settings, Stats, Status, System, SystemEvaluationCounter,
};

/// `hlamb` above which a step counts as a stiffness detection.
const STIFFNESS_THRESHOLD: f64 = 6.1;
/// Consecutive detections after which the problem is declared stiff.
const MAX_STIFF_DETECTIONS: usize = 15;
/// Non-stiff detections after which the detection streak is forgotten.
const NON_STIFF_RESET: usize = 6;

/// Successful outcome of an integration run.
#[derive(Clone, Debug)]
pub struct Integration<F: Float> {
    /// Either [`Status::Completed`] or [`Status::Interrupted`].
    pub status: Status,
    /// The position the solution was advanced to.
    pub x: F,
    /// Suggested size of the next step. When completed, this is the step size the controller
    /// would have used had the endpoint not been reached.
    pub step_size: F,
    /// Counters of the run.
    pub stats: Stats,
}

/// An ODE integrator using the Dormand-Prince 8(5,3) method with adaptive step size.
///
/// The integrator only holds configuration; every call to [`Integrator::integrate`] starts an
/// independent run, so one integrator can be shared between threads.
#[derive(Clone, Debug, Default)]
pub struct Integrator<F: Float> {
    settings: Settings<F>,
}

impl<F: Float> Integrator<F> {
    /// Make an integrator from complete settings.
    pub fn from_settings(settings: Settings<F>) -> Self {
        Self { settings }
    }

    /// The current settings.
    pub fn settings(&self) -> &Settings<F> {
        &self.settings
    }

    /// Set the absolute tolerance.
    pub fn with_abs_tol(self, abs_tol: F) -> Self {
        self.with(|s| s.abs_tol = abs_tol)
    }
    /// Set the relative tolerance.
    pub fn with_rel_tol(self, rel_tol: F) -> Self {
        self.with(|s| s.rel_tol = rel_tol)
    }

    /// Set the maximum magnitude of the step size.
    pub fn with_max_step(self, max_step: F) -> Self {
        self.with(|s| s.max_step = Some(max_step))
    }
    /// Set the size of the first step. Zero means it is estimated automatically.
    pub fn with_initial_step(self, initial_step: F) -> Self {
        self.with(|s| s.initial_step = Some(initial_step))
    }
    /// Set the number of step attempts after which the run fails.
    pub fn with_max_steps(self, max_steps: usize) -> Self {
        self.with(|s| s.max_steps = max_steps)
    }
    /// Set the unit roundoff used to detect step size underflow.
    pub fn with_uround(self, uround: F) -> Self {
        self.with(|s| s.uround = uround)
    }

    /// Set the safety factor of the step size controller.
    pub fn with_safety_factor(self, safety_factor: F) -> Self {
        self.with(|s| s.safety_factor = safety_factor)
    }
    /// Require `fac1 <= h_new / h <= fac2`.
    pub fn with_step_ratio_bounds(self, fac1: F, fac2: F) -> Self {
        self.with(|s| {
            s.fac1 = fac1;
            s.fac2 = fac2;
        })
    }
    /// Set the Lund stabilization exponent. Values around 0.04 make the controller smoother.
    pub fn with_beta(self, beta: F) -> Self {
        self.with(|s| s.beta = beta)
    }

    /// Assemble dense output for the observer after every accepted step.
    pub fn with_dense_output(self, dense_output: bool) -> Self {
        self.with(|s| s.dense_output = dense_output)
    }
    /// Test for stiffness every `interval` accepted steps.
    pub fn with_stiffness_check_interval(self, interval: usize) -> Self {
        self.with(|s| s.stiffness_check_interval = Some(interval))
    }

    fn with(mut self, update: impl FnOnce(&mut Settings<F>)) -> Self {
        update(&mut self.settings);
        self
    }

    /// Integrate `system` from `x` to `x_end`.
    ///
    /// # Arguments
    ///
    /// * `system`: The ODE system.
    /// * `x`: The initial value of the independent variable.
    /// * `y`: The initial state. Overwritten with the state at the position the run stopped
    ///   at, also when an error is returned.
    /// * `x_end`: The endpoint. May be smaller than `x`.
    ///
    /// # Result
    ///
    /// The position reached with statistics, or an error if the settings are invalid or the
    /// integration failed.
    pub fn integrate<S: System<Float = F>>(
        &self,
        system: &S,
        x: F,
        y: nd::ArrayViewMut1<F>,
        x_end: F,
    ) -> Result<Integration<F>, Error<F>> {
        self.run(system, x, y, x_end, &mut NoObserver, OutputMode::None)
    }

    /// Integrate `system` from `x` to `x_end`, reporting progress to `observer`.
    ///
    /// The observer is called once before the first step and after every accepted step. It
    /// receives dense output if enabled with [`Integrator::with_dense_output`]. Returning
    /// [`Control::Stop`] ends the run with [`Status::Interrupted`].
    pub fn integrate_with_observer<S, O>(
        &self,
        system: &S,
        x: F,
        y: nd::ArrayViewMut1<F>,
        x_end: F,
        observer: &mut O,
    ) -> Result<Integration<F>, Error<F>>
    where
        S: System<Float = F>,
        O: Observer<F>,
    {
        let output = if self.settings.dense_output {
            OutputMode::Dense
        } else {
            OutputMode::Steps
        };
        self.run(system, x, y, x_end, observer, output)
    }

    fn run<S, O>(
        &self,
        system: &S,
        x: F,
        mut y: nd::ArrayViewMut1<F>,
        x_end: F,
        observer: &mut O,
        output: OutputMode,
    ) -> Result<Integration<F>, Error<F>>
    where
        S: System<Float = F>,
        O: Observer<F>,
    {
        self.settings.validate()?;
        if y.is_empty() {
            return Err(Error::EmptyState);
        }

        let mut run = Run::new(
            &self.settings,
            system,
            observer,
            output,
            x,
            y.view_mut(),
            x_end,
        );
        let status = match run.start() {
            Some(status) => status,
            None => loop {
                if let Iteration::Terminated(status) = run.iterate() {
                    break status;
                }
            },
        };
        run.finish(status)
    }
}

/// What the observer gets to see.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum OutputMode {
    /// No observer.
    None,
    /// Observer called after each accepted step.
    Steps,
    /// Observer called after each accepted step, with dense output.
    Dense,
}

/// Result of one pass through the step loop.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Iteration {
    Accepted,
    Rejected,
    Terminated(Status),
}

/// State of a single integration run.
pub(crate) struct Run<'a, F, S, O>
where
    F: Float,
    S: System<Float = F>,
    O: Observer<F>,
{
    settings: &'a Settings<F>,
    system: SystemEvaluationCounter<'a, S>,
    observer: &'a mut O,
    output: OutputMode,

    x: F,
    y: nd::ArrayViewMut1<'a, F>,
    x_end: F,
    posneg: F,
    max_step: F,
    /// Step size of the next attempt.
    h: F,
    /// Step size reported to the caller when the run ends.
    h_out: F,

    /// Error-based scale factor of the last accepted step.
    facold: F,
    /// Whether the previous attempt was rejected.
    reject: bool,
    /// Whether the current attempt reaches `x_end`.
    last: bool,
    /// Scaled error of the last attempt.
    last_error: F,

    /// Stiffness estimate `|h * lambda|` of the last check.
    hlamb: F,
    stiff_detections: usize,
    non_stiff_detections: usize,

    stats: Stats,

    /// Stage derivatives, one row per stage.
    k: nd::Array2<F>,
    /// State at which the current stage is evaluated.
    y_stage: nd::Array1<F>,
    /// `sum_i b_i k_i`.
    b_sum: nd::Array1<F>,
    /// Candidate solution at `x + h`.
    y_new: nd::Array1<F>,
    dense: Option<DenseOutput<F>>,
}

impl<'a, F, S, O> Run<'a, F, S, O>
where
    F: Float,
    S: System<Float = F>,
    O: Observer<F>,
{
    pub(crate) fn new(
        settings: &'a Settings<F>,
        system: &'a S,
        observer: &'a mut O,
        output: OutputMode,
        x: F,
        y: nd::ArrayViewMut1<'a, F>,
        x_end: F,
    ) -> Self {
        let n = y.len();
        let posneg = if x_end < x { -F::one() } else { F::one() };
        let max_step = settings
            .max_step
            .map(|h| h.abs())
            .unwrap_or_else(|| (x_end - x).abs());
        let num_stages = if output == OutputMode::Dense {
            NUM_STAGES
        } else {
            FSAL_STAGE + 1
        };
        Self {
            settings,
            system: SystemEvaluationCounter::new(system),
            observer,
            output,
            x,
            y,
            x_end,
            posneg,
            max_step,
            h: F::zero(),
            h_out: F::zero(),
            facold: cast(1e-4).unwrap(),
            reject: false,
            last: false,
            last_error: F::zero(),
            hlamb: F::zero(),
            stiff_detections: 0,
            non_stiff_detections: 0,
            stats: Stats::default(),
            k: nd::Array2::zeros((num_stages, n)),
            y_stage: nd::Array1::zeros(n),
            b_sum: nd::Array1::zeros(n),
            y_new: nd::Array1::zeros(n),
            dense: (output == OutputMode::Dense).then(|| DenseOutput::new(n)),
        }
    }

    /// Evaluate the initial derivative, choose the first step and prime the observer.
    ///
    /// Returns a status if the run already ended.
    pub(crate) fn start(&mut self) -> Option<Status> {
        if self.x != self.x_end {
            self.system
                .system(self.x, self.y.view(), self.k.row_mut(0));

            self.h = match self.settings.initial_step.filter(|h| !h.is_zero()) {
                Some(h) => h.abs() * self.posneg,
                None => {
                    let (first, mut rest) = self.k.view_mut().split_at(nd::Axis(0), 1);
                    initial_step_size(
                        &mut self.system,
                        self.x,
                        self.y.view(),
                        self.posneg,
                        first.row(0),
                        rest.row_mut(0),
                        self.y_stage.view_mut(),
                        ORDER,
                        self.max_step,
                        self.settings.abs_tol,
                        self.settings.rel_tol,
                    )
                }
            };
        }
        self.h_out = self.h;
        tracing::debug!(
            dimension = self.y.len(),
            x = ?self.x,
            x_end = ?self.x_end,
            h = ?self.h,
            "starting integration"
        );

        if self.output != OutputMode::None
            && self
                .observer
                .observe(0, self.x, self.x, self.y.view(), None)
                == Control::Stop
        {
            return Some(Status::Interrupted);
        }
        if self.x == self.x_end {
            return Some(Status::Completed);
        }
        None
    }

    /// Attempt one step.
    pub(crate) fn iterate(&mut self) -> Iteration {
        let settings = self.settings;

        if self.stats.num_steps > settings.max_steps {
            tracing::warn!(
                x = ?self.x,
                max_steps = settings.max_steps,
                "maximum number of steps exceeded"
            );
            self.h_out = self.h;
            return Iteration::Terminated(Status::MaxStepsExceeded);
        }
        if cast::<_, F>(0.1).unwrap() * self.h.abs() <= self.x.abs() * settings.uround {
            tracing::warn!(x = ?self.x, h = ?self.h, "step size too small");
            self.h_out = self.h;
            return Iteration::Terminated(Status::StepSizeUnderflow);
        }
        if (self.x + cast::<_, F>(1.01).unwrap() * self.h - self.x_end) * self.posneg > F::zero() {
            self.h = self.x_end - self.x;
            self.last = true;
        }
        self.stats.num_steps += 1;

        // Stage 0 holds the derivative at the current point already.
        for stage in 1..NUM_STEP_STAGES {
            self.evaluate_stage(stage);
        }
        self.propose_solution();
        let err = self.estimate_error();
        self.last_error = err;

        // Lund-stabilized step size proposal, limited to fac1 <= h_new / h <= fac2.
        let beta = settings.effective_beta();
        let expo1 = cast::<_, F>(0.125).unwrap() - beta * cast(0.2).unwrap();
        let facc1 = settings.fac1.recip();
        let facc2 = settings.fac2.recip();
        let fac11 = err.powf(expo1);
        let fac = fac11 / self.facold.powf(beta);
        let fac = facc2.max(facc1.min(fac / settings.safety_factor));
        let h_new = self.h / fac;

        if err <= F::one() {
            self.accept(err, h_new)
        } else {
            self.reject(fac11)
        }
    }

    fn accept(&mut self, err: F, mut h_new: F) -> Iteration {
        let h = self.h;
        self.facold = err.max(cast(1e-4).unwrap());
        self.stats.num_accepted += 1;
        tracing::trace!(x = ?self.x, h = ?h, err = ?err, "step accepted");

        let x_new = if self.last { self.x_end } else { self.x + h };
        self.system
            .system(x_new, self.y_new.view(), self.k.row_mut(FSAL_STAGE));

        if self.detect_stiffness() {
            tracing::warn!(x = ?self.x, hlamb = ?self.hlamb, "problem seems to become stiff");
            self.h_out = h;
            return Iteration::Terminated(Status::ProbablyStiff);
        }

        if self.output == OutputMode::Dense {
            if let Some(dense) = &mut self.dense {
                dense.assemble_from_step(
                    self.x,
                    h,
                    self.y.view(),
                    self.y_new.view(),
                    self.k.view(),
                );
            }
            for stage in FSAL_STAGE + 1..NUM_STAGES {
                self.evaluate_stage(stage);
            }
            if let Some(dense) = &mut self.dense {
                dense.finish(self.k.view());
            }
        }

        // First same as last.
        let (mut first, fsal) = self.k.multi_slice_mut((s![0, ..], s![FSAL_STAGE, ..]));
        first.assign(&fsal);
        self.y.assign(&self.y_new);
        let x_old = self.x;
        self.x = x_new;

        if self.output != OutputMode::None {
            self.h_out = h;
            let control = self.observer.observe(
                self.stats.num_accepted,
                x_old,
                self.x,
                self.y.view(),
                self.dense.as_ref(),
            );
            if control == Control::Stop {
                return Iteration::Terminated(Status::Interrupted);
            }
        }

        if self.last {
            self.h_out = h_new;
            return Iteration::Terminated(Status::Completed);
        }

        if h_new.abs() > self.max_step {
            h_new = self.posneg * self.max_step;
        }
        if self.reject {
            // No growth right after a rejection.
            h_new = self.posneg * h_new.abs().min(h.abs());
        }
        self.reject = false;
        self.h = h_new;
        Iteration::Accepted
    }

    fn reject(&mut self, fac11: F) -> Iteration {
        let settings = self.settings;
        let h_new = self.h / settings.fac1.recip().min(fac11 / settings.safety_factor);
        tracing::trace!(x = ?self.x, h = ?self.h, err = ?self.last_error, "step rejected");

        self.reject = true;
        if self.stats.num_accepted >= 1 {
            self.stats.num_rejected += 1;
        }
        self.last = false;
        self.h = h_new;
        Iteration::Rejected
    }

    /// Evaluate stage `stage` from the rows of `k` before it.
    fn evaluate_stage(&mut self, stage: usize) {
        let h = self.h;
        let k = self.k.view();
        for (i, (y_stage, &y)) in self.y_stage.iter_mut().zip(self.y.iter()).enumerate() {
            *y_stage = y + h * weighted_sum(A[stage], k, i);
        }
        let x = self.x + cast::<_, F>(C[stage]).unwrap() * h;
        self.system
            .system(x, self.y_stage.view(), self.k.row_mut(stage));
    }

    /// Form the 8th order solution `y_new = y + h * sum_i b_i k_i`.
    fn propose_solution(&mut self) {
        let h = self.h;
        let k = self.k.view();
        for (i, (b_sum, y_new)) in self
            .b_sum
            .iter_mut()
            .zip(self.y_new.iter_mut())
            .enumerate()
        {
            *b_sum = weighted_sum(&B, k, i);
            *y_new = self.y[i] + h * *b_sum;
        }
    }

    /// Scaled local error of the proposed solution, blending the 5th and 3rd order estimates.
    fn estimate_error(&self) -> F {
        let settings = self.settings;
        let k = self.k.view();
        let mut err = F::zero();
        let mut err2 = F::zero();
        for i in 0..self.y.len() {
            let sk = settings.abs_tol
                + settings.rel_tol * self.y[i].abs().max(self.y_new[i].abs());
            let erri = BHH
                .iter()
                .fold(self.b_sum[i], |acc, &(j, bhh)| {
                    acc - cast::<_, F>(bhh).unwrap() * k[[j, i]]
                });
            let sqr = erri / sk;
            err2 += sqr * sqr;
            let erri = weighted_sum(&ER, k, i);
            let sqr = erri / sk;
            err += sqr * sqr;
        }

        let mut deno = err + cast::<_, F>(0.01).unwrap() * err2;
        if deno <= F::zero() {
            deno = F::one();
        }
        let n: F = cast(self.y.len()).unwrap();
        self.h.abs() * err * (F::one() / (deno * n)).sqrt()
    }

    /// Update the stiffness estimate after an accepted step. Returns true once the problem is
    /// considered stiff.
    fn detect_stiffness(&mut self) -> bool {
        let Some(interval) = self.settings.stiffness_check_interval else {
            return false;
        };
        if self.stats.num_accepted % interval != 0 && self.stiff_detections == 0 {
            return false;
        }

        // Compare f and y at the last stage and at the new point.
        let last_stage = NUM_STEP_STAGES - 1;
        let mut stnum = F::zero();
        let mut stden = F::zero();
        for i in 0..self.y.len() {
            let d1 = self.k[[FSAL_STAGE, i]] - self.k[[last_stage, i]];
            let d2 = self.y_new[i] - self.y_stage[i];
            stnum += d1 * d1;
            stden += d2 * d2;
        }
        if stden > F::zero() {
            self.hlamb = self.h.abs() * (stnum / stden).sqrt();
        }

        if self.hlamb > cast(STIFFNESS_THRESHOLD).unwrap() {
            self.non_stiff_detections = 0;
            self.stiff_detections += 1;
            self.stiff_detections == MAX_STIFF_DETECTIONS
        } else {
            self.non_stiff_detections += 1;
            if self.non_stiff_detections == NON_STIFF_RESET {
                self.stiff_detections = 0;
            }
            false
        }
    }

    fn finish(mut self, status: Status) -> Result<Integration<F>, Error<F>> {
        self.stats.num_system_evals = self.system.num_system_evals;
        tracing::debug!(
            ?status,
            x = ?self.x,
            num_system_evals = self.stats.num_system_evals,
            num_steps = self.stats.num_steps,
            num_accepted = self.stats.num_accepted,
            num_rejected = self.stats.num_rejected,
            "integration finished"
        );

        let (x, step_size, stats) = (self.x, self.h_out, self.stats);
        match status {
            Status::Completed | Status::Interrupted => Ok(Integration {
                status,
                x,
                step_size,
                stats,
            }),
            Status::MaxStepsExceeded => Err(Error::MaxStepsExceeded {
                x,
                step_size,
                max_steps: self.settings.max_steps,
                stats,
            }),
            Status::StepSizeUnderflow => Err(Error::StepSizeUnderflow {
                x,
                step_size,
                stats,
            }),
            Status::ProbablyStiff => Err(Error::ProbablyStiff {
                x,
                step_size,
                stats,
            }),
        }
    }
}
