//! Errors and terminal states of an integration run.

use thiserror::Error;

use crate::{Float, Stats};

/// How an integration run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    /// The endpoint was reached.
    Completed,
    /// The observer asked to stop.
    Interrupted,
    /// The maximum number of step attempts was used up.
    MaxStepsExceeded,
    /// The step size became negligible relative to `x`.
    StepSizeUnderflow,
    /// Stiffness detection concluded the problem is probably stiff.
    ProbablyStiff,
}

impl Status {
    /// Numeric status code as reported by the classic DOP853 interface.
    ///
    /// Positive codes are successes, negative codes failures.
    pub fn code(self) -> i32 {
        match self {
            Status::Completed => 1,
            Status::Interrupted => 2,
            Status::MaxStepsExceeded => -2,
            Status::StepSizeUnderflow => -3,
            Status::ProbablyStiff => -4,
        }
    }

    /// Whether the run ended without failure.
    pub fn is_success(self) -> bool {
        self.code() > 0
    }
}

/// Errors produced by the integrator.
///
/// The run-terminating variants carry the position reached and the step size in use; the
/// state vector passed to the integrator holds the solution at that position.
#[derive(Debug, Error)]
pub enum Error<F: Float> {
    /// The settings are inconsistent.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// The state vector has no components.
    #[error("state vector is empty")]
    EmptyState,

    /// More step attempts were needed than allowed.
    #[error("maximum number of steps ({max_steps}) exceeded at x = {x:?}")]
    MaxStepsExceeded {
        /// Position reached.
        x: F,
        /// Step size about to be attempted.
        step_size: F,
        /// The step limit.
        max_steps: usize,
        /// Counters of the run.
        stats: Stats,
    },

    /// The step size fell below what can be resolved at the current position.
    #[error("step size {step_size:?} too small at x = {x:?}")]
    StepSizeUnderflow {
        /// Position reached.
        x: F,
        /// Step size about to be attempted.
        step_size: F,
        /// Counters of the run.
        stats: Stats,
    },

    /// The problem appears to be stiff.
    #[error("problem seems to become stiff at x = {x:?}")]
    ProbablyStiff {
        /// Position reached.
        x: F,
        /// Step size of the last accepted step.
        step_size: F,
        /// Counters of the run.
        stats: Stats,
    },
}

impl<F: Float> Error<F> {
    /// The terminal status this error corresponds to, if it ended a run.
    pub fn status(&self) -> Option<Status> {
        match self {
            Error::InvalidSettings(_) | Error::EmptyState => None,
            Error::MaxStepsExceeded { .. } => Some(Status::MaxStepsExceeded),
            Error::StepSizeUnderflow { .. } => Some(Status::StepSizeUnderflow),
            Error::ProbablyStiff { .. } => Some(Status::ProbablyStiff),
        }
    }

    /// Counters of the run, if it got started.
    pub fn stats(&self) -> Option<&Stats> {
        match self {
            Error::InvalidSettings(_) | Error::EmptyState => None,
            Error::MaxStepsExceeded { stats, .. }
            | Error::StepSizeUnderflow { stats, .. }
            | Error::ProbablyStiff { stats, .. } => Some(stats),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes() {
        assert_eq!(Status::Completed.code(), 1);
        assert_eq!(Status::Interrupted.code(), 2);
        assert_eq!(Status::MaxStepsExceeded.code(), -2);
        assert_eq!(Status::StepSizeUnderflow.code(), -3);
        assert!(Status::Interrupted.is_success());
        assert!(!Status::ProbablyStiff.is_success());
    }

    #[test]
    fn display() {
        let error = Error::<f64>::StepSizeUnderflow {
            x: 1.5,
            step_size: 1e-17,
            stats: Stats::default(),
        };
        assert_eq!(error.to_string(), "step size 1e-17 too small at x = 1.5");
        assert_eq!(error.status(), Some(Status::StepSizeUnderflow));
        assert_eq!(Error::<f32>::EmptyState.status(), None);
    }
}
