//! Tuning parameters of the integrator.

use num_traits::cast;

use crate::{Error, Float};

/// Configuration of an integration run.
///
/// The defaults follow Hairer & Wanner's DOP853. Prefer the `with_*` builder methods on
/// [`Integrator`](crate::Integrator); this struct is exposed so that a whole configuration
/// can be stored or, with the `serde` feature, deserialized.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Settings<F: Float> {
    /// Absolute tolerance.
    pub abs_tol: F,
    /// Relative tolerance.
    pub rel_tol: F,
    /// Maximum magnitude of the step size. Defaults to the length of the integration interval.
    pub max_step: Option<F>,
    /// Initial step size. Estimated automatically if `None` or zero.
    pub initial_step: Option<F>,
    /// Number of step attempts (accepted plus rejected) the run may exceed by at most one
    /// before failing with [`Error::MaxStepsExceeded`].
    pub max_steps: usize,
    /// Unit roundoff, used to detect step size underflow.
    pub uround: F,
    /// Safety factor applied to the optimal step size.
    pub safety_factor: F,
    /// Lower bound on `h_new / h`.
    pub fac1: F,
    /// Upper bound on `h_new / h`.
    pub fac2: F,
    /// Exponent of the Lund stabilization term. Zero disables it.
    pub beta: F,
    /// Whether to assemble dense-output coefficients after each accepted step.
    pub dense_output: bool,
    /// Check for stiffness every this many accepted steps. `None` disables the check.
    pub stiffness_check_interval: Option<usize>,
}

impl<F: Float> Default for Settings<F> {
    fn default() -> Self {
        Self {
            abs_tol: cast(1e-6).unwrap(),
            rel_tol: cast(1e-6).unwrap(),
            max_step: None,
            initial_step: None,
            max_steps: 100_000,
            uround: cast(2.3e-16).unwrap(),
            safety_factor: cast(0.9).unwrap(),
            fac1: cast(0.333).unwrap(),
            fac2: cast(6.).unwrap(),
            beta: F::zero(),
            dense_output: false,
            stiffness_check_interval: None,
        }
    }
}

impl<F: Float> Settings<F> {
    /// Check that the settings describe a usable configuration.
    pub fn validate(&self) -> Result<(), Error<F>> {
        let invalid = |message: String| Err(Error::InvalidSettings(message));

        if !(self.abs_tol >= F::zero() && self.rel_tol >= F::zero()) {
            return invalid(format!(
                "tolerances must be non-negative, got abs_tol = {:?}, rel_tol = {:?}",
                self.abs_tol, self.rel_tol
            ));
        }
        if self.abs_tol + self.rel_tol <= F::zero() {
            return invalid("abs_tol and rel_tol must not both be zero".into());
        }
        if !(self.uround > cast(1e-35).unwrap() && self.uround < F::one()) {
            return invalid(format!("uround must be in (1e-35, 1), got {:?}", self.uround));
        }
        if !(self.safety_factor > cast(1e-4).unwrap() && self.safety_factor < F::one()) {
            return invalid(format!(
                "safety_factor must be in (1e-4, 1), got {:?}",
                self.safety_factor
            ));
        }
        if !(self.fac1 > F::zero() && self.fac1 <= F::one()) {
            return invalid(format!("fac1 must be in (0, 1], got {:?}", self.fac1));
        }
        if !(self.fac2 >= F::one()) {
            return invalid(format!("fac2 must be at least 1, got {:?}", self.fac2));
        }
        if self.beta > cast(0.2).unwrap() {
            return invalid(format!("beta must be at most 0.2, got {:?}", self.beta));
        }
        if self.max_steps == 0 {
            return invalid("max_steps must be positive".into());
        }
        if let Some(max_step) = self.max_step {
            if !(max_step > F::zero()) {
                return invalid(format!("max_step must be positive, got {max_step:?}"));
            }
        }
        if self.stiffness_check_interval == Some(0) {
            return invalid("stiffness_check_interval must be positive".into());
        }
        Ok(())
    }

    /// The Lund stabilization exponent actually used; negative values disable stabilization.
    pub(crate) fn effective_beta(&self) -> F {
        self.beta.max(F::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Settings::<f64>::default().validate().unwrap();
        Settings::<f32>::default().validate().unwrap();
    }

    #[test]
    fn rejects_bad_tolerances() {
        let settings = Settings::<f64> {
            abs_tol: 0.,
            rel_tol: 0.,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidSettings(_))));

        let settings = Settings::<f64> {
            abs_tol: -1e-6,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidSettings(_))));

        let settings = Settings::<f64> {
            rel_tol: f64::NAN,
            ..Default::default()
        };
        assert!(matches!(settings.validate(), Err(Error::InvalidSettings(_))));
    }

    #[test]
    fn rejects_bad_controller_parameters() {
        let cases = [
            Settings::<f64> {
                safety_factor: 1.,
                ..Default::default()
            },
            Settings {
                uround: 0.,
                ..Default::default()
            },
            Settings {
                fac1: 2.,
                ..Default::default()
            },
            Settings {
                fac2: 0.5,
                ..Default::default()
            },
            Settings {
                beta: 0.3,
                ..Default::default()
            },
            Settings {
                max_steps: 0,
                ..Default::default()
            },
            Settings {
                max_step: Some(-1.),
                ..Default::default()
            },
            Settings {
                stiffness_check_interval: Some(0),
                ..Default::default()
            },
        ];
        for settings in cases {
            assert!(
                matches!(settings.validate(), Err(Error::InvalidSettings(_))),
                "{settings:?}"
            );
        }
    }

    #[test]
    fn negative_beta_disables_stabilization() {
        let settings = Settings::<f64> {
            beta: -0.1,
            ..Default::default()
        };
        settings.validate().unwrap();
        assert_eq!(settings.effective_beta(), 0.);
    }
}
