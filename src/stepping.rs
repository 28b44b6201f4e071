use crate::{error::SolverError, Float};

/// How the time step evolves over a run. Independent of solver success.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeStep {
    Fixed(Float),
    /// `dt_n = min(max, exp(exponent + n * increment))`
    ExponentialRamp {
        exponent: Float,
        increment: Float,
        max: Float,
    },
}

impl Default for TimeStep {
    fn default() -> Self {
        TimeStep::Fixed(1.0)
    }
}

impl TimeStep {
    pub fn fixed(dt: Float) -> Result<Self, SolverError> {
        TimeStep::Fixed(dt).validate()
    }

    pub fn exponential_ramp(
        exponent: Float,
        increment: Float,
        max: Float,
    ) -> Result<Self, SolverError> {
        TimeStep::ExponentialRamp {
            exponent,
            increment,
            max,
        }
        .validate()
    }

    pub(crate) fn validate(self) -> Result<Self, SolverError> {
        let ok = match self {
            TimeStep::Fixed(dt) => dt.is_finite() && dt > 0.0,
            TimeStep::ExponentialRamp {
                exponent,
                increment,
                max,
            } => exponent.is_finite() && increment.is_finite() && max > 0.0,
        };
        if ok {
            Ok(self)
        } else {
            Err(SolverError::InvalidConfig(format!(
                "invalid time step policy {self:?}"
            )))
        }
    }

    /// Step size of step `n`.
    pub fn dt(&self, n: usize) -> Float {
        match *self {
            TimeStep::Fixed(dt) => dt,
            TimeStep::ExponentialRamp {
                exponent,
                increment,
                max,
            } => (exponent + increment * n as Float).exp().min(max),
        }
    }

    pub fn iter(self) -> impl Iterator<Item = Float> {
        (0..).map(move |n| self.dt(n))
    }
}
