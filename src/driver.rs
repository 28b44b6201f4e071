use std::marker::PhantomData;

use faer_core::{MatMut, MatRef};
use reborrow::*;

use crate::{
    error::{SimError, SolverError},
    matrix::Operator,
    outcome::{SolveOutcome, Status},
    solver::Solver,
    stepping::TimeStep,
    system::LinearSystem,
    Float,
};

/// What the assembler gets to build the system of one solve.
#[derive(Debug, Clone, Copy)]
pub struct StepCtx<'ctx> {
    pub step: usize,
    pub sweep: usize,
    pub time: Float,
    pub dt: Float,
    /// Current iterate, updated by every sweep.
    pub solution: MatRef<'ctx, Float>,
    /// Solution at the start of the step.
    pub old: MatRef<'ctx, Float>,
}

/// Builds a fresh linear system from the current field state.
pub trait Assembler<A: Operator> {
    fn assemble(&mut self, ctx: StepCtx<'_>) -> Result<LinearSystem<A>, SolverError>;
}

impl<A: Operator, F> Assembler<A> for F
where
    F: FnMut(StepCtx<'_>) -> Result<LinearSystem<A>, SolverError>,
{
    fn assemble(&mut self, ctx: StepCtx<'_>) -> Result<LinearSystem<A>, SolverError> {
        self(ctx)
    }
}

/// What the driver does with a solve that did not converge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Keep going whatever the outcome.
    Tolerate,
    /// Keep going past non-convergence, stop on divergence.
    #[default]
    AbortOnDivergence,
    /// Stop on any solve that did not converge.
    Strict,
}

pub struct ObsCtx<'ctx> {
    solver: &'static str,
    step: usize,
    sweep: usize,
    time: Float,
    dt: Float,
    solution: MatRef<'ctx, Float>,
}

impl<'ctx> ObsCtx<'ctx> {
    pub fn solver(&self) -> &'static str {
        self.solver
    }

    pub fn step(&self) -> usize {
        self.step
    }

    pub fn sweep(&self) -> usize {
        self.sweep
    }

    pub fn time(&self) -> Float {
        self.time
    }

    pub fn dt(&self) -> Float {
        self.dt
    }

    pub fn solution(&self) -> MatRef<'_, Float> {
        self.solution
    }
}

#[allow(unused_variables)]
pub trait Observer {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        Ok(())
    }

    fn at_each_solve(&mut self, ctx: ObsCtx, outcome: &SolveOutcome) -> Result<(), SimError> {
        Ok(())
    }

    fn at_cleanup(&mut self, ctx: ObsCtx, summary: &RunSummary) -> Result<(), SimError> {
        Ok(())
    }
}

impl<O: Observer + ?Sized> Observer for &mut O {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        (**self).at_startup(ctx)
    }

    fn at_each_solve(&mut self, ctx: ObsCtx, outcome: &SolveOutcome) -> Result<(), SimError> {
        (**self).at_each_solve(ctx, outcome)
    }

    fn at_cleanup(&mut self, ctx: ObsCtx, summary: &RunSummary) -> Result<(), SimError> {
        (**self).at_cleanup(ctx, summary)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RunSummary {
    pub steps: usize,
    pub solves: usize,
    pub not_converged: usize,
    pub diverged: usize,
    /// Time reached at the end of the last completed step.
    pub time: Float,
    pub last: Option<SolveOutcome>,
}

impl RunSummary {
    fn record(&mut self, outcome: &SolveOutcome) {
        self.solves += 1;
        match outcome.status() {
            Status::Converged => {}
            Status::NotConverged => self.not_converged += 1,
            Status::Diverged => self.diverged += 1,
        }
        self.last = Some(*outcome);
    }
}

/// Repeated assemble/solve cycles over time steps and nonlinear sweeps.
pub struct Driver<'d, S, A, P> {
    solver: S,
    assembler: P,
    time_step: TimeStep,
    start_time: Float,
    steps: usize,
    sweeps: usize,
    policy: FailurePolicy,
    observers: Vec<Box<dyn Observer + 'd>>,
    _marker: PhantomData<fn() -> A>,
}

impl<'d, S: Solver, A: Operator, P: Assembler<A>> Driver<'d, S, A, P> {
    /// A single step of a single sweep, `dt = 1`.
    pub fn new(solver: S, assembler: P) -> Self {
        Self {
            solver,
            assembler,
            time_step: TimeStep::default(),
            start_time: 0.0,
            steps: 1,
            sweeps: 1,
            policy: FailurePolicy::default(),
            observers: Vec::new(),
            _marker: PhantomData,
        }
    }

    pub fn with_steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    /// Nonlinear sub-iterations per step, at least one.
    pub fn with_sweeps(mut self, sweeps: usize) -> Self {
        self.sweeps = sweeps.max(1);
        self
    }

    pub fn with_time_step(mut self, time_step: TimeStep) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_start_time(mut self, time: Float) -> Self {
        self.start_time = time;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'd) -> Self {
        self.observers.push(Box::new(observer));
        self
    }

    pub fn solver(&self) -> &S {
        &self.solver
    }

    /// Runs every step, updating `x` in place. `x` holds the initial
    /// condition on entry.
    pub fn run(&mut self, mut x: MatMut<'_, Float>) -> Result<RunSummary, SimError> {
        let name = self.solver.name();
        let mut old = x.rb().to_owned();
        let mut time = self.start_time;
        let mut summary = RunSummary {
            time,
            ..RunSummary::default()
        };

        for o in self.observers.iter_mut() {
            o.at_startup(ObsCtx {
                solver: name,
                step: 0,
                sweep: 0,
                time,
                dt: self.time_step.dt(0),
                solution: x.rb(),
            })?;
        }

        for step in 0..self.steps {
            let dt = self.time_step.dt(step);
            old.as_mut().clone_from(x.rb());

            for sweep in 0..self.sweeps {
                let system = self.assembler.assemble(StepCtx {
                    step,
                    sweep,
                    time,
                    dt,
                    solution: x.rb(),
                    old: old.as_ref(),
                })?;
                let outcome = self.solver.solve(&system, x.rb_mut())?;
                summary.record(&outcome);

                match outcome.status() {
                    Status::Converged => {}
                    Status::NotConverged => tracing::event!(
                        tracing::Level::WARN,
                        "step {step} (sweep {sweep}): `{name}` not converged ({outcome})"
                    ),
                    Status::Diverged => tracing::event!(
                        tracing::Level::WARN,
                        "step {step} (sweep {sweep}): `{name}` diverged ({outcome})"
                    ),
                }

                for o in self.observers.iter_mut() {
                    o.at_each_solve(
                        ObsCtx {
                            solver: name,
                            step,
                            sweep,
                            time,
                            dt,
                            solution: x.rb(),
                        },
                        &outcome,
                    )?;
                }

                match (outcome.status(), self.policy) {
                    (Status::Diverged, FailurePolicy::AbortOnDivergence | FailurePolicy::Strict) => {
                        return Err(SimError::Diverged {
                            step,
                            sweep,
                            residual: outcome.residual,
                        })
                    }
                    (Status::NotConverged, FailurePolicy::Strict) => {
                        return Err(SimError::NotConverged {
                            step,
                            sweep,
                            residual: outcome.residual,
                        })
                    }
                    _ => {}
                }
            }

            time += dt;
            summary.steps += 1;
            summary.time = time;
        }

        for o in self.observers.iter_mut() {
            o.at_cleanup(
                ObsCtx {
                    solver: name,
                    step: self.steps,
                    sweep: 0,
                    time,
                    dt: self.time_step.dt(self.steps),
                    solution: x.rb(),
                },
                &summary,
            )?;
        }

        Ok(summary)
    }
}

pub struct Logger;

impl Observer for Logger {
    fn at_startup(&mut self, ctx: ObsCtx) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::INFO,
            "start of run (`{}` solver, {} unknowns, t={:e}, Δt={:e})",
            ctx.solver(),
            ctx.solution().nrows(),
            ctx.time(),
            ctx.dt(),
        );
        Ok(())
    }

    fn at_each_solve(&mut self, ctx: ObsCtx, outcome: &SolveOutcome) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::TRACE,
            "step {} sweep {} (t={:e}, Δt={:e}): {}",
            ctx.step(),
            ctx.sweep(),
            ctx.time(),
            ctx.dt(),
            outcome
        );
        Ok(())
    }

    fn at_cleanup(&mut self, _ctx: ObsCtx, summary: &RunSummary) -> Result<(), SimError> {
        tracing::event!(
            tracing::Level::INFO,
            "finished run: {} steps, {} solves ({} not converged, {} diverged), t={:e}",
            summary.steps,
            summary.solves,
            summary.not_converged,
            summary.diverged,
            summary.time
        );
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SolveRecord {
    pub step: usize,
    pub sweep: usize,
    pub time: Float,
    pub dt: Float,
    pub outcome: SolveOutcome,
}

/// Keeps every solve outcome in memory.
#[derive(Debug, Clone, Default)]
pub struct History {
    records: Vec<SolveRecord>,
}

impl History {
    pub fn records(&self) -> &[SolveRecord] {
        &self.records
    }
}

impl Observer for History {
    fn at_startup(&mut self, _ctx: ObsCtx) -> Result<(), SimError> {
        self.records.clear();
        Ok(())
    }

    fn at_each_solve(&mut self, ctx: ObsCtx, outcome: &SolveOutcome) -> Result<(), SimError> {
        self.records.push(SolveRecord {
            step: ctx.step(),
            sweep: ctx.sweep(),
            time: ctx.time(),
            dt: ctx.dt(),
            outcome: *outcome,
        });
        Ok(())
    }
}
