//! Linear-system solvers for finite-volume PDE discretizations.
//!
//! Assembly produces a [`LinearSystem`] each step; a [`Solver`] updates the
//! solution in place and reports a [`SolveOutcome`]; the [`Driver`] repeats
//! this over time steps and decides what to do with unconverged solves.

pub mod config;
pub mod driver;
pub mod error;
pub mod faer_add;
pub mod matrix;
pub mod outcome;
pub mod solver;
pub mod stepping;
pub mod system;

pub use faer_add::Float;

pub use config::SolverConfig;
pub use driver::{
    Assembler, Driver, FailurePolicy, History, Logger, ObsCtx, Observer, RunSummary, SolveRecord,
    StepCtx,
};
pub use error::{SimError, SolverError};
pub use matrix::{CsrMatrix, Operator};
pub use outcome::{SolveOutcome, Status};
pub use solver::{AnySolver, JacobiSolver, LuSolver, PcgSolver, Preconditioning, Solver};
pub use stepping::TimeStep;
pub use system::LinearSystem;
