use faer::Mat;
use linsolve::{
    faer_add::column, Assembler, CsrMatrix, Driver, FailurePolicy, Float, History, JacobiSolver,
    LinearSystem, Logger, LuSolver, PcgSolver, SimError, SolverConfig, SolverError, StepCtx,
    TimeStep,
};

fn init_logs() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Implicit 1D diffusion `u_t = D u_xx` on `cells` cells of width `dx`,
/// with fixed values on both ends.
struct Diffusion {
    cells: usize,
    dx: Float,
    coeff: Float,
    left: Float,
    right: Float,
}

impl Assembler<CsrMatrix> for Diffusion {
    fn assemble(&mut self, ctx: StepCtx<'_>) -> Result<LinearSystem<CsrMatrix>, SolverError> {
        let n = self.cells;
        let k = self.coeff / (self.dx * self.dx);
        let mut triplets = Vec::with_capacity(3 * n);
        let mut rhs = Mat::<Float>::zeros(n, 1);

        for i in 0..n {
            triplets.push((i, i, 1.0 / ctx.dt));
            rhs.write(i, 0, ctx.old.read(i, 0) / ctx.dt);

            // west face
            if i > 0 {
                triplets.push((i, i, k));
                triplets.push((i, i - 1, -k));
            } else {
                // boundary face sits half a cell away
                triplets.push((i, i, 2.0 * k));
                rhs.write(i, 0, rhs.read(i, 0) + 2.0 * k * self.left);
            }
            // east face
            if i + 1 < n {
                triplets.push((i, i, k));
                triplets.push((i, i + 1, -k));
            } else {
                triplets.push((i, i, 2.0 * k));
                rhs.write(i, 0, rhs.read(i, 0) + 2.0 * k * self.right);
            }
        }

        LinearSystem::new(CsrMatrix::from_triplets(n, n, triplets)?, rhs)
    }
}

fn diffusion(cells: usize) -> Diffusion {
    Diffusion {
        cells,
        dx: 1.0 / cells as Float,
        coeff: 1.0,
        left: 0.0,
        right: 1.0,
    }
}

#[test]
fn reaches_linear_steady_state() {
    init_logs();
    let cells = 20;
    let mut history = History::default();
    let mut x = Mat::<Float>::zeros(cells, 1);

    let summary = Driver::new(
        PcgSolver::new(SolverConfig::new(1e-12, 200).unwrap()),
        diffusion(cells),
    )
    .with_steps(40)
    .with_time_step(TimeStep::exponential_ramp(-5.0, 0.5, 100.0).unwrap())
    .with_observer(Logger)
    .with_observer(&mut history)
    .run(x.as_mut())
    .unwrap();

    assert_eq!(summary.steps, 40);
    assert_eq!(summary.solves, 40);
    assert_eq!(summary.not_converged, 0);
    assert_eq!(summary.diverged, 0);

    // steady profile is u(x) = x at cell centers
    for i in 0..cells {
        let center = (i as Float + 0.5) / cells as Float;
        assert!((x.read(i, 0) - center).abs() < 1e-6, "cell {i}");
    }

    // dt follows the ramp and is capped
    let dts: Vec<_> = history.records().iter().map(|r| r.dt).collect();
    assert_eq!(dts[0], (-5.0_f64).exp());
    assert!(dts.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*dts.last().unwrap(), 100.0);

    let expected_time: Float = dts.iter().sum();
    assert!((summary.time - expected_time).abs() < 1e-9);
}

#[test]
fn keeps_stepping_past_unconverged_solves() {
    init_logs();
    let cells = 50;
    let mut history = History::default();
    let mut x = Mat::<Float>::zeros(cells, 1);

    // two Jacobi sweeps cannot converge a stiff diffusion step
    let summary = Driver::new(
        JacobiSolver::new(SolverConfig::new(1e-12, 2).unwrap()),
        diffusion(cells),
    )
    .with_steps(5)
    .with_time_step(TimeStep::fixed(1.0).unwrap())
    .with_observer(&mut history)
    .run(x.as_mut())
    .unwrap();

    assert_eq!(summary.steps, 5);
    assert_eq!(summary.not_converged, 5);
    assert_eq!(summary.diverged, 0);
    assert!(history.records().iter().all(|r| !r.outcome.converged));
    assert_eq!(summary.last.map(|o| o.iterations), Some(2));
}

#[test]
fn strict_policy_stops_on_first_unconverged_solve() {
    let cells = 50;
    let mut x = Mat::<Float>::zeros(cells, 1);

    let err = Driver::new(
        JacobiSolver::new(SolverConfig::new(1e-12, 2).unwrap()),
        diffusion(cells),
    )
    .with_steps(5)
    .with_failure_policy(FailurePolicy::Strict)
    .run(x.as_mut())
    .unwrap_err();

    assert!(matches!(err, SimError::NotConverged { step: 0, sweep: 0, .. }));
}

// Jacobi on a matrix without diagonal dominance blows up
fn unstable(_: StepCtx<'_>) -> Result<LinearSystem<CsrMatrix>, SolverError> {
    let a = CsrMatrix::from_triplets(2, 2, [(0, 0, 1.0), (0, 1, 3.0), (1, 0, 3.0), (1, 1, 1.0)])?;
    LinearSystem::new(a, column(&[4.0, 4.0]))
}

#[test]
fn divergence_aborts_by_default() {
    init_logs();
    let mut x = column(&[0.0, 0.0]);

    let err = Driver::new(
        JacobiSolver::new(SolverConfig::new(1e-10, 500).unwrap()),
        unstable,
    )
    .with_steps(3)
    .run(x.as_mut())
    .unwrap_err();

    assert!(matches!(err, SimError::Diverged { step: 0, sweep: 0, .. }));
    assert!(x.read(0, 0).is_finite() && x.read(1, 0).is_finite());
}

#[test]
fn tolerate_policy_runs_through_divergence() {
    let mut x = column(&[0.0, 0.0]);

    let summary = Driver::new(
        JacobiSolver::new(SolverConfig::new(1e-10, 30).unwrap()),
        unstable,
    )
    .with_steps(2)
    .with_failure_policy(FailurePolicy::Tolerate)
    .run(x.as_mut())
    .unwrap();

    assert_eq!(summary.steps, 2);
    assert_eq!(summary.solves, 2);
    assert!(summary.diverged >= 1);
}

#[test]
fn asymmetric_assembly_needs_a_capable_solver() {
    // upwinded convection makes the matrix asymmetric
    let convection = |ctx: StepCtx<'_>| -> Result<LinearSystem<CsrMatrix>, SolverError> {
        let n = ctx.old.nrows();
        let triplets = (0..n).flat_map(|i| {
            let mut t = vec![(i, i, 1.0 / ctx.dt + 1.0)];
            if i > 0 {
                t.push((i, i - 1, -1.0));
            }
            t
        });
        let rhs = Mat::<Float>::from_fn(n, 1, |i, _| ctx.old.read(i, 0) / ctx.dt);
        LinearSystem::new(CsrMatrix::from_triplets(n, n, triplets)?, rhs)
    };

    let mut x = column(&[1.0, 0.0, 0.0, 0.0]);
    let err = Driver::new(PcgSolver::default(), convection)
        .run(x.as_mut())
        .unwrap_err();
    assert_eq!(err, SimError::Solver(SolverError::AsymmetricMatrix));

    let summary = Driver::new(LuSolver::default(), convection)
        .with_steps(3)
        .run(x.as_mut())
        .unwrap();
    assert_eq!(summary.not_converged, 0);
    // mass moves downstream
    assert!(x.read(3, 0) > 0.0);
}
