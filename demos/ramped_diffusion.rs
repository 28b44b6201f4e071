use faer::Mat;
use tracing::info;

use linsolve::{
    faer_add::{column, norm_l2},
    CsrMatrix, Driver, Float, History, LinearSystem, Logger, PcgSolver,
    Preconditioning, SimError, SolverConfig, SolverError, StepCtx, TimeStep,
};

// implicit heat equation on an nx x ny grid with insulated walls, a random
// initial field and a time step growing exponentially
fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt::init();

    let (nx, ny) = (40, 40);
    let n = nx * ny;
    let dx = 0.25;
    let coeff = 1.0;
    let k = coeff / (dx * dx);
    let steps = 200;

    info!("setting up problem ({nx}x{ny} cells)");

    // cheap deterministic pseudo-random field in [0, 1)
    let mut seed: u64 = 0x2545_f491_4f6c_dd1d;
    let field: Vec<Float> = (0..n)
        .map(|_| {
            seed ^= seed << 13;
            seed ^= seed >> 7;
            seed ^= seed << 17;
            (seed >> 11) as Float / (1u64 << 53) as Float
        })
        .collect();
    let mut x = column(&field);
    let mean_before: Float = (0..n).map(|i| x.read(i, 0)).sum::<Float>() / n as Float;

    let assemble = move |ctx: StepCtx<'_>| -> Result<LinearSystem<CsrMatrix>, SolverError> {
        let mut triplets = Vec::with_capacity(5 * n);
        let rhs = Mat::<Float>::from_fn(n, 1, |i, _| ctx.old.read(i, 0) / ctx.dt);
        for j in 0..ny {
            for i in 0..nx {
                let p = j * nx + i;
                triplets.push((p, p, 1.0 / ctx.dt));
                let neighbours = [
                    (i > 0).then(|| p - 1),
                    (i + 1 < nx).then(|| p + 1),
                    (j > 0).then(|| p - nx),
                    (j + 1 < ny).then(|| p + nx),
                ];
                for q in neighbours.into_iter().flatten() {
                    triplets.push((p, p, k));
                    triplets.push((p, q, -k));
                }
            }
        }
        LinearSystem::new(CsrMatrix::from_triplets(n, n, triplets)?, rhs)
    };

    let solver = PcgSolver::new(SolverConfig::new(1e-12, 1000)?)
        .with_preconditioning(Preconditioning::Ssor { omega: 1.2 })?;

    let mut history = History::default();
    let summary = Driver::new(solver, assemble)
        .with_steps(steps)
        .with_time_step(TimeStep::exponential_ramp(-5.0, 0.01 * 5.0, 100.0)?)
        .with_observer(Logger)
        .with_observer(&mut history)
        .run(x.as_mut())?;

    let iterations: usize = history
        .records()
        .iter()
        .map(|r| r.outcome.iterations)
        .sum();
    let mean_after: Float = (0..n).map(|i| x.read(i, 0)).sum::<Float>() / n as Float;
    let spread = {
        let centered = Mat::<Float>::from_fn(n, 1, |i, _| x.read(i, 0) - mean_after);
        norm_l2(centered.as_ref()) / (n as Float).sqrt()
    };

    info!(
        "done: t={:e} after {} steps, {} PCG iterations in total",
        summary.time, summary.steps, iterations
    );
    info!("mean {mean_before:.6} -> {mean_after:.6}, remaining spread {spread:e}");

    Ok(())
}
