use faer::Mat;
use tracing::info;

use linsolve::{
    AnySolver, CsrMatrix, Driver, Float, LinearSystem, Logger, SimError, Solver, SolverConfig,
    SolverError, StepCtx,
};

// steady convection-diffusion `(D u' - v u)' = 0` on [0, 1], u(0) = 0, u(1) = 1,
// exponential scheme on a uniform cell-centered grid
fn assemble(
    cells: usize,
    diff: Float,
    velocity: Float,
) -> Result<LinearSystem<CsrMatrix>, SolverError> {
    let dx = 1.0 / cells as Float;
    // face weight of the exponential scheme for a diffusive conductance `d`
    let weight = |d: Float| {
        let peclet = (velocity / d).abs();
        if peclet < 1e-12 {
            d
        } else {
            d * peclet / peclet.exp_m1()
        }
    };
    let (left, right) = (0.0, 1.0);

    let mut triplets = Vec::new();
    let mut rhs = Mat::<Float>::zeros(cells, 1);
    for i in 0..cells {
        // interior faces have conductance D / dx, boundary faces 2 D / dx
        let dw = if i == 0 { 2.0 * diff / dx } else { diff / dx };
        let de = if i + 1 == cells { 2.0 * diff / dx } else { diff / dx };
        let aw = weight(dw) + velocity.max(0.0);
        let ae = weight(de) + (-velocity).max(0.0);

        triplets.push((i, i, aw + ae));
        if i > 0 {
            triplets.push((i, i - 1, -aw));
        } else {
            rhs.write(i, 0, rhs.read(i, 0) + aw * left);
        }
        if i + 1 < cells {
            triplets.push((i, i + 1, -ae));
        } else {
            rhs.write(i, 0, rhs.read(i, 0) + ae * right);
        }
    }

    LinearSystem::new(CsrMatrix::from_triplets(cells, cells, triplets)?, rhs)
}

fn main() -> Result<(), SimError> {
    tracing_subscriber::fmt::init();

    let (cells, diff, velocity) = (100, 1.0, 10.0);

    info!("setting up problem ({cells} cells, D={diff}, v={velocity})");

    let system = assemble(cells, diff, velocity)?;
    let config = SolverConfig::new(1e-12, 100)?;
    let solver = AnySolver::for_system(&system, config);

    info!("using `{}` solver", solver.name());

    let mut x = Mat::<Float>::zeros(cells, 1);
    let mut system = Some(system);
    let summary = Driver::new(solver, move |_: StepCtx<'_>| match system.take() {
        Some(system) => Ok(system),
        None => assemble(cells, diff, velocity),
    })
    .with_observer(Logger)
    .run(x.as_mut())?;

    let peclet = velocity / diff;
    let max_error = (0..cells)
        .map(|i| {
            let xc = (i as Float + 0.5) / cells as Float;
            let exact = (peclet * xc).exp_m1() / peclet.exp_m1();
            (x.read(i, 0) - exact).abs()
        })
        .fold(0.0, Float::max);

    info!(
        "done: {} solve(s), max deviation from analytical profile {max_error:e}",
        summary.solves
    );

    Ok(())
}
