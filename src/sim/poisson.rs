// Iterative relaxation solver for the pressure poisson equation.

use clap::ValueEnum;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{ScalarField, sim::field::GridLayout};

pub const TARGET_MAX_DELTA: f64 = 1e-5; // largest per-cell change accepted as converged
pub const DEFAULT_ITERATION_BUDGET: usize = 600; // sweeps before giving up on convergence
pub const JACOBI_WEIGHT: f64 = 2.0 / 3.0; // damping for the synchronous update

/// Relaxation strategy used for the pressure solve
#[derive(Serialize, Deserialize, ValueEnum, Clone, Copy, Debug, Default, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Relaxation {
    /// In-place row-major sweep; each update sees earlier updates of the same sweep
    #[default]
    GaussSeidel,

    /// Synchronous (weighted) update computed entirely from the previous iterate
    Jacobi,
}

/// Outcome of one pressure solve. Running out of budget is not an error;
/// the last iterate is still used.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolveReport {
    pub converged: bool,

    /// Sweeps performed
    pub iterations: usize,

    /// Largest per-cell change during the final sweep
    pub max_delta: f64,
}

/// A relaxation strategy together with the scratch storage it needs.
#[derive(Clone, Debug)]
pub enum Relaxer {
    GaussSeidel,
    Jacobi { scratch: ScalarField },
}

impl Relaxer {
    pub fn new(relaxation: Relaxation, layout: &GridLayout) -> Self {
        match relaxation {
            Relaxation::GaussSeidel => Relaxer::GaussSeidel,
            Relaxation::Jacobi => Relaxer::Jacobi {
                scratch: layout.zeros(),
            },
        }
    }

    pub fn kind(&self) -> Relaxation {
        match self {
            Relaxer::GaussSeidel => Relaxation::GaussSeidel,
            Relaxer::Jacobi { .. } => Relaxation::Jacobi,
        }
    }

    /// Run one sweep over `pressure` and return the largest change.
    ///
    /// Parameters
    /// - `rhs` - The right-hand side (negated, scaled divergence)
    /// - `pressure` - The current iterate, updated in place
    /// - `scale` - The stencil coefficient, `dt / (density * hx²)`
    pub fn relax(&mut self, rhs: &ScalarField, pressure: &mut ScalarField, scale: f64) -> f64 {
        match self {
            Relaxer::GaussSeidel => gauss_seidel_sweep(rhs, pressure, scale),
            Relaxer::Jacobi { scratch } => {
                let max_delta = jacobi_sweep(rhs, pressure, scratch, scale);
                std::mem::swap(pressure, scratch);
                max_delta
            }
        }
    }

    /// Relax until the largest change drops below [`TARGET_MAX_DELTA`] or the
    /// budget of sweeps is spent.
    pub fn solve(
        &mut self,
        rhs: &ScalarField,
        pressure: &mut ScalarField,
        scale: f64,
        budget: usize,
    ) -> SolveReport {
        let mut max_delta = 0.0;

        for iter in 0..budget {
            max_delta = self.relax(rhs, pressure, scale);

            if max_delta < TARGET_MAX_DELTA {
                return SolveReport {
                    converged: true,
                    iterations: iter + 1,
                    max_delta,
                };
            }
        }

        SolveReport {
            converged: false,
            iterations: budget,
            max_delta,
        }
    }
}

/// Updated value of cell `(x, y)` from the 5-point stencil. Neighbours past
/// the domain edge are dropped from both the diagonal and the off-diagonal
/// sum (zero normal gradient).
fn stencil_update(p: &ScalarField, rhs: f64, x: usize, y: usize, scale: f64) -> f64 {
    let (w, h) = p.shape();
    let (mut diag, mut off_diag) = (0.0, 0.0);

    if x > 0 {
        diag += scale;
        off_diag -= scale * p[(x - 1, y)];
    }
    if y > 0 {
        diag += scale;
        off_diag -= scale * p[(x, y - 1)];
    }
    if x < w - 1 {
        diag += scale;
        off_diag -= scale * p[(x + 1, y)];
    }
    if y < h - 1 {
        diag += scale;
        off_diag -= scale * p[(x, y + 1)];
    }

    // a lone cell has no coupling at all
    if diag == 0.0 {
        return 0.0;
    }

    (rhs - off_diag) / diag
}

fn gauss_seidel_sweep(rhs: &ScalarField, p: &mut ScalarField, scale: f64) -> f64 {
    let (w, h) = p.shape();
    let mut max_delta: f64 = 0.0;

    for y in 0..h {
        for x in 0..w {
            let new_p = stencil_update(p, rhs[(x, y)], x, y, scale);
            max_delta = max_delta.max((p[(x, y)] - new_p).abs());
            p[(x, y)] = new_p;
        }
    }

    max_delta
}

fn jacobi_sweep(rhs: &ScalarField, p: &ScalarField, next: &mut ScalarField, scale: f64) -> f64 {
    let w = p.nrows();

    next.as_mut_slice()
        .par_chunks_mut(w)
        .enumerate()
        .map(|(y, row)| {
            let mut row_delta: f64 = 0.0;
            for (x, out) in row.iter_mut().enumerate() {
                let old = p[(x, y)];
                let new_p = old + JACOBI_WEIGHT * (stencil_update(p, rhs[(x, y)], x, y, scale) - old);
                row_delta = row_delta.max((old - new_p).abs());
                *out = new_p;
            }
            row_delta
        })
        .reduce(|| 0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use na::DMatrix;
    use rand::Rng;

    use super::*;

    /// Right-hand side that sums to zero, as any divergence with closed
    /// boundaries does
    fn balanced_rhs(w: usize, h: usize) -> ScalarField {
        let mut rng = rand::rng();
        let mut rhs: ScalarField = DMatrix::from_fn(w, h, |_, _| rng.random_range(-1.0..1.0));
        let mean = rhs.mean();
        rhs.add_scalar_mut(-mean);
        rhs
    }

    fn layout(w: usize, h: usize) -> GridLayout {
        GridLayout {
            w,
            h,
            ox: 0.5,
            oy: 0.5,
            hx: 1.0 / w.min(h) as f64,
        }
    }

    fn centered(p: &ScalarField) -> ScalarField {
        p.add_scalar(-p.mean())
    }

    #[test]
    fn test_single_sweep_values() {
        let rhs = DMatrix::from_element(2, 1, 1.0);
        let mut p = DMatrix::zeros(2, 1);

        let delta = Relaxer::GaussSeidel.relax(&rhs, &mut p, 1.0);

        // first cell sees p[1] = 0, second sees the freshly updated p[0] = 1
        assert_eq!(p[(0, 0)], 1.0);
        assert_eq!(p[(1, 0)], 2.0);
        assert_eq!(delta, 2.0);
    }

    #[test]
    fn test_jacobi_uses_previous_iterate() {
        let rhs = DMatrix::from_element(2, 1, 1.0);
        let mut p = DMatrix::zeros(2, 1);
        let mut relaxer = Relaxer::new(Relaxation::Jacobi, &layout(2, 1));

        relaxer.relax(&rhs, &mut p, 1.0);

        assert_eq!(p[(0, 0)], JACOBI_WEIGHT);
        assert_eq!(p[(1, 0)], JACOBI_WEIGHT);
    }

    #[test]
    fn test_budget_exhaustion_is_reported() {
        let rhs = balanced_rhs(16, 16);
        let mut p = DMatrix::zeros(16, 16);

        let report = Relaxer::GaussSeidel.solve(&rhs, &mut p, 1.0, 2);

        assert!(!report.converged);
        assert_eq!(report.iterations, 2);
        assert!(report.max_delta >= TARGET_MAX_DELTA);
    }

    #[test]
    fn test_converges_within_budget() {
        let rhs = balanced_rhs(8, 8);
        let mut p = DMatrix::zeros(8, 8);

        let report = Relaxer::GaussSeidel.solve(&rhs, &mut p, 1.0, 10_000);

        assert!(report.converged);
        assert!(report.iterations < 10_000);
        assert!(report.max_delta < TARGET_MAX_DELTA);
    }

    #[test]
    fn test_lone_cell_has_zero_pressure() {
        let rhs = DMatrix::from_element(1, 1, 3.0);
        let mut p = DMatrix::from_element(1, 1, 5.0);

        let report = Relaxer::GaussSeidel.solve(&rhs, &mut p, 1.0, 10);

        assert!(report.converged);
        assert_eq!(p[(0, 0)], 0.0);
    }

    #[test]
    fn test_jacobi_matches_gauss_seidel() {
        let (w, h) = (6, 5);
        let rhs = balanced_rhs(w, h);

        let mut p_gs = DMatrix::zeros(w, h);
        let gs = Relaxer::GaussSeidel.solve(&rhs, &mut p_gs, 1.0, 100_000);

        let mut p_jacobi = DMatrix::zeros(w, h);
        let jacobi =
            Relaxer::new(Relaxation::Jacobi, &layout(w, h)).solve(&rhs, &mut p_jacobi, 1.0, 100_000);

        assert!(gs.converged && jacobi.converged);
        assert!(jacobi.iterations > gs.iterations);

        // pressure is only defined up to a constant
        let diff = centered(&p_gs) - centered(&p_jacobi);
        assert!(diff.amax() < 1e-3, "solutions differ by {}", diff.amax());
    }
}
