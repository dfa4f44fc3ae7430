// Staggered-grid smoke solver

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::{
    ScalarField,
    sim::{
        error::{SimError, SimResult},
        field::GridLayout,
        poisson::{DEFAULT_ITERATION_BUDGET, Relaxation, Relaxer, SolveReport},
        quantity::FluidQuantity,
    },
};

/// Axis-aligned inflow region in domain units.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct InflowRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl InflowRect {
    /// Build a rectangle from its lower corner and extent.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> SimResult<Self> {
        let rect = Self {
            x,
            y,
            width,
            height,
        };
        rect.validate()?;

        Ok(rect)
    }

    /// Build a rectangle from two corners.
    pub fn from_corners(x0: f64, y0: f64, x1: f64, y1: f64) -> SimResult<Self> {
        if x1 < x0 || y1 < y0 {
            return Err(SimError::InvalidInflow { x0, y0, x1, y1 });
        }
        Self::new(x0, y0, x1 - x0, y1 - y0)
    }

    pub fn validate(&self) -> SimResult<()> {
        let (x0, y0, x1, y1) = self.corners();
        let finite = [x0, y0, x1, y1].iter().all(|c| c.is_finite());

        if !finite || self.width < 0.0 || self.height < 0.0 {
            return Err(SimError::InvalidInflow { x0, y0, x1, y1 });
        }

        Ok(())
    }

    /// `(x0, y0, x1, y1)`
    pub fn corners(&self) -> (f64, f64, f64, f64) {
        (self.x, self.y, self.x + self.width, self.y + self.height)
    }
}

/// Incompressible 2D fluid solver on a MAC grid. Density sits at cell
/// centers, horizontal velocity on vertical faces and vertical velocity on
/// horizontal faces.
pub struct FluidSolver {
    /// Cells along x
    w: usize,

    /// Cells along y
    h: usize,

    /// Cell size; the shorter domain side has unit length
    hx: f64,

    /// The fluid density
    density: f64,

    /// Sweeps allowed per pressure solve
    iteration_budget: usize,

    d: FluidQuantity,
    u: FluidQuantity,
    v: FluidQuantity,

    /// Right-hand side of the pressure equation
    rhs: ScalarField,

    /// Pressure, reused as the initial guess of the next solve
    pressure: ScalarField,

    relaxer: Relaxer,
}

impl FluidSolver {
    /// Create a solver with all fields at rest.
    ///
    /// Parameters
    /// - `w`, `h` - The number of cells along x and y
    /// - `density` - The fluid density
    /// - `relaxation` - The relaxation strategy for the pressure solve
    pub fn new(w: usize, h: usize, density: f64, relaxation: Relaxation) -> SimResult<Self> {
        if w == 0 || h == 0 {
            return Err(SimError::InvalidDimensions {
                width: w,
                height: h,
            });
        }
        if !(density.is_finite() && density > 0.0) {
            return Err(SimError::InvalidDensity(density));
        }

        let hx = 1.0 / w.min(h) as f64;

        let d = FluidQuantity::new(w, h, 0.5, 0.5, hx)?;
        let u = FluidQuantity::new(w + 1, h, 0.0, 0.5, hx)?;
        let v = FluidQuantity::new(w, h + 1, 0.5, 0.0, hx)?;

        let cells = d.layout();
        let rhs = cells.zeros();
        let pressure = cells.zeros();
        let relaxer = Relaxer::new(relaxation, &cells);

        Ok(Self {
            w,
            h,
            hx,
            density,
            iteration_budget: DEFAULT_ITERATION_BUDGET,
            d,
            u,
            v,
            rhs,
            pressure,
            relaxer,
        })
    }

    /// Override the number of sweeps allowed per pressure solve.
    pub fn with_iteration_budget(mut self, budget: usize) -> SimResult<Self> {
        if budget == 0 {
            return Err(SimError::InvalidIterationBudget);
        }
        self.iteration_budget = budget;

        Ok(self)
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.w, self.h)
    }

    pub fn hx(&self) -> f64 {
        self.hx
    }

    pub fn relaxation(&self) -> Relaxation {
        self.relaxer.kind()
    }

    pub fn density_field(&self) -> &FluidQuantity {
        &self.d
    }

    pub fn velocity_u(&self) -> &FluidQuantity {
        &self.u
    }

    pub fn velocity_v(&self) -> &FluidQuantity {
        &self.v
    }

    pub fn velocity_mut(&mut self) -> (&mut FluidQuantity, &mut FluidQuantity) {
        (&mut self.u, &mut self.v)
    }

    pub fn pressure(&self) -> &ScalarField {
        &self.pressure
    }

    /// Store the negated, scaled divergence of every cell in the
    /// right-hand-side buffer.
    pub fn build_divergence(&mut self) {
        let scale = 1.0 / self.hx;
        let (u, v) = (self.u.values(), self.v.values());

        self.rhs
            .as_mut_slice()
            .par_chunks_mut(self.w)
            .enumerate()
            .for_each(|(y, row)| {
                for (x, r) in row.iter_mut().enumerate() {
                    *r = -scale * (u[(x + 1, y)] - u[(x, y)] + v[(x, y + 1)] - v[(x, y)]);
                }
            });
    }

    /// Relax the pressure poisson equation against the current right-hand
    /// side, starting from the previous pressure.
    ///
    /// Parameters
    /// - `budget` - The maximum number of sweeps
    /// - `timestep` - The timestep the pressure must act over
    pub fn solve_pressure(&mut self, budget: usize, timestep: f64) -> SolveReport {
        let scale = timestep / (self.density * self.hx * self.hx);

        self.relaxer
            .solve(&self.rhs, &mut self.pressure, scale, budget)
    }

    /// Subtract the pressure gradient from the face velocities, then zero
    /// every velocity normal to the domain boundary.
    pub fn apply_pressure_correction(&mut self, timestep: f64) {
        let scale = timestep / (self.density * self.hx);
        let u = self.u.values_mut();
        let v = self.v.values_mut();

        for y in 0..self.h {
            for x in 0..self.w {
                let p = self.pressure[(x, y)];

                u[(x, y)] -= scale * p;
                u[(x + 1, y)] += scale * p;
                v[(x, y)] -= scale * p;
                v[(x, y + 1)] += scale * p;
            }
        }

        self.enforce_boundaries();
    }

    /// Zero the normal velocity on every boundary face.
    fn enforce_boundaries(&mut self) {
        let (w, h) = (self.w, self.h);

        let u = self.u.values_mut();
        for y in 0..h {
            u[(0, y)] = 0.;
            u[(w, y)] = 0.;
        }

        let v = self.v.values_mut();
        for x in 0..w {
            v[(x, 0)] = 0.;
            v[(x, h)] = 0.;
        }
    }

    /// Advance the simulation by `timestep`: project the velocity field,
    /// advect every quantity through it, then commit all buffers.
    pub fn step(&mut self, timestep: f64) -> SimResult<SolveReport> {
        if !(timestep.is_finite() && timestep > 0.0) {
            return Err(SimError::InvalidTimestep(timestep));
        }

        // inflow may have written into boundary faces
        self.enforce_boundaries();

        self.build_divergence();
        let report = self.solve_pressure(self.iteration_budget, timestep);
        self.apply_pressure_correction(timestep);

        self.d.advect(timestep, &self.u, &self.v);
        FluidQuantity::advect_velocity(timestep, &mut self.u, &mut self.v);

        self.d.commit();
        self.u.commit();
        self.v.commit();

        // advected boundary faces pick up velocity from the interior
        self.enforce_boundaries();

        Ok(report)
    }

    /// Inject density and velocity into `rect` with a smooth falloff.
    pub fn inject_inflow(&mut self, rect: &InflowRect, density: f64, u: f64, v: f64) -> SimResult<()> {
        rect.validate()?;
        let (x0, y0, x1, y1) = rect.corners();

        self.d.inject_inflow(x0, y0, x1, y1, density)?;
        self.u.inject_inflow(x0, y0, x1, y1, u)?;
        self.v.inject_inflow(x0, y0, x1, y1, v)?;

        Ok(())
    }

    /// Grayscale RGBA rendering of the density field, row-major. A density of
    /// 0 is white and 1 is black; alpha is always opaque.
    pub fn density_rgba(&self) -> Vec<u8> {
        self.d
            .values()
            .iter()
            .flat_map(|d| {
                let shade = (((1.0 - d) * 255.0) as i32).clamp(0, 255) as u8;
                [shade, shade, shade, 0xFF]
            })
            .collect()
    }

    /// Largest absolute divergence (face-difference over cell size) of the
    /// current velocity field.
    pub fn max_divergence(&self) -> f64 {
        let (u, v) = (self.u.values(), self.v.values());
        let mut max_div: f64 = 0.0;

        for y in 0..self.h {
            for x in 0..self.w {
                let div = (u[(x + 1, y)] - u[(x, y)] + v[(x, y + 1)] - v[(x, y)]) / self.hx;
                max_div = max_div.max(div.abs());
            }
        }

        max_div
    }

    /// Largest absolute velocity normal to the domain boundary.
    pub fn max_boundary_velocity(&self) -> f64 {
        let (u, v) = (self.u.values(), self.v.values());

        let u_edges = (0..self.h).flat_map(|y| [u[(0, y)], u[(self.w, y)]]);
        let v_edges = (0..self.w).flat_map(|x| [v[(x, 0)], v[(x, self.h)]]);

        u_edges.chain(v_edges).fold(0.0_f64, |m, x| m.max(x.abs()))
    }

    /// Layout of the pressure and density cells
    pub fn cell_layout(&self) -> GridLayout {
        self.d.layout()
    }
}
