// A scalar fluid quantity on the staggered grid

use std::ops::Range;

use rayon::prelude::*;

use crate::{
    ScalarField,
    sim::{
        error::{SimError, SimResult},
        field::{DoubleBuffer, FieldView, GridLayout},
        numeric::cubic_pulse,
    },
};

/// One scalar field (density or a velocity component) with its own sample
/// offset. Advection writes into a second buffer which becomes current on
/// `commit`.
#[derive(Clone, Debug)]
pub struct FluidQuantity {
    layout: GridLayout,
    buffers: DoubleBuffer,
}

impl FluidQuantity {
    /// Create a zero-initialized quantity.
    ///
    /// Parameters
    /// - `w`, `h` - Sample counts along x and y
    /// - `ox`, `oy` - Sample offset within a cell, in cells
    /// - `hx` - The cell size
    pub fn new(w: usize, h: usize, ox: f64, oy: f64, hx: f64) -> SimResult<Self> {
        if w == 0 || h == 0 {
            return Err(SimError::InvalidDimensions {
                width: w,
                height: h,
            });
        }
        if !(hx.is_finite() && hx > 0.0) {
            return Err(SimError::InvalidCellSize(hx));
        }

        let layout = GridLayout { w, h, ox, oy, hx };
        let buffers = DoubleBuffer::new(&layout);

        Ok(Self { layout, buffers })
    }

    pub fn layout(&self) -> GridLayout {
        self.layout
    }

    pub fn view(&self) -> FieldView<'_> {
        FieldView {
            layout: self.layout,
            data: self.buffers.read(),
        }
    }

    /// The current buffer, indexed `(x, y)`.
    pub fn values(&self) -> &ScalarField {
        self.buffers.read()
    }

    pub fn values_mut(&mut self) -> &mut ScalarField {
        self.buffers.current_mut()
    }

    pub fn at(&self, x: usize, y: usize) -> f64 {
        self.buffers.read()[(x, y)]
    }

    pub fn sample(&self, x: f64, y: f64) -> f64 {
        self.view().sample(x, y)
    }

    pub fn sample_cubic(&self, x: f64, y: f64) -> f64 {
        self.view().sample_cubic(x, y)
    }

    /// Advect this quantity through the velocity field `(u, v)`, writing the
    /// result to the next buffer. The current buffer is left untouched.
    pub fn advect(&mut self, timestep: f64, u: &FluidQuantity, v: &FluidQuantity) {
        let (src, dst) = self.buffers.split();
        let src = FieldView {
            layout: self.layout,
            data: src,
        };

        advect_into(src, dst, timestep, u.view(), v.view());
    }

    /// Advect both velocity components through themselves.
    pub fn advect_velocity(timestep: f64, u: &mut FluidQuantity, v: &mut FluidQuantity) {
        let (u_src, u_dst) = u.buffers.split();
        let (v_src, v_dst) = v.buffers.split();

        let u_view = FieldView {
            layout: u.layout,
            data: u_src,
        };
        let v_view = FieldView {
            layout: v.layout,
            data: v_src,
        };

        advect_into(u_view, u_dst, timestep, u_view, v_view);
        advect_into(v_view, v_dst, timestep, u_view, v_view);
    }

    /// Write `value` into the samples lying inside the rectangle
    /// `(x0, y0)-(x1, y1)` (domain units), shaped by a cubic pulse over the normalized distance
    /// from the rectangle center. A sample is only overwritten when the new
    /// magnitude exceeds the stored one.
    pub fn inject_inflow(&mut self, x0: f64, y0: f64, x1: f64, y1: f64, value: f64) -> SimResult<()> {
        let rect_ok = [x0, y0, x1, y1].iter().all(|c| c.is_finite()) && x1 >= x0 && y1 >= y0;
        if !rect_ok {
            return Err(SimError::InvalidInflow { x0, y0, x1, y1 });
        }
        if !value.is_finite() {
            return Err(SimError::InvalidInflowValue(value));
        }

        let GridLayout { w, h, ox, oy, hx } = self.layout;

        let xs = sample_range(x0 / hx - ox, x1 / hx - ox, w);
        let ys = sample_range(y0 / hx - oy, y1 / hx - oy, h);

        let field = self.buffers.current_mut();
        for y in ys {
            for x in xs.clone() {
                let px = (x as f64 + ox) * hx;
                let py = (y as f64 + oy) * hx;

                let dist = f64::hypot(
                    (2.0 * px - (x0 + x1)) / (x1 - x0),
                    (2.0 * py - (y0 + y1)) / (y1 - y0),
                );
                let vi = cubic_pulse(dist) * value;

                if field[(x, y)].abs() < vi.abs() {
                    field[(x, y)] = vi;
                }
            }
        }

        Ok(())
    }

    pub fn commit(&mut self) {
        self.buffers.commit();
    }
}

/// Indices of the samples whose coordinate lies in `[lo, hi]`, limited to an
/// axis of `n` samples.
fn sample_range(lo: f64, hi: f64, n: usize) -> Range<usize> {
    let start = lo.ceil().max(0.0) as usize;
    let end = ((hi.floor() + 1.0).max(0.0) as usize).min(n);

    start..end
}

/// Semi-Lagrangian update: trace every sample of `src` backwards through
/// `(u, v)` and store the interpolated value at the traced origin in `dst`.
fn advect_into(
    src: FieldView<'_>,
    dst: &mut ScalarField,
    timestep: f64,
    u: FieldView<'_>,
    v: FieldView<'_>,
) {
    let GridLayout { w, ox, oy, hx, .. } = src.layout;

    dst.as_mut_slice()
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(iy, row)| {
            for (ix, out) in row.iter_mut().enumerate() {
                let (x, y) = trace_back(ix as f64 + ox, iy as f64 + oy, timestep, hx, &u, &v);
                *out = src.sample_cubic(x, y);
            }
        });
}

/// Third-order Runge-Kutta backward trace in grid units. Velocities are
/// sampled at the start point, half a step back along the first estimate,
/// and three quarters of a step back along the midpoint estimate, then
/// combined with weights 2/9, 3/9 and 4/9.
fn trace_back(
    x: f64,
    y: f64,
    timestep: f64,
    hx: f64,
    u: &FieldView<'_>,
    v: &FieldView<'_>,
) -> (f64, f64) {
    let first_u = u.sample(x, y) / hx;
    let first_v = v.sample(x, y) / hx;

    let mid_x = x - 0.5 * timestep * first_u;
    let mid_y = y - 0.5 * timestep * first_v;

    let mid_u = u.sample(mid_x, mid_y) / hx;
    let mid_v = v.sample(mid_x, mid_y) / hx;

    let last_x = x - 0.75 * timestep * mid_u;
    let last_y = y - 0.75 * timestep * mid_v;

    let last_u = u.sample(last_x, last_y) / hx;
    let last_v = v.sample(last_x, last_y) / hx;

    (
        x - timestep * ((2.0 / 9.0) * first_u + (3.0 / 9.0) * mid_u + (4.0 / 9.0) * last_u),
        y - timestep * ((2.0 / 9.0) * first_v + (3.0 / 9.0) * mid_v + (4.0 / 9.0) * last_v),
    )
}

#[cfg(test)]
mod tests {
    use rand::Rng;

    use super::*;

    /// Density-like quantity with random contents
    fn random_quantity(w: usize, h: usize) -> FluidQuantity {
        let mut rng = rand::rng();
        let mut q = FluidQuantity::new(w, h, 0.5, 0.5, 1.0 / w.min(h) as f64).unwrap();
        q.values_mut()
            .iter_mut()
            .for_each(|v| *v = rng.random_range(-1.0..1.0));
        q
    }

    fn velocity_pair(w: usize, h: usize, u: f64, v: f64) -> (FluidQuantity, FluidQuantity) {
        let hx = 1.0 / w.min(h) as f64;
        let mut uq = FluidQuantity::new(w + 1, h, 0.0, 0.5, hx).unwrap();
        let mut vq = FluidQuantity::new(w, h + 1, 0.5, 0.0, hx).unwrap();
        uq.values_mut().fill(u);
        vq.values_mut().fill(v);
        (uq, vq)
    }

    #[test]
    fn test_rejects_bad_construction() {
        assert_eq!(
            FluidQuantity::new(0, 4, 0.5, 0.5, 0.25).unwrap_err(),
            SimError::InvalidDimensions {
                width: 0,
                height: 4
            }
        );
        assert_eq!(
            FluidQuantity::new(4, 4, 0.5, 0.5, 0.0).unwrap_err(),
            SimError::InvalidCellSize(0.0)
        );
        assert!(matches!(
            FluidQuantity::new(4, 4, 0.5, 0.5, -0.25),
            Err(SimError::InvalidCellSize(_))
        ));
        assert!(matches!(
            FluidQuantity::new(4, 4, 0.5, 0.5, f64::NAN),
            Err(SimError::InvalidCellSize(_))
        ));
    }

    #[test]
    fn test_interpolation_identity_at_nodes() {
        let q = random_quantity(7, 5);

        for y in 0..5 {
            for x in 0..7 {
                let (gx, gy) = (x as f64 + 0.5, y as f64 + 0.5);
                assert_eq!(q.sample(gx, gy), q.at(x, y));
                assert_eq!(q.sample_cubic(gx, gy), q.at(x, y));
            }
        }
    }

    #[test]
    fn test_cubic_stays_within_stencil() {
        let mut rng = rand::rng();
        let q = random_quantity(9, 6);

        for _ in 0..2_000 {
            let gx: f64 = rng.random_range(0.5..8.5);
            let gy: f64 = rng.random_range(0.5..5.5);

            let bx = (gx - 0.5).floor() as i64;
            let by = (gy - 0.5).floor() as i64;
            let (mut lo, mut hi) = (f64::INFINITY, f64::NEG_INFINITY);
            for sy in (by - 1)..=(by + 2) {
                for sx in (bx - 1)..=(bx + 2) {
                    let value = q.at(sx.clamp(0, 8) as usize, sy.clamp(0, 5) as usize);
                    lo = lo.min(value);
                    hi = hi.max(value);
                }
            }

            let value = q.sample_cubic(gx, gy);
            assert!(lo <= value && value <= hi);
        }
    }

    #[test]
    fn test_zero_velocity_advection_is_identity() {
        let mut q = random_quantity(6, 6);
        let before = q.values().clone();
        let (u, v) = velocity_pair(6, 6, 0.0, 0.0);

        q.advect(0.37, &u, &v);
        assert_eq!(q.values(), &before);

        q.commit();
        assert_eq!(q.values(), &before);
    }

    #[test]
    fn test_uniform_velocity_shifts_one_cell() {
        let (w, h) = (8, 8);
        let hx = 1.0 / 8.0;
        let mut q = FluidQuantity::new(w, h, 0.5, 0.5, hx).unwrap();
        q.values_mut()
            .iter_mut()
            .enumerate()
            .for_each(|(i, v)| *v = ((i % w) as f64).powi(2));

        // one cell per unit time to the right
        let (u, v) = velocity_pair(w, h, hx, 0.0);
        q.advect(1.0, &u, &v);
        q.commit();

        for y in 0..h {
            assert!(q.at(0, y).abs() < 1e-9);
            for x in 1..w {
                let expected = ((x - 1) as f64).powi(2);
                assert!((q.at(x, y) - expected).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_velocity_self_advection_keeps_uniform_flow() {
        let (mut u, mut v) = velocity_pair(5, 4, 0.3, -0.2);

        FluidQuantity::advect_velocity(0.05, &mut u, &mut v);
        u.commit();
        v.commit();

        assert!(u.values().iter().all(|x| (x - 0.3).abs() < 1e-12));
        assert!(v.values().iter().all(|x| (x + 0.2).abs() < 1e-12));
    }

    #[test]
    fn test_inflow_center_and_outside() {
        let mut q = FluidQuantity::new(16, 16, 0.5, 0.5, 1.0 / 16.0).unwrap();
        q.inject_inflow(0.25, 0.25, 0.75, 0.75, 2.0).unwrap();

        // sample (7, 7) sits at 0.46875, next to the center
        assert!(q.at(7, 7) > 1.8 && q.at(7, 7) <= 2.0);
        assert_eq!(q.at(7, 7), q.at(8, 8));
        assert_eq!(q.at(0, 0), 0.0);
        assert_eq!(q.at(15, 7), 0.0);
        assert!(q.values().iter().all(|v| (0.0..=2.0).contains(v)));
    }

    #[test]
    fn test_inflow_only_grows_magnitude() {
        let mut q = FluidQuantity::new(16, 16, 0.5, 0.5, 1.0 / 16.0).unwrap();
        q.inject_inflow(0.25, 0.25, 0.75, 0.75, 1.0).unwrap();
        let first = q.values().clone();

        q.inject_inflow(0.25, 0.25, 0.75, 0.75, 1.0).unwrap();
        assert_eq!(q.values(), &first);

        q.inject_inflow(0.25, 0.25, 0.75, 0.75, -0.5).unwrap();
        assert_eq!(q.values(), &first);

        q.inject_inflow(0.25, 0.25, 0.75, 0.75, 3.0).unwrap();
        for (after, before) in q.values().iter().zip(first.iter()) {
            assert!(after.abs() >= before.abs());
        }
    }

    #[test]
    fn test_inflow_spans_full_width() {
        // wide, short grid: the horizontal range is bounded by the width
        let mut q = FluidQuantity::new(8, 2, 0.5, 0.5, 0.5).unwrap();
        q.inject_inflow(0.0, 0.0, 4.0, 1.0, 1.0).unwrap();

        assert!(q.at(3, 0) > 0.0);
        assert!(q.at(5, 0) > 0.0);
    }

    #[test]
    fn test_inflow_rejects_bad_input() {
        let mut q = FluidQuantity::new(4, 4, 0.5, 0.5, 0.25).unwrap();

        assert!(matches!(
            q.inject_inflow(0.6, 0.1, 0.2, 0.5, 1.0),
            Err(SimError::InvalidInflow { .. })
        ));
        assert!(q.inject_inflow(0.1, 0.1, 0.5, f64::NAN, 1.0).is_err());
        assert_eq!(
            q.inject_inflow(0.1, 0.1, 0.5, 0.5, f64::INFINITY),
            Err(SimError::InvalidInflowValue(f64::INFINITY))
        );
        assert!(q.values().iter().all(|v| *v == 0.0));
    }
}
