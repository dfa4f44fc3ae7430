// Grid storage shared by every fluid quantity

use na::DMatrix;

use crate::{
    ScalarField,
    sim::numeric::{cerp, lerp, split_coord},
};

/// Placement of a quantity's samples on the staggered grid.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    /// Samples along x
    pub w: usize,

    /// Samples along y
    pub h: usize,

    /// Sample offset along x, in cells
    pub ox: f64,

    /// Sample offset along y, in cells
    pub oy: f64,

    /// Cell size, shared by both axes
    pub hx: f64,
}

impl GridLayout {
    /// Allocate a zeroed field matching this layout. The matrix is indexed
    /// `(x, y)`, so column-major storage keeps each row of samples contiguous.
    pub fn zeros(&self) -> ScalarField {
        DMatrix::zeros(self.w, self.h)
    }
}

/// Read-only view pairing one buffer with its layout.
#[derive(Clone, Copy)]
pub struct FieldView<'a> {
    pub layout: GridLayout,
    pub data: &'a ScalarField,
}

impl FieldView<'_> {
    /// Bilinear interpolation at continuous grid coordinates `(x, y)`.
    /// Queries outside the domain take the value of the nearest edge.
    pub fn sample(&self, x: f64, y: f64) -> f64 {
        let (ix, fx) = split_coord(x - self.layout.ox, self.layout.w);
        let (iy, fy) = split_coord(y - self.layout.oy, self.layout.h);
        let (x1, y1) = (self.clamp_x(ix + 1), self.clamp_y(iy + 1));

        let x00 = self.data[(ix, iy)];
        let x10 = self.data[(x1, iy)];
        let x01 = self.data[(ix, y1)];
        let x11 = self.data[(x1, y1)];

        lerp(lerp(x00, x10, fx), lerp(x01, x11, fx), fy)
    }

    /// Clamped Catmull-Rom interpolation at continuous grid coordinates
    /// `(x, y)`, applied separably: four cubic rows along x, then one along y.
    /// Stencil indices past the edge are clamped to the edge.
    pub fn sample_cubic(&self, x: f64, y: f64) -> f64 {
        let (ix, fx) = split_coord(x - self.layout.ox, self.layout.w);
        let (iy, fy) = split_coord(y - self.layout.oy, self.layout.h);

        let xs = [
            ix.saturating_sub(1),
            ix,
            self.clamp_x(ix + 1),
            self.clamp_x(ix + 2),
        ];
        let ys = [
            iy.saturating_sub(1),
            iy,
            self.clamp_y(iy + 1),
            self.clamp_y(iy + 2),
        ];

        let q = ys.map(|row| {
            let s = xs.map(|col| self.data[(col, row)]);
            cerp(s[0], s[1], s[2], s[3], fx)
        });

        cerp(q[0], q[1], q[2], q[3], fy)
    }

    fn clamp_x(&self, x: usize) -> usize {
        x.min(self.layout.w - 1)
    }

    fn clamp_y(&self, y: usize) -> usize {
        y.min(self.layout.h - 1)
    }
}

/// Two equally sized buffers. Reads go to the current buffer, writes to the
/// next one, and `commit` swaps them.
#[derive(Clone, Debug)]
pub struct DoubleBuffer {
    current: ScalarField,
    next: ScalarField,
}

impl DoubleBuffer {
    pub fn new(layout: &GridLayout) -> Self {
        Self {
            current: layout.zeros(),
            next: layout.zeros(),
        }
    }

    pub fn read(&self) -> &ScalarField {
        &self.current
    }

    /// Mutable access to the current buffer, for edits that happen between
    /// steps (inflow, boundary conditions, pressure correction).
    pub fn current_mut(&mut self) -> &mut ScalarField {
        &mut self.current
    }

    pub fn write_next(&mut self) -> &mut ScalarField {
        &mut self.next
    }

    /// Borrow the current buffer for reading and the next one for writing.
    pub fn split(&mut self) -> (&ScalarField, &mut ScalarField) {
        (&self.current, &mut self.next)
    }

    pub fn commit(&mut self) {
        std::mem::swap(&mut self.current, &mut self.next);
    }
}
