extern crate nalgebra as na;

pub mod observers;
pub mod postprocessing;
pub mod preprocessing;
pub mod sim;

use na::DMatrix;

/// A field indexed `(x, y)`; each row of samples is contiguous in memory.
pub type ScalarField = DMatrix<f64>;
