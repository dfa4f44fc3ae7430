// Error type for the simulation core

use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

/// Precondition violations rejected by the solver and its quantities.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    #[error("grid dimensions must be positive, got {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("fluid density must be positive and finite, got {0}")]
    InvalidDensity(f64),

    #[error("timestep must be positive and finite, got {0}")]
    InvalidTimestep(f64),

    #[error("cell size must be positive and finite, got {0}")]
    InvalidCellSize(f64),

    #[error("inflow rectangle ({x0}, {y0})-({x1}, {y1}) is inverted or not finite")]
    InvalidInflow { x0: f64, y0: f64, x1: f64, y1: f64 },

    #[error("inflow value must be finite, got {0}")]
    InvalidInflowValue(f64),

    #[error("pressure iteration budget must be at least 1")]
    InvalidIterationBudget,
}
