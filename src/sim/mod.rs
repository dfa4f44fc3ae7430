// Staggered-grid fluid simulation

pub mod error;
pub mod field;
pub mod numeric;
pub mod poisson;
pub mod quantity;
pub mod solver;
pub mod task;
