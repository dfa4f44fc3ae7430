use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::sim::{
    error::SimError,
    poisson::Relaxation,
    solver::{FluidSolver, InflowRect},
};

pub mod cli;

#[derive(Error, Debug)]
pub enum InputError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("simulation time must be positive and finite, got {0}")]
    InvalidDuration(f64),

    #[error("at least one step per frame is required")]
    InvalidFrameCadence,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ImageStreamSettings {
    pub frames_dir: PathBuf,
}

/// Inflow applied before every step
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq)]
pub struct InflowSettings {
    pub rect: InflowRect,
    pub density: f64,
    pub u: f64,
    pub v: f64,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SimulationInput {
    pub output: ImageStreamSettings,
    pub width: usize,
    pub height: usize,
    pub density: f64,
    pub timestep: f64,
    pub simulation_time: f64,
    pub steps_per_frame: usize,
    pub relaxation: Relaxation,
    pub iteration_budget: usize,
    pub inflow: InflowSettings,
}

impl SimulationInput {
    /// Check driver-level parameters. Grid and fluid parameters are checked
    /// again when the solver is built.
    pub fn validate(&self) -> Result<(), InputError> {
        if !(self.timestep.is_finite() && self.timestep > 0.0) {
            return Err(SimError::InvalidTimestep(self.timestep).into());
        }
        if !(self.simulation_time.is_finite() && self.simulation_time > 0.0) {
            return Err(InputError::InvalidDuration(self.simulation_time));
        }
        if self.steps_per_frame == 0 {
            return Err(InputError::InvalidFrameCadence);
        }
        self.inflow.rect.validate()?;

        Ok(())
    }

    pub fn build_solver(&self) -> Result<FluidSolver, SimError> {
        FluidSolver::new(self.width, self.height, self.density, self.relaxation)?
            .with_iteration_budget(self.iteration_budget)
    }

    pub fn log(&self) {
        let (x0, y0, x1, y1) = self.inflow.rect.corners();

        info!(
            "Simulation is shown below:\n\n\
        \t grid:       {} x {} cells\n\
        \t time range: {} s (dt = {} s)\n\
        \t frames:     every {} steps\n\
        \t density:    {}\n\
        \t pressure:   {:?}, {} sweeps max\n\
        \t inflow:     ({}, {}) - ({}, {})\n\
        \t             density {}, velocity < {}, {} >\n\n\
        ",
            self.width,
            self.height,
            self.simulation_time,
            self.timestep,
            self.steps_per_frame,
            self.density,
            self.relaxation,
            self.iteration_budget,
            x0,
            y0,
            x1,
            y1,
            self.inflow.density,
            self.inflow.u,
            self.inflow.v,
        );

        info!("Frames are written to {}", self.output.frames_dir.display());
    }
}
