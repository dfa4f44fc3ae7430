// Task runner for the solver thread

use std::{
    sync::mpsc,
    thread::{self, JoinHandle},
};

use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
    observers::imgstream::{self, FramePacket},
    preprocessing::{ImageStreamSettings, SimulationInput},
    sim::{error::SimError, poisson::SolveReport, solver::FluidSolver},
};

const PROGRESS_TICKS: u64 = 10_000; // resolution of the progress bar

#[derive(Error, Debug)]
pub enum TaskError {
    #[error(transparent)]
    Sim(#[from] SimError),

    #[error("frame writer failed: {0}")]
    FrameWriter(String),
}

/// Running totals over every pressure solve of a run
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct SolveStats {
    pub solves: usize,
    pub converged: usize,
    pub exhausted: usize,
    pub total_iterations: usize,
    pub worst_max_delta: f64,
}

impl SolveStats {
    pub fn record(&mut self, report: &SolveReport) {
        self.solves += 1;
        self.total_iterations += report.iterations;

        if report.converged {
            self.converged += 1;
        } else {
            self.exhausted += 1;
            self.worst_max_delta = self.worst_max_delta.max(report.max_delta);
        }
    }

    pub fn mean_iterations(&self) -> f64 {
        if self.solves == 0 {
            return 0.0;
        }
        self.total_iterations as f64 / self.solves as f64
    }
}

pub struct SimulationOutput {
    pub frames: usize,
    pub steps: usize,
    pub simulated_time: f64,
    pub solve_stats: SolveStats,
}

fn log_report(step: usize, report: &SolveReport) {
    if report.converged {
        debug!(
            step,
            iterations = report.iterations,
            max_delta = report.max_delta,
            "pressure solve converged"
        );
    } else {
        warn!(
            step,
            budget = report.iterations,
            max_delta = report.max_delta,
            "pressure solve exceeded its iteration budget"
        );
    }
}

/// The solver thread task: inject inflow, step, and hand a frame to the
/// image thread every `steps_per_frame` steps until the simulated time is
/// reached.
pub fn imgstream_task(
    settings: &ImageStreamSettings,
    mut solver: FluidSolver,
    simulation_input: &SimulationInput,
) -> Result<SimulationOutput, TaskError> {
    let bar = ProgressBar::new(PROGRESS_TICKS);
    if let Ok(style) = ProgressStyle::with_template(
        "[Elapsed: {elapsed_precise}] [{bar:40.cyan/blue}] {percent}% (Remaining: {eta_precise})",
    ) {
        bar.set_style(style.progress_chars("##-"));
    }

    let (sender, receiver) = mpsc::channel();

    // spawn image io thread
    let frames_dir = settings.frames_dir.clone();
    let writer = thread::spawn(move || imgstream::image_io_loop(receiver, &frames_dir));

    let (width, height) = solver.shape();
    let inflow = simulation_input.inflow;
    let mut solve_stats = SolveStats::default();
    let (mut t, mut steps, mut frames) = (0.0, 0, 0);

    while t < simulation_input.simulation_time {
        for _ in 0..simulation_input.steps_per_frame {
            solver.inject_inflow(&inflow.rect, inflow.density, inflow.u, inflow.v)?;
            let report = solver.step(simulation_input.timestep)?;

            log_report(steps, &report);
            solve_stats.record(&report);

            t += simulation_input.timestep;
            steps += 1;
        }

        let packet = FramePacket {
            rgba: solver.density_rgba(),
            width: width as u32,
            height: height as u32,
            i: frames,
        };

        // a closed channel means the writer failed; its error surfaces on join
        if sender.send(packet).is_err() {
            break;
        }
        frames += 1;

        let progress = (t / simulation_input.simulation_time).min(1.0) * PROGRESS_TICKS as f64;
        bar.set_position(progress.round() as u64);
    }

    drop(sender);
    let written = match writer.join() {
        Ok(result) => result.map_err(|err| TaskError::FrameWriter(err.to_string()))?,
        Err(_) => return Err(TaskError::FrameWriter("image thread panicked".into())),
    };
    bar.finish();

    debug!(written, "frame writer finished");

    Ok(SimulationOutput {
        frames,
        steps,
        simulated_time: t,
        solve_stats,
    })
}

/// Spawns the simulation thread and starts the corresponding task
pub fn spawn_sim_thread(
    simulation_input: SimulationInput,
) -> JoinHandle<Result<SimulationOutput, TaskError>> {
    thread::spawn(move || {
        let solver = simulation_input.build_solver()?;

        info!(
            "Solver ready: {:?} cells, hx = {}, {:?} relaxation",
            solver.shape(),
            solver.hx(),
            solver.relaxation()
        );

        imgstream_task(&simulation_input.output, solver, &simulation_input)
    })
}
