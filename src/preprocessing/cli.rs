use std::{
    error::Error,
    fs::File,
    io::{BufReader, BufWriter},
    path::{Path, PathBuf},
    sync::LazyLock,
};

use clap::Parser;
use tracing::info;

use crate::{
    preprocessing::{ImageStreamSettings, InflowSettings, SimulationInput},
    sim::{poisson::Relaxation, solver::InflowRect},
};

static DEFAULT_FRAMES_PATH: LazyLock<&Path> = LazyLock::new(|| Path::new("smoke-frames"));

// Raw, CLI input
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct CliArgs {
    #[arg(long, help = "An input file with pre-loaded parameters.")]
    input_json: Option<PathBuf>,

    #[arg(long, help = "Optional path to save the effective input file to.")]
    input_json_savepath: Option<PathBuf>,

    #[arg(long, help = "Directory the PNG frames are written to.")]
    frames_dir: Option<PathBuf>,

    #[arg(short, long, help = "Log every pressure solve.")]
    pub verbose: bool,

    #[arg(long, default_value = "128", help = "Number of cells along x.")]
    width: usize,

    #[arg(long, default_value = "128", help = "Number of cells along y.")]
    height: usize,

    #[arg(long, default_value = "0.1", help = "Fluid density.")]
    density: f64,

    #[arg(long, default_value = "0.005", help = "Timestep in seconds.")]
    timestep: f64,

    #[arg(
        short,
        long,
        default_value = "8",
        help = "Simulation time in seconds."
    )]
    simtime: f64,

    #[arg(long, default_value = "4", help = "Simulation steps between frames.")]
    steps_per_frame: usize,

    #[arg(
        long,
        value_enum,
        default_value_t = Relaxation::GaussSeidel,
        help = "Relaxation scheme for the pressure solve."
    )]
    relaxation: Relaxation,

    #[arg(long, default_value = "600", help = "Maximum sweeps per pressure solve.")]
    iteration_budget: usize,

    #[arg(
        long,
        allow_negative_numbers = true,
        default_value = "0.45",
        help = "Inflow rectangle left edge."
    )]
    inflow_x: f64,

    #[arg(
        long,
        allow_negative_numbers = true,
        default_value = "0.2",
        help = "Inflow rectangle bottom edge."
    )]
    inflow_y: f64,

    #[arg(long, default_value = "0.15", help = "Inflow rectangle width.")]
    inflow_width: f64,

    #[arg(long, default_value = "0.03", help = "Inflow rectangle height.")]
    inflow_height: f64,

    #[arg(
        long,
        allow_negative_numbers = true,
        default_value = "1.0",
        help = "Density injected by the inflow."
    )]
    inflow_density: f64,

    #[arg(
        long,
        allow_negative_numbers = true,
        default_value = "0.0",
        help = "Inflow x velocity."
    )]
    inflow_u: f64,

    #[arg(
        long,
        allow_negative_numbers = true,
        default_value = "3.0",
        help = "Inflow y velocity."
    )]
    inflow_v: f64,
}

impl CliArgs {
    /// Build the simulation input, either from `--input-json` or from the
    /// individual arguments, and save it if requested.
    pub fn create_input(&self) -> Result<SimulationInput, Box<dyn Error>> {
        let input = match &self.input_json {
            Some(input_filepath) => self.load_input(input_filepath)?,
            None => self.input_from_args(),
        };

        input.validate()?;

        if let Some(savepath) = &self.input_json_savepath {
            let writer = BufWriter::new(File::create(savepath)?);
            serde_json::to_writer_pretty(writer, &input)?;

            info!("Saved input file to {}", savepath.display());
        }

        Ok(input)
    }

    fn load_input(&self, input_filepath: &Path) -> Result<SimulationInput, Box<dyn Error>> {
        if !input_filepath.exists() {
            return Err(format!("Input file {:?} does not exist.", input_filepath).into());
        }
        if input_filepath.is_dir() {
            return Err(format!("Input file {:?} is a directory.", input_filepath).into());
        }

        info!("Using input file {}", input_filepath.display());

        let reader = BufReader::new(File::open(input_filepath)?);
        let mut loaded_input: SimulationInput = serde_json::from_reader(reader)
            .map_err(|err| format!("Failed to deserialize input file: {err}"))?;

        // an explicit frames directory wins over the saved one
        if let Some(frames_dir) = &self.frames_dir {
            loaded_input.output.frames_dir = frames_dir.clone();
        }

        Ok(loaded_input)
    }

    fn input_from_args(&self) -> SimulationInput {
        let frames_dir = self
            .frames_dir
            .clone()
            .unwrap_or((*DEFAULT_FRAMES_PATH).into());

        SimulationInput {
            output: ImageStreamSettings { frames_dir },
            width: self.width,
            height: self.height,
            density: self.density,
            timestep: self.timestep,
            simulation_time: self.simtime,
            steps_per_frame: self.steps_per_frame,
            relaxation: self.relaxation,
            iteration_budget: self.iteration_budget,
            inflow: InflowSettings {
                rect: InflowRect {
                    x: self.inflow_x,
                    y: self.inflow_y,
                    width: self.inflow_width,
                    height: self.inflow_height,
                },
                density: self.inflow_density,
                u: self.inflow_u,
                v: self.inflow_v,
            },
        }
    }
}
