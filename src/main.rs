use std::process::exit;

use clap::Parser;
use smoke_2d::{postprocessing, preprocessing::cli::CliArgs, sim::task};
use tracing::{Level, error};

fn main() {
    let args = CliArgs::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    let simulation_input = args.create_input().unwrap_or_else(|err| {
        error!("{err}");
        exit(1);
    });
    simulation_input.log();

    let sim_thread = task::spawn_sim_thread(simulation_input.clone());

    let simulation_output = match sim_thread.join() {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => {
            error!("Simulation failed: {err}");
            exit(1);
        }
        Err(_) => {
            error!("Simulation thread panicked");
            exit(1);
        }
    };

    postprocessing::postprocess(&simulation_input, &simulation_output);
}
