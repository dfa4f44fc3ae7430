// Contains post-processers for analyzing simulation results

use tracing::{info, warn};

use crate::{preprocessing::SimulationInput, sim::task::SimulationOutput};

pub fn postprocess(sim_input: &SimulationInput, sim_output: &SimulationOutput) {
    let stats = &sim_output.solve_stats;

    info!(
        "Simulation finished:\n\n\
        \t simulated:  {:.3} s in {} steps\n\
        \t frames:     {} in {}\n\
        \t pressure:   {} converged, {} over budget, {:.1} sweeps on average\n\n\
        ",
        sim_output.simulated_time,
        sim_output.steps,
        sim_output.frames,
        sim_input.output.frames_dir.display(),
        stats.converged,
        stats.exhausted,
        stats.mean_iterations(),
    );

    if stats.exhausted > 0 {
        warn!(
            "{} of {} pressure solves ran out of budget (worst max delta {:e}); \
            consider raising --iteration-budget",
            stats.exhausted, stats.solves, stats.worst_max_delta
        );
    }
}
