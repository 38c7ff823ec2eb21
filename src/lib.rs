/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub mod clap_args;
pub mod config;
pub mod errors;
pub mod orchestrator;
pub mod plot_renderer;
pub mod process_control;
pub mod report;
pub mod result_store;
pub mod result_table;
pub mod simulation_runner;
pub mod sweep_planner;

use config::Config;
use orchestrator::Orchestrator;
use plot_renderer::GnuplotRenderer;
use report::RunReport;
use result_store::ResultStore;
use simulation_runner::ExternalSimulator;
use sweep_planner::SweepPlanner;
use tracing::info;

/// Options of a single `simsweep run`.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    pub scenarios: Vec<String>,
    pub preview: bool,
}

/// Validates the whole configuration, then runs every selected scenario against the external
/// simulator and plotter. Configuration errors surface before any subprocess starts.
pub fn run(config: &Config, options: &RunOptions) -> errors::Result<RunReport> {
    let scenarios = config.find_scenarios(&options.scenarios)?;
    let planner = SweepPlanner::new(config.sweeps, &config.labels)?;

    let store = ResultStore::new(&config.working_dir, &config.accumulation_file);
    let simulator = ExternalSimulator::new(&config.simulator, &config.working_dir);
    let renderer = GnuplotRenderer::new(&config.plotter, &config.working_dir);

    let run_id = nanoid::nanoid!(5, &nanoid::alphabet::SAFE);
    info!(
        "Starting run {} for {} scenario(s) in {}",
        run_id,
        scenarios.len(),
        config.working_dir.display()
    );

    let mut orchestrator =
        Orchestrator::new(&planner, &store, simulator, renderer).with_preview(options.preview);
    orchestrator.run_all(&run_id, &scenarios, config.defaults)
}
