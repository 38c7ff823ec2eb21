/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    config::Scenario,
    errors::Result,
    plot_renderer::{PlotJob, Renderer},
    report::{RunReport, SweepOutcome, SweepReport},
    result_store::{NamedResultFile, ResultStore},
    result_table::{preview, ResultTable},
    simulation_runner::Simulator,
    sweep_planner::{ParameterSet, SweepPlanner, SweepSpec},
};
use chrono::Utc;
use colored::*;
use std::fmt;
use tracing::{debug, error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Planning,
    Sweeping(usize),
    Collecting,
    Plotting,
    Done,
}
impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Planning => write!(f, "PLANNING"),
            Phase::Sweeping(idx) => write!(f, "SWEEPING({})", idx),
            Phase::Collecting => write!(f, "COLLECTING"),
            Phase::Plotting => write!(f, "PLOTTING"),
            Phase::Done => write!(f, "DONE"),
        }
    }
}

/// Drives every scenario through every sweep, one subprocess at a time.
pub struct Orchestrator<'a, S: Simulator, R: Renderer> {
    planner: &'a SweepPlanner,
    store: &'a ResultStore,
    simulator: S,
    renderer: R,
    preview: bool,
    phase: Phase,
}

impl<'a, S: Simulator, R: Renderer> Orchestrator<'a, S, R> {
    pub fn new(planner: &'a SweepPlanner, store: &'a ResultStore, simulator: S, renderer: R) -> Self {
        Self {
            planner,
            store,
            simulator,
            renderer,
            preview: false,
            phase: Phase::Planning,
        }
    }

    /// Draw every collected series in the terminal.
    pub fn with_preview(mut self, preview: bool) -> Self {
        self.preview = preview;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn into_parts(self) -> (S, R) {
        (self.simulator, self.renderer)
    }

    /// Runs all sweeps for all scenarios. Only failing to prepare the working directory is an
    /// error, everything after that is recorded in the returned report.
    pub fn run_all(
        &mut self,
        run_id: &str,
        scenarios: &[&Scenario],
        defaults: ParameterSet,
    ) -> Result<RunReport> {
        self.store.ensure_directories()?;
        self.store.reset_accumulation()?;

        let mut report = RunReport::new(run_id);
        for scenario in scenarios {
            self.transition(scenario, Phase::Planning);
            let plan = self.planner.plan(defaults);

            for (idx, sweep) in plan.iter().enumerate() {
                let sweep_report = self.run_sweep(scenario, idx, sweep);
                report.sweeps.push(sweep_report);
            }
            self.transition(scenario, Phase::Done);
        }
        report.finish();

        Ok(report)
    }

    fn transition(&mut self, scenario: &Scenario, phase: Phase) {
        debug!("{}: {} -> {}", scenario.key, self.phase, phase);
        self.phase = phase;
    }

    fn run_sweep(&mut self, scenario: &Scenario, idx: usize, sweep: &SweepSpec) -> SweepReport {
        let start = Utc::now().timestamp_millis();
        let store = self.store;
        let mut sweep_report = SweepReport {
            scenario_key: scenario.key.clone(),
            sweep_name: sweep.name().to_string(),
            points_planned: sweep.points.len(),
            points_run: 0,
            outcome: SweepOutcome::Completed,
            result_file: None,
            images: vec![],
            render_failures: vec![],
            duration_ms: 0,
        };

        self.transition(scenario, Phase::Sweeping(idx));
        let lease = match store.acquire() {
            Ok(lease) => lease,
            Err(err) => {
                error!(
                    "{} {}: unable to prepare accumulation file\n{}",
                    scenario.key,
                    sweep.name(),
                    err
                );
                sweep_report.outcome = SweepOutcome::Aborted {
                    params: None,
                    reason: err.to_string(),
                    partial: None,
                };
                sweep_report.duration_ms = Utc::now().timestamp_millis() - start;
                return sweep_report;
            }
        };

        // points must run in order, the row order is what the group-by column is read against
        for params in &sweep.points {
            println!(
                "> running scenario {} - {} {}/{} ({})",
                scenario.key.green(),
                sweep.name(),
                sweep_report.points_run + 1,
                sweep.points.len(),
                params.to_string().bright_black()
            );

            if let Err(err) = self.simulator.run(&scenario.key, params) {
                error!("{} {}: aborting sweep\n{}", scenario.key, sweep.name(), err);
                let partial = match store.quarantine(lease, &scenario.key, sweep.name()) {
                    Ok(partial) => partial,
                    Err(qerr) => {
                        warn!(
                            "Unable to set aside partial results of {} {}\n{}",
                            scenario.key,
                            sweep.name(),
                            qerr
                        );
                        None
                    }
                };
                if let Some(path) = &partial {
                    info!("Partial rows kept in {}", path.display());
                }
                sweep_report.outcome = SweepOutcome::Aborted {
                    params: Some(*params),
                    reason: err.to_string(),
                    partial,
                };
                sweep_report.duration_ms = Utc::now().timestamp_millis() - start;
                return sweep_report;
            }
            sweep_report.points_run += 1;
        }

        self.transition(scenario, Phase::Collecting);
        let named = match store.collect_sweep(lease, &scenario.key, sweep.name()) {
            Ok(named) => named,
            Err(err) => {
                error!("{} {}: skipping plots\n{}", scenario.key, sweep.name(), err);
                sweep_report.outcome = SweepOutcome::NotCollected {
                    reason: err.to_string(),
                };
                sweep_report.duration_ms = Utc::now().timestamp_millis() - start;
                return sweep_report;
            }
        };
        info!("Collected {}", named.path.display());
        sweep_report.result_file = Some(named.path.clone());

        self.transition(scenario, Phase::Plotting);
        for job in plot_jobs(scenario, sweep, &named) {
            match self.renderer.render(&job) {
                Ok(image) => {
                    info!("Rendered {}", image.display());
                    sweep_report.images.push(image);
                }
                Err(err) => {
                    warn!(
                        "{} {}: plot {} ({}) failed\n{}",
                        scenario.key,
                        sweep.name(),
                        job.output_name,
                        job.column_pair,
                        err
                    );
                    sweep_report.render_failures.push(job.output_name.clone());
                }
            }
        }

        if self.preview {
            preview_sweep(scenario, sweep, &named);
        }

        sweep_report.duration_ms = Utc::now().timestamp_millis() - start;
        sweep_report
    }
}

/// One job per metric, named `{scenario}_{sweep}_{metric}`.
pub fn plot_jobs(scenario: &Scenario, sweep: &SweepSpec, named: &NamedResultFile) -> Vec<PlotJob> {
    sweep
        .metrics
        .iter()
        .map(|metric| PlotJob {
            result_file: named.path.clone(),
            output_name: format!("{}_{}_{}", scenario.key, sweep.name(), metric.metric.name()),
            scenario_desc: scenario.desc.clone(),
            column_pair: sweep.column_pair(metric),
            metric_title: metric.label.clone(),
        })
        .collect()
}

fn preview_sweep(scenario: &Scenario, sweep: &SweepSpec, named: &NamedResultFile) {
    let table = match ResultTable::from_path(&named.path) {
        Ok(table) => table,
        Err(err) => {
            warn!("Unable to preview {}\n{}", named.path.display(), err);
            return;
        }
    };

    for metric in &sweep.metrics {
        match table.series(sweep.group_by, metric.column) {
            Ok(series) => preview(&format!("{} - {}", scenario.desc, metric.label), &series),
            Err(err) => warn!("Unable to preview {}\n{}", metric.label, err),
        }
    }
}
