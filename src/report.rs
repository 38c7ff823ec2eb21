/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    errors::Result,
    sweep_planner::{format_intensity, Field, ParameterSet, SweepSpec},
};
use itertools::Itertools;
use chrono::{DateTime, Utc};
use colored::*;
use serde::Serialize;
use std::{fs, path::Path, path::PathBuf};
use term_table::{row, row::Row, table_cell::*, Table, TableStyle};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SweepOutcome {
    Completed,
    /// A simulator invocation failed, the remaining points were skipped.
    Aborted {
        params: Option<ParameterSet>,
        reason: String,
        partial: Option<PathBuf>,
    },
    /// All points ran but their rows could not be collected.
    NotCollected { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepReport {
    pub scenario_key: String,
    pub sweep_name: String,
    pub points_planned: usize,
    pub points_run: usize,
    pub outcome: SweepOutcome,
    pub result_file: Option<PathBuf>,
    pub images: Vec<PathBuf>,
    pub render_failures: Vec<String>,
    pub duration_ms: i64,
}
impl SweepReport {
    pub fn is_clean(&self) -> bool {
        self.outcome == SweepOutcome::Completed && self.render_failures.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub sweeps: Vec<SweepReport>,
}
impl RunReport {
    pub fn new(run_id: &str) -> Self {
        Self {
            run_id: run_id.to_string(),
            started_at: Utc::now(),
            finished_at: None,
            sweeps: vec![],
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(Utc::now());
    }

    pub fn has_failures(&self) -> bool {
        self.sweeps.iter().any(|sweep| !sweep.is_clean())
    }

    pub fn result_files(&self) -> Vec<&PathBuf> {
        self.sweeps
            .iter()
            .filter_map(|sweep| sweep.result_file.as_ref())
            .collect()
    }

    pub fn images(&self) -> Vec<&PathBuf> {
        self.sweeps.iter().flat_map(|sweep| sweep.images.iter()).collect()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Table with one line per sweep for the end of a run.
    pub fn render_summary(&self) -> String {
        let mut rows: Vec<Row> = vec![row![
            TableCell::builder("Scenario".bold()).build(),
            TableCell::builder("Sweep".bold()).build(),
            TableCell::builder("Points".bold()).build(),
            TableCell::builder("Images".bold()).build(),
            TableCell::builder("Duration (s)".bold()).build(),
            TableCell::builder("Status".bold()).build()
        ]];

        for sweep in &self.sweeps {
            let status = match &sweep.outcome {
                SweepOutcome::Completed if sweep.render_failures.is_empty() => "✓".green(),
                SweepOutcome::Completed => {
                    format!("{} plot(s) failed", sweep.render_failures.len()).yellow()
                }
                SweepOutcome::Aborted { reason, .. } => format!("aborted: {}", reason).red(),
                SweepOutcome::NotCollected { reason } => {
                    format!("not collected: {}", reason).red()
                }
            };

            rows.push(row![
                TableCell::new(sweep.scenario_key.green()),
                TableCell::new(&sweep.sweep_name),
                TableCell::new(format!("{}/{}", sweep.points_run, sweep.points_planned)),
                TableCell::new(format!(
                    "{}/{}",
                    sweep.images.len(),
                    sweep.images.len() + sweep.render_failures.len()
                )),
                TableCell::new(format!("{:.3}", sweep.duration_ms as f64 / 1000.0)),
                TableCell::new(status)
            ]);
        }

        Table::builder()
            .rows(rows)
            .style(TableStyle::rounded())
            .build()
            .render()
    }
}

/// Table describing what a run would execute, one line per sweep.
pub fn render_plan(scenario_keys: &[&str], plan: &[SweepSpec]) -> String {
    let mut rows: Vec<Row> = vec![row![
        TableCell::builder("Sweep".bold()).build(),
        TableCell::builder("Points".bold()).build(),
        TableCell::builder("Range".bold()).build(),
        TableCell::builder("Columns".bold()).build()
    ]];

    for sweep in plan {
        let field = sweep.kind.varied_field();
        let value = |params: Option<&ParameterSet>| match params {
            Some(params) if field == Field::Steps => params.steps.to_string(),
            Some(params) => format_intensity(params.value_of(field)),
            None => "--".to_string(),
        };

        rows.push(row![
            TableCell::new(sweep.name().green()),
            TableCell::new(sweep.points.len()),
            TableCell::new(format!(
                "{} .. {}",
                value(sweep.points.first()),
                value(sweep.points.last())
            )),
            TableCell::new(sweep.metrics.iter().map(|m| sweep.column_pair(m)).join(" "))
        ]);
    }

    let table = Table::builder()
        .rows(rows)
        .style(TableStyle::rounded())
        .build();
    format!(
        "{} {}\n{}",
        "Scenarios:".bold(),
        scenario_keys.join(", "),
        table.render()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sweep(outcome: SweepOutcome, render_failures: Vec<String>) -> SweepReport {
        SweepReport {
            scenario_key: "crossroad".to_string(),
            sweep_name: "traffic_test".to_string(),
            points_planned: 14,
            points_run: 14,
            outcome,
            result_file: Some(PathBuf::from("results/crossroad_traffic_test.txt")),
            images: vec![PathBuf::from("plots/results/crossroad_traffic_test_velocity.png")],
            render_failures,
            duration_ms: 1500,
        }
    }

    #[test]
    fn clean_run_has_no_failures() {
        let mut report = RunReport::new("abcde");
        report.sweeps.push(sweep(SweepOutcome::Completed, vec![]));
        assert!(!report.has_failures());
        assert_eq!(report.result_files().len(), 1);
        assert_eq!(report.images().len(), 1);
    }

    #[test]
    fn render_failures_count_as_failures() {
        let mut report = RunReport::new("abcde");
        report.sweeps.push(sweep(
            SweepOutcome::Completed,
            vec!["crossroad_traffic_test_waiting_time".to_string()],
        ));
        assert!(report.has_failures());
    }

    #[test]
    fn summary_lists_every_sweep() {
        let mut report = RunReport::new("abcde");
        report.sweeps.push(sweep(SweepOutcome::Completed, vec![]));
        report.sweeps.push(sweep(
            SweepOutcome::NotCollected {
                reason: "no rows".to_string(),
            },
            vec![],
        ));

        let summary = report.render_summary();
        assert!(summary.contains("traffic_test"));
        assert!(summary.contains("not collected: no rows"));
        assert!(summary.contains("14/14"));
    }

    #[test]
    fn plan_table_shows_ranges_and_columns() -> anyhow::Result<()> {
        use crate::{
            config::{MetricLabels, SweepRanges},
            sweep_planner::SweepPlanner,
        };

        let planner = SweepPlanner::new(SweepRanges::default(), &MetricLabels::default())?;
        let plan = planner.plan(ParameterSet::default());
        let table = render_plan(&["crossroad"], &plan);

        assert!(table.contains("crossroad"));
        assert!(table.contains("10000 .. 100000"));
        assert!(table.contains("0.01 .. 0.66"));
        assert!(table.contains("0.0 .. 1.0"));
        assert!(table.contains("3:4 3:5 3:6 3:7"));
        Ok(())
    }

    #[test]
    fn report_is_written_as_json() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("report.json");

        let mut report = RunReport::new("abcde");
        report.sweeps.push(sweep(
            SweepOutcome::Aborted {
                params: Some(ParameterSet::default()),
                reason: "exit code 1".to_string(),
                partial: None,
            },
            vec![],
        ));
        report.finish();
        report.write_json(&path)?;

        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&path)?)?;
        assert_eq!(json["run_id"], "abcde");
        assert_eq!(json["sweeps"][0]["outcome"]["status"], "aborted");
        assert_eq!(json["sweeps"][0]["outcome"]["params"]["steps"], 10_000);
        Ok(())
    }
}
