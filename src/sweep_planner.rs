/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    config::{IntRange, MetricLabels, SweepRanges},
    errors::{HarnessError, Result},
};
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use std::fmt;

/// One point of the parameter grid, the three values handed to the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ParameterSet {
    pub steps: u32,
    pub traffic: f64,
    pub randomness: f64,
}
impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            steps: 10_000,
            traffic: 0.5,
            randomness: 0.5,
        }
    }
}
impl ParameterSet {
    pub fn validate(&self) -> Result<()> {
        if self.steps == 0 {
            return Err(HarnessError::config("step count must be positive"));
        }
        if !(0.0..=1.0).contains(&self.traffic) {
            return Err(HarnessError::config(format!(
                "traffic intensity {} is outside [0, 1]",
                self.traffic
            )));
        }
        if !(0.0..=1.0).contains(&self.randomness) {
            return Err(HarnessError::config(format!(
                "randomness intensity {} is outside [0, 1]",
                self.randomness
            )));
        }
        Ok(())
    }

    pub fn value_of(&self, field: Field) -> f64 {
        match field {
            Field::Steps => self.steps as f64,
            Field::Traffic => self.traffic,
            Field::Randomness => self.randomness,
        }
    }

    /// Step count, traffic and randomness as the simulator expects them on its command line.
    pub fn to_args(&self) -> [String; 3] {
        [
            self.steps.to_string(),
            format_intensity(self.traffic),
            format_intensity(self.randomness),
        ]
    }
}
impl fmt::Display for ParameterSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [steps, traffic, randomness] = self.to_args();
        write!(f, "steps={} traffic={} randomness={}", steps, traffic, randomness)
    }
}

/// Formats an intensity as a decimal string that always carries a fractional part, so
/// `0.0` and `1.0` are never passed as bare integers.
pub fn format_intensity(value: f64) -> String {
    if value.fract() == 0.0 {
        format!("{:.1}", value)
    } else {
        format!("{}", value)
    }
}

/// The simulator inputs, each of which is echoed into the result table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Steps,
    Traffic,
    Randomness,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    Velocity,
    WaitingTime,
    DrivingTime,
    WaitingAgents,
}
impl Metric {
    pub const ALL: [Metric; 4] = [
        Metric::Velocity,
        Metric::WaitingTime,
        Metric::DrivingTime,
        Metric::WaitingAgents,
    ];

    /// Used in image names.
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Velocity => "velocity",
            Metric::WaitingTime => "waiting_time",
            Metric::DrivingTime => "driving_time",
            Metric::WaitingAgents => "waiting_agents",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Input(Field),
    Output(Metric),
}

/// Column layout of a row written by the simulator, 1-based. Trailing columns beyond these
/// are ignored.
pub const OUTPUT_SCHEMA: [Column; 7] = [
    Column::Input(Field::Steps),
    Column::Input(Field::Traffic),
    Column::Input(Field::Randomness),
    Column::Output(Metric::Velocity),
    Column::Output(Metric::WaitingTime),
    Column::Output(Metric::DrivingTime),
    Column::Output(Metric::WaitingAgents),
];

fn column_of(column: Column) -> Result<usize> {
    OUTPUT_SCHEMA
        .iter()
        .position(|c| *c == column)
        .map(|idx| idx + 1)
        .ok_or_else(|| HarnessError::config(format!("{:?} is not part of the output schema", column)))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SweepKind {
    SimulationTime,
    Traffic,
    Randomness,
}
impl SweepKind {
    pub const ALL: [SweepKind; 3] = [
        SweepKind::SimulationTime,
        SweepKind::Traffic,
        SweepKind::Randomness,
    ];

    /// Used in result file and image names.
    pub fn name(&self) -> &'static str {
        match self {
            SweepKind::SimulationTime => "simulation_time_test",
            SweepKind::Traffic => "traffic_test",
            SweepKind::Randomness => "crazy_test",
        }
    }

    pub fn varied_field(&self) -> Field {
        match self {
            SweepKind::SimulationTime => Field::Steps,
            SweepKind::Traffic => Field::Traffic,
            SweepKind::Randomness => Field::Randomness,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricSpec {
    pub metric: Metric,
    pub column: usize,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepSpec {
    pub kind: SweepKind,
    pub points: Vec<ParameterSet>,
    pub group_by: usize,
    pub metrics: Vec<MetricSpec>,
}
impl SweepSpec {
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    /// The gnuplot `using` token for one metric, e.g. `1:4`.
    pub fn column_pair(&self, metric: &MetricSpec) -> String {
        format!("{}:{}", self.group_by, metric.column)
    }
}

/// Column assignment for one sweep, resolved against [`OUTPUT_SCHEMA`] once.
#[derive(Debug, Clone, PartialEq)]
struct SweepColumns {
    kind: SweepKind,
    group_by: usize,
}

#[derive(Debug, Clone)]
pub struct SweepPlanner {
    ranges: SweepRanges,
    columns: Vec<SweepColumns>,
    metrics: Vec<MetricSpec>,
}
impl SweepPlanner {
    /// Validates the ranges and resolves every sweep's columns. Nothing can fail after this.
    pub fn new(ranges: SweepRanges, labels: &MetricLabels) -> Result<Self> {
        validate_range("simulation_time", &ranges.simulation_time)?;
        if ranges.simulation_time.min == 0 {
            return Err(HarnessError::config(
                "sweep simulation_time: step counts must be positive",
            ));
        }

        validate_range("traffic", &ranges.traffic)?;
        if ranges.traffic.max > 100 {
            return Err(HarnessError::config(format!(
                "sweep traffic: {}% is above 100%",
                ranges.traffic.max
            )));
        }

        if ranges.randomness.max == 0 {
            return Err(HarnessError::config("sweep randomness: max must be at least 1"));
        }

        let columns = SweepKind::ALL
            .iter()
            .map(|kind| {
                Ok(SweepColumns {
                    kind: *kind,
                    group_by: column_of(Column::Input(kind.varied_field()))?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metrics = Metric::ALL
            .iter()
            .map(|metric| {
                Ok(MetricSpec {
                    metric: *metric,
                    column: column_of(Column::Output(*metric))?,
                    label: labels.label_for(*metric).to_string(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        // group-by and metric columns must never collide
        let all_columns = columns
            .iter()
            .map(|c| c.group_by)
            .chain(metrics.iter().map(|m| m.column))
            .collect_vec();
        if !all_columns.iter().all_unique() {
            return Err(HarnessError::config(format!(
                "sweep columns overlap: {:?}",
                all_columns
            )));
        }

        Ok(Self {
            ranges,
            columns,
            metrics,
        })
    }

    /// The three sweeps in execution order, each holding every field but its own at `defaults`.
    pub fn plan(&self, defaults: ParameterSet) -> Vec<SweepSpec> {
        self.columns
            .iter()
            .map(|columns| SweepSpec {
                kind: columns.kind,
                points: self.points(columns.kind, defaults),
                group_by: columns.group_by,
                metrics: self.metrics.clone(),
            })
            .collect()
    }

    fn points(&self, kind: SweepKind, defaults: ParameterSet) -> Vec<ParameterSet> {
        match kind {
            SweepKind::SimulationTime => walk(&self.ranges.simulation_time)
                .map(|steps| ParameterSet { steps, ..defaults })
                .collect(),

            SweepKind::Traffic => walk(&self.ranges.traffic)
                .map(|percent| ParameterSet {
                    traffic: percent as f64 / 100.0,
                    ..defaults
                })
                .collect(),

            SweepKind::Randomness => {
                let max = self.ranges.randomness.max;
                (0..=max)
                    .map(|i| ParameterSet {
                        randomness: i as f64 / max as f64,
                        ..defaults
                    })
                    .collect()
            }
        }
    }
}

fn validate_range(name: &str, range: &IntRange) -> Result<()> {
    if range.min > range.max {
        return Err(HarnessError::config(format!(
            "sweep {}: min {} is greater than max {}",
            name, range.min, range.max
        )));
    }
    if range.stride == 0 {
        return Err(HarnessError::config(format!("sweep {}: stride must be positive", name)));
    }
    Ok(())
}

fn walk(range: &IntRange) -> impl Iterator<Item = u32> {
    (range.min..=range.max).step_by(range.stride as usize)
}
