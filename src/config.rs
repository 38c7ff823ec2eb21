/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    errors::{HarnessError, Result},
    sweep_planner::{Metric, ParameterSet},
};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{Read, Write},
    path::{Path, PathBuf},
};

static EXAMPLE_CONFIG: &str = include_str!("templates/simsweep.toml");

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Config {
    #[serde(default = "default_working_dir")]
    pub working_dir: PathBuf,
    #[serde(default = "default_accumulation_file")]
    pub accumulation_file: PathBuf,
    #[serde(default)]
    pub simulator: SimulatorConfig,
    #[serde(default)]
    pub plotter: PlotterConfig,
    #[serde(default)]
    pub defaults: ParameterSet,
    #[serde(default, rename(serialize = "sweep", deserialize = "sweep"))]
    pub sweeps: SweepRanges,
    #[serde(default)]
    pub labels: MetricLabels,
    #[serde(rename(serialize = "scenario", deserialize = "scenario"))]
    pub scenarios: Vec<Scenario>,
}
impl Config {
    /// Writes the bundled example configuration to `path`. Refuses to overwrite an existing file.
    pub fn write_example_to_file(path: &Path) -> anyhow::Result<File> {
        let mut file = File::create_new(path)
            .with_context(|| format!("Unable to create config at {}", path.display()))?;
        file.write_all(EXAMPLE_CONFIG.as_bytes())?;
        Ok(file)
    }

    pub fn try_from_path(path: &Path) -> anyhow::Result<Config> {
        let mut config_str = String::new();
        fs::File::open(path)
            .with_context(|| format!("Unable to open config {}", path.display()))?
            .read_to_string(&mut config_str)?;
        let config = Config::try_from_str(&config_str)?;

        // a relative working dir is relative to the config file, not to the caller
        match path.parent() {
            Some(parent) if config.working_dir.is_relative() => Ok(Config {
                working_dir: parent.join(&config.working_dir),
                ..config
            }),
            _ => Ok(config),
        }
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        let config = toml::from_str::<Config>(conf_str)
            .map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that does not depend on the sweep planner. Range checks live in
    /// [`crate::sweep_planner::SweepPlanner::new`].
    pub fn validate(&self) -> Result<()> {
        if self.scenarios.is_empty() {
            return Err(HarnessError::config("at least one [[scenario]] is required"));
        }
        for (i, scenario) in self.scenarios.iter().enumerate() {
            if scenario.key.trim().is_empty() {
                return Err(HarnessError::config(format!("scenario #{} has an empty key", i + 1)));
            }
            if scenario.key.contains(['/', '\\']) {
                return Err(HarnessError::config(format!(
                    "scenario key {} must not contain path separators",
                    scenario.key
                )));
            }
            if self.scenarios[..i].iter().any(|s| s.key == scenario.key) {
                return Err(HarnessError::config(format!(
                    "scenario {} is defined more than once",
                    scenario.key
                )));
            }
        }
        if self.simulator.command.trim().is_empty() {
            return Err(HarnessError::config("simulator.command must not be empty"));
        }
        if self.plotter.command.trim().is_empty() {
            return Err(HarnessError::config("plotter.command must not be empty"));
        }
        self.defaults.validate()
    }

    pub fn find_scenario(&self, scenario_key: &str) -> Result<&Scenario> {
        self.scenarios
            .iter()
            .find(|scenario| scenario.key == scenario_key)
            .ok_or_else(|| {
                HarnessError::config(format!("Unable to find scenario with key {}", scenario_key))
            })
    }

    /// Resolves the given keys in config order. An empty filter selects every scenario.
    pub fn find_scenarios(&self, scenario_keys: &[String]) -> Result<Vec<&Scenario>> {
        for key in scenario_keys {
            self.find_scenario(key)?;
        }
        Ok(self
            .scenarios
            .iter()
            .filter(|s| scenario_keys.is_empty() || scenario_keys.contains(&s.key))
            .collect())
    }
}

fn default_working_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_accumulation_file() -> PathBuf {
    PathBuf::from("results.txt")
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Redirect {
    Null,
    Parent,
    File,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimulatorConfig {
    /// Command prefix. A `{args}` placeholder receives the five arguments as one word,
    /// otherwise they are appended positionally.
    pub command: String,
    pub mode: String,
    pub timeout_secs: Option<u64>,
    pub redirect: Option<Redirect>,
}
impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            command: "mvn -q exec:java -Dexec.args=\"{args}\"".to_string(),
            mode: "1".to_string(),
            timeout_secs: None,
            redirect: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct PlotterConfig {
    pub command: String,
    pub script: PathBuf,
    pub terminal: String,
    pub line_style: String,
    pub timeout_secs: Option<u64>,
}
impl Default for PlotterConfig {
    fn default() -> Self {
        Self {
            command: "gnuplot".to_string(),
            script: PathBuf::from("plot.gp"),
            terminal: "png".to_string(),
            line_style: "lines".to_string(),
            timeout_secs: None,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct Scenario {
    pub key: String,
    pub desc: String,
}
impl Scenario {
    pub fn new(key: &str, desc: &str) -> Self {
        Self {
            key: key.to_string(),
            desc: desc.to_string(),
        }
    }
}

/// An inclusive integer range walked with a fixed stride.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct IntRange {
    pub min: u32,
    pub max: u32,
    pub stride: u32,
}
impl IntRange {
    pub fn new(min: u32, max: u32, stride: u32) -> Self {
        Self { min, max, stride }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct RandomnessRange {
    /// Number of unit steps between 0 and full randomness.
    pub max: u32,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct SweepRanges {
    /// Step counts.
    pub simulation_time: IntRange,
    /// Integer percent, normalized by 100.
    pub traffic: IntRange,
    pub randomness: RandomnessRange,
}
impl Default for SweepRanges {
    fn default() -> Self {
        Self {
            simulation_time: IntRange::new(10_000, 100_000, 10_000),
            traffic: IntRange::new(1, 70, 5),
            randomness: RandomnessRange { max: 10 },
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct MetricLabels {
    pub velocity: String,
    pub waiting_time: String,
    pub driving_time: String,
    pub waiting_agents: String,
}
impl MetricLabels {
    pub fn label_for(&self, metric: Metric) -> &str {
        match metric {
            Metric::Velocity => &self.velocity,
            Metric::WaitingTime => &self.waiting_time,
            Metric::DrivingTime => &self.driving_time,
            Metric::WaitingAgents => &self.waiting_agents,
        }
    }
}
impl Default for MetricLabels {
    fn default() -> Self {
        Self {
            velocity: "Velocity".to_string(),
            waiting_time: "Waiting time".to_string(),
            driving_time: "Driving time".to_string(),
            waiting_agents: "Waiting agents".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn can_load_config_file() -> anyhow::Result<()> {
        let cfg = Config::try_from_path(Path::new("./fixtures/simsweep.success.toml"))?;
        assert_eq!(cfg.scenarios.len(), 3);
        assert_eq!(cfg.working_dir, Path::new("./fixtures"));
        Ok(())
    }

    #[test]
    fn example_config_parses() -> anyhow::Result<()> {
        let cfg = Config::try_from_str(EXAMPLE_CONFIG)?;
        assert_eq!(cfg.sweeps, SweepRanges::default());
        assert_eq!(cfg.defaults, ParameterSet::default());
        Ok(())
    }

    #[test]
    fn minimal_config_uses_defaults() -> anyhow::Result<()> {
        let cfg = Config::try_from_str(
            r#"
            [[scenario]]
            key = "crossroad"
            desc = "Two-way traffic"
            "#,
        )?;

        assert_eq!(cfg.accumulation_file, Path::new("results.txt"));
        assert_eq!(cfg.plotter, PlotterConfig::default());
        assert_eq!(cfg.simulator.mode, "1");
        assert_eq!(cfg.labels.label_for(Metric::WaitingAgents), "Waiting agents");
        Ok(())
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() -> anyhow::Result<()> {
        let cfg = Config::try_from_str(
            r#"
            [plotter]
            timeout_secs = 30

            [sweep.traffic]
            min = 10
            max = 50
            stride = 10

            [labels]
            velocity = "Szybkość"

            [[scenario]]
            key = "a"
            desc = "A"
            "#,
        )?;

        assert_eq!(cfg.plotter.command, "gnuplot");
        assert_eq!(cfg.plotter.timeout_secs, Some(30));
        assert_eq!(cfg.sweeps.traffic, IntRange::new(10, 50, 10));
        assert_eq!(cfg.sweeps.simulation_time, SweepRanges::default().simulation_time);
        assert_eq!(cfg.labels.label_for(Metric::Velocity), "Szybkość");
        assert_eq!(cfg.labels.label_for(Metric::DrivingTime), "Driving time");
        Ok(())
    }

    #[test]
    fn rejects_config_without_scenarios() {
        let res = Config::try_from_str("scenario = []");
        assert!(res.is_err());
    }

    #[test]
    fn rejects_duplicate_scenarios() {
        let res = Config::try_from_str(
            r#"
            [[scenario]]
            key = "a"
            desc = "A"

            [[scenario]]
            key = "a"
            desc = "again"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn rejects_out_of_range_defaults() {
        let res = Config::try_from_str(
            r#"
            [defaults]
            steps = 1000
            traffic = 1.5
            randomness = 0.5

            [[scenario]]
            key = "a"
            desc = "A"
            "#,
        );
        assert!(res.is_err());
    }

    #[test]
    fn can_find_scenario_by_key() -> anyhow::Result<()> {
        let cfg = Config::try_from_path(Path::new("./fixtures/simsweep.success.toml"))?;
        assert!(cfg.find_scenario("crossroad").is_ok());
        assert!(cfg.find_scenario("nope").is_err());
        Ok(())
    }

    #[test]
    fn find_scenarios_keeps_config_order() -> anyhow::Result<()> {
        let cfg = Config::try_from_path(Path::new("./fixtures/simsweep.success.toml"))?;

        let keys = |scenarios: Vec<&Scenario>| {
            scenarios.iter().map(|s| s.key.clone()).collect::<Vec<_>>()
        };

        let all = cfg.find_scenarios(&[])?;
        assert_eq!(keys(all), ["crossroad_default", "crossroad", "one_direction"]);

        let filtered =
            cfg.find_scenarios(&["one_direction".to_string(), "crossroad_default".to_string()])?;
        assert_eq!(keys(filtered), ["crossroad_default", "one_direction"]);

        assert!(cfg.find_scenarios(&["nope".to_string()]).is_err());
        Ok(())
    }

    #[test]
    fn example_config_is_not_overwritten() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("simsweep.toml");

        Config::write_example_to_file(&path)?;
        assert!(Config::try_from_path(&path).is_ok());
        assert!(Config::write_example_to_file(&path).is_err());
        Ok(())
    }
}
