/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    config::{Redirect, SimulatorConfig},
    errors::{HarnessError, Result},
    process_control::{build_command, run_blocking, Completion, OutputTarget},
    sweep_planner::ParameterSet,
};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Something that appends one result row per call to the accumulation file.
pub trait Simulator {
    fn run(&mut self, scenario_key: &str, params: &ParameterSet) -> Result<()>;
}

/// Runs the external simulator as a blocking subprocess inside the working directory.
#[derive(Debug, Clone)]
pub struct ExternalSimulator {
    command: String,
    mode: String,
    working_dir: PathBuf,
    timeout_secs: Option<u64>,
    redirect: Redirect,
}
impl ExternalSimulator {
    pub fn new(config: &SimulatorConfig, working_dir: &Path) -> Self {
        Self {
            command: config.command.clone(),
            mode: config.mode.clone(),
            working_dir: working_dir.to_path_buf(),
            timeout_secs: config.timeout_secs,
            redirect: config.redirect.unwrap_or(Redirect::Null),
        }
    }

    /// Full argument vector for one invocation: scenario, mode, steps, traffic, randomness.
    pub fn command_for(&self, scenario_key: &str, params: &ParameterSet) -> Result<Vec<String>> {
        let [steps, traffic, randomness] = params.to_args();
        let args = [
            scenario_key.to_string(),
            self.mode.clone(),
            steps,
            traffic,
            randomness,
        ];
        build_command(&self.command, &args)
    }
}

impl Simulator for ExternalSimulator {
    fn run(&mut self, scenario_key: &str, params: &ParameterSet) -> Result<()> {
        let words = self.command_for(scenario_key, params)?;
        debug!("Simulating {} with {}", scenario_key, params);

        match run_blocking(
            &words,
            &self.working_dir,
            OutputTarget::Redirect(self.redirect),
            self.timeout_secs,
        )? {
            Completion::Success => {
                info!("Simulated {} with {}", scenario_key, params);
                Ok(())
            }
            Completion::Failed(reason) => Err(HarnessError::RunFailure {
                scenario: scenario_key.to_string(),
                params: *params,
                reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simulator(command: &str, working_dir: &Path) -> ExternalSimulator {
        let config = SimulatorConfig {
            command: command.to_string(),
            ..SimulatorConfig::default()
        };
        ExternalSimulator::new(&config, working_dir)
    }

    #[test]
    fn passes_positional_arguments_in_order() -> anyhow::Result<()> {
        let sim = simulator("java -jar sim.jar", Path::new("."));
        let params = ParameterSet {
            steps: 30_000,
            traffic: 0.11,
            randomness: 0.0,
        };
        assert_eq!(
            sim.command_for("one_direction", &params)?,
            ["java", "-jar", "sim.jar", "one_direction", "1", "30000", "0.11", "0.0"]
        );
        Ok(())
    }

    #[test]
    fn default_command_wraps_arguments_for_maven() -> anyhow::Result<()> {
        let sim = ExternalSimulator::new(&SimulatorConfig::default(), Path::new("."));
        let words = sim.command_for("crossroad", &ParameterSet::default())?;
        assert_eq!(words.last().map(String::as_str), Some("-Dexec.args=crossroad 1 10000 0.5 0.5"));
        Ok(())
    }

    #[cfg(target_family = "unix")]
    mod unix {
        use super::*;
        use crate::errors::ExitReason;
        use std::fs;

        #[test]
        fn simulator_appends_to_accumulation_file() -> anyhow::Result<()> {
            let dir = tempfile::tempdir()?;
            let mut sim = simulator(
                "sh -c 'printf \"%s\\t%s\\t%s\\t1\\t2\\t3\\t4\\n\" \"$3\" \"$4\" \"$5\" >> results.txt' sim",
                dir.path(),
            );

            sim.run("crossroad", &ParameterSet::default())?;
            sim.run(
                "crossroad",
                &ParameterSet {
                    steps: 20_000,
                    ..ParameterSet::default()
                },
            )?;

            let rows = fs::read_to_string(dir.path().join("results.txt"))?;
            assert_eq!(
                rows,
                "10000\t0.5\t0.5\t1\t2\t3\t4\n20000\t0.5\t0.5\t1\t2\t3\t4\n"
            );
            Ok(())
        }

        #[test]
        fn non_zero_exit_is_a_run_failure() -> anyhow::Result<()> {
            let dir = tempfile::tempdir()?;
            let mut sim = simulator("sh -c 'exit 7' sim", dir.path());
            let params = ParameterSet::default();

            match sim.run("crossroad", &params) {
                Err(HarnessError::RunFailure {
                    scenario,
                    params: failed,
                    reason,
                }) => {
                    assert_eq!(scenario, "crossroad");
                    assert_eq!(failed, params);
                    assert_eq!(reason, ExitReason::Code(7));
                }
                other => panic!("expected a run failure, got {:?}", other),
            }
            Ok(())
        }
    }
}
