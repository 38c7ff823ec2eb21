/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    config::PlotterConfig,
    errors::{HarnessError, Result},
    process_control::{build_command, run_blocking, Completion, OutputTarget},
    result_store::PLOTS_DIR,
};
use serde::Serialize;
use std::{
    fs::{self, File},
    path::{Path, PathBuf},
};
use tracing::debug;

/// One image to render from one result file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlotJob {
    pub result_file: PathBuf,
    pub output_name: String,
    pub scenario_desc: String,
    pub column_pair: String,
    pub metric_title: String,
}
impl PlotJob {
    pub fn title(&self) -> String {
        format!("{} - {}", self.scenario_desc, self.metric_title)
    }
}

pub trait Renderer {
    /// Renders the job and returns the path of the image.
    fn render(&mut self, job: &PlotJob) -> Result<PathBuf>;
}

/// Writes a gnuplot script next to the results and pipes the plotter's stdout into
/// `plots/results/{output_name}.png`.
#[derive(Debug, Clone)]
pub struct GnuplotRenderer {
    command: String,
    script: PathBuf,
    script_path: PathBuf,
    terminal: String,
    line_style: String,
    timeout_secs: Option<u64>,
    working_dir: PathBuf,
}
impl GnuplotRenderer {
    pub fn new(config: &PlotterConfig, working_dir: &Path) -> Self {
        Self {
            command: config.command.clone(),
            script: config.script.clone(),
            script_path: working_dir.join(&config.script),
            terminal: config.terminal.clone(),
            line_style: config.line_style.clone(),
            timeout_secs: config.timeout_secs,
            working_dir: working_dir.to_path_buf(),
        }
    }

    pub fn image_path(&self, output_name: &str) -> PathBuf {
        self.working_dir
            .join(PLOTS_DIR)
            .join(format!("{}.png", output_name))
    }

    pub fn script_for(&self, job: &PlotJob) -> String {
        // the plotter runs inside the working directory
        let result_file = job
            .result_file
            .strip_prefix(&self.working_dir)
            .unwrap_or(&job.result_file);

        format!(
            "set term {}\nplot '{}' using {} with {} title '{}'\n",
            self.terminal,
            quote(&result_file.to_string_lossy()),
            job.column_pair,
            self.line_style,
            quote(&job.title())
        )
    }
}

impl Renderer for GnuplotRenderer {
    fn render(&mut self, job: &PlotJob) -> Result<PathBuf> {
        fs::write(&self.script_path, self.script_for(job))?;

        let image = self.image_path(&job.output_name);
        // the plotter resolves the script against its own cwd, the working directory
        let words = build_command(&self.command, &[self.script.to_string_lossy().to_string()])?;
        debug!("Rendering {} with {}", image.display(), words.join(" "));

        let completion = run_blocking(
            &words,
            &self.working_dir,
            OutputTarget::File(File::create(&image)?),
            self.timeout_secs,
        );

        match completion {
            Ok(Completion::Success) => Ok(image),
            Ok(Completion::Failed(reason)) => {
                // never leave a truncated image behind
                let _ = fs::remove_file(&image);
                Err(HarnessError::RenderFailure {
                    output: job.output_name.clone(),
                    reason,
                })
            }
            Err(err) => {
                let _ = fs::remove_file(&image);
                Err(err)
            }
        }
    }
}

/// Escapes a value for a single-quoted gnuplot string.
fn quote(value: &str) -> String {
    value.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(working_dir: &Path) -> PlotJob {
        PlotJob {
            result_file: working_dir
                .join("results")
                .join("crossroad_simulation_time_test.txt"),
            output_name: "crossroad_simulation_time_test_velocity".to_string(),
            scenario_desc: "Ruch w dwóch kierunkach".to_string(),
            column_pair: "1:4".to_string(),
            metric_title: "Szybkość".to_string(),
        }
    }

    #[test]
    fn script_has_terminal_and_plot_directives() {
        let dir = Path::new("/work");
        let renderer = GnuplotRenderer::new(&PlotterConfig::default(), dir);

        assert_eq!(
            renderer.script_for(&job(dir)),
            "set term png\nplot 'results/crossroad_simulation_time_test.txt' using 1:4 with lines title 'Ruch w dwóch kierunkach - Szybkość'\n"
        );
    }

    #[test]
    fn quotes_in_titles_are_escaped() {
        let dir = Path::new("/work");
        let renderer = GnuplotRenderer::new(&PlotterConfig::default(), dir);
        let job = PlotJob {
            scenario_desc: "Driver's view".to_string(),
            ..job(dir)
        };
        assert!(renderer
            .script_for(&job)
            .ends_with("title 'Driver''s view - Szybkość'\n"));
    }

    #[cfg(target_family = "unix")]
    mod unix {
        use super::*;

        fn renderer(command: &str, dir: &Path) -> anyhow::Result<GnuplotRenderer> {
            fs::create_dir_all(dir.join(PLOTS_DIR))?;
            let config = PlotterConfig {
                command: command.to_string(),
                ..PlotterConfig::default()
            };
            Ok(GnuplotRenderer::new(&config, dir))
        }

        #[test]
        fn image_is_the_plotter_stdout() -> anyhow::Result<()> {
            let dir = tempfile::tempdir()?;
            // echo the script back as the "image"
            let mut renderer = renderer("cat", dir.path())?;
            let job = job(dir.path());

            let image = renderer.render(&job)?;
            assert_eq!(image, dir.path().join(PLOTS_DIR).join(format!("{}.png", job.output_name)));
            assert_eq!(fs::read_to_string(&image)?, renderer.script_for(&job));
            assert!(dir.path().join("plot.gp").exists());
            Ok(())
        }

        #[test]
        fn renders_inside_a_relative_working_dir() -> anyhow::Result<()> {
            let dir = tempfile::tempdir_in(".")?;
            let relative = dir.path().strip_prefix(std::env::current_dir()?)?;
            assert!(relative.is_relative());

            let mut renderer = renderer("cat", relative)?;
            let job = job(relative);

            let image = renderer.render(&job)?;
            assert_eq!(fs::read_to_string(&image)?, renderer.script_for(&job));
            assert!(renderer
                .script_for(&job)
                .contains("plot 'results/crossroad_simulation_time_test.txt'"));
            Ok(())
        }

        #[test]
        fn failed_plotter_is_a_render_failure() -> anyhow::Result<()> {
            let dir = tempfile::tempdir()?;
            let mut renderer = renderer("sh -c 'exit 1' plot", dir.path())?;
            let job = job(dir.path());

            assert!(matches!(
                renderer.render(&job),
                Err(HarnessError::RenderFailure { .. })
            ));
            assert!(!renderer.image_path(&job.output_name).exists());
            Ok(())
        }
    }
}
