/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use anyhow::Context;
use colored::Colorize;
use simsweep::{
    clap_args::{self, Commands},
    config::Config,
    report::render_plan,
    sweep_planner::SweepPlanner,
    RunOptions,
};
use tracing::{info, subscriber::set_global_default, Subscriber};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    // a project-local .env may set RUST_LOG
    dotenvy::dotenv().ok();

    let args = clap_args::parse();
    let default_filter = if args.verbose { "debug" } else { "info" };
    init_subscriber(get_subscriber(default_filter.into()));

    match args.command {
        Commands::Init { path } => {
            Config::write_example_to_file(&path)?;
            println!("{}", format!("{} created!", path.display()).green());
        }

        Commands::Plan { config } => {
            let config = Config::try_from_path(&config)?;
            let planner = SweepPlanner::new(config.sweeps, &config.labels)?;
            let keys = config.scenarios.iter().map(|s| s.key.as_str()).collect::<Vec<_>>();
            println!("{}", render_plan(&keys, &planner.plan(config.defaults)));
        }

        Commands::Run {
            config,
            scenarios,
            preview,
            report,
        } => {
            let config_path = config;
            let config = Config::try_from_path(&config_path)?;
            let options = RunOptions { scenarios, preview };

            let run_report = simsweep::run(&config, &options)
                .with_context(|| format!("Unable to run {}", config_path.display()))?;

            println!("\n{}", " Summary ".reversed().green());
            println!("{}", run_report.render_summary());

            if let Some(path) = report {
                run_report.write_json(&path)?;
                info!("Wrote run report to {}", path.display());
            }

            if run_report.has_failures() {
                anyhow::bail!(
                    "run {} finished with failures, see the log above",
                    run_report.run_id
                );
            }
        }
    }

    Ok(())
}

fn get_subscriber(env_filter: String) -> impl Subscriber + Sync + Send {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(env_filter));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish()
}

fn init_subscriber(subscriber: impl Subscriber + Sync + Send) {
    set_global_default(subscriber).expect("Failed to set subscriber");
}
