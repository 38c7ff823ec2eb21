/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run every sweep for the configured scenarios
    Run {
        /// Path to the config file
        #[arg(short, long, default_value = "simsweep.toml")]
        config: PathBuf,

        /// Only run these scenarios (repeatable)
        #[arg(short, long = "scenario")]
        scenarios: Vec<String>,

        /// Draw every collected series in the terminal
        #[arg(long)]
        preview: bool,

        /// Write a JSON run report to this path
        #[arg(long)]
        report: Option<PathBuf>,
    },

    /// Print the sweeps a run would execute without running anything
    Plan {
        /// Path to the config file
        #[arg(short, long, default_value = "simsweep.toml")]
        config: PathBuf,
    },

    /// Write an example config file
    Init {
        #[arg(default_value = "simsweep.toml")]
        path: PathBuf,
    },
}

pub fn parse() -> Args {
    Args::parse()
}
