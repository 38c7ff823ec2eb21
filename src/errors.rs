/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::sweep_planner::ParameterSet;
use std::{io, path::PathBuf};

pub type Result<T> = core::result::Result<T, HarnessError>;

/// How an external process ended when it did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Code(u32),
    Signal(u8),
    TimedOut(u64),
    Unknown,
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExitReason::Code(code) => write!(f, "exit code {}", code),
            ExitReason::Signal(sig) => write!(f, "killed by signal {}", sig),
            ExitReason::TimedOut(secs) => write!(f, "timed out after {}s", secs),
            ExitReason::Unknown => write!(f, "unknown exit status"),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum HarnessError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("simulation of scenario {scenario} failed at {params} ({reason})")]
    RunFailure {
        scenario: String,
        params: ParameterSet,
        reason: ExitReason,
    },

    #[error("no results to collect, expected rows in {}", .0.display())]
    Collection(PathBuf),

    #[error("rendering {output} failed ({reason})")]
    RenderFailure { output: String, reason: ExitReason },

    #[error("failed to spawn {command}: {message}")]
    Spawn { command: String, message: String },

    #[error("malformed result table {}: {message}", path.display())]
    Table { path: PathBuf, message: String },

    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl HarnessError {
    pub fn config(message: impl Into<String>) -> Self {
        HarnessError::Configuration(message.into())
    }
}
