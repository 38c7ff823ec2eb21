/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::{
    config::Redirect,
    errors::{ExitReason, HarnessError, Result},
};
use std::{
    fs::{File, OpenOptions},
    path::Path,
    time::Duration,
};
use subprocess::{Exec, ExitStatus, NullFile, Popen, Redirection};
use tracing::{debug, warn};

const ARGS_PLACEHOLDER: &str = "{args}";

/// Where the stdout of a blocking process goes.
#[derive(Debug)]
pub enum OutputTarget {
    Redirect(Redirect),
    /// stdout is written to this file, stderr is left with the parent.
    File(File),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    Success,
    Failed(ExitReason),
}

/// Breaks a command template into POSIX words and places `args` into it.
///
/// Every word containing `{args}` has the placeholder replaced by the arguments joined with
/// spaces. When no word contains the placeholder the arguments are appended as separate words.
pub fn build_command(template: &str, args: &[String]) -> Result<Vec<String>> {
    let mut words = shlex::split(template).ok_or_else(|| {
        HarnessError::config(format!("command is not POSIX compliant: {}", template))
    })?;
    if words.is_empty() {
        return Err(HarnessError::config("command must not be empty"));
    }

    if words.iter().any(|word| word.contains(ARGS_PLACEHOLDER)) {
        let joined = args.join(" ");
        for word in words.iter_mut() {
            *word = word.replace(ARGS_PLACEHOLDER, &joined);
        }
    } else {
        words.extend(args.iter().cloned());
    }

    Ok(words)
}

/// Runs the command in `cwd` and blocks until it exits or `timeout` expires. An expired process
/// is killed and reported as [`ExitReason::TimedOut`].
pub fn run_blocking(
    words: &[String],
    cwd: &Path,
    output: OutputTarget,
    timeout: Option<u64>,
) -> Result<Completion> {
    let (command, args) = match words {
        [command, args @ ..] => (command, args),
        _ => return Err(HarnessError::config("command must not be empty")),
    };

    let exec = Exec::cmd(command).args(args).cwd(cwd);
    let exec = match output {
        OutputTarget::Redirect(Redirect::Null) => exec.stdout(NullFile).stderr(NullFile),
        OutputTarget::Redirect(Redirect::Parent) => exec,
        OutputTarget::Redirect(Redirect::File) => {
            let out_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(cwd.join(".stdout"))?;
            let err_file = OpenOptions::new()
                .append(true)
                .create(true)
                .open(cwd.join(".stderr"))?;
            exec.stdout(Redirection::File(out_file))
                .stderr(Redirection::File(err_file))
        }
        OutputTarget::File(file) => exec.stdout(Redirection::File(file)),
    };

    debug!("Running {} in {}", words.join(" "), cwd.display());
    let mut popen = exec.popen().map_err(|e| HarnessError::Spawn {
        command: command.clone(),
        message: e.to_string(),
    })?;

    let status = match timeout {
        None => popen.wait().map_err(|e| spawn_error(command, e))?,
        Some(secs) => match popen
            .wait_timeout(Duration::from_secs(secs))
            .map_err(|e| spawn_error(command, e))?
        {
            Some(status) => status,
            None => {
                kill(&mut popen, command);
                return Ok(Completion::Failed(ExitReason::TimedOut(secs)));
            }
        },
    };

    Ok(completion_of(status))
}

fn kill(popen: &mut Popen, command: &str) {
    warn!("{} did not finish in time, killing it", command);
    if let Err(err) = popen.kill() {
        warn!("Failed to kill {}\n{}", command, err);
    }
    // reap the child so it does not linger as a zombie
    let _ = popen.wait();
}

fn spawn_error(command: &str, err: subprocess::PopenError) -> HarnessError {
    HarnessError::Spawn {
        command: command.to_string(),
        message: err.to_string(),
    }
}

fn completion_of(status: ExitStatus) -> Completion {
    match status {
        status if status.success() => Completion::Success,
        ExitStatus::Exited(code) => Completion::Failed(ExitReason::Code(code)),
        ExitStatus::Signaled(sig) => Completion::Failed(ExitReason::Signal(sig)),
        _ => Completion::Failed(ExitReason::Unknown),
    }
}
