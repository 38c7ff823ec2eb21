/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::errors::{HarnessError, Result};
use serde::Serialize;
use std::{
    cell::Cell,
    fs, io,
    path::{Path, PathBuf},
};
use tracing::{debug, warn};

pub const RESULTS_DIR: &str = "results";
pub const PLOTS_DIR: &str = "plots/results";

/// The permanent copy of one sweep's rows, `results/{scenario}_{sweep}.txt`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NamedResultFile {
    pub scenario_key: String,
    pub sweep_name: String,
    pub path: PathBuf,
}

/// Owns the working directory layout and the accumulation file the simulator appends to.
#[derive(Debug)]
pub struct ResultStore {
    root: PathBuf,
    accumulation: PathBuf,
    leased: Cell<bool>,
}

/// Exclusive hold on the accumulation file for the duration of one sweep. Hand it back through
/// [`ResultStore::collect_sweep`] or [`ResultStore::quarantine`].
#[derive(Debug)]
pub struct AccumulationLease<'a> {
    store: &'a ResultStore,
}
impl AccumulationLease<'_> {
    pub fn path(&self) -> &Path {
        &self.store.accumulation
    }
}
impl Drop for AccumulationLease<'_> {
    fn drop(&mut self) {
        self.store.leased.set(false);
    }
}

impl ResultStore {
    /// `accumulation_file` is resolved against `root` when relative.
    pub fn new(root: &Path, accumulation_file: &Path) -> Self {
        Self {
            root: root.to_path_buf(),
            accumulation: root.join(accumulation_file),
            leased: Cell::new(false),
        }
    }

    pub fn results_dir(&self) -> PathBuf {
        self.root.join(RESULTS_DIR)
    }

    pub fn plots_dir(&self) -> PathBuf {
        self.root.join(PLOTS_DIR)
    }

    pub fn accumulation_path(&self) -> &Path {
        &self.accumulation
    }

    pub fn named_path(&self, scenario_key: &str, sweep_name: &str) -> PathBuf {
        self.results_dir()
            .join(format!("{}_{}.txt", scenario_key, sweep_name))
    }

    /// Creates `results/` and `plots/results/`. Safe to call repeatedly.
    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(self.results_dir())?;
        fs::create_dir_all(self.plots_dir())?;
        Ok(())
    }

    /// Removes whatever a previous process left in the accumulation file. Called once at start up.
    pub fn reset_accumulation(&self) -> Result<()> {
        match fs::remove_file(&self.accumulation) {
            Ok(()) => {
                debug!("Removed stale {}", self.accumulation.display());
                Ok(())
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    /// Takes the accumulation file for a new sweep and leaves it absent or empty. The file is
    /// reset when the run starts and every lease hands it back moved or quarantined, so rows
    /// found here were written outside this run. They are discarded with a warning rather than
    /// mixed into the sweep.
    pub fn acquire(&self) -> Result<AccumulationLease<'_>> {
        if self.leased.replace(true) {
            return Err(HarnessError::config(format!(
                "{} is already in use by another sweep",
                self.accumulation.display()
            )));
        }
        let lease = AccumulationLease { store: self };

        if accumulated_len(&self.accumulation)?.unwrap_or(0) > 0 {
            warn!(
                "Discarding leftover rows in {} before starting the sweep",
                self.accumulation.display()
            );
            fs::remove_file(&self.accumulation)?;
        }

        Ok(lease)
    }

    /// Moves the accumulated rows to their permanent name, replacing an earlier file of the same
    /// name. The accumulation file only disappears once the move has succeeded.
    pub fn collect_sweep(
        &self,
        lease: AccumulationLease<'_>,
        scenario_key: &str,
        sweep_name: &str,
    ) -> Result<NamedResultFile> {
        match accumulated_len(lease.path())? {
            Some(len) if len > 0 => {}
            _ => return Err(HarnessError::Collection(self.accumulation.clone())),
        }

        let path = self.named_path(scenario_key, sweep_name);
        relocate(lease.path(), &path)?;
        debug!("Collected {} into {}", self.accumulation.display(), path.display());

        Ok(NamedResultFile {
            scenario_key: scenario_key.to_string(),
            sweep_name: sweep_name.to_string(),
            path,
        })
    }

    /// Sets aside the rows of an aborted sweep as `results/{scenario}_{sweep}.partial` so the
    /// next sweep starts clean. Returns `None` when nothing was accumulated.
    pub fn quarantine(
        &self,
        lease: AccumulationLease<'_>,
        scenario_key: &str,
        sweep_name: &str,
    ) -> Result<Option<PathBuf>> {
        match accumulated_len(lease.path())? {
            Some(len) if len > 0 => {
                let path = self
                    .results_dir()
                    .join(format!("{}_{}.partial", scenario_key, sweep_name));
                relocate(lease.path(), &path)?;
                Ok(Some(path))
            }
            Some(_) => {
                fs::remove_file(lease.path())?;
                Ok(None)
            }
            None => Ok(None),
        }
    }
}

fn accumulated_len(path: &Path) -> Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(meta) => Ok(Some(meta.len())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(err.into()),
    }
}

/// Renames `from` to `to`. When a plain rename is impossible (e.g. across file systems) the
/// content is copied next to `to` first and renamed into place, and only then is `from` removed.
fn relocate(from: &Path, to: &Path) -> Result<()> {
    if let Err(err) = fs::rename(from, to) {
        debug!(
            "Rename of {} failed ({}), falling back to copy",
            from.display(),
            err
        );
        let tmp = to.with_extension("tmp");
        fs::copy(from, &tmp)?;
        fs::rename(&tmp, to)?;
        fs::remove_file(from)?;
    }
    Ok(())
}
