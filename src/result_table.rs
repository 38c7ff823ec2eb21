/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::errors::{HarnessError, Result};
use colored::Colorize;
use std::{
    fs,
    path::{Path, PathBuf},
};
use textplots::{Chart, Plot, Shape};

const PREVIEW_WIDTH: u32 = 120;
const PREVIEW_HEIGHT: u32 = 40;

/// A result file read as rows of floating point columns. Blank lines and `#` comments are
/// skipped, nothing else about the content is interpreted.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultTable {
    path: PathBuf,
    rows: Vec<Vec<f64>>,
}

impl ResultTable {
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(path, &content)
    }

    pub fn parse(path: &Path, content: &str) -> Result<Self> {
        let mut rows = vec![];
        for (idx, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let row = line
                .split_whitespace()
                .map(|value| {
                    value.parse::<f64>().map_err(|_| HarnessError::Table {
                        path: path.to_path_buf(),
                        message: format!("line {}: {:?} is not a number", idx + 1, value),
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            rows.push(row);
        }

        Ok(Self {
            path: path.to_path_buf(),
            rows,
        })
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    /// Pairs of (x, y) taken from two 1-based columns, in row order.
    pub fn series(&self, x_column: usize, y_column: usize) -> Result<Vec<(f64, f64)>> {
        self.rows
            .iter()
            .enumerate()
            .map(|(idx, row)| match (cell(row, x_column), cell(row, y_column)) {
                (Some(x), Some(y)) => Ok((x, y)),
                _ => Err(HarnessError::Table {
                    path: self.path.clone(),
                    message: format!(
                        "row {} has {} columns, needed {} and {}",
                        idx + 1,
                        row.len(),
                        x_column,
                        y_column
                    ),
                }),
            })
            .collect()
    }
}

fn cell(row: &[f64], column: usize) -> Option<f64> {
    column.checked_sub(1).and_then(|idx| row.get(idx)).copied()
}

/// Draws a series as a line chart in the terminal.
pub fn preview(title: &str, series: &[(f64, f64)]) {
    if series.is_empty() {
        return;
    }

    let points = series
        .iter()
        .map(|(x, y)| (*x as f32, *y as f32))
        .collect::<Vec<_>>();
    let (xmin, xmax) = points
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), (x, _)| (lo.min(*x), hi.max(*x)));
    // a single point still needs a non-empty x range
    let xmax = if xmax > xmin { xmax } else { xmin + 1.0 };

    println!("{}", title.bold());
    Chart::new(PREVIEW_WIDTH, PREVIEW_HEIGHT, xmin, xmax)
        .lineplot(&Shape::Lines(&points))
        .display();
}
