//! Iteration log parser.
//!
//! The log is a whitespace-separated table with one header line and one row
//! per optimizer iteration:
//!
//! ```text
//! 1:ItNr  2:Metric    3a:Time 3b:StepSize 4:||Gradient||  Time[ms]
//! 0       -0.512331   0.0     2.000000    0.231019        4.1
//! ```
//!
//! Columns are matched by header name, so extra columns are tolerated. A
//! header with exactly five unrecognised names is read positionally.

use std::io::ErrorKind;
use std::path::Path;

use serde::Serialize;

use crate::error::{RegistrationError, RegistrationResult};

/// One optimizer iteration.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IterationRow {
    pub iteration: u64,
    pub metric: f64,
    pub step_size: f64,
    pub gradient_norm: f64,
    pub time_ms: f64,
}

/// All iterations recorded by the optimizer, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct IterationRecord {
    rows: Vec<IterationRow>,
}

impl IterationRecord {
    /// Creates a record from rows.
    pub fn new(rows: Vec<IterationRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[IterationRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, IterationRow> {
        self.rows.iter()
    }

    /// Metric value after the last iteration.
    pub fn final_metric(&self) -> Option<f64> {
        self.rows.last().map(|r| r.metric)
    }

    /// Sum of the per-iteration times.
    pub fn total_time_ms(&self) -> f64 {
        self.rows.iter().map(|r| r.time_ms).sum()
    }
}

impl<'a> IntoIterator for &'a IterationRecord {
    type Item = &'a IterationRow;
    type IntoIter = std::slice::Iter<'a, IterationRow>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}

#[derive(Debug, Clone, Copy)]
enum Column {
    Iteration = 0,
    Metric = 1,
    StepSize = 2,
    Gradient = 3,
    Time = 4,
}

const COLUMN_NAMES: [&str; 5] = ["iteration", "metric", "step size", "gradient", "time"];

fn classify(name: &str) -> Option<Column> {
    // Drop the "1:" / "3b:" ordinal prefix.
    let name = name.split_once(':').map_or(name, |(_, rest)| rest);
    match name {
        "ItNr" => Some(Column::Iteration),
        "Metric" => Some(Column::Metric),
        "StepSize" => Some(Column::StepSize),
        "Time[ms]" => Some(Column::Time),
        n if n.contains("Gradient") => Some(Column::Gradient),
        _ => None,
    }
}

/// Which table column holds each field.
struct Layout {
    width: usize,
    index: [usize; 5],
}

impl Layout {
    fn from_header(header: &str, line: usize) -> RegistrationResult<Self> {
        let names: Vec<&str> = header.split_whitespace().collect();

        let mut index = [None; 5];
        for (i, name) in names.iter().enumerate() {
            if let Some(column) = classify(name) {
                let slot = &mut index[column as usize];
                if slot.is_none() {
                    *slot = Some(i);
                }
            }
        }

        if let [Some(a), Some(b), Some(c), Some(d), Some(e)] = index {
            return Ok(Self {
                width: names.len(),
                index: [a, b, c, d, e],
            });
        }
        if names.len() == COLUMN_NAMES.len() {
            return Ok(Self {
                width: names.len(),
                index: [0, 1, 2, 3, 4],
            });
        }

        Err(RegistrationError::malformed_iteration_log(
            line,
            format!(
                "header does not name the {} columns: {}",
                COLUMN_NAMES.join(", "),
                header.trim()
            ),
        ))
    }

    fn parse_row(&self, row: &str, line: usize) -> RegistrationResult<IterationRow> {
        let fields: Vec<&str> = row.split_whitespace().collect();
        if fields.len() != self.width {
            return Err(RegistrationError::malformed_iteration_log(
                line,
                format!("expected {} columns, found {}", self.width, fields.len()),
            ));
        }

        let number = |column: Column| -> RegistrationResult<f64> {
            let raw = fields[self.index[column as usize]];
            raw.parse().map_err(|_| {
                RegistrationError::malformed_iteration_log(
                    line,
                    format!("{} '{}' is not a number", COLUMN_NAMES[column as usize], raw),
                )
            })
        };

        let raw_iteration = fields[self.index[Column::Iteration as usize]];
        let iteration = raw_iteration.parse().map_err(|_| {
            RegistrationError::malformed_iteration_log(
                line,
                format!("iteration '{}' is not a non-negative integer", raw_iteration),
            )
        })?;

        Ok(IterationRow {
            iteration,
            metric: number(Column::Metric)?,
            step_size: number(Column::StepSize)?,
            gradient_norm: number(Column::Gradient)?,
            time_ms: number(Column::Time)?,
        })
    }
}

/// Parses an iteration log file.
pub fn parse_iterations(path: &Path) -> RegistrationResult<IterationRecord> {
    let content = std::fs::read_to_string(path).map_err(|e| match e.kind() {
        ErrorKind::NotFound => RegistrationError::MissingResultFile {
            path: path.to_path_buf(),
        },
        _ => RegistrationError::Io(e),
    })?;
    parse_iterations_str(&content)
}

/// Parses iteration log text. Line numbers in errors are 1-based.
pub fn parse_iterations_str(content: &str) -> RegistrationResult<IterationRecord> {
    let mut lines = content
        .lines()
        .enumerate()
        .map(|(i, l)| (i + 1, l))
        .filter(|(_, l)| !l.trim().is_empty());

    let (header_line, header) = lines
        .next()
        .ok_or_else(|| RegistrationError::malformed_iteration_log(1, "missing header line"))?;
    let layout = Layout::from_header(header, header_line)?;

    let rows = lines
        .map(|(line, row)| layout.parse_row(row, line))
        .collect::<RegistrationResult<Vec<_>>>()?;

    Ok(IterationRecord::new(rows))
}
