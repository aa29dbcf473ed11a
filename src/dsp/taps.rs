//! Filter coefficient files.
//!
//! One row per tap: `feedforward[,feedback]`. Rows with a single cell describe
//! an FIR filter; if any row carries a feedback tap every row must.

use std::fs;
use std::path::Path;

use log::{debug, warn};

use crate::dsp::{FilterSpec, ScopeError, ScopeResult};
use crate::types::ChannelKind;

pub fn parse_filter_taps(text: &str, source: ChannelKind) -> ScopeResult<FilterSpec> {
    let mut feedforward = Vec::new();
    let mut feedback = Vec::new();
    let mut blank_row = None;

    for (index, line) in text.lines().enumerate() {
        let line_no = index + 1;
        if line.trim().is_empty() {
            blank_row.get_or_insert(line_no);
            continue;
        }
        // Trailing blank lines are fine, a gap between taps is not.
        if let Some(line) = blank_row {
            return Err(ScopeError::FilterFormat {
                line,
                reason: "empty row between taps".into(),
            });
        }
        let cells: Vec<&str> = line.split(',').collect();
        if cells.len() > 2 {
            return Err(ScopeError::FilterFormat {
                line: line_no,
                reason: format!("expected 1 or 2 columns, found {}", cells.len()),
            });
        }
        feedforward.push(parse_cell(cells[0], line_no)?);
        if let Some(cell) = cells.get(1) {
            feedback.push(parse_cell(cell, line_no)?);
        }
    }

    if feedforward.is_empty() {
        return Err(ScopeError::FilterFormat {
            line: 0,
            reason: "file contains no taps".into(),
        });
    }
    if !feedback.is_empty() && feedback.len() != feedforward.len() {
        return Err(ScopeError::FilterFormat {
            line: 0,
            reason: format!(
                "{} feedforward taps but {} feedback taps",
                feedforward.len(),
                feedback.len()
            ),
        });
    }

    let spec = FilterSpec::from_taps(feedforward, feedback, source);
    debug!(
        "parsed {:?} filter with {} taps for {}",
        spec.kind,
        spec.feedforward.len(),
        source
    );
    Ok(spec)
}

pub fn load_filter_file(path: impl AsRef<Path>, source: ChannelKind) -> ScopeResult<FilterSpec> {
    let path = path.as_ref();
    let text = fs::read_to_string(path)?;
    parse_filter_taps(&text, source).map_err(|err| {
        warn!("rejected filter file {}: {err}", path.display());
        err
    })
}

fn parse_cell(cell: &str, line: usize) -> ScopeResult<f64> {
    cell.trim()
        .parse::<f64>()
        .map_err(|_| ScopeError::FilterFormat {
            line,
            reason: format!("'{}' is not a number", cell.trim()),
        })
}
