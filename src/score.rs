//! Exam score cells and best-of-K aggregation.

use crate::models::{Cell, Row};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParsedScore {
    Absent,
    Numeric(f64),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unparseable score `{0}`")]
pub struct ScoreParseError(pub String);

// Markers exam tools write for a student who did not sit the paper.
const ABSENT_MARKERS: &[&str] = &["nan", "na", "n/a", "-", "ab", "abs", "absent", "null", "none"];

/// Parses one score cell.
///
/// `"18/20"` yields the numerator; the denominator is informational only.
pub fn parse_score(cell: &Cell) -> Result<ParsedScore, ScoreParseError> {
    let raw = match cell {
        Cell::Empty => return Ok(ParsedScore::Absent),
        Cell::Number(v) if v.is_nan() => return Ok(ParsedScore::Absent),
        Cell::Number(v) if v.is_finite() => return Ok(ParsedScore::Numeric(*v)),
        Cell::Number(v) => return Err(ScoreParseError(v.to_string())),
        Cell::Text(s) => s.trim(),
    };

    if raw.is_empty() || ABSENT_MARKERS.iter().any(|m| raw.eq_ignore_ascii_case(m)) {
        return Ok(ParsedScore::Absent);
    }

    if raw.contains('/') {
        let mut parts = raw.split('/');
        return match (parts.next(), parts.next(), parts.next()) {
            (Some(numerator), Some(denominator), None)
                if parse_finite(denominator).is_some() =>
            {
                parse_finite(numerator)
                    .map(ParsedScore::Numeric)
                    .ok_or_else(|| ScoreParseError(raw.to_string()))
            }
            _ => Err(ScoreParseError(raw.to_string())),
        };
    }

    parse_finite(raw)
        .map(ParsedScore::Numeric)
        .ok_or_else(|| ScoreParseError(raw.to_string()))
}

fn parse_finite(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Result of aggregating one row's attempts at a category.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TopKSum {
    pub total: f64,
    /// scores that contributed to `total`
    pub counted: usize,
    /// cells that parsed to a number
    pub available: usize,
    /// cells that could not be parsed and were treated as absent
    pub unparseable: usize,
}

/// Sum of the best `k` scores among `columns`; see [`top_k_detail`].
pub fn top_k_sum(row: &Row, columns: &[String], k: usize) -> f64 {
    top_k_detail(row, columns, k).total
}

/// Parses every listed cell, drops absent and unparseable ones, and sums the
/// `k` largest. Fewer than `k` scores sums what is there; none gives `0`.
///
/// Negative scores (negative marking) are kept and summed like any other, so
/// the total is non-decreasing in `k` only while the scores taken are
/// non-negative. A negative attempt that makes the top `k` lowers the total.
pub fn top_k_detail(row: &Row, columns: &[String], k: usize) -> TopKSum {
    let mut scores = Vec::with_capacity(columns.len());
    let mut unparseable = 0;

    for column in columns {
        match parse_score(row.get(column)) {
            Ok(ParsedScore::Numeric(v)) => scores.push(v),
            Ok(ParsedScore::Absent) => {}
            Err(e) => {
                debug!("{}: {}, counted as absent", column, e);
                unparseable += 1;
            }
        }
    }

    scores.sort_by(|a, b| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    let counted = scores.len().min(k);

    TopKSum {
        total: scores.iter().take(k).sum(),
        counted,
        available: scores.len(),
        unparseable,
    }
}
