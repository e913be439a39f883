//! Header resolution across sources whose exports disagree on capitalisation.

use crate::config::ScoreCategory;
use crate::error::{ReconcileError, Result};
use crate::models::Table;
use regex::RegexBuilder;
use tracing::debug;

/// First header whose uppercase form equals the uppercase logical name.
pub fn resolve<'a>(logical: &str, headers: &'a [String]) -> Option<&'a str> {
    let wanted = logical.to_uppercase();
    headers
        .iter()
        .find(|h| h.to_uppercase() == wanted)
        .map(String::as_str)
}

/// Resolves each logical name in caller order, dropping misses and repeats.
pub fn resolve_priority_list(logical_names: &[String], headers: &[String]) -> Vec<String> {
    let mut resolved: Vec<String> = Vec::new();
    for logical in logical_names {
        if let Some(header) = resolve(logical, headers) {
            if !resolved.iter().any(|r| r == header) {
                resolved.push(header.to_string());
            }
        }
    }
    resolved
}

/// Like [`resolve`], but a miss is a fatal input-format error naming the source.
pub fn require(logical: &str, table: &Table) -> Result<String> {
    resolve(logical, table.headers())
        .map(str::to_string)
        .ok_or_else(|| ReconcileError::missing_column(table.name(), logical, table.headers()))
}

pub fn contains_ignore_case(names: &[String], candidate: &str) -> bool {
    let wanted = candidate.to_uppercase();
    names.iter().any(|n| n.to_uppercase() == wanted)
}

/// Headers of the form `<prefix><n>` (e.g. `Total Marks3`), with their index,
/// in header order.
pub fn numbered_columns(prefix: &str, headers: &[String]) -> Result<Vec<(u32, String)>> {
    let pattern = format!(r"^{}\s*(\d+)$", regex::escape(prefix));
    let re = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ReconcileError::Config(format!("bad column prefix `{}`: {}", prefix, e)))?;

    Ok(headers
        .iter()
        .filter_map(|h| {
            let caps = re.captures(h)?;
            let index = caps.get(1)?.as_str().parse::<u32>().ok()?;
            Some((index, h.clone()))
        })
        .collect())
}

/// Score columns belonging to a category.
///
/// Without an exam keyword every `<marks_prefix><n>` column counts. With one,
/// `<marks_prefix><n>` counts only when the paired `<exam_prefix><n>` column's
/// first non-empty value mentions the keyword.
pub fn category_columns(table: &Table, category: &ScoreCategory) -> Result<Vec<String>> {
    let numbered = numbered_columns(&category.marks_prefix, table.headers())?;

    let (exam_prefix, keyword) = match (&category.exam_prefix, &category.exam_keyword) {
        (Some(prefix), Some(keyword)) => (prefix, keyword.to_uppercase()),
        _ => return Ok(numbered.into_iter().map(|(_, h)| h).collect()),
    };

    let mut columns = Vec::new();
    for (index, marks_header) in numbered {
        let exam_logical = format!("{}{}", exam_prefix, index);
        let Some(exam_header) = resolve(&exam_logical, table.headers()) else {
            debug!("{}: no `{}` column paired with `{}`", category.name, exam_logical, marks_header);
            continue;
        };
        let exam_name = table
            .rows()
            .iter()
            .map(|row| row.get(exam_header))
            .find(|cell| !cell.is_empty())
            .map(|cell| cell.to_string().to_uppercase());

        if exam_name.is_some_and(|name| name.contains(&keyword)) {
            columns.push(marks_header);
        }
    }
    debug!("{} score columns: {:?}", category.name, columns);
    Ok(columns)
}
