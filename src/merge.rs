//! Joins tables from different tools on a person's name.
//!
//! Two shapes are supported: a left join of one roster onto another
//! ([`merge`]), and an accumulating merge of many exam exports into one wide
//! table ([`ExamMerger`]). Both key rows by [`normalize_key`] and resolve
//! duplicates as last-write-wins.

use crate::columns::{contains_ignore_case, require, resolve, resolve_priority_list};
use crate::error::Result;
use crate::models::{normalize_key, Cell, Row, Table};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Index from normalized key to row, built in table order. A later row with
/// the same key overwrites the earlier entry.
pub fn last_wins_index<'a>(table: &'a Table, key_column: &str) -> HashMap<String, &'a Row> {
    let mut index = HashMap::with_capacity(table.len());
    for row in table.rows() {
        let key = normalize_key(row.get(key_column));
        if index.insert(key.clone(), row).is_some() {
            debug!("{}: duplicate key `{}`, keeping the later row", table.name(), key);
        }
    }
    index
}

/// Left-joins `secondary` onto `primary` by normalized join key.
///
/// Header order: resolved priority columns, then columns only `secondary`
/// has (in its order), then the rest of `primary`'s columns (in its order).
/// Values `primary` already defines are never overwritten. Row order and row
/// count follow `primary` exactly.
pub fn merge(
    primary: &Table,
    secondary: &Table,
    join_key: &str,
    priority_columns: &[String],
) -> Result<Table> {
    let primary_key = require(join_key, primary)?;

    let priority_headers = resolve_priority_list(priority_columns, primary.headers());
    let secondary_only = secondary_only_headers(primary, secondary, priority_columns);

    let mut unified = priority_headers.clone();
    unified.extend(secondary_only.iter().cloned());
    unified.extend(
        primary
            .headers()
            .iter()
            .filter(|h| !priority_headers.contains(h))
            .cloned(),
    );

    let merged = join_rows(primary, &primary_key, secondary, join_key, unified, &secondary_only)?;
    info!(
        "merged {} ({} rows) with {} ({} rows): {} columns",
        primary.name(),
        primary.len(),
        secondary.name(),
        secondary.len(),
        merged.headers().len()
    );
    Ok(merged)
}

/// Left join that keeps `primary`'s header order and appends `secondary`'s
/// new columns at the end.
pub fn enrich(primary: &Table, secondary: &Table, join_key: &str) -> Result<Table> {
    let primary_key = require(join_key, primary)?;
    let secondary_only = secondary_only_headers(primary, secondary, &[]);

    let mut unified = primary.headers().to_vec();
    unified.extend(secondary_only.iter().cloned());

    join_rows(primary, &primary_key, secondary, join_key, unified, &secondary_only)
}

fn secondary_only_headers(primary: &Table, secondary: &Table, priority_columns: &[String]) -> Vec<String> {
    secondary
        .headers()
        .iter()
        .filter(|h| !contains_ignore_case(priority_columns, h))
        .filter(|h| !contains_ignore_case(primary.headers(), h))
        .cloned()
        .collect()
}

fn join_rows(
    primary: &Table,
    primary_key: &str,
    secondary: &Table,
    join_key: &str,
    unified: Vec<String>,
    secondary_only: &[String],
) -> Result<Table> {
    // A source with no rows contributes nothing, so its key column is not required.
    let index = if secondary.is_empty() {
        HashMap::new()
    } else {
        let secondary_key = require(join_key, secondary)?;
        last_wins_index(secondary, &secondary_key)
    };

    let mut matched = 0;
    let rows: Vec<Row> = primary
        .rows()
        .iter()
        .map(|source| {
            let mut row = Row::new();
            for header in &unified {
                row.set(header, Cell::Empty);
            }
            for header in primary.headers() {
                row.set(header, source.get(header).clone());
            }
            if let Some(other) = index.get(&normalize_key(source.get(primary_key))) {
                matched += 1;
                for header in secondary_only {
                    row.set(header, other.get(header).clone());
                }
            }
            row
        })
        .collect();

    debug!("{} of {} rows matched in {}", matched, primary.len(), secondary.name());
    Ok(Table::new(primary.name(), unified, rows))
}

/// Keeps one row per normalized key: the last one, at its own position.
pub fn dedupe_by_key(table: &Table, join_key: &str) -> Result<Table> {
    let key_column = require(join_key, table)?;
    let mut last_seen = HashMap::new();
    for (position, row) in table.rows().iter().enumerate() {
        last_seen.insert(normalize_key(row.get(&key_column)), position);
    }

    let rows: Vec<Row> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(position, row)| last_seen.get(&normalize_key(row.get(&key_column))) == Some(position))
        .map(|(_, row)| row.clone())
        .collect();

    let dropped = table.len() - rows.len();
    if dropped > 0 {
        debug!("{}: dropped {} duplicate rows by `{}`", table.name(), dropped, key_column);
    }
    Ok(Table::new(table.name(), table.headers().to_vec(), rows))
}

/// Builds one contact table out of several exports.
///
/// Sources missing any of `columns` are skipped with a warning. The result
/// uses the logical column names and keeps the last row per person.
pub fn gather_contacts(sources: &[Table], columns: &[String], join_key: &str) -> Result<Table> {
    let mut projected = Vec::new();

    for source in sources {
        let resolved: Option<Vec<&str>> = columns.iter().map(|c| resolve(c, source.headers())).collect();
        let Some(resolved) = resolved else {
            warn!("{} lacks the contact columns {:?}, skipped", source.name(), columns);
            continue;
        };

        let rows = source
            .rows()
            .iter()
            .map(|row| {
                Row::from_pairs(
                    columns
                        .iter()
                        .zip(&resolved)
                        .map(|(logical, header)| (logical.clone(), row.get(header).clone())),
                )
            })
            .collect();
        projected.push(Table::new(source.name(), columns.to_vec(), rows));
    }

    let combined = Table::concat("contacts", &projected);
    if combined.is_empty() {
        return Ok(Table::empty("contacts", columns.to_vec()));
    }
    dedupe_by_key(&combined, join_key)
}

/// Concatenates merged exam tables, attaches contacts and keeps the last row
/// per person.
pub fn append_with_contacts(tables: &[Table], contacts: &Table, join_key: &str) -> Result<Table> {
    let appended = Table::concat("all_merged_data", tables);
    let enriched = enrich(&appended, contacts, join_key)?;
    dedupe_by_key(&enriched, join_key)
}

/// Accumulates many exam exports into one wide table keyed by name.
///
/// Each added source gets the next index and contributes its columns under
/// suffixed names (`Exam1`, `Total Marks1`, `Exam2`, ...). People missing
/// from earlier sources are appended; people already present are updated in
/// place and keep the name spelling they were first seen with. Within and
/// across sources the latest record for a person wins.
#[derive(Debug, Clone)]
pub struct ExamMerger {
    join_key: String,
    headers: Vec<String>,
    rows: Vec<Row>,
    positions: HashMap<String, usize>,
    next_index: usize,
}

impl ExamMerger {
    pub fn new(join_key: &str) -> Self {
        Self {
            join_key: join_key.to_string(),
            headers: vec![join_key.to_string()],
            rows: Vec::new(),
            positions: HashMap::new(),
            next_index: 1,
        }
    }

    /// Adds one exam export, carrying `columns` (resolved case-insensitively,
    /// missing ones skipped). Returns the suffix index used. On error the
    /// merger is left as it was.
    pub fn add(&mut self, source: &Table, columns: &[String]) -> Result<usize> {
        let key_column = require(&self.join_key, source)?;
        let index = self.next_index;

        let carried: Vec<(String, String)> = columns
            .iter()
            .filter(|c| !c.eq_ignore_ascii_case(&self.join_key))
            .filter_map(|logical| {
                resolve(logical, source.headers()).map(|h| (h.to_string(), format!("{}{}", logical, index)))
            })
            .collect();

        for (_, target) in &carried {
            if !self.headers.contains(target) {
                self.headers.push(target.clone());
            }
        }

        let mut skipped = 0;
        for source_row in source.rows() {
            let display = source_row.get(&key_column).clone();
            let key = normalize_key(&display);
            if key.is_empty() {
                skipped += 1;
                continue;
            }

            let position = match self.positions.get(&key) {
                Some(&p) => p,
                None => {
                    self.rows.push(Row::from_pairs([(self.join_key.clone(), display)]));
                    self.positions.insert(key, self.rows.len() - 1);
                    self.rows.len() - 1
                }
            };

            let row = &mut self.rows[position];
            for (header, target) in &carried {
                row.set(target, source_row.get(header).clone());
            }
        }

        if skipped > 0 {
            warn!("{}: {} rows without a `{}` value skipped", source.name(), skipped, self.join_key);
        }
        info!(
            "exam source {} merged as #{} ({} rows, {} people so far)",
            source.name(),
            index,
            source.len(),
            self.rows.len()
        );
        self.next_index += 1;
        Ok(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn finish(self, name: &str) -> Table {
        Table::new(name, self.headers, self.rows)
    }
}

/// Merges every source in order; a source without the join key aborts the run.
pub fn merge_exam_sources(join_key: &str, sources: &[(Table, Vec<String>)], name: &str) -> Result<Table> {
    let mut merger = ExamMerger::new(join_key);
    for (table, columns) in sources {
        merger.add(table, columns)?;
    }
    Ok(merger.finish(name))
}
