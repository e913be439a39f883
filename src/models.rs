use std::collections::{HashMap, HashSet};
use std::fmt;

/// A single spreadsheet cell as handed over by the file reader.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

static EMPTY_CELL: Cell = Cell::Empty;

impl Cell {
    /// Build a cell from raw text, trimming it; blank text becomes `Empty`.
    pub fn from_raw(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(trimmed.to_string())
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            Cell::Number(v) => v.is_nan(),
        }
    }

    /// Numeric view used for ranking. Text is accepted when it parses as a plain number.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(v) if v.is_finite() => Some(*v),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
            _ => None,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Empty => Ok(()),
            Cell::Text(s) => write!(f, "{}", s),
            Cell::Number(v) => write!(f, "{}", format_number(*v)),
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::from_raw(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::from_raw(&value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

/// Whole numbers lose their trailing `.0`, everything else is kept to two decimals.
fn format_number(value: f64) -> String {
    if value.is_nan() {
        return String::new();
    }
    if value.fract() == 0.0 && value.abs() < 1e15 {
        return format!("{}", value as i64);
    }
    let rounded = format!("{:.2}", value);
    rounded.trim_end_matches('0').trim_end_matches('.').to_string()
}

/// One record of a table. Columns the row does not carry read as `Cell::Empty`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: HashMap<String, Cell>,
}

impl Row {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<Cell>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn get(&self, column: &str) -> &Cell {
        self.values.get(column).unwrap_or(&EMPTY_CELL)
    }

    /// Display text of a column, empty string when absent.
    pub fn display(&self, column: &str) -> String {
        self.get(column).to_string()
    }

    /// Returns a copy of this row with `column` set to `value`.
    pub fn with(&self, column: &str, value: Cell) -> Row {
        let mut row = self.clone();
        row.set(column, value);
        row
    }

    pub(crate) fn set(&mut self, column: &str, value: Cell) {
        self.values.insert(column.to_string(), value);
    }
}

/// An ordered set of rows sharing an ordered header list.
///
/// `name` labels the source (usually the file it came from) and shows up in
/// error messages and logs.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    name: String,
    headers: Vec<String>,
    rows: Vec<Row>,
}

impl Table {
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Row>) -> Self {
        let mut seen = HashSet::new();
        let headers = headers
            .into_iter()
            .filter(|h| seen.insert(h.clone()))
            .collect();
        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn empty(name: impl Into<String>, headers: Vec<String>) -> Self {
        Self::new(name, headers, Vec::new())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    pub fn renamed(&self, name: impl Into<String>) -> Table {
        Table {
            name: name.into(),
            ..self.clone()
        }
    }

    /// Returns a new table with `column` appended (or replaced when it already
    /// exists), its value computed from each row.
    pub fn with_column<F>(&self, column: &str, compute: F) -> Table
    where
        F: Fn(&Row) -> Cell,
    {
        let mut headers = self.headers.clone();
        if !headers.iter().any(|h| h == column) {
            headers.push(column.to_string());
        }
        let rows = self
            .rows
            .iter()
            .map(|row| row.with(column, compute(row)))
            .collect();
        Table {
            name: self.name.clone(),
            headers,
            rows,
        }
    }

    /// Like [`Table::with_column`], with the values precomputed in row order.
    /// Rows past the end of `values` get `Cell::Empty`.
    pub fn with_column_values(&self, column: &str, values: Vec<Cell>) -> Table {
        let mut headers = self.headers.clone();
        if !headers.iter().any(|h| h == column) {
            headers.push(column.to_string());
        }
        let rows = self
            .rows
            .iter()
            .zip(values.into_iter().chain(std::iter::repeat(Cell::Empty)))
            .map(|(row, value)| row.with(column, value))
            .collect();
        Table {
            name: self.name.clone(),
            headers,
            rows,
        }
    }

    pub fn filter<P>(&self, predicate: P) -> Table
    where
        P: Fn(&Row) -> bool,
    {
        Table {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows: self.rows.iter().filter(|r| predicate(r)).cloned().collect(),
        }
    }

    /// Stable sort on `column` descending; rows without a numeric value go last.
    pub fn sorted_desc_by(&self, column: &str) -> Table {
        let mut rows = self.rows.clone();
        sort_rows_desc(&mut rows, column);
        Table {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }

    /// Keeps only `columns`, in that order. Columns the table lacks are skipped.
    pub fn project(&self, columns: &[String]) -> Table {
        let headers: Vec<String> = columns
            .iter()
            .filter(|c| self.has_column(c))
            .cloned()
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|row| Row::from_pairs(headers.iter().map(|h| (h.clone(), row.get(h).clone()))))
            .collect();
        Table::new(self.name.clone(), headers, rows)
    }

    /// Concatenates tables; the header list is the union in first-seen order.
    pub fn concat(name: impl Into<String>, tables: &[Table]) -> Table {
        let headers = tables
            .iter()
            .flat_map(|t| t.headers.iter().cloned())
            .collect();
        let rows = tables.iter().flat_map(|t| t.rows.iter().cloned()).collect();
        Table::new(name, headers, rows)
    }

    /// Drops rows whose displayed values match an earlier row on every header.
    pub fn distinct(&self) -> Table {
        let mut seen = HashSet::new();
        let rows = self
            .rows
            .iter()
            .filter(|row| {
                let signature: Vec<String> = self.headers.iter().map(|h| row.display(h)).collect();
                seen.insert(signature)
            })
            .cloned()
            .collect();
        Table {
            name: self.name.clone(),
            headers: self.headers.clone(),
            rows,
        }
    }
}

pub(crate) fn sort_rows_desc(rows: &mut [Row], column: &str) {
    rows.sort_by(|a, b| {
        let a = a.get(column).as_f64().unwrap_or(f64::NEG_INFINITY);
        let b = b.get(column).as_f64().unwrap_or(f64::NEG_INFINITY);
        b.partial_cmp(&a).unwrap_or(std::cmp::Ordering::Equal)
    });
}

/// Canonical join key: every whitespace character removed, then lowercased.
///
/// Internal spaces are stripped too, so "Jo Hn" and "John" collide. Distinct
/// multi-word names that differ only in spacing are therefore treated as one
/// person.
pub fn normalize_key(raw: impl fmt::Display) -> String {
    raw.to_string()
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}
