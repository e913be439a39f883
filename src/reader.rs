use crate::error::{ReconcileError, Result};
use crate::models::{Cell, Row, Table};
use calamine::{open_workbook_auto, Data, Reader};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

const EXTENSIONS: &[&str] = &["csv", "xlsx", "xlsm", "xls"];

/// Loads CSV exports and Excel workbooks into [`Table`]s. Cells are trimmed;
/// blank cells become `Cell::Empty`; columns with a blank header are dropped.
/// Workbooks are read from their first sheet, first row as headers.
#[derive(Debug, Default)]
pub struct TableReader;

impl TableReader {
    pub fn new() -> Self {
        Self
    }

    pub fn read_file(&self, path: &Path) -> Result<Table> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        let table = match extension.as_str() {
            "csv" => {
                let file = fs::File::open(path).map_err(|source| ReconcileError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                self.read_csv(&name, file).map_err(|source| ReconcileError::Csv {
                    path: path.to_path_buf(),
                    source,
                })?
            }
            "xlsx" | "xlsm" | "xls" => self.read_workbook(&name, path)?,
            _ => {
                return Err(ReconcileError::UnsupportedFormat {
                    path: path.to_path_buf(),
                })
            }
        };
        info!("read {}: {} rows, {} columns", name, table.len(), table.headers().len());
        Ok(table)
    }

    pub fn read_str(&self, name: &str, content: &str) -> Result<Table> {
        self.read_csv(name, content.as_bytes())
            .map_err(|source| ReconcileError::Csv {
                path: PathBuf::from(name),
                source,
            })
    }

    fn read_csv<R: io::Read>(&self, name: &str, input: R) -> csv::Result<Table> {
        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(input);

        let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for record in reader.records() {
            records.push(record?.iter().map(Cell::from_raw).collect());
        }
        Ok(assemble(name, &headers, records))
    }

    fn read_workbook(&self, name: &str, path: &Path) -> Result<Table> {
        let excel_error = |source| ReconcileError::Excel {
            path: path.to_path_buf(),
            source,
        };

        let mut workbook = open_workbook_auto(path).map_err(excel_error)?;
        let range = workbook
            .worksheet_range_at(0)
            .ok_or_else(|| ReconcileError::EmptyWorkbook {
                path: path.to_path_buf(),
            })?
            .map_err(excel_error)?;

        let mut rows = range.rows();
        let headers: Vec<String> = match rows.next() {
            Some(first) => first.iter().map(|data| excel_cell(data).to_string()).collect(),
            None => Vec::new(),
        };
        let records: Vec<Vec<Cell>> = rows.map(|row| row.iter().map(excel_cell).collect()).collect();
        Ok(assemble(name, &headers, records))
    }

    /// Readable files directly inside `dir`, in file-name order. Hidden and
    /// lock files (`~$...`) are left out.
    pub fn list_directory(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let entries = fs::read_dir(dir).map_err(|source| ReconcileError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let mut paths: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_file() && is_table_file(path))
            .collect();
        paths.sort();
        Ok(paths)
    }

    /// Every table in `dir`; files that fail to load are logged and skipped.
    pub fn read_directory(&self, dir: &Path) -> Result<Vec<Table>> {
        let mut tables = Vec::new();
        for path in self.list_directory(dir)? {
            match self.read_file(&path) {
                Ok(table) => tables.push(table),
                Err(e) => warn!("skipping {}: {}", path.display(), e),
            }
        }
        Ok(tables)
    }
}

fn is_table_file(path: &Path) -> bool {
    let visible = path
        .file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| !n.starts_with('.') && !n.starts_with('~'));
    let known = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| EXTENSIONS.iter().any(|known| e.eq_ignore_ascii_case(known)));
    visible && known
}

/// Sheet cell to table cell. Error cells (`#N/A`, `#DIV/0!`) read as empty.
fn excel_cell(data: &Data) -> Cell {
    match data {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::Int(v) => Cell::Number(*v as f64),
        Data::Float(v) => Cell::Number(*v),
        Data::String(s) => Cell::from_raw(s),
        other => Cell::from_raw(&other.to_string()),
    }
}

/// Builds a table from a header row and raw records: headers are trimmed
/// (BOM included), blank and repeated headers dropped, blank records skipped.
fn assemble(name: &str, raw_headers: &[String], records: Vec<Vec<Cell>>) -> Table {
    // (position in the record, header) for every usable column
    let mut columns: Vec<(usize, String)> = Vec::new();
    for (position, raw) in raw_headers.iter().enumerate() {
        let header = raw.trim_start_matches('\u{feff}').trim();
        if header.is_empty() {
            debug!("{}: column {} has no header, dropped", name, position + 1);
            continue;
        }
        if columns.iter().any(|(_, h)| h == header) {
            warn!("{}: duplicate header `{}`, keeping the first", name, header);
            continue;
        }
        columns.push((position, header.to_string()));
    }

    let rows = records
        .into_iter()
        .filter(|record| !record.iter().all(Cell::is_empty))
        .map(|mut record| {
            Row::from_pairs(columns.iter().map(|(position, header)| {
                let cell = record.get_mut(*position).map(std::mem::take).unwrap_or_default();
                (header.clone(), cell)
            }))
        })
        .collect();

    let headers = columns.into_iter().map(|(_, h)| h).collect();
    Table::new(name, headers, rows)
}
