use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReconcileError>;

#[derive(Debug, Error)]
pub enum ReconcileError {
    /// A mandatory logical column (the join key, the grouping column) is not
    /// present in a source. The merge for that source cannot proceed.
    #[error("source `{source_name}` has no `{column}` column (found: {})", .headers.join(", "))]
    MissingColumn {
        source_name: String,
        column: String,
        headers: Vec<String>,
    },

    #[error("failed to read CSV `{}`", .path.display())]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("I/O error on `{}`", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read workbook `{}`", .path.display())]
    Excel {
        path: PathBuf,
        #[source]
        source: calamine::Error,
    },

    #[error("workbook `{}` has no sheets", .path.display())]
    EmptyWorkbook { path: PathBuf },

    #[error("unsupported file format `{}` (expected .csv or .xlsx)", .path.display())]
    UnsupportedFormat { path: PathBuf },

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl ReconcileError {
    pub fn missing_column(source_name: &str, column: &str, headers: &[String]) -> Self {
        ReconcileError::MissingColumn {
            source_name: source_name.to_string(),
            column: column.to_string(),
            headers: headers.to_vec(),
        }
    }
}
