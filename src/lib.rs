//! Reconciles student rosters, exam exports and contact sheets that come out
//! of different tools, and selects a fixed-size top group ("Super 40") spread
//! over classes in proportion to their size.
//!
//! The core (`columns`, `merge`, `score`, `quota`, `analyzer`) works on
//! in-memory [`Table`]s only. `reader` and `report` move tables to and from
//! CSV and Excel files; `catalog` groups exports by the markers in their names.

pub mod analyzer;
pub mod catalog;
pub mod columns;
pub mod config;
pub mod error;
pub mod logging;
pub mod merge;
pub mod models;
pub mod quota;
pub mod reader;
pub mod report;
pub mod score;

pub use analyzer::{Super40Analysis, Super40Analyzer};
pub use config::Config;
pub use error::{ReconcileError, Result};
pub use models::{normalize_key, Cell, Row, Table};
pub use quota::{AllocationStrategy, QuotaPlan, Selection};
