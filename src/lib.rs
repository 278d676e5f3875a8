// Sales reporting: year-over-year comparison tables with nested subtotals.
//
// Data flows loader → filter → pivot (one per metric) → comparison
// (merge, order, rename) → subtotals → output.
pub mod chart;
pub mod comparison;
pub mod config;
pub mod error;
pub mod filter;
pub mod loader;
pub mod output;
pub mod pivot;
pub mod reports;
pub mod subtotals;
pub mod table;
pub mod types;
pub mod util;

pub use config::ReportConfig;
pub use error::{ReportError, SchemaError};
pub use reports::{build_report, Report, ReportCache};
pub use subtotals::{compute_nested_subtotals, SubtotalOptions};
pub use table::{Cell, Column, ColumnRole, Row, RowLevel, Table};
