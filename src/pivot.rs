// Period pivot: sums one metric per group and spreads the time key into
// columns so two periods can be compared side by side.
use crate::error::SchemaError;
use crate::table::{Cell, Column, Row, Table};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Which output layout the data allowed.
#[derive(Debug, Clone, PartialEq)]
pub enum PivotShape {
    /// No input rows.
    Empty,
    /// Only one period present; the metric is a plain total.
    SingleTotal { period: Cell },
    /// Earliest and latest period, plus their growth.
    Comparison { base: Cell, current: Cell },
}

#[derive(Debug, Clone, PartialEq)]
pub struct PivotTable {
    pub metric: String,
    pub grouping_keys: Vec<String>,
    pub shape: PivotShape,
    pub table: Table,
}

pub fn period_column_name(metric: &str, period: &Cell) -> String {
    format!("{}_{}", metric, period)
}

pub fn growth_column_name(metric: &str) -> String {
    format!("%_GROWTH_{}", metric)
}

pub fn total_column_name(metric: &str) -> String {
    format!("Sum_{}", metric)
}

/// Percentage change from `base` to `current`.
///
/// A zero base yields 100 when the current value is positive and 0 otherwise,
/// so new and discontinued groups never produce NaN or infinite growth.
pub fn growth_pct(base: f64, current: f64) -> f64 {
    if base != 0.0 {
        (current - base) / base * 100.0
    } else if current > 0.0 {
        100.0
    } else {
        0.0
    }
}

pub fn build_period_pivot(
    table: &Table,
    grouping_keys: &[String],
    metric: &str,
    time_key: &str,
) -> Result<PivotTable, SchemaError> {
    let mut wanted: Vec<&str> = grouping_keys.iter().map(String::as_str).collect();
    wanted.push(metric);
    wanted.push(time_key);
    let idx = table.require(&wanted)?;
    let (key_idx, rest) = idx.split_at(grouping_keys.len());
    let (metric_idx, time_idx) = (rest[0], rest[1]);

    let mut periods: BTreeSet<Cell> = BTreeSet::new();
    let mut groups: BTreeMap<Vec<Cell>, BTreeMap<Cell, f64>> = BTreeMap::new();
    for row in table.detail_rows() {
        let key: Vec<Cell> = key_idx.iter().map(|&i| row.cells[i].normalized_key()).collect();
        let period = row.cells[time_idx].normalized_key();
        let value = row.cells[metric_idx].as_number().unwrap_or(0.0);
        periods.insert(period.clone());
        *groups.entry(key).or_default().entry(period).or_insert(0.0) += value;
    }

    let mut columns: Vec<Column> = grouping_keys.iter().map(Column::label).collect();
    let shape = match (periods.first(), periods.last()) {
        (None, _) | (_, None) => PivotShape::Empty,
        (Some(only), Some(_)) if periods.len() == 1 => PivotShape::SingleTotal { period: only.clone() },
        (Some(base), Some(current)) => PivotShape::Comparison {
            base: base.clone(),
            current: current.clone(),
        },
    };

    let mut out_rows = Vec::with_capacity(groups.len());
    match &shape {
        PivotShape::Empty => {
            debug!(metric, "pivot input is empty");
        }
        PivotShape::SingleTotal { period } => {
            debug!(metric, %period, "single period present, falling back to a total");
            columns.push(Column::amount(total_column_name(metric)));
            for (key, by_period) in groups {
                let mut cells = key;
                cells.push(Cell::Number(by_period.values().sum()));
                out_rows.push(Row::detail(cells));
            }
        }
        PivotShape::Comparison { base, current } => {
            if periods.len() > 2 {
                debug!(metric, dropped = periods.len() - 2, "ignoring intermediate periods");
            }
            let base_col = period_column_name(metric, base);
            let current_col = period_column_name(metric, current);
            columns.push(Column::amount(base_col.clone()));
            columns.push(Column::amount(current_col.clone()));
            columns.push(Column::growth(growth_column_name(metric), base_col, current_col));
            for (key, by_period) in groups {
                let b = by_period.get(base).copied().unwrap_or(0.0);
                let c = by_period.get(current).copied().unwrap_or(0.0);
                let mut cells = key;
                cells.extend([Cell::Number(b), Cell::Number(c), Cell::Number(growth_pct(b, c))]);
                out_rows.push(Row::detail(cells));
            }
        }
    }

    Ok(PivotTable {
        metric: metric.to_string(),
        grouping_keys: grouping_keys.to_vec(),
        shape,
        table: Table { columns, rows: out_rows },
    })
}
