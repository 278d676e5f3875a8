// Series for bar, pie and trend charts.
//
// Charts re-aggregate a table along a single axis. Only detail rows are
// read: subtotal and grand-total rows would count every sale twice.
use crate::error::SchemaError;
use crate::table::{Cell, Table};
use crate::types::{ChartPoint, TrendSeries};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

/// Sum `value_column` per distinct `axis` value, largest first, keeping at
/// most `top_n` points.
pub fn bar_series(
    table: &Table,
    axis: &str,
    value_column: &str,
    top_n: usize,
) -> Result<Vec<ChartPoint>, SchemaError> {
    let idx = table.require(&[axis, value_column])?;
    let (axis_idx, value_idx) = (idx[0], idx[1]);

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut points: Vec<ChartPoint> = Vec::new();
    for row in table.detail_rows() {
        let label = row.cells[axis_idx].to_string();
        let value = row.cells[value_idx].as_number().unwrap_or(0.0);
        match slots.get(&label) {
            Some(&i) => points[i].value += value,
            None => {
                slots.insert(label.clone(), points.len());
                points.push(ChartPoint { label, value });
            }
        }
    }
    points.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
    points.truncate(top_n);
    Ok(points)
}

/// Each point's percentage of the series total.
pub fn share_series(points: &[ChartPoint]) -> Vec<ChartPoint> {
    let total: f64 = points.iter().map(|p| p.value).sum();
    points
        .iter()
        .map(|p| ChartPoint {
            label: p.label.clone(),
            value: if total == 0.0 { 0.0 } else { p.value / total * 100.0 },
        })
        .collect()
}

/// Sum `value_column` per (`series_column`, `x_column`) pair. Series and the
/// points inside each series come out in ascending key order.
pub fn trend_series(
    table: &Table,
    x_column: &str,
    series_column: &str,
    value_column: &str,
) -> Result<Vec<TrendSeries>, SchemaError> {
    let idx = table.require(&[x_column, series_column, value_column])?;
    let (x_idx, series_idx, value_idx) = (idx[0], idx[1], idx[2]);

    let mut grid: BTreeMap<Cell, BTreeMap<Cell, f64>> = BTreeMap::new();
    for row in table.detail_rows() {
        let value = row.cells[value_idx].as_number().unwrap_or(0.0);
        *grid
            .entry(row.cells[series_idx].normalized_key())
            .or_default()
            .entry(row.cells[x_idx].normalized_key())
            .or_insert(0.0) += value;
    }
    Ok(grid
        .into_iter()
        .map(|(series, points)| TrendSeries {
            series: series.to_string(),
            points: points
                .into_iter()
                .map(|(x, value)| ChartPoint { label: x.to_string(), value })
                .collect(),
        })
        .collect())
}
