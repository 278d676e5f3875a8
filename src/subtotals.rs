// Nested subtotal insertion.
//
// Given detail rows and a coarsest-to-finest hierarchy, the output interleaves
// the detail rows with one subtotal row per group at every level and ends with
// a single grand-total row:
//
// ```text
// A  X  P  JANUARY   10          <- detail
// A  X  P  MARCH      5          <- detail
// A  X  TOTAL BRAND  15          <- brand subtotal
// A  TOTAL CLIENT    15          <- client subtotal
// TOTAL SELLER       15          <- seller subtotal
// ...
// TOTAL GENERAL      ..          <- grand total, always last
// ```
//
// Groups are formed in first-seen order of their key, so the caller does not
// need to pre-sort the rows, and rows inside a group keep their input order.
use crate::config::{LabelTemplates, LevelSpec, ReportConfig};
use crate::error::SchemaError;
use crate::table::{Cell, ColumnRole, Row, RowLevel, Table};
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct SubtotalOptions {
    pub hierarchy: Vec<LevelSpec>,
    /// Columns summed on subtotal and general rows.
    pub metric_columns: Vec<String>,
    /// Detail-only key cleared on every synthesized row.
    pub period_detail_column: Option<String>,
    pub labels: LabelTemplates,
}

impl SubtotalOptions {
    pub fn from_config(config: &ReportConfig, metric_columns: Vec<String>) -> Self {
        SubtotalOptions {
            hierarchy: config.hierarchy.clone(),
            metric_columns,
            period_detail_column: config.period_detail_column.clone(),
            labels: config.labels.clone(),
        }
    }
}

/// Resolved column positions for one call.
struct Layout<'a> {
    options: &'a SubtotalOptions,
    /// Hierarchy key positions, coarsest first.
    levels: Vec<usize>,
    metrics: Vec<usize>,
    /// Template for synthesized rows: empty strings in label columns, missing
    /// values everywhere else.
    blank: Vec<Cell>,
}

pub fn compute_nested_subtotals(table: &Table, options: &SubtotalOptions) -> Result<Table, SchemaError> {
    if options.hierarchy.is_empty() {
        return Ok(table.clone());
    }

    let mut wanted: Vec<&str> = options.hierarchy.iter().map(|l| l.column.as_str()).collect();
    wanted.extend(options.metric_columns.iter().map(String::as_str));
    let idx = table.require(&wanted)?;
    if table.is_empty() {
        return Ok(table.clone());
    }
    let (levels, metrics) = idx.split_at(options.hierarchy.len());

    let detail_idx = options.period_detail_column.as_deref().and_then(|c| {
        let found = table.column_index(c);
        if found.is_none() {
            debug!(column = c, "period detail column not present, nothing to clear");
        }
        found
    });

    let mut blank: Vec<Cell> = table
        .columns
        .iter()
        .map(|c| match c.role {
            ColumnRole::Label => Cell::empty(),
            _ => Cell::Missing,
        })
        .collect();
    for &i in levels.iter().chain(detail_idx.iter()) {
        blank[i] = Cell::empty();
    }

    let layout = Layout {
        options,
        levels: levels.to_vec(),
        metrics: metrics.to_vec(),
        blank,
    };

    let skipped = table.rows.iter().filter(|r| !r.level.is_detail()).count();
    if skipped > 0 {
        warn!(skipped, "input already contains total rows, they are left out");
    }

    // Missing keys group under the empty string and are shown as such.
    let details: Vec<Row> = table
        .detail_rows()
        .map(|row| {
            let mut row = row.clone();
            for &i in layout.levels.iter().chain(detail_idx.iter()) {
                row.cells[i] = row.cells[i].normalized_key();
            }
            row
        })
        .collect();

    // The grand total is summed from the input itself, not from the rows
    // emitted below.
    let general_sums = layout.sum(&details);

    let mut out = Table::new(table.columns.clone());
    out.rows.reserve(details.len() * 2 + 1);
    layout.emit_level(details, 0, &mut out.rows);

    let mut general = layout.blank.clone();
    general[layout.levels[0]] = Cell::text(options.labels.general.clone());
    for (&i, sum) in layout.metrics.iter().zip(general_sums) {
        general[i] = Cell::Number(sum);
    }
    out.rows.push(Row { cells: general, level: RowLevel::General });

    debug!(
        input = table.len(),
        output = out.len(),
        levels = layout.levels.len(),
        "nested subtotals computed"
    );
    Ok(out)
}

impl Layout<'_> {
    fn sum(&self, rows: &[Row]) -> Vec<f64> {
        self.metrics
            .iter()
            .map(|&i| rows.iter().filter_map(|r| r.cells[i].as_number()).sum())
            .collect()
    }

    /// Group `rows` on the key at `depth`, emit each group's contents followed
    /// by its subtotal. `rows` all share the same keys above `depth`.
    fn emit_level(&self, rows: Vec<Row>, depth: usize, out: &mut Vec<Row>) {
        let key_idx = self.levels[depth];
        let level = &self.options.hierarchy[depth];

        let mut order: HashMap<Cell, usize> = HashMap::new();
        let mut groups: Vec<Vec<Row>> = Vec::new();
        for row in rows {
            let slot = *order.entry(row.cells[key_idx].clone()).or_insert_with(|| {
                groups.push(Vec::new());
                groups.len() - 1
            });
            groups[slot].push(row);
        }

        for members in groups {
            let sums = self.sum(&members);
            let mut subtotal = self.blank.clone();
            for &i in &self.levels[..depth] {
                subtotal[i] = members[0].cells[i].clone();
            }
            subtotal[key_idx] = Cell::text(self.options.labels.subtotal_label(&level.name));
            for (&i, sum) in self.metrics.iter().zip(sums) {
                subtotal[i] = Cell::Number(sum);
            }

            if depth + 1 < self.levels.len() {
                self.emit_level(members, depth + 1, out);
            } else {
                out.extend(members);
            }
            out.push(Row {
                cells: subtotal,
                level: RowLevel::Subtotal { depth, name: level.name.clone() },
            });
        }
    }
}
