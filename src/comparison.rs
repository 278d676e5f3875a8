// Merges one period pivot per metric into a single wide comparison table,
// orders it and gives the value columns their short display names.
use crate::config::{ReportConfig, SortStrategy};
use crate::pivot::{growth_column_name, growth_pct, period_column_name, total_column_name, PivotShape, PivotTable};
use crate::table::{Cell, Column, ColumnRole, Row, Table};
use std::cmp::Ordering;
use std::collections::HashMap;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq)]
pub struct ComparisonTable {
    pub table: Table,
    pub grouping_keys: Vec<String>,
    /// Layout of the primary metric's pivot, which decides the sort column.
    pub shape: PivotShape,
    /// Display name of the column the rows were ordered by.
    pub sort_column: Option<String>,
}

impl ComparisonTable {
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }
}

/// Build the comparison table. Empty pivots are skipped; if nothing is left the
/// result is an empty table.
pub fn assemble(pivots: &[PivotTable], config: &ReportConfig) -> ComparisonTable {
    let mut non_empty = pivots.iter().filter(|p| !p.table.is_empty());
    let Some(first) = non_empty.next() else {
        return ComparisonTable {
            table: Table::default(),
            grouping_keys: Vec::new(),
            shape: PivotShape::Empty,
            sort_column: None,
        };
    };

    let mut table = first.table.clone();
    let mut keys = first.grouping_keys.clone();
    for pivot in non_empty {
        let (merged, common) = outer_join(&table, &keys, pivot);
        table = merged;
        keys = common;
    }

    let shape = pivots
        .iter()
        .find(|p| p.metric == config.primary_metric)
        .map(|p| p.shape.clone())
        .unwrap_or(PivotShape::Empty);

    let sort_column = sort_rows(&mut table, &keys, &config.primary_metric, &shape, config.sort);

    let renames = display_names(pivots, config);
    table.rename_columns(&renames);
    let sort_column = sort_column.map(|c| renames.get(&c).cloned().unwrap_or(c));

    ComparisonTable { table, grouping_keys: keys, shape, sort_column }
}

/// Outer join of `left` with the value columns of `right` on the keys both
/// share. Rows only present on one side get missing cells for the other.
fn outer_join(left: &Table, left_keys: &[String], right: &PivotTable) -> (Table, Vec<String>) {
    let common: Vec<String> = left_keys
        .iter()
        .filter(|k| right.grouping_keys.contains(k))
        .cloned()
        .collect();
    let left_idx: Vec<usize> = common.iter().filter_map(|k| left.column_index(k)).collect();
    let right_idx: Vec<usize> = common.iter().filter_map(|k| right.table.column_index(k)).collect();
    let right_values: Vec<usize> = right
        .table
        .columns
        .iter()
        .enumerate()
        .filter(|(_, c)| !right.grouping_keys.contains(&c.name))
        .map(|(i, _)| i)
        .collect();

    let mut columns = left.columns.clone();
    columns.extend(right_values.iter().map(|&i| right.table.columns[i].clone()));
    let width = columns.len();
    let left_width = left.columns.len();

    let mut rows: Vec<Row> = left
        .rows
        .iter()
        .map(|r| {
            let mut cells = r.cells.clone();
            cells.resize(width, Cell::Missing);
            Row::detail(cells)
        })
        .collect();
    let mut index: HashMap<Vec<Cell>, usize> = HashMap::new();
    for (pos, r) in left.rows.iter().enumerate() {
        index
            .entry(left_idx.iter().map(|&i| r.cells[i].clone()).collect())
            .or_insert(pos);
    }

    let mut appended = 0usize;
    for r in &right.table.rows {
        let key: Vec<Cell> = right_idx.iter().map(|&i| r.cells[i].clone()).collect();
        let pos = match index.get(&key) {
            Some(&pos) => pos,
            None => {
                let mut cells: Vec<Cell> = left
                    .columns
                    .iter()
                    .map(|c| match c.role {
                        ColumnRole::Label => Cell::empty(),
                        _ => Cell::Missing,
                    })
                    .collect();
                for (&li, value) in left_idx.iter().zip(&key) {
                    cells[li] = value.clone();
                }
                cells.resize(width, Cell::Missing);
                rows.push(Row::detail(cells));
                index.insert(key, rows.len() - 1);
                appended += 1;
                rows.len() - 1
            }
        };
        for (offset, &ri) in right_values.iter().enumerate() {
            rows[pos].cells[left_width + offset] = r.cells[ri].clone();
        }
    }
    debug!(metric = %right.metric, appended, "metric pivot merged");

    (Table { columns, rows }, common)
}

/// Order rows for the chosen strategy and return the sort column's name.
///
/// Missing or non-numeric values sort as negative infinity.
fn sort_rows(
    table: &mut Table,
    keys: &[String],
    primary: &str,
    shape: &PivotShape,
    strategy: SortStrategy,
) -> Option<String> {
    let growth = Some(growth_column_name(primary)).filter(|c| table.column_index(c).is_some());
    let amount = match shape {
        PivotShape::Comparison { current, .. } => Some(period_column_name(primary, current)),
        _ => None,
    }
    .filter(|c| table.column_index(c).is_some());

    let (column, ascending) = match (strategy, &growth, &amount) {
        (SortStrategy::Decline, Some(g), _) => (g.clone(), true),
        (SortStrategy::Amount, _, Some(a)) => (a.clone(), false),
        (_, Some(g), _) => (g.clone(), false),
        (_, None, Some(a)) => (a.clone(), false),
        _ => {
            let first_value = table.columns.iter().find(|c| !keys.contains(&c.name))?;
            (first_value.name.clone(), false)
        }
    };
    info!(column = %column, ascending, "ordering comparison rows");

    let idx = table.column_index(&column)?;
    let value = |r: &Row| r.cells[idx].as_number().filter(|v| !v.is_nan()).unwrap_or(f64::NEG_INFINITY);
    table.rows.sort_by(|a, b| {
        let ord = value(a).partial_cmp(&value(b)).unwrap_or(Ordering::Equal);
        if ascending {
            ord
        } else {
            ord.reverse()
        }
    });
    Some(column)
}

/// Internal pivot column names to short display names:
/// `<ABR>. <period>`, `% GROWTH <ABR>` and `<ABR>. Total`.
fn display_names(pivots: &[PivotTable], config: &ReportConfig) -> HashMap<String, String> {
    let mut renames = HashMap::new();
    for pivot in pivots {
        let abbrev = config
            .metrics
            .iter()
            .find(|m| m.column == pivot.metric)
            .map(|m| m.abbrev())
            .unwrap_or_else(|| pivot.metric.chars().take(3).collect::<String>().to_uppercase());
        match &pivot.shape {
            PivotShape::Empty => {}
            PivotShape::SingleTotal { .. } => {
                renames.insert(total_column_name(&pivot.metric), format!("{}. Total", abbrev));
            }
            PivotShape::Comparison { base, current } => {
                for period in [base, current] {
                    renames.insert(
                        period_column_name(&pivot.metric, period),
                        format!("{}. {}", abbrev, period),
                    );
                }
                renames.insert(growth_column_name(&pivot.metric), format!("% GROWTH {}", abbrev));
            }
        }
    }
    renames
}

/// Amount-role columns, the ones a subtotal pass should sum.
pub fn amount_columns(table: &Table) -> Vec<String> {
    table
        .columns
        .iter()
        .filter(|c| c.role == ColumnRole::Amount)
        .map(|c| c.name.clone())
        .collect()
}

/// Recompute growth percentages on subtotal and general rows from their summed
/// basis columns. Summing percentages would be meaningless.
pub fn refresh_growth(table: &mut Table) {
    let targets: Vec<(usize, usize, usize)> = table
        .columns
        .iter()
        .enumerate()
        .filter_map(|(i, c): (usize, &Column)| {
            let basis = c.growth.as_ref()?;
            Some((i, table.column_index(&basis.base)?, table.column_index(&basis.current)?))
        })
        .collect();
    for row in table.rows.iter_mut().filter(|r| !r.level.is_detail()) {
        for &(g, b, c) in &targets {
            let base = row.cells[b].as_number().unwrap_or(0.0);
            let current = row.cells[c].as_number().unwrap_or(0.0);
            row.cells[g] = Cell::Number(growth_pct(base, current));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pivot::build_period_pivot;
    use crate::table::RowLevel;
    use pretty_assertions::assert_eq;

    /// seller, year, amount, quantity
    fn sales(rows: &[(&str, f64, f64, f64)]) -> Table {
        let mut t = Table::new(vec![
            Column::label("seller"),
            Column::label("year"),
            Column::amount("amount"),
            Column::amount("quantity"),
        ]);
        for (s, y, a, q) in rows {
            t.push(Row::detail(vec![
                Cell::text(*s),
                Cell::Number(*y),
                Cell::Number(*a),
                Cell::Number(*q),
            ]));
        }
        t
    }

    fn pivots(input: &Table) -> Vec<PivotTable> {
        let keys = vec!["seller".to_string()];
        ["amount", "quantity"]
            .iter()
            .map(|m| build_period_pivot(input, &keys, m, "year").unwrap())
            .collect()
    }

    fn config(sort: SortStrategy) -> ReportConfig {
        ReportConfig { sort, ..ReportConfig::default() }
    }

    fn sellers(t: &ComparisonTable) -> Vec<String> {
        t.table.rows.iter().map(|r| r.cells[0].to_string()).collect()
    }

    fn input() -> Table {
        sales(&[
            ("A", 2023.0, 100.0, 1.0),
            ("A", 2024.0, 150.0, 2.0),
            ("B", 2023.0, 200.0, 4.0),
            ("B", 2024.0, 100.0, 4.0),
            ("C", 2023.0, 50.0, 1.0),
            ("C", 2024.0, 400.0, 1.0),
        ])
    }

    #[test]
    fn merges_and_renames_columns() {
        let out = assemble(&pivots(&input()), &config(SortStrategy::Auto));
        assert_eq!(
            out.table.column_names(),
            vec![
                "seller",
                "AMO. 2023",
                "AMO. 2024",
                "% GROWTH AMO",
                "QUA. 2023",
                "QUA. 2024",
                "% GROWTH QUA",
            ]
        );
        // Highest growth first by default.
        assert_eq!(sellers(&out), vec!["C", "A", "B"]);
        assert_eq!(out.sort_column.as_deref(), Some("% GROWTH AMO"));
    }

    #[test]
    fn decline_puts_worst_growth_first() {
        let out = assemble(&pivots(&input()), &config(SortStrategy::Decline));
        assert_eq!(sellers(&out), vec!["B", "A", "C"]);
    }

    #[test]
    fn amount_orders_by_latest_period() {
        let out = assemble(&pivots(&input()), &config(SortStrategy::Amount));
        assert_eq!(sellers(&out), vec!["C", "A", "B"]);
        assert_eq!(out.sort_column.as_deref(), Some("AMO. 2024"));
    }

    #[test]
    fn single_period_uses_totals() {
        let input = sales(&[("A", 2023.0, 10.0, 1.0), ("B", 2023.0, 30.0, 1.0)]);
        let out = assemble(&pivots(&input), &config(SortStrategy::Decline));
        assert_eq!(out.table.column_names(), vec!["seller", "AMO. Total", "QUA. Total"]);
        assert_eq!(sellers(&out), vec!["B", "A"]);
        assert_eq!(out.sort_column.as_deref(), Some("AMO. Total"));
    }

    #[test]
    fn outer_join_fills_missing_metrics() {
        let amount = build_period_pivot(
            &sales(&[("A", 2023.0, 1.0, 0.0), ("A", 2024.0, 2.0, 0.0)]),
            &["seller".to_string()],
            "amount",
            "year",
        )
        .unwrap();
        let quantity = build_period_pivot(
            &sales(&[("B", 2023.0, 0.0, 3.0), ("B", 2024.0, 0.0, 6.0)]),
            &["seller".to_string()],
            "quantity",
            "year",
        )
        .unwrap();
        let out = assemble(&[amount, quantity], &config(SortStrategy::Decline));
        assert_eq!(out.table.len(), 2);
        // B has no amount data, so its growth is missing and sorts first.
        assert_eq!(sellers(&out), vec!["B", "A"]);
        assert_eq!(out.table.rows[0].cells[1], Cell::Missing);
        assert_eq!(out.table.rows[1].cells[4], Cell::Missing);
    }

    #[test]
    fn empty_pivots_give_empty_comparison() {
        let out = assemble(&pivots(&sales(&[])), &config(SortStrategy::Auto));
        assert!(out.is_empty());
        assert_eq!(out.shape, PivotShape::Empty);
    }

    #[test]
    fn growth_is_recomputed_on_totals() {
        let mut table = Table::new(vec![
            Column::amount("b"),
            Column::amount("c"),
            Column::growth("g", "b", "c"),
        ]);
        table.push(Row::detail(vec![Cell::Number(100.0), Cell::Number(50.0), Cell::Number(-50.0)]));
        table.push(Row {
            cells: vec![Cell::Number(100.0), Cell::Number(300.0), Cell::Missing],
            level: RowLevel::General,
        });
        table.push(Row {
            cells: vec![Cell::Number(0.0), Cell::Number(0.0), Cell::Missing],
            level: RowLevel::Subtotal { depth: 0, name: "SELLER".into() },
        });
        refresh_growth(&mut table);
        assert_eq!(table.rows[0].cells[2], Cell::Number(-50.0));
        assert_eq!(table.rows[1].cells[2], Cell::Number(200.0));
        assert_eq!(table.rows[2].cells[2], Cell::Number(0.0));
        assert_eq!(amount_columns(&table), vec!["b", "c"]);
    }
}
