// In-memory tabular structure shared by the pivot, comparison and subtotal
// stages.
//
// Columns carry an explicit `ColumnRole` so presentation code never has to
// guess what a column holds from its name. Rows carry a `RowLevel` tag that
// tells detail rows apart from synthesized subtotal and grand-total rows.
use crate::error::SchemaError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Text(String),
    Number(f64),
    Missing,
}

impl Cell {
    pub fn text(s: impl Into<String>) -> Self {
        Cell::Text(s.into())
    }

    pub fn empty() -> Self {
        Cell::Text(String::new())
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Cell::Text(s) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Grouping form of a key cell: missing values collapse into the empty
    /// string bucket.
    pub fn normalized_key(&self) -> Cell {
        match self {
            Cell::Missing => Cell::empty(),
            other => other.clone(),
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Cell::Missing => 0,
            Cell::Number(_) => 1,
            Cell::Text(_) => 2,
        }
    }
}

impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Number(a), Cell::Number(b)) => a.total_cmp(b),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl Hash for Cell {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Cell::Number(n) => n.to_bits().hash(state),
            Cell::Text(s) => s.hash(state),
            Cell::Missing => {}
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Text(s) => f.write_str(s),
            // Periods are stored as numbers; print 2024 rather than 2024.0.
            Cell::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{:.0}", n),
            Cell::Number(n) => write!(f, "{}", n),
            Cell::Missing => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ColumnRole {
    Label,
    Amount,
    Percentage,
}

/// The two amount columns a growth percentage is derived from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GrowthBasis {
    pub base: String,
    pub current: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Column {
    pub name: String,
    pub role: ColumnRole,
    pub growth: Option<GrowthBasis>,
}

impl Column {
    pub fn label(name: impl Into<String>) -> Self {
        Column { name: name.into(), role: ColumnRole::Label, growth: None }
    }

    pub fn amount(name: impl Into<String>) -> Self {
        Column { name: name.into(), role: ColumnRole::Amount, growth: None }
    }

    pub fn growth(name: impl Into<String>, base: impl Into<String>, current: impl Into<String>) -> Self {
        Column {
            name: name.into(),
            role: ColumnRole::Percentage,
            growth: Some(GrowthBasis { base: base.into(), current: current.into() }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum RowLevel {
    Detail,
    /// `depth` is the hierarchy position, 0 being the coarsest level.
    Subtotal { depth: usize, name: String },
    General,
}

impl RowLevel {
    pub fn is_detail(&self) -> bool {
        matches!(self, RowLevel::Detail)
    }

    pub fn tag(&self) -> &str {
        match self {
            RowLevel::Detail => "DETAIL",
            RowLevel::Subtotal { name, .. } => name,
            RowLevel::General => "GENERAL",
        }
    }
}

impl fmt::Display for RowLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Row {
    pub cells: Vec<Cell>,
    pub level: RowLevel,
}

impl Row {
    pub fn detail(cells: Vec<Cell>) -> Self {
        Row { cells, level: RowLevel::Detail }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<Column>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Table { columns, rows: Vec::new() }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: Row) {
        debug_assert_eq!(row.cells.len(), self.columns.len());
        self.rows.push(row);
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Resolve every name to its index, or fail listing all of the absent ones.
    pub fn require<S: AsRef<str>>(&self, names: &[S]) -> Result<Vec<usize>, SchemaError> {
        let mut found = Vec::with_capacity(names.len());
        let mut missing = Vec::new();
        for name in names {
            match self.column_index(name.as_ref()) {
                Some(idx) => found.push(idx),
                None => missing.push(name.as_ref().to_string()),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(SchemaError { missing })
        }
    }

    pub fn detail_rows(&self) -> impl Iterator<Item = &Row> {
        self.rows.iter().filter(|r| r.level.is_detail())
    }

    /// Rename columns in place. Growth bases follow the rename so percentage
    /// columns keep pointing at their amount columns.
    pub fn rename_columns(&mut self, renames: &HashMap<String, String>) {
        for col in &mut self.columns {
            if let Some(new_name) = renames.get(&col.name) {
                col.name = new_name.clone();
            }
            if let Some(basis) = &mut col.growth {
                if let Some(b) = renames.get(&basis.base) {
                    basis.base = b.clone();
                }
                if let Some(c) = renames.get(&basis.current) {
                    basis.current = c.clone();
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn cells_have_a_total_order() {
        let mut cells = vec![
            Cell::text("B"),
            Cell::Number(2.0),
            Cell::Missing,
            Cell::text("A"),
            Cell::Number(-1.0),
        ];
        cells.sort();
        assert_eq!(
            cells,
            vec![
                Cell::Missing,
                Cell::Number(-1.0),
                Cell::Number(2.0),
                Cell::text("A"),
                Cell::text("B"),
            ]
        );
    }

    #[test]
    fn integral_numbers_display_without_fraction() {
        assert_eq!(Cell::Number(2024.0).to_string(), "2024");
        assert_eq!(Cell::Number(1.5).to_string(), "1.5");
        assert_eq!(Cell::Missing.to_string(), "");
        assert_eq!(Cell::Missing.normalized_key(), Cell::empty());
    }

    #[test]
    fn require_reports_all_missing_columns() {
        let table = Table::new(vec![Column::label("seller"), Column::amount("amount")]);
        assert_eq!(table.require(&["amount", "seller"]).unwrap(), vec![1, 0]);
        let err = table.require(&["seller", "brand", "quantity"]).unwrap_err();
        assert_eq!(err.missing, vec!["brand".to_string(), "quantity".to_string()]);
    }

    #[test]
    fn rename_follows_growth_basis() {
        let mut table = Table::new(vec![
            Column::amount("amount_2023"),
            Column::amount("amount_2024"),
            Column::growth("%_GROWTH_amount", "amount_2023", "amount_2024"),
        ]);
        let renames: HashMap<String, String> = [
            ("amount_2023", "AMO. 2023"),
            ("amount_2024", "AMO. 2024"),
            ("%_GROWTH_amount", "% GROWTH AMO"),
        ]
        .into_iter()
        .map(|(a, b)| (a.to_string(), b.to_string()))
        .collect();
        table.rename_columns(&renames);
        assert_eq!(table.column_names(), vec!["AMO. 2023", "AMO. 2024", "% GROWTH AMO"]);
        assert_eq!(
            table.columns[2].growth,
            Some(GrowthBasis { base: "AMO. 2023".into(), current: "AMO. 2024".into() })
        );
    }
}
