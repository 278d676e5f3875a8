// Record filters applied before any pivoting: set membership per column,
// case-insensitive text search, and month selection by semester or quarter.
use crate::error::{ReportError, Result, SchemaError};
use crate::types::{columns, SalesRecord};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

/// Calendar slices that expand into a month filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum PeriodSlice {
    #[value(name = "h1")]
    FirstSemester,
    #[value(name = "h2")]
    SecondSemester,
    Q1,
    Q2,
    Q3,
    Q4,
}

impl PeriodSlice {
    pub fn months(self) -> std::ops::RangeInclusive<u32> {
        match self {
            PeriodSlice::FirstSemester => 1..=6,
            PeriodSlice::SecondSemester => 7..=12,
            PeriodSlice::Q1 => 1..=3,
            PeriodSlice::Q2 => 4..=6,
            PeriodSlice::Q3 => 7..=9,
            PeriodSlice::Q4 => 10..=12,
        }
    }
}

/// User-selected filters.
///
/// `values` maps a column to the set of allowed values; an empty set means
/// "everything selected" and filters nothing. `contains` maps a column to a
/// text that must appear in the value, ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub values: BTreeMap<String, BTreeSet<String>>,
    pub contains: BTreeMap<String, String>,
}

impl Filters {
    pub fn new() -> Self {
        Filters::default()
    }

    pub fn insert<I, S>(&mut self, column: &str, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.values
            .entry(column.to_string())
            .or_default()
            .extend(values.into_iter().map(Into::into));
    }

    /// Keep only values of `column` containing `needle`. A blank needle
    /// removes the search.
    pub fn search(&mut self, column: &str, needle: &str) {
        let needle = needle.trim().to_uppercase();
        if needle.is_empty() {
            self.contains.remove(column);
        } else {
            self.contains.insert(column.to_string(), needle);
        }
    }

    /// Restrict the month filter to the union of `slices`.
    pub fn select_periods(&mut self, slices: &[PeriodSlice]) {
        let months = slices.iter().flat_map(|s| s.months()).map(|m| m.to_string());
        self.insert(columns::MONTH, months);
    }

    pub fn is_empty(&self) -> bool {
        self.values.values().all(BTreeSet::is_empty) && self.contains.is_empty()
    }

    /// Parse a `column=value1,value2` command line argument. Values are
    /// normalized like the loader normalizes keys.
    pub fn parse_arg(&mut self, arg: &str) -> Result<()> {
        let (column, values) = arg
            .split_once('=')
            .ok_or_else(|| ReportError::Config(format!("filter '{}' is not column=values", arg)))?;
        let column = column.trim().to_lowercase();
        if column.is_empty() {
            return Err(ReportError::Config(format!("filter '{}' has no column", arg)));
        }
        let values = values
            .split(',')
            .map(|v| v.trim().to_uppercase())
            .filter(|v| !v.is_empty());
        self.insert(&column, values);
        Ok(())
    }

    /// Keep records allowed by every active filter.
    pub fn apply(&self, records: &[SalesRecord]) -> Result<Vec<SalesRecord>> {
        let active: Vec<(&String, &BTreeSet<String>)> =
            self.values.iter().filter(|(_, allowed)| !allowed.is_empty()).collect();
        if active.is_empty() && self.contains.is_empty() {
            return Ok(records.to_vec());
        }
        if let Some(sample) = records.first() {
            let unknown: Vec<&str> = active
                .iter()
                .map(|(column, _)| column.as_str())
                .chain(self.contains.keys().map(String::as_str))
                .filter(|column| sample.field(column).is_none())
                .collect();
            if !unknown.is_empty() {
                return Err(SchemaError::new(unknown).into());
            }
        }

        let kept: Vec<SalesRecord> = records
            .iter()
            .filter(|r| {
                active.iter().all(|(column, allowed)| {
                    r.field(column).map(|v| allowed.contains(&v)).unwrap_or(false)
                }) && self.contains.iter().all(|(column, needle)| {
                    r.field(column)
                        .map(|v| v.to_uppercase().contains(needle.as_str()))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect();
        if kept.is_empty() && !self.contains.is_empty() {
            warn!(searches = ?self.contains, "no records match the text search");
        }
        debug!(before = records.len(), after = kept.len(), "filters applied");
        Ok(kept)
    }
}
