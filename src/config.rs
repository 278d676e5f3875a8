// Report configuration.
//
// Every engine call receives its hierarchy, metric set and labels from a
// `ReportConfig` value. The defaults describe the seller -> client -> brand
// sales report with a month-level detail column and year-over-year pivots.
use crate::error::{ReportError, Result};
use crate::filter::Filters;
use crate::types::columns;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One hierarchy level: the key column it groups by and the name used for
/// its subtotal label and level tag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelSpec {
    pub column: String,
    pub name: String,
}

impl LevelSpec {
    pub fn new(column: &str, name: &str) -> Self {
        LevelSpec { column: column.to_string(), name: name.to_string() }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub column: String,
    pub label: String,
    #[serde(default)]
    pub abbreviation: Option<String>,
}

impl MetricSpec {
    pub fn new(column: &str, label: &str) -> Self {
        MetricSpec { column: column.to_string(), label: label.to_string(), abbreviation: None }
    }

    /// Short header prefix, the first three characters of the label unless
    /// set explicitly.
    pub fn abbrev(&self) -> String {
        match &self.abbreviation {
            Some(a) => a.clone(),
            None => self.label.chars().take(3).collect::<String>().to_uppercase(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SortStrategy {
    /// Ascending growth of the primary metric, biggest decline first.
    Decline,
    /// Descending most-recent amount of the primary metric.
    Amount,
    #[default]
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Preset {
    Custom,
    /// Find clients in decline: month detail, worst growth first.
    Decline,
    /// Reward high value: largest recent amount first.
    Reward,
    /// Seller and client only.
    SellerPerformance,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LabelTemplates {
    /// `{level}` is replaced by the level name.
    pub subtotal: String,
    pub general: String,
}

impl Default for LabelTemplates {
    fn default() -> Self {
        LabelTemplates {
            subtotal: "TOTAL {level}".to_string(),
            general: "TOTAL GENERAL".to_string(),
        }
    }
}

impl LabelTemplates {
    pub fn subtotal_label(&self, level_name: &str) -> String {
        self.subtotal.replace("{level}", level_name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub hierarchy: Vec<LevelSpec>,
    /// Finer-than-hierarchy key shown on detail rows and blanked on totals.
    pub period_detail_column: Option<String>,
    pub time_key: String,
    pub metrics: Vec<MetricSpec>,
    pub primary_metric: String,
    pub sort: SortStrategy,
    pub labels: LabelTemplates,
    pub filters: Filters,
    /// Grouping key the bar and share series are drawn along.
    pub chart_axis: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        ReportConfig {
            hierarchy: default_hierarchy(),
            period_detail_column: Some(columns::MONTH_NAME.to_string()),
            time_key: columns::YEAR.to_string(),
            metrics: vec![
                MetricSpec::new(columns::AMOUNT, "AMOUNT"),
                MetricSpec::new(columns::QUANTITY, "QUANTITY"),
            ],
            primary_metric: columns::AMOUNT.to_string(),
            sort: SortStrategy::Auto,
            labels: LabelTemplates::default(),
            filters: Filters::default(),
            chart_axis: columns::SELLER.to_string(),
        }
    }
}

fn default_hierarchy() -> Vec<LevelSpec> {
    vec![
        LevelSpec::new(columns::SELLER, "SELLER"),
        LevelSpec::new(columns::CLIENT, "CLIENT"),
        LevelSpec::new(columns::BRAND, "BRAND"),
    ]
}

impl ReportConfig {
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: ReportConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.metrics.is_empty() {
            return Err(ReportError::Config("at least one metric is required".into()));
        }
        let mut metric_columns = HashSet::new();
        let mut abbrevs = HashSet::new();
        for metric in &self.metrics {
            if !metric_columns.insert(metric.column.as_str()) {
                return Err(ReportError::Config(format!(
                    "metric column '{}' appears more than once",
                    metric.column
                )));
            }
            // Display names are built from the abbreviation and must stay unique.
            let abbrev = metric.abbrev();
            if !abbrevs.insert(abbrev.clone()) {
                return Err(ReportError::Config(format!(
                    "metric '{}' shares the abbreviation '{}' with another metric",
                    metric.column, abbrev
                )));
            }
        }
        if self.primary_metric_spec().is_none() {
            return Err(ReportError::Config(format!(
                "primary metric '{}' is not in the metric list",
                self.primary_metric
            )));
        }
        let mut seen = HashSet::new();
        for level in &self.hierarchy {
            if !seen.insert(level.column.as_str()) {
                return Err(ReportError::Config(format!(
                    "hierarchy column '{}' appears more than once",
                    level.column
                )));
            }
        }
        if let Some(detail) = &self.period_detail_column {
            if seen.contains(detail.as_str()) {
                return Err(ReportError::Config(format!(
                    "period detail column '{}' is also a hierarchy level",
                    detail
                )));
            }
            seen.insert(detail.as_str());
        }
        if seen.contains(self.time_key.as_str()) {
            return Err(ReportError::Config(format!(
                "time key '{}' is also a grouping column",
                self.time_key
            )));
        }
        if let Some(metric) = self
            .metrics
            .iter()
            .find(|m| seen.contains(m.column.as_str()) || m.column == self.time_key)
        {
            return Err(ReportError::Config(format!(
                "metric column '{}' is also a grouping column or the time key",
                metric.column
            )));
        }
        if !seen.contains(self.chart_axis.as_str()) {
            return Err(ReportError::Config(format!(
                "chart axis '{}' is not a grouping column",
                self.chart_axis
            )));
        }
        Ok(())
    }

    pub fn primary_metric_spec(&self) -> Option<&MetricSpec> {
        self.metrics.iter().find(|m| m.column == self.primary_metric)
    }

    pub fn hierarchy_columns(&self) -> Vec<String> {
        self.hierarchy.iter().map(|l| l.column.clone()).collect()
    }

    /// Hierarchy columns followed by the period-detail column, if any.
    pub fn grouping_keys(&self) -> Vec<String> {
        let mut keys = self.hierarchy_columns();
        if let Some(detail) = &self.period_detail_column {
            keys.push(detail.clone());
        }
        keys
    }

    pub fn apply_preset(&mut self, preset: Preset) {
        match preset {
            Preset::Custom => {}
            Preset::Decline => {
                self.hierarchy = default_hierarchy();
                self.period_detail_column = Some(columns::MONTH_NAME.to_string());
                self.primary_metric = columns::AMOUNT.to_string();
                self.sort = SortStrategy::Decline;
                self.chart_axis = columns::CLIENT.to_string();
            }
            Preset::Reward => {
                self.hierarchy = default_hierarchy();
                self.period_detail_column = None;
                self.primary_metric = columns::AMOUNT.to_string();
                self.sort = SortStrategy::Amount;
                self.chart_axis = columns::CLIENT.to_string();
            }
            Preset::SellerPerformance => {
                self.hierarchy = vec![
                    LevelSpec::new(columns::SELLER, "SELLER"),
                    LevelSpec::new(columns::CLIENT, "CLIENT"),
                ];
                self.period_detail_column = None;
                self.primary_metric = columns::AMOUNT.to_string();
                self.sort = SortStrategy::Auto;
                self.chart_axis = columns::SELLER.to_string();
            }
        }
    }
}
