// Report assembly: turns cleaned records into the comparison table with
// nested subtotals plus its summary, and memoizes the result.
use crate::chart::{bar_series, share_series, trend_series};
use crate::comparison::{amount_columns, assemble, refresh_growth, ComparisonTable};
use crate::config::ReportConfig;
use crate::error::{Result, SchemaError};
use crate::pivot::{build_period_pivot, PivotShape};
use crate::subtotals::{compute_nested_subtotals, SubtotalOptions};
use crate::table::{Cell, Column, Row, Table};
use crate::types::{columns, SalesRecord, SummaryStats};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

const TOP_ENTRIES: usize = 10;

#[derive(Debug, Clone)]
pub struct Report {
    pub comparison: ComparisonTable,
    /// Comparison rows with nested subtotals and the grand total.
    pub aggregated: Table,
    pub summary: SummaryStats,
}

impl Report {
    /// No rows matched the filters; callers show a "no data" notice.
    pub fn is_empty(&self) -> bool {
        self.aggregated.is_empty()
    }
}

/// Detail table with one row per sales record.
pub fn records_to_table(records: &[SalesRecord]) -> Table {
    let mut table = Table::new(vec![
        Column::label(columns::YEAR),
        Column::label(columns::MONTH),
        Column::label(columns::MONTH_NAME),
        Column::label(columns::SELLER),
        Column::label(columns::CLIENT),
        Column::label(columns::CLIENT_ID),
        Column::label(columns::BRAND),
        Column::label(columns::PRODUCT_TYPE),
        Column::amount(columns::AMOUNT),
        Column::amount(columns::QUANTITY),
    ]);
    for r in records {
        table.push(Row::detail(vec![
            Cell::Number(r.year as f64),
            Cell::Number(r.month as f64),
            Cell::Text(r.month_name()),
            Cell::text(r.seller.clone()),
            Cell::text(r.client.clone()),
            Cell::text(r.client_id.clone()),
            Cell::text(r.brand.clone()),
            Cell::text(r.product_type.clone()),
            Cell::Number(r.amount),
            Cell::Number(r.quantity),
        ]));
    }
    table
}

/// Filter, pivot every metric, merge and order the comparison, then insert the
/// nested subtotals.
pub fn build_report(records: &[SalesRecord], config: &ReportConfig) -> Result<Report> {
    config.validate()?;
    let filtered = config.filters.apply(records)?;
    let detail = records_to_table(&filtered);
    if filtered.is_empty() {
        info!("no rows left after filtering");
        return Ok(empty_report(&filtered, &detail, config));
    }

    let keys = config.grouping_keys();
    let pivots = config
        .metrics
        .iter()
        .map(|m| build_period_pivot(&detail, &keys, &m.column, &config.time_key))
        .collect::<std::result::Result<Vec<_>, SchemaError>>()?;

    let comparison = assemble(&pivots, config);
    if comparison.is_empty() {
        return Ok(empty_report(&filtered, &detail, config));
    }

    let options = SubtotalOptions::from_config(config, amount_columns(&comparison.table));
    let mut aggregated = compute_nested_subtotals(&comparison.table, &options)?;
    refresh_growth(&mut aggregated);

    let mut summary = generate_summary(&filtered, &detail, config, &comparison.shape);
    if let Some(column) = primary_value_column(&comparison, config) {
        let top = bar_series(&aggregated, &config.chart_axis, &column, TOP_ENTRIES)?;
        summary.entry_share = share_series(&top);
        summary.top_entries = top;
    }
    summary.trend = trend_series(&detail, columns::MONTH, &config.time_key, &config.primary_metric)?;
    info!(
        detail_rows = comparison.table.len(),
        output_rows = aggregated.len(),
        "report built"
    );
    Ok(Report { comparison, aggregated, summary })
}

fn empty_report(filtered: &[SalesRecord], detail: &Table, config: &ReportConfig) -> Report {
    Report {
        comparison: assemble(&[], config),
        aggregated: Table::default(),
        summary: generate_summary(filtered, detail, config, &PivotShape::Empty),
    }
}

/// Display name of the primary metric's most recent value column.
pub fn primary_value_column(comparison: &ComparisonTable, config: &ReportConfig) -> Option<String> {
    let abbrev = config.primary_metric_spec()?.abbrev();
    let name = match &comparison.shape {
        PivotShape::Comparison { current, .. } => format!("{}. {}", abbrev, current),
        PivotShape::SingleTotal { .. } => format!("{}. Total", abbrev),
        PivotShape::Empty => return None,
    };
    comparison.table.column_index(&name).map(|_| name)
}

pub fn generate_summary(
    records: &[SalesRecord],
    detail: &Table,
    config: &ReportConfig,
    shape: &PivotShape,
) -> SummaryStats {
    let sellers: HashSet<&str> = records.iter().map(|r| r.seller.as_str()).collect();
    let clients: HashSet<&str> = records.iter().map(|r| r.client.as_str()).collect();
    let brands: HashSet<&str> = records.iter().map(|r| r.brand.as_str()).collect();
    let periods = match shape {
        PivotShape::Empty => Vec::new(),
        PivotShape::SingleTotal { period } => vec![period.to_string()],
        PivotShape::Comparison { base, current } => vec![base.to_string(), current.to_string()],
    };

    let mut totals = BTreeMap::new();
    for metric in &config.metrics {
        if let Some(idx) = detail.column_index(&metric.column) {
            let sum: f64 = detail.rows.iter().filter_map(|r| r.cells[idx].as_number()).sum();
            totals.insert(metric.column.clone(), sum);
        }
    }

    SummaryStats {
        total_rows: records.len(),
        total_sellers: sellers.len(),
        total_clients: clients.len(),
        total_brands: brands.len(),
        periods,
        totals,
        chart_axis: config.chart_axis.clone(),
        top_entries: Vec::new(),
        entry_share: Vec::new(),
        trend: Vec::new(),
    }
}

/// Memoizes reports per (dataset generation, configuration).
///
/// Bump the generation whenever the loaded dataset changes. A miss just
/// rebuilds the report.
#[derive(Debug, Default)]
pub struct ReportCache {
    entries: HashMap<(u64, String), Arc<Report>>,
    hits: usize,
}

impl ReportCache {
    pub fn get_or_build(
        &mut self,
        generation: u64,
        records: &[SalesRecord],
        config: &ReportConfig,
    ) -> Result<Arc<Report>> {
        let key = (generation, serde_json::to_string(config)?);
        if let Some(report) = self.entries.get(&key) {
            self.hits += 1;
            debug!(generation, hits = self.hits, "report cache hit");
            return Ok(Arc::clone(report));
        }
        let report = Arc::new(build_report(records, config)?);
        self.entries.insert(key, Arc::clone(&report));
        Ok(report)
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    /// Drop reports built from older datasets.
    pub fn retain_generation(&mut self, generation: u64) {
        self.entries.retain(|(g, _), _| *g == generation);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetricSpec, Preset, SortStrategy};
    use crate::error::ReportError;
    use crate::table::RowLevel;
    use pretty_assertions::assert_eq;

    fn record(year: i32, month: u32, seller: &str, client: &str, brand: &str, amount: f64) -> SalesRecord {
        SalesRecord {
            year,
            month,
            seller: seller.into(),
            client: client.into(),
            client_id: format!("ID-{}", client),
            brand: brand.into(),
            product_type: "SHOES".into(),
            amount,
            quantity: 1.0,
        }
    }

    fn dataset() -> Vec<SalesRecord> {
        vec![
            record(2023, 1, "ANA", "ACME", "NIKE", 100.0),
            record(2024, 1, "ANA", "ACME", "NIKE", 150.0),
            record(2023, 2, "ANA", "BOLT", "PUMA", 80.0),
            record(2024, 2, "ANA", "BOLT", "PUMA", 20.0),
            record(2023, 1, "LUIS", "CORE", "NIKE", 50.0),
            record(2024, 1, "LUIS", "CORE", "NIKE", 75.0),
        ]
    }

    #[test]
    fn full_pipeline_with_month_detail() {
        let report = build_report(&dataset(), &ReportConfig::default()).unwrap();
        let t = &report.aggregated;
        assert_eq!(
            t.column_names(),
            vec![
                "seller",
                "client",
                "brand",
                "month_name",
                "AMO. 2023",
                "AMO. 2024",
                "% GROWTH AMO",
                "QUA. 2023",
                "QUA. 2024",
                "% GROWTH QUA",
            ]
        );
        let general = t.rows.last().unwrap();
        assert_eq!(general.level, RowLevel::General);
        assert_eq!(general.cells[0], Cell::text("TOTAL GENERAL"));
        assert_eq!(general.cells[4], Cell::Number(230.0));
        assert_eq!(general.cells[5], Cell::Number(245.0));
        // Growth on the grand total comes from the summed amounts.
        let growth = general.cells[6].as_number().unwrap();
        assert!((growth - (245.0 - 230.0) / 230.0 * 100.0).abs() < 1e-9);

        // 3 detail rows, 3 brand, 3 client, 2 seller, 1 general.
        assert_eq!(t.len(), 12);
        assert_eq!(report.summary.periods, vec!["2023", "2024"]);
        assert_eq!(report.summary.totals["amount"], 475.0);
        assert_eq!(report.summary.chart_axis, "seller");
        assert_eq!(report.summary.top_entries[0].label, "ANA");
        assert_eq!(report.summary.top_entries[0].value, 170.0);

        let trend: Vec<(&str, Vec<(&str, f64)>)> = report
            .summary
            .trend
            .iter()
            .map(|s| {
                (
                    s.series.as_str(),
                    s.points.iter().map(|p| (p.label.as_str(), p.value)).collect(),
                )
            })
            .collect();
        assert_eq!(
            trend,
            vec![
                ("2023", vec![("1", 150.0), ("2", 80.0)]),
                ("2024", vec![("1", 225.0), ("2", 20.0)]),
            ]
        );
    }

    #[test]
    fn chart_axis_follows_the_preset() {
        let mut config = ReportConfig::default();
        config.apply_preset(Preset::Reward);
        let report = build_report(&dataset(), &config).unwrap();
        assert_eq!(report.summary.chart_axis, "client");
        let labels: Vec<&str> = report.summary.top_entries.iter().map(|p| p.label.as_str()).collect();
        assert_eq!(labels, vec!["ACME", "CORE", "BOLT"]);
    }

    #[test]
    fn summary_periods_follow_the_time_key() {
        let config = ReportConfig {
            time_key: "month".into(),
            period_detail_column: None,
            ..ReportConfig::default()
        };
        let report = build_report(&dataset(), &config).unwrap();
        assert_eq!(report.summary.periods, vec!["1", "2"]);
        assert!(report.aggregated.column_index("AMO. 2").is_some());

        let mut config = ReportConfig::default();
        config.filters.insert("year", ["2024"]);
        let report = build_report(&dataset(), &config).unwrap();
        assert_eq!(report.summary.periods, vec!["2024"]);
    }

    #[test]
    fn metrics_sharing_an_abbreviation_are_refused() {
        let config = ReportConfig {
            metrics: vec![
                MetricSpec::new("amount", "Net sales"),
                MetricSpec::new("quantity", "Net units"),
            ],
            ..ReportConfig::default()
        };
        let err = build_report(&dataset(), &config).unwrap_err();
        assert!(matches!(err, ReportError::Config(_)));

        // With distinct abbreviations every metric keeps its own totals.
        let config = ReportConfig {
            metrics: vec![
                MetricSpec::new("amount", "Net sales"),
                MetricSpec { abbreviation: Some("UNI".into()), ..MetricSpec::new("quantity", "Net units") },
            ],
            period_detail_column: None,
            ..ReportConfig::default()
        };
        let report = build_report(&dataset(), &config).unwrap();
        let general = report.aggregated.rows.last().unwrap();
        let t = &report.aggregated;
        assert_eq!(general.cells[t.column_index("NET. 2024").unwrap()], Cell::Number(245.0));
        assert_eq!(general.cells[t.column_index("UNI. 2023").unwrap()], Cell::Number(3.0));
        assert_eq!(general.cells[t.column_index("UNI. 2024").unwrap()], Cell::Number(3.0));
        assert_eq!(general.cells[t.column_index("% GROWTH UNI").unwrap()], Cell::Number(0.0));
    }

    #[test]
    fn filters_restrict_the_report() {
        let mut config = ReportConfig::default();
        config.filters.insert("seller", ["LUIS"]);
        let report = build_report(&dataset(), &config).unwrap();
        assert_eq!(report.summary.total_rows, 2);
        assert_eq!(report.comparison.table.len(), 1);
    }

    #[test]
    fn no_matching_rows_is_an_empty_report() {
        let mut config = ReportConfig::default();
        config.filters.insert("brand", ["ADIDAS"]);
        let report = build_report(&dataset(), &config).unwrap();
        assert!(report.is_empty());
        assert_eq!(report.summary.total_rows, 0);
    }

    #[test]
    fn single_year_degrades_to_totals() {
        let mut config = ReportConfig::default();
        config.apply_preset(Preset::Reward);
        config.filters.insert("year", ["2024"]);
        let report = build_report(&dataset(), &config).unwrap();
        assert!(matches!(report.comparison.shape, PivotShape::SingleTotal { .. }));
        assert_eq!(
            report.aggregated.column_names(),
            vec!["seller", "client", "brand", "AMO. Total", "QUA. Total"]
        );
        assert_eq!(report.comparison.sort_column.as_deref(), Some("AMO. Total"));
        assert_eq!(report.aggregated.rows.last().unwrap().cells[3], Cell::Number(245.0));
    }

    #[test]
    fn decline_preset_orders_worst_first() {
        let mut config = ReportConfig::default();
        config.apply_preset(Preset::Decline);
        assert_eq!(config.sort, SortStrategy::Decline);
        let report = build_report(&dataset(), &config).unwrap();
        assert_eq!(report.aggregated.rows[0].cells[1], Cell::text("BOLT"));
    }

    #[test]
    fn unknown_hierarchy_column_is_a_schema_error() {
        let mut config = ReportConfig::default();
        config.hierarchy[2].column = "region".into();
        let err = build_report(&dataset(), &config).unwrap_err();
        assert!(matches!(err, ReportError::Schema(ref e) if e.missing == vec!["region"]));
    }

    #[test]
    fn cache_reuses_reports_per_generation() {
        let mut cache = ReportCache::default();
        let config = ReportConfig::default();
        let first = cache.get_or_build(1, &dataset(), &config).unwrap();
        let second = cache.get_or_build(1, &dataset(), &config).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(cache.hits(), 1);

        cache.get_or_build(2, &dataset(), &config).unwrap();
        assert_eq!(cache.len(), 2);
        cache.retain_generation(2);
        assert_eq!(cache.len(), 1);
    }
}
