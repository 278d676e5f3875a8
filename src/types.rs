// Row types: the raw CSV shape, the cleaned sales record and the
// serializable summary written next to the report.
use chrono::Month;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Canonical column names after the loader's renaming pass.
pub mod columns {
    pub const YEAR: &str = "year";
    pub const MONTH: &str = "month";
    pub const MONTH_NAME: &str = "month_name";
    pub const SELLER: &str = "seller";
    pub const CLIENT: &str = "client";
    pub const CLIENT_ID: &str = "client_id";
    pub const BRAND: &str = "brand";
    pub const PRODUCT_TYPE: &str = "product_type";
    pub const AMOUNT: &str = "amount";
    pub const QUANTITY: &str = "quantity";
}

/// One CSV row as read, before cleaning. Headers are lowercased by the loader,
/// so both the dashboard names and the source database names are accepted.
#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "year", alias = "anio")]
    pub year: Option<String>,
    #[serde(rename = "month", alias = "mes")]
    pub month: Option<String>,
    #[serde(rename = "seller", alias = "vendedor_nombre", default)]
    pub seller: Option<String>,
    #[serde(rename = "client", alias = "cliente_nombre", default)]
    pub client: Option<String>,
    #[serde(rename = "client_id", alias = "codcliente", alias = "cliente_id", default)]
    pub client_id: Option<String>,
    #[serde(rename = "brand", alias = "marca", default)]
    pub brand: Option<String>,
    #[serde(rename = "product_type", alias = "tipo_producto", default)]
    pub product_type: Option<String>,
    #[serde(rename = "amount", alias = "venta_neta")]
    pub amount: Option<String>,
    #[serde(rename = "quantity", alias = "cantidad", default)]
    pub quantity: Option<String>,
}

/// A cleaned sales transaction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SalesRecord {
    pub year: i32,
    pub month: u32,
    pub seller: String,
    pub client: String,
    pub client_id: String,
    pub brand: String,
    pub product_type: String,
    pub amount: f64,
    pub quantity: f64,
}

impl SalesRecord {
    pub fn month_name(&self) -> String {
        u8::try_from(self.month)
            .ok()
            .and_then(|m| Month::try_from(m).ok())
            .map(|m| m.name().to_uppercase())
            .unwrap_or_else(|| "NO MONTH".to_string())
    }

    /// Text value of a filterable column, `None` when the column is unknown.
    pub fn field(&self, column: &str) -> Option<String> {
        let value = match column {
            columns::YEAR => self.year.to_string(),
            columns::MONTH => self.month.to_string(),
            columns::MONTH_NAME => self.month_name(),
            columns::SELLER => self.seller.clone(),
            columns::CLIENT => self.client.clone(),
            columns::CLIENT_ID => self.client_id.clone(),
            columns::BRAND => self.brand.clone(),
            columns::PRODUCT_TYPE => self.product_type.clone(),
            _ => return None,
        };
        Some(value)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// One line of the trend chart: a period's values along the x axis.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendSeries {
    pub series: String,
    pub points: Vec<ChartPoint>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_rows: usize,
    pub total_sellers: usize,
    pub total_clients: usize,
    pub total_brands: usize,
    /// Periods the comparison columns were built from: base and current, the
    /// single period of a totals-only report, or none.
    pub periods: Vec<String>,
    /// Grand total per metric column over the filtered rows.
    pub totals: BTreeMap<String, f64>,
    pub chart_axis: String,
    /// Largest values of the primary metric along `chart_axis`.
    pub top_entries: Vec<ChartPoint>,
    pub entry_share: Vec<ChartPoint>,
    /// Primary metric per month, one series per period.
    pub trend: Vec<TrendSeries>,
}
