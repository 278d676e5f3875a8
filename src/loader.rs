// CSV ingestion: header checks, cleaning and normalization of sales rows.
use crate::error::{Result, SchemaError};
use crate::types::{columns, RawRow, SalesRecord};
use crate::util::{normalize_key, parse_amount, parse_i32_safe};
use csv::{ReaderBuilder, StringRecord};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadReport {
    pub total_rows: usize,
    pub loaded_rows: usize,
    pub parse_errors: usize,
    /// The export had no quantity column and quantities were set to 0.
    pub quantity_defaulted: bool,
}

/// Header names accepted for each mandatory column, canonical name first.
const REQUIRED: [(&str, &[&str]); 3] = [
    (columns::AMOUNT, &["amount", "venta_neta"]),
    (columns::YEAR, &["year", "anio"]),
    (columns::MONTH, &["month", "mes"]),
];

const QUANTITY_HEADERS: [&str; 2] = ["quantity", "cantidad"];

pub fn load_csv(path: impl AsRef<Path>) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let path = path.as_ref();
    info!(path = %path.display(), "loading sales export");
    let file = std::fs::File::open(path)?;
    load_from_reader(file)
}

pub fn load_from_reader<R: Read>(reader: R) -> Result<(Vec<SalesRecord>, LoadReport)> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);

    let headers: StringRecord = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    check_headers(&headers)?;
    let quantity_defaulted = !QUANTITY_HEADERS.iter().any(|q| headers.iter().any(|h| h == *q));
    if quantity_defaulted {
        warn!("no quantity column found, quantities default to 0");
    }
    rdr.set_headers(headers);

    let mut total_rows = 0usize;
    let mut parse_errors = 0usize;
    let mut records = Vec::new();

    for result in rdr.deserialize::<RawRow>() {
        total_rows += 1;
        let row = match result {
            Ok(r) => r,
            Err(e) => {
                debug!(error = %e, "skipping malformed row");
                parse_errors += 1;
                continue;
            }
        };

        // Unparseable numbers are zeroed rather than dropped, but counted.
        let mut bad = false;
        let mut number = |raw: Option<&str>| match parse_amount(raw) {
            Some(v) => v,
            None => {
                if raw.map(|s| !s.trim().is_empty()).unwrap_or(false) {
                    bad = true;
                }
                0.0
            }
        };
        let amount = number(row.amount.as_deref());
        let quantity = number(row.quantity.as_deref());
        let year = parse_i32_safe(row.year.as_deref());
        let month = parse_i32_safe(row.month.as_deref()).and_then(|m| u32::try_from(m).ok());
        if bad || year.is_none() || month.is_none() {
            parse_errors += 1;
        }

        records.push(SalesRecord {
            year: year.unwrap_or(0),
            month: month.unwrap_or(0),
            seller: normalize_key(row.seller),
            client: normalize_key(row.client),
            client_id: normalize_key(row.client_id),
            brand: normalize_key(row.brand),
            product_type: normalize_key(row.product_type),
            amount,
            quantity,
        });
    }

    let report = LoadReport {
        total_rows,
        loaded_rows: records.len(),
        parse_errors,
        quantity_defaulted,
    };
    info!(rows = report.loaded_rows, errors = report.parse_errors, "sales export loaded");
    Ok((records, report))
}

fn check_headers(headers: &StringRecord) -> std::result::Result<(), SchemaError> {
    let missing: Vec<&str> = REQUIRED
        .iter()
        .filter(|(_, accepted)| !accepted.iter().any(|a| headers.iter().any(|h| h == *a)))
        .map(|(canonical, _)| *canonical)
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(SchemaError::new(missing))
    }
}
