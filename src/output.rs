// Writers for the aggregated table (CSV, HTML) and the JSON summary, plus
// the console preview.
use crate::error::Result;
use crate::table::{Cell, Column, ColumnRole, Row, RowLevel, Table};
use crate::util::{format_amount, format_percentage};
use serde::Serialize;
use std::fmt::Write as _;
use std::path::Path;
use tabled::{builder::Builder, settings::Style};

/// Raw values plus a trailing `level` column.
pub fn write_csv(path: impl AsRef<Path>, table: &Table) -> Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    let mut header: Vec<&str> = table.column_names();
    header.push("level");
    wtr.write_record(&header)?;
    for row in &table.rows {
        let mut record: Vec<String> = row.cells.iter().map(Cell::to_string).collect();
        record.push(row.level.tag().to_string());
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: impl AsRef<Path>, value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

/// Presentation text of one cell according to its column role.
pub fn display_cell(column: &Column, cell: &Cell) -> String {
    match column.role {
        ColumnRole::Label => cell.to_string(),
        ColumnRole::Amount => format_amount(cell.as_number()),
        ColumnRole::Percentage => format_percentage(cell.as_number()),
    }
}

fn display_row(table: &Table, row: &Row) -> Vec<String> {
    table
        .columns
        .iter()
        .zip(&row.cells)
        .map(|(col, cell)| display_cell(col, cell))
        .collect()
}

/// Markdown preview of the first `max_rows` rows.
pub fn preview_table(table: &Table, max_rows: usize) {
    if table.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let mut builder = Builder::default();
    builder.push_record(table.columns.iter().map(|c| c.name.clone()));
    for row in table.rows.iter().take(max_rows) {
        builder.push_record(display_row(table, row));
    }
    let rendered = builder.build().with(Style::markdown()).to_string();
    println!("{}\n", rendered);
    if table.len() > max_rows {
        println!("... {} more rows\n", table.len() - max_rows);
    }
}

/// Row background keyed by level. Subtotal colors repeat past three levels.
pub fn row_background(level: &RowLevel) -> Option<&'static str> {
    const SUBTOTAL_COLORS: [&str; 3] = ["#E0FFFF", "#FFFFE0", "#E6F7E6"];
    match level {
        RowLevel::Detail => None,
        RowLevel::Subtotal { depth, .. } => Some(SUBTOTAL_COLORS[depth % SUBTOTAL_COLORS.len()]),
        RowLevel::General => Some("#D0E0FF"),
    }
}

fn sign_background(column: &Column, cell: &Cell) -> Option<&'static str> {
    if column.role != ColumnRole::Percentage {
        return None;
    }
    match cell.as_number() {
        Some(v) if v < 0.0 => Some("#FFCCCC"),
        Some(v) if v > 0.0 => Some("#CCFFCC"),
        _ => None,
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;").replace('<', "&lt;").replace('>', "&gt;").replace('"', "&quot;")
}

/// Standalone HTML grid of the aggregated table with level highlighting.
pub fn render_html(title: &str, table: &Table) -> String {
    let mut html = String::new();
    let _ = writeln!(html, "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">");
    let _ = writeln!(html, "<title>{}</title>", escape(title));
    let _ = writeln!(
        html,
        "<style>table{{border-collapse:collapse;font-family:sans-serif;font-size:12px}}\
         td,th{{border:1px solid #ccc;padding:2px 6px}}td.num{{text-align:right}}\
         tr.total{{font-weight:bold}}</style>\n</head>\n<body>"
    );
    let _ = writeln!(html, "<h1>{}</h1>\n<table>\n<tr>", escape(title));
    for col in &table.columns {
        let _ = write!(html, "<th>{}</th>", escape(&col.name));
    }
    let _ = writeln!(html, "</tr>");

    for row in &table.rows {
        let class = if row.level.is_detail() { "" } else { " class=\"total\"" };
        match row_background(&row.level) {
            Some(bg) => {
                let _ = write!(html, "<tr{} style=\"background-color:{}\">", class, bg);
            }
            None => {
                let _ = write!(html, "<tr{}>", class);
            }
        }
        for (col, cell) in table.columns.iter().zip(&row.cells) {
            let num = if col.role == ColumnRole::Label { "" } else { " class=\"num\"" };
            let text = escape(&display_cell(col, cell));
            match sign_background(col, cell) {
                Some(bg) => {
                    let _ = write!(html, "<td{} style=\"background-color:{}\">{}</td>", num, bg, text);
                }
                None => {
                    let _ = write!(html, "<td{}>{}</td>", num, text);
                }
            }
        }
        let _ = writeln!(html, "</tr>");
    }
    let _ = writeln!(html, "</table>\n</body>\n</html>");
    html
}

pub fn write_html(path: impl AsRef<Path>, title: &str, table: &Table) -> Result<()> {
    std::fs::write(path, render_html(title, table))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> Table {
        let mut t = Table::new(vec![
            Column::label("seller"),
            Column::amount("AMO. 2024"),
            Column::growth("% GROWTH AMO", "AMO. 2024", "AMO. 2024"),
        ]);
        t.push(Row::detail(vec![Cell::text("A&B"), Cell::Number(1500.0), Cell::Number(-12.5)]));
        t.push(Row {
            cells: vec![Cell::text("TOTAL GENERAL"), Cell::Number(1500.0), Cell::Number(0.0)],
            level: RowLevel::General,
        });
        t
    }

    #[test]
    fn csv_has_level_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_csv(&path, &sample()).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "seller,AMO. 2024,% GROWTH AMO,level",
                "A&B,1500,-12.5,DETAIL",
                "TOTAL GENERAL,1500,0,GENERAL",
            ]
        );
    }

    #[test]
    fn cells_format_by_role() {
        let t = sample();
        assert_eq!(display_row(&t, &t.rows[0]), vec!["A&B", "1,500", "-12.50%"]);
        assert_eq!(display_row(&t, &t.rows[1]), vec!["TOTAL GENERAL", "1,500", "-"]);
    }

    #[test]
    fn html_highlights_levels_and_signs() {
        let html = render_html("Sales <2024>", &sample());
        assert!(html.contains("<title>Sales &lt;2024&gt;</title>"));
        assert!(html.contains("A&amp;B"));
        assert!(html.contains("background-color:#FFCCCC\">-12.50%"));
        assert!(html.contains("<tr class=\"total\" style=\"background-color:#D0E0FF\">"));
    }

    #[test]
    fn subtotal_colors_cycle_by_depth() {
        let level = |depth| RowLevel::Subtotal { depth, name: "X".into() };
        assert_eq!(row_background(&RowLevel::Detail), None);
        assert_eq!(row_background(&level(0)), Some("#E0FFFF"));
        assert_eq!(row_background(&level(3)), Some("#E0FFFF"));
    }
}
