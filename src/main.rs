// Entry point and high-level CLI flow.
//
// - Option [1] loads and cleans the sales export, printing diagnostics.
// - Option [2] builds the comparison report with nested subtotals, writes the
//   CSV, HTML and JSON outputs and prints a preview.
// - After generating a report, the user can go back to the menu or exit.
// With `--batch` both steps run once without prompting.
use anyhow::Context;
use clap::Parser;
use once_cell::sync::Lazy;
use sales_report::config::{Preset, SortStrategy};
use sales_report::filter::PeriodSlice;
use sales_report::reports::{primary_value_column, ReportCache};
use sales_report::types::{columns, SalesRecord};
use sales_report::{loader, output, util, ReportConfig, ReportError};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Parser)]
#[command(name = "sales-report")]
#[command(about = "Year-over-year sales comparison with nested subtotals")]
#[command(version)]
struct Cli {
    /// Sales export to load (CSV)
    #[arg(short, long, default_value = "sales.csv")]
    input: PathBuf,

    /// JSON report configuration; built-in defaults otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Strategy preset applied on top of the configuration
    #[arg(long, value_enum)]
    preset: Option<Preset>,

    /// Row ordering of the comparison table
    #[arg(long, value_enum)]
    sort: Option<SortStrategy>,

    /// Filter as column=value1,value2 (repeatable)
    #[arg(short, long = "filter")]
    filters: Vec<String>,

    /// Keep only these semesters or quarters (h1, h2, q1..q4)
    #[arg(long = "period", value_enum, value_delimiter = ',')]
    periods: Vec<PeriodSlice>,

    /// Keep clients whose name contains this text
    #[arg(long)]
    client_search: Option<String>,

    /// Directory for the generated files
    #[arg(short, long, default_value = ".")]
    out_dir: PathBuf,

    /// Load and generate once, without the menu
    #[arg(long)]
    batch: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

// Loaded dataset and memoized reports, so the export is read once but
// reports can be generated many times in a single run.
static APP_STATE: Lazy<Mutex<AppState>> = Lazy::new(|| Mutex::new(AppState::default()));

#[derive(Default)]
struct AppState {
    data: Option<Arc<Vec<SalesRecord>>>,
    /// Bumped on every successful load; part of the report cache key.
    generation: u64,
    cache: ReportCache,
}

fn state() -> MutexGuard<'static, AppState> {
    APP_STATE.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read_choice() -> String {
    print!("Enter choice: ");
    let _ = io::stdout().flush();
    let mut buf = String::new();
    io::stdin().read_line(&mut buf).ok();
    buf.trim().to_string()
}

/// Returns `true` if the user chose `Y`, `false` if they chose `N`.
fn prompt_back_to_menu() -> bool {
    loop {
        print!("Back to Report Selection (Y/N): ");
        let _ = io::stdout().flush();
        let mut buf = String::new();
        if io::stdin().read_line(&mut buf).unwrap_or(0) == 0 {
            return false;
        }
        match buf.trim().to_uppercase().as_str() {
            "Y" => return true,
            "N" => return false,
            _ => println!("Invalid choice. Please enter Y or N."),
        }
    }
}

/// Handle option [1]: load and clean the export.
fn handle_load(path: &Path) {
    match loader::load_csv(path) {
        Ok((data, load_report)) => {
            println!(
                "Processing dataset... ({} rows read, {} loaded)",
                util::format_int(load_report.total_rows),
                util::format_int(load_report.loaded_rows)
            );
            if load_report.parse_errors > 0 {
                println!(
                    "Note: {} rows had unparseable values.",
                    util::format_int(load_report.parse_errors)
                );
            }
            if load_report.quantity_defaulted {
                println!("Info: no quantity column found, quantities set to 0.");
            }
            println!();
            let mut state = state();
            state.generation += 1;
            let generation = state.generation;
            state.cache.retain_generation(generation);
            state.data = Some(Arc::new(data));
        }
        Err(ReportError::Schema(e)) => {
            eprintln!("Configuration error: the export is unusable, {}\n", e);
        }
        Err(e) => {
            eprintln!("Failed to load file: {}\n", e);
        }
    }
}

/// Handle option [2]: build the report and write every output.
///
/// A failure here only aborts this report; the menu keeps running.
fn handle_generate_report(config: &ReportConfig, out_dir: &Path) {
    let (data, generation) = {
        let state = state();
        (state.data.clone(), state.generation)
    };
    let Some(data) = data else {
        println!("Error: No data loaded. Please load the file first (option 1).\n");
        return;
    };

    let report = match state().cache.get_or_build(generation, &data, config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Report error: {}\n", e);
            return;
        }
    };
    if report.is_empty() {
        println!("No data available for the selected filters. Adjust the filters.\n");
        return;
    }

    println!("Generating report...");
    let levels: Vec<&str> = config.hierarchy.iter().map(|l| l.name.as_str()).collect();
    println!("Nested subtotals by {}", levels.join(" > "));
    if let Some(column) = &report.comparison.sort_column {
        println!("Ordered by {}", column);
    }
    println!();

    let csv_path = out_dir.join("comparison_subtotals.csv");
    let html_path = out_dir.join("comparison_report.html");
    let json_path = out_dir.join("summary.json");
    let writes = [
        output::write_csv(&csv_path, &report.aggregated),
        output::write_html(&html_path, "Sales comparison", &report.aggregated),
        output::write_json(&json_path, &report.summary),
    ];
    for result in writes {
        if let Err(e) = result {
            eprintln!("Write error: {}", e);
        }
    }

    output::preview_table(&report.aggregated, 15);
    println!(
        "(Full table exported to {} and {})\n",
        csv_path.display(),
        html_path.display()
    );

    let summary = &report.summary;
    println!("Summary Stats ({}):", json_path.display());
    println!("  Compared periods: {}", summary.periods.join(" vs "));
    for (metric, total) in &summary.totals {
        println!("  {}: {}", metric, util::format_number(*total, 2));
    }
    if let Some(column) = primary_value_column(&report.comparison, config) {
        println!("  Top {} by {}:", summary.chart_axis, column);
        for (point, share) in summary.top_entries.iter().zip(&summary.entry_share) {
            println!(
                "    {:<30} {:>15} {:>7}%",
                point.label,
                util::format_number(point.value, 0),
                util::format_number(share.value, 1)
            );
        }
    }
    for line in &summary.trend {
        let points: Vec<String> = line
            .points
            .iter()
            .map(|p| format!("{}={}", p.label, util::format_number(p.value, 0)))
            .collect();
        println!("  Trend {}: {}", line.series, points.join(" "));
    }
    println!();
}

fn build_config(cli: &Cli) -> anyhow::Result<ReportConfig> {
    let mut config = match &cli.config {
        Some(path) => ReportConfig::from_path(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => ReportConfig::default(),
    };
    if let Some(preset) = cli.preset {
        config.apply_preset(preset);
    }
    if let Some(sort) = cli.sort {
        config.sort = sort;
    }
    for arg in &cli.filters {
        config.filters.parse_arg(arg)?;
    }
    if !cli.periods.is_empty() {
        config.filters.select_periods(&cli.periods);
    }
    if let Some(text) = &cli.client_search {
        config.filters.search(columns::CLIENT, text);
    }
    config.validate()?;
    Ok(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into())
    } else {
        tracing_subscriber::EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into())
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let config = build_config(&cli)?;
    std::fs::create_dir_all(&cli.out_dir)
        .with_context(|| format!("creating output directory {}", cli.out_dir.display()))?;

    if cli.batch {
        handle_load(&cli.input);
        handle_generate_report(&config, &cli.out_dir);
        return Ok(());
    }

    loop {
        println!("Sales Report:");
        println!("[1] Load the file");
        println!("[2] Generate Report\n");
        match read_choice().as_str() {
            "1" => handle_load(&cli.input),
            "2" => {
                println!();
                handle_generate_report(&config, &cli.out_dir);
                if !prompt_back_to_menu() {
                    println!("Exiting the program.");
                    break;
                }
            }
            _ => println!("Invalid choice. Please enter 1 or 2.\n"),
        }
    }
    Ok(())
}
