//! sheetrescue CLI - recover delimited text from damaged .xlsx workbooks
//!
//! Writes one `{base}_{sheet}.csv` file per worksheet that holds data.

use clap::Parser;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use sheetrescue::model::{EXCEL_MAX_COLUMNS, EXCEL_MAX_ROWS};
use sheetrescue::render::{to_json, JsonFormat};
use sheetrescue::{
    ConversionReport, Converter, Diagnostic, DiagnosticsSink, ExtractOptions, SheetNaming,
    SheetStats, DEFAULT_MAX_CELLS,
};
use std::path::PathBuf;

/// Recover tabular data from bloated or damaged Excel workbooks
#[derive(Parser)]
#[command(
    name = "sheetrescue",
    version,
    about = "Recover worksheet data from damaged .xlsx files",
    long_about = "sheetrescue - streams each worksheet of an .xlsx workbook, keeps only the \
                  cells that hold data and writes one CSV file per worksheet.\n\n\
                  Malformed cells are skipped; a truncated worksheet keeps the rows read \
                  before the damage."
)]
struct Cli {
    /// Input .xlsx files
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Output directory (default: next to each input file)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Field delimiter: a single ASCII character, or "tab"
    #[arg(short, long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,

    /// Rows beyond this count are treated as corrupt
    #[arg(long, default_value_t = EXCEL_MAX_ROWS)]
    max_rows: u32,

    /// Columns beyond this count are treated as corrupt
    #[arg(long, default_value_t = EXCEL_MAX_COLUMNS)]
    max_columns: u32,

    /// Cells that would grow a worksheet's table past this many positions are treated as corrupt
    #[arg(long, default_value_t = DEFAULT_MAX_CELLS)]
    max_cells: u64,

    /// Name output files after worksheet tab titles instead of sheetN
    #[arg(long)]
    sheet_titles: bool,

    /// Write empty files for worksheets without data
    #[arg(long)]
    keep_empty: bool,

    /// Print conversion reports as JSON instead of progress text
    #[arg(long)]
    json: bool,
}

impl Cli {
    fn extract_options(&self) -> ExtractOptions {
        let naming = if self.sheet_titles {
            SheetNaming::Title
        } else {
            SheetNaming::PartName
        };

        ExtractOptions::new()
            .with_delimiter(self.delimiter)
            .with_max_rows(self.max_rows)
            .with_max_columns(self.max_columns)
            .with_max_cells(self.max_cells)
            .with_sheet_naming(naming)
            .with_skip_empty_sheets(!self.keep_empty)
    }
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "tab" | "\\t" | "\t" => Ok(b'\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c.is_ascii() && c != '"' && c != '\n' && c != '\r' => {
                    Ok(c as u8)
                }
                _ => Err(format!(
                    "delimiter must be a single ASCII character other than quote or newline, got '{}'",
                    value
                )),
            }
        }
    }
}

/// Renders diagnostics above the spinner.
struct ConsoleSink<'a> {
    pb: &'a ProgressBar,
}

impl DiagnosticsSink for ConsoleSink<'_> {
    fn report(&mut self, diagnostic: Diagnostic) {
        match diagnostic {
            Diagnostic::SheetsFound { count } => {
                self.pb
                    .println(format!("  Found {} worksheet(s)", count.to_string().bold()));
            }
            Diagnostic::CellSkipped { sheet, error } => {
                self.pb.println(format!(
                    "  {} {}: {}",
                    "!".yellow().bold(),
                    sheet,
                    error.to_string().yellow()
                ));
            }
            Diagnostic::SheetExtracted { sheet, stats } => {
                self.pb.set_message(format!("Writing {}...", sheet));
                self.pb.println(extracted_line(&sheet, &stats));
            }
            Diagnostic::SheetEmpty { sheet } => {
                self.pb
                    .println(format!("  {}: {}", sheet.cyan(), "no data".dimmed()));
            }
            Diagnostic::SheetAborted { sheet, error } => {
                self.pb.println(format!(
                    "  {} {}: worksheet damaged {}, keeping rows read so far",
                    "✗".red().bold(),
                    sheet,
                    error
                ));
            }
        }
    }
}

/// Row and column counts are 1-based, matching the sheet's own numbering.
fn extracted_line(sheet: &str, stats: &SheetStats) -> String {
    format!(
        "  {}: Found data in {} cells (max row {}, max col {})",
        sheet.cyan(),
        stats.cells,
        stats.rows,
        stats.columns
    )
}

/// Drops every diagnostic; used with `--json`.
struct QuietSink;

impl DiagnosticsSink for QuietSink {
    fn report(&mut self, _diagnostic: Diagnostic) {}
}

fn main() {
    let cli = Cli::parse();

    match run(&cli) {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            eprintln!("{}: {}", "Error".red().bold(), e);
            std::process::exit(1);
        }
    }
}

/// Convert every input. Returns whether all files succeeded.
fn run(cli: &Cli) -> Result<bool, Box<dyn std::error::Error>> {
    let converter = Converter::new(cli.extract_options());
    let mut reports: Vec<ConversionReport> = Vec::new();
    let mut failed = 0;

    for input in &cli.files {
        if cli.json {
            match converter.convert_file(input, cli.output.as_deref(), &mut QuietSink) {
                Ok(report) => reports.push(report),
                Err(e) => {
                    eprintln!("{}: {}: {}", "Error".red().bold(), input.display(), e);
                    failed += 1;
                }
            }
            continue;
        }

        println!("{} {}", "Processing".cyan().bold(), input.display());
        let pb = create_spinner("Reading worksheets...");
        let result = converter.convert_file(input, cli.output.as_deref(), &mut ConsoleSink { pb: &pb });
        pb.finish_and_clear();

        match result {
            Ok(report) => {
                for path in report.outputs() {
                    println!("  {} Saved {}", "✓".green().bold(), path.display());
                }
                if report.outputs().is_empty() {
                    println!("  {} No worksheet held data", "!".yellow().bold());
                }
                reports.push(report);
            }
            Err(e) => {
                println!("  {} {}", "✗".red().bold(), e.to_string().red());
                failed += 1;
            }
        }
    }

    if cli.json {
        println!("{}", to_json(&reports, JsonFormat::Pretty)?);
    } else {
        print_summary(&reports, failed);
    }

    Ok(failed == 0)
}

fn print_summary(reports: &[ConversionReport], failed: usize) {
    let files: usize = reports.iter().map(|r| r.outputs().len()).sum();
    let skipped: usize = reports.iter().map(|r| r.total_skipped()).sum();
    let aborted: usize = reports.iter().map(|r| r.aborted_count()).sum();

    println!();
    println!("{}", "Summary".cyan().bold());
    println!("{}", "─".repeat(40));
    println!("{}: {}", "Converted".bold(), reports.len().to_string().green());
    if failed > 0 {
        println!("{}: {}", "Failed".bold(), failed.to_string().red());
    }
    println!("{}: {}", "CSV files written".bold(), files);
    if skipped > 0 {
        println!("{}: {}", "Cells skipped".bold(), skipped.to_string().yellow());
    }
    if aborted > 0 {
        println!("{}: {}", "Damaged worksheets".bold(), aborted.to_string().yellow());
    }
}

fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"])
            .template("{spinner:.blue} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
