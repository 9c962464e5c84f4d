use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Ampcov: amplicon and mutation coverage for viral genomic surveillance
#[derive(Debug, Parser)]
#[command(author, version, about)]
#[command(styles=get_styles())]
#[command(arg_required_else_help(true))]
#[clap(name = "ampcov", version)]
pub struct App {
    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Per-amplicon coverage matrix for a sequencing batch
    Amplicon(AmpliconArgs),
    /// Per-mutation base count matrix over a sample selection
    Mutations(MatrixArgs),
    /// Per-position total depth matrix over a sample selection
    Total(MatrixArgs),
    /// Mutation frequencies and rolling statistics from matrix pairs
    Stats(StatsArgs),
}

#[derive(Debug, Args)]
pub struct AmpliconArgs {
    /// Primer scheme table (BED layout, tab-separated, no header)
    ///
    /// Columns: chrom, start, end, name, pool indicator. Primer names
    /// carry a LEFT/RIGHT marker and an underscore-delimited amplicon
    /// number; names containing 'alt' are ignored.
    #[arg(short = 'r', long, value_parser = validate_file)]
    pub primers: PathBuf,
    /// Sample sheet with sample and batch columns (tab-separated, no header)
    #[arg(short = 's', long, value_parser = validate_file)]
    pub samples: PathBuf,
    /// Directory with per-sample alignment outputs
    ///
    /// Coverage tables are expected at
    /// {dir}/{sample}/{batch}/alignments/coverage.tsv.gz
    #[arg(short = 'd', long)]
    pub sample_dir: PathBuf,
    /// Output directory for the depth and fraction matrices
    #[arg(short = 'o', long, default_value = ".")]
    pub outdir: PathBuf,
    /// Band length sampled at each query window edge
    #[arg(long, default_value = "20", help_heading = "Extraction options")]
    pub band: usize,
    /// Threads for per-sample extraction
    #[arg(short = 't', long, default_value = "4", help_heading = "Extraction options")]
    pub threads: usize,
}

#[derive(Debug, Args)]
pub struct MatrixArgs {
    /// Directory with per-sample alignment outputs
    ///
    /// Coverage tables are expected at
    /// {dir}/{sample}/{batch}/alignments/basecnt.tsv.gz (mutations) or
    /// {dir}/{sample}/{batch}/alignments/coverage.tsv.gz (total)
    #[arg(short = 'd', long)]
    pub coverage_dir: PathBuf,
    /// Sample metadata table (tab-separated, header with sample, proto, date, location)
    #[arg(short = 's', long, value_parser = validate_file)]
    pub timeline: PathBuf,
    /// Mutations of interest (CSV with a 'mut' column, e.g. 23039G)
    #[arg(short = 'm', long, value_parser = validate_file)]
    pub mutations: PathBuf,
    /// Output mutation coverage matrix (.csv)
    #[arg(short = 'o', long)]
    pub output: PathBuf,
    /// Keep samples collected strictly after this date
    #[arg(long, help_heading = "Selection options")]
    pub start: NaiveDate,
    /// Keep samples collected strictly before this date
    #[arg(long, help_heading = "Selection options")]
    pub end: NaiveDate,
    /// Keep samples from this collection site
    #[arg(short = 'l', long, help_heading = "Selection options")]
    pub location: String,
    /// Keep samples sequenced with this protocol
    #[arg(short = 'p', long, help_heading = "Selection options")]
    pub proto: Option<String>,
    /// Threads for per-sample extraction
    #[arg(short = 't', long, default_value = "4", help_heading = "Extraction options")]
    pub threads: usize,
}

#[derive(Debug, Args)]
pub struct StatsArgs {
    /// Mutation base count matrix (.csv from 'ampcov mutations')
    #[arg(short = 'b', long, value_parser = validate_file)]
    pub base_matrix: PathBuf,
    /// Position total depth matrix (.csv from 'ampcov total')
    #[arg(short = 'c', long, value_parser = validate_file)]
    pub total_matrix: PathBuf,
    /// Output mutation frequency matrix (.csv)
    #[arg(short = 'f', long)]
    pub frequencies: PathBuf,
    /// Output rolling statistics in long format (.csv)
    #[arg(short = 'o', long)]
    pub output: PathBuf,
    /// Total depth below which a position is treated as missing
    #[arg(long, default_value = "20", help_heading = "Normalization options")]
    pub min_depth: f64,
    /// Print formatted statistics table to console
    #[clap(long, short = 'T', help_heading = "Output options")]
    pub table: bool,
}

/// Validator function to check if each file exists and is valid
fn validate_file(file: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(file);

    if !path.exists() {
        return Err(format!("File not found: {}", file));
    }

    if !path.is_file() {
        return Err(format!("Not a valid file: {}", file));
    }

    Ok(path)
}

pub fn get_styles() -> clap::builder::Styles {
    clap::builder::Styles::styled()
        .header(
            anstyle::Style::new()
                .bold()
                .underline()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Yellow))),
        )
        .literal(
            anstyle::Style::new()
                .bold()
                .fg_color(Some(anstyle::Color::Ansi(anstyle::AnsiColor::Green))),
        )
}
