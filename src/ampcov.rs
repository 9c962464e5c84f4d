use std::fs::create_dir_all;
use std::path::PathBuf;

use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::coverage::{
    discover_coverage_files, CoverageFile, CoverageFormat, TargetKey, EDGE_BAND,
};
use crate::error::AmpcovError;
use crate::matrix::{assemble, ColumnJob, CoverageMatrix};
use crate::scheme::PrimerScheme;
use crate::stats::{print_statistics, rolling_statistics, write_statistics};
use crate::targets::TargetList;
use crate::terminal::{AmpliconArgs, MatrixArgs, StatsArgs};
use crate::timeline::{read_sample_sheet, SelectorConfig, Timeline};

/// Ampcov application structure.
pub struct Ampcov {
    config: AmpcovConfig,
}

impl Ampcov {
    pub fn from(config: AmpcovConfig) -> Self {
        Self { config }
    }

    /// Per-amplicon coverage matrix for one sequencing batch.
    ///
    /// Derives query windows from the primer scheme, extracts one median
    /// depth per window and sample, and writes the raw depth matrix plus
    /// the per-sample fraction-of-reads matrix.
    pub fn run_amplicon(
        &self,
        primers: &PathBuf,
        samples: &PathBuf,
        sample_dir: &PathBuf,
        outdir: &PathBuf,
    ) -> Result<(), AmpcovError> {
        log::info!("Parsing primer scheme: {}", primers.display());
        let scheme = PrimerScheme::from_bed(primers)?;
        let amplicons = scheme.amplicons()?;
        log::info!("Derived {} amplicon query windows", amplicons.len());

        let row_keys = amplicons
            .iter()
            .map(|amplicon| amplicon.primer_num.to_string())
            .collect_vec();
        let targets = amplicons
            .iter()
            .map(|amplicon| TargetKey::Window {
                start: amplicon.query_start,
                end: amplicon.query_end,
            })
            .collect_vec();

        log::info!("Reading sample sheet: {}", samples.display());
        let jobs: Vec<ColumnJob> = read_sample_sheet(samples)?
            .iter()
            .map(|entry| ColumnJob {
                sample: entry.sample.clone(),
                date: None,
                path: entry.coverage_path(sample_dir, CoverageFormat::TotalDepth.filename()),
            })
            .collect();

        log::info!("Extracting amplicon depths from {} coverage files", jobs.len());
        let band = self.config.extractor.band;
        let matrix = assemble(row_keys, &jobs, self.config.threads, |path| {
            CoverageFile::open(path, CoverageFormat::TotalDepth)?.extract(&targets, band)
        })?;

        if !outdir.exists() {
            create_dir_all(outdir)?;
        }

        let depths = outdir.join("amplicons_coverages.csv");
        log::info!("Writing amplicon depth matrix to: {}", depths.display());
        matrix.write_csv(&depths, "amplicon")?;

        let fractions = outdir.join("amplicons_coverages_norm.csv");
        log::info!("Writing amplicon fraction matrix to: {}", fractions.display());
        matrix.normalized().write_csv(&fractions, "amplicon")?;

        Ok(())
    }

    /// Per-mutation depth matrix over a sample selection.
    ///
    /// In base count mode each target is a position + mutated nucleotide
    /// against `basecnt.tsv.gz` tables; in total depth mode each target is
    /// a bare position against `coverage.tsv.gz` tables.
    pub fn run_matrix(
        &self,
        format: CoverageFormat,
        coverage_dir: &PathBuf,
        timeline: &PathBuf,
        mutations: &PathBuf,
        selector: &SelectorConfig,
        output: &PathBuf,
    ) -> Result<(), AmpcovError> {
        log::info!("Reading sample metadata table: {}", timeline.display());
        let timeline = Timeline::from_tsv(timeline)?;
        let selected = timeline.select(selector);
        log::info!(
            "Selected {} of {} samples ({}, {} to {})",
            selected.len(),
            timeline.samples.len(),
            selector.location,
            selector.start,
            selector.end
        );

        let target_list = match format {
            CoverageFormat::BaseCount => TargetList::substitutions(mutations)?,
            CoverageFormat::TotalDepth => TargetList::positions(mutations)?,
        };
        let targets = target_list.keys();

        log::info!("Locating coverage files under: {}", coverage_dir.display());
        let files = discover_coverage_files(coverage_dir, format)?;

        let jobs: Vec<ColumnJob> = selected
            .iter()
            .flat_map(|record| {
                files
                    .iter()
                    .filter(move |(sample, _)| *sample == record.sample)
                    .map(move |(_, path)| ColumnJob {
                        sample: record.sample.clone(),
                        date: Some(record.date),
                        path: path.clone(),
                    })
            })
            .collect();

        log::info!("Extracting mutation depths from {} coverage files", jobs.len());
        let band = self.config.extractor.band;
        let matrix = assemble(target_list.labels(), &jobs, self.config.threads, |path| {
            CoverageFile::open(path, format)?.extract(&targets, band)
        })?;

        log::info!("Writing mutation coverage matrix to: {}", output.display());
        matrix.write_csv(output, "mut")?;

        Ok(())
    }

    /// Mutation frequency matrix and rolling statistics from a pair of
    /// previously assembled matrices.
    pub fn run_stats(
        &self,
        base_matrix: &PathBuf,
        total_matrix: &PathBuf,
        frequencies: &PathBuf,
        output: &PathBuf,
        table: bool,
    ) -> Result<(), AmpcovError> {
        log::info!("Reading mutation depth matrices");
        let base = CoverageMatrix::from_csv(base_matrix)?;
        let total = CoverageMatrix::from_csv(total_matrix)?;

        let min_depth = self.config.normalize.min_depth;
        log::info!("Computing mutation frequencies (minimum depth: {})", min_depth);
        let freq = CoverageMatrix::frequencies(&base, &total, min_depth)?;

        log::info!("Writing frequency matrix to: {}", frequencies.display());
        freq.write_csv(frequencies, "mut")?;

        let records = rolling_statistics(&freq)?;
        if table {
            print_statistics(&records);
        }

        log::info!("Writing rolling statistics to: {}", output.display());
        write_statistics(&records, output)?;

        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmpcovConfig {
    pub threads: usize,
    pub extractor: ExtractorConfig,
    pub normalize: NormalizeConfig,
}

impl AmpcovConfig {
    pub fn from_amplicon_args(args: &AmpliconArgs) -> Self {
        Self {
            threads: args.threads,
            extractor: ExtractorConfig { band: args.band },
            normalize: NormalizeConfig::default(),
        }
    }
    pub fn from_matrix_args(args: &MatrixArgs) -> Self {
        Self {
            threads: args.threads,
            extractor: ExtractorConfig::default(),
            normalize: NormalizeConfig::default(),
        }
    }
    pub fn from_stats_args(args: &StatsArgs) -> Self {
        Self {
            normalize: NormalizeConfig {
                min_depth: args.min_depth,
            },
            ..Default::default()
        }
    }
}

impl Default for AmpcovConfig {
    fn default() -> Self {
        Self {
            threads: 4,
            extractor: ExtractorConfig::default(),
            normalize: NormalizeConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Band length sampled at each window edge
    pub band: usize,
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self { band: EDGE_BAND }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NormalizeConfig {
    /// Total depth below which a cell is treated as missing
    pub min_depth: f64,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self { min_depth: 20.0 }
    }
}
