use std::collections::HashMap;
use std::fmt;
use std::io::BufRead;
use std::path::{Path, PathBuf};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::error::AmpcovError;
use crate::utils::{file_name_string, get_table_reader};

/// Band length (bases) sampled at each edge of an amplicon query window.
pub const EDGE_BAND: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Nucleotide {
    A,
    C,
    G,
    T,
}

impl Nucleotide {
    pub fn from_code(code: &str) -> Result<Self, AmpcovError> {
        match code {
            "A" => Ok(Self::A),
            "C" => Ok(Self::C),
            "G" => Ok(Self::G),
            "T" => Ok(Self::T),
            _ => Err(AmpcovError::NucleotideInvalid(code.to_string())),
        }
    }
}

impl fmt::Display for Nucleotide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => write!(f, "A"),
            Self::C => write!(f, "C"),
            Self::G => write!(f, "G"),
            Self::T => write!(f, "T"),
        }
    }
}

/// A single extraction target against a per-sample coverage table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TargetKey {
    /// Total read depth at a genome position
    Position(u64),
    /// Read depth of one nucleotide at a genome position
    Substitution { pos: u64, nt: Nucleotide },
    /// Median depth over the edges of an amplicon query window
    Window { start: u64, end: u64 },
}

/// On-disk layout of a per-sample coverage table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverageFormat {
    /// `ref  pos  depth` rows (coverage.tsv.gz)
    TotalDepth,
    /// `ref  pos  A  C  G  T [-]` rows (basecnt.tsv.gz)
    BaseCount,
}

impl CoverageFormat {
    pub fn filename(&self) -> &'static str {
        match self {
            Self::TotalDepth => "coverage.tsv.gz",
            Self::BaseCount => "basecnt.tsv.gz",
        }
    }
}

/// Parsed per-sample coverage table in one of the two supported formats.
///
/// The assembler stays format-agnostic: both variants answer the same
/// extraction contract, one value per target key in input order.
#[derive(Debug, Clone)]
pub enum CoverageFile {
    Total(TotalCoverage),
    BaseCount(BaseCountCoverage),
}

impl CoverageFile {
    pub fn open(path: &Path, format: CoverageFormat) -> Result<Self, AmpcovError> {
        let reader = get_table_reader(path)?;
        match format {
            CoverageFormat::TotalDepth => Ok(Self::Total(TotalCoverage::from_reader(reader)?)),
            CoverageFormat::BaseCount => {
                Ok(Self::BaseCount(BaseCountCoverage::from_reader(reader)?))
            }
        }
    }

    /// Extract one depth value per target key, in the order the keys
    /// were supplied. Requested positions absent from the table are an
    /// error, never a default.
    pub fn extract(&self, targets: &[TargetKey], band: usize) -> Result<Vec<f64>, AmpcovError> {
        targets
            .iter()
            .map(|target| match (self, target) {
                (Self::Total(table), TargetKey::Position(pos)) => {
                    table.depth_at(*pos).map(|depth| depth as f64)
                }
                (Self::Total(table), TargetKey::Window { start, end }) => {
                    table.window_median(*start, *end, band)
                }
                (Self::Total(_), TargetKey::Substitution { pos, nt }) => {
                    Err(AmpcovError::SubstitutionUnsupported(*pos, *nt))
                }
                (Self::BaseCount(table), TargetKey::Substitution { pos, nt }) => {
                    table.count_at(*pos, *nt).map(|depth| depth as f64)
                }
                (Self::BaseCount(_), TargetKey::Position(pos)) => {
                    Err(AmpcovError::PositionUnsupported(*pos))
                }
                (Self::BaseCount(_), TargetKey::Window { .. }) => {
                    Err(AmpcovError::WindowUnsupported)
                }
            })
            .collect()
    }
}

/// Total read depth per genome position.
#[derive(Debug, Clone)]
pub struct TotalCoverage {
    /// Depths in table row order, for offset-based window sampling
    depths: Vec<u64>,
    /// Genome position to row depth, for keyed lookups
    index: HashMap<u64, u64>,
}

impl TotalCoverage {
    /// Parse `ref  pos  depth` rows. Leading rows whose position field is
    /// not an integer (header lines) are skipped.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, AmpcovError> {
        let mut depths = Vec::new();
        let mut index = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            let mut fields = line.split('\t');
            let pos = match fields.nth(1).map(|field| field.trim().parse::<u64>()) {
                Some(Ok(pos)) => pos,
                _ => continue,
            };
            let depth = match fields.next() {
                Some(field) => field.trim().parse::<u64>()?,
                None => continue,
            };
            depths.push(depth);
            index.insert(pos, depth);
        }

        Ok(Self { depths, index })
    }

    pub fn depth_at(&self, pos: u64) -> Result<u64, AmpcovError> {
        self.index
            .get(&pos)
            .copied()
            .ok_or(AmpcovError::PositionNotFound(pos))
    }

    /// Median depth over the edges of a query window.
    ///
    /// Samples the first `band` and the last `band` row offsets of the
    /// window instead of reading it whole; for windows narrower than twice
    /// the band the two slices overlap and values are counted twice, which
    /// biases the median upward (accepted approximation).
    pub fn window_median(&self, start: u64, end: u64, band: usize) -> Result<f64, AmpcovError> {
        let n = self.depths.len();
        let lead_start = (start as usize).min(n);
        let lead_end = (start as usize + band).min(n);
        let tail_end = (end as usize).min(n);
        let tail_start = (end as usize).saturating_sub(band).min(n);

        let mut values: Vec<f64> = self.depths[lead_start..lead_end]
            .iter()
            .chain(self.depths[tail_start..tail_end].iter())
            .map(|depth| *depth as f64)
            .collect();

        if values.is_empty() {
            return Err(AmpcovError::EmptyWindow(start, end));
        }

        Ok(median(&mut values))
    }
}

/// Read depth per genome position and nucleotide.
#[derive(Debug, Clone)]
pub struct BaseCountCoverage {
    index: HashMap<u64, [u64; 4]>,
}

impl BaseCountCoverage {
    /// Parse `ref  pos  A  C  G  T [-]` rows. Leading rows whose position
    /// field is not an integer (the stacked header lines) are skipped, as
    /// is any trailing deletion column.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self, AmpcovError> {
        let mut index = HashMap::new();

        for line in reader.lines() {
            let line = line?;
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 6 {
                continue;
            }
            let pos = match fields[1].trim().parse::<u64>() {
                Ok(pos) => pos,
                Err(_) => continue,
            };
            let mut counts = [0u64; 4];
            for (slot, field) in counts.iter_mut().zip(&fields[2..6]) {
                *slot = field.trim().parse::<u64>()?;
            }
            index.insert(pos, counts);
        }

        Ok(Self { index })
    }

    pub fn count_at(&self, pos: u64, nt: Nucleotide) -> Result<u64, AmpcovError> {
        self.index
            .get(&pos)
            .map(|counts| counts[nt as usize])
            .ok_or(AmpcovError::PositionNotFound(pos))
    }
}

/// Median with the usual midpoint convention for even sample sizes.
pub fn median(values: &mut [f64]) -> f64 {
    values.sort_by_key(|value| OrderedFloat(*value));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        (values[n / 2 - 1] + values[n / 2]) / 2.0
    }
}

/// Locate per-sample coverage tables below a results directory laid out as
/// `{dir}/{sample}/{batch}/alignments/{filename}`, keyed by sample name.
///
/// Results are sorted by path so that discovery order is stable across
/// filesystems.
pub fn discover_coverage_files(
    dir: &Path,
    format: CoverageFormat,
) -> Result<Vec<(String, PathBuf)>, AmpcovError> {
    let mut found = Vec::new();

    for sample_entry in std::fs::read_dir(dir)? {
        let sample_dir = sample_entry?.path();
        if !sample_dir.is_dir() {
            continue;
        }
        let sample = file_name_string(&sample_dir)?;

        for batch_entry in std::fs::read_dir(&sample_dir)? {
            let batch_dir = batch_entry?.path();
            if !batch_dir.is_dir() {
                continue;
            }
            let path = batch_dir.join("alignments").join(format.filename());
            if path.is_file() {
                found.push((sample.clone(), path));
            }
        }
    }

    found.sort();
    Ok(found)
}

#[cfg(test)]
mod tests {

    use super::*;
    use float_eq::float_eq;
    use std::io::BufReader;

    /// Total depth table over 100 positions with depth == position.
    fn total_table() -> String {
        let mut table = String::from("ref\tpos\tA1_2024_03_04/20240305_HXJ2MDRX5\n");
        for pos in 1..=100u64 {
            table.push_str(&format!("NC_045512.2\t{pos}\t{pos}\n"));
        }
        table
    }

    /// Base count table with the stacked three-line header.
    fn basecnt_table() -> String {
        let mut table = String::from(
            "sample\t\tA1\tA1\tA1\tA1\tA1\n\
             nt\t\tA\tC\tG\tT\t-\n\
             ref\tpos\t\t\t\t\t\n",
        );
        for pos in 1..=50u64 {
            table.push_str(&format!("NC_045512.2\t{pos}\t{}\t{}\t{}\t{}\t0\n", pos, 2 * pos, 3 * pos, 4 * pos));
        }
        table
    }

    fn total_coverage() -> TotalCoverage {
        TotalCoverage::from_reader(BufReader::new(total_table().as_bytes())).unwrap()
    }

    fn basecnt_coverage() -> BaseCountCoverage {
        BaseCountCoverage::from_reader(BufReader::new(basecnt_table().as_bytes())).unwrap()
    }

    #[test]
    fn total_depth_at_position() {
        let coverage = total_coverage();
        assert_eq!(coverage.depth_at(1).unwrap(), 1);
        assert_eq!(coverage.depth_at(73).unwrap(), 73);
    }

    #[test]
    fn total_missing_position_fails() {
        let coverage = total_coverage();
        assert!(matches!(
            coverage.depth_at(2000),
            Err(AmpcovError::PositionNotFound(2000))
        ));
    }

    #[test]
    fn window_median_samples_both_edges() {
        let coverage = total_coverage();
        // Offsets 10..30 hold depths 11..=30, offsets 30..50 hold 31..=50
        let value = coverage.window_median(10, 50, 20).unwrap();
        assert!(float_eq!(value, 30.5, abs <= 1e-9));
    }

    #[test]
    fn window_median_narrow_window_overlaps() {
        let coverage = total_coverage();
        // Window narrower than twice the band: slices overlap, still Ok
        let value = coverage.window_median(40, 60, 20).unwrap();
        assert!(float_eq!(value, 50.5, abs <= 1e-9));
    }

    #[test]
    fn window_beyond_table_fails() {
        let coverage = total_coverage();
        assert!(matches!(
            coverage.window_median(500, 600, 20),
            Err(AmpcovError::EmptyWindow(500, 600))
        ));
    }

    #[test]
    fn basecnt_count_at_position_and_nucleotide() {
        let coverage = basecnt_coverage();
        assert_eq!(coverage.count_at(10, Nucleotide::A).unwrap(), 10);
        assert_eq!(coverage.count_at(10, Nucleotide::C).unwrap(), 20);
        assert_eq!(coverage.count_at(10, Nucleotide::G).unwrap(), 30);
        assert_eq!(coverage.count_at(10, Nucleotide::T).unwrap(), 40);
    }

    #[test]
    fn extraction_preserves_target_order_and_is_deterministic() {
        let file = CoverageFile::Total(total_coverage());
        let targets = vec![
            TargetKey::Position(30),
            TargetKey::Position(10),
            TargetKey::Position(99),
        ];

        let first = file.extract(&targets, EDGE_BAND).unwrap();
        let second = file.extract(&targets, EDGE_BAND).unwrap();

        assert_eq!(first, vec![30.0, 10.0, 99.0]);
        assert_eq!(first, second);
    }

    #[test]
    fn extraction_rejects_mismatched_target_kind() {
        let file = CoverageFile::Total(total_coverage());
        let result = file.extract(
            &[TargetKey::Substitution { pos: 10, nt: Nucleotide::A }],
            EDGE_BAND,
        );
        assert!(matches!(
            result,
            Err(AmpcovError::SubstitutionUnsupported(10, Nucleotide::A))
        ));
    }

    #[test]
    fn median_midpoint_convention() {
        let mut odd = vec![3.0, 1.0, 2.0];
        let mut even = vec![4.0, 1.0, 3.0, 2.0];
        assert!(float_eq!(median(&mut odd), 2.0, abs <= 1e-9));
        assert!(float_eq!(median(&mut even), 2.5, abs <= 1e-9));
    }
}
