use std::collections::BTreeMap;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::AmpcovError;
use crate::utils::get_table_reader;

/// Safety buffer (bases) trimmed next to neighbouring primers when
/// deriving amplicon query windows.
pub const QUERY_MARGIN: u64 = 5;

/// Orientation of a primer on the reference genome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PrimerSense {
    Left,
    Right,
}

impl fmt::Display for PrimerSense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrimerSense::Left => write!(f, "LEFT"),
            PrimerSense::Right => write!(f, "RIGHT"),
        }
    }
}

/// A single primer record parsed from a scheme table in BED layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PrimerRecord {
    pub chrom: String,
    pub start: u64,
    pub end: u64,
    pub name: String,
    pub pool_raw: String,
    pub sense: PrimerSense,
    pub primer_num: u32,
    pub pool: u8,
}

/// An amplicon assembled from a LEFT/RIGHT primer pair, with the
/// primer-free query window derived from its neighbours.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Amplicon {
    pub primer_num: u32,
    pub pool: u8,
    pub primer_start: u64,
    pub seq_start: u64,
    pub seq_end: u64,
    pub primer_end: u64,
    pub query_start: u64,
    pub query_end: u64,
}

/// A parsed primer scheme with alternate primers removed.
#[derive(Debug, Clone)]
pub struct PrimerScheme {
    pub records: Vec<PrimerRecord>,
}

impl PrimerScheme {
    /// Parse a primer scheme table (tab-separated, no header, BED layout:
    /// chrom, start, end, name, pool indicator).
    pub fn from_bed(path: &PathBuf) -> Result<Self, AmpcovError> {
        Self::from_reader(get_table_reader(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AmpcovError> {
        let sense_re = Regex::new(r"(LEFT|RIGHT)")?;
        let num_re = Regex::new(r"_([0-9]+)_")?;
        let pool_re = Regex::new(r"([1-2])$")?;

        let mut table = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut records = Vec::new();
        for row in table.records() {
            let row = row?;
            if row.len() < 4 {
                return Err(AmpcovError::PrimerRecordSize(4));
            }

            let name = row[3].to_string();

            // Alternate primers are not used for windowing
            if name.contains("alt") {
                continue;
            }

            let sense = match sense_re.find(&name) {
                Some(m) => match m.as_str() {
                    "LEFT" => PrimerSense::Left,
                    _ => PrimerSense::Right,
                },
                None => return Err(AmpcovError::PrimerSense(name)),
            };

            let primer_num = match num_re.captures(&name) {
                Some(caps) => caps[1].parse::<u32>()?,
                None => return Err(AmpcovError::PrimerNumber(name)),
            };

            let pool_raw = match row.get(4) {
                Some(field) => field.to_string(),
                None => String::new(),
            };
            let pool = match pool_re.captures(&pool_raw) {
                Some(caps) => caps[1].parse::<u8>()?,
                None => return Err(AmpcovError::PrimerPool(pool_raw)),
            };

            records.push(PrimerRecord {
                chrom: row[0].to_string(),
                start: row[1].trim().parse::<u64>()?,
                end: row[2].trim().parse::<u64>()?,
                name,
                pool_raw,
                sense,
                primer_num,
                pool,
            });
        }

        Ok(Self { records })
    }

    /// Assemble amplicons from LEFT/RIGHT primer pairs and derive their
    /// query windows.
    ///
    /// Windows are returned in ascending primer number order. Each interior
    /// query window starts after the previous amplicon's RIGHT primer and
    /// ends before the next amplicon's LEFT primer, offset by
    /// [`QUERY_MARGIN`]; the first and last amplicons keep their own primer
    /// start and sequence end respectively. The derivation is an indexed
    /// pass over the sorted amplicons, as each window depends on its
    /// neighbours.
    pub fn amplicons(&self) -> Result<Vec<Amplicon>, AmpcovError> {
        let mut pairs: BTreeMap<u32, (Option<&PrimerRecord>, Option<&PrimerRecord>)> =
            BTreeMap::new();

        for record in &self.records {
            let entry = pairs.entry(record.primer_num).or_insert((None, None));
            let slot = match record.sense {
                PrimerSense::Left => &mut entry.0,
                PrimerSense::Right => &mut entry.1,
            };
            // First occurrence wins if a sense appears twice
            if slot.is_none() {
                *slot = Some(record);
            }
        }

        let mut amplicons = Vec::new();
        for (primer_num, (left, right)) in pairs {
            let (left, right) = match (left, right) {
                (Some(left), Some(right)) => (left, right),
                _ => return Err(AmpcovError::IncompleteAmplicon(primer_num)),
            };
            amplicons.push(Amplicon {
                primer_num,
                pool: right.pool, // pool is redundant across the pair
                primer_start: left.start,
                seq_start: left.end,
                seq_end: right.start,
                primer_end: right.end,
                query_start: 0,
                query_end: 0,
            });
        }

        if amplicons.is_empty() {
            return Err(AmpcovError::EmptyScheme);
        }

        let last = amplicons.len() - 1;
        for i in 0..amplicons.len() {
            amplicons[i].query_start = match i {
                0 => amplicons[0].primer_start,
                _ => amplicons[i - 1].primer_end + QUERY_MARGIN,
            };
            amplicons[i].query_end = if i < last {
                amplicons[i + 1].primer_start.saturating_sub(QUERY_MARGIN)
            } else {
                amplicons[i].seq_end
            };
        }

        Ok(amplicons)
    }
}
