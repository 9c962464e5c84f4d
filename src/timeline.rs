use std::io::Read;
use std::path::PathBuf;

use chrono::NaiveDate;

use crate::error::AmpcovError;
use crate::utils::get_table_reader;

/// One sample entry from the metadata (timeline) table.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleRecord {
    pub sample: String,
    pub date: NaiveDate,
    pub location: String,
    pub proto: Option<String>,
}

/// Selection parameters for the sample metadata table.
///
/// Date bounds are strict on both sides: samples dated exactly on
/// `start` or `end` are excluded.
#[derive(Debug, Clone)]
pub struct SelectorConfig {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub location: String,
    pub protocol: Option<String>,
}

/// Sample metadata table, loaded once and filtered read-only.
#[derive(Debug, Clone)]
pub struct Timeline {
    pub samples: Vec<SampleRecord>,
}

impl Timeline {
    /// Parse the sample metadata table (tab-separated, header, UTF-8).
    ///
    /// Required columns: `sample`, `proto`, `date`, `location`. Additional
    /// columns are ignored.
    pub fn from_tsv(path: &PathBuf) -> Result<Self, AmpcovError> {
        Self::from_reader(get_table_reader(path)?)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, AmpcovError> {
        let mut table = csv::ReaderBuilder::new()
            .delimiter(b'\t')
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = table.headers()?.clone();
        let column = |name: &str| -> Result<usize, AmpcovError> {
            headers
                .iter()
                .position(|field| field == name)
                .ok_or_else(|| AmpcovError::TimelineColumnMissing(name.to_string()))
        };

        let sample_col = column("sample")?;
        let proto_col = column("proto")?;
        let date_col = column("date")?;
        let location_col = column("location")?;

        let mut samples = Vec::new();
        for row in table.records() {
            let row = row?;
            let date = NaiveDate::parse_from_str(row[date_col].trim(), "%Y-%m-%d")?;
            let proto = match row[proto_col].trim() {
                "" => None,
                proto => Some(proto.to_string()),
            };
            samples.push(SampleRecord {
                sample: row[sample_col].to_string(),
                date,
                location: row[location_col].to_string(),
                proto,
            });
        }

        Ok(Self { samples })
    }

    /// Select samples by time window, collection site and optionally
    /// protocol, preserving table order.
    ///
    /// Duplicate sample identifiers are kept as independent entries and
    /// become independent matrix columns downstream.
    pub fn select(&self, config: &SelectorConfig) -> Vec<SampleRecord> {
        self.samples
            .iter()
            .filter(|record| {
                record.date > config.start
                    && record.date < config.end
                    && record.location == config.location
            })
            .filter(|record| match &config.protocol {
                Some(protocol) => record.proto.as_deref() == Some(protocol.as_str()),
                None => true,
            })
            .cloned()
            .collect()
    }
}

/// One line of a headerless sample sheet (`sample` and `batch` columns),
/// used to locate per-sample alignment directories for a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleSheetEntry {
    pub sample: String,
    pub batch: String,
}

impl SampleSheetEntry {
    /// Path of this sample's coverage table below the batch directory.
    pub fn coverage_path(&self, dir: &PathBuf, filename: &str) -> PathBuf {
        dir.join(&self.sample)
            .join(&self.batch)
            .join("alignments")
            .join(filename)
    }
}

/// Parse a headerless tab-separated sample sheet into (sample, batch) rows.
pub fn read_sample_sheet(path: &PathBuf) -> Result<Vec<SampleSheetEntry>, AmpcovError> {
    read_sample_sheet_from(get_table_reader(path)?)
}

pub fn read_sample_sheet_from<R: Read>(reader: R) -> Result<Vec<SampleSheetEntry>, AmpcovError> {
    let mut table = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut entries = Vec::new();
    for row in table.records() {
        let row = row?;
        if row.len() < 2 {
            return Err(AmpcovError::SampleSheetRecordSize);
        }
        entries.push(SampleSheetEntry {
            sample: row[0].to_string(),
            batch: row[1].to_string(),
        });
    }

    Ok(entries)
}
