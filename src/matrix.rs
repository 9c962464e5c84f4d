use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};

use crate::error::AmpcovError;
use crate::utils::get_table_reader;

/// One sample's extracted values, keyed by sample identifier and
/// optionally its collection date.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleColumn {
    pub sample: String,
    pub date: Option<NaiveDate>,
    pub values: Vec<f64>,
}

impl SampleColumn {
    /// Column label for matrix output: the collection date when the
    /// column is dated, the sample identifier otherwise.
    pub fn label(&self) -> String {
        match self.date {
            Some(date) => date.format("%Y-%m-%d").to_string(),
            None => self.sample.clone(),
        }
    }
}

/// A numeric matrix of rows (target keys) by samples.
///
/// Row order is the caller's target list verbatim and is never re-sorted;
/// column order is ascending date after [`CoverageMatrix::sort_columns_by_date`],
/// with encounter order breaking ties. Samples without data are absent
/// columns, never zero-filled.
#[derive(Debug, Clone)]
pub struct CoverageMatrix {
    pub row_keys: Vec<String>,
    pub columns: Vec<SampleColumn>,
}

impl CoverageMatrix {
    pub fn new(row_keys: Vec<String>) -> Self {
        Self {
            row_keys,
            columns: Vec::new(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.row_keys.len()
    }

    pub fn ncols(&self) -> usize {
        self.columns.len()
    }

    /// Append one sample column. A value vector that does not match the
    /// row keys is an upstream contract violation and fatal.
    pub fn push(&mut self, column: SampleColumn) -> Result<(), AmpcovError> {
        if column.values.len() != self.row_keys.len() {
            return Err(AmpcovError::Shape {
                expected: self.row_keys.len(),
                found: column.values.len(),
            });
        }
        self.columns.push(column);
        Ok(())
    }

    /// Stable sort of columns by ascending date; undated columns keep
    /// their encounter order.
    pub fn sort_columns_by_date(&mut self) {
        self.columns.sort_by_key(|column| column.date);
    }

    /// Fraction-of-reads matrix: each column divided by its total over
    /// all rows, skipping masked (NaN) cells in the total.
    pub fn normalized(&self) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| {
                let total: f64 = column.values.iter().filter(|v| !v.is_nan()).sum();
                SampleColumn {
                    sample: column.sample.clone(),
                    date: column.date,
                    values: column.values.iter().map(|v| v / total).collect(),
                }
            })
            .collect();

        Self {
            row_keys: self.row_keys.clone(),
            columns,
        }
    }

    /// Copy of the matrix with cells below `threshold` set to NaN.
    pub fn masked_below(&self, threshold: f64) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|column| SampleColumn {
                sample: column.sample.clone(),
                date: column.date,
                values: column
                    .values
                    .iter()
                    .map(|v| if *v < threshold { f64::NAN } else { *v })
                    .collect(),
            })
            .collect();

        Self {
            row_keys: self.row_keys.clone(),
            columns,
        }
    }

    /// Mutation frequency matrix: base counts divided by total depths,
    /// cell by cell, with total depths below `min_depth` masked to NaN
    /// first so that low coverage positions do not produce noise
    /// frequencies.
    pub fn frequencies(
        base: &CoverageMatrix,
        total: &CoverageMatrix,
        min_depth: f64,
    ) -> Result<Self, AmpcovError> {
        if base.nrows() != total.nrows() {
            return Err(AmpcovError::Shape {
                expected: base.nrows(),
                found: total.nrows(),
            });
        }
        if base.ncols() != total.ncols() {
            return Err(AmpcovError::Shape {
                expected: base.ncols(),
                found: total.ncols(),
            });
        }

        let masked = total.masked_below(min_depth);
        let columns = base
            .columns
            .iter()
            .zip(&masked.columns)
            .map(|(base_col, total_col)| SampleColumn {
                sample: base_col.sample.clone(),
                date: base_col.date,
                values: base_col
                    .values
                    .iter()
                    .zip(&total_col.values)
                    .map(|(base, total)| base / total)
                    .collect(),
            })
            .collect();

        Ok(Self {
            row_keys: base.row_keys.clone(),
            columns,
        })
    }

    /// Write the matrix as CSV with the row keys in a leading column and
    /// one column per sample. Masked cells are written empty.
    pub fn write_csv(&self, path: &PathBuf, row_key_header: &str) -> Result<(), AmpcovError> {
        let mut writer = csv::WriterBuilder::new().from_path(path)?;

        let mut header = vec![row_key_header.to_string()];
        header.extend(self.columns.iter().map(|column| column.label()));
        writer.write_record(&header)?;

        for (i, row_key) in self.row_keys.iter().enumerate() {
            let mut record = vec![row_key.clone()];
            for column in &self.columns {
                let value = column.values[i];
                record.push(if value.is_nan() {
                    String::new()
                } else {
                    value.to_string()
                });
            }
            writer.write_record(&record)?;
        }
        writer.flush()?;

        Ok(())
    }

    /// Reload a matrix written by [`CoverageMatrix::write_csv`]. Column
    /// labels that parse as ISO dates become dated columns; empty cells
    /// become NaN.
    pub fn from_csv(path: &PathBuf) -> Result<Self, AmpcovError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(get_table_reader(path)?);

        let headers = reader.headers()?.clone();
        if headers.is_empty() {
            return Err(AmpcovError::MatrixHeaderMissing(format!(
                "{}",
                path.display()
            )));
        }

        let mut columns: Vec<SampleColumn> = headers
            .iter()
            .skip(1)
            .map(|label| SampleColumn {
                sample: label.to_string(),
                date: NaiveDate::parse_from_str(label, "%Y-%m-%d").ok(),
                values: Vec::new(),
            })
            .collect();

        let mut row_keys = Vec::new();
        for row in reader.records() {
            let row = row?;
            row_keys.push(row[0].to_string());
            for (column, field) in columns.iter_mut().zip(row.iter().skip(1)) {
                let value = match field.trim() {
                    "" => f64::NAN,
                    field => field.parse::<f64>()?,
                };
                column.values.push(value);
            }
        }

        Ok(Self { row_keys, columns })
    }
}

/// One unit of per-sample extraction work for the assembler.
#[derive(Debug, Clone)]
pub struct ColumnJob {
    pub sample: String,
    pub date: Option<NaiveDate>,
    pub path: PathBuf,
}

/// Fan-out per-sample extraction over a thread pool and fan the results
/// into one matrix.
///
/// Extraction failures (missing file, malformed table, absent position)
/// are local to one sample: the column is skipped with a warning and the
/// batch continues. Shape mismatches are fatal. Columns end up sorted by
/// ascending date, ties keeping encounter order.
pub fn assemble<F>(
    row_keys: Vec<String>,
    jobs: &[ColumnJob],
    threads: usize,
    extract: F,
) -> Result<CoverageMatrix, AmpcovError>
where
    F: Fn(&Path) -> Result<Vec<f64>, AmpcovError> + Sync,
{
    let extracted: Vec<Option<SampleColumn>> = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .expect("Failed to create thread pool")
        .install(|| {
            jobs.par_iter()
                .map(|job| match extract(&job.path) {
                    Ok(values) => Some(SampleColumn {
                        sample: job.sample.clone(),
                        date: job.date,
                        values,
                    }),
                    Err(err) => {
                        log::warn!("Skipping sample {}: {}", job.sample, err);
                        None
                    }
                })
                .collect()
        });

    let mut matrix = CoverageMatrix::new(row_keys);
    let mut skipped = 0;
    for column in extracted {
        match column {
            Some(column) => matrix.push(column)?,
            None => skipped += 1,
        }
    }
    matrix.sort_columns_by_date();

    log::info!(
        "Assembled coverage matrix from {} samples ({} skipped)",
        matrix.ncols(),
        skipped
    );

    Ok(matrix)
}

#[cfg(test)]
mod tests {

    use super::*;
    use float_eq::float_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn column(sample: &str, day: &str, values: Vec<f64>) -> SampleColumn {
        SampleColumn {
            sample: sample.to_string(),
            date: Some(date(day)),
            values,
        }
    }

    #[test]
    fn push_rejects_shape_mismatch() {
        let mut matrix = CoverageMatrix::new(vec!["a".into(), "b".into()]);
        let result = matrix.push(column("S1", "2024-03-04", vec![1.0]));
        assert!(matches!(
            result,
            Err(AmpcovError::Shape { expected: 2, found: 1 })
        ));
    }

    #[test]
    fn columns_sort_by_date_with_stable_ties() {
        let mut matrix = CoverageMatrix::new(vec!["a".into()]);
        matrix.push(column("S2", "2024-03-11", vec![2.0])).unwrap();
        matrix.push(column("S1", "2024-03-04", vec![1.0])).unwrap();
        matrix.push(column("S3", "2024-03-11", vec![3.0])).unwrap();
        matrix.sort_columns_by_date();

        assert_eq!(
            matrix.columns.iter().map(|c| c.sample.as_str()).collect::<Vec<_>>(),
            vec!["S1", "S2", "S3"]
        );
    }

    #[test]
    fn normalized_fractions_sum_to_one() {
        let mut matrix = CoverageMatrix::new(vec!["1".into(), "2".into(), "3".into()]);
        matrix.push(column("S1", "2024-03-04", vec![40.0, 25.0, 60.0])).unwrap();
        let fractions = matrix.normalized();

        let sum: f64 = fractions.columns[0].values.iter().sum();
        assert!(float_eq!(sum, 1.0, abs <= 1e-9));
        assert!(float_eq!(fractions.columns[0].values[0], 0.32, abs <= 1e-9));
    }

    #[test]
    fn masked_normalization_excludes_low_cells() {
        let mut matrix = CoverageMatrix::new(vec!["1".into(), "2".into(), "3".into()]);
        matrix.push(column("S1", "2024-03-04", vec![40.0, 0.0, 60.0])).unwrap();

        let fractions = matrix.masked_below(20.0).normalized();
        let values = &fractions.columns[0].values;

        assert!(float_eq!(values[0], 0.4, abs <= 1e-9));
        assert!(values[1].is_nan());
        assert!(float_eq!(values[2], 0.6, abs <= 1e-9));
    }

    #[test]
    fn frequencies_mask_low_total_depth() {
        let mut base = CoverageMatrix::new(vec!["C23039G".into(), "G22599C".into()]);
        base.push(column("S1", "2024-03-04", vec![30.0, 5.0])).unwrap();

        let mut total = CoverageMatrix::new(vec!["C23039G".into(), "G22599C".into()]);
        total.push(column("S1", "2024-03-04", vec![60.0, 10.0])).unwrap();

        let freq = CoverageMatrix::frequencies(&base, &total, 20.0).unwrap();
        let values = &freq.columns[0].values;

        assert!(float_eq!(values[0], 0.5, abs <= 1e-9));
        assert!(values[1].is_nan());
    }

    #[test]
    fn frequencies_reject_shape_mismatch() {
        let base = CoverageMatrix::new(vec!["a".into()]);
        let total = CoverageMatrix::new(vec!["a".into(), "b".into()]);
        assert!(matches!(
            CoverageMatrix::frequencies(&base, &total, 20.0),
            Err(AmpcovError::Shape { .. })
        ));
    }

    #[test]
    fn assembler_skips_failing_samples() {
        let jobs: Vec<ColumnJob> = (0..10)
            .map(|i| ColumnJob {
                sample: format!("S{i}"),
                date: Some(date("2024-03-04") + chrono::Duration::days(i)),
                path: PathBuf::from(format!("S{i}.tsv.gz")),
            })
            .collect();

        // Two samples fail extraction, the batch must not abort
        let matrix = assemble(vec!["a".into()], &jobs, 2, |path| {
            let name = path.to_string_lossy();
            if name.starts_with("S3") || name.starts_with("S7") {
                Err(AmpcovError::PositionNotFound(42))
            } else {
                Ok(vec![1.0])
            }
        })
        .unwrap();

        assert_eq!(matrix.ncols(), 8);
        assert!(!matrix.columns.iter().any(|c| c.sample == "S3"));
    }

    #[test]
    fn csv_roundtrip_preserves_shape_and_masking() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("matrix.csv");

        let mut matrix = CoverageMatrix::new(vec!["C23039G".into(), "G22599C".into()]);
        matrix.push(column("S1", "2024-03-04", vec![1.0, f64::NAN])).unwrap();
        matrix.push(column("S2", "2024-03-11", vec![3.0, 4.0])).unwrap();
        matrix.write_csv(&path, "mut").unwrap();

        let reloaded = CoverageMatrix::from_csv(&path).unwrap();
        assert_eq!(reloaded.row_keys, matrix.row_keys);
        assert_eq!(reloaded.ncols(), 2);
        assert_eq!(reloaded.columns[0].date, Some(date("2024-03-04")));
        assert!(reloaded.columns[0].values[1].is_nan());
        assert!(float_eq!(reloaded.columns[1].values[1], 4.0, abs <= 1e-9));
    }
}
