use chrono::Duration;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use crate::error::AmpcovError;
use crate::matrix::CoverageMatrix;

/// Trailing windows (weeks back from the most recent sample) summarised
/// per mutation.
pub const ROLLING_WINDOW_WEEKS: [i64; 4] = [2, 6, 12, 24];

pub fn display_option_f64(opt: &Option<f64>) -> String {
    match opt {
        Some(value) => format!("{:.3}", value),
        None => String::new(),
    }
}

/// One long-format statistic record: a mutation, a trailing window and
/// one summary value over the samples falling into that window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Tabled)]
pub struct StatRecord {
    #[tabled(rename = "Mutation")]
    pub mutation: String,
    #[tabled(rename = "Window")]
    pub time: String,
    #[tabled(rename = "Statistic")]
    pub statistic: String,
    #[tabled(rename = "Value")]
    #[tabled(display_with = "display_option_f64")]
    pub value: Option<f64>,
}

/// Rolling median/IQR summaries per matrix row.
///
/// For each row and each trailing window the median, IQR, Q1 and Q3 are
/// computed over the dated columns more recent than the window cutoff,
/// skipping masked cells. Windows without any usable value yield empty
/// records rather than being dropped, so every (mutation, window,
/// statistic) combination is present in the output.
pub fn rolling_statistics(matrix: &CoverageMatrix) -> Result<Vec<StatRecord>, AmpcovError> {
    let most_recent = matrix
        .columns
        .iter()
        .filter_map(|column| column.date)
        .max()
        .ok_or(AmpcovError::EmptyMatrix)?;

    let mut records = Vec::new();
    for (i, mutation) in matrix.row_keys.iter().enumerate() {
        for weeks in ROLLING_WINDOW_WEEKS {
            let cutoff = most_recent - Duration::weeks(weeks);

            let mut values: Vec<f64> = matrix
                .columns
                .iter()
                .filter(|column| column.date.map_or(false, |date| date > cutoff))
                .map(|column| column.values[i])
                .filter(|value| !value.is_nan())
                .collect();
            values.sort_by_key(|value| OrderedFloat(*value));

            let (median, q1, q3) = if values.is_empty() {
                (None, None, None)
            } else {
                (
                    Some(quantile(&values, 0.5)),
                    Some(quantile(&values, 0.25)),
                    Some(quantile(&values, 0.75)),
                )
            };
            let iqr = match (q1, q3) {
                (Some(q1), Some(q3)) => Some(q3 - q1),
                _ => None,
            };

            let time = format!("{weeks}weeks");
            for (statistic, value) in [
                ("Median", median),
                ("IQR", iqr),
                ("Q1", q1),
                ("Q3", q3),
            ] {
                records.push(StatRecord {
                    mutation: mutation.clone(),
                    time: time.clone(),
                    statistic: statistic.to_string(),
                    value: value.map(round3),
                });
            }
        }
    }

    Ok(records)
}

/// Quantile with linear interpolation between closest ranks over a
/// sorted slice.
fn quantile(sorted: &[f64], q: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (n - 1) as f64 * q;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}

fn round3(value: f64) -> f64 {
    (value * 1000.0).round() / 1000.0
}

pub fn write_statistics(records: &[StatRecord], path: &std::path::PathBuf) -> Result<(), AmpcovError> {
    let mut writer = csv::WriterBuilder::new().from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn print_statistics(records: &[StatRecord]) {
    let mut table = Table::new(records);
    table.with(Style::modern());
    eprintln!("{}", table);
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::matrix::SampleColumn;
    use chrono::NaiveDate;
    use float_eq::float_eq;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    /// One-row matrix with ten weekly samples holding values 1..=10.
    fn weekly_matrix() -> CoverageMatrix {
        let mut matrix = CoverageMatrix::new(vec!["C23039G".into()]);
        for i in 0..10i64 {
            matrix
                .push(SampleColumn {
                    sample: format!("S{i}"),
                    date: Some(date("2024-01-01") + Duration::weeks(i)),
                    values: vec![(i + 1) as f64],
                })
                .unwrap();
        }
        matrix
    }

    fn value(records: &[StatRecord], time: &str, statistic: &str) -> f64 {
        records
            .iter()
            .find(|r| r.time == time && r.statistic == statistic)
            .unwrap()
            .value
            .unwrap()
    }

    #[test]
    fn two_week_window_uses_last_two_samples() {
        let records = rolling_statistics(&weekly_matrix()).unwrap();

        // Weekly sampling: only the two most recent columns fall after
        // the two week cutoff
        assert!(float_eq!(value(&records, "2weeks", "Median"), 9.5, abs <= 1e-9));
        assert!(float_eq!(value(&records, "2weeks", "Q1"), 9.25, abs <= 1e-9));
        assert!(float_eq!(value(&records, "2weeks", "Q3"), 9.75, abs <= 1e-9));
        assert!(float_eq!(value(&records, "2weeks", "IQR"), 0.5, abs <= 1e-9));
    }

    #[test]
    fn twenty_four_week_window_spans_all_samples() {
        let records = rolling_statistics(&weekly_matrix()).unwrap();

        assert!(float_eq!(value(&records, "24weeks", "Median"), 5.5, abs <= 1e-9));
        assert!(float_eq!(value(&records, "24weeks", "Q1"), 3.25, abs <= 1e-9));
        assert!(float_eq!(value(&records, "24weeks", "Q3"), 7.75, abs <= 1e-9));
        assert!(float_eq!(value(&records, "24weeks", "IQR"), 4.5, abs <= 1e-9));
    }

    #[test]
    fn record_layout_is_complete_and_ordered() {
        let records = rolling_statistics(&weekly_matrix()).unwrap();

        // 1 mutation x 4 windows x 4 statistics
        assert_eq!(records.len(), 16);
        assert_eq!(
            records[..4]
                .iter()
                .map(|r| r.statistic.as_str())
                .collect::<Vec<_>>(),
            vec!["Median", "IQR", "Q1", "Q3"]
        );
        assert!(records[..4].iter().all(|r| r.time == "2weeks"));
    }

    #[test]
    fn masked_cells_are_skipped() {
        let mut matrix = CoverageMatrix::new(vec!["C23039G".into()]);
        for (i, v) in [1.0, f64::NAN, 3.0].iter().enumerate() {
            matrix
                .push(SampleColumn {
                    sample: format!("S{i}"),
                    date: Some(date("2024-01-01") + Duration::days(i as i64)),
                    values: vec![*v],
                })
                .unwrap();
        }

        let records = rolling_statistics(&matrix).unwrap();
        assert!(float_eq!(value(&records, "2weeks", "Median"), 2.0, abs <= 1e-9));
    }

    #[test]
    fn empty_window_yields_empty_values() {
        let mut matrix = CoverageMatrix::new(vec!["C23039G".into()]);
        matrix
            .push(SampleColumn {
                sample: "S0".into(),
                date: Some(date("2024-01-01")),
                values: vec![f64::NAN],
            })
            .unwrap();

        let records = rolling_statistics(&matrix).unwrap();
        assert_eq!(records.len(), 16);
        assert!(records.iter().all(|r| r.value.is_none()));
    }

    #[test]
    fn undated_matrix_fails() {
        let mut matrix = CoverageMatrix::new(vec!["C23039G".into()]);
        matrix
            .push(SampleColumn {
                sample: "S0".into(),
                date: None,
                values: vec![1.0],
            })
            .unwrap();

        assert!(matches!(
            rolling_statistics(&matrix),
            Err(AmpcovError::EmptyMatrix)
        ));
    }
}
