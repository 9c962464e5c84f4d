use std::io::Read;
use std::path::PathBuf;

use indexmap::IndexMap;
use itertools::Itertools;
use regex::Regex;

use crate::coverage::{Nucleotide, TargetKey};
use crate::error::AmpcovError;
use crate::utils::get_table_reader;

/// Target keys parsed from a mutation list, keyed by their verbatim labels.
///
/// Label order is preserved and becomes the matrix row order.
#[derive(Debug, Clone)]
pub struct TargetList {
    pub targets: IndexMap<String, TargetKey>,
}

impl TargetList {
    /// Parse a mutation list (CSV with a `mut` column) into
    /// position + nucleotide keys, e.g. `C23039G` -> (23039, G).
    pub fn substitutions(path: &PathBuf) -> Result<Self, AmpcovError> {
        Self::substitutions_from(get_table_reader(path)?)
    }

    pub fn substitutions_from<R: Read>(reader: R) -> Result<Self, AmpcovError> {
        let pattern = Regex::new(r"(\d+)([A-Z])")?;

        let mut targets = IndexMap::new();
        for label in read_mut_column(reader)? {
            let caps = pattern
                .captures(&label)
                .ok_or_else(|| AmpcovError::TargetPattern(label.clone()))?;
            let pos = caps[1].parse::<u64>()?;
            let nt = Nucleotide::from_code(&caps[2])?;
            targets.insert(label, TargetKey::Substitution { pos, nt });
        }

        Ok(Self { targets })
    }

    /// Parse a mutation list into bare genome positions, ignoring any
    /// nucleotide code in the labels.
    pub fn positions(path: &PathBuf) -> Result<Self, AmpcovError> {
        Self::positions_from(get_table_reader(path)?)
    }

    pub fn positions_from<R: Read>(reader: R) -> Result<Self, AmpcovError> {
        let pattern = Regex::new(r"\d+")?;

        let mut targets = IndexMap::new();
        for label in read_mut_column(reader)? {
            let found = pattern
                .find(&label)
                .ok_or_else(|| AmpcovError::TargetPattern(label.clone()))?;
            let pos = found.as_str().parse::<u64>()?;
            targets.insert(label, TargetKey::Position(pos));
        }

        Ok(Self { targets })
    }

    pub fn labels(&self) -> Vec<String> {
        self.targets.keys().cloned().collect_vec()
    }

    pub fn keys(&self) -> Vec<TargetKey> {
        self.targets.values().cloned().collect_vec()
    }
}

fn read_mut_column<R: Read>(reader: R) -> Result<Vec<String>, AmpcovError> {
    let mut table = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(reader);

    let mut_col = table
        .headers()?
        .iter()
        .position(|field| field == "mut")
        .ok_or_else(|| AmpcovError::TimelineColumnMissing("mut".to_string()))?;

    let mut labels = Vec::new();
    for row in table.records() {
        let row = row?;
        labels.push(row[mut_col].to_string());
    }

    Ok(labels)
}

#[cfg(test)]
mod tests {

    use super::*;

    const TARGETS: &str = "mut,gene\nC23039G,S\nG22599C,S\n";

    #[test]
    fn substitution_targets_parse_position_and_nucleotide() {
        let list = TargetList::substitutions_from(TARGETS.as_bytes()).unwrap();

        assert_eq!(list.labels(), vec!["C23039G", "G22599C"]);
        assert_eq!(
            list.keys(),
            vec![
                TargetKey::Substitution { pos: 23039, nt: Nucleotide::G },
                TargetKey::Substitution { pos: 22599, nt: Nucleotide::C },
            ]
        );
    }

    #[test]
    fn position_targets_ignore_nucleotides() {
        let list = TargetList::positions_from(TARGETS.as_bytes()).unwrap();
        assert_eq!(
            list.keys(),
            vec![TargetKey::Position(23039), TargetKey::Position(22599)]
        );
    }

    #[test]
    fn unparsable_label_fails() {
        let result = TargetList::substitutions_from("mut\ndeletion\n".as_bytes());
        assert!(matches!(
            result,
            Err(AmpcovError::TargetPattern(label)) if label == "deletion"
        ));
    }
}
