use thiserror::Error;

use crate::coverage::Nucleotide;

#[derive(Error, Debug)]
pub enum AmpcovError {
    /// Represents all other cases of `csv::Error`.
    #[error(transparent)]
    CsvError(#[from] csv::Error),
    /// Represents all other cases of `std::io::Error`.
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    /// Represents all other cases of `niffler::Error`.
    #[error(transparent)]
    NifflerError(#[from] niffler::Error),
    /// Represents all other cases of `regex::Error`.
    #[error(transparent)]
    RegexError(#[from] regex::Error),
    /// Indicates failure to parse an integer field from a table
    #[error("failed to parse a valid integer from record")]
    IntError(#[from] std::num::ParseIntError),
    /// Indicates failure to parse a float field from a table
    #[error("failed to parse a valid float from record")]
    FloatError(#[from] std::num::ParseFloatError),
    /// Indicates failure to parse a sample collection date
    #[error("failed to parse a valid date from record")]
    DateError(#[from] chrono::ParseError),
    #[error("Failed to convert OsString to String")]
    FileNameConversionError,
    /// Indicates a primer name without a LEFT or RIGHT sense marker
    #[error("no LEFT or RIGHT sense marker in primer name: {0}")]
    PrimerSense(String),
    /// Indicates a primer name without an underscore-delimited number
    #[error("no primer number in primer name: {0}")]
    PrimerNumber(String),
    /// Indicates a primer pool field without a trailing pool digit
    #[error("no pool digit (1|2) in primer pool field: {0}")]
    PrimerPool(String),
    /// Indicates a primer record with too few columns to parse
    #[error("primer scheme record has too few columns (expected at least {0})")]
    PrimerRecordSize(usize),
    /// Indicates a primer number with only a LEFT or only a RIGHT record
    #[error("primer {0} is missing its LEFT or RIGHT partner")]
    IncompleteAmplicon(u32),
    /// Indicates a primer scheme from which no amplicon could be built
    #[error("no amplicons could be derived from the primer scheme")]
    EmptyScheme,
    /// Indicates a requested genome position absent from a coverage file
    #[error("position {0} not found in coverage file")]
    PositionNotFound(u64),
    /// Indicates an amplicon window outside the span of a coverage file
    #[error("window {0}-{1} sampled no positions from coverage file")]
    EmptyWindow(u64, u64),
    /// Indicates a nucleotide query against a total depth file
    #[error("base counts for {1} at position {0} requested from a total depth file")]
    SubstitutionUnsupported(u64, Nucleotide),
    /// Indicates a window summary query against a base count file
    #[error("window summaries requested from a base count file")]
    WindowUnsupported,
    /// Indicates a total depth query against a base count file
    #[error("total depth at position {0} requested from a base count file")]
    PositionUnsupported(u64),
    /// Indicates a value vector that does not match the matrix row keys
    #[error("matrix row count mismatch: expected {expected}, found {found}")]
    Shape { expected: usize, found: usize },
    /// Indicates a target label without a parsable position pattern
    #[error("no position pattern in target label: {0}")]
    TargetPattern(String),
    /// Indicates an unrecognized nucleotide code in a target label
    #[error("unrecognized nucleotide code: {0}")]
    NucleotideInvalid(String),
    /// Indicates a sample metadata table missing a required column
    #[error("required column '{0}' missing from table header")]
    TimelineColumnMissing(String),
    /// Indicates a sample sheet record with too few columns
    #[error("sample sheet record has too few columns (expected sample and batch)")]
    SampleSheetRecordSize,
    /// Indicates a matrix without dated columns in the statistics engine
    #[error("matrix has no dated columns to compute rolling statistics over")]
    EmptyMatrix,
    /// Indicates a matrix file without a header row
    #[error("matrix file has no header row: {0}")]
    MatrixHeaderMissing(String),
}
