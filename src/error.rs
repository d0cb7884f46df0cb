use thiserror::Error;

/// Failure to turn one file into a usable slice. Recoverable: the file is dropped.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ParseError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Missing required field: {0}")]
    MissingRequiredField(&'static str),
}

/// A source that could not be ingested, reported next to the built volume.
#[derive(Debug, Clone, PartialEq)]
pub struct SliceFailure {
    pub name: String,
    pub error: ParseError,
}

#[derive(Debug, Error)]
pub enum VolumeLoaderError {
    #[error("No slices: {} source(s) could not be ingested", failures.len())]
    NoSlices { failures: Vec<SliceFailure> },

    #[error(
        "Inconsistent series: {file} is {}x{} but expected {}x{}",
        actual.0, actual.1, expected.0, expected.1
    )]
    InconsistentSeries {
        file: String,
        /// (columns, rows) shared by most slices.
        expected: (usize, usize),
        /// (columns, rows) of the offending slice.
        actual: (usize, usize),
    },

    #[error(
        "Inconsistent series: {file} has pixel spacing {}x{} but expected {}x{}",
        actual.0, actual.1, expected.0, expected.1
    )]
    InconsistentSpacing {
        file: String,
        /// (x, y) spacing of the first sorted slice.
        expected: (f64, f64),
        actual: (f64, f64),
    },

    #[error(
        "Slice positions are not strictly monotonic: {first} at {first_offset} mm and {second} at {second_offset} mm along the stacking axis"
    )]
    PositionConflict {
        first: String,
        second: String,
        first_offset: f64,
        second_offset: f64,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Loader task failed: {0}")]
    Task(String),
}
