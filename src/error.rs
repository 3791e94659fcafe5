//! Error handling.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Enum with all errors in this crate.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GridError {
    /// IO Error that has not been attributed to a file yet.
    #[error(transparent)]
    IOError(#[from] std::io::Error),

    /// IO Error while accessing a specific file.
    #[error("I/O error on {}: {source}", path.display())]
    File {
        /// The file that was being read or written.
        path: PathBuf,
        /// The underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// The header or data of a grid file is structurally invalid.
    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    /// The numeric format id is not registered.
    #[error("Unknown grid format id {0}")]
    UnknownFormat(i32),

    /// The requested window does not intersect the grid.
    #[error("Region {west}/{east}/{south}/{north} does not intersect the grid")]
    EmptyRegion {
        /// West bound of the request.
        west: f64,
        /// East bound of the request.
        east: f64,
        /// South bound of the request.
        south: f64,
        /// North bound of the request.
        north: f64,
    },

    /// Values had to be clamped to fit the storage type.
    #[error("{count} value(s) clamped to the representable range [{min}, {max}]")]
    ValueOutOfRange {
        /// Number of clamped values.
        count: usize,
        /// Lowest storable raw value.
        min: f64,
        /// Highest storable raw value.
        max: f64,
    },

    /// The caller's buffer does not have the shape the region needs.
    #[error("Buffer shape mismatch: expected {expected:?} values, got {actual:?}")]
    BufferShape {
        /// (columns, rows) the region map requires, padding included.
        expected: (usize, usize),
        /// (columns, rows) of the supplied buffer.
        actual: (usize, usize),
    },

    /// A `name=id/scale/offset/nan` file argument could not be parsed.
    #[error("Invalid grid file specification: {0}")]
    InvalidFileSpec(String),
}

impl GridError {
    /// Attach `path` to an I/O error that does not carry one yet.
    pub fn with_path(self, path: &Path) -> Self {
        match self {
            GridError::IOError(source) => GridError::File {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        }
    }
}

/// Structural problems in a grid header or its data records.
#[derive(Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum FormatError {
    /// Magic number or preamble not recognized.
    #[error("unrecognized header: {0}")]
    UnrecognizedHeader(String),

    /// Column or row count is not positive or too large.
    #[error("invalid dimensions {0}x{1}")]
    InvalidDimensions(i64, i64),

    /// Bounds are not finite or not ordered.
    #[error("invalid extent x {0}/{1} y {2}/{3}")]
    InvalidExtent(f64, f64, f64, f64),

    /// Cell size is zero, negative or not a number.
    #[error("non-positive increments x_inc={0} y_inc={1}")]
    NonPositiveIncrement(f64, f64),

    /// Declared count does not match bounds and increment.
    #[error("{axis} dimension {declared} inconsistent with extent and increment (expected {computed})")]
    InconsistentDimensions {
        /// `'x'` or `'y'`.
        axis: char,
        /// Count stored in the header.
        declared: usize,
        /// Count implied by bounds and increment.
        computed: f64,
    },

    /// File size disagrees with the number of records the header declares.
    #[error("file holds {actual} bytes but header declares {expected}")]
    RecordCountMismatch {
        /// Bytes implied by the header.
        expected: u64,
        /// Bytes in the file.
        actual: u64,
    },

    /// The data section ends before the last declared row.
    #[error("data truncated: need {expected}, file has {actual}")]
    TruncatedData {
        /// Bytes (or text values) needed.
        expected: u64,
        /// Bytes (or text values) available.
        actual: u64,
    },

    /// The header passed by the caller disagrees with the header in the file.
    #[error("header mismatch: caller has {0}x{1}, file has {2}x{3}")]
    HeaderMismatch(usize, usize, usize, usize),

    /// Scale factor is zero or not finite.
    #[error("invalid scale factor {0}")]
    InvalidScale(f64),

    /// A text token could not be parsed as a number.
    #[error("invalid text value {0:?}")]
    InvalidText(String),

    /// A valid file using features this crate does not implement.
    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// Crate-specific result type.
pub type GridResult<T> = std::result::Result<T, GridError>;
