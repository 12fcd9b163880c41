/// Error taxonomy for a preprocessing run.
///
/// Every variant is terminal for the batch: the tool is one-shot, so nothing
/// here is retried. Too-short surveys are not errors at all; they are routed
/// to the exclusion list by the descriptor stage.

use std::fmt;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::records::Dataset;

pub type Result<T> = std::result::Result<T, PreprocessError>;

#[derive(Error, Debug)]
pub enum PreprocessError {
    /// Unparseable or sign-inverted coordinate. Raised before any ordering.
    #[error("formatting error in {}: {problem}", .path.display())]
    Format { path: PathBuf, problem: FormatProblem },

    /// No qualifying survey files for a dataset.
    #[error("no qualifying {dataset} surveys found in {}", .folder.display())]
    EmptyInput { dataset: Dataset, folder: PathBuf },

    /// A write to an output file failed. The user must release the file and rerun.
    #[error("could not write {}: {source}. Ensure the file is not open", .path.display())]
    Export {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("INI file {}: {detail}", .path.display())]
    Ini { path: PathBuf, detail: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("directory walk error: {0}")]
    Walk(#[from] walkdir::Error),

    #[error("GPX error: {0}")]
    Gpx(#[from] gpx::errors::GpxError),
}

/// What exactly was wrong with a coordinate field.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatProblem {
    Unparseable { field: &'static str, line: usize, value: String },
    PositiveLongitude { line: usize, value: f64 },
}

impl fmt::Display for FormatProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatProblem::Unparseable { field, line, value } => write!(
                f,
                "could not convert {} {:?} on data line {}",
                field, value, line
            ),
            FormatProblem::PositiveLongitude { line, value } => write!(
                f,
                "longitude {} on data line {} is positive; please format longitude with a negative sign",
                value, line
            ),
        }
    }
}

impl PreprocessError {
    pub fn format(path: impl Into<PathBuf>, problem: FormatProblem) -> Self {
        PreprocessError::Format { path: path.into(), problem }
    }

    pub fn export(path: impl Into<PathBuf>, source: io::Error) -> Self {
        PreprocessError::Export { path: path.into(), source }
    }

    /// Re-tag a CSV or GPX failure while writing `path` as an export failure.
    pub fn into_export(self, path: impl Into<PathBuf>) -> Self {
        match self {
            PreprocessError::Io(source) => PreprocessError::export(path, source),
            PreprocessError::Csv(err) => {
                PreprocessError::export(path, io::Error::new(io::ErrorKind::Other, err.to_string()))
            }
            PreprocessError::Gpx(err) => {
                PreprocessError::export(path, io::Error::new(io::ErrorKind::Other, err.to_string()))
            }
            other => other,
        }
    }
}
