/// Survey file discovery and raw row reading
///
/// Rows are kept as `csv::StringRecord`s until the descriptor stage has
/// decided which files survive the point-count threshold; only then are they
/// decoded into named records.

use std::fs;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use log::info;
use walkdir::WalkDir;

use crate::error::{PreprocessError, Result};
use crate::records::Dataset;

/// Name of the combined resistivity file; never treated as a survey.
pub const COMBINED_RESISTIVITY_FILE: &str = "all.txt";

/// Instrument preamble lines ahead of the water-quality data rows.
pub const WATER_QUALITY_PREAMBLE_LINES: usize = 12;

/// The rows of one raw survey file.
#[derive(Debug, Clone)]
pub struct RawSurvey {
    pub source: PathBuf,
    pub rows: Vec<StringRecord>,
}

impl RawSurvey {
    pub fn point_count(&self) -> usize {
        self.rows.len()
    }
}

/// List the survey files of a dataset directly inside `folder`, sorted by name.
pub fn discover_survey_files(folder: &Path, dataset: Dataset) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let matches_extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case(dataset.extension()))
            .unwrap_or(false);
        if !matches_extension {
            continue;
        }

        let is_combined_output = dataset == Dataset::Resistivity
            && entry
                .file_name()
                .to_str()
                .map(|n| n.eq_ignore_ascii_case(COMBINED_RESISTIVITY_FILE))
                .unwrap_or(false);
        if is_combined_output {
            continue;
        }

        files.push(path.to_path_buf());
    }

    if files.is_empty() {
        return Err(PreprocessError::EmptyInput { dataset, folder: folder.to_path_buf() });
    }

    info!("Found {} {} file(s) in {}", files.len(), dataset, folder.display());
    Ok(files)
}

/// Read every discovered file of a dataset.
pub fn read_surveys(files: &[PathBuf], dataset: Dataset) -> Result<Vec<RawSurvey>> {
    files
        .iter()
        .map(|path| match dataset {
            Dataset::Resistivity => read_resistivity_survey(path),
            Dataset::WaterQuality => read_water_quality_survey(path),
        })
        .collect()
}

/// `;`-delimited text with a single header line.
pub fn read_resistivity_survey(path: &Path) -> Result<RawSurvey> {
    let mut reader = ReaderBuilder::new()
        .delimiter(b';')
        .has_headers(true)
        .flexible(true)
        .trim(Trim::None)
        .from_path(path)?;

    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RawSurvey { source: path.to_path_buf(), rows })
}

/// UTF-16 comma-delimited sonde export with a fixed preamble.
pub fn read_water_quality_survey(path: &Path) -> Result<RawSurvey> {
    let bytes = fs::read(path)?;
    let text = decode_sonde_text(&bytes);

    let body: String = text
        .lines()
        .skip(WATER_QUALITY_PREAMBLE_LINES)
        .collect::<Vec<_>>()
        .join("\n");

    let mut reader = ReaderBuilder::new()
        .delimiter(b',')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::None)
        .from_reader(body.as_bytes());

    let rows = reader.records().collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(RawSurvey { source: path.to_path_buf(), rows })
}

/// Sonde software writes UTF-16 with a byte-order mark. Files re-saved by
/// other tools may arrive as UTF-8, which is accepted as-is.
fn decode_sonde_text(bytes: &[u8]) -> String {
    match bytes {
        [0xFF, 0xFE, rest @ ..] => decode_utf16(rest, u16::from_le_bytes),
        [0xFE, 0xFF, rest @ ..] => decode_utf16(rest, u16::from_be_bytes),
        [0xEF, 0xBB, 0xBF, rest @ ..] => String::from_utf8_lossy(rest).into_owned(),
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => decode_utf16(bytes, u16::from_le_bytes),
        },
    }
}

fn decode_utf16(bytes: &[u8], to_unit: fn([u8; 2]) -> u16) -> String {
    let units = bytes.chunks_exact(2).map(|pair| to_unit([pair[0], pair[1]]));
    char::decode_utf16(units)
        .map(|c| c.unwrap_or(char::REPLACEMENT_CHARACTER))
        .collect()
}
