use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim};
use log::{info, warn};

use crate::error::{PreprocessError, Result};
use crate::projection::UtmZone;
use crate::records::Dataset;

/// Section of the acquisition INI file holding the sounder settings.
pub const SOUNDER_SECTION: &str = "[SwitchPro]";
pub const DEPTH_OFFSET_KEY: &str = "DepthOffset";

/// Tunable parameters of a preprocessing run.
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    pub river: String,
    pub output_dir: PathBuf,
    pub min_points_resistivity: usize,
    pub min_points_water_quality: usize,
    pub rolling_window: usize,
    pub rho_band: (f64, f64),
    pub depth_factor: f64,
    /// Percentile band applied to altitude percent change.
    pub altitude_band: (f64, f64),
    pub join_buffer_m: f64,
    pub interpolation_limit: usize,
    pub utm: UtmZone,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        PreprocessConfig {
            river: "RIVER".to_string(),
            output_dir: PathBuf::from("."),
            min_points_resistivity: Dataset::Resistivity.default_min_points(),
            min_points_water_quality: Dataset::WaterQuality.default_min_points(),
            rolling_window: 20,
            rho_band: (0.0, 250.0),
            depth_factor: 0.01,
            altitude_band: (5.0, 95.0),
            join_buffer_m: 5.0,
            interpolation_limit: 20,
            utm: UtmZone { zone: 15, north: true },
        }
    }
}

impl PreprocessConfig {
    pub fn min_points(&self, dataset: Dataset) -> usize {
        match dataset {
            Dataset::Resistivity => self.min_points_resistivity,
            Dataset::WaterQuality => self.min_points_water_quality,
        }
    }

    /// River name used as the output file prefix, as entered.
    pub fn river_prefix(&self) -> String {
        self.river.trim().to_string()
    }
}

/// Read the sounder depth offset from the acquisition INI file.
///
/// The file is `key=value` lines grouped under `[Section]` headers.
pub fn read_depth_offset(path: &Path) -> Result<f64> {
    let ini_error = |detail: String| PreprocessError::Ini { path: path.to_path_buf(), detail };

    let mut reader = ReaderBuilder::new()
        .delimiter(b'=')
        .has_headers(false)
        .flexible(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|e| ini_error(e.to_string()))?;

    let mut section = String::new();
    for row in reader.records() {
        let row = row.map_err(|e| ini_error(e.to_string()))?;
        let key = row.get(0).unwrap_or("");

        if key.starts_with('[') {
            section = key.to_string();
            continue;
        }
        if !section.eq_ignore_ascii_case(SOUNDER_SECTION) || key != DEPTH_OFFSET_KEY {
            continue;
        }

        let raw = row.get(1).unwrap_or("");
        let offset: f64 = raw
            .parse()
            .map_err(|_| ini_error(format!("{DEPTH_OFFSET_KEY} value {raw:?} is not a number")))?;

        if offset > 0.0 {
            warn!("Positive value for depth offset from INI file: {}", offset);
        }
        info!("Depth offset {} read from {}", offset, path.display());
        return Ok(offset);
    }

    Err(ini_error(format!("no {DEPTH_OFFSET_KEY} in {SOUNDER_SECTION}")))
}

/// Whether [`ensure_directory`] had to create the folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirOutcome {
    Created,
    AlreadyExisted,
}

pub fn ensure_directory(path: &Path) -> Result<DirOutcome> {
    if path.is_dir() {
        return Ok(DirOutcome::AlreadyExisted);
    }
    if path.exists() {
        return Err(PreprocessError::Io(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", path.display()),
        )));
    }

    fs::create_dir_all(path)?;
    Ok(DirOutcome::Created)
}
