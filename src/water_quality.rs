use geo::Coord;
use log::info;

use crate::config::PreprocessConfig;
use crate::filters::{number_profiles, rolling_mean};
use crate::records::{Dataset, SurveyRecord, WaterQualityRecord};
use crate::stitcher::StitchedTrack;

/// One processed sonde reading.
#[derive(Debug, Clone)]
pub struct WaterQualityPoint {
    pub record: WaterQualityRecord,
    pub filename: String,
    pub profile: usize,
    pub ohm_m: f64,
    pub ohm_m_rollavg: f64,
    pub utm: Coord<f64>,
}

/// Drop unusable readings, convert resistivity to ohm-metres and project.
pub fn process_water_quality(
    track: StitchedTrack<WaterQualityRecord>,
    config: &PreprocessConfig,
) -> Vec<WaterQualityPoint> {
    let river = config.river_prefix();
    let total = track.points.len();

    let with_fix: Vec<_> = track.points.into_iter().filter(|p| !p.record.lacks_fix()).collect();
    let no_fix = total - with_fix.len();

    let kept: Vec<_> = with_fix
        .into_iter()
        .filter(|p| !p.record.resistivity_over_range)
        .collect();
    let over_range = total - no_fix - kept.len();

    info!(
        "Water quality: {} point(s) without a GPS fix and {} over-range reading(s) removed",
        no_fix, over_range
    );

    let ohm_m: Vec<f64> = kept.iter().map(|p| p.record.resistivity_ohm_cm / 100.0).collect();
    let ohm_m_rollavg = rolling_mean(&ohm_m, config.rolling_window);
    let profiles = number_profiles(kept.iter().map(|p| p.sequence_index));

    kept.into_iter()
        .enumerate()
        .map(|(i, point)| WaterQualityPoint {
            filename: Dataset::WaterQuality.segment_name(&river, point.sequence_index),
            utm: config.utm.project(point.record.position()),
            record: point.record,
            profile: profiles[i],
            ohm_m: ohm_m[i],
            ohm_m_rollavg: ohm_m_rollavg[i],
        })
        .collect()
}
