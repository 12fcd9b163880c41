/// Resistivity track processing
///
/// Takes the stitched sounding track through GPS cleanup, channel filtering,
/// reprojection and along-track distance.

use geo::{Coord, EuclideanDistance, Point};
use log::info;

use crate::config::PreprocessConfig;
use crate::filters::{
    band_pass, below_threshold, interpolate_linear, number_profiles, pct_change, percentile_band,
    rolling_mean,
};
use crate::records::{Dataset, ResistivityRecord, SurveyRecord};
use crate::stitcher::StitchedTrack;

pub const RHO_CHANNELS: usize = 10;

/// One processed sounding.
#[derive(Debug, Clone)]
pub struct ResistivityPoint {
    pub record: ResistivityRecord,
    /// Renamed segment the point came from.
    pub filename: String,
    pub profile: usize,
    pub rho_bandpass: [f64; RHO_CHANNELS],
    pub rho_rollavg: [f64; RHO_CHANNELS],
    pub depth_filt: f64,
    pub depth_rollavg: f64,
    pub alt_pct: f64,
    pub altitude_bandpass: f64,
    pub altitude_rollavg: f64,
    pub utm: Coord<f64>,
    pub cor_dist: f64,
    pub cum_dist: f64,
}

/// Filter, project and measure the stitched resistivity track.
pub fn process_resistivity(
    track: StitchedTrack<ResistivityRecord>,
    depth_offset: f64,
    config: &PreprocessConfig,
) -> Vec<ResistivityPoint> {
    let river = config.river_prefix();
    let before = track.points.len();
    let kept: Vec<_> = track
        .points
        .into_iter()
        .filter(|p| !p.record.lacks_fix())
        .collect();
    if kept.len() < before {
        info!("Removed {} resistivity point(s) without a GPS fix", before - kept.len());
    }

    let profiles = number_profiles(kept.iter().map(|p| p.sequence_index));
    let window = config.rolling_window;
    let (rho_min, rho_max) = config.rho_band;

    info!("Applying bandpass filter");
    let mut rho_bandpass = vec![[f64::NAN; RHO_CHANNELS]; kept.len()];
    let mut rho_rollavg = vec![[f64::NAN; RHO_CHANNELS]; kept.len()];
    for channel in 0..RHO_CHANNELS {
        let raw: Vec<f64> = kept.iter().map(|p| p.record.rho[channel]).collect();
        let passed = band_pass(&raw, rho_min, rho_max);
        let averaged = rolling_mean(&passed, window);
        for (i, (b, r)) in passed.into_iter().zip(averaged).enumerate() {
            rho_bandpass[i][channel] = b;
            rho_rollavg[i][channel] = r;
        }
    }

    info!("Applying depth filter");
    let depth: Vec<f64> = kept.iter().map(|p| p.record.depth).collect();
    let depth_filt = below_threshold(&depth, depth_offset + config.depth_factor);
    let depth_rollavg = rolling_mean(&depth_filt, window);

    info!("Filtering altitude via percentage change");
    let altitude: Vec<f64> = kept.iter().map(|p| p.record.gps.altitude).collect();
    let alt_pct = pct_change(&altitude);
    let (low, high) = config.altitude_band;
    let altitude_bandpass = interpolate_linear(&percentile_band(&altitude, &alt_pct, low, high), None);
    let altitude_rollavg = rolling_mean(&altitude_bandpass, window);

    info!("Converting WGS84 coordinates to EPSG:{}", config.utm.epsg());
    let utm: Vec<Coord<f64>> = kept.iter().map(|p| config.utm.project(p.record.position())).collect();
    let (cor_dist, cum_dist) = along_track_distance(&utm);

    kept.into_iter()
        .enumerate()
        .map(|(i, point)| ResistivityPoint {
            filename: Dataset::Resistivity.segment_name(&river, point.sequence_index),
            record: point.record,
            profile: profiles[i],
            rho_bandpass: rho_bandpass[i],
            rho_rollavg: rho_rollavg[i],
            depth_filt: depth_filt[i],
            depth_rollavg: depth_rollavg[i],
            alt_pct: alt_pct[i],
            altitude_bandpass: altitude_bandpass[i],
            altitude_rollavg: altitude_rollavg[i],
            utm: utm[i],
            cor_dist: cor_dist[i],
            cum_dist: cum_dist[i],
        })
        .collect()
}

/// Step distance to the previous projected point and its running sum,
/// both missing on the first point.
pub fn along_track_distance(projected: &[Coord<f64>]) -> (Vec<f64>, Vec<f64>) {
    let mut steps = Vec::with_capacity(projected.len());
    let mut totals = Vec::with_capacity(projected.len());
    let mut running = 0.0;

    for (i, current) in projected.iter().enumerate() {
        if i == 0 {
            steps.push(f64::NAN);
            totals.push(f64::NAN);
            continue;
        }
        let step = Point::from(projected[i - 1]).euclidean_distance(&Point::from(*current));
        running += step;
        steps.push(step);
        totals.push(running);
    }

    (steps, totals)
}

/// Track length in kilometres from the last running distance.
pub fn total_distance_km(points: &[ResistivityPoint]) -> f64 {
    points
        .last()
        .map(|p| p.cum_dist)
        .filter(|d| d.is_finite())
        .map(|d| d / 1000.0)
        .unwrap_or(0.0)
}
