/// Buffered spatial join of water-quality readings onto the resistivity track
///
/// Each reading covers a disc of `buffer_m` around its projected position.
/// A sounding inside several discs yields one merged row per disc, in reading
/// order; a sounding inside none yields a single row with no reading.

use geo::Coord;
use log::info;
use rstar::{PointDistance, RTree, RTreeObject, AABB};

use crate::filters::{interpolate_linear, round_to};
use crate::resistivity::ResistivityPoint;
use crate::water_quality::WaterQualityPoint;

#[derive(Debug, Clone, Copy)]
struct ReadingCenter {
    idx: usize,
    x: f64,
    y: f64,
}

impl RTreeObject for ReadingCenter {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_point([self.x, self.y])
    }
}

impl PointDistance for ReadingCenter {
    fn distance_2(&self, point: &[f64; 2]) -> f64 {
        let dx = self.x - point[0];
        let dy = self.y - point[1];
        dx * dx + dy * dy
    }
}

fn build_rtree(readings: &[WaterQualityPoint]) -> RTree<ReadingCenter> {
    let centers: Vec<ReadingCenter> = readings
        .iter()
        .enumerate()
        .map(|(idx, r)| ReadingCenter { idx, x: r.utm.x, y: r.utm.y })
        .collect();
    RTree::bulk_load(centers)
}

/// A sounding with the reading it matched, if any, and the gap-filled
/// water-quality values carried onto it.
#[derive(Debug, Clone)]
pub struct MergedRow<'a> {
    pub resistivity: &'a ResistivityPoint,
    pub water_quality: Option<&'a WaterQualityPoint>,
    pub ohm_m: f64,
    pub temp_c: f64,
}

/// Indices of the readings whose buffer contains `position`, ascending.
fn readings_near(tree: &RTree<ReadingCenter>, position: Coord<f64>, buffer_m: f64) -> Vec<usize> {
    let mut matches: Vec<usize> = tree
        .locate_within_distance([position.x, position.y], buffer_m * buffer_m)
        .map(|c| c.idx)
        .collect();
    matches.sort_unstable();
    matches
}

pub fn spatial_join<'a>(
    soundings: &'a [ResistivityPoint],
    readings: &'a [WaterQualityPoint],
    buffer_m: f64,
    interpolation_limit: usize,
) -> Vec<MergedRow<'a>> {
    let tree = build_rtree(readings);

    let mut pairs: Vec<(&ResistivityPoint, Option<&WaterQualityPoint>)> = Vec::with_capacity(soundings.len());
    for sounding in soundings {
        let matches = readings_near(&tree, sounding.utm, buffer_m);
        if matches.is_empty() {
            pairs.push((sounding, None));
        } else {
            pairs.extend(matches.into_iter().map(|idx| (sounding, Some(&readings[idx]))));
        }
    }

    let matched = pairs.iter().filter(|(_, r)| r.is_some()).count();
    info!(
        "Spatial join: {} merged row(s), {} with a water-quality reading within {} m",
        pairs.len(),
        matched,
        buffer_m
    );

    let ohm: Vec<f64> = pairs
        .iter()
        .map(|(_, r)| r.map_or(f64::NAN, |r| r.ohm_m_rollavg))
        .collect();
    let temp: Vec<f64> = pairs
        .iter()
        .map(|(_, r)| r.map_or(f64::NAN, |r| r.record.temp_c))
        .collect();

    let ohm = interpolate_linear(&ohm, Some(interpolation_limit));
    let temp = round_to(&interpolate_linear(&temp, Some(interpolation_limit)), 1);

    pairs
        .into_iter()
        .enumerate()
        .map(|(i, (resistivity, water_quality))| MergedRow {
            resistivity,
            water_quality,
            ohm_m: ohm[i],
            temp_c: temp[i],
        })
        .collect()
}
