/// Ordered concatenation with overlap trimming
///
/// Each decoded segment is oriented, trimmed against the tail of what has
/// been stitched so far and appended. A point of the new segment is dropped
/// when it lies inside the closed lat/lon box spanned by the accumulated
/// track's last point and the new segment's first point.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};

use geo::{Coord, Intersects, Rect};
use log::{info, warn};

use crate::descriptor::SegmentDescriptor;
use crate::error::{PreprocessError, Result};
use crate::records::SurveyRecord;
use crate::survey_reader::RawSurvey;
use crate::tour_builder::OrderedSegment;

/// One point of the stitched track and the tour position it came from.
#[derive(Debug, Clone)]
pub struct StitchedPoint<R> {
    pub record: R,
    pub sequence_index: usize,
}

/// What happened at one stitch.
#[derive(Debug, Clone, PartialEq)]
pub struct StitchReport {
    pub assigned_name: String,
    pub source: PathBuf,
    pub reversed: bool,
    pub dropped: usize,
    pub missing_fields: usize,
}

#[derive(Debug, Clone)]
pub struct StitchedTrack<R> {
    pub points: Vec<StitchedPoint<R>>,
    pub stitches: Vec<StitchReport>,
}

impl<R: SurveyRecord> StitchedTrack<R> {
    pub fn total_dropped(&self) -> usize {
        self.stitches.iter().map(|s| s.dropped).sum()
    }
}

/// Drop the points of an oriented segment that fall inside the box between
/// `previous` and the segment's own first point. Returns the kept points and
/// the number dropped.
pub fn trim_overlap<R: SurveyRecord>(previous: Option<Coord<f64>>, segment: Vec<R>) -> (Vec<R>, usize) {
    let (previous, first) = match (previous, segment.first()) {
        (Some(previous), Some(first)) => (previous, first.position()),
        _ => return (segment, 0),
    };

    drop_inside(Rect::new(previous, first), segment)
}

/// Drop every point inside the closed box.
pub fn drop_inside<R: SurveyRecord>(overlap: Rect<f64>, segment: Vec<R>) -> (Vec<R>, usize) {
    let before = segment.len();
    let kept: Vec<R> = segment
        .into_iter()
        .filter(|record| !overlap.intersects(&record.position()))
        .collect();
    let dropped = before - kept.len();

    (kept, dropped)
}

/// Every row of one kept survey, decoded ahead of ordering.
#[derive(Debug, Clone)]
pub struct DecodedSurvey<R> {
    pub source: PathBuf,
    pub records: Vec<R>,
    pub missing_fields: usize,
}

/// Decode all rows of the surveys that have a descriptor. A coordinate that
/// fails to parse anywhere in a kept survey is a fatal format error.
pub fn decode_surveys<R: SurveyRecord>(
    surveys: &[RawSurvey],
    descriptors: &[SegmentDescriptor],
) -> Result<Vec<DecodedSurvey<R>>> {
    let kept: HashSet<&Path> = descriptors.iter().map(|d| d.source.as_path()).collect();

    surveys
        .iter()
        .filter(|survey| kept.contains(survey.source.as_path()))
        .map(decode_rows::<R>)
        .collect()
}

/// Concatenate every decoded segment in tour order.
pub fn stitch_segments<R: SurveyRecord>(
    tour: &[OrderedSegment],
    surveys: Vec<DecodedSurvey<R>>,
) -> Result<StitchedTrack<R>> {
    let mut by_source: HashMap<PathBuf, DecodedSurvey<R>> =
        surveys.into_iter().map(|s| (s.source.clone(), s)).collect();

    let mut track: StitchedTrack<R> =
        StitchedTrack { points: Vec::new(), stitches: Vec::with_capacity(tour.len()) };

    for segment in tour {
        let source = segment.descriptor.source.as_path();
        let survey = by_source.remove(source).ok_or_else(|| {
            PreprocessError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("no rows loaded for {}", source.display()),
            ))
        })?;

        let DecodedSurvey { mut records, missing_fields, .. } = survey;
        if segment.reversed {
            records.reverse();
        }

        let previous = track.points.last().map(|p| p.record.position());
        let (kept, dropped) = trim_overlap(previous, records);

        if dropped > 0 {
            info!(
                "{}: dropped {} overlapping point(s) at stitch with previous segment",
                segment.assigned_name, dropped
            );
        }
        if missing_fields > 0 {
            warn!(
                "{}: {} non-numeric measurement value(s) recorded as missing",
                segment.assigned_name, missing_fields
            );
        }

        track.points.extend(kept.into_iter().map(|record| StitchedPoint {
            record,
            sequence_index: segment.sequence_index,
        }));
        track.stitches.push(StitchReport {
            assigned_name: segment.assigned_name.clone(),
            source: segment.descriptor.source.clone(),
            reversed: segment.reversed,
            dropped,
            missing_fields,
        });
    }

    Ok(track)
}

fn decode_rows<R: SurveyRecord>(survey: &RawSurvey) -> Result<DecodedSurvey<R>> {
    let mut records = Vec::with_capacity(survey.rows.len());
    let mut missing_fields = 0;

    for (i, row) in survey.rows.iter().enumerate() {
        let decoded = R::from_row(row, i + 1)
            .map_err(|problem| PreprocessError::format(&survey.source, problem))?;
        missing_fields += decoded.missing_fields;
        records.push(decoded.record);
    }

    Ok(DecodedSurvey { source: survey.source.clone(), records, missing_fields })
}
