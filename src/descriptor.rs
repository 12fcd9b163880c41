/// Segment Descriptor Extraction
///
/// Reduces each raw survey to its first and last fix. The point-count gate
/// runs first, so files that are excluded are never validated; every file
/// that survives must have well-formed, western-hemisphere endpoints or the
/// whole batch stops.

use std::path::PathBuf;

use geo::Coord;
use log::{info, warn};
use serde::Serialize;

use crate::error::{FormatProblem, PreprocessError, Result};
use crate::records::SurveyRecord;
use crate::survey_reader::RawSurvey;

/// Endpoints of one survey file.
#[derive(Debug, Clone, PartialEq)]
pub struct SegmentDescriptor {
    pub source: PathBuf,
    pub start: Coord<f64>,
    pub end: Coord<f64>,
    pub point_count: usize,
}

/// A survey dropped for having too few points.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExclusionRecord {
    #[serde(rename = "Filename")]
    pub source: PathBuf,
    #[serde(rename = "Number_of_Data_Points")]
    pub point_count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct DescriptorSet {
    pub descriptors: Vec<SegmentDescriptor>,
    pub excluded: Vec<ExclusionRecord>,
}

/// Build descriptors for every survey, routing short ones to the exclusion list.
///
/// Fails on the first unparseable or positive-longitude endpoint.
pub fn extract_descriptors<R: SurveyRecord>(
    surveys: &[RawSurvey],
    min_points: usize,
) -> Result<DescriptorSet> {
    let mut set = DescriptorSet::default();

    for survey in surveys {
        let point_count = survey.point_count();

        if point_count < min_points {
            info!(
                "{} file excluded, length: {} ({})",
                R::DATASET,
                point_count,
                survey.source.display()
            );
            set.excluded.push(ExclusionRecord { source: survey.source.clone(), point_count });
            continue;
        }

        set.descriptors.push(describe::<R>(survey)?);
    }

    if !set.excluded.is_empty() {
        warn!(
            "{} {} survey(s) excluded below {} points",
            set.excluded.len(),
            R::DATASET,
            min_points
        );
    }

    Ok(set)
}

fn describe<R: SurveyRecord>(survey: &RawSurvey) -> Result<SegmentDescriptor> {
    let (first, last) = match (survey.rows.first(), survey.rows.last()) {
        (Some(first), Some(last)) => (first, last),
        // Only reachable with a zero-point minimum.
        _ => {
            return Err(PreprocessError::format(
                &survey.source,
                FormatProblem::Unparseable { field: "Latitude", line: 1, value: String::new() },
            ))
        }
    };
    let last_line = survey.rows.len();

    let start = R::raw_position(first, 1).map_err(|p| PreprocessError::format(&survey.source, p))?;
    let end = R::raw_position(last, last_line).map_err(|p| PreprocessError::format(&survey.source, p))?;

    for (line, position) in [(1, start), (last_line, end)] {
        if position.x > 0.0 {
            return Err(PreprocessError::format(
                &survey.source,
                FormatProblem::PositiveLongitude { line, value: position.x },
            ));
        }
    }

    Ok(SegmentDescriptor {
        source: survey.source.clone(),
        start,
        end,
        point_count: survey.point_count(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::fixtures::{resistivity_row, water_quality_row};
    use crate::records::{ResistivityRecord, WaterQualityRecord};

    fn resistivity_survey(name: &str, coords: &[(&str, &str)]) -> RawSurvey {
        RawSurvey {
            source: PathBuf::from(name),
            rows: coords.iter().map(|(lat, lon)| resistivity_row(lat, lon)).collect(),
        }
    }

    #[test]
    fn test_endpoints_are_first_and_last_rows() {
        let survey = resistivity_survey(
            "line.txt",
            &[("3830.000", "-9230.000"), ("3831.000", "-9231.000"), ("3836.000", "-9236.000")],
        );
        let set = extract_descriptors::<ResistivityRecord>(&[survey], 2).unwrap();

        assert!(set.excluded.is_empty());
        let d = &set.descriptors[0];
        assert!((d.start.y - 38.5).abs() < 1e-12);
        assert!((d.start.x + 92.5).abs() < 1e-12);
        assert!((d.end.y - 38.6).abs() < 1e-12);
        assert!((d.end.x + 92.6).abs() < 1e-12);
        assert_eq!(d.point_count, 3);
    }

    #[test]
    fn test_short_survey_is_excluded_not_failed() {
        let rows: Vec<_> = (0..50).map(|_| ("3830.000", "-9230.000")).collect();
        let survey = resistivity_survey("short.txt", &rows);

        let set = extract_descriptors::<ResistivityRecord>(&[survey], 100).unwrap();
        assert!(set.descriptors.is_empty());
        assert_eq!(
            set.excluded,
            vec![ExclusionRecord { source: PathBuf::from("short.txt"), point_count: 50 }]
        );
    }

    #[test]
    fn test_excluded_file_is_not_validated() {
        let survey = resistivity_survey("bad_but_short.txt", &[("garbage", "-9230.000")]);
        let set = extract_descriptors::<ResistivityRecord>(&[survey], 100).unwrap();
        assert_eq!(set.excluded.len(), 1);
    }

    #[test]
    fn test_unparseable_endpoint_aborts_batch() {
        let good = resistivity_survey("good.txt", &[("3830.000", "-9230.000"), ("3831.000", "-9231.000")]);
        let bad = resistivity_survey("bad.txt", &[("3830.000", "-9230.000"), ("38x1.000", "-9231.000")]);

        let err = extract_descriptors::<ResistivityRecord>(&[good, bad], 2).unwrap_err();
        match err {
            PreprocessError::Format { path, problem } => {
                assert_eq!(path, PathBuf::from("bad.txt"));
                assert!(matches!(problem, FormatProblem::Unparseable { line: 2, .. }));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_positive_longitude_aborts_batch() {
        let survey = resistivity_survey("east.txt", &[("3830.000", "09230.000"), ("3831.000", "-9231.000")]);
        let err = extract_descriptors::<ResistivityRecord>(&[survey], 2).unwrap_err();
        assert!(matches!(
            err,
            PreprocessError::Format { problem: FormatProblem::PositiveLongitude { line: 1, .. }, .. }
        ));
    }

    #[test]
    fn test_water_quality_endpoints_are_decimal() {
        let survey = RawSurvey {
            source: PathBuf::from("wq.csv"),
            rows: vec![water_quality_row(30.01, -90.01), water_quality_row(30.2, -90.2)],
        };
        let set = extract_descriptors::<WaterQualityRecord>(&[survey], 2).unwrap();
        assert_eq!(set.descriptors[0].start, Coord { x: -90.01, y: 30.01 });
        assert_eq!(set.descriptors[0].end, Coord { x: -90.2, y: 30.2 });
    }
}
