/// Output writers
///
/// Every write failure surfaces as `PreprocessError::Export` naming the file,
/// so the user can close whatever holds it open and rerun.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use csv::{Writer, WriterBuilder};
use geo::{Coord, Point};
use gpx::{write, Gpx, GpxVersion, Track, TrackSegment, Waypoint};
use log::info;
use serde::Serialize;

use crate::config::{ensure_directory, DirOutcome};
use crate::descriptor::ExclusionRecord;
use crate::error::{PreprocessError, Result};
use crate::records::{Dataset, ResistivityRecord, SurveyRecord, RESISTIVITY_COLUMNS};
use crate::resistivity::{ResistivityPoint, RHO_CHANNELS};
use crate::spatial_join::MergedRow;
use crate::stitcher::StitchedTrack;
use crate::tour_builder::OrderedSegment;
use crate::water_quality::WaterQualityPoint;

pub const RENAMED_DIR: &str = "Raw_Data_Renamed";
pub const SUMMARY_FILE: &str = "OASIS_PREPROCESSING_SUMMARY.txt";

/// Placeholder for missing values in the per-dataset CSVs.
pub const CSV_MISSING: &str = "*";

fn exporting<T>(path: &Path, op: impl FnOnce() -> Result<T>) -> Result<T> {
    op().map_err(|e| e.into_export(path))
}

fn value(v: f64, missing: &str) -> String {
    if v.is_nan() {
        missing.to_string()
    } else {
        v.to_string()
    }
}

#[derive(Debug, Serialize)]
struct DirectoryRow {
    #[serde(rename = "Filename")]
    filename: String,
    #[serde(rename = "Reverse")]
    reverse: bool,
    #[serde(rename = "NewFilename")]
    new_filename: String,
}

/// Old name, orientation and new name of every ordered segment.
pub fn write_directory_listing(path: &Path, tour: &[OrderedSegment], renamed_dir: &Path) -> Result<()> {
    exporting(path, || {
        let mut wtr = Writer::from_path(path)?;
        for segment in tour {
            wtr.serialize(DirectoryRow {
                filename: segment.descriptor.source.display().to_string(),
                reverse: segment.reversed,
                new_filename: renamed_dir.join(&segment.assigned_name).display().to_string(),
            })?;
        }
        if tour.is_empty() {
            wtr.write_record(["Filename", "Reverse", "NewFilename"])?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Surveys left out for having too few points. The header is written even
/// when nothing was excluded.
pub fn write_exclusions(path: &Path, excluded: &[ExclusionRecord]) -> Result<()> {
    exporting(path, || {
        let mut wtr = WriterBuilder::new().has_headers(false).from_path(path)?;
        wtr.write_record(["Filename", "Number_of_Data_Points"])?;
        for record in excluded {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    })
}

/// Copy every ordered source file into `<output>/Raw_Data_Renamed` under its
/// assigned name.
pub fn copy_renamed(tour: &[OrderedSegment], output_dir: &Path) -> Result<PathBuf> {
    let renamed_dir = output_dir.join(RENAMED_DIR);
    if ensure_directory(&renamed_dir)? == DirOutcome::Created {
        info!("Created {}", renamed_dir.display());
    }

    for segment in tour {
        let target = renamed_dir.join(&segment.assigned_name);
        fs::copy(&segment.descriptor.source, &target).map_err(|e| PreprocessError::export(&target, e))?;
    }

    Ok(renamed_dir)
}

/// The stitched raw soundings as read, tagged with their renamed segment.
pub fn write_combined_raw(path: &Path, track: &StitchedTrack<ResistivityRecord>, river: &str) -> Result<()> {
    exporting(path, || {
        let mut wtr = WriterBuilder::new().flexible(true).from_path(path)?;

        let mut header: Vec<&str> = RESISTIVITY_COLUMNS.to_vec();
        header.push("Filename");
        wtr.write_record(&header)?;

        for point in &track.points {
            let mut row: Vec<String> = (0..RESISTIVITY_COLUMNS.len())
                .map(|i| point.record.raw.get(i).unwrap_or("").to_string())
                .collect();
            row.push(Dataset::Resistivity.segment_name(river, point.sequence_index));
            wtr.write_record(&row)?;
        }

        wtr.flush()?;
        Ok(())
    })
}

fn resistivity_header() -> Vec<String> {
    let mut header: Vec<String> = ["Filename", "File", "Distance", "Depth"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    header.extend((1..=RHO_CHANNELS).map(|n| format!("Rho {n}")));
    header.extend(["C1".to_string(), "C2".to_string()]);
    header.extend((1..=11).map(|n| format!("P{n}")));
    header.extend(["In_p".to_string(), "In_n".to_string()]);
    for n in 1..=10 {
        header.push(format!("V{n}_p"));
        header.push(format!("V{n}_n"));
    }
    header.extend(
        ["UTC", "Fix Quality", "Satellites", "HDOP", "Altitude", "Height of Geoid", "Lat", "Lon"]
            .iter()
            .map(|s| s.to_string()),
    );
    header.extend((1..=RHO_CHANNELS).map(|n| format!("Rho {n}_bandpass")));
    header.extend((1..=RHO_CHANNELS).map(|n| format!("Rho {n}_rollavg")));
    header.extend(
        [
            "Depth_filt",
            "Depth_rollavg",
            "Alt_pct",
            "Altitude_bandpass",
            "Altitude_rollavg",
            "X_UTM",
            "Y_UTM",
            "Cor_Dist",
            "Cum_dist",
        ]
        .iter()
        .map(|s| s.to_string()),
    );
    header
}

fn resistivity_fields(point: &ResistivityPoint, missing: &str) -> Vec<String> {
    let r = &point.record;
    let v = |x: f64| value(x, missing);

    let mut row = vec![point.filename.clone(), point.profile.to_string(), v(r.distance), v(r.depth)];
    row.extend(r.rho.iter().map(|&x| v(x)));
    row.extend([v(r.c1), v(r.c2)]);
    row.extend(r.p.iter().map(|&x| v(x)));
    row.extend([v(r.current_pos), v(r.current_neg)]);
    for (pos, neg) in r.voltage_pos.iter().zip(&r.voltage_neg) {
        row.push(v(*pos));
        row.push(v(*neg));
    }
    row.extend([
        r.gps.utc.clone(),
        v(r.gps.fix_quality),
        v(r.gps.satellites),
        v(r.gps.hdop),
        v(r.gps.altitude),
        v(r.gps.geoid_height),
        v(r.latitude),
        v(r.longitude),
    ]);
    row.extend(point.rho_bandpass.iter().map(|&x| v(x)));
    row.extend(point.rho_rollavg.iter().map(|&x| v(x)));
    row.extend([
        v(point.depth_filt),
        v(point.depth_rollavg),
        v(point.alt_pct),
        v(point.altitude_bandpass),
        v(point.altitude_rollavg),
        v(point.utm.x),
        v(point.utm.y),
        v(point.cor_dist),
        v(point.cum_dist),
    ]);
    row
}

pub fn write_resistivity_csv(path: &Path, points: &[ResistivityPoint]) -> Result<()> {
    exporting(path, || {
        let mut wtr = Writer::from_path(path)?;
        wtr.write_record(resistivity_header())?;
        for point in points {
            wtr.write_record(resistivity_fields(point, CSV_MISSING))?;
        }
        wtr.flush()?;
        Ok(())
    })
}

const WATER_QUALITY_HEADER: [&str; 24] = [
    "Filename",
    "File",
    "Date",
    "Time",
    "Temp_C",
    "mmHg",
    "DO %",
    "SPC_mscm",
    "Cond_mscm",
    "Res_ocm",
    "pH",
    "NH4-N mg/L",
    "NO3-N mg/L",
    "Cl mg/L",
    "FNU",
    "TSS mg/L",
    "DEP m",
    "Alt_m",
    "Lat",
    "Lon",
    "Ohm_m",
    "Ohm_m_rollavg",
    "X_UTM",
    "Y_UTM",
];

pub fn write_water_quality_csv(path: &Path, points: &[WaterQualityPoint]) -> Result<()> {
    exporting(path, || {
        let mut wtr = Writer::from_path(path)?;
        wtr.write_record(WATER_QUALITY_HEADER)?;

        for point in points {
            let r = &point.record;
            let v = |x: f64| value(x, CSV_MISSING);
            wtr.write_record([
                point.filename.clone(),
                point.profile.to_string(),
                r.date.clone(),
                r.time.clone(),
                v(r.temp_c),
                v(r.pressure_mmhg),
                v(r.dissolved_oxygen_pct),
                v(r.specific_conductance_us_cm),
                v(r.conductivity_us_cm),
                v(r.resistivity_ohm_cm),
                v(r.ph),
                v(r.ammonium_mg_l),
                v(r.nitrate_mg_l),
                v(r.chloride_mg_l),
                v(r.turbidity_fnu),
                v(r.tss_mg_l),
                v(r.depth_m),
                v(r.altitude_m),
                v(r.latitude),
                v(r.longitude),
                v(point.ohm_m),
                v(point.ohm_m_rollavg),
                v(point.utm.x),
                v(point.utm.y),
            ])?;
        }

        wtr.flush()?;
        Ok(())
    })
}

/// Soundings joined with water quality. Missing values are empty cells so
/// GIS tools import the columns as numbers.
pub fn write_merged_csv(path: &Path, rows: &[MergedRow<'_>]) -> Result<()> {
    exporting(path, || {
        let mut wtr = Writer::from_path(path)?;

        let mut header = resistivity_header();
        header.extend(
            ["WQ_X_UTM", "WQ_Y_UTM", "Date", "Time", "Ohm_m_rollavg", "Temp_C", "Ohm_m", "Final_Altitude", "Cor_depth"]
                .iter()
                .map(|s| s.to_string()),
        );
        header.extend((1..=RHO_CHANNELS).map(|n| format!("Final_Rho_{n}")));
        wtr.write_record(&header)?;

        for row in rows {
            let point = row.resistivity;
            let v = |x: f64| value(x, "");
            let mut fields = resistivity_fields(point, "");
            match row.water_quality {
                Some(wq) => fields.extend([v(wq.utm.x), v(wq.utm.y), wq.record.date.clone(), wq.record.time.clone()]),
                None => fields.extend([String::new(), String::new(), String::new(), String::new()]),
            }
            fields.extend([
                v(row.ohm_m),
                v(row.temp_c),
                v(row.ohm_m),
                v(point.altitude_rollavg),
                v(point.depth_filt),
            ]);
            fields.extend(point.rho_rollavg.iter().map(|&x| v(x)));
            wtr.write_record(&fields)?;
        }

        wtr.flush()?;
        Ok(())
    })
}

/// A point of a GPX track: profile number, position and elevation.
pub type TrackPoint = (usize, Coord<f64>, Option<f64>);

/// One track named `name`, one segment per profile.
pub fn write_track_gpx(path: &Path, name: &str, points: impl IntoIterator<Item = TrackPoint>) -> Result<()> {
    let mut track = Track::new();
    track.name = Some(name.to_string());

    let mut current: Option<(usize, TrackSegment)> = None;
    for (profile, position, elevation) in points {
        if elevation.map_or(false, f64::is_nan) {
            continue;
        }
        let mut waypoint = Waypoint::new(Point::new(position.x, position.y));
        waypoint.elevation = elevation;

        match current.as_mut() {
            Some((p, segment)) if *p == profile => segment.points.push(waypoint),
            _ => {
                if let Some((_, finished)) = current.take() {
                    track.segments.push(finished);
                }
                let mut segment = TrackSegment::new();
                segment.points.push(waypoint);
                current = Some((profile, segment));
            }
        }
    }
    if let Some((_, finished)) = current {
        track.segments.push(finished);
    }

    let gpx = Gpx {
        version: GpxVersion::Gpx11,
        creator: Some("oasis-preprocessor".to_string()),
        tracks: vec![track],
        ..Default::default()
    };

    exporting(path, || {
        let file = File::create(path)?;
        let mut writer = BufWriter::new(file);
        write(&gpx, &mut writer)?;
        writer.flush()?;
        Ok(())
    })
}

pub fn resistivity_track_points(points: &[ResistivityPoint]) -> Vec<TrackPoint> {
    points
        .iter()
        .map(|p| {
            let elevation = Some(p.altitude_rollavg).filter(|e| e.is_finite());
            (p.profile, p.record.position(), elevation)
        })
        .collect()
}

pub fn water_quality_track_points(points: &[WaterQualityPoint]) -> Vec<TrackPoint> {
    points
        .iter()
        .map(|p| {
            let elevation = Some(p.record.altitude_m).filter(|e| e.is_finite());
            (p.profile, p.record.position(), elevation)
        })
        .collect()
}

/// Run summary: when, how far, and which renamed files went in.
pub fn write_summary(
    path: &Path,
    processed_at: DateTime<Local>,
    total_km: f64,
    resistivity_files: &[String],
    water_quality_files: &[String],
) -> Result<()> {
    exporting(path, || {
        let mut out = BufWriter::new(File::create(path)?);
        writeln!(out, "Processed on {}\n", processed_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(out, "Total distance processed: {:.2} kilometers", total_km)?;
        writeln!(out, "Number of resistivity files read: {}", resistivity_files.len())?;
        for name in resistivity_files {
            writeln!(out, "{}", name)?;
        }
        writeln!(out, "\n\nNumber of water quality files read: {}", water_quality_files.len())?;
        for name in water_quality_files {
            writeln!(out, "{}", name)?;
        }
        writeln!(out, "\n")?;
        out.flush()?;
        Ok(())
    })
}
