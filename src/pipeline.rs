/// One full preprocessing run
///
/// Both datasets are read and validated before anything is written.
/// Resistivity is then ordered with the farthest-start seed; its cleaned
/// track's first fix anchors the water-quality ordering. Both tracks are
/// joined and every output lands in the configured output folder.

use std::path::{Path, PathBuf};

use chrono::Local;
use log::info;

use crate::config::{ensure_directory, read_depth_offset, PreprocessConfig};
use crate::descriptor::{extract_descriptors, DescriptorSet, ExclusionRecord, SegmentDescriptor};
use crate::error::{PreprocessError, Result};
use crate::export::{
    copy_renamed, resistivity_track_points, water_quality_track_points, write_combined_raw,
    write_directory_listing, write_exclusions, write_merged_csv, write_resistivity_csv,
    write_summary, write_track_gpx, write_water_quality_csv, RENAMED_DIR, SUMMARY_FILE,
};
use crate::records::{Dataset, ResistivityRecord, SurveyRecord, WaterQualityRecord};
use crate::resistivity::{process_resistivity, total_distance_km};
use crate::spatial_join::spatial_join;
use crate::stitcher::{decode_surveys, stitch_segments, DecodedSurvey, StitchedTrack};
use crate::survey_reader::{discover_survey_files, read_surveys, COMBINED_RESISTIVITY_FILE};
use crate::tour_builder::{build_tour, OrderedSegment, SeedStrategy};
use crate::water_quality::process_water_quality;

/// Where the raw inputs live.
#[derive(Debug, Clone)]
pub struct RunInputs {
    pub resistivity_dir: PathBuf,
    pub water_quality_dir: PathBuf,
    pub ini_file: PathBuf,
}

/// What a run produced.
#[derive(Debug, Clone, Default)]
pub struct RunReport {
    pub resistivity_files: Vec<String>,
    pub water_quality_files: Vec<String>,
    pub excluded_resistivity: usize,
    pub excluded_water_quality: usize,
    pub overlap_dropped: usize,
    pub resistivity_points: usize,
    pub water_quality_points: usize,
    pub merged_rows: usize,
    pub total_km: f64,
    pub outputs: Vec<PathBuf>,
}

/// A dataset read, described and decoded, ready to be ordered.
struct PreparedDataset<R> {
    folder: PathBuf,
    descriptors: Vec<SegmentDescriptor>,
    excluded: Vec<ExclusionRecord>,
    surveys: Vec<DecodedSurvey<R>>,
}

/// A dataset after ordering and stitching.
struct OrderedDataset<R> {
    tour: Vec<OrderedSegment>,
    track: StitchedTrack<R>,
}

/// Discover, read, describe and decode one dataset. Nothing is written.
fn prepare_dataset<R: SurveyRecord>(folder: &Path, config: &PreprocessConfig) -> Result<PreparedDataset<R>> {
    let dataset = R::DATASET;
    let files = discover_survey_files(folder, dataset)?;
    let surveys = read_surveys(&files, dataset)?;

    let DescriptorSet { descriptors, excluded } =
        extract_descriptors::<R>(&surveys, config.min_points(dataset))?;
    let surveys = decode_surveys::<R>(&surveys, &descriptors)?;

    info!(
        "{}: {} survey(s) kept, {} excluded below {} points",
        dataset,
        descriptors.len(),
        excluded.len(),
        config.min_points(dataset)
    );
    Ok(PreparedDataset { folder: folder.to_path_buf(), descriptors, excluded, surveys })
}

/// Record the exclusions of a dataset and fail when nothing qualified.
fn check_dataset<R: SurveyRecord>(prepared: &PreparedDataset<R>, renamed_dir: &Path) -> Result<()> {
    let dataset = R::DATASET;
    write_exclusions(&renamed_dir.join(dataset.exclusion_file()), &prepared.excluded)?;

    if prepared.descriptors.is_empty() {
        return Err(PreprocessError::EmptyInput { dataset, folder: prepared.folder.clone() });
    }
    Ok(())
}

/// Order, rename and stitch the segments of one dataset.
fn order_dataset<R: SurveyRecord>(
    prepared: PreparedDataset<R>,
    seed: SeedStrategy,
    config: &PreprocessConfig,
    renamed_dir: &Path,
) -> Result<OrderedDataset<R>> {
    let dataset = R::DATASET;
    let tour = build_tour(prepared.descriptors, seed, &config.river_prefix(), dataset);
    for segment in &tour {
        let head = segment.head();
        info!(
            "{} -> {}{} starting at ({:.6}, {:.6})",
            segment.descriptor.source.display(),
            segment.assigned_name,
            if segment.reversed { " (reversed)" } else { "" },
            head.y,
            head.x
        );
    }

    copy_renamed(&tour, &config.output_dir)?;
    write_directory_listing(&renamed_dir.join(dataset.directory_file()), &tour, renamed_dir)?;

    let track = stitch_segments(&tour, prepared.surveys)?;
    Ok(OrderedDataset { tour, track })
}

pub fn run(inputs: &RunInputs, config: &PreprocessConfig) -> Result<RunReport> {
    let river = config.river_prefix();
    let out = &config.output_dir;
    let renamed_dir = out.join(RENAMED_DIR);

    // Every input is validated before the first output is written.
    let depth_offset = read_depth_offset(&inputs.ini_file)?;
    println!("📂 Reading resistivity surveys...");
    let resistivity = prepare_dataset::<ResistivityRecord>(&inputs.resistivity_dir, config)?;
    println!("📂 Reading water-quality surveys...");
    let water = prepare_dataset::<WaterQualityRecord>(&inputs.water_quality_dir, config)?;

    ensure_directory(&renamed_dir)?;
    check_dataset(&resistivity, &renamed_dir)?;
    check_dataset(&water, &renamed_dir)?;

    let mut report = RunReport {
        excluded_resistivity: resistivity.excluded.len(),
        excluded_water_quality: water.excluded.len(),
        ..Default::default()
    };

    println!("🧭 Ordering resistivity surveys...");
    let resistivity = order_dataset(resistivity, SeedStrategy::FarthestStart, config, &renamed_dir)?;
    report.overlap_dropped += resistivity.track.total_dropped();
    report.resistivity_files = resistivity.tour.iter().map(|s| s.assigned_name.clone()).collect();

    let combined = out.join(COMBINED_RESISTIVITY_FILE);
    write_combined_raw(&combined, &resistivity.track, &river)?;
    report.outputs.push(combined);

    println!("⚙️  Processing resistivity data...");
    let soundings = process_resistivity(resistivity.track, depth_offset, config);
    report.resistivity_points = soundings.len();
    report.total_km = total_distance_km(&soundings);

    let anchor = soundings
        .first()
        .map(|p| p.record.position())
        .ok_or_else(|| PreprocessError::EmptyInput {
            dataset: Dataset::Resistivity,
            folder: inputs.resistivity_dir.clone(),
        })?;

    let res_csv = out.join(format!("{river}_RESISTIVITY.csv"));
    write_resistivity_csv(&res_csv, &soundings)?;
    let res_gpx = out.join(format!("{river}_RESISTIVITY.gpx"));
    write_track_gpx(&res_gpx, &format!("{river} resistivity"), resistivity_track_points(&soundings))?;
    report.outputs.extend([res_csv, res_gpx]);
    println!("✅ Resistivity data exported");

    println!("🧭 Ordering water-quality surveys...");
    let water = order_dataset(water, SeedStrategy::Anchored(anchor), config, &renamed_dir)?;
    report.overlap_dropped += water.track.total_dropped();
    report.water_quality_files = water.tour.iter().map(|s| s.assigned_name.clone()).collect();

    println!("⚙️  Processing water-quality data...");
    let readings = process_water_quality(water.track, config);
    report.water_quality_points = readings.len();

    let wq_csv = out.join(format!("{river}_WQ.csv"));
    write_water_quality_csv(&wq_csv, &readings)?;
    let wq_gpx = out.join(format!("{river}_WQ.gpx"));
    write_track_gpx(&wq_gpx, &format!("{river} water quality"), water_quality_track_points(&readings))?;
    report.outputs.extend([wq_csv, wq_gpx]);
    println!("✅ Water-quality data exported");

    println!("🔗 Joining water quality onto resistivity...");
    let merged = spatial_join(&soundings, &readings, config.join_buffer_m, config.interpolation_limit);
    report.merged_rows = merged.len();
    let merged_csv = out.join(format!("{river}_MERGED.csv"));
    write_merged_csv(&merged_csv, &merged)?;
    report.outputs.push(merged_csv);

    let summary = out.join(SUMMARY_FILE);
    write_summary(
        &summary,
        Local::now(),
        report.total_km,
        &report.resistivity_files,
        &report.water_quality_files,
    )?;
    report.outputs.push(summary);

    info!(
        "Run complete: {} sounding(s), {} reading(s), {} merged row(s), {:.2} km",
        report.resistivity_points, report.water_quality_points, report.merged_rows, report.total_km
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;
    use crate::records::RESISTIVITY_COLUMNS;
    use crate::survey_reader::test_support::{write_resistivity_file, write_water_quality_file};

    struct Fixture {
        _dir: tempfile::TempDir,
        inputs: RunInputs,
        config: PreprocessConfig,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let res_dir = dir.path().join("res");
        let wq_dir = dir.path().join("wq");
        let out_dir = dir.path().join("out");
        fs::create_dir_all(&res_dir).unwrap();
        fs::create_dir_all(&wq_dir).unwrap();

        // r2 was driven against the current and must be flipped.
        write_resistivity_file(&res_dir, "r1.txt", (-93.000, 38.500), (-93.010, 38.505), 120);
        write_resistivity_file(&res_dir, "r2.txt", (-93.020, 38.510), (-93.0105, 38.5053), 120);
        write_resistivity_file(&res_dir, "r3.txt", (-93.0205, 38.5102), (-93.030, 38.515), 120);
        write_resistivity_file(&res_dir, "short.txt", (-93.5, 38.7), (-93.6, 38.8), 50);

        write_water_quality_file(&wq_dir, "wq_b.csv", (-93.0155, 38.5078), (-93.030, 38.515), 10);
        write_water_quality_file(&wq_dir, "wq_a.csv", (-93.000, 38.500), (-93.015, 38.5075), 10);

        let ini = dir.path().join("survey.ini");
        fs::write(&ini, "[SwitchPro]\nDepthOffset=-0.3\n").unwrap();

        let config = PreprocessConfig {
            river: "Gasconade".into(),
            output_dir: out_dir,
            rolling_window: 5,
            ..Default::default()
        };
        let inputs = RunInputs { resistivity_dir: res_dir, water_quality_dir: wq_dir, ini_file: ini };
        Fixture { _dir: dir, inputs, config }
    }

    #[test]
    fn test_full_run() {
        let f = fixture();
        let report = run(&f.inputs, &f.config).unwrap();
        let out = &f.config.output_dir;

        assert_eq!(report.resistivity_files, vec!["Gasconade_001.txt", "Gasconade_002.txt", "Gasconade_003.txt"]);
        assert_eq!(report.water_quality_files, vec!["Gasconade_001_WQ.csv", "Gasconade_002_WQ.csv"]);
        assert_eq!(report.excluded_resistivity, 1);
        assert_eq!(report.excluded_water_quality, 0);
        // One stitch point dropped per joined segment in each dataset.
        assert_eq!(report.overlap_dropped, 3);
        assert_eq!(report.resistivity_points, 358);
        assert!(report.merged_rows >= report.resistivity_points);
        assert!(report.total_km > 2.5 && report.total_km < 3.5, "{}", report.total_km);

        let listing =
            fs::read_to_string(out.join("Raw_Data_Renamed/RENAMED_RESISTIVITY_FILE_DIRECTORY.txt")).unwrap();
        let lines: Vec<_> = listing.lines().collect();
        assert!(lines[1].contains("r1.txt,false,"));
        assert!(lines[2].contains("r2.txt,true,"));
        assert!(lines[3].contains("r3.txt,false,"));

        let wq_listing = fs::read_to_string(out.join("Raw_Data_Renamed/RENAMED_WQ_FILE_DIRECTORY.txt")).unwrap();
        assert!(wq_listing.lines().nth(1).unwrap().contains("wq_a.csv,false,"));

        let excluded = fs::read_to_string(out.join("Raw_Data_Renamed/EXCLUDED_SURVEYS_RES.txt")).unwrap();
        assert!(excluded.contains("short.txt,50"));

        for name in [
            "all.txt",
            "Gasconade_RESISTIVITY.csv",
            "Gasconade_RESISTIVITY.gpx",
            "Gasconade_WQ.csv",
            "Gasconade_WQ.gpx",
            "Gasconade_MERGED.csv",
            "Raw_Data_Renamed/Gasconade_002.txt",
            "Raw_Data_Renamed/Gasconade_002_WQ.csv",
        ] {
            assert!(out.join(name).is_file(), "missing {name}");
        }

        let summary = fs::read_to_string(out.join(SUMMARY_FILE)).unwrap();
        assert!(summary.contains("Number of resistivity files read: 3"));
        assert!(summary.contains("Number of water quality files read: 2"));

        let mut merged = csv::Reader::from_path(out.join("Gasconade_MERGED.csv")).unwrap();
        let headers = merged.headers().unwrap().clone();
        let ohm = headers.iter().position(|h| h == "Ohm_m").unwrap();
        let date = headers.iter().position(|h| h == "Date").unwrap();
        let rows: Vec<_> = merged.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), report.merged_rows);
        assert!(rows.iter().any(|r| !r.get(date).unwrap().is_empty()));
        assert!(rows.iter().all(|r| r.get(ohm).unwrap() != "*"));
    }

    #[test]
    fn test_deterministic_outputs() {
        let f = fixture();
        run(&f.inputs, &f.config).unwrap();
        let first = fs::read_to_string(f.config.output_dir.join("Gasconade_MERGED.csv")).unwrap();
        run(&f.inputs, &f.config).unwrap();
        let second = fs::read_to_string(f.config.output_dir.join("Gasconade_MERGED.csv")).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_only_short_surveys_is_empty_input() {
        let f = fixture();
        for name in ["r1.txt", "r2.txt", "r3.txt"] {
            fs::remove_file(f.inputs.resistivity_dir.join(name)).unwrap();
        }
        let err = run(&f.inputs, &f.config).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyInput { dataset: Dataset::Resistivity, .. }));

        let excluded =
            fs::read_to_string(f.config.output_dir.join("Raw_Data_Renamed/EXCLUDED_SURVEYS_RES.txt")).unwrap();
        assert_eq!(excluded.lines().count(), 2);
    }

    #[test]
    fn test_bad_ini_stops_before_ordering() {
        let f = fixture();
        fs::write(&f.inputs.ini_file, "[SwitchPro]\nGain=2\n").unwrap();
        let err = run(&f.inputs, &f.config).unwrap_err();
        assert!(matches!(err, PreprocessError::Ini { .. }));
        assert!(!f.config.output_dir.join("all.txt").exists());
    }

    fn assert_nothing_ordered(out: &Path) {
        for name in [
            "all.txt",
            "Gasconade_RESISTIVITY.csv",
            "Gasconade_RESISTIVITY.gpx",
            "Raw_Data_Renamed/RENAMED_RESISTIVITY_FILE_DIRECTORY.txt",
            "Raw_Data_Renamed/Gasconade_001.txt",
        ] {
            assert!(!out.join(name).exists(), "unexpected {name}");
        }
    }

    #[test]
    fn test_empty_water_quality_folder_stops_before_resistivity_output() {
        let f = fixture();
        for name in ["wq_a.csv", "wq_b.csv"] {
            fs::remove_file(f.inputs.water_quality_dir.join(name)).unwrap();
        }
        let err = run(&f.inputs, &f.config).unwrap_err();
        assert!(matches!(err, PreprocessError::EmptyInput { dataset: Dataset::WaterQuality, .. }));
        assert_nothing_ordered(&f.config.output_dir);
    }

    #[test]
    fn test_malformed_water_quality_leaves_no_output() {
        let f = fixture();
        let path = f.inputs.water_quality_dir.join("wq_a.csv");
        let bytes = fs::read(&path).unwrap();
        let units: Vec<u16> = bytes[2..].chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        let text = String::from_utf16(&units).unwrap().replace("38.5075,-93.015", "38.5075,abc");
        let mut rewritten = vec![0xFF, 0xFE];
        for unit in text.encode_utf16() {
            rewritten.extend_from_slice(&unit.to_le_bytes());
        }
        fs::write(&path, rewritten).unwrap();

        let err = run(&f.inputs, &f.config).unwrap_err();
        assert!(matches!(err, PreprocessError::Format { .. }));
        assert_nothing_ordered(&f.config.output_dir);
        assert!(!f.config.output_dir.join(RENAMED_DIR).exists());
    }

    #[test]
    fn test_bad_interior_latitude_writes_no_listing() {
        let f = fixture();
        let path = f.inputs.resistivity_dir.join("r2.txt");
        let lat = RESISTIVITY_COLUMNS.iter().position(|c| *c == "Latitude").unwrap();
        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<String> = content
            .lines()
            .enumerate()
            .map(|(i, line)| {
                if i != 60 {
                    return line.to_string();
                }
                let mut fields: Vec<&str> = line.split(';').collect();
                fields[lat] = "38xx.123";
                fields.join(";")
            })
            .collect();
        fs::write(&path, lines.join("\n")).unwrap();

        let err = run(&f.inputs, &f.config).unwrap_err();
        assert!(matches!(err, PreprocessError::Format { .. }));
        assert_nothing_ordered(&f.config.output_dir);
        assert!(!f.config.output_dir.join(RENAMED_DIR).exists());
    }
}
