use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, LevelFilter};

mod config;
mod descriptor;
mod error;
mod export;
mod filters;
mod geodesy;
mod pipeline;
mod projection;
mod records;
mod resistivity;
mod spatial_join;
mod stitcher;
mod survey_reader;
mod tour_builder;
mod water_quality;

use config::{ensure_directory, DirOutcome, PreprocessConfig};
use pipeline::{run, RunInputs};
use projection::UtmZone;

const LOG_FILE: &str = "OASIS_PREPROCESSING_LOGFILE.txt";

#[derive(Parser, Debug)]
#[command(name = "oasis-preprocessor")]
#[command(about = "Order, stitch and merge river resistivity and water-quality surveys", long_about = None)]
struct Cli {
    /// River reach name, used as the prefix of every renamed file
    #[arg(short, long, default_value = "RIVER")]
    river: String,

    /// Folder holding the raw resistivity .txt files
    #[arg(long)]
    resistivity_dir: PathBuf,

    /// Folder holding the raw water-quality .csv files
    #[arg(long)]
    water_quality_dir: PathBuf,

    /// INI file used to collect the resistivity data
    #[arg(long)]
    ini: PathBuf,

    /// Folder receiving every output
    #[arg(short, long)]
    output_dir: PathBuf,

    /// Minimum points for a resistivity survey to be kept
    #[arg(long, default_value = "100")]
    min_resistivity_points: usize,

    /// Minimum points for a water-quality survey to be kept
    #[arg(long, default_value = "2")]
    min_water_quality_points: usize,

    /// Rolling mean window, in points
    #[arg(long, default_value = "20")]
    window: usize,

    /// Upper bound of the resistivity bandpass (ohm-m)
    #[arg(long, default_value = "250")]
    rho_max: f64,

    /// Spatial join radius in metres
    #[arg(long, default_value = "5")]
    buffer: f64,

    /// Longest run of joined gaps filled by interpolation
    #[arg(long, default_value = "20")]
    interpolation_limit: usize,

    /// Target projection, a WGS84 UTM EPSG code (326xx or 327xx)
    #[arg(long, default_value = "32615")]
    epsg: u32,

    /// Also log debug detail
    #[arg(short, long)]
    verbose: bool,
}

fn init_logging(output_dir: &Path, verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    let log_file = File::create(output_dir.join(LOG_FILE))?;
    let level = if verbose { LevelFilter::Debug } else { LevelFilter::Info };

    env_logger::Builder::new()
        .filter_level(level)
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format(|buf, record| {
            writeln!(
                buf,
                "{} {}: {}",
                chrono::Local::now().format("%m/%d/%Y %I:%M:%S %p"),
                record.level(),
                record.args()
            )
        })
        .init();
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let utm = UtmZone::from_epsg(cli.epsg)
        .ok_or_else(|| format!("EPSG:{} is not a WGS84 UTM zone", cli.epsg))?;

    if ensure_directory(&cli.output_dir)? == DirOutcome::Created {
        println!("📁 Created output folder {}", cli.output_dir.display());
    }
    init_logging(&cli.output_dir, cli.verbose)?;

    let config = PreprocessConfig {
        river: cli.river,
        output_dir: cli.output_dir,
        min_points_resistivity: cli.min_resistivity_points,
        min_points_water_quality: cli.min_water_quality_points,
        rolling_window: cli.window,
        rho_band: (0.0, cli.rho_max),
        join_buffer_m: cli.buffer,
        interpolation_limit: cli.interpolation_limit,
        utm,
        ..Default::default()
    };
    let inputs = RunInputs {
        resistivity_dir: cli.resistivity_dir,
        water_quality_dir: cli.water_quality_dir,
        ini_file: cli.ini,
    };

    println!("\n🌊 OASIS SURVEY PREPROCESSING");
    println!("=============================");
    println!("River reach: {}", config.river_prefix());
    println!("Output:      {}", config.output_dir.display());
    println!("Projection:  EPSG:{}", config.utm.epsg());
    println!();

    let report = match run(&inputs, &config) {
        Ok(report) => report,
        Err(e) => {
            error!("{}", e);
            eprintln!("❌ {}", e);
            return Err(e.into());
        }
    };

    println!("\n📊 SUMMARY");
    println!("==========");
    println!("Resistivity files:   {} ({} excluded)", report.resistivity_files.len(), report.excluded_resistivity);
    println!("Water-quality files: {} ({} excluded)", report.water_quality_files.len(), report.excluded_water_quality);
    println!("Overlap points dropped: {}", report.overlap_dropped);
    println!("Soundings: {}, readings: {}, merged rows: {}", report.resistivity_points, report.water_quality_points, report.merged_rows);
    println!("Total distance processed: {:.2} km", report.total_km);
    println!("\n📁 Outputs:");
    for path in &report.outputs {
        println!("   {}", path.display());
    }
    println!("\n✅ Preprocessing complete");

    Ok(())
}
