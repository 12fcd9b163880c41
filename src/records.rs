/// Named record types for the two survey instruments
///
/// Raw rows are mapped from column positions to named fields exactly once,
/// here. Nothing downstream looks at column indices again.

use std::fmt;

use csv::StringRecord;
use geo::Coord;

use crate::error::FormatProblem;
use crate::geodesy::{decode_ddm, parse_decimal_degrees, Axis};

/// The two survey datasets a run processes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dataset {
    Resistivity,
    WaterQuality,
}

impl Dataset {
    /// Extension of the raw survey files.
    pub fn extension(self) -> &'static str {
        match self {
            Dataset::Resistivity => "txt",
            Dataset::WaterQuality => "csv",
        }
    }

    /// Segments with fewer points than this are excluded before ordering.
    pub fn default_min_points(self) -> usize {
        match self {
            Dataset::Resistivity => 100,
            Dataset::WaterQuality => 2,
        }
    }

    /// Name given to the segment at `sequence_index` (1-based).
    pub fn segment_name(self, river: &str, sequence_index: usize) -> String {
        match self {
            Dataset::Resistivity => format!("{}_{:03}.txt", river, sequence_index),
            Dataset::WaterQuality => format!("{}_{:03}_WQ.csv", river, sequence_index),
        }
    }

    pub fn exclusion_file(self) -> &'static str {
        match self {
            Dataset::Resistivity => "EXCLUDED_SURVEYS_RES.txt",
            Dataset::WaterQuality => "EXCLUDED_SURVEYS_WQ.txt",
        }
    }

    pub fn directory_file(self) -> &'static str {
        match self {
            Dataset::Resistivity => "RENAMED_RESISTIVITY_FILE_DIRECTORY.txt",
            Dataset::WaterQuality => "RENAMED_WQ_FILE_DIRECTORY.txt",
        }
    }
}

impl fmt::Display for Dataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dataset::Resistivity => f.write_str("resistivity"),
            Dataset::WaterQuality => f.write_str("water-quality"),
        }
    }
}

/// A decoded row plus the number of measurement fields that could not be
/// read as numbers and were recorded as missing.
#[derive(Debug, Clone)]
pub struct Decoded<R> {
    pub record: R,
    pub missing_fields: usize,
}

/// One measurement point of a survey file.
pub trait SurveyRecord: Clone {
    const DATASET: Dataset;

    /// Decimal-degree position of a raw row. Used for segment endpoints
    /// before the full row is decoded.
    fn raw_position(row: &StringRecord, line: usize) -> Result<Coord<f64>, FormatProblem>;

    fn from_row(row: &StringRecord, line: usize) -> Result<Decoded<Self>, FormatProblem>;

    /// (lon, lat) in decimal degrees.
    fn position(&self) -> Coord<f64>;

    /// True when the instrument logged no GPS fix for this point.
    fn lacks_fix(&self) -> bool {
        let p = self.position();
        p.x == 0.0 || p.y == 0.0
    }
}

/// Reads named fields out of a raw row, tallying values that were present
/// but not numeric.
struct FieldReader<'a> {
    row: &'a StringRecord,
    missing: usize,
}

impl<'a> FieldReader<'a> {
    fn new(row: &'a StringRecord) -> Self {
        FieldReader { row, missing: 0 }
    }

    fn text(&self, index: usize) -> String {
        self.row.get(index).unwrap_or("").trim().to_string()
    }

    fn number(&mut self, index: usize) -> f64 {
        let raw = self.row.get(index).unwrap_or("").trim();
        if raw.is_empty() {
            return f64::NAN;
        }
        match raw.parse::<f64>() {
            Ok(value) => value,
            Err(_) => {
                self.missing += 1;
                f64::NAN
            }
        }
    }

    fn numbers<const N: usize>(&mut self, first: usize, stride: usize) -> [f64; N] {
        let mut values = [f64::NAN; N];
        for (i, value) in values.iter_mut().enumerate() {
            *value = self.number(first + i * stride);
        }
        values
    }
}

fn unparseable(field: &'static str, line: usize, value: &str) -> FormatProblem {
    FormatProblem::Unparseable { field, line, value: value.trim().to_string() }
}

/// Named columns of a raw resistivity row, in file order.
pub const RESISTIVITY_COLUMNS: [&str; 51] = [
    "Distance", "Depth", "Rho 1", "Rho 2", "Rho 3", "Rho 4", "Rho 5", "Rho 6", "Rho 7", "Rho 8",
    "Rho 9", "Rho 10", "C1", "C2", "P1", "P2", "P3", "P4", "P5", "P6", "P7", "P8", "P9", "P10",
    "P11", "Latitude", "Longitude", "In_p", "In_n", "V1_p", "V1_n", "V2_p", "V2_n", "V3_p",
    "V3_n", "V4_p", "V4_n", "V5_p", "V5_n", "V6_p", "V6_n", "V7_p", "V7_n", "V8_p", "V8_n",
    "V9_p", "V9_n", "V10_p", "V10_n", "GPSString", "HDOP",
];

// Resistivity column layout (`;`-delimited).
mod res_col {
    pub const DISTANCE: usize = 0;
    pub const DEPTH: usize = 1;
    pub const RHO: usize = 2;
    pub const C1: usize = 12;
    pub const C2: usize = 13;
    pub const P: usize = 14;
    pub const LATITUDE: usize = 25;
    pub const LONGITUDE: usize = 26;
    pub const IN_P: usize = 27;
    pub const IN_N: usize = 28;
    pub const V1_P: usize = 29;
    pub const GPS_STRING: usize = 49;
}

/// Fields of the NMEA GGA sentence the echo sounder's GPS writes per point.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GgaFix {
    pub utc: String,
    pub fix_quality: f64,
    pub satellites: f64,
    pub hdop: f64,
    pub altitude: f64,
    pub geoid_height: f64,
}

impl GgaFix {
    /// `$GPGGA,utc,lat,N,lon,W,quality,sats,hdop,alt,M,geoid,M,...`
    pub fn parse(sentence: &str) -> Self {
        let parts: Vec<&str> = sentence.split(',').map(str::trim).collect();
        let number = |i: usize| -> f64 {
            parts.get(i).and_then(|s| s.parse::<f64>().ok()).unwrap_or(f64::NAN)
        };

        GgaFix {
            utc: parts.get(1).map(|s| s.to_string()).unwrap_or_default(),
            fix_quality: number(6),
            satellites: number(7),
            hdop: number(8),
            altitude: number(9),
            geoid_height: number(11),
        }
    }
}

/// One resistivity sounding.
#[derive(Debug, Clone)]
pub struct ResistivityRecord {
    pub distance: f64,
    pub depth: f64,
    pub rho: [f64; 10],
    pub c1: f64,
    pub c2: f64,
    pub p: [f64; 11],
    pub latitude: f64,
    pub longitude: f64,
    pub current_pos: f64,
    pub current_neg: f64,
    pub voltage_pos: [f64; 10],
    pub voltage_neg: [f64; 10],
    pub gps: GgaFix,
    /// The untouched source row, kept for the combined raw export.
    pub raw: StringRecord,
}

impl SurveyRecord for ResistivityRecord {
    const DATASET: Dataset = Dataset::Resistivity;

    fn raw_position(row: &StringRecord, line: usize) -> Result<Coord<f64>, FormatProblem> {
        let lat_text = row.get(res_col::LATITUDE).unwrap_or("");
        let lon_text = row.get(res_col::LONGITUDE).unwrap_or("");

        let lat = decode_ddm(lat_text, Axis::Latitude)
            .ok_or_else(|| unparseable(Axis::Latitude.field_name(), line, lat_text))?;
        let lon = decode_ddm(lon_text, Axis::Longitude)
            .ok_or_else(|| unparseable(Axis::Longitude.field_name(), line, lon_text))?;

        Ok(Coord { x: lon, y: lat })
    }

    fn from_row(row: &StringRecord, line: usize) -> Result<Decoded<Self>, FormatProblem> {
        let position = Self::raw_position(row, line)?;
        let mut fields = FieldReader::new(row);

        let record = ResistivityRecord {
            distance: fields.number(res_col::DISTANCE),
            depth: fields.number(res_col::DEPTH),
            rho: fields.numbers::<10>(res_col::RHO, 1),
            c1: fields.number(res_col::C1),
            c2: fields.number(res_col::C2),
            p: fields.numbers::<11>(res_col::P, 1),
            latitude: position.y,
            longitude: position.x,
            current_pos: fields.number(res_col::IN_P),
            current_neg: fields.number(res_col::IN_N),
            voltage_pos: fields.numbers::<10>(res_col::V1_P, 2),
            voltage_neg: fields.numbers::<10>(res_col::V1_P + 1, 2),
            gps: GgaFix::parse(&fields.text(res_col::GPS_STRING)),
            raw: row.clone(),
        };

        Ok(Decoded { record, missing_fields: fields.missing })
    }

    fn position(&self) -> Coord<f64> {
        Coord { x: self.longitude, y: self.latitude }
    }
}

// Water-quality column layout (`,`-delimited, after the preamble).
mod wq_col {
    pub const DATE: usize = 0;
    pub const TIME: usize = 1;
    pub const TEMP_C: usize = 2;
    pub const PRESSURE_MMHG: usize = 3;
    pub const DO_PERCENT: usize = 4;
    pub const SPC_US_CM: usize = 5;
    pub const COND_US_CM: usize = 6;
    pub const RES_OHM_CM: usize = 7;
    pub const PH: usize = 8;
    pub const NH4_MG_L: usize = 9;
    pub const NO3_MG_L: usize = 10;
    pub const CL_MG_L: usize = 11;
    pub const TURBIDITY_FNU: usize = 12;
    pub const TSS_MG_L: usize = 13;
    pub const DEPTH_M: usize = 14;
    pub const ALTITUDE_M: usize = 15;
    pub const LAT: usize = 16;
    pub const LON: usize = 17;
}

/// Sonde output for a resistivity value beyond the sensor's range.
pub const OVER_RANGE_SENTINEL: &str = "+++++";

/// One multiparameter sonde reading.
#[derive(Debug, Clone)]
pub struct WaterQualityRecord {
    pub date: String,
    pub time: String,
    pub temp_c: f64,
    pub pressure_mmhg: f64,
    pub dissolved_oxygen_pct: f64,
    pub specific_conductance_us_cm: f64,
    pub conductivity_us_cm: f64,
    pub resistivity_ohm_cm: f64,
    pub resistivity_over_range: bool,
    pub ph: f64,
    pub ammonium_mg_l: f64,
    pub nitrate_mg_l: f64,
    pub chloride_mg_l: f64,
    pub turbidity_fnu: f64,
    pub tss_mg_l: f64,
    pub depth_m: f64,
    pub altitude_m: f64,
    pub latitude: f64,
    pub longitude: f64,
}

impl SurveyRecord for WaterQualityRecord {
    const DATASET: Dataset = Dataset::WaterQuality;

    fn raw_position(row: &StringRecord, line: usize) -> Result<Coord<f64>, FormatProblem> {
        let lat_text = row.get(wq_col::LAT).unwrap_or("");
        let lon_text = row.get(wq_col::LON).unwrap_or("");

        let lat = parse_decimal_degrees(lat_text).ok_or_else(|| unparseable("Lat", line, lat_text))?;
        let lon = parse_decimal_degrees(lon_text).ok_or_else(|| unparseable("Lon", line, lon_text))?;

        Ok(Coord { x: lon, y: lat })
    }

    fn from_row(row: &StringRecord, line: usize) -> Result<Decoded<Self>, FormatProblem> {
        let position = Self::raw_position(row, line)?;
        let mut fields = FieldReader::new(row);

        let over_range = fields.text(wq_col::RES_OHM_CM) == OVER_RANGE_SENTINEL;
        let resistivity_ohm_cm = if over_range {
            f64::NAN
        } else {
            fields.number(wq_col::RES_OHM_CM)
        };

        let record = WaterQualityRecord {
            date: fields.text(wq_col::DATE),
            time: fields.text(wq_col::TIME),
            temp_c: fields.number(wq_col::TEMP_C),
            pressure_mmhg: fields.number(wq_col::PRESSURE_MMHG),
            dissolved_oxygen_pct: fields.number(wq_col::DO_PERCENT),
            specific_conductance_us_cm: fields.number(wq_col::SPC_US_CM),
            conductivity_us_cm: fields.number(wq_col::COND_US_CM),
            resistivity_ohm_cm,
            resistivity_over_range: over_range,
            ph: fields.number(wq_col::PH),
            ammonium_mg_l: fields.number(wq_col::NH4_MG_L),
            nitrate_mg_l: fields.number(wq_col::NO3_MG_L),
            chloride_mg_l: fields.number(wq_col::CL_MG_L),
            turbidity_fnu: fields.number(wq_col::TURBIDITY_FNU),
            tss_mg_l: fields.number(wq_col::TSS_MG_L),
            depth_m: fields.number(wq_col::DEPTH_M),
            altitude_m: fields.number(wq_col::ALTITUDE_M),
            latitude: position.y,
            longitude: position.x,
        };

        Ok(Decoded { record, missing_fields: fields.missing })
    }

    fn position(&self) -> Coord<f64> {
        Coord { x: self.longitude, y: self.latitude }
    }
}
