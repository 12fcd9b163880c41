/// Great-circle distance and degrees-decimal-minutes decoding
///
/// Positions are `geo::Coord` with `x` = longitude and `y` = latitude, in
/// decimal degrees.

use geo::Coord;

/// Earth radius used by every ordering distance, in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Haversine distance between two (lon, lat) pairs in kilometres.
///
/// geo's `HaversineDistance` uses the IUGG mean radius (6371008.8 m), which
/// shifts near-tie comparisons; segment ordering must use 6371 km.
pub fn haversine_km(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    let (lon1, lat1, lon2, lat2) = (
        lon1.to_radians(),
        lat1.to_radians(),
        lon2.to_radians(),
        lat2.to_radians(),
    );

    let dlon = lon2 - lon1;
    let dlat = lat2 - lat1;
    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    c * EARTH_RADIUS_KM
}

/// Haversine distance between two positions, `from` first.
pub fn coord_distance_km(from: Coord<f64>, to: Coord<f64>) -> f64 {
    haversine_km(from.x, from.y, to.x, to.y)
}

/// Which axis a packed DDM value encodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl Axis {
    /// Characters holding whole degrees at the front of the packed value.
    fn degree_width(self) -> usize {
        match self {
            Axis::Latitude => 2,
            Axis::Longitude => 3,
        }
    }

    pub fn field_name(self) -> &'static str {
        match self {
            Axis::Latitude => "Latitude",
            Axis::Longitude => "Longitude",
        }
    }
}

/// Decode packed degrees-decimal-minutes text into decimal degrees.
///
/// `4512.345` as latitude is 45 deg + 12.345 min. Longitude carries its sign in
/// the three-character degree prefix (`-9012.345`), so minutes are subtracted.
/// A value that is numerically zero means "no fix" and decodes to 0.0.
///
/// Returns `None` when the text is not numeric or cannot be split.
pub fn decode_ddm(text: &str, axis: Axis) -> Option<f64> {
    let text = text.trim();
    let whole: f64 = text.parse().ok()?;
    if whole == 0.0 {
        return Some(0.0);
    }

    let width = axis.degree_width();
    let degrees: f64 = text.get(..width)?.parse().ok()?;
    let minutes: f64 = text.get(width..)?.parse().ok()?;

    match axis {
        Axis::Latitude => Some(degrees + minutes / 60.0),
        Axis::Longitude => Some(degrees - minutes / 60.0),
    }
}

/// Parse a field that already holds decimal degrees.
pub fn parse_decimal_degrees(text: &str) -> Option<f64> {
    text.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_symmetry() {
        let pairs = [
            ((-90.0, 30.0), (-90.1, 30.1)),
            ((-89.0, 29.0), (-95.0, 35.0)),
            ((-93.25, 38.61), (-93.2501, 38.6102)),
        ];
        for ((lon1, lat1), (lon2, lat2)) in pairs {
            let ab = haversine_km(lon1, lat1, lon2, lat2);
            let ba = haversine_km(lon2, lat2, lon1, lat1);
            assert!(((ab - ba) / ab).abs() < 1e-9, "{ab} vs {ba}");
        }
    }

    #[test]
    fn test_distance_known_values() {
        // One degree of latitude on a 6371 km sphere.
        let d = haversine_km(-90.0, 30.0, -90.0, 31.0);
        assert!((d - 111.19492664455873).abs() < 1e-9);

        assert_eq!(haversine_km(-90.0, 30.0, -90.0, 30.0), 0.0);

        let anchor_to_near = haversine_km(-90.01, 30.01, -90.0, 30.0);
        assert!((anchor_to_near - 1.4709).abs() < 1e-3);
    }

    #[test]
    fn test_decode_latitude() {
        let lat = decode_ddm("4512.345", Axis::Latitude).unwrap();
        assert!((lat - (45.0 + 12.345 / 60.0)).abs() < 1e-12);
    }

    #[test]
    fn test_decode_longitude_subtracts_minutes() {
        let lon = decode_ddm("-9012.345", Axis::Longitude).unwrap();
        assert!((lon - (-90.0 - 12.345 / 60.0)).abs() < 1e-12);

        // Unsigned longitude stays positive and is rejected downstream.
        let lon = decode_ddm("09012.345", Axis::Longitude).unwrap();
        assert!(lon > 0.0);
    }

    #[test]
    fn test_decode_no_fix_and_garbage() {
        assert_eq!(decode_ddm("0", Axis::Longitude), Some(0.0));
        assert_eq!(decode_ddm("0.0", Axis::Latitude), Some(0.0));
        assert_eq!(decode_ddm("45x2.1", Axis::Latitude), None);
        assert_eq!(decode_ddm("", Axis::Latitude), None);
        assert_eq!(decode_ddm("45", Axis::Latitude), None);
    }

    #[test]
    fn test_parse_decimal_degrees() {
        assert_eq!(parse_decimal_degrees(" -90.25 "), Some(-90.25));
        assert_eq!(parse_decimal_degrees("NaN"), None);
        assert_eq!(parse_decimal_degrees("abc"), None);
    }
}
