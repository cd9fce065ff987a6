use chrono::NaiveDateTime;
use tracing::{debug, trace};

/// Decimal-degree coordinates, south and west negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GpsCoordinates {
    pub latitude: f64,
    pub longitude: f64,
}

impl GpsCoordinates {
    /// Fixed-point rendering used when no place name is available,
    /// e.g. "30.250000N 120.150000E".
    pub fn format_fixed(&self) -> String {
        format!(
            "{:.6}{} {:.6}{}",
            self.latitude.abs(),
            if self.latitude < 0.0 { "S" } else { "N" },
            self.longitude.abs(),
            if self.longitude < 0.0 { "W" } else { "E" },
        )
    }
}

/// What the watermark can use from an image's embedded metadata. Both fields
/// degrade to `None` independently; this reader never fails.
#[derive(Debug, Clone, Default)]
pub struct CaptureInfo {
    pub timestamp: Option<NaiveDateTime>,
    pub gps: Option<GpsCoordinates>,
}

/// Capture time is kept as local wall-clock time, the way cameras record it;
/// no timezone normalization is attempted.
pub fn read_capture_info(bytes: &[u8]) -> CaptureInfo {
    let exif = match rexif::parse_buffer(bytes) {
        Ok(data) => data,
        Err(e) => {
            trace!("no EXIF data: {}", e);
            return CaptureInfo::default();
        }
    };

    CaptureInfo {
        timestamp: extract_capture_date(&exif),
        gps: extract_gps(&exif),
    }
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format("%Y-%m-%d  %H:%M:%S").to_string()
}

fn extract_capture_date(exif: &rexif::ExifData) -> Option<NaiveDateTime> {
    // Date fields in order of preference.
    let date_fields = [
        rexif::ExifTag::DateTimeOriginal,
        rexif::ExifTag::DateTimeDigitized,
        rexif::ExifTag::DateTime,
    ];

    for field in &date_fields {
        if let Some(entry) = exif.entries.iter().find(|e| e.tag == *field) {
            if let Some(date) = parse_exif_datetime(&entry.value_more_readable) {
                debug!("found capture date in {:?}: {}", field, date);
                return Some(date);
            }
        }
    }

    None
}

fn parse_exif_datetime(datetime_str: &str) -> Option<NaiveDateTime> {
    // EXIF datetime format: "2005:07:30 07:22:46"
    let formats = ["%Y:%m:%d %H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y/%m/%d %H:%M:%S"];
    for format in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(datetime_str, format) {
            return Some(dt);
        }
    }

    // Date-only variants.
    let date_formats = ["%Y:%m:%d", "%Y-%m-%d", "%Y/%m/%d"];
    for format in &date_formats {
        let with_time = format!("{} 00:00:00", datetime_str);
        let format_with_time = format!("{} %H:%M:%S", format);
        if let Ok(dt) = NaiveDateTime::parse_from_str(&with_time, &format_with_time) {
            return Some(dt);
        }
    }

    None
}

fn extract_gps(exif: &rexif::ExifData) -> Option<GpsCoordinates> {
    let mut latitude: Option<f64> = None;
    let mut longitude: Option<f64> = None;
    let mut lat_ref: Option<String> = None;
    let mut lon_ref: Option<String> = None;

    for entry in &exif.entries {
        match entry.tag {
            rexif::ExifTag::GPSLatitude => {
                latitude = parse_gps_coordinate(&entry.value_more_readable);
            }
            rexif::ExifTag::GPSLongitude => {
                longitude = parse_gps_coordinate(&entry.value_more_readable);
            }
            rexif::ExifTag::GPSLatitudeRef => {
                lat_ref = Some(entry.value_more_readable.trim().to_string());
            }
            rexif::ExifTag::GPSLongitudeRef => {
                lon_ref = Some(entry.value_more_readable.trim().to_string());
            }
            _ => {}
        }
    }

    let (mut lat, mut lon, lat_r, lon_r) = (latitude?, longitude?, lat_ref?, lon_ref?);
    if lat_r == "S" {
        lat = -lat;
    }
    if lon_r == "W" {
        lon = -lon;
    }

    Some(GpsCoordinates {
        latitude: lat,
        longitude: lon,
    })
}

fn parse_gps_coordinate(coord_str: &str) -> Option<f64> {
    // GPS coordinates in EXIF are typically "51 deg 30 min 45.60 sec".
    let parts: Vec<&str> = coord_str.split_whitespace().collect();

    if parts.len() >= 6 {
        let degrees = parts[0].parse::<f64>().ok()?;
        let minutes = parts[2].trim_end_matches('\'').parse::<f64>().ok()?;
        let seconds = parts[4].trim_end_matches('"').parse::<f64>().ok()?;
        return Some(degrees + minutes / 60.0 + seconds / 3600.0);
    }

    // Some writers store plain decimal degrees.
    if parts.len() == 1 {
        return parts[0].parse::<f64>().ok();
    }

    None
}
