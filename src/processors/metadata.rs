// photoprep/src/processors/metadata.rs
use crate::core::context::ProcessingContext;
use crate::core::pipeline::Stage;
use crate::core::results::{StageFailure, StageOutput, StageResult};
use chrono::{NaiveDate, NaiveDateTime};
use exif::{Exif, Field, In, Reader, Tag, Value};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

const EXIF_DATE_FORMAT: &str = "%Y:%m:%d %H:%M:%S";

/// Typed EXIF tags recorded for the catalog. Absent tags are `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExifData {
    pub bits_per_sample: Option<u16>,
    pub compression: Option<u32>,
    pub contrast: Option<u32>,
    pub create_date: Option<NaiveDateTime>,
    pub digital_zoom_ratio: Option<f64>,
    pub exposure_compensation: Option<String>,
    pub exposure_mode: Option<u32>,
    pub exposure_program: Option<u32>,
    pub exposure_time: Option<String>,
    pub f_number: Option<f64>,
    pub flash: Option<u32>,
    pub focal_length: Option<f64>,
    pub focal_length_in_35mm_format: Option<f64>,
    pub gain_control: Option<u32>,
    pub gps_altitude: Option<f64>,
    pub gps_altitude_ref: Option<String>,
    pub gps_date_time_stamp: Option<NaiveDateTime>,
    pub gps_direction: Option<f64>,
    pub gps_direction_ref: Option<String>,
    pub gps_latitude: Option<f64>,
    pub gps_latitude_ref: Option<String>,
    pub gps_longitude: Option<f64>,
    pub gps_longitude_ref: Option<String>,
    pub gps_measure_mode: Option<String>,
    pub gps_satellites: Option<String>,
    pub gps_status: Option<String>,
    pub gps_version_id: Option<String>,
    pub iso: Option<u32>,
    pub light_source: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub lens_make: Option<String>,
    pub lens_model: Option<String>,
    pub metering_mode: Option<u32>,
    pub orientation: Option<u32>,
    pub saturation: Option<u32>,
    pub scene_capture_type: Option<u32>,
    pub scene_type: Option<u32>,
    pub sensing_method: Option<u32>,
    pub sharpness: Option<u32>,
    pub white_balance: Option<u32>,

    // composite
    pub aperture: Option<f64>,
    pub shutter_speed: Option<String>,
}

impl ExifData {
    pub fn from_exif(exif: &Exif) -> Self {
        let field = |tag: Tag| exif.get_field(tag, In::PRIMARY);
        let uint = |tag: Tag| field(tag).and_then(as_u32);
        let float = |tag: Tag| field(tag).and_then(as_f64);
        let text = |tag: Tag| field(tag).and_then(as_string);

        let f_number = float(Tag::FNumber);
        let exposure_time = float(Tag::ExposureTime);

        let aperture = f_number.or_else(|| {
            // APEX: N = 2^(Av/2)
            float(Tag::ApertureValue).map(|av| 2f64.powf(av / 2.0))
        });
        let shutter_seconds = exposure_time.or_else(|| {
            // APEX: t = 2^-Tv
            float(Tag::ShutterSpeedValue).map(|tv| 2f64.powf(-tv))
        });

        Self {
            bits_per_sample: uint(Tag::BitsPerSample).and_then(|v| u16::try_from(v).ok()),
            compression: uint(Tag::Compression),
            contrast: uint(Tag::Contrast),
            create_date: [Tag::DateTimeDigitized, Tag::DateTimeOriginal, Tag::DateTime]
                .into_iter()
                .find_map(|tag| text(tag).and_then(|s| parse_exif_date(&s))),
            digital_zoom_ratio: float(Tag::DigitalZoomRatio),
            exposure_compensation: float(Tag::ExposureBiasValue).map(format_exposure_bias),
            exposure_mode: uint(Tag::ExposureMode),
            exposure_program: uint(Tag::ExposureProgram),
            exposure_time: exposure_time.map(format_exposure_time),
            f_number,
            flash: uint(Tag::Flash),
            focal_length: float(Tag::FocalLength),
            focal_length_in_35mm_format: float(Tag::FocalLengthIn35mmFilm),
            gain_control: uint(Tag::GainControl),
            gps_altitude: float(Tag::GPSAltitude),
            gps_altitude_ref: uint(Tag::GPSAltitudeRef).map(|r| {
                if r == 1 {
                    "Below Sea Level".to_string()
                } else {
                    "Above Sea Level".to_string()
                }
            }),
            gps_date_time_stamp: gps_timestamp(
                exif.get_field(Tag::GPSDateStamp, In::PRIMARY),
                exif.get_field(Tag::GPSTimeStamp, In::PRIMARY),
            ),
            gps_direction: float(Tag::GPSImgDirection),
            gps_direction_ref: text(Tag::GPSImgDirectionRef),
            gps_latitude: gps_coordinate(exif, Tag::GPSLatitude, Tag::GPSLatitudeRef),
            gps_latitude_ref: text(Tag::GPSLatitudeRef).map(first_char),
            gps_longitude: gps_coordinate(exif, Tag::GPSLongitude, Tag::GPSLongitudeRef),
            gps_longitude_ref: text(Tag::GPSLongitudeRef).map(first_char),
            gps_measure_mode: text(Tag::GPSMeasureMode),
            gps_satellites: text(Tag::GPSSatellites),
            gps_status: text(Tag::GPSStatus),
            gps_version_id: field(Tag::GPSVersionID).and_then(version_id),
            iso: uint(Tag::PhotographicSensitivity),
            light_source: uint(Tag::LightSource),
            make: text(Tag::Make),
            model: text(Tag::Model),
            lens_make: text(Tag::LensMake),
            lens_model: text(Tag::LensModel),
            metering_mode: uint(Tag::MeteringMode),
            orientation: uint(Tag::Orientation),
            saturation: uint(Tag::Saturation),
            scene_capture_type: uint(Tag::SceneCaptureType),
            scene_type: uint(Tag::SceneType),
            sensing_method: uint(Tag::SensingMethod),
            sharpness: uint(Tag::Sharpness),
            white_balance: uint(Tag::WhiteBalance),
            aperture,
            shutter_speed: shutter_seconds.map(format_exposure_time),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MetadataReader;

impl MetadataReader {
    pub fn new() -> Self {
        Self
    }

    /// Read the EXIF block of `path`; a file without one yields empty data.
    pub fn read(&self, path: &Path) -> Result<ExifData, exif::Error> {
        let file = File::open(path)?;
        let mut bufreader = BufReader::new(&file);

        match Reader::new().read_from_container(&mut bufreader) {
            Ok(exif) => {
                log::debug!("Found EXIF data in {}", path.display());
                Ok(ExifData::from_exif(&exif))
            }
            Err(exif::Error::NotFound(_)) => {
                log::debug!("No EXIF data found in {}", path.display());
                Ok(ExifData::default())
            }
            Err(e) => Err(e),
        }
    }
}

pub struct MetadataStage {
    reader: MetadataReader,
}

impl MetadataStage {
    pub fn new() -> Self {
        Self {
            reader: MetadataReader::new(),
        }
    }
}

impl Default for MetadataStage {
    fn default() -> Self {
        Self::new()
    }
}

impl<I> Stage<I> for MetadataStage {
    fn name(&self) -> &'static str {
        "exif"
    }

    fn process(&self, ctx: &mut ProcessingContext<I>) -> Option<StageResult> {
        let result = match self.reader.read(ctx.source_file()) {
            Ok(data) => Ok(StageOutput::Metadata(Box::new(data))),
            Err(e) => Err(StageFailure::new(
                "exif",
                format!("Error obtaining exif data: {}", e),
            )),
        };
        Some(result)
    }
}

fn as_u32(field: &Field) -> Option<u32> {
    match &field.value {
        Value::Undefined(bytes, _) => bytes.first().map(|&b| u32::from(b)),
        Value::SShort(v) => v.first().and_then(|&x| u32::try_from(x).ok()),
        Value::SLong(v) => v.first().and_then(|&x| u32::try_from(x).ok()),
        Value::Rational(_) | Value::SRational(_) | Value::Float(_) | Value::Double(_) => {
            as_f64(field).filter(|v| *v >= 0.0).map(|v| v.round() as u32)
        }
        Value::Ascii(_) => as_string(field).and_then(|s| s.parse().ok()),
        value => value.get_uint(0),
    }
}

fn as_f64(field: &Field) -> Option<f64> {
    let value = match &field.value {
        Value::Rational(v) => v.first().map(|r| r.to_f64()),
        Value::SRational(v) => v.first().map(|r| r.to_f64()),
        Value::Float(v) => v.first().map(|&x| f64::from(x)),
        Value::Double(v) => v.first().copied(),
        Value::SShort(v) => v.first().map(|&x| f64::from(x)),
        Value::SLong(v) => v.first().map(|&x| f64::from(x)),
        Value::Ascii(_) => as_string(field).and_then(|s| s.parse().ok()),
        value => value.get_uint(0).map(f64::from),
    };
    value.filter(|v| v.is_finite())
}

fn as_string(field: &Field) -> Option<String> {
    let text = match &field.value {
        Value::Ascii(parts) => parts
            .first()
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())?,
        _ => field.display_value().to_string(),
    };

    let text = text.trim_matches(|c: char| c == '\0' || c.is_whitespace());
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

fn first_char(value: String) -> String {
    value.chars().take(1).collect()
}

fn version_id(field: &Field) -> Option<String> {
    match &field.value {
        Value::Byte(bytes) if !bytes.is_empty() => Some(
            bytes
                .iter()
                .map(|b| b.to_string())
                .collect::<Vec<_>>()
                .join("."),
        ),
        _ => None,
    }
}

pub fn parse_exif_date(value: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(value.trim(), EXIF_DATE_FORMAT).ok()
}

/// GPS date at the GPS time of day; midnight when the time is missing.
fn gps_timestamp(date: Option<&Field>, time: Option<&Field>) -> Option<NaiveDateTime> {
    let date = date
        .and_then(as_string)
        .and_then(|s| NaiveDate::parse_from_str(&s, "%Y:%m:%d").ok())?;

    let time = time.and_then(|f| match &f.value {
        Value::Rational(v) => Some(v.to_vec()),
        _ => None,
    });

    match time.as_deref() {
        Some([h, m, s, ..]) => date.and_hms_opt(
            h.to_f64() as u32,
            m.to_f64() as u32,
            s.to_f64() as u32,
        ),
        _ => date.and_hms_opt(0, 0, 0),
    }
}

fn gps_coordinate(exif: &Exif, value_tag: Tag, ref_tag: Tag) -> Option<f64> {
    let degrees = exif.get_field(value_tag, In::PRIMARY)?;
    let reference = exif
        .get_field(ref_tag, In::PRIMARY)
        .and_then(as_string)
        .unwrap_or_default();
    degrees_to_decimal(degrees, &reference)
}

fn degrees_to_decimal(degrees: &Field, reference: &str) -> Option<f64> {
    let Value::Rational(components) = &degrees.value else {
        return None;
    };
    if components.len() < 3 {
        return None;
    }

    let deg = components[0].to_f64();
    let min = components[1].to_f64();
    let sec = components[2].to_f64();

    let decimal = deg + (min / 60.0) + (sec / 3600.0);

    match reference.chars().next() {
        Some('S') | Some('W') => Some(-decimal),
        _ => Some(decimal),
    }
}

/// `1/250` style for sub-second times, plain seconds otherwise.
pub fn format_exposure_time(seconds: f64) -> String {
    if seconds <= 0.0 {
        return "0".to_string();
    }

    if seconds < 1.0 {
        format!("1/{}", (1.0 / seconds).round() as u64)
    } else {
        trim_decimal(seconds)
    }
}

/// Exposure bias in thirds or halves of a stop where it lines up, e.g. `+2/3`.
pub fn format_exposure_bias(ev: f64) -> String {
    if ev.abs() < 1e-6 {
        return "0".to_string();
    }

    let sign = if ev < 0.0 { "-" } else { "+" };
    let magnitude = ev.abs();

    for denominator in [1u32, 2, 3] {
        let numerator = magnitude * f64::from(denominator);
        if (numerator - numerator.round()).abs() < 0.01 {
            let numerator = numerator.round() as u32;
            return if denominator == 1 {
                format!("{sign}{numerator}")
            } else {
                format!("{sign}{numerator}/{denominator}")
            };
        }
    }

    format!("{sign}{}", trim_decimal(magnitude))
}

fn trim_decimal(value: f64) -> String {
    let text = format!("{:.2}", value);
    text.trim_end_matches('0').trim_end_matches('.').to_string()
}
