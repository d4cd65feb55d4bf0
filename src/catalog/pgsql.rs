// photoprep/src/catalog/pgsql.rs
//! PostgreSQL insert script for a newly published category.
//!
//! The script is one anonymous `DO` block:
//!
//! | Part | Statement |
//! |---|---|
//! | category | `INSERT INTO photo.category`, teaser from the first photo's `xs`/`xs_sq` |
//! | lookups | one guarded insert per distinct make, model, lens and altitude ref |
//! | photos | `INSERT INTO photo.photo` per photo, keyed to `currval('photo.category_id_seq')` |
//! | aggregates | `UPDATE photo.category` with counts, sizes, first date and first GPS fix |

use super::sql::{
    sql_bool, sql_create_lookup, sql_lookup_id, sql_number, sql_string, sql_timestamp,
};
use super::{CatalogWriter, CategoryInfo};
use crate::core::context::PhotoRecord;
use crate::core::results::{PhotoReaderResult, PhotoWriterResult};
use crate::core::{PhotoPrepError, Result};
use crate::processors::metadata::ExifData;
use crate::processors::SOURCE_SUBDIR;
use std::collections::BTreeSet;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

const CATEGORY_ID: &str = "(SELECT currval('photo.category_id_seq'))";

/// Renditions stored per photo, in column order.
const SCALES: [&str; 6] = ["xs", "xs_sq", "sm", "md", "lg", "prt"];

const EXIF_COLUMNS: [&str; 42] = [
    "bits_per_sample",
    "compression_id",
    "contrast_id",
    "create_date",
    "digital_zoom_ratio",
    "exposure_compensation",
    "exposure_mode_id",
    "exposure_program_id",
    "exposure_time",
    "f_number",
    "flash_id",
    "focal_length",
    "focal_length_in_35_mm_format",
    "gain_control_id",
    "gps_altitude",
    "gps_altitude_ref_id",
    "gps_date_time_stamp",
    "gps_direction",
    "gps_direction_ref_id",
    "gps_latitude",
    "gps_latitude_ref_id",
    "gps_longitude",
    "gps_longitude_ref_id",
    "gps_measure_mode_id",
    "gps_satellites",
    "gps_status_id",
    "gps_version_id",
    "iso",
    "light_source_id",
    "make_id",
    "metering_mode_id",
    "model_id",
    "orientation_id",
    "saturation_id",
    "scene_capture_type_id",
    "scene_type_id",
    "sensing_method_id",
    "sharpness_id",
    "white_balance_id",
    "aperture",
    "lens_id",
    "shutter_speed",
];

/// One catalog row's worth of results.
struct PhotoRow<'a> {
    source: &'a PhotoReaderResult,
    renditions: Vec<(&'a PhotoWriterResult, u64)>,
    exif: Option<&'a ExifData>,
}

impl<'a> PhotoRow<'a> {
    fn from_record(record: &'a PhotoRecord) -> Option<Self> {
        let results = &record.results;
        let source = results.reader()?;

        let renditions = SCALES
            .iter()
            .map(|scale| {
                let writer = results.writer(scale)?;
                let size = results.rendition_size(scale)?;
                Some((writer, size))
            })
            .collect::<Option<Vec<_>>>()?;

        Some(Self {
            source,
            renditions,
            exif: results.metadata(),
        })
    }

    fn rendition(&self, scale: &str) -> Option<&(&'a PhotoWriterResult, u64)> {
        self.renditions.iter().find(|(w, _)| w.scale == scale)
    }
}

pub struct PgsqlInsertWriter {
    out_file: PathBuf,
}

impl PgsqlInsertWriter {
    pub fn new(out_file: impl Into<PathBuf>) -> Self {
        Self {
            out_file: out_file.into(),
        }
    }

    pub fn out_file(&self) -> &Path {
        &self.out_file
    }

    /// Render the script for `photos` into `out`.
    pub fn render<W: Write>(
        category: &CategoryInfo,
        photos: &[PhotoRecord],
        out: &mut W,
    ) -> Result<usize> {
        let rows: Vec<PhotoRow> = photos
            .iter()
            .filter(|p| p.is_success())
            .filter_map(|p| {
                let row = PhotoRow::from_record(p);
                if row.is_none() {
                    log::warn!(
                        "{} is missing renditions, not adding it to the catalog",
                        p.source_file.display()
                    );
                }
                row
            })
            .collect();

        let Some(teaser) = rows.first() else {
            return Err(PhotoPrepError::Catalog(
                "No successfully processed photos to write".to_string(),
            ));
        };

        writeln!(out, "DO")?;
        writeln!(out, "$$")?;
        writeln!(out, "BEGIN")?;
        writeln!(out)?;

        write_category_insert(out, category, teaser)?;
        write_lookups(out, &rows)?;

        for row in &rows {
            write_photo_insert(out, category, row)?;
        }
        writeln!(out)?;

        write_category_update(out)?;

        writeln!(out, "END")?;
        writeln!(out, "$$")?;

        Ok(rows.len())
    }
}

impl CatalogWriter for PgsqlInsertWriter {
    fn write(&mut self, category: &CategoryInfo, photos: &[PhotoRecord]) -> Result<()> {
        // the file only appears once the whole script rendered
        let mut script = Vec::new();
        let written = Self::render(category, photos, &mut script)?;

        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&self.out_file)
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::AlreadyExists => {
                    PhotoPrepError::OutputFileExists(self.out_file.clone())
                }
                _ => PhotoPrepError::Io(e),
            })?;
        file.write_all(&script)?;
        file.flush()?;

        log::info!(
            "Wrote {} photos for category '{}' to {}",
            written,
            category.name,
            self.out_file.display()
        );

        Ok(())
    }
}

fn write_category_insert<W: Write>(
    out: &mut W,
    category: &CategoryInfo,
    teaser: &PhotoRow,
) -> Result<()> {
    let (xs, xs_size) = teaser
        .rendition("xs")
        .copied()
        .ok_or_else(|| PhotoPrepError::Catalog("Teaser photo has no xs rendition".to_string()))?;
    let (xs_sq, xs_sq_size) = teaser.rendition("xs_sq").copied().ok_or_else(|| {
        PhotoPrepError::Catalog("Teaser photo has no xs_sq rendition".to_string())
    })?;

    writeln!(
        out,
        "INSERT INTO photo.category (name, year, is_private, teaser_photo_width, teaser_photo_height, teaser_photo_size, teaser_photo_path, teaser_photo_sq_width, teaser_photo_sq_height, teaser_photo_sq_size, teaser_photo_sq_path) VALUES ({}, {}, {}, {}, {}, {}, {}, {}, {}, {}, {});",
        sql_string(Some(category.name.as_str())),
        category.year,
        sql_bool(category.is_private),
        xs.width,
        xs.height,
        xs_size,
        sql_string(Some(xs.url.as_str())),
        xs_sq.width,
        xs_sq.height,
        xs_sq_size,
        sql_string(Some(xs_sq.url.as_str())),
    )?;
    writeln!(out)?;

    Ok(())
}

fn write_lookups<W: Write>(out: &mut W, rows: &[PhotoRow]) -> Result<()> {
    let lookups: [(&str, fn(&ExifData) -> Option<&str>); 4] = [
        ("photo.make", |e| e.make.as_deref()),
        ("photo.model", |e| e.model.as_deref()),
        ("photo.lens", |e| e.lens_model.as_deref()),
        ("photo.gps_altitude_ref", |e| e.gps_altitude_ref.as_deref()),
    ];

    for (table, value) in lookups {
        let distinct: BTreeSet<&str> = rows
            .iter()
            .filter_map(|r| r.exif)
            .filter_map(value)
            .collect();

        for v in distinct {
            if let Some(statement) = sql_create_lookup(table, Some(v)) {
                writeln!(out, "{}", statement)?;
            }
        }
    }
    writeln!(out)?;

    Ok(())
}

fn exif_values(exif: &ExifData) -> Vec<String> {
    vec![
        sql_number(exif.bits_per_sample),
        sql_number(exif.compression),
        sql_number(exif.contrast),
        sql_timestamp(exif.create_date),
        sql_number(exif.digital_zoom_ratio),
        sql_string(exif.exposure_compensation.as_deref()),
        sql_number(exif.exposure_mode),
        sql_number(exif.exposure_program),
        sql_string(exif.exposure_time.as_deref()),
        sql_number(exif.f_number),
        sql_number(exif.flash),
        sql_number(exif.focal_length),
        sql_number(exif.focal_length_in_35mm_format),
        sql_number(exif.gain_control),
        sql_number(exif.gps_altitude),
        sql_lookup_id("photo.gps_altitude_ref", exif.gps_altitude_ref.as_deref()),
        sql_timestamp(exif.gps_date_time_stamp),
        sql_number(exif.gps_direction),
        sql_string(exif.gps_direction_ref.as_deref()),
        sql_number(exif.gps_latitude),
        sql_string(exif.gps_latitude_ref.as_deref()),
        sql_number(exif.gps_longitude),
        sql_string(exif.gps_longitude_ref.as_deref()),
        sql_string(exif.gps_measure_mode.as_deref()),
        sql_string(exif.gps_satellites.as_deref()),
        sql_string(exif.gps_status.as_deref()),
        sql_string(exif.gps_version_id.as_deref()),
        sql_number(exif.iso),
        sql_number(exif.light_source),
        sql_lookup_id("photo.make", exif.make.as_deref()),
        sql_number(exif.metering_mode),
        sql_lookup_id("photo.model", exif.model.as_deref()),
        sql_number(exif.orientation),
        sql_number(exif.saturation),
        sql_number(exif.scene_capture_type),
        sql_number(exif.scene_type),
        sql_number(exif.sensing_method),
        sql_number(exif.sharpness),
        sql_number(exif.white_balance),
        sql_number(exif.aperture),
        sql_lookup_id("photo.lens", exif.lens_model.as_deref()),
        sql_string(exif.shutter_speed.as_deref()),
    ]
}

fn write_photo_insert<W: Write>(out: &mut W, category: &CategoryInfo, row: &PhotoRow) -> Result<()> {
    let mut columns = vec!["category_id".to_string(), "is_private".to_string()];
    let mut values = vec![CATEGORY_ID.to_string(), sql_bool(category.is_private).to_string()];

    for (writer, size) in &row.renditions {
        let scale = writer.scale.as_str();
        columns.extend([
            format!("{scale}_height"),
            format!("{scale}_width"),
            format!("{scale}_size"),
            format!("{scale}_path"),
        ]);
        values.extend([
            writer.height.to_string(),
            writer.width.to_string(),
            size.to_string(),
            sql_string(Some(writer.url.as_str())),
        ]);
    }

    columns.extend([
        format!("{SOURCE_SUBDIR}_height"),
        format!("{SOURCE_SUBDIR}_width"),
        format!("{SOURCE_SUBDIR}_size"),
        format!("{SOURCE_SUBDIR}_path"),
    ]);
    values.extend([
        row.source.height.to_string(),
        row.source.width.to_string(),
        row.source.file_size.to_string(),
        sql_string(Some(row.source.url.as_str())),
    ]);

    columns.extend(EXIF_COLUMNS.iter().map(|c| c.to_string()));
    values.extend(exif_values(row.exif.unwrap_or(&ExifData::default())));

    writeln!(
        out,
        "INSERT INTO photo.photo ({}) VALUES ({});",
        columns.join(", "),
        values.join(", ")
    )?;

    Ok(())
}

fn write_category_update<W: Write>(out: &mut W) -> Result<()> {
    let first_with = |column: &str, condition: &str| {
        format!(
            "(SELECT {column} FROM photo.photo WHERE id = (SELECT MIN(id) FROM photo.photo WHERE category_id = c.id AND {condition} IS NOT NULL))"
        )
    };
    let teaser = |column: &str| {
        format!(
            "(SELECT {column} FROM photo.photo WHERE category_id = c.id AND xs_path = c.teaser_photo_path)"
        )
    };

    let mut assignments = vec![
        "photo_count = (SELECT COUNT(1) FROM photo.photo WHERE category_id = c.id)".to_string(),
        format!("create_date = {}", first_with("create_date", "create_date")),
    ];

    for column in [
        "gps_latitude",
        "gps_latitude_ref_id",
        "gps_longitude",
        "gps_longitude_ref_id",
    ] {
        assignments.push(format!("{column} = {}", first_with(column, "gps_latitude")));
    }

    for scale in SCALES.iter().copied().chain([SOURCE_SUBDIR]) {
        assignments.push(format!(
            "total_size_{scale} = (SELECT SUM({scale}_size) FROM photo.photo WHERE category_id = c.id)"
        ));
    }

    assignments.extend([
        format!("teaser_photo_size = {}", teaser("xs_size")),
        format!("teaser_photo_sq_height = {}", teaser("xs_sq_height")),
        format!("teaser_photo_sq_width = {}", teaser("xs_sq_width")),
        format!("teaser_photo_sq_path = {}", teaser("xs_sq_path")),
        format!("teaser_photo_sq_size = {}", teaser("xs_sq_size")),
    ]);

    writeln!(
        out,
        "UPDATE photo.category c SET {} WHERE c.id = {};",
        assignments.join(", "),
        CATEGORY_ID
    )?;
    writeln!(out)?;

    Ok(())
}
