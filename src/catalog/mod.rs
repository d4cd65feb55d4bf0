// photoprep/src/catalog/mod.rs
pub mod pgsql;
pub mod sql;

pub use pgsql::PgsqlInsertWriter;

use crate::core::context::PhotoRecord;
use crate::core::{OutputMode, PhotoPrepError, ProcessConfig, Result};

/// The category a batch of photos is published under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryInfo {
    pub name: String,
    pub year: u16,
    pub is_private: bool,
}

/// Persists the outcome of a finished batch.
pub trait CatalogWriter {
    fn write(&mut self, category: &CategoryInfo, photos: &[PhotoRecord]) -> Result<()>;
}

/// Writes nothing.
#[derive(Debug, Default)]
pub struct NoopWriter;

impl CatalogWriter for NoopWriter {
    fn write(&mut self, _category: &CategoryInfo, photos: &[PhotoRecord]) -> Result<()> {
        log::debug!("No catalog output for {} photos", photos.len());
        Ok(())
    }
}

pub fn writer_for(config: &ProcessConfig) -> Result<Box<dyn CatalogWriter>> {
    match config.output_mode {
        OutputMode::NoOutput => Ok(Box::new(NoopWriter)),
        OutputMode::Insert => {
            let out_file = config.out_file.clone().ok_or_else(|| {
                PhotoPrepError::InvalidParameter(
                    "Insert mode needs an output file".to_string(),
                )
            })?;
            Ok(Box::new(PgsqlInsertWriter::new(out_file)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn no_output_writes_nothing() {
        let mut writer = writer_for(&ProcessConfig::default()).unwrap();
        let category = CategoryInfo {
            name: "trip".to_string(),
            year: 2024,
            is_private: true,
        };
        assert!(writer.write(&category, &[]).is_ok());
    }

    #[test]
    fn insert_mode_requires_out_file() {
        let config = ProcessConfig {
            photo_dir: PathBuf::from("/photos/2024/trip"),
            output_mode: OutputMode::Insert,
            ..Default::default()
        };
        assert!(writer_for(&config).is_err());
    }
}
