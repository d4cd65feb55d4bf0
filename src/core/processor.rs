// photoprep/src/core/processor.rs
use super::{OutputMode, PhotoPrepError, ProcessConfig, Result};
use crate::catalog::{writer_for, CategoryInfo};
use crate::processors::batch::{check_directories, collect_photos, prepare_directories};
use crate::processors::{publishing_pipeline, BatchDriver, BatchReport, Services};
use crate::raster::{RasterBackend, RustBackend};
use crate::utils::PhotoPaths;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Publishes one category directory: validates the run, builds the
/// pipeline, processes every photo and hands the results to the catalog.
pub struct Publisher<B: RasterBackend> {
    config: ProcessConfig,
    services: Services<B>,
    cancelled: Arc<AtomicBool>,
}

impl Publisher<RustBackend> {
    pub fn new(config: ProcessConfig) -> Self {
        Self::with_services(config, Services::with_external_tools(RustBackend::new()))
    }
}

impl<B> Publisher<B>
where
    B: RasterBackend + 'static,
    B::Image: 'static,
{
    pub fn with_services(config: ProcessConfig, services: Services<B>) -> Self {
        Self {
            config,
            services,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Flag that stops the batch from starting further photos once set.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn config(&self) -> &ProcessConfig {
        &self.config
    }

    pub fn publish(&self) -> Result<BatchReport> {
        let config = &self.config;
        config.validate()?;

        if !config.photo_dir.is_dir() {
            return Err(PhotoPrepError::InputDirectoryMissing(
                config.photo_dir.clone(),
            ));
        }

        if config.output_mode == OutputMode::Insert {
            if let Some(out_file) = config.out_file.as_ref().filter(|f| f.exists()) {
                return Err(PhotoPrepError::OutputFileExists(out_file.clone()));
            }
        }

        let paths = Arc::new(PhotoPaths::new(
            &config.photo_dir,
            config.web_photo_root.as_deref().unwrap_or_default(),
            config.year,
        )?);
        let category = self.category(&paths);

        let pipeline = publishing_pipeline(config, Arc::clone(&paths), &self.services);
        let output_dirs = pipeline.output_directories();
        check_directories(&config.photo_dir, &output_dirs)?;

        let photos = collect_photos(&config.photo_dir)?;
        if photos.is_empty() {
            log::warn!("No photos found in {}", config.photo_dir.display());
            return Ok(BatchReport::default());
        }

        prepare_directories(&config.photo_dir, &output_dirs)?;

        let report = BatchDriver::new(config.effective_threads(), config.quiet)
            .with_cancellation_flag(Arc::clone(&self.cancelled))
            .run(&pipeline, &photos)?;

        report.log_failures();

        if report.successes().next().is_some() {
            writer_for(config)?.write(&category, report.records())?;
        } else {
            log::warn!("No photos were processed successfully, skipping catalog output");
        }

        Ok(report)
    }

    fn category(&self, paths: &PhotoPaths) -> CategoryInfo {
        let name = self
            .config
            .category
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| {
                paths
                    .local_root()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default()
            });

        CategoryInfo {
            name,
            year: paths.year(),
            is_private: self.config.is_private,
        }
    }
}
