// photoprep/src/core/mod.rs
pub mod context;
pub mod pipeline;
pub mod processor;
pub mod results;

use crate::raster::BackendError;
use std::path::PathBuf;
use thiserror::Error;

/// Where the catalog script for a finished batch goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// PostgreSQL insert script for a new category.
    Insert,
    /// Process photos only, write no catalog output.
    NoOutput,
}

/// Tuning for the brightness/saturation auto-correction.
///
/// The defaults were tuned by eye against real photo sets; treat them as
/// knobs rather than derived values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OptimizerConfig {
    /// Fraction of the quantum range below which a correction kicks in.
    pub threshold: f64,
    /// Absolute channel mean (in quantum units) a frame needs before it is brightened.
    pub min_mean_for_brightening: f64,
    pub max_sigmoidal_adjustment: f64,
    pub max_saturation_adjustment: f64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            threshold: 0.30,
            min_mean_for_brightening: 2000.0,
            max_sigmoidal_adjustment: 3.0,
            max_saturation_adjustment: 20.0,
        }
    }
}

impl OptimizerConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.threshold > 0.0 && self.threshold <= 1.0) {
            return Err(PhotoPrepError::InvalidParameter(
                "Optimizer threshold must be in (0, 1]".to_string(),
            ));
        }

        if self.max_sigmoidal_adjustment <= 0.0 || self.max_saturation_adjustment <= 0.0 {
            return Err(PhotoPrepError::InvalidParameter(
                "Maximum adjustments must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

/// Bounds and tolerances for the JPEG quality binary search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualitySearchConfig {
    pub min_quality: u8,
    pub max_quality: u8,
    /// Maximum number of probe encodes per image.
    pub steps: u32,
    /// Share of pixels allowed to change visibly.
    pub distortion_threshold: f64,
    /// Acceptance band around the threshold, as a fraction of the threshold.
    pub threshold_range: f64,
    /// Images with fewer distinct colors keep their current quality.
    pub min_unique_colors: usize,
    /// Per-pixel tolerance, as a fraction of the quantum range.
    pub fuzz: f64,
}

impl Default for QualitySearchConfig {
    fn default() -> Self {
        Self {
            min_quality: 55,
            max_quality: 92,
            steps: 5,
            distortion_threshold: 0.015,
            threshold_range: 0.1,
            min_unique_colors: 4096,
            fuzz: 0.05,
        }
    }
}

impl QualitySearchConfig {
    pub fn validate(&self) -> Result<()> {
        if self.min_quality == 0 || self.max_quality > 100 {
            return Err(PhotoPrepError::InvalidParameter(
                "Quality must be between 1 and 100".to_string(),
            ));
        }

        if self.min_quality >= self.max_quality {
            return Err(PhotoPrepError::InvalidParameter(format!(
                "Minimum quality {} must be below maximum quality {}",
                self.min_quality, self.max_quality
            )));
        }

        if self.steps == 0 {
            return Err(PhotoPrepError::InvalidParameter(
                "Quality search needs at least one step".to_string(),
            ));
        }

        if self.distortion_threshold <= 0.0 || self.threshold_range <= 0.0 || self.fuzz < 0.0 {
            return Err(PhotoPrepError::InvalidParameter(
                "Distortion threshold, range and fuzz must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Half-width of the band around the threshold that ends the search early.
    pub fn acceptance_band(&self) -> f64 {
        self.distortion_threshold * self.threshold_range
    }
}

#[derive(Debug, Clone)]
pub struct ProcessConfig {
    pub photo_dir: PathBuf,
    pub web_photo_root: Option<String>,
    pub category: Option<String>,
    pub year: Option<u16>,
    pub is_private: bool,
    pub output_mode: OutputMode,
    pub out_file: Option<PathBuf>,
    /// Worker count; `0` picks the default parallelism.
    pub threads: usize,
    pub minify: bool,
    pub quiet: bool,
    pub optimizer: OptimizerConfig,
    pub quality: QualitySearchConfig,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            photo_dir: PathBuf::new(),
            web_photo_root: None,
            category: None,
            year: None,
            is_private: false,
            output_mode: OutputMode::NoOutput,
            out_file: None,
            threads: 0,
            minify: true,
            quiet: false,
            optimizer: OptimizerConfig::default(),
            quality: QualitySearchConfig::default(),
        }
    }
}

impl ProcessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.photo_dir.as_os_str().is_empty() {
            return Err(PhotoPrepError::InvalidParameter(
                "Please specify the local path containing the photos to process".to_string(),
            ));
        }

        if self.output_mode == OutputMode::Insert {
            if is_blank(self.web_photo_root.as_deref()) {
                return Err(PhotoPrepError::InvalidParameter(
                    "Please specify the web root path".to_string(),
                ));
            }

            if self.out_file.is_none() {
                return Err(PhotoPrepError::InvalidParameter(
                    "Please provide the name of the output file to write to".to_string(),
                ));
            }

            if is_blank(self.category.as_deref()) {
                return Err(PhotoPrepError::InvalidParameter(
                    "Please provide a category name, as it is required for insert mode"
                        .to_string(),
                ));
            }

            if self.year.unwrap_or(0) == 0 {
                return Err(PhotoPrepError::InvalidParameter(
                    "Please provide a year, as it is required for insert mode".to_string(),
                ));
            }
        }

        self.optimizer.validate()?;
        self.quality.validate()
    }

    /// Worker count for the batch: the configured value, or one less than the
    /// number of processors (at least one).
    pub fn effective_threads(&self) -> usize {
        if self.threads > 0 {
            self.threads
        } else {
            default_parallelism()
        }
    }
}

pub fn default_parallelism() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().saturating_sub(1))
        .unwrap_or(1)
        .max(1)
}

fn is_blank(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.trim().is_empty())
}

#[derive(Error, Debug)]
pub enum PhotoPrepError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Image backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("The picture directory {0} does not exist")]
    InputDirectoryMissing(PathBuf),

    #[error("Output directory {0} already exists; remove it before running again")]
    DirectoryExists(PathBuf),

    #[error("Output file {0} already exists; remove it before running again")]
    OutputFileExists(PathBuf),

    #[error("Failed to create thread pool: {0}")]
    ThreadPool(String),

    #[error("Catalog error: {0}")]
    Catalog(String),
}

pub type Result<T> = std::result::Result<T, PhotoPrepError>;
