// photoprep/src/core/results.rs
//! Stage outcomes.
//!
//! Every stage reports a [`StageResult`]: either a [`StageOutput`] variant
//! carrying its payload, or a [`StageFailure`] naming the stage and what went
//! wrong. Consumers (the batch report, catalog writers) look payloads up by
//! variant through [`StageResults`].

use crate::processors::metadata::ExifData;
use std::path::PathBuf;
use thiserror::Error;

pub type StageResult = Result<StageOutput, StageFailure>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{stage}: {message}")]
pub struct StageFailure {
    pub stage: &'static str,
    pub message: String,
}

impl StageFailure {
    pub fn new(stage: &'static str, message: impl Into<String>) -> Self {
        Self {
            stage,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MoveResult {
    pub from: PathBuf,
    pub to: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoReaderResult {
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub url: String,
    /// An image was already loaded, nothing was decoded.
    pub skipped: bool,
}

/// Adjustments the visual optimizer applied. `None` means untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OptimizationResult {
    pub sigmoidal_adjustment: Option<f64>,
    pub saturation_adjustment: Option<f64>,
}

impl OptimizationResult {
    pub fn was_optimized(&self) -> bool {
        self.sigmoidal_adjustment.is_some() || self.saturation_adjustment.is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualitySearchResult {
    pub quality: u8,
    /// Probe encodes spent; diagnostics only.
    pub iterations: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhotoWriterResult {
    pub scale: String,
    pub width: u32,
    pub height: u32,
    pub file_size: u64,
    pub local_path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinifyResult {
    pub scale: String,
    pub original_size: u64,
    pub minified_size: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StageOutput {
    Moved(MoveResult),
    Metadata(Box<ExifData>),
    Read(PhotoReaderResult),
    Optimization(OptimizationResult),
    MetadataStripped,
    Quality(QualitySearchResult),
    Written(PhotoWriterResult),
    Minified(MinifyResult),
}

/// Append-only, ordered list of stage results for one photo.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StageResults(Vec<StageResult>);

impl StageResults {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, result: StageResult) {
        self.0.push(result);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &StageResult> {
        self.0.iter()
    }

    pub fn has_errors(&self) -> bool {
        self.0.iter().any(|r| r.is_err())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageFailure> {
        self.0.iter().filter_map(|r| r.as_ref().err())
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.failures().map(|f| f.to_string()).collect()
    }

    fn outputs(&self) -> impl Iterator<Item = &StageOutput> {
        self.0.iter().filter_map(|r| r.as_ref().ok())
    }

    pub fn moved(&self) -> Option<&MoveResult> {
        self.outputs().find_map(|o| match o {
            StageOutput::Moved(m) => Some(m),
            _ => None,
        })
    }

    pub fn metadata(&self) -> Option<&ExifData> {
        self.outputs().find_map(|o| match o {
            StageOutput::Metadata(m) => Some(m.as_ref()),
            _ => None,
        })
    }

    pub fn reader(&self) -> Option<&PhotoReaderResult> {
        self.outputs().find_map(|o| match o {
            StageOutput::Read(r) => Some(r),
            _ => None,
        })
    }

    pub fn optimization(&self) -> Option<&OptimizationResult> {
        self.outputs().find_map(|o| match o {
            StageOutput::Optimization(r) => Some(r),
            _ => None,
        })
    }

    pub fn quality(&self) -> Option<&QualitySearchResult> {
        self.outputs().find_map(|o| match o {
            StageOutput::Quality(r) => Some(r),
            _ => None,
        })
    }

    pub fn writers(&self) -> impl Iterator<Item = &PhotoWriterResult> {
        self.outputs().filter_map(|o| match o {
            StageOutput::Written(w) => Some(w),
            _ => None,
        })
    }

    pub fn writer(&self, scale: &str) -> Option<&PhotoWriterResult> {
        self.writers().find(|w| w.scale == scale)
    }

    pub fn minified(&self) -> impl Iterator<Item = &MinifyResult> {
        self.outputs().filter_map(|o| match o {
            StageOutput::Minified(m) => Some(m),
            _ => None,
        })
    }

    /// On-disk size of the `scale` rendition, after minification if it ran.
    pub fn rendition_size(&self, scale: &str) -> Option<u64> {
        self.minified()
            .find(|m| m.scale == scale)
            .map(|m| m.minified_size)
            .or_else(|| self.writer(scale).map(|w| w.file_size))
    }

    pub fn total_rendition_size(&self) -> u64 {
        self.writers()
            .filter_map(|w| self.rendition_size(&w.scale))
            .sum()
    }
}
