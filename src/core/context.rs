// photoprep/src/core/context.rs
use super::results::{StageResult, StageResults};
use std::path::{Path, PathBuf};

/// Per-photo state for one pipeline run.
///
/// The context exclusively owns the decoded image. Dropping the image (via
/// [`release_image`](Self::release_image) or dropping the context) releases it;
/// the engine does so at the end of every run.
#[derive(Debug)]
pub struct ProcessingContext<I> {
    source_file: PathBuf,
    image: Option<I>,
    results: StageResults,
}

impl<I> ProcessingContext<I> {
    pub fn new(source_file: impl Into<PathBuf>) -> Self {
        Self {
            source_file: source_file.into(),
            image: None,
            results: StageResults::new(),
        }
    }

    pub fn source_file(&self) -> &Path {
        &self.source_file
    }

    /// Point later stages at a relocated source file.
    pub fn set_source_file(&mut self, path: impl Into<PathBuf>) {
        self.source_file = path.into();
    }

    pub fn image(&self) -> Option<&I> {
        self.image.as_ref()
    }

    pub fn image_mut(&mut self) -> Option<&mut I> {
        self.image.as_mut()
    }

    pub fn has_image(&self) -> bool {
        self.image.is_some()
    }

    /// Replace the owned image; a previously held one is dropped.
    pub fn set_image(&mut self, image: I) {
        self.image = Some(image);
    }

    pub fn release_image(&mut self) {
        if self.image.take().is_some() {
            log::debug!("Released image for {}", self.source_file.display());
        }
    }

    pub fn results(&self) -> &StageResults {
        &self.results
    }

    pub(crate) fn push_result(&mut self, result: StageResult) {
        self.results.push(result);
    }

    pub fn has_errors(&self) -> bool {
        self.results.has_errors()
    }

    /// Finish the run: release the image and keep the identity and results.
    pub fn into_record(mut self) -> PhotoRecord {
        self.release_image();
        PhotoRecord {
            source_file: self.source_file,
            results: self.results,
        }
    }
}

/// What survives of a photo's run once its image is gone.
#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRecord {
    pub source_file: PathBuf,
    pub results: StageResults,
}

impl PhotoRecord {
    pub fn is_success(&self) -> bool {
        !self.results.has_errors()
    }

    pub fn file_name(&self) -> String {
        self.source_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}
