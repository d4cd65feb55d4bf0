// photoprep/src/processors/batch.rs
use crate::core::context::PhotoRecord;
use crate::core::pipeline::Pipeline;
use crate::core::{PhotoPrepError, Result};
use crate::utils::is_supported_format;
use indicatif::{ParallelProgressIterator, ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

/// Runs a pipeline over many photos on a bounded worker pool.
///
/// Setting the cancellation flag stops workers from starting new photos;
/// photos already in flight run to completion.
pub struct BatchDriver {
    threads: usize,
    quiet: bool,
    cancelled: Arc<AtomicBool>,
}

impl BatchDriver {
    pub fn new(threads: usize, quiet: bool) -> Self {
        Self {
            threads: threads.max(1),
            quiet,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Observe an externally owned flag, e.g. one set from a signal handler.
    pub fn with_cancellation_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancelled = flag;
        self
    }

    /// Shared flag; store `true` to cancel the remaining photos.
    pub fn cancellation_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn run<I: Send>(&self, pipeline: &Pipeline<I>, photos: &[PathBuf]) -> Result<BatchReport> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| PhotoPrepError::ThreadPool(e.to_string()))?;

        log::info!(
            "Processing {} photos with {} threads",
            photos.len(),
            self.threads
        );

        let pb = self.create_progress_bar(photos.len());

        // one slot per input index, so completion order does not matter
        let slots: Vec<Option<PhotoRecord>> = pool.install(|| {
            photos
                .par_iter()
                .progress_with(pb.clone())
                .map(|photo| {
                    if self.cancelled.load(Ordering::SeqCst) {
                        return None;
                    }

                    let record = pipeline.run(photo).into_record();
                    if record.is_success() {
                        log::info!("Processed {}", photo.display());
                    }
                    Some(record)
                })
                .collect()
        });

        let report = BatchReport::from_slots(photos, slots);

        pb.finish_with_message(format!(
            "{} succeeded, {} failed, {} skipped",
            report.successes().count(),
            report.failures().count(),
            report.skipped().len()
        ));

        Ok(report)
    }

    fn create_progress_bar(&self, total: usize) -> ProgressBar {
        if self.quiet {
            return ProgressBar::hidden();
        }

        let pb = ProgressBar::new(total as u64);
        let style = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
        pb.set_style(style);
        pb
    }
}

/// Outcome of a batch, in input order.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    records: Vec<PhotoRecord>,
    skipped: Vec<PathBuf>,
}

impl BatchReport {
    fn from_slots(photos: &[PathBuf], slots: Vec<Option<PhotoRecord>>) -> Self {
        let mut report = Self::default();

        for (photo, slot) in photos.iter().zip(slots) {
            match slot {
                Some(record) => report.records.push(record),
                None => report.skipped.push(photo.clone()),
            }
        }

        report
    }

    /// Every photo that ran, successful or not.
    pub fn records(&self) -> &[PhotoRecord] {
        &self.records
    }

    pub fn successes(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.records.iter().filter(|r| r.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &PhotoRecord> {
        self.records.iter().filter(|r| !r.is_success())
    }

    /// Photos never started because the batch was cancelled.
    pub fn skipped(&self) -> &[PathBuf] {
        &self.skipped
    }

    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && !self.has_failures()
    }

    pub fn log_failures(&self) {
        for record in self.failures() {
            log::error!("Failed to process {}:", record.source_file.display());
            for message in record.results.error_messages() {
                log::error!("  {}", message);
            }
        }

        if !self.skipped.is_empty() {
            log::error!(
                "{} photos were not processed because the run was cancelled",
                self.skipped.len()
            );
        }
    }
}

/// Supported photos directly inside `dir`, sorted by path.
pub fn collect_photos(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut photos = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(std::io::Error::from)?;

        if entry.file_type().is_file() && is_supported_format(entry.path()) {
            photos.push(entry.into_path());
        }
    }

    photos.sort();
    Ok(photos)
}

/// Fail if any of `subdirs` already exists under `root`.
pub fn check_directories(root: &Path, subdirs: &[String]) -> Result<()> {
    for subdir in subdirs {
        let dir = root.join(subdir);
        if dir.exists() {
            return Err(PhotoPrepError::DirectoryExists(dir));
        }
    }
    Ok(())
}

/// Create every output subdirectory; none may exist beforehand.
pub fn prepare_directories(root: &Path, subdirs: &[String]) -> Result<()> {
    check_directories(root, subdirs)?;

    for subdir in subdirs {
        let dir = root.join(subdir);
        std::fs::create_dir(&dir)?;
        log::debug!("Created {}", dir.display());
    }

    Ok(())
}
