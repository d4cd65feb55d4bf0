// photoprep/src/core/pipeline.rs
//! Ordered per-photo stage execution.
//!
//! Stages are immutable configuration shared by every worker; all per-run
//! state lives in the [`ProcessingContext`] created fresh for each photo.
//! A run stops at the first failed result, and the context's image is
//! released on every exit path.

use super::context::ProcessingContext;
use super::results::StageResult;
use std::path::PathBuf;

/// One discrete unit of per-photo work.
pub trait Stage<I>: Send + Sync {
    fn name(&self) -> &'static str;

    /// Work on the context. `None` means the stage had nothing to report.
    fn process(&self, ctx: &mut ProcessingContext<I>) -> Option<StageResult>;

    /// Stages that write files into their own subdirectory expose it here.
    fn as_output_directory(&self) -> Option<&dyn OutputDirectory> {
        None
    }
}

pub trait OutputDirectory {
    fn output_subdirectory(&self) -> &str;
}

pub struct Pipeline<I> {
    stages: Vec<Box<dyn Stage<I>>>,
}

impl<I> Default for Pipeline<I> {
    fn default() -> Self {
        Self { stages: Vec::new() }
    }
}

impl<I> Pipeline<I> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_stage(&mut self, stage: impl Stage<I> + 'static) -> &mut Self {
        self.stages.push(Box::new(stage));
        self
    }

    pub fn with_stage(mut self, stage: impl Stage<I> + 'static) -> Self {
        self.add_stage(stage);
        self
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Run every stage in order against a new context for `photo`.
    pub fn run(&self, photo: impl Into<PathBuf>) -> ProcessingContext<I> {
        let mut ctx = ProcessingContext::new(photo);

        for stage in &self.stages {
            let Some(result) = stage.process(&mut ctx) else {
                continue;
            };

            let failed = result.is_err();
            if let Err(failure) = &result {
                log::warn!("{}: {}", ctx.source_file().display(), failure);
            }
            ctx.push_result(result);

            if failed {
                break;
            }
        }

        ctx.release_image();
        ctx
    }

    /// Subdirectory names declared by rendition-producing stages, in stage order.
    pub fn output_directories(&self) -> Vec<String> {
        self.stages
            .iter()
            .filter_map(|s| s.as_output_directory())
            .map(|d| d.output_subdirectory().to_string())
            .collect()
    }
}
