// photoprep/src/processors/mover.rs
use crate::core::context::ProcessingContext;
use crate::core::pipeline::{OutputDirectory, Stage};
use crate::core::results::{MoveResult, StageFailure, StageOutput, StageResult};
use std::path::PathBuf;

pub const SOURCE_SUBDIR: &str = "src";

/// Moves the original file into a subdirectory next to it and points the
/// context at the new location.
pub struct MoveStage {
    subdir: String,
}

impl MoveStage {
    pub fn new(subdir: impl Into<String>) -> Self {
        Self {
            subdir: subdir.into(),
        }
    }

    fn destination(&self, ctx_source: &std::path::Path) -> Option<PathBuf> {
        let parent = ctx_source.parent()?;
        let name = ctx_source.file_name()?;
        Some(parent.join(&self.subdir).join(name))
    }
}

impl<I> Stage<I> for MoveStage {
    fn name(&self) -> &'static str {
        "move"
    }

    fn process(&self, ctx: &mut ProcessingContext<I>) -> Option<StageResult> {
        let from = ctx.source_file().to_path_buf();

        let Some(to) = self.destination(&from) else {
            return Some(Err(StageFailure::new(
                "move",
                format!("Cannot derive destination for {}", from.display()),
            )));
        };

        if let Err(e) = std::fs::rename(&from, &to) {
            return Some(Err(StageFailure::new(
                "move",
                format!(
                    "Error moving photo {} to subdir {}: {}",
                    from.display(),
                    self.subdir,
                    e
                ),
            )));
        }

        log::debug!("Moved {} to {}", from.display(), to.display());

        ctx.set_source_file(&to);

        Some(Ok(StageOutput::Moved(MoveResult { from, to })))
    }

    fn as_output_directory(&self) -> Option<&dyn OutputDirectory> {
        Some(self)
    }
}

impl OutputDirectory for MoveStage {
    fn output_subdirectory(&self) -> &str {
        &self.subdir
    }
}
