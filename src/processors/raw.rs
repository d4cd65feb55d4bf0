// photoprep/src/processors/raw.rs
//! Camera RAW development.
//!
//! RAW files are developed by an external converter into a 16-bit TIFF which
//! the raster backend then decodes like any other image.

use super::external::{run_tool, ToolError};
use std::path::Path;
use std::process::Command;

pub trait RawConverter: Send + Sync {
    /// Develop `source` into a TIFF at `destination`, overwriting it.
    fn convert(&self, source: &Path, destination: &Path) -> Result<(), ToolError>;
}

/// Develops RAW files with `rawtherapee-cli`.
#[derive(Debug, Clone)]
pub struct RawTherapeeConverter {
    binary: String,
}

impl RawTherapeeConverter {
    pub fn new() -> Self {
        Self {
            binary: "rawtherapee-cli".to_string(),
        }
    }

    pub fn with_binary(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    fn command(&self, source: &Path, destination: &Path) -> Command {
        let mut cmd = Command::new(&self.binary);
        // -t: 16-bit TIFF, -Y: overwrite, -c must come last
        cmd.arg("-o")
            .arg(destination)
            .args(["-t", "-Y", "-c"])
            .arg(source);
        cmd
    }
}

impl Default for RawTherapeeConverter {
    fn default() -> Self {
        Self::new()
    }
}

impl RawConverter for RawTherapeeConverter {
    fn convert(&self, source: &Path, destination: &Path) -> Result<(), ToolError> {
        log::debug!(
            "Developing {} to {}",
            source.display(),
            destination.display()
        );
        run_tool(self.command(source, destination), &self.binary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_is_the_last_argument() {
        let converter = RawTherapeeConverter::new();
        let cmd = converter.command(Path::new("/p/a.nef"), Path::new("/tmp/a.tif"));

        let args: Vec<_> = cmd
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();

        assert_eq!(cmd.get_program(), "rawtherapee-cli");
        assert_eq!(args, vec!["-o", "/tmp/a.tif", "-t", "-Y", "-c", "/p/a.nef"]);
    }

    #[test]
    fn unavailable_converter_reports_error() {
        let converter = RawTherapeeConverter::with_binary("photoprep-missing-rawtherapee");
        let result = converter.convert(Path::new("/p/a.nef"), Path::new("/tmp/a.tif"));
        assert!(result.is_err());
    }
}
