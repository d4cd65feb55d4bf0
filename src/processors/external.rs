// photoprep/src/processors/external.rs
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ToolError {
    #[error("Failed to run {tool}: {source}")]
    Spawn {
        tool: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} exited with {status}: {message}")]
    Failed {
        tool: String,
        status: String,
        message: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run a prepared command to completion, turning a non-zero exit into an error
/// carrying the tool's stderr.
pub fn run_tool(mut cmd: Command, tool: &str) -> Result<(), ToolError> {
    log::debug!("Running {:?}", cmd);

    let output = cmd.output().map_err(|source| ToolError::Spawn {
        tool: tool.to_string(),
        source,
    })?;

    if output.status.success() {
        Ok(())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr);
        let stdout = String::from_utf8_lossy(&output.stdout);
        let message = if stderr.trim().is_empty() {
            stdout.trim().to_string()
        } else {
            stderr.trim().to_string()
        };

        Err(ToolError::Failed {
            tool: tool.to_string(),
            status: output.status.to_string(),
            message,
        })
    }
}
