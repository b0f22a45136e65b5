//! Firmware build-and-flash via the external `arduino-cli` tool.
//!
//! The generator firmware is an Arduino sketch.  Before first use (or after
//! a sketch mismatch) the operator compiles and uploads it to the board:
//!
//! ```text
//! arduino-cli compile --fqbn <fqbn> <sketch>
//! arduino-cli upload -p <port> --fqbn <fqbn> <sketch>
//! ```
//!
//! Both steps stream their diagnostic output line by line to the caller's
//! observer (the CLI prints them; stderr lines carry an `ERR: ` prefix).
//! A compile failure aborts before the upload is attempted.

use std::io;
use std::path::{Path, PathBuf};
use std::process::{ExitStatus, Stdio};

use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::info;

use crate::infrastructure::storage::config::FlashSettings;

/// Errors produced by the build-and-flash pipeline.
#[derive(Debug, Error)]
pub enum FlashError {
    /// The external tool binary could not be launched.
    #[error("failed to launch {tool}: {source}")]
    Spawn {
        tool: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The compile step exited non-zero; the upload was not attempted.
    #[error("compilation failed (exit code {code:?}); upload aborted")]
    CompileFailed { code: Option<i32> },

    /// The upload step exited non-zero.
    #[error("upload failed (exit code {code:?})")]
    UploadFailed { code: Option<i32> },

    /// Reading the tool's streamed output failed.
    #[error("I/O error while streaming tool output: {0}")]
    Stream(#[from] io::Error),
}

/// Compiles the sketch and uploads it to the board on `port`.
///
/// `on_output` receives every diagnostic line as it arrives, in the order
/// the tool produced it within each stream.
///
/// # Errors
///
/// Returns [`FlashError::CompileFailed`] / [`FlashError::UploadFailed`]
/// keyed to whichever step broke, or a spawn/stream error.
pub async fn compile_and_upload(
    settings: &FlashSettings,
    port: &str,
    mut on_output: impl FnMut(&str),
) -> Result<(), FlashError> {
    let sketch = settings.sketch_path.to_string_lossy();

    info!(sketch = %sketch, fqbn = %settings.fqbn, "compiling firmware");
    let status = run_streaming(
        &settings.cli_path,
        &["compile", "--fqbn", &settings.fqbn, &sketch],
        &mut on_output,
    )
    .await?;
    if !status.success() {
        return Err(FlashError::CompileFailed {
            code: status.code(),
        });
    }

    info!(port, "compilation succeeded; uploading");
    let status = run_streaming(
        &settings.cli_path,
        &["upload", "-p", port, "--fqbn", &settings.fqbn, &sketch],
        &mut on_output,
    )
    .await?;
    if !status.success() {
        return Err(FlashError::UploadFailed {
            code: status.code(),
        });
    }

    info!(port, "upload successful");
    Ok(())
}

/// Runs one tool invocation, forwarding stdout and stderr lines to
/// `on_output` until both streams close, then reaps the exit status.
async fn run_streaming(
    tool: &Path,
    args: &[&str],
    on_output: &mut impl FnMut(&str),
) -> Result<ExitStatus, FlashError> {
    let mut child = Command::new(tool)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| FlashError::Spawn {
            tool: tool.to_path_buf(),
            source,
        })?;

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| FlashError::Stream(io::Error::other("child stdout not captured")))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| FlashError::Stream(io::Error::other("child stderr not captured")))?;

    let mut out_lines = BufReader::new(stdout).lines();
    let mut err_lines = BufReader::new(stderr).lines();
    let (mut out_done, mut err_done) = (false, false);

    while !(out_done && err_done) {
        tokio::select! {
            line = out_lines.next_line(), if !out_done => match line? {
                Some(l) => on_output(&l),
                None => out_done = true,
            },
            line = err_lines.next_line(), if !err_done => match line? {
                Some(l) => on_output(&format!("ERR: {l}")),
                None => err_done = true,
            },
        }
    }

    Ok(child.wait().await?)
}
