//! File-format transcoding boundary (FIT <-> TCX <-> GPX).
//!
//! The transcoder is an external collaborator: the engine only asks
//! whether a conversion is possible and treats the returned bytes as
//! authoritative for the destination. The shipped implementation delegates
//! to a converter binary configured by the operator (gpsbabel-style CLI);
//! deployments without one run with [`NullTranscoder`] and simply never
//! transcode.

use std::collections::HashSet;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use thiserror::Error;

use crate::entity::file_format::FileFormat;

/// Errors from the transcoding boundary.
#[derive(Debug, Error)]
pub enum TranscodeError {
    #[error("conversion {from} -> {to} is not supported")]
    Unsupported { from: FileFormat, to: FileFormat },

    #[error("converter failed: {message}")]
    Tool { message: String },

    #[error("converter i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Opaque conversion capability consumed by the cache and the CLI.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Whether `from -> to` is a conversion this transcoder can do.
    fn supports(&self, from: FileFormat, to: FileFormat) -> bool;

    /// Convert `input` from one format to another.
    async fn transcode(
        &self,
        input: &[u8],
        from: FileFormat,
        to: FileFormat,
    ) -> Result<Vec<u8>, TranscodeError>;
}

/// A transcoder that supports nothing. Directions that would need a
/// conversion fail over to downloading the target format directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTranscoder;

#[async_trait]
impl Transcoder for NullTranscoder {
    fn supports(&self, _from: FileFormat, _to: FileFormat) -> bool {
        false
    }

    async fn transcode(
        &self,
        _input: &[u8],
        from: FileFormat,
        to: FileFormat,
    ) -> Result<Vec<u8>, TranscodeError> {
        Err(TranscodeError::Unsupported { from, to })
    }
}

/// Shells out to an external converter binary.
///
/// The binary is invoked as `<program> <input-file> <output-file>`; formats
/// are communicated through the file extensions, which every mainstream
/// converter keys on.
pub struct CommandTranscoder {
    program: PathBuf,
    conversions: HashSet<(FileFormat, FileFormat)>,
}

impl CommandTranscoder {
    /// Wrap `program`, advertising the downgrade conversions the usual
    /// converter tools handle (FIT/TCX to GPX, FIT to TCX).
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        let mut conversions = HashSet::new();
        conversions.insert((FileFormat::Fit, FileFormat::Gpx));
        conversions.insert((FileFormat::Fit, FileFormat::Tcx));
        conversions.insert((FileFormat::Tcx, FileFormat::Gpx));

        Self {
            program: program.into(),
            conversions,
        }
    }

    /// Replace the advertised conversion set.
    #[must_use]
    pub fn with_conversions(
        mut self,
        conversions: impl IntoIterator<Item = (FileFormat, FileFormat)>,
    ) -> Self {
        self.conversions = conversions.into_iter().collect();
        self
    }
}

#[async_trait]
impl Transcoder for CommandTranscoder {
    fn supports(&self, from: FileFormat, to: FileFormat) -> bool {
        from != to && self.conversions.contains(&(from, to))
    }

    async fn transcode(
        &self,
        input: &[u8],
        from: FileFormat,
        to: FileFormat,
    ) -> Result<Vec<u8>, TranscodeError> {
        if !self.supports(from, to) {
            return Err(TranscodeError::Unsupported { from, to });
        }

        let workdir = tempfile::tempdir()?;
        let input_path = workdir.path().join(format!("input.{}", from.extension()));
        let output_path = workdir.path().join(format!("output.{}", to.extension()));

        tokio::fs::write(&input_path, input).await?;

        let output = tokio::process::Command::new(&self.program)
            .arg(&input_path)
            .arg(&output_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(TranscodeError::Tool {
                message: format!(
                    "{} exited with {}: {}",
                    self.program.display(),
                    output.status,
                    stderr.trim()
                ),
            });
        }

        let converted = tokio::fs::read(&output_path).await.map_err(|e| {
            TranscodeError::Tool {
                message: format!("converter produced no output file: {e}"),
            }
        })?;

        Ok(converted)
    }
}
