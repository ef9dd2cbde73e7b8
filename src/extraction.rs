/*!
 * External extraction tool invocation.
 *
 * The OCR/extraction step is an external command: it receives a source
 * file path and an output directory and leaves a text representation
 * behind. Output is cached keyed by the SHA-256 of the source file, so a
 * re-run after a failed job skips documents that were already extracted.
 * Extraction runs off the request path and may block for minutes; there
 * is no mid-extraction cancellation.
 */

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, info, warn};
use sha2::{Digest, Sha256};
use tokio::process::Command;

use crate::app_config::ExtractionConfig;
use crate::errors::ExtractionError;

/// Output file extensions the tool is known to produce
const OUTPUT_EXTENSIONS: &[&str] = &["json", "txt", "md"];

/// Wrapper around the external extraction command
pub struct ExtractionTool {
    config: ExtractionConfig,
}

/// How an extraction result was obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionOrigin {
    /// The tool was invoked
    Fresh,
    /// A cached result was reused
    Cached,
}

impl ExtractionTool {
    /// Create a tool wrapper with the given configuration
    pub fn new(config: ExtractionConfig) -> Self {
        Self { config }
    }

    /// Extract a source file, reusing cached output when present.
    ///
    /// Returns the raw textual output plus whether it came from cache.
    pub async fn extract(
        &self,
        source: &Path,
    ) -> Result<(String, ExtractionOrigin), ExtractionError> {
        let cache_path = self.cache_path(source)?;

        if cache_path.exists() {
            debug!("Extraction cache hit for {}", source.display());
            let content = std::fs::read_to_string(&cache_path)
                .map_err(|e| ExtractionError::ParseError(e.to_string()))?;
            return Ok((content, ExtractionOrigin::Cached));
        }

        let content = self.run_tool(source).await?;

        if let Some(parent) = cache_path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        if let Err(e) = std::fs::write(&cache_path, &content) {
            warn!(
                "Failed to write extraction cache {}: {}",
                cache_path.display(),
                e
            );
        }

        Ok((content, ExtractionOrigin::Fresh))
    }

    /// Cache file path for a source: `<stem>-<hash12>.out`
    fn cache_path(&self, source: &Path) -> Result<PathBuf, ExtractionError> {
        let bytes = std::fs::read(source).map_err(|e| {
            ExtractionError::LaunchFailed(format!(
                "cannot read source file {}: {}",
                source.display(),
                e
            ))
        })?;

        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        let hash = format!("{:x}", hasher.finalize());

        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "input".to_string());

        Ok(self
            .config
            .cache_dir
            .join(format!("{}-{}.out", stem, &hash[..12])))
    }

    async fn run_tool(&self, source: &Path) -> Result<String, ExtractionError> {
        let out_dir = tempfile::tempdir()
            .map_err(|e| ExtractionError::LaunchFailed(e.to_string()))?;

        info!(
            "Running extraction tool '{}' on {}",
            self.config.command,
            source.display()
        );

        let mut command = Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .arg(source)
            .arg(out_dir.path());

        let output = tokio::time::timeout(
            Duration::from_secs(self.config.timeout_secs),
            command.output(),
        )
        .await
        .map_err(|_| ExtractionError::ToolFailed {
            code: -1,
            stderr: format!(
                "timed out after {} seconds",
                self.config.timeout_secs
            ),
        })?
        .map_err(|e| ExtractionError::LaunchFailed(e.to_string()))?;

        if !output.status.success() {
            return Err(ExtractionError::ToolFailed {
                code: output.status.code().unwrap_or(-1),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        // Prefer an output file matching the source stem; fall back to
        // stdout for tools that stream their result.
        if let Some(path) = find_output_file(out_dir.path(), source) {
            return std::fs::read_to_string(&path)
                .map_err(|e| ExtractionError::ParseError(e.to_string()));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if stdout.trim().is_empty() {
            return Err(ExtractionError::MissingOutput(
                source.display().to_string(),
            ));
        }

        Ok(stdout)
    }
}

/// Look for `<stem>.<ext>` in the tool's output directory, including one
/// level of nesting (some tools create a per-document subdirectory).
fn find_output_file(out_dir: &Path, source: &Path) -> Option<PathBuf> {
    let stem = source.file_stem()?.to_string_lossy().into_owned();

    for dir in [out_dir.to_path_buf(), out_dir.join(&stem)] {
        for ext in OUTPUT_EXTENSIONS {
            let candidate = dir.join(format!("{}.{}", stem, ext));
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}
