/*!
 * Common test utilities for the textgraft test suite
 */

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use textgraft::app_config::{Config, ExtractionConfig};
use textgraft::database::Repository;
use textgraft::pipeline::PipelineContext;

// Re-export the mock providers module
pub mod mock_providers;

/// Creates a temporary directory for test files
pub fn create_temp_dir() -> Result<TempDir> {
    Ok(TempDir::new()?)
}

/// Route log output through env_logger so RUST_LOG works in tests
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// Creates a test file with the given content in the specified directory
pub fn create_test_file(dir: &Path, filename: &str, content: &str) -> Result<PathBuf> {
    let file_path = dir.join(filename);
    fs::write(&file_path, content)?;
    Ok(file_path)
}

/// A small English reference document with a heading, two paragraphs,
/// and one inline formatting run
pub const PRAYERS_REFERENCE: &str = r#"<html><body>
<h1>Prayers</h1>
<p id="p1">O my God! Grant that I may serve Thy Cause and be steadfast in Thy love.</p>
<p id="p2">This is <span class="hl">important</span> text for every seeker of truth.</p>
</body></html>"#;

/// A reference document with no textual relation to the prayers content
pub const HIDDEN_WORDS_REFERENCE: &str = r#"<html><body>
<h1>Hidden Words</h1>
<p>Veiled in my immemorial being and in the ancient eternity of my essence.</p>
</body></html>"#;

/// Same-language translation content whose fragments align to
/// [`PRAYERS_REFERENCE`] one-to-one
pub const PRAYERS_TRANSLATION: &str = "Prayers\n\n\
O my God! Grant that I may serve Thy Cause and be steadfast in Thy love.\n\n\
This is vital text for every seeker of truth.";

/// Config pointing at temp directories, with a shell echo standing in
/// for the extraction tool
pub fn test_config(root: &Path) -> Config {
    let mut config = Config::default();
    config.catalogue_dir = root.join("catalogue");
    config.output_dir = root.join("output");
    config.extraction = ExtractionConfig {
        command: "sh".to_string(),
        args: vec!["-c".to_string(), "cat \"$0\"".to_string()],
        cache_dir: root.join("cache"),
        timeout_secs: 30,
    };
    config.concurrency = 2;
    config
}

/// Build a pipeline context over an in-memory database, seeding the
/// catalogue directory with the given (filename, content) pairs
pub async fn build_context(
    root: &Path,
    references: &[(&str, &str)],
) -> Result<Arc<PipelineContext>> {
    init_logging();

    let config = test_config(root);
    fs::create_dir_all(&config.catalogue_dir)?;
    for (filename, content) in references {
        create_test_file(&config.catalogue_dir, filename, content)?;
    }

    let repository = Repository::new_in_memory()?;
    let context = Arc::new(PipelineContext::new(config, repository)?);
    context.load_catalogue().await?;
    Ok(context)
}
