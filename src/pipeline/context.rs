/*!
 * Shared pipeline state.
 *
 * One context is built at startup and shared across jobs behind an Arc.
 * It owns the collaborators (scorer, matcher, aligner, flagger,
 * extraction tool), the repository, and the in-memory reference
 * catalogue. Per-reference write locks serialize grafting so two
 * translations matched to the same reference never interleave output
 * writes.
 */

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context as AnyhowContext, Result};
use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::RwLock;

use crate::app_config::Config;
use crate::database::{ReferenceRecord, Repository, UnitRecord};
use crate::extraction::ExtractionTool;
use crate::file_utils::FileManager;
use crate::matching::{DocumentMatcher, ParagraphAligner};
use crate::pipeline::jobs::JobRegistry;
use crate::providers::{EmbeddingProvider, MockProvider, OllamaProvider};
use crate::scoring::SimilarityScorer;
use crate::structure::ReferenceDocument;
use crate::validation::{TermList, ValidationFlagger};

pub struct PipelineContext {
    pub config: Config,
    pub repository: Repository,
    pub registry: JobRegistry,
    pub scorer: Arc<SimilarityScorer>,
    pub matcher: DocumentMatcher,
    pub aligner: ParagraphAligner,
    pub flagger: ValidationFlagger,
    pub extraction: ExtractionTool,
    catalogue: RwLock<Vec<Arc<ReferenceDocument>>>,
    reference_ids: parking_lot::RwLock<HashMap<String, i64>>,
    write_locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl PipelineContext {
    /// Wire up all collaborators from configuration. Does not touch the
    /// catalogue directory; call [`load_catalogue`](Self::load_catalogue)
    /// before processing.
    pub fn new(config: Config, repository: Repository) -> Result<Self> {
        let provider = build_provider(&config)?;

        let scorer = match provider {
            Some(provider) => {
                info!("Embedding provider enabled: {}", provider.name());
                Arc::new(SimilarityScorer::with_provider(provider))
            }
            None => {
                info!("No embedding provider configured, scoring lexically");
                Arc::new(SimilarityScorer::new())
            }
        };

        let terms = match &config.terms_file {
            Some(path) => {
                let list = TermList::load(path)
                    .with_context(|| format!("Failed to load term list: {}", path.display()))?;
                info!("Loaded {} term pairs from {}", list.len(), path.display());
                Some(list)
            }
            None => None,
        };

        let matcher = DocumentMatcher::new(Arc::clone(&scorer), config.matching.clone());
        let aligner = ParagraphAligner::new(Arc::clone(&scorer), config.matching.clone());
        let flagger = ValidationFlagger::new(terms);
        let extraction = ExtractionTool::new(config.extraction.clone());
        let registry = JobRegistry::new(repository.clone());

        Ok(Self {
            config,
            repository,
            registry,
            scorer,
            matcher,
            aligner,
            flagger,
            extraction,
            catalogue: RwLock::new(Vec::new()),
            reference_ids: parking_lot::RwLock::new(HashMap::new()),
            write_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Scan the catalogue directory, parse every reference document, and
    /// persist its record and units. Already-known paths keep their row
    /// id; their units are replaced so edits to a reference file take
    /// effect on the next run.
    ///
    /// A file that fails to parse is skipped with a warning rather than
    /// aborting the whole catalogue.
    pub async fn load_catalogue(&self) -> Result<usize> {
        let paths = FileManager::scan_xml_files(&self.config.catalogue_dir)?;
        info!(
            "Scanning catalogue: {} XML files under {}",
            paths.len(),
            self.config.catalogue_dir.display()
        );

        let mut documents = Vec::new();
        let mut ids = HashMap::new();

        for path in paths {
            let document = match ReferenceDocument::load(&path) {
                Ok(document) => document,
                Err(e) => {
                    warn!("Skipping unreadable reference {}: {:#}", path.display(), e);
                    continue;
                }
            };

            if document.units.is_empty() {
                warn!(
                    "Skipping reference with no structural units: {}",
                    path.display()
                );
                continue;
            }

            let reference_id = self.persist_reference(&document).await?;
            ids.insert(document.filename.clone(), reference_id);
            documents.push(Arc::new(document));
        }

        let count = documents.len();
        info!("Catalogue loaded: {} reference documents", count);

        *self.catalogue.write().await = documents;
        *self.reference_ids.write() = ids;
        Ok(count)
    }

    async fn persist_reference(&self, document: &ReferenceDocument) -> Result<i64> {
        let path = document.path.to_string_lossy().into_owned();
        let unit_count = document.units.len() as i64;

        let reference_id = match self.repository.get_reference_by_path(&path).await? {
            Some(existing) => existing.id,
            None => {
                let record = ReferenceRecord::new(
                    path,
                    document.filename.clone(),
                    document.author.clone(),
                    unit_count,
                );
                self.repository.insert_reference(&record).await?
            }
        };

        let units = document
            .units
            .iter()
            .map(|unit| {
                Ok(UnitRecord {
                    id: 0,
                    reference_id,
                    unit_id: unit.id.clone(),
                    ordinal: unit.ordinal as i64,
                    kind: unit.kind.to_string(),
                    plain_text: unit.plain_text.clone(),
                    markup_tree: serde_json::to_string(&unit.markup_tree)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        self.repository.insert_units(reference_id, units).await?;
        Ok(reference_id)
    }

    /// Snapshot of the loaded catalogue
    pub async fn catalogue(&self) -> Vec<Arc<ReferenceDocument>> {
        self.catalogue.read().await.clone()
    }

    /// Look up a loaded reference by filename
    pub async fn reference(&self, filename: &str) -> Option<Arc<ReferenceDocument>> {
        self.catalogue
            .read()
            .await
            .iter()
            .find(|r| r.filename == filename)
            .cloned()
    }

    /// Database row id of a loaded reference
    pub fn reference_id(&self, filename: &str) -> Option<i64> {
        self.reference_ids.read().get(filename).copied()
    }

    /// Per-reference lock guarding grafted output writes
    pub fn write_lock(&self, filename: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.write_locks.lock();
        Arc::clone(
            locks
                .entry(filename.to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }
}

fn build_provider(config: &Config) -> Result<Option<Arc<dyn EmbeddingProvider>>> {
    let Some(embedding) = &config.embedding else {
        return Ok(None);
    };

    match embedding.provider_type.as_str() {
        "ollama" => {
            let provider = OllamaProvider::new(embedding)
                .map_err(|e| anyhow::anyhow!("Failed to build Ollama provider: {}", e))?;
            Ok(Some(Arc::new(provider)))
        }
        "mock" => Ok(Some(Arc::new(MockProvider::new()))),
        other => {
            warn!(
                "Unknown embedding provider type '{}', continuing without embeddings",
                other
            );
            Ok(None)
        }
    }
}
