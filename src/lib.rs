/*!
 * # textgraft
 *
 * A library for matching translated documents against a catalogue of
 * structured XML reference documents and grafting the translated text
 * back into the reference markup.
 *
 * ## Features
 *
 * - Extract structural units (headings, paragraphs, list items, table
 *   cells) from XML reference documents while preserving inline markup
 * - Normalize OCR/extraction output into ordered translation fragments
 * - Match whole translations to catalogue references with combined
 *   lexical, length, and optional embedding evidence
 * - Two-pass cursor-and-window paragraph alignment with bounded
 *   comparison cost
 * - Validation flags (terminology, ordering, length anomalies) on every
 *   low-confidence decision instead of silent drops
 * - Graft translated text into the reference tree, relocating inline
 *   formatting runs
 * - SQLite-backed record store with manual override and approval flows
 *
 * ## Architecture
 *
 * The library is organized in these main modules:
 * - `app_config`: Configuration management
 * - `structure`: XML parsing, unit extraction, markup trees, grafting
 * - `fragments`: Translation fragment normalization and lifecycle
 * - `extraction`: External extraction tool wrapper with output caching
 * - `scoring`: Text and title similarity scoring
 * - `matching`: Document-level matching and paragraph alignment
 * - `validation`: Review flags and the custom term list
 * - `providers`: Embedding service clients
 * - `database`: SQLite connection, schema, and typed repository
 * - `pipeline`: Shared context, job registry, and the orchestrator
 * - `file_utils`: File system operations
 * - `language_utils`: ISO language code utilities
 * - `errors`: Custom error types for the application
 */

#![allow(clippy::uninlined_format_args)]
#![allow(clippy::redundant_closure_for_method_calls)]

// Public modules
pub mod app_config;
pub mod database;
pub mod errors;
pub mod extraction;
pub mod file_utils;
pub mod fragments;
pub mod language_utils;
pub mod matching;
pub mod pipeline;
pub mod providers;
pub mod scoring;
pub mod structure;
pub mod validation;

// Re-export main types for easier usage
pub use app_config::Config;
pub use errors::AppError;
pub use fragments::{FragmentSource, TranslationDocument, TranslationFragment};
pub use matching::{ConfidenceTier, DocumentMatcher, ParagraphAligner};
pub use pipeline::{PipelineContext, PipelineOrchestrator};
pub use structure::{ReferenceDocument, StructuralUnit, StructureWriter};
