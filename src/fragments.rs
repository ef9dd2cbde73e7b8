/*!
 * Translation fragments and the fragment source.
 *
 * The external extraction tool produces loosely structured output: a flat
 * string, a `{content: ...}` wrapper, or nested blocks with text fields
 * and page hints. `FragmentSource` normalizes all of these into one
 * ordered sequence of fragments per translation document.
 */

use std::path::{Path, PathBuf};

use anyhow::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::ExtractionError;
use crate::language_utils;

/// Blank lines separate blocks; OCR output often leaves stray spaces on them
static BLOCK_SEPARATOR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n[ \t\r]*\n").unwrap());

/// One unit of extracted translation text, ordered within its document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranslationFragment {
    /// Position within the document's fragment sequence (0-based)
    pub sequence_index: usize,
    /// Fragment text, whitespace-normalized
    pub text: String,
    /// Page the fragment was extracted from, when known
    pub page: Option<u32>,
}

/// Lifecycle of a translation document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslationStatus {
    /// Registered but not yet extracted
    Pending,
    /// Fragments extracted, awaiting matching
    Extracted,
    /// Matched to a reference document
    Matched,
    /// No reference cleared the match floor
    Unmatched,
    /// Extraction or processing failed
    Failed,
}

impl std::fmt::Display for TranslationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TranslationStatus::Pending => write!(f, "pending"),
            TranslationStatus::Extracted => write!(f, "extracted"),
            TranslationStatus::Matched => write!(f, "matched"),
            TranslationStatus::Unmatched => write!(f, "unmatched"),
            TranslationStatus::Failed => write!(f, "failed"),
        }
    }
}

impl std::str::FromStr for TranslationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TranslationStatus::Pending),
            "extracted" => Ok(TranslationStatus::Extracted),
            "matched" => Ok(TranslationStatus::Matched),
            "unmatched" => Ok(TranslationStatus::Unmatched),
            "failed" => Ok(TranslationStatus::Failed),
            _ => Err(anyhow::anyhow!("Invalid translation status: {}", s)),
        }
    }
}

/// A translation document: ordered fragments plus detected language
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationDocument {
    /// Stable identifier
    pub id: String,
    /// Source file path
    pub path: PathBuf,
    /// Detected source language (ISO 639-1), if detection succeeded
    pub language: Option<String>,
    /// Ordered fragments
    pub fragments: Vec<TranslationFragment>,
    /// Lifecycle state
    pub status: TranslationStatus,
}

impl TranslationDocument {
    /// Build a document from normalized fragments
    pub fn new<P: AsRef<Path>>(path: P, fragments: Vec<TranslationFragment>) -> Self {
        let full: String = fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ");

        let language = language_utils::detect_language(&full)
            .and_then(|l| l.to_639_1())
            .map(|c| c.to_string());

        Self {
            id: Uuid::new_v4().to_string(),
            path: path.as_ref().to_path_buf(),
            language,
            fragments,
            status: TranslationStatus::Extracted,
        }
    }

    /// Concatenated text of all fragments
    pub fn full_text(&self) -> String {
        self.fragments
            .iter()
            .map(|f| f.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// File name without extension
    pub fn filename(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Normalizes external extraction output into ordered fragments
pub struct FragmentSource;

impl FragmentSource {
    /// Parse raw extraction tool output (JSON or plain text)
    pub fn from_raw(raw: &str) -> Result<Vec<TranslationFragment>, ExtractionError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(value) => Self::from_value(&value),
            // Not JSON: treat as a flat text document
            Err(_) => Ok(Self::from_plain_text(raw)),
        }
    }

    /// Normalize an already-parsed extraction result.
    ///
    /// Tolerates a flat string, a `{content: ...}` wrapper, arrays of
    /// strings or block objects, and nested `children` trees.
    pub fn from_value(value: &Value) -> Result<Vec<TranslationFragment>, ExtractionError> {
        let mut texts: Vec<(String, Option<u32>)> = Vec::new();
        collect_texts(value, None, &mut texts);

        if texts.is_empty() {
            return Err(ExtractionError::ParseError(
                "no text content found in extraction output".to_string(),
            ));
        }

        Ok(index_fragments(texts))
    }

    /// Split plain text into fragments on blank lines
    pub fn from_plain_text(text: &str) -> Vec<TranslationFragment> {
        let texts: Vec<(String, Option<u32>)> = BLOCK_SEPARATOR
            .split(text)
            .map(|block| (normalize(block), None))
            .filter(|(t, _)| !t.is_empty())
            .collect();

        index_fragments(texts)
    }
}

fn index_fragments(texts: Vec<(String, Option<u32>)>) -> Vec<TranslationFragment> {
    texts
        .into_iter()
        .enumerate()
        .map(|(sequence_index, (text, page))| TranslationFragment {
            sequence_index,
            text,
            page,
        })
        .collect()
}

fn collect_texts(value: &Value, page: Option<u32>, out: &mut Vec<(String, Option<u32>)>) {
    match value {
        Value::String(text) => {
            for block in BLOCK_SEPARATOR.split(text) {
                let normalized = normalize(block);
                if !normalized.is_empty() {
                    out.push((normalized, page));
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_texts(item, page, out);
            }
        }
        Value::Object(map) => {
            let own_page = map
                .get("page")
                .and_then(Value::as_u64)
                .map(|p| p as u32)
                .or(page);

            if let Some(content) = map.get("content") {
                collect_texts(content, own_page, out);
                return;
            }

            if let Some(text) = map.get("text").and_then(Value::as_str) {
                let normalized = normalize(text);
                if !normalized.is_empty() {
                    out.push((normalized, own_page));
                }
            }

            for key in ["children", "blocks", "pages", "paragraphs"] {
                if let Some(nested) = map.get(key) {
                    collect_texts(nested, own_page, out);
                }
            }
        }
        _ => {}
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
