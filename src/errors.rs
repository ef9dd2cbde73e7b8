/*!
 * Error types for the textgraft application.
 *
 * This module contains custom error types for different parts of the
 * application, using the thiserror crate for ergonomic error definitions.
 */

// Allow dead code - error types are for library consumers
#![allow(dead_code)]

use thiserror::Error;

/// Errors that can occur when invoking the external extraction tool
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// The tool exited with a nonzero status
    #[error("Extraction tool failed with exit code {code}: {stderr}")]
    ToolFailed {
        /// Tool exit code
        code: i32,
        /// Captured stderr from the tool
        stderr: String,
    },

    /// The tool exited cleanly but produced no output file
    #[error("Extraction tool produced no output for: {0}")]
    MissingOutput(String),

    /// The tool output could not be parsed into fragments
    #[error("Failed to parse extraction output: {0}")]
    ParseError(String),

    /// The tool process could not be spawned
    #[error("Failed to launch extraction tool: {0}")]
    LaunchFailed(String),
}

/// Errors that can occur when working with the embedding service
#[derive(Error, Debug)]
pub enum ProviderError {
    /// Error when making an API request fails
    #[error("API request failed: {0}")]
    RequestFailed(String),

    /// Error when parsing an API response fails
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    /// Error returned by the API itself
    #[error("API responded with error: {status_code} - {message}")]
    ApiError {
        /// HTTP status code
        status_code: u16,
        /// Error message from the API
        message: String,
    },

    /// Error establishing or maintaining a connection
    #[error("Connection error: {0}")]
    ConnectionError(String),
}

/// Errors that can occur while parsing or rewriting reference markup
#[derive(Error, Debug)]
pub enum StructureError {
    /// The reference document is not well-formed XML
    #[error("Malformed reference document: {0}")]
    MalformedDocument(String),

    /// A structural unit id could not be resolved in the document
    #[error("Unknown structural unit: {0}")]
    UnknownUnit(String),

    /// Serialization of the rewritten document failed
    #[error("Failed to serialize document: {0}")]
    SerializeError(String),
}

/// Main application error type that wraps all other errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Error from a file operation
    #[error("File error: {0}")]
    File(String),

    /// Error from the extraction tool
    #[error("Extraction error: {0}")]
    Extraction(#[from] ExtractionError),

    /// Error from the embedding provider
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Error from structure parsing or rewriting
    #[error("Structure error: {0}")]
    Structure(#[from] StructureError),

    /// The record store is unavailable; fatal for the current job
    #[error("Record store unavailable: {0}")]
    StoreUnavailable(String),

    /// Any other error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

// Utility functions for error conversion
impl From<anyhow::Error> for AppError {
    fn from(error: anyhow::Error) -> Self {
        Self::Unknown(error.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(error: std::io::Error) -> Self {
        Self::File(error.to_string())
    }
}
