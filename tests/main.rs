/*!
 * Main test entry point for the textgraft test suite
 */

// Import common test utilities
pub mod common;

// Import unit tests
mod unit {
    // Ingest flow: extraction tool through fragment persistence
    pub mod ingest_tests;

    // Cross-language scoring with a correlated embedding provider
    pub mod cross_language_tests;
}

// Import integration tests
mod integration {
    // Full ingest/process/export lifecycle
    pub mod pipeline_tests;

    // Manual override and approval workflows
    pub mod review_workflow_tests;
}
