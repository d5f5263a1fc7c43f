//! Unit and integration tests for the exporter.
//!
//! ## Test Modules
//!
//! - **template_tests**: template compilation and label extraction
//! - **scanner_tests**: scan cycles, snapshot installation and failure handling
//! - **api_tests**: HTTP endpoints and Prometheus rendering
//! - **error_tests**: HTTP error responses
//! - **config_tests**: configuration layering and validation
//!
//! Individual test modules can be run with:
//! ```bash
//! cargo test template_tests
//! cargo test scanner_tests
//! # etc.
//! ```

pub mod scanner_tests;
