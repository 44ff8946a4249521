//! Integration tests for the sweep pipeline
//!
//! These tests use wiremock to serve listing and item pages and drive the
//! frontier, the extractor and the orchestrator end-to-end.

mod extraction_tests;
mod frontier_tests;
mod pipeline_tests;
mod variant_tests;
