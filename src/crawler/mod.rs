//! Crawler module for link discovery and detail extraction
//!
//! This module contains the core pipeline, including:
//! - Listing traversal through a renderer session
//! - Static HTTP fetching and detail extraction
//! - Variant resolution for pages that need a live renderer
//! - Bounded retries and failure quarantine
//! - Batched, checkpointed scheduling and overall run orchestration

mod coordinator;
mod error;
mod extractor;
mod fetcher;
mod frontier;
pub mod parser;
mod retry;
mod scheduler;
mod variants;

pub use coordinator::{Orchestrator, RunMode};
pub use error::ExtractError;
pub use extractor::{DetailExtractor, ExtractOutcome};
pub use fetcher::{build_http_client, FetchedPage, StaticFetcher};
pub use frontier::{FrontierWalk, LinkFrontier};
pub use parser::{parse_product_payload, split_brand, PriceFormat, ProductPage, ProductPayload};
pub use retry::{Quarantine, RetryPolicy};
pub use scheduler::{Batch, BatchCheckpointer};
pub use variants::{VariantDescriptor, VariantResolver};
