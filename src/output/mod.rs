//! Output module for the durable files of a run
//!
//! This module handles:
//! - Append-only CSV streams with a header written once
//! - The single writer task that owns the details, deferred and failure files
//! - The link file and reading URL lists back
//! - The checkpoint sidecar used by `--resume`
//! - Run statistics

mod checkpoint;
mod links;
pub mod stats;
mod writer;

pub use checkpoint::{Checkpoint, StreamSizes};
pub use links::{read_url_list, LinkFile};
pub use stats::{print_statistics, RunStats};
pub use writer::{spawn_writer, CsvStream, OutcomeSender, OutputStreams, WriterHandle};

/// Header of the link file
pub const LINK_HEADER: &str = "Product Link";

/// Header of the variant-deferred file
pub const DEFERRED_HEADER: &str = "URL";

/// Header of the failure file
pub const FAILURE_HEADER: [&str; 3] = ["URL", "Reason", "Timestamp"];

/// Header of the details file for the chosen optional columns
pub fn details_header(include_variants: bool, include_quantity: bool) -> Vec<&'static str> {
    let mut header = vec!["Title", "Brand"];
    if include_variants {
        header.push("Variants");
    }
    header.extend(["SKU", "Price", "Stock Status"]);
    if include_quantity {
        header.push("Quantity");
    }
    header.push("URL");
    header
}
