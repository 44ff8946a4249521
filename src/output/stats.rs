//! Run statistics
//!
//! Counters collected while a run writes its outputs, printed at the end.

/// Counters for one run of one site profile
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Item links found by the frontier walk
    pub links_discovered: usize,

    /// URLs that went through static extraction
    pub urls_processed: usize,

    /// Real rows written to the details file
    pub records_written: usize,

    /// All-`N/A` rows written for failed URLs
    pub placeholders_written: usize,

    /// URLs handed to the renderer phase
    pub deferred: usize,

    /// Deferred URLs resolved through the renderer
    pub variants_replayed: usize,

    /// URLs quarantined in the failure file
    pub failures: usize,

    /// Static batches flushed in this process
    pub batches_flushed: usize,
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `site` - Site name from the profile
/// * `stats` - The statistics to display
pub fn print_statistics(site: &str, stats: &RunStats) {
    println!("=== Sweep Statistics: {} ===\n", site);

    println!("Discovery:");
    println!("  Item links found: {}", stats.links_discovered);
    println!();

    println!("Extraction:");
    println!("  URLs processed: {}", stats.urls_processed);
    println!("  Records written: {}", stats.records_written);
    println!("  Placeholder rows: {}", stats.placeholders_written);
    println!("  Deferred to renderer: {}", stats.deferred);
    println!("  Deferred URLs replayed: {}", stats.variants_replayed);
    println!("  Batches flushed: {}", stats.batches_flushed);
    println!();

    let attempted = stats.urls_processed + stats.variants_replayed;
    let failure_rate = if attempted > 0 {
        (stats.failures as f64 / attempted as f64) * 100.0
    } else {
        0.0
    };

    println!(
        "Failures: {} ({:.1}% of {} URLs attempted)",
        stats.failures, failure_rate, attempted
    );
}

