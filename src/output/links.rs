//! Link file and URL list reading
use crate::output::{CsvStream, LINK_HEADER};
use std::collections::HashSet;
use std::path::Path;

/// The durable list of discovered item links
///
/// Truncated when created; every page's links are appended and flushed
/// before the walk moves on, so an aborted walk keeps what it found.
pub struct LinkFile {
    stream: CsvStream,
}

impl LinkFile {
    pub fn create(path: &Path) -> crate::Result<Self> {
        Ok(Self {
            stream: CsvStream::create(path, &[LINK_HEADER])?,
        })
    }

    pub fn append(&mut self, links: &[String]) -> crate::Result<()> {
        for link in links {
            self.stream.write_row([link.as_str()])?;
        }
        self.stream.flush()?;
        Ok(())
    }
}

/// Reads a single-column URL list (link file or deferred file)
///
/// Accepts files with or without a header row: any first-column value that
/// is not an HTTP(S) URL is skipped. Duplicates are dropped, first
/// occurrence wins.
pub fn read_url_list(path: &Path) -> crate::Result<Vec<String>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut seen = HashSet::new();
    let mut urls = Vec::new();

    for record in reader.records() {
        let record = record?;
        let Some(value) = record.get(0).map(str::trim) else {
            continue;
        };

        if !(value.starts_with("http://") || value.starts_with("https://")) {
            continue;
        }

        if seen.insert(value.to_string()) {
            urls.push(value.to_string());
        }
    }

    Ok(urls)
}
