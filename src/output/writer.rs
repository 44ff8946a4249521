//! Append-only CSV streams and the writer task that owns them
//!
//! Static workers never touch files. They send their outcomes over a
//! bounded channel to one blocking writer task; a flush command makes the
//! task flush all three streams and report their sizes for the checkpoint.

use crate::crawler::{ExtractOutcome, Quarantine};
use crate::output::{details_header, RunStats, StreamSizes, DEFERRED_HEADER, FAILURE_HEADER};
use crate::config::OutputConfig;
use crate::state::{FailureRecord, ProductRecord};
use crate::SweepError;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Capacity of the outcome channel between workers and the writer
const CHANNEL_CAPACITY: usize = 256;

/// One CSV file written append-only, header first
pub struct CsvStream {
    writer: csv::Writer<File>,
    path: PathBuf,
}

impl CsvStream {
    /// Creates (or truncates) `path` and writes the header
    pub fn create(path: &Path, header: &[&str]) -> crate::Result<Self> {
        let file = File::create(path)?;
        Self::with_header(file, path, header)
    }

    /// Opens `path` for appending, cutting it back to `keep` bytes if given
    ///
    /// The header is written only when the file ends up empty.
    pub fn resume(path: &Path, header: &[&str], keep: Option<u64>) -> crate::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if let Some(len) = keep {
            if file.metadata()?.len() > len {
                tracing::info!("Truncating {} to {} bytes", path.display(), len);
                file.set_len(len)?;
            }
        }
        Self::with_header(file, path, header)
    }

    fn with_header(file: File, path: &Path, header: &[&str]) -> crate::Result<Self> {
        let empty = file.metadata()?.len() == 0;
        let mut writer = csv::Writer::from_writer(file);
        if empty {
            writer.write_record(header)?;
        }
        Ok(Self {
            writer,
            path: path.to_path_buf(),
        })
    }

    pub fn write_row<I, T>(&mut self, row: I) -> crate::Result<()>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        self.writer.write_record(row)?;
        Ok(())
    }

    /// Flushes buffered rows and returns the file's byte length
    pub fn flush(&mut self) -> crate::Result<u64> {
        self.writer.flush()?;
        Ok(self.writer.get_ref().metadata()?.len())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// The details, deferred and failure streams of one run
pub struct OutputStreams {
    details: CsvStream,
    deferred: CsvStream,
    failures: CsvStream,
    include_variants: bool,
    include_quantity: bool,
    stats: RunStats,
}

impl OutputStreams {
    /// Opens all three streams
    ///
    /// With `resume_sizes` the files are kept and cut back to the recorded
    /// flush point; without, they are truncated.
    pub fn open(config: &OutputConfig, resume_sizes: Option<&StreamSizes>) -> crate::Result<Self> {
        let header = details_header(config.include_variants, config.include_quantity);

        let (details, deferred, failures) = match resume_sizes {
            Some(sizes) => (
                CsvStream::resume(Path::new(&config.details_path), &header, Some(sizes.details))?,
                CsvStream::resume(
                    Path::new(&config.deferred_path),
                    &[DEFERRED_HEADER],
                    Some(sizes.deferred),
                )?,
                CsvStream::resume(
                    Path::new(&config.failures_path),
                    &FAILURE_HEADER,
                    Some(sizes.failures),
                )?,
            ),
            None => (
                CsvStream::create(Path::new(&config.details_path), &header)?,
                CsvStream::create(Path::new(&config.deferred_path), &[DEFERRED_HEADER])?,
                CsvStream::create(Path::new(&config.failures_path), &FAILURE_HEADER)?,
            ),
        };

        Ok(Self {
            details,
            deferred,
            failures,
            include_variants: config.include_variants,
            include_quantity: config.include_quantity,
            stats: RunStats::default(),
        })
    }

    pub fn write_record(&mut self, record: &ProductRecord) -> crate::Result<()> {
        self.details
            .write_row(record.to_row(self.include_variants, self.include_quantity))?;
        if record.is_placeholder() {
            self.stats.placeholders_written += 1;
        } else {
            self.stats.records_written += 1;
        }
        Ok(())
    }

    pub fn defer(&mut self, url: &str) -> crate::Result<()> {
        self.deferred.write_row([url])?;
        self.stats.deferred += 1;
        Ok(())
    }

    /// Routes one extraction outcome to the stream it belongs in
    pub fn record(&mut self, outcome: ExtractOutcome, emit_placeholder: bool) -> crate::Result<()> {
        self.stats.urls_processed += 1;

        match outcome {
            ExtractOutcome::Records(records) => {
                for record in &records {
                    self.write_record(record)?;
                }
            }
            ExtractOutcome::Deferred(url) => self.defer(&url)?,
            ExtractOutcome::Failed {
                url,
                error,
                placeholder,
            } => {
                tracing::warn!("Quarantining {}: {}", url, error);
                self.quarantine(FailureRecord::new(url, error.reason()))?;
                if emit_placeholder {
                    self.write_record(&placeholder)?;
                }
            }
        }
        Ok(())
    }

    /// Flushes all streams; the sizes are the new durable flush point
    pub fn flush(&mut self) -> crate::Result<StreamSizes> {
        Ok(StreamSizes {
            details: self.details.flush()?,
            deferred: self.deferred.flush()?,
            failures: self.failures.flush()?,
        })
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut RunStats {
        &mut self.stats
    }

    pub fn deferred_path(&self) -> &Path {
        self.deferred.path()
    }
}

impl Quarantine for OutputStreams {
    fn quarantine(&mut self, record: FailureRecord) -> crate::Result<()> {
        self.failures.write_row(record.to_row())?;
        self.stats.failures += 1;
        Ok(())
    }
}

enum WriterCommand {
    Outcome(ExtractOutcome),
    Flush(oneshot::Sender<crate::Result<StreamSizes>>),
}

/// Cloneable sending side handed to workers
#[derive(Clone)]
pub struct OutcomeSender {
    tx: mpsc::Sender<WriterCommand>,
}

impl OutcomeSender {
    pub async fn send(&self, outcome: ExtractOutcome) -> crate::Result<()> {
        self.tx
            .send(WriterCommand::Outcome(outcome))
            .await
            .map_err(|_| writer_stopped())
    }
}

/// Handle to the running writer task
pub struct WriterHandle {
    tx: mpsc::Sender<WriterCommand>,
    task: JoinHandle<crate::Result<OutputStreams>>,
}

impl WriterHandle {
    pub fn sender(&self) -> OutcomeSender {
        OutcomeSender {
            tx: self.tx.clone(),
        }
    }

    /// Flushes every stream once all previously sent outcomes are written
    pub async fn flush(&self) -> crate::Result<StreamSizes> {
        let (ack, done) = oneshot::channel();
        self.tx
            .send(WriterCommand::Flush(ack))
            .await
            .map_err(|_| writer_stopped())?;
        done.await.map_err(|_| writer_stopped())?
    }

    /// Stops the task and takes the streams back
    pub async fn finish(self) -> crate::Result<OutputStreams> {
        drop(self.tx);
        self.task
            .await
            .map_err(|e| SweepError::Writer(format!("writer task panicked: {}", e)))?
    }
}

/// Moves `streams` onto a blocking writer task
pub fn spawn_writer(streams: OutputStreams, emit_placeholder: bool) -> WriterHandle {
    let (tx, mut rx) = mpsc::channel(CHANNEL_CAPACITY);

    let task = tokio::task::spawn_blocking(move || {
        let mut streams = streams;
        while let Some(command) = rx.blocking_recv() {
            match command {
                WriterCommand::Outcome(outcome) => {
                    if let Err(e) = streams.record(outcome, emit_placeholder) {
                        tracing::error!("Output write failed: {}", e);
                        return Err(e);
                    }
                }
                WriterCommand::Flush(ack) => {
                    // The receiver only goes away if the run was abandoned
                    let _ = ack.send(streams.flush());
                }
            }
        }
        Ok(streams)
    });

    WriterHandle { tx, task }
}

fn writer_stopped() -> SweepError {
    SweepError::Writer("output writer stopped".to_string())
}
