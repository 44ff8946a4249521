//! Sweep orchestration
//!
//! This module ties the phases of one site run together:
//! - Link discovery through a renderer session
//! - Batched static extraction with checkpoints
//! - Replay of deferred URLs through a fresh renderer session
//! - Resumption from the checkpoint sidecar
//!
//! Exactly one renderer session is alive at any time.

use crate::config::Config;
use crate::crawler::{
    BatchCheckpointer, DetailExtractor, ExtractError, LinkFrontier, Quarantine, RetryPolicy,
    StaticFetcher, VariantResolver,
};
use crate::output::{read_url_list, spawn_writer, Checkpoint, OutputStreams, RunStats};
use crate::render::{load_cookies, PageRenderer, RendererSession};
use crate::state::{FailureRecord, ProductRecord};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Which phases a run executes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// Walk the listings, then extract details (menu option 1)
    LinksThenDetails,
    /// Walk the listings only (menu option 2)
    LinksOnly,
    /// Extract details from the existing link file (menu option 3)
    DetailsOnly,
}

impl RunMode {
    /// Parses a numeric menu choice
    pub fn from_menu(choice: &str) -> Option<Self> {
        match choice.trim() {
            "1" => Some(Self::LinksThenDetails),
            "2" => Some(Self::LinksOnly),
            "3" => Some(Self::DetailsOnly),
            _ => None,
        }
    }
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LinksThenDetails => write!(f, "links then details"),
            Self::LinksOnly => write!(f, "links only"),
            Self::DetailsOnly => write!(f, "details only"),
        }
    }
}

/// Runs the phases of one site profile
pub struct Orchestrator {
    config: Arc<Config>,
    config_hash: String,
    fetcher: StaticFetcher,
    renderer: Arc<dyn PageRenderer>,
    resume: bool,
}

impl Orchestrator {
    /// Creates a new orchestrator
    ///
    /// # Arguments
    ///
    /// * `config` - The validated site profile
    /// * `config_hash` - Hash of the profile file, stored in the checkpoint
    /// * `renderer` - Engine used for listing walks and variant replay
    ///
    /// # Returns
    ///
    /// * `Ok(Orchestrator)` - Ready to run
    /// * `Err(SweepError)` - The HTTP client could not be built
    pub fn new(
        config: Config,
        config_hash: impl Into<String>,
        renderer: Arc<dyn PageRenderer>,
    ) -> crate::Result<Self> {
        let fetcher = StaticFetcher::new(&config.http)?;
        Ok(Self {
            config: Arc::new(config),
            config_hash: config_hash.into(),
            fetcher,
            renderer,
            resume: false,
        })
    }

    /// Continue from the checkpoint sidecar instead of starting over
    pub fn with_resume(mut self, resume: bool) -> Self {
        self.resume = resume;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs the selected phases
    pub async fn run(&self, mode: RunMode) -> crate::Result<RunStats> {
        tracing::info!("Starting {} run for {}", mode, self.config.site.name);

        match mode {
            RunMode::LinksOnly => {
                let links = self.discover_links().await?;
                Ok(RunStats {
                    links_discovered: links.len(),
                    ..Default::default()
                })
            }
            RunMode::LinksThenDetails => {
                let links = match self.resumable_links()? {
                    Some(links) => {
                        tracing::info!(
                            "Resuming with {} links from the existing link file",
                            links.len()
                        );
                        links
                    }
                    None => self.discover_links().await?,
                };
                let found = links.len();
                let mut stats = self.extract_details(links).await?;
                stats.links_discovered = found;
                Ok(stats)
            }
            RunMode::DetailsOnly => {
                let links = read_url_list(Path::new(&self.config.output.links_path))?;
                tracing::info!(
                    "Loaded {} links from {}",
                    links.len(),
                    self.config.output.links_path
                );
                self.extract_details(links).await
            }
        }
    }

    /// Walks the listings in a dedicated renderer session
    pub async fn discover_links(&self) -> crate::Result<Vec<String>> {
        let mut session = self.open_session().await?;

        let frontier = LinkFrontier::new(self.config.frontier.clone())
            .with_link_file(&self.config.output.links_path);
        let result = frontier
            .walk(session.as_mut(), &self.config.site.seed_url)
            .collect_all()
            .await;

        close_session(session).await;
        result
    }

    /// Static extraction in checkpointed batches, then the deferred replay
    pub async fn extract_details(&self, urls: Vec<String>) -> crate::Result<RunStats> {
        let checkpoint_path = PathBuf::from(self.config.checkpoint_path());

        let resumed = self.resume_checkpoint(&checkpoint_path, &urls)?;
        let (mut checkpoint, resume_sizes) = match resumed {
            Some(checkpoint) => {
                let sizes = checkpoint.sizes;
                (checkpoint, Some(sizes))
            }
            None => (
                Checkpoint::new(&self.config_hash, self.config.batch.size, &urls),
                None,
            ),
        };

        if checkpoint.completed {
            tracing::info!("Checkpoint marks this run as complete, nothing to do");
            return Ok(RunStats::default());
        }

        let mut streams = OutputStreams::open(&self.config.output, resume_sizes.as_ref())?;
        checkpoint.sizes = streams.flush()?;
        checkpoint.save(&checkpoint_path)?;

        if !checkpoint.static_done {
            let emit_placeholder = self.config.extraction.emit_placeholder_on_failure;
            let writer = spawn_writer(streams, emit_placeholder);
            let extractor = Arc::new(DetailExtractor::new(
                self.fetcher.clone(),
                self.config.clone(),
            ));
            let policy = RetryPolicy::from_config(&self.config.retry);
            let batcher = BatchCheckpointer::new(&self.config.batch, checkpoint_path.clone());

            tracing::info!(
                "Extracting {} URLs with {} workers",
                urls.len(),
                self.config.batch.workers
            );
            let result = batcher
                .run_static(&urls, extractor, &policy, &writer, &mut checkpoint)
                .await;

            // Always take the streams back, even when a batch failed
            let finished = writer.finish().await;
            let flushed = result?;
            streams = finished?;
            streams.stats_mut().batches_flushed = flushed;
        }

        self.replay_deferred(&mut streams, &mut checkpoint, &checkpoint_path)
            .await?;

        checkpoint.completed = true;
        checkpoint.sizes = streams.flush()?;
        checkpoint.save(&checkpoint_path)?;

        Ok(streams.stats().clone())
    }

    /// Resolves every deferred URL not yet replayed
    ///
    /// Progress is checkpointed, and the session recycled, every
    /// `variants.batch-size` URLs. Sessions open on first use. A lost session
    /// is reopened and the URL retried once.
    async fn replay_deferred(
        &self,
        streams: &mut OutputStreams,
        checkpoint: &mut Checkpoint,
        checkpoint_path: &Path,
    ) -> crate::Result<()> {
        let deferred = read_url_list(streams.deferred_path())?;
        let pending: Vec<String> = deferred
            .into_iter()
            .skip(checkpoint.variants_replayed)
            .collect();

        if pending.is_empty() {
            tracing::debug!("No deferred URLs to replay");
            return Ok(());
        }

        tracing::info!("Replaying {} deferred URLs through the renderer", pending.len());

        let resolver = VariantResolver::new(self.config.clone());
        let emit_placeholder = self.config.extraction.emit_placeholder_on_failure;
        let chunk_size = self.config.variants.batch_size.max(1);
        let mut session: Option<Box<dyn RendererSession>> = None;
        let mut replayed = 0;

        for chunk in pending.chunks(chunk_size) {
            for url in chunk {
                match self.replay_one(&resolver, &mut session, url).await? {
                    Ok(records) => {
                        for record in &records {
                            streams.write_record(record)?;
                        }
                    }
                    Err(e) => {
                        tracing::warn!("Quarantining {}: {}", url, e);
                        streams.quarantine(FailureRecord::new(url.as_str(), e.reason()))?;
                        if emit_placeholder {
                            streams.write_record(&ProductRecord::placeholder(url.as_str()))?;
                        }
                    }
                }
                streams.stats_mut().variants_replayed += 1;
            }

            replayed += chunk.len();
            checkpoint.variants_replayed += chunk.len();
            checkpoint.sizes = streams.flush()?;
            checkpoint.save(checkpoint_path)?;
            tracing::info!("Replayed {}/{} deferred URLs", replayed, pending.len());

            discard_session(&mut session).await;
        }

        Ok(())
    }

    /// Resolves one URL, re-acquiring the session once if it is lost
    ///
    /// The outer error is run-level (no session could be opened); the inner
    /// one belongs to the URL. A session lost on the retry is dropped too, so
    /// the next URL starts on a fresh one.
    async fn replay_one(
        &self,
        resolver: &VariantResolver,
        slot: &mut Option<Box<dyn RendererSession>>,
        url: &str,
    ) -> crate::Result<Result<Vec<ProductRecord>, ExtractError>> {
        let first = resolver.resolve(self.session_in(slot).await?, url).await;
        if !first.as_ref().is_err_and(ExtractError::is_session_loss) {
            return Ok(first);
        }

        tracing::warn!("Renderer session lost on {}, reopening", url);
        discard_session(slot).await;

        let retry = resolver.resolve(self.session_in(slot).await?, url).await;
        if retry.as_ref().is_err_and(ExtractError::is_session_loss) {
            tracing::warn!("Renderer session lost again on {}, giving up on it", url);
            discard_session(slot).await;
        }
        Ok(retry)
    }

    /// The live session in `slot`, opening one if there is none
    async fn session_in<'a>(
        &self,
        slot: &'a mut Option<Box<dyn RendererSession>>,
    ) -> crate::Result<&'a mut dyn RendererSession> {
        let session = match slot.take() {
            Some(session) => session,
            None => self.open_session().await?,
        };
        Ok(slot.insert(session).as_mut())
    }

    /// Opens a session and applies the cookie store
    async fn open_session(&self) -> crate::Result<Box<dyn RendererSession>> {
        let mut session = self.renderer.open_session().await?;

        let Some(path) = &self.config.site.cookies_path else {
            return Ok(session);
        };
        let cookies = load_cookies(Path::new(path));
        if cookies.is_empty() {
            return Ok(session);
        }

        // Cookies only stick once the browser is on their domain
        if let Some(session_url) = &self.config.site.session_url {
            if let Err(e) = session.navigate(session_url).await {
                tracing::warn!("Could not open session page {}: {}", session_url, e);
            }
        }
        if let Err(e) = session.add_cookies(&cookies).await {
            tracing::warn!("Could not apply cookies: {}", e);
        }

        Ok(session)
    }

    fn resume_checkpoint(
        &self,
        path: &Path,
        urls: &[String],
    ) -> crate::Result<Option<Checkpoint>> {
        if !self.resume {
            return Ok(None);
        }

        match Checkpoint::load(path)? {
            Some(checkpoint)
                if checkpoint.is_compatible(&self.config_hash, self.config.batch.size, urls) =>
            {
                tracing::info!(
                    "Resuming: {} batches flushed, {} deferred URLs replayed",
                    checkpoint.batches_flushed,
                    checkpoint.variants_replayed
                );
                Ok(Some(checkpoint))
            }
            Some(_) => {
                tracing::warn!("Checkpoint does not match this profile or link list, starting fresh");
                Ok(None)
            }
            None => {
                tracing::info!("No checkpoint found, starting fresh");
                Ok(None)
            }
        }
    }

    /// The existing link file, if a resumable checkpoint was made from it
    fn resumable_links(&self) -> crate::Result<Option<Vec<String>>> {
        if !self.resume {
            return Ok(None);
        }

        let links_path = Path::new(&self.config.output.links_path);
        if !links_path.exists() {
            return Ok(None);
        }

        let links = read_url_list(links_path)?;
        let checkpoint = Checkpoint::load(Path::new(&self.config.checkpoint_path()))?;
        let compatible = checkpoint.is_some_and(|c| {
            c.is_compatible(&self.config_hash, self.config.batch.size, &links)
        });

        Ok(compatible.then_some(links))
    }
}

async fn close_session(session: Box<dyn RendererSession>) {
    if let Err(e) = session.close().await {
        tracing::warn!("Closing renderer session failed: {}", e);
    }
}

async fn discard_session(slot: &mut Option<Box<dyn RendererSession>>) {
    if let Some(session) = slot.take() {
        close_session(session).await;
    }
}
