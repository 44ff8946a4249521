//! Renderer-driven variant resolution
//!
//! For a deferred URL the resolver loads the page in a renderer session,
//! reads the baseline fields, then activates every variant control in turn
//! and re-reads the selected-variant region. Each URL runs through a
//! [`PhaseTracker`] so every step is visible in the logs.

use crate::config::Config;
use crate::crawler::parser::{split_brand, PriceFormat};
use crate::crawler::ExtractError;
use crate::render::{ElementHandle, RenderError, RenderResult, RendererSession};
use crate::state::{PhaseTracker, ProductRecord, ResolvePhase, StockRules};
use std::sync::Arc;
use std::time::Duration;

/// One variant control of a rendered page
#[derive(Debug, Clone)]
pub struct VariantDescriptor {
    /// Visible label, label attribute, or "Variant N"
    pub label: String,
    pub control: ElementHandle,
    /// Filled in once the variant was activated and read
    pub record: Option<ProductRecord>,
}

/// Resolves per-variant records through a renderer session
#[derive(Clone)]
pub struct VariantResolver {
    config: Arc<Config>,
    rules: StockRules,
    price: PriceFormat,
}

impl VariantResolver {
    pub fn new(config: Arc<Config>) -> Self {
        let rules = StockRules::from_config(&config.stock);
        let price = PriceFormat::from_config(&config.extraction);
        Self {
            config,
            rules,
            price,
        }
    }

    /// Resolves every variant of `url`
    ///
    /// Navigation is retried with a fixed backoff; exhausting the attempts
    /// fails the whole URL. A variant that cannot be activated is skipped,
    /// but when none of them can, the URL fails as `VariantUnresolved`
    /// rather than passing the baseline off as complete. A lost session is
    /// returned immediately as `SessionLoss` so the caller can re-acquire one.
    pub async fn resolve(
        &self,
        session: &mut dyn RendererSession,
        url: &str,
    ) -> Result<Vec<ProductRecord>, ExtractError> {
        let mut tracker = PhaseTracker::new(url);

        self.navigate(session, url, &mut tracker).await?;
        tracker.advance(ResolvePhase::Rendered);

        let baseline = self
            .read_baseline(&*session, url)
            .await
            .map_err(|e| ExtractError::from_render(url, e))?;

        let Some(control_selector) = self.config.variant_control_selector() else {
            tracker.advance(ResolvePhase::Done);
            return Ok(vec![baseline]);
        };

        let mut descriptors = self
            .enumerate(&*session, control_selector)
            .await
            .map_err(|e| ExtractError::from_render(url, e))?;

        if descriptors.is_empty() {
            tracing::debug!("No variant controls on {}, keeping baseline", url);
            tracker.advance(ResolvePhase::Done);
            return Ok(vec![baseline]);
        }

        let settle = Duration::from_millis(self.config.variants.settle_ms);
        for descriptor in descriptors.iter_mut() {
            tracker.advance(ResolvePhase::EnumeratingVariants);

            if let Err(e) = activate(session, &descriptor.control).await {
                if e.is_session_loss() {
                    return Err(ExtractError::from_render(url, e));
                }
                tracing::warn!(
                    "Skipping variant '{}' of {}: {}",
                    descriptor.label,
                    url,
                    e
                );
                continue;
            }
            tracker.advance(ResolvePhase::VariantActive);

            if !settle.is_zero() {
                tokio::time::sleep(settle).await;
            }

            let record = self
                .read_selected(&*session, &baseline, &descriptor.label)
                .await
                .map_err(|e| ExtractError::from_render(url, e))?;
            descriptor.record = Some(record);
        }
        tracker.advance(ResolvePhase::Done);

        let controls = descriptors.len();
        let records: Vec<ProductRecord> =
            descriptors.into_iter().filter_map(|d| d.record).collect();

        if records.is_empty() {
            tracing::warn!("None of the {} variants of {} could be activated", controls, url);
            return Err(ExtractError::VariantUnresolved {
                url: url.to_string(),
                controls,
            });
        }

        tracing::debug!("Resolved {} variants for {}", records.len(), url);
        Ok(records)
    }

    async fn navigate(
        &self,
        session: &mut dyn RendererSession,
        url: &str,
        tracker: &mut PhaseTracker<'_>,
    ) -> Result<(), ExtractError> {
        let attempts = self.config.variants.navigation_attempts.max(1);
        let backoff = Duration::from_millis(self.config.variants.navigation_backoff_ms);
        let mut last_error = RenderError::NoPage;

        for attempt in 1..=attempts {
            tracker.advance(ResolvePhase::Navigating);

            match self.load(session, url).await {
                Ok(()) => return Ok(()),
                Err(e) if e.is_session_loss() => {
                    tracker.advance(ResolvePhase::Failed);
                    return Err(ExtractError::from_render(url, e));
                }
                Err(e) => {
                    tracing::warn!(
                        "Navigation attempt {}/{} for {} failed: {}",
                        attempt,
                        attempts,
                        url,
                        e
                    );
                    last_error = e;
                    if attempt < attempts && !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }

        tracker.advance(ResolvePhase::Failed);
        Err(ExtractError::from_render(url, last_error))
    }

    async fn load(&self, session: &mut dyn RendererSession, url: &str) -> RenderResult<()> {
        session.navigate(url).await?;

        if let Some(ready) = &self.config.variants.ready_selector {
            let timeout = Duration::from_secs(self.config.variants.ready_timeout_secs);
            session.wait_for(ready, timeout).await?;
        }

        Ok(())
    }

    /// Fields of the page as first rendered, before any variant is selected
    async fn read_baseline(
        &self,
        session: &dyn RendererSession,
        url: &str,
    ) -> RenderResult<ProductRecord> {
        let selectors = &self.config.selectors;

        let title = read_text(session, selectors.title.as_deref()).await?;
        let brand = match &selectors.brand_attribute {
            Some(attr) => read_attribute(session, selectors.brand.as_deref(), attr).await?,
            None => read_text(session, selectors.brand.as_deref()).await?,
        };
        let price = match &selectors.price_attribute {
            Some(attr) => read_attribute(session, selectors.price.as_deref(), attr).await?,
            None => read_text(session, selectors.price.as_deref()).await?,
        };
        let sku = read_text(session, selectors.sku.as_deref()).await?;

        let mut stock_text = read_text(session, selectors.stock.as_deref()).await?;
        if stock_text.is_none() {
            for badge in &selectors.badges {
                stock_text = read_text(session, Some(badge)).await?;
                if stock_text.is_some() {
                    break;
                }
            }
        }

        Ok(ProductRecord {
            title,
            brand: brand.map(|b| split_brand(&b, selectors.brand_split.as_deref())),
            sku,
            price: price.and_then(|p| self.price.format_text(&p)),
            stock: self.rules.classify(stock_text.as_deref()),
            quantity: None,
            source_url: url.to_string(),
            variant_label: None,
        })
    }

    async fn enumerate(
        &self,
        session: &dyn RendererSession,
        selector: &str,
    ) -> RenderResult<Vec<VariantDescriptor>> {
        let controls = match session.query_all(selector).await {
            Ok(controls) => controls,
            Err(e) if e.is_session_loss() => return Err(e),
            Err(e) => {
                tracing::debug!("Variant controls '{}' unreadable: {}", selector, e);
                Vec::new()
            }
        };

        let mut descriptors = Vec::with_capacity(controls.len());
        for (index, control) in controls.into_iter().enumerate() {
            let label = self.label_for(session, &control, index).await?;
            descriptors.push(VariantDescriptor {
                label,
                control,
                record: None,
            });
        }
        Ok(descriptors)
    }

    async fn label_for(
        &self,
        session: &dyn RendererSession,
        control: &ElementHandle,
        index: usize,
    ) -> RenderResult<String> {
        let mut label = tolerate(session.text(control).await)?;

        if label.is_none() {
            if let Some(attr) = &self.config.variants.label_attribute {
                label = tolerate(session.attribute(control, attr).await)?
                    .filter(|value| !value.is_empty());
            }
        }

        Ok(label.unwrap_or_else(|| format!("Variant {}", index + 1)))
    }

    /// Re-reads the selected-variant region, falling back to the baseline
    async fn read_selected(
        &self,
        session: &dyn RendererSession,
        baseline: &ProductRecord,
        label: &str,
    ) -> RenderResult<ProductRecord> {
        let variants = &self.config.variants;

        let price = read_text(session, variants.price_selector.as_deref())
            .await?
            .and_then(|p| self.price.format_text(&p))
            .or_else(|| baseline.price.clone());
        let sku = read_text(session, variants.sku_selector.as_deref())
            .await?
            .or_else(|| baseline.sku.clone());
        let stock = match read_text(session, variants.stock_selector.as_deref()).await? {
            Some(text) => self.rules.classify(Some(&text)),
            None => baseline.stock,
        };

        Ok(ProductRecord {
            price,
            sku,
            stock,
            variant_label: Some(label.to_string()),
            ..baseline.clone()
        })
    }
}

/// Direct click first, forced activation when the control is occluded
async fn activate(session: &mut dyn RendererSession, control: &ElementHandle) -> RenderResult<()> {
    match session.click(control).await {
        Ok(()) => Ok(()),
        Err(e) if e.is_session_loss() => Err(e),
        Err(e) => {
            tracing::debug!("Direct click on '{}' failed ({}), forcing", control.selector(), e);
            session.force_click(control).await
        }
    }
}

async fn read_text(
    session: &dyn RendererSession,
    selector: Option<&str>,
) -> RenderResult<Option<String>> {
    let Some(selector) = selector else {
        return Ok(None);
    };

    let element = match tolerate(session.query_first(selector).await)? {
        Some(element) => element,
        None => return Ok(None),
    };
    tolerate(session.text(&element).await)
}

async fn read_attribute(
    session: &dyn RendererSession,
    selector: Option<&str>,
    attr: &str,
) -> RenderResult<Option<String>> {
    let Some(selector) = selector else {
        return Ok(None);
    };

    let element = match tolerate(session.query_first(selector).await)? {
        Some(element) => element,
        None => return Ok(None),
    };
    tolerate(session.attribute(&element, attr).await)
}

/// A missing field degrades to `None`; only a lost session is an error
fn tolerate<T>(result: RenderResult<Option<T>>) -> RenderResult<Option<T>> {
    match result {
        Err(e) if !e.is_session_loss() => {
            tracing::debug!("Field read failed: {}", e);
            Ok(None)
        }
        other => other,
    }
}
