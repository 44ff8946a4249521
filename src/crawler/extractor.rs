//! Static detail extraction
//!
//! Turns one item URL into product records without a renderer, using the
//! profile's strategy:
//! - `json-endpoint`: fetch `<item-url>.json`, one record per payload variant
//! - `embedded-json`: parse the product script block of the item page
//! - `markup`: read discrete field nodes of the item page
//!
//! Pages carrying the variant marker are deferred to the renderer instead.

use crate::config::{Config, ExtractionStrategy};
use crate::crawler::parser::{
    parse_product_payload, split_brand, PriceFormat, ProductPage, ProductPayload, VariantPayload,
};
use crate::crawler::{ExtractError, RetryPolicy, StaticFetcher};
use crate::state::{ProductRecord, StockRules, StockStatus, Strategy};
use std::sync::Arc;
use url::Url;

/// Result of extracting one URL
#[derive(Debug, Clone)]
pub enum ExtractOutcome {
    /// One record per variant, at least one
    Records(Vec<ProductRecord>),
    /// The page needs a renderer; the URL goes to the deferred file
    Deferred(String),
    /// Every attempt failed; the placeholder stands in for the item
    Failed {
        /// The item URL as listed, not the endpoint that failed
        url: String,
        error: ExtractError,
        placeholder: ProductRecord,
    },
}

/// Static extractor shared by all workers of a run
#[derive(Clone)]
pub struct DetailExtractor {
    fetcher: StaticFetcher,
    config: Arc<Config>,
    rules: StockRules,
    price: PriceFormat,
}

impl DetailExtractor {
    pub fn new(fetcher: StaticFetcher, config: Arc<Config>) -> Self {
        let rules = StockRules::from_config(&config.stock);
        let price = PriceFormat::from_config(&config.extraction);
        Self {
            fetcher,
            config,
            rules,
            price,
        }
    }

    /// Extracts `url` with a single attempt
    pub async fn extract(&self, url: &str) -> ExtractOutcome {
        self.extract_with(url, &RetryPolicy::once()).await
    }

    /// Extracts `url`, retrying under `policy`
    ///
    /// Never returns an error: a URL that fails every attempt comes back as
    /// [`ExtractOutcome::Failed`] with an all-`N/A` placeholder.
    pub async fn extract_with(&self, url: &str, policy: &RetryPolicy) -> ExtractOutcome {
        match policy
            .run(url, Strategy::Static, |_| self.try_extract(url))
            .await
        {
            Ok(outcome) => outcome,
            Err(error) => ExtractOutcome::Failed {
                url: url.to_string(),
                error,
                placeholder: ProductRecord::placeholder(url),
            },
        }
    }

    /// One attempt; only ever returns `Records` or `Deferred`
    pub async fn try_extract(&self, url: &str) -> Result<ExtractOutcome, ExtractError> {
        match self.config.extraction.strategy {
            ExtractionStrategy::JsonEndpoint => self.from_json_endpoint(url).await,
            ExtractionStrategy::EmbeddedJson => self.from_embedded_json(url).await,
            ExtractionStrategy::Markup => self.from_markup(url).await,
        }
    }

    async fn from_json_endpoint(&self, url: &str) -> Result<ExtractOutcome, ExtractError> {
        let endpoint = json_endpoint_url(url, &self.config.extraction.json_suffix)?;
        let body = self.fetcher.fetch(&endpoint).await?;
        let product = parse_product_payload(&body).map_err(|e| malformed(url, e))?;

        // The badge lives on the HTML page, fetched only when a variant needs it
        let badge = if product.variants.iter().any(needs_badge)
            && !self.config.selectors.badges.is_empty()
        {
            self.fetch_badge(url).await
        } else {
            None
        };

        Ok(ExtractOutcome::Records(self.records_from_payload(
            url,
            &product,
            badge.as_deref(),
        )))
    }

    async fn from_embedded_json(&self, url: &str) -> Result<ExtractOutcome, ExtractError> {
        let markup = self.fetcher.fetch(url).await?;
        let page = ProductPage::parse(&markup);

        if self.has_variant_marker(&page) {
            return Ok(ExtractOutcome::Deferred(url.to_string()));
        }

        let selector = self
            .config
            .extraction
            .payload_selector
            .as_deref()
            .ok_or_else(|| ExtractError::MalformedPayload {
                url: url.to_string(),
                message: "no payload selector configured".to_string(),
            })?;

        let json = page.inner(selector).ok_or_else(|| ExtractError::MalformedPayload {
            url: url.to_string(),
            message: format!("no product payload matched '{}'", selector),
        })?;
        let product = parse_product_payload(&json).map_err(|e| malformed(url, e))?;
        let badge = page.first_text(&self.config.selectors.badges);

        Ok(ExtractOutcome::Records(self.records_from_payload(
            url,
            &product,
            badge.as_deref(),
        )))
    }

    async fn from_markup(&self, url: &str) -> Result<ExtractOutcome, ExtractError> {
        let markup = self.fetcher.fetch(url).await?;
        let page = ProductPage::parse(&markup);

        if self.has_variant_marker(&page) {
            return Ok(ExtractOutcome::Deferred(url.to_string()));
        }

        Ok(ExtractOutcome::Records(vec![self.record_from_markup(url, &page)]))
    }

    async fn fetch_badge(&self, url: &str) -> Option<String> {
        match self.fetcher.fetch(url).await {
            Ok(markup) => ProductPage::parse(&markup).first_text(&self.config.selectors.badges),
            Err(e) => {
                tracing::warn!("Badge lookup for {} failed: {}", url, e);
                None
            }
        }
    }

    fn has_variant_marker(&self, page: &ProductPage) -> bool {
        self.config
            .selectors
            .variant_control
            .as_deref()
            .is_some_and(|selector| page.has_match(selector))
    }

    /// Maps a structured payload to one record per variant
    pub fn records_from_payload(
        &self,
        url: &str,
        product: &ProductPayload,
        badge: Option<&str>,
    ) -> Vec<ProductRecord> {
        let title = non_empty(product.title.as_deref());
        let brand = non_empty(product.vendor.as_deref());

        if product.variants.is_empty() {
            return vec![ProductRecord {
                title,
                brand,
                stock: self.rules.classify(badge),
                ..ProductRecord::placeholder(url)
            }];
        }

        product
            .variants
            .iter()
            .map(|variant| ProductRecord {
                title: title.clone(),
                brand: brand.clone(),
                sku: non_empty(variant.sku.as_deref()),
                price: variant
                    .price
                    .as_ref()
                    .and_then(|p| self.price.format_value(p)),
                stock: self.variant_stock(variant, badge),
                quantity: variant.inventory_quantity.map(|q| q.max(0) as u64),
                source_url: url.to_string(),
                variant_label: non_empty(variant.title.as_deref()),
            })
            .collect()
    }

    /// Availability flag wins; otherwise a positive quantity means in stock
    /// and anything else defers to the badge
    fn variant_stock(&self, variant: &VariantPayload, badge: Option<&str>) -> StockStatus {
        match (variant.available, variant.inventory_quantity) {
            (Some(available), _) => StockStatus::from_available(available),
            (None, Some(quantity)) if quantity > 0 => StockStatus::InStock,
            _ => self.rules.classify(badge),
        }
    }

    /// Reads one record from discrete markup nodes
    pub fn record_from_markup(&self, url: &str, page: &ProductPage) -> ProductRecord {
        let selectors = &self.config.selectors;

        let brand = selectors.brand.as_deref().and_then(|s| match &selectors.brand_attribute {
            Some(attr) => page.attr(s, attr),
            None => page.text(s),
        });

        let price = selectors.price.as_deref().and_then(|s| match &selectors.price_attribute {
            Some(attr) => page.attr(s, attr),
            None => page.text(s),
        });

        let stock_text = selectors
            .stock
            .as_deref()
            .and_then(|s| page.text(s))
            .or_else(|| page.first_text(&selectors.badges));

        ProductRecord {
            title: selectors.title.as_deref().and_then(|s| page.text(s)),
            brand: brand.map(|b| split_brand(&b, selectors.brand_split.as_deref())),
            sku: selectors.sku.as_deref().and_then(|s| page.text(s)),
            price: price.and_then(|p| self.price.format_text(&p)),
            stock: self.rules.classify(stock_text.as_deref()),
            quantity: None,
            source_url: url.to_string(),
            variant_label: None,
        }
    }
}

/// `https://shop/products/kit?x=1` becomes `https://shop/products/kit.json?x=1`
fn json_endpoint_url(url: &str, suffix: &str) -> Result<String, ExtractError> {
    let mut endpoint = Url::parse(url).map_err(|e| ExtractError::MalformedPayload {
        url: url.to_string(),
        message: format!("invalid URL: {}", e),
    })?;
    let path = format!("{}{}", endpoint.path().trim_end_matches('/'), suffix);
    endpoint.set_path(&path);
    Ok(endpoint.to_string())
}

fn needs_badge(variant: &VariantPayload) -> bool {
    variant.available.is_none() && !variant.inventory_quantity.is_some_and(|q| q > 0)
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn malformed(url: &str, error: serde_json::Error) -> ExtractError {
    ExtractError::MalformedPayload {
        url: url.to_string(),
        message: error.to_string(),
    }
}
