use crate::state::StockStatus;
use serde::Deserialize;

/// A site profile: everything the generic pipeline needs to know about one shop
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    pub site: SiteConfig,
    pub frontier: FrontierConfig,
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub selectors: FieldSelectors,
    #[serde(default)]
    pub variants: VariantConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub batch: BatchConfig,
    pub output: OutputConfig,
    #[serde(default)]
    pub stock: StockConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

impl Config {
    /// Path of the checkpoint sidecar that sits next to the details file
    pub fn checkpoint_path(&self) -> String {
        format!("{}.checkpoint.json", self.output.details_path)
    }

    /// Selector for the variant controls the renderer should click
    ///
    /// Falls back to the static variant marker when no dedicated control
    /// selector is configured.
    pub fn variant_control_selector(&self) -> Option<&str> {
        self.variants
            .control_selector
            .as_deref()
            .or(self.selectors.variant_control.as_deref())
    }
}

/// Identity of the site being swept
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SiteConfig {
    /// Short name used in log lines
    pub name: String,

    /// Listing page (or category index) the frontier walk starts from
    pub seed_url: String,

    /// Page visited before cookies are applied, so the cookie domain is live
    pub session_url: Option<String>,

    /// JSON cookie store applied to every renderer session
    pub cookies_path: Option<String>,
}

/// How listing pages are traversed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FrontierMode {
    /// Follow the href of an explicit "next page" link
    Pagination,
    /// Click the "next" control of a sitemap listing
    Sitemap,
}

/// Listing traversal configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FrontierConfig {
    pub mode: FrontierMode,

    /// Anchors pointing at item pages
    pub item_selector: String,

    /// The "next page" link or control
    pub next_selector: String,

    /// Sitemap container the item selector is scoped to
    pub container_selector: Option<String>,

    /// Anchors on the seed page pointing at collections to walk one by one
    pub collection_selector: Option<String>,

    /// Class marking a disabled "next" control
    pub disabled_class: Option<String>,

    /// Marker waited for on each listing page
    pub ready_selector: Option<String>,

    #[serde(default = "default_frontier_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Pause after every page change (milliseconds)
    #[serde(default = "default_frontier_settle_ms")]
    pub settle_ms: u64,

    /// Hard cap on listing pages per walk
    pub max_pages: Option<u32>,
}

/// Where the structured product description comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExtractionStrategy {
    /// `<item-url>.json`, payload under the `product` key
    JsonEndpoint,
    /// JSON text of a `<script>` element inside the item page
    EmbeddedJson,
    /// Discrete per-field markup nodes
    Markup,
}

/// Unit of the price values in the structured payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PriceUnit {
    /// Integer minor units, `12950` means `129.50`
    Cents,
    /// Already a decimal in major units
    #[default]
    Major,
}

/// Static detail extraction configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct ExtractionConfig {
    pub strategy: ExtractionStrategy,

    #[serde(default = "default_json_suffix")]
    pub json_suffix: String,

    /// Script element holding the embedded payload
    pub payload_selector: Option<String>,

    #[serde(default)]
    pub price_unit: PriceUnit,

    #[serde(default)]
    pub price_prefix: String,

    #[serde(default)]
    pub price_suffix: String,

    /// Group thousands with commas (`1,234.50`)
    #[serde(default)]
    pub thousands_separator: bool,

    /// Write an "N/A" row for URLs that end in the failure file
    #[serde(default = "default_true")]
    pub emit_placeholder_on_failure: bool,
}

/// Per-field selectors shared by the markup strategy and the renderer baseline
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FieldSelectors {
    pub title: Option<String>,
    pub brand: Option<String>,
    /// Read the brand from this attribute instead of the element text
    pub brand_attribute: Option<String>,
    /// Keep only the part after the first occurrence of this separator
    pub brand_split: Option<String>,
    pub price: Option<String>,
    /// Read the price from this attribute (e.g. `content` of a meta tag)
    pub price_attribute: Option<String>,
    pub sku: Option<String>,
    pub stock: Option<String>,
    /// Presence of this element in static markup defers the URL
    pub variant_control: Option<String>,
    /// Localized stock badges, tried in order
    #[serde(default)]
    pub badges: Vec<String>,
}

/// Renderer-driven variant resolution configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct VariantConfig {
    /// Marker confirming the item page finished rendering
    pub ready_selector: Option<String>,

    #[serde(default = "default_variant_ready_timeout_secs")]
    pub ready_timeout_secs: u64,

    /// Element clicked to activate a variant
    pub control_selector: Option<String>,

    /// Attribute holding the variant name when the control has no text
    pub label_attribute: Option<String>,

    /// Selected-variant region selectors, re-read after every activation
    pub price_selector: Option<String>,
    pub sku_selector: Option<String>,
    pub stock_selector: Option<String>,

    #[serde(default = "default_variant_settle_ms")]
    pub settle_ms: u64,

    /// Total navigation attempts per URL (first try included)
    #[serde(default = "default_navigation_attempts")]
    pub navigation_attempts: u32,

    #[serde(default = "default_navigation_backoff_ms")]
    pub navigation_backoff_ms: u64,

    /// Deferred URLs replayed between checkpoints and session recycling
    #[serde(default = "default_variant_batch_size")]
    pub batch_size: usize,
}

impl Default for VariantConfig {
    fn default() -> Self {
        Self {
            ready_selector: None,
            ready_timeout_secs: default_variant_ready_timeout_secs(),
            control_selector: None,
            label_attribute: None,
            price_selector: None,
            sku_selector: None,
            stock_selector: None,
            settle_ms: default_variant_settle_ms(),
            navigation_attempts: default_navigation_attempts(),
            navigation_backoff_ms: default_navigation_backoff_ms(),
            batch_size: default_variant_batch_size(),
        }
    }
}

/// Retry budget for static extraction
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Fixed delay between attempts (seconds)
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

/// Batching and worker pool configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BatchConfig {
    #[serde(default = "default_batch_size")]
    pub size: usize,

    /// Concurrent static extraction workers
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Pause between batches (milliseconds)
    #[serde(default)]
    pub pause_ms: u64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            size: default_batch_size(),
            workers: default_workers(),
            pause_ms: 0,
        }
    }
}

/// Output file configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct OutputConfig {
    pub links_path: String,
    pub details_path: String,
    pub deferred_path: String,
    pub failures_path: String,

    /// Durable append-only log file
    pub log_path: Option<String>,

    /// Add the `Variants` column
    #[serde(default)]
    pub include_variants: bool,

    /// Add the `Quantity` column
    #[serde(default)]
    pub include_quantity: bool,
}

/// One entry of the ordered stock text table
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StockRuleEntry {
    pub contains: String,
    pub status: StockStatus,
}

/// Stock text disambiguation table
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct StockConfig {
    #[serde(default = "default_stock_rules")]
    pub rules: Vec<StockRuleEntry>,

    /// Status when no rule matches
    #[serde(default = "default_stock_fallback")]
    pub default: StockStatus,
}

impl Default for StockConfig {
    fn default() -> Self {
        Self {
            rules: default_stock_rules(),
            default: default_stock_fallback(),
        }
    }
}

/// HTTP transport configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct HttpConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_frontier_ready_timeout_secs() -> u64 {
    10
}

fn default_frontier_settle_ms() -> u64 {
    3000
}

fn default_json_suffix() -> String {
    ".json".to_string()
}

fn default_variant_ready_timeout_secs() -> u64 {
    15
}

fn default_variant_settle_ms() -> u64 {
    2000
}

fn default_navigation_attempts() -> u32 {
    3
}

fn default_navigation_backoff_ms() -> u64 {
    3000
}

fn default_variant_batch_size() -> usize {
    50
}

fn default_max_attempts() -> u32 {
    2
}

fn default_backoff_secs() -> u64 {
    20
}

fn default_batch_size() -> usize {
    50
}

fn default_workers() -> usize {
    2
}

fn default_stock_rules() -> Vec<StockRuleEntry> {
    ["out of stock", "sold out", "udsolgt"]
        .into_iter()
        .map(|literal| StockRuleEntry {
            contains: literal.to_string(),
            status: StockStatus::OutOfStock,
        })
        .collect()
}

fn default_stock_fallback() -> StockStatus {
    StockStatus::InStock
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string()
}

fn default_timeout_secs() -> u64 {
    20
}

fn default_connect_timeout_secs() -> u64 {
    10
}
