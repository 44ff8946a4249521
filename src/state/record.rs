//! Records produced by the pipeline
use crate::state::StockStatus;
use chrono::{DateTime, Utc};
use std::fmt;

/// Spelling of a missing field in every output file
pub const NOT_AVAILABLE: &str = "N/A";

/// One extracted row: a single (item, variant) pair
///
/// Missing fields are `None` and rendered as `N/A`; the source URL is always
/// present, even on placeholder rows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductRecord {
    pub title: Option<String>,
    pub brand: Option<String>,
    pub sku: Option<String>,
    /// Currency-tagged decimal string, e.g. `129.00 kr`
    pub price: Option<String>,
    pub stock: StockStatus,
    pub quantity: Option<u64>,
    pub source_url: String,
    pub variant_label: Option<String>,
}

impl ProductRecord {
    /// A record with every field unknown except its source URL
    pub fn placeholder(source_url: impl Into<String>) -> Self {
        Self {
            title: None,
            brand: None,
            sku: None,
            price: None,
            stock: StockStatus::Unknown,
            quantity: None,
            source_url: source_url.into(),
            variant_label: None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        self.title.is_none()
            && self.brand.is_none()
            && self.sku.is_none()
            && self.price.is_none()
            && self.stock == StockStatus::Unknown
    }

    /// Renders the record in details-file column order
    ///
    /// `Title, Brand, [Variants,] SKU, Price, Stock Status, [Quantity,] URL`
    pub fn to_row(&self, include_variants: bool, include_quantity: bool) -> Vec<String> {
        let mut row = Vec::with_capacity(8);
        row.push(or_na(&self.title));
        row.push(or_na(&self.brand));
        if include_variants {
            row.push(or_na(&self.variant_label));
        }
        row.push(or_na(&self.sku));
        row.push(or_na(&self.price));
        row.push(self.stock.as_csv_str().to_string());
        if include_quantity {
            row.push(
                self.quantity
                    .map(|q| q.to_string())
                    .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
            );
        }
        row.push(self.source_url.clone());
        row
    }
}

fn or_na(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// A URL quarantined after its retry budget ran out
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailureRecord {
    pub url: String,
    /// Error class, e.g. `transient_network`
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}

impl FailureRecord {
    pub fn new(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn to_row(&self) -> Vec<String> {
        vec![
            self.url.clone(),
            self.reason.clone(),
            self.timestamp.to_rfc3339(),
        ]
    }
}

/// Which tier produced an extraction attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Static,
    Rendered,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Static => write!(f, "static"),
            Self::Rendered => write!(f, "rendered"),
        }
    }
}

/// How a single attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Succeeded,
    /// Failed with an error class worth another try
    Retryable(String),
    /// Failed with an error class that will not improve on retry
    Fatal(String),
}

/// One try at one URL; never persisted
#[derive(Debug, Clone)]
pub struct ExtractionAttempt {
    pub url: String,
    pub strategy: Strategy,
    /// 1-based
    pub attempt: u32,
    pub outcome: AttemptOutcome,
}
