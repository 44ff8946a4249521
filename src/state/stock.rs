//! Stock status and the ordered text rule table that infers it
use crate::config::StockConfig;
use serde::Deserialize;
use std::fmt;

/// Availability of one product variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StockStatus {
    InStock,
    OutOfStock,
    /// Sold out, restock announced
    OutOfStockExpected,
    /// Available from a remote warehouse
    InStockRemote,
    /// Could not be determined
    Unknown,
}

impl StockStatus {
    /// The spelling written to the details file
    pub fn as_csv_str(&self) -> &'static str {
        match self {
            Self::InStock => "In Stock",
            Self::OutOfStock => "Out of Stock",
            Self::OutOfStockExpected => "Out of Stock(Expected)",
            Self::InStockRemote => "In Stock(in remote storage)",
            Self::Unknown => "N/A",
        }
    }

    /// Parses the details file spelling back
    pub fn from_csv_str(s: &str) -> Option<Self> {
        match s {
            "In Stock" => Some(Self::InStock),
            "Out of Stock" => Some(Self::OutOfStock),
            "Out of Stock(Expected)" => Some(Self::OutOfStockExpected),
            "In Stock(in remote storage)" => Some(Self::InStockRemote),
            "N/A" => Some(Self::Unknown),
            _ => None,
        }
    }

    /// Maps an explicit availability flag
    pub fn from_available(available: bool) -> Self {
        if available {
            Self::InStock
        } else {
            Self::OutOfStock
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::InStock | Self::InStockRemote)
    }
}

impl fmt::Display for StockStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_csv_str())
    }
}

/// Ordered `(substring, status)` table, evaluated first-match-wins
///
/// Matching is case-insensitive, so `UDSOLGT` and `Udsolgt` hit the same
/// rule. Order matters: `Ikke på lager` must precede `På lager`.
#[derive(Debug, Clone)]
pub struct StockRules {
    rules: Vec<(String, StockStatus)>,
    fallback: StockStatus,
}

impl StockRules {
    pub fn new(rules: Vec<(String, StockStatus)>, fallback: StockStatus) -> Self {
        let rules = rules
            .into_iter()
            .map(|(text, status)| (text.to_lowercase(), status))
            .collect();
        Self { rules, fallback }
    }

    /// Builds the table from a profile's `[stock]` section
    pub fn from_config(config: &StockConfig) -> Self {
        Self::new(
            config
                .rules
                .iter()
                .map(|r| (r.contains.clone(), r.status))
                .collect(),
            config.default,
        )
    }

    /// Classifies a badge text
    ///
    /// Missing text is classified like text that matches no rule.
    pub fn classify(&self, text: Option<&str>) -> StockStatus {
        let Some(text) = text else {
            return self.fallback;
        };

        let haystack = text.to_lowercase();
        self.rules
            .iter()
            .find(|(needle, _)| haystack.contains(needle.as_str()))
            .map(|(_, status)| *status)
            .unwrap_or(self.fallback)
    }
}

impl Default for StockRules {
    fn default() -> Self {
        Self::from_config(&StockConfig::default())
    }
}
