//! Parsers for product documents
//!
//! This module handles the pieces of a product page that are read without
//! a renderer:
//! - Markup queries (first text, attribute, presence) against raw HTML
//! - Structured product payloads (JSON endpoint or embedded script block)
//! - Price normalization into the profile's display format

use crate::config::{ExtractionConfig, PriceUnit};
use scraper::{Html, Selector};
use serde::Deserialize;
use serde_json::Value;

/// A parsed product page
///
/// Wraps `scraper::Html`, which is not `Send`; build it, read what is needed
/// and drop it before the next await.
pub struct ProductPage {
    document: Html,
}

impl ProductPage {
    pub fn parse(markup: &str) -> Self {
        Self {
            document: Html::parse_document(markup),
        }
    }

    /// Whitespace-normalized text of the first element matching `selector`
    ///
    /// Returns None when nothing matches or the text is empty. Selectors are
    /// validated at config load, so an unparseable one simply matches nothing.
    pub fn text(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        self.document
            .select(&selector)
            .map(|el| normalize_whitespace(&el.text().collect::<Vec<_>>().join(" ")))
            .find(|text| !text.is_empty())
    }

    /// Attribute `attr` of the first element matching `selector` that has it
    pub fn attr(&self, selector: &str, attr: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        self.document
            .select(&selector)
            .filter_map(|el| el.value().attr(attr))
            .map(str::trim)
            .find(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Raw inner content of the first matching element, for script blocks
    pub fn inner(&self, selector: &str) -> Option<String> {
        let selector = Selector::parse(selector).ok()?;
        self.document
            .select(&selector)
            .next()
            .map(|el| el.text().collect::<String>())
    }

    pub fn has_match(&self, selector: &str) -> bool {
        Selector::parse(selector)
            .map(|s| self.document.select(&s).next().is_some())
            .unwrap_or(false)
    }

    /// Text of the first selector in `selectors` that yields any
    pub fn first_text(&self, selectors: &[String]) -> Option<String> {
        selectors.iter().find_map(|s| self.text(s))
    }
}

/// Collapses runs of whitespace into single spaces and trims
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Product as exposed by a storefront's JSON representation
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub variants: Vec<VariantPayload>,
}

/// One variant entry of a [`ProductPayload`]
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VariantPayload {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    #[serde(default)]
    pub price: Option<Value>,
    #[serde(default)]
    pub available: Option<bool>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
}

/// Parses a product payload
///
/// Accepts both the bare product object and the `{"product": {...}}`
/// envelope that `<product-url>.json` endpoints return.
pub fn parse_product_payload(json: &str) -> Result<ProductPayload, serde_json::Error> {
    let mut value: Value = serde_json::from_str(json.trim())?;

    if let Some(product) = value.get_mut("product") {
        if product.is_object() {
            let product = product.take();
            return serde_json::from_value(product);
        }
    }

    serde_json::from_value(value)
}

/// Display format for prices
#[derive(Debug, Clone, PartialEq)]
pub struct PriceFormat {
    unit: PriceUnit,
    prefix: String,
    suffix: String,
    thousands_separator: bool,
}

impl PriceFormat {
    pub fn new(
        unit: PriceUnit,
        prefix: impl Into<String>,
        suffix: impl Into<String>,
        thousands_separator: bool,
    ) -> Self {
        Self {
            unit,
            prefix: prefix.into(),
            suffix: suffix.into(),
            thousands_separator,
        }
    }

    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self::new(
            config.price_unit,
            config.price_prefix.clone(),
            config.price_suffix.clone(),
            config.thousands_separator,
        )
    }

    /// Formats a payload price, given as a JSON string or number
    pub fn format_value(&self, value: &Value) -> Option<String> {
        match value {
            Value::String(s) => self.format_text(s),
            Value::Number(n) => match self.unit {
                PriceUnit::Cents => n
                    .as_i64()
                    .or_else(|| n.as_f64().map(|f| f.round() as i64))
                    .and_then(|cents| parse_cents(&cents.to_string()))
                    .map(|(negative, major, minor)| self.render(negative, major, minor)),
                PriceUnit::Major => n.as_f64().and_then(|f| self.format_text(&format!("{:.2}", f))),
            },
            _ => None,
        }
    }

    /// Formats a price read from markup
    ///
    /// Plain decimals are normalized; anything else (already formatted
    /// prices such as "1.299,00 kr") is kept verbatim.
    pub fn format_text(&self, text: &str) -> Option<String> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }

        let parsed = match self.unit {
            PriceUnit::Cents => parse_cents(text),
            PriceUnit::Major => parse_decimal(text),
        };

        Some(match parsed {
            Some((negative, major, minor)) => self.render(negative, major, minor),
            None => text.to_string(),
        })
    }

    fn render(&self, negative: bool, major: u64, minor: u32) -> String {
        let major = if self.thousands_separator {
            group_thousands(major)
        } else {
            major.to_string()
        };
        let sign = if negative { "-" } else { "" };
        format!("{}{}{}.{:02}{}", self.prefix, sign, major, minor, self.suffix)
    }
}

impl Default for PriceFormat {
    fn default() -> Self {
        Self::new(PriceUnit::Major, "", "", false)
    }
}

/// Parses "129", "129.5" or "129.00" into (negative, major, minor)
fn parse_decimal(text: &str) -> Option<(bool, u64, u32)> {
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));

    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let major = int_part.parse().ok()?;
    let minor = match frac_part.len() {
        0 => 0,
        1 => frac_part.parse::<u32>().ok()? * 10,
        _ => frac_part[..2].parse().ok()?,
    };
    Some((negative, major, minor))
}

/// Parses an integer amount of minor units
fn parse_cents(text: &str) -> Option<(bool, u64, u32)> {
    let cents: i64 = text.parse().ok()?;
    let abs = cents.unsigned_abs();
    Some((cents < 0, abs / 100, (abs % 100) as u32))
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    grouped
}

/// Takes the part of a brand label after `separator`, if present
///
/// "Mærke: Tamiya" with separator ": " becomes "Tamiya".
pub fn split_brand(raw: &str, separator: Option<&str>) -> String {
    let raw = raw.trim();
    match separator {
        Some(sep) if !sep.is_empty() => raw
            .split_once(sep)
            .map(|(_, brand)| brand.trim().to_string())
            .unwrap_or_else(|| raw.to_string()),
        _ => raw.to_string(),
    }
}
