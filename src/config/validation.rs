use crate::config::types::{
    BatchConfig, Config, ExtractionConfig, ExtractionStrategy, FieldSelectors, FrontierConfig,
    FrontierMode, OutputConfig, RetryConfig, SiteConfig, StockConfig, VariantConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire profile
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_site_config(&config.site)?;
    validate_frontier_config(&config.frontier)?;
    validate_extraction_config(&config.extraction, &config.selectors)?;
    validate_field_selectors(&config.selectors)?;
    validate_variant_config(&config.variants)?;
    validate_retry_config(&config.retry)?;
    validate_batch_config(&config.batch)?;
    validate_output_config(&config.output)?;
    validate_stock_config(&config.stock)?;
    Ok(())
}

fn validate_site_config(config: &SiteConfig) -> Result<(), ConfigError> {
    if config.name.trim().is_empty() {
        return Err(ConfigError::Validation("site name cannot be empty".to_string()));
    }

    validate_http_url("seed-url", &config.seed_url)?;
    if let Some(session_url) = &config.session_url {
        validate_http_url("session-url", session_url)?;
    }

    Ok(())
}

fn validate_frontier_config(config: &FrontierConfig) -> Result<(), ConfigError> {
    validate_selector("frontier.item-selector", &config.item_selector)?;
    validate_selector("frontier.next-selector", &config.next_selector)?;
    validate_optional_selector("frontier.container-selector", &config.container_selector)?;
    validate_optional_selector("frontier.collection-selector", &config.collection_selector)?;
    validate_optional_selector("frontier.ready-selector", &config.ready_selector)?;

    if config.mode == FrontierMode::Sitemap && config.container_selector.is_none() {
        return Err(ConfigError::Validation(
            "sitemap mode requires frontier.container-selector".to_string(),
        ));
    }

    if config.max_pages == Some(0) {
        return Err(ConfigError::Validation(
            "frontier.max-pages must be >= 1 when set".to_string(),
        ));
    }

    if config.ready_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "frontier.ready-timeout-secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_extraction_config(
    config: &ExtractionConfig,
    selectors: &FieldSelectors,
) -> Result<(), ConfigError> {
    match config.strategy {
        ExtractionStrategy::JsonEndpoint => {
            if config.json_suffix.is_empty() {
                return Err(ConfigError::Validation(
                    "json-endpoint strategy requires a non-empty extraction.json-suffix"
                        .to_string(),
                ));
            }
            // The endpoint payload lists every variant; there is no page to mark
            if selectors.variant_control.is_some() {
                return Err(ConfigError::Validation(
                    "selectors.variant-control has no effect with the json-endpoint strategy"
                        .to_string(),
                ));
            }
        }
        ExtractionStrategy::EmbeddedJson => match &config.payload_selector {
            Some(selector) => validate_selector("extraction.payload-selector", selector)?,
            None => {
                return Err(ConfigError::Validation(
                    "embedded-json strategy requires extraction.payload-selector".to_string(),
                ))
            }
        },
        ExtractionStrategy::Markup => {
            if selectors.title.is_none() {
                return Err(ConfigError::Validation(
                    "markup strategy requires selectors.title".to_string(),
                ));
            }
        }
    }

    Ok(())
}

fn validate_field_selectors(selectors: &FieldSelectors) -> Result<(), ConfigError> {
    validate_optional_selector("selectors.title", &selectors.title)?;
    validate_optional_selector("selectors.brand", &selectors.brand)?;
    validate_optional_selector("selectors.price", &selectors.price)?;
    validate_optional_selector("selectors.sku", &selectors.sku)?;
    validate_optional_selector("selectors.stock", &selectors.stock)?;
    validate_optional_selector("selectors.variant-control", &selectors.variant_control)?;

    for badge in &selectors.badges {
        validate_selector("selectors.badges", badge)?;
    }

    Ok(())
}

fn validate_variant_config(config: &VariantConfig) -> Result<(), ConfigError> {
    validate_optional_selector("variants.ready-selector", &config.ready_selector)?;
    validate_optional_selector("variants.control-selector", &config.control_selector)?;
    validate_optional_selector("variants.price-selector", &config.price_selector)?;
    validate_optional_selector("variants.sku-selector", &config.sku_selector)?;
    validate_optional_selector("variants.stock-selector", &config.stock_selector)?;

    if config.navigation_attempts < 1 || config.navigation_attempts > 5 {
        return Err(ConfigError::Validation(format!(
            "variants.navigation-attempts must be between 1 and 5, got {}",
            config.navigation_attempts
        )));
    }

    if config.ready_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "variants.ready-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "variants.batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "retry.max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.backoff_secs > 300 {
        return Err(ConfigError::Validation(format!(
            "retry.backoff-secs must be <= 300, got {}",
            config.backoff_secs
        )));
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<(), ConfigError> {
    if config.size == 0 {
        return Err(ConfigError::Validation("batch.size must be >= 1".to_string()));
    }

    if config.workers < 1 || config.workers > 32 {
        return Err(ConfigError::Validation(format!(
            "batch.workers must be between 1 and 32, got {}",
            config.workers
        )));
    }

    Ok(())
}

fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    let paths = [
        ("output.links-path", &config.links_path),
        ("output.details-path", &config.details_path),
        ("output.deferred-path", &config.deferred_path),
        ("output.failures-path", &config.failures_path),
    ];

    for (name, path) in paths {
        if path.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    // The three run outputs are written through separate handles
    if config.details_path == config.deferred_path
        || config.details_path == config.failures_path
        || config.deferred_path == config.failures_path
    {
        return Err(ConfigError::Validation(
            "details, deferred and failures paths must all differ".to_string(),
        ));
    }

    Ok(())
}

fn validate_stock_config(config: &StockConfig) -> Result<(), ConfigError> {
    for rule in &config.rules {
        if rule.contains.trim().is_empty() {
            return Err(ConfigError::Validation(
                "stock rule text cannot be empty".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use HTTP or HTTPS",
            name, value
        )));
    }

    Ok(())
}

fn validate_selector(name: &str, selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector(format!("{} '{}': {:?}", name, selector, e)))
}

fn validate_optional_selector(name: &str, selector: &Option<String>) -> Result<(), ConfigError> {
    match selector {
        Some(s) => validate_selector(name, s),
        None => Ok(()),
    }
}
