use crate::error::{AppError, Result};
use crate::fetch::request::template_placeholders;

use super::{EndpointConfig, HarvestConfig, HttpSettings, PipelineSettings};

/// Validate a harvester config and surface every problem at once.
pub fn validate_config(config: &HarvestConfig) -> Result<()> {
    let mut issues = Vec::new();

    validate_regions(config, &mut issues);
    validate_endpoints(&config.endpoints, &mut issues);
    validate_http(&config.http, &mut issues);
    validate_pipeline(&config.pipeline, &mut issues);

    if issues.is_empty() {
        Ok(())
    } else {
        Err(AppError::message(format!(
            "harvest config invalid:\n  - {}",
            issues.join("\n  - ")
        )))
    }
}

fn validate_regions(config: &HarvestConfig, issues: &mut Vec<String>) {
    if config.regions.is_empty() && config.hub_stations.is_empty() {
        issues.push("at least one of `regions` or `hub_stations` must be set".to_string());
    }

    if config.regions.iter().any(|region| *region <= 0) {
        issues.push("region ids must be positive".to_string());
    }
}

fn validate_endpoints(endpoints: &EndpointConfig, issues: &mut Vec<String>) {
    validate_template("endpoints.history", &endpoints.history, &["region", "type_id"], issues);
    validate_template("endpoints.orders", &endpoints.orders, &["region", "page"], issues);

    if let Some(marketstat) = &endpoints.marketstat {
        if !marketstat.starts_with("http") {
            issues.push("endpoints.marketstat must be an http(s) URL".to_string());
        }
    }
}

fn validate_template(label: &str, template: &str, required: &[&str], issues: &mut Vec<String>) {
    if template.is_empty() {
        issues.push(format!("{label} must not be empty"));
        return;
    }

    let placeholders = match template_placeholders(template) {
        Ok(placeholders) => placeholders,
        Err(err) => {
            issues.push(format!("{label}: {err}"));
            return;
        }
    };

    for key in required {
        if !placeholders.iter().any(|found| found == key) {
            issues.push(format!("{label} must reference `{{{key}}}`"));
        }
    }

    for found in &placeholders {
        if !required.contains(&found.as_str()) {
            issues.push(format!("{label} uses unknown placeholder `{{{found}}}`"));
        }
    }
}

fn validate_http(http: &HttpSettings, issues: &mut Vec<String>) {
    if http.timeout.is_zero() {
        issues.push("http.timeout_secs must be greater than zero".to_string());
    }
    if http.max_attempts == 0 {
        issues.push("http.max_attempts must be at least 1".to_string());
    }
}

fn validate_pipeline(pipeline: &PipelineSettings, issues: &mut Vec<String>) {
    if pipeline.workers == 0 {
        issues.push("pipeline.workers must be at least 1".to_string());
    }
    if pipeline.max_order_pages == 0 {
        issues.push("pipeline.max_order_pages must be at least 1".to_string());
    }
    if pipeline.cycle_interval.is_zero() {
        issues.push("pipeline.cycle_interval_secs must be greater than zero".to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_default_config;
    use std::path::Path;

    fn bundled() -> HarvestConfig {
        let root = Path::new(env!("CARGO_MANIFEST_DIR"));
        load_default_config(root).expect("load bundled config")
    }

    #[test]
    fn accepts_bundled_config() {
        validate_config(&bundled()).expect("bundled config should be valid");
    }

    #[test]
    fn rejects_history_template_without_type_placeholder() {
        let mut config = bundled();
        config.endpoints.history = "https://example.test/markets/{region}/history/".to_string();

        let err = validate_config(&config).expect_err("validation should fail");
        let message = err.to_string();
        assert!(
            message.contains("`{type_id}`"),
            "unexpected error message: {message}"
        );
    }

    #[test]
    fn aggregates_multiple_issues() {
        let mut config = bundled();
        config.regions.clear();
        config.hub_stations.clear();
        config.pipeline.workers = 0;
        config.http.max_attempts = 0;

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("regions"), "{message}");
        assert!(message.contains("pipeline.workers"), "{message}");
        assert!(message.contains("http.max_attempts"), "{message}");
    }

    #[test]
    fn rejects_unterminated_placeholder() {
        let mut config = bundled();
        config.endpoints.orders = "https://example.test/{region}/orders?page={page".to_string();

        let message = validate_config(&config).unwrap_err().to_string();
        assert!(message.contains("Unterminated"), "{message}");
    }
}
