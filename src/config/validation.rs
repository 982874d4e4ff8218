//! Configuration validation.

use crate::config::Config;

/// Validate the configuration.
///
/// Checks for:
/// - A known log level
/// - A non-empty service name
/// - A scrape path starting with `/`
/// - Finite, strictly increasing, non-empty histogram buckets
/// - A dedicated metrics address distinct from the application listener
///
/// # Returns
///
/// `Ok(())` if valid, or an error message describing every problem found.
pub fn validate_config(config: &Config) -> Result<(), String> {
    let mut errors = Vec::new();

    // Validate log level
    let valid_levels = ["trace", "debug", "info", "warn", "error"];
    if !valid_levels.contains(&config.global.log_level.to_lowercase().as_str()) {
        errors.push(format!(
            "invalid log level '{}', must be one of: {}",
            config.global.log_level,
            valid_levels.join(", ")
        ));
    }

    if config.server.service_name.trim().is_empty() {
        errors.push("service name cannot be empty".to_string());
    }

    if !config.metrics.path.starts_with('/') {
        errors.push(format!(
            "metrics path '{}' must start with '/'",
            config.metrics.path
        ));
    }

    if let Some(address) = config.metrics.address {
        if address == config.server.listen {
            errors.push(format!(
                "metrics address {} conflicts with server listen address",
                address
            ));
        }
    }

    check_buckets("duration_buckets", &config.metrics.duration_buckets, &mut errors);
    check_buckets("size_buckets", &config.metrics.size_buckets, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors.join("; "))
    }
}

fn check_buckets(name: &str, buckets: &[f64], errors: &mut Vec<String>) {
    if buckets.is_empty() {
        errors.push(format!("{} must define at least one bucket", name));
        return;
    }

    if buckets.iter().any(|bound| !bound.is_finite()) {
        errors.push(format!("{} must only contain finite bounds", name));
    }

    if buckets.windows(2).any(|pair| pair[0] >= pair[1]) {
        errors.push(format!("{} must be strictly increasing", name));
    }
}
