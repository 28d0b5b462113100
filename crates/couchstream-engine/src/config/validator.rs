//! Semantic validation for engine configuration.
//!
//! Validation failures are fatal at start: they surface as a
//! [`ConnectorError`] of category `Config` listing every problem found.

use couchstream_types::ConnectorError;
use reqwest::Url;

use crate::config::types::{ConnectionConfig, SinkConfig, SourceConfig};

fn validate_connection(connection: &ConnectionConfig, errors: &mut Vec<String>) {
    if connection.url.trim().is_empty() {
        errors.push("url must not be empty".to_string());
        return;
    }
    match Url::parse(&connection.url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {
            if url.path_segments().map_or(true, |mut s| s.all(str::is_empty)) {
                errors.push(format!("url '{}' must name a database", connection.url));
            }
        }
        Ok(url) => errors.push(format!(
            "url '{}' has unsupported scheme '{}'",
            connection.url,
            url.scheme()
        )),
        Err(e) => errors.push(format!("url '{}' is invalid: {e}", connection.url)),
    }
    if connection.username.is_empty() != connection.password.is_empty() {
        errors.push("username and password must be set together".to_string());
    }
}

fn validate_topics(topics: &[String], errors: &mut Vec<String>) {
    if topics.is_empty() {
        errors.push("topics must list at least one topic".to_string());
    }
    if topics.iter().any(|t| t.trim().is_empty()) {
        errors.push("topics must not contain empty names".to_string());
    }
}

fn into_result(errors: Vec<String>) -> Result<(), ConnectorError> {
    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConnectorError::config("INVALID_CONFIG", errors.join("; ")))
    }
}

/// Validate a source configuration.
///
/// # Errors
///
/// Returns a `Config` error listing all validation failures.
pub fn validate_source(config: &SourceConfig) -> Result<(), ConnectorError> {
    let mut errors = Vec::new();
    validate_connection(&config.connection, &mut errors);
    validate_topics(&config.topics, &mut errors);

    if config.batch_size == 0 {
        errors.push("batch_size must be > 0".to_string());
    }
    if config.task_index != 0 {
        errors.push(format!(
            "task_index {} is not supported: the changes feed is consumed by a single task",
            config.task_index
        ));
    }
    if config.heartbeat_ms == 0 {
        errors.push("heartbeat_ms must be > 0".to_string());
    }
    if config.shutdown_poll_ms == 0 {
        errors.push("shutdown_poll_ms must be > 0".to_string());
    }
    if matches!(config.last_change_seq.as_deref(), Some(seq) if seq.trim().is_empty()) {
        errors.push("last_change_seq must not be empty when set".to_string());
    }

    into_result(errors)
}

/// Validate a sink configuration.
///
/// # Errors
///
/// Returns a `Config` error listing all validation failures.
pub fn validate_sink(config: &SinkConfig) -> Result<(), ConnectorError> {
    let mut errors = Vec::new();
    validate_connection(&config.connection, &mut errors);
    validate_topics(&config.topics, &mut errors);

    if config.batch_size == 0 {
        errors.push("batch_size must be > 0".to_string());
    }
    if !config.topics.is_empty() && config.task_index as usize >= config.topics.len() {
        errors.push(format!(
            "task_index {} has no topic (topics: {})",
            config.task_index,
            config.topics.len()
        ));
    }

    into_result(errors)
}
