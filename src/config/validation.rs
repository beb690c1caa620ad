use super::models::{Config, StorageProvider};
use thiserror::Error;

const ID_PLACEHOLDER: &str = "{id}";

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("worker.queue_capacity must be positive")]
    ZeroQueueCapacity,

    #[error("Timeout must be positive: {field}")]
    ZeroTimeout { field: &'static str },

    #[error("storage.bucket must not be empty")]
    EmptyBucket,

    #[error("Storage provider is S3 but missing credentials (access_key or secret_key)")]
    MissingS3Credentials,

    #[error("{field} must contain the '{{id}}' placeholder, got '{value}'")]
    MissingIdPlaceholder { field: &'static str, value: String },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_worker(config)?;
    validate_storage(config)?;
    validate_source(config)?;
    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.queue_capacity == 0 {
        return Err(ValidationError::ZeroQueueCapacity);
    }

    let timeouts = [
        ("worker.fetch_timeout_secs", config.worker.fetch_timeout_secs),
        ("worker.connect_timeout_secs", config.worker.connect_timeout_secs),
        ("server.shutdown_grace_secs", config.server.shutdown_grace_secs),
        ("storage.timeout_secs", config.storage.timeout_secs),
    ];
    for (field, value) in timeouts {
        if value == 0 {
            return Err(ValidationError::ZeroTimeout { field });
        }
    }

    Ok(())
}

fn validate_storage(config: &Config) -> Result<(), ValidationError> {
    if config.storage.bucket.trim().is_empty() {
        return Err(ValidationError::EmptyBucket);
    }

    if config.storage.provider == StorageProvider::S3
        && (config.storage.access_key.is_none() || config.storage.secret_key.is_none())
    {
        return Err(ValidationError::MissingS3Credentials);
    }

    Ok(())
}

fn validate_source(config: &Config) -> Result<(), ValidationError> {
    let templates = [
        ("source.lookup_url_template", &config.source.lookup_url_template),
        ("source.media_url_template", &config.source.media_url_template),
    ];
    for (field, value) in templates {
        if !value.contains(ID_PLACEHOLDER) {
            return Err(ValidationError::MissingIdPlaceholder {
                field,
                value: value.clone(),
            });
        }
    }

    Ok(())
}
