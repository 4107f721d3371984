use crate::modules::ModuleError;
use thiserror::Error;

/// Core error type surfaced by module activation and configuration
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Activation error: {message}")]
    Activation { message: String },

    #[error("Configuration error: {message}")]
    Configuration {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Registration failed for module '{module}': {source}")]
    Registration {
        module: String,
        source: Box<ModuleError>,
    },

    #[error("Service not found: {service_type}")]
    ServiceNotFound { service_type: String },
}

impl CoreError {
    /// Create a new activation error
    pub fn activation(message: impl Into<String>) -> Self {
        Self::Activation {
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new configuration error wrapping the underlying failure
    pub fn configuration_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Configuration {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a new registration error for a module
    pub fn registration(module: impl Into<String>, source: ModuleError) -> Self {
        Self::Registration {
            module: module.into(),
            source: Box::new(source),
        }
    }

    /// Create a new service not found error
    pub fn service_not_found(service_type: impl Into<String>) -> Self {
        Self::ServiceNotFound {
            service_type: service_type.into(),
        }
    }

    /// Check if the error is an activation error
    pub fn is_activation(&self) -> bool {
        matches!(self, Self::Activation { .. })
    }

    /// Check if the error is a configuration error
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration { .. })
    }

    /// Check if the error is a registration error
    pub fn is_registration(&self) -> bool {
        matches!(self, Self::Registration { .. })
    }

    /// Check if the error is a service error
    pub fn is_service(&self) -> bool {
        matches!(self, Self::ServiceNotFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConversionError;

    #[test]
    fn test_error_predicates() {
        assert!(CoreError::activation("no constructor").is_activation());
        assert!(CoreError::configuration("bad key").is_configuration());
        assert!(CoreError::service_not_found("Cache").is_service());
        assert!(!CoreError::configuration("bad key").is_activation());
    }

    #[test]
    fn test_configuration_error_keeps_source() {
        use std::error::Error;

        let conversion = ConversionError::new("i32", "abc", "invalid digit found in string");
        let error = CoreError::configuration_with_source("Unable to set 'Port'", conversion);

        assert_eq!(error.to_string(), "Configuration error: Unable to set 'Port'");
        let source = error.source().map(|s| s.to_string()).unwrap_or_default();
        assert!(source.contains("abc"));
    }
}
