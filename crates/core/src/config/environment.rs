use crate::errors::CoreError;
use std::env;
use std::str::FromStr;

/// Capability of an environment handle: it exposes the name modules are gated on
pub trait HostEnvironment: Send + Sync {
    /// Name of the hosting environment, compared case-insensitively
    fn environment_name(&self) -> &str;
}

/// Environment enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Testing,
    Production,
}

impl FromStr for Environment {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testing" | "test" => Ok(Environment::Testing),
            "production" | "prod" => Ok(Environment::Production),
            _ => Err(CoreError::configuration(format!(
                "Invalid environment '{}'. Expected: development, testing, or production",
                s
            ))),
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.environment_name())
    }
}

impl Environment {
    /// Read the environment from the `ENVIRONMENT` variable, defaulting to development
    pub fn from_env() -> Result<Self, CoreError> {
        match env::var("ENVIRONMENT") {
            Ok(value) => value.parse(),
            Err(_) => Ok(Environment::default()),
        }
    }

    /// Check if environment is development
    pub fn is_development(&self) -> bool {
        matches!(self, Environment::Development)
    }

    /// Check if environment is testing
    pub fn is_testing(&self) -> bool {
        matches!(self, Environment::Testing)
    }

    /// Check if environment is production
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

impl HostEnvironment for Environment {
    fn environment_name(&self) -> &str {
        match self {
            Environment::Development => "Development",
            Environment::Testing => "Testing",
            Environment::Production => "Production",
        }
    }
}

/// An environment with an arbitrary name, e.g. `Staging`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedEnvironment {
    name: String,
}

impl NamedEnvironment {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl HostEnvironment for NamedEnvironment {
    fn environment_name(&self) -> &str {
        &self.name
    }
}
