use std::path::PathBuf;

/// A layer of configuration, applied in the order it was added to the builder
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// YAML or JSON file, chosen by extension
    File { path: PathBuf, optional: bool },
    /// Inline YAML document
    Yaml(String),
    /// Inline JSON document
    Json(String),
    /// `path = value` pairs provided programmatically
    InMemory(Vec<(String, String)>),
    /// Environment variables starting with a prefix; `__` separates levels
    EnvVars(String),
}

impl ConfigSource {
    /// Check if source is a file
    pub fn is_file(&self) -> bool {
        matches!(self, ConfigSource::File { .. })
    }

    /// Check if source is environment variables
    pub fn is_env_vars(&self) -> bool {
        matches!(self, ConfigSource::EnvVars(_))
    }

    /// Get source description
    pub fn description(&self) -> String {
        match self {
            ConfigSource::File { path, optional } => {
                let kind = if *optional { "Optional configuration file" } else { "Configuration file" };
                format!("{}: {}", kind, path.display())
            }
            ConfigSource::Yaml(_) => "Inline YAML".to_string(),
            ConfigSource::Json(_) => "Inline JSON".to_string(),
            ConfigSource::InMemory(pairs) => format!("In-memory values ({})", pairs.len()),
            ConfigSource::EnvVars(prefix) => format!("Environment variables: {}*", prefix),
        }
    }
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.description())
    }
}
