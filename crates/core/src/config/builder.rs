use crate::config::configuration::{ConfigNode, KEY_DELIMITER};
use crate::config::{ConfigSource, Configuration};
use crate::errors::CoreError;
use std::path::{Path, PathBuf};

/// Separator used in environment variable names in place of `:`
pub const ENV_LEVEL_SEPARATOR: &str = "__";

/// Builds a [`Configuration`] by layering sources; later sources override earlier ones
#[derive(Debug, Clone, Default)]
pub struct ConfigurationBuilder {
    sources: Vec<ConfigSource>,
}

impl ConfigurationBuilder {
    /// Create an empty builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a required YAML or JSON file
    pub fn add_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.into(),
            optional: false,
        });
        self
    }

    /// Add a file that is skipped when missing
    pub fn add_optional_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.sources.push(ConfigSource::File {
            path: path.into(),
            optional: true,
        });
        self
    }

    /// Add an inline YAML document
    pub fn add_yaml(mut self, yaml: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Yaml(yaml.into()));
        self
    }

    /// Add an inline JSON document
    pub fn add_json(mut self, json: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::Json(json.into()));
        self
    }

    /// Add `path = value` pairs
    pub fn add_in_memory<I, K, V>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let pairs = pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect();
        self.sources.push(ConfigSource::InMemory(pairs));
        self
    }

    /// Add environment variables starting with `prefix`
    pub fn add_env_vars(mut self, prefix: impl Into<String>) -> Self {
        self.sources.push(ConfigSource::EnvVars(prefix.into()));
        self
    }

    /// Sources in the order they will be applied
    pub fn sources(&self) -> &[ConfigSource] {
        &self.sources
    }

    /// Read every source and merge them into one configuration
    pub fn build(self) -> Result<Configuration, CoreError> {
        let mut root = ConfigNode::default();
        for source in self.sources {
            tracing::debug!("Loading configuration source: {}", source);
            if let Some(layer) = load_source(&source)? {
                root.merge(layer);
            }
        }
        Ok(Configuration::from_root(root))
    }
}

fn load_source(source: &ConfigSource) -> Result<Option<ConfigNode>, CoreError> {
    match source {
        ConfigSource::File { path, optional } => {
            if *optional && !path.exists() {
                tracing::debug!("Optional configuration file {} not found", path.display());
                return Ok(None);
            }
            load_file(path).map(Some)
        }
        ConfigSource::Yaml(yaml) => parse_yaml(yaml).map(Some),
        ConfigSource::Json(json) => parse_json(json).map(Some),
        ConfigSource::InMemory(pairs) => {
            let mut node = ConfigNode::default();
            for (path, value) in pairs {
                node.set(path, value.clone());
            }
            Ok(Some(node))
        }
        ConfigSource::EnvVars(prefix) => Ok(Some(from_env_vars(prefix, std::env::vars()))),
    }
}

fn load_file(path: &Path) -> Result<ConfigNode, CoreError> {
    let content = std::fs::read_to_string(path)?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("yaml") | Some("yml") => parse_yaml(&content),
        Some("json") => parse_json(&content),
        _ => Err(CoreError::configuration(format!(
            "Unsupported configuration file format: {}",
            path.display()
        ))),
    }
}

fn parse_yaml(yaml: &str) -> Result<ConfigNode, CoreError> {
    let value: serde_json::Value = serde_yaml::from_str(yaml)?;
    Ok(ConfigNode::from_json("", value))
}

fn parse_json(json: &str) -> Result<ConfigNode, CoreError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    Ok(ConfigNode::from_json("", value))
}

fn from_env_vars<I>(prefix: &str, vars: I) -> ConfigNode
where
    I: IntoIterator<Item = (String, String)>,
{
    let mut node = ConfigNode::default();
    for (name, value) in vars {
        if let Some(stripped) = name.strip_prefix(prefix) {
            let path = stripped.replace(ENV_LEVEL_SEPARATOR, &KEY_DELIMITER.to_string());
            node.set(&path, value);
        }
    }
    node
}
