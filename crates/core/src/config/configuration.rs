use crate::config::ConfigurationBuilder;
use crate::errors::CoreError;

/// Separator between the segments of a configuration path
pub const KEY_DELIMITER: char = ':';

/// A node of the configuration tree
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct ConfigNode {
    key: String,
    value: Option<String>,
    children: Vec<ConfigNode>,
}

impl ConfigNode {
    fn named(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Self::default()
        }
    }

    fn child(&self, key: &str) -> Option<&ConfigNode> {
        self.children
            .iter()
            .find(|child| child.key.eq_ignore_ascii_case(key))
    }

    fn child_mut_or_insert(&mut self, key: &str) -> &mut ConfigNode {
        let position = self
            .children
            .iter()
            .position(|child| child.key.eq_ignore_ascii_case(key));
        let index = match position {
            Some(index) => index,
            None => {
                self.children.push(ConfigNode::named(key));
                self.children.len() - 1
            }
        };
        &mut self.children[index]
    }

    fn descend(&self, path: &str) -> Option<&ConfigNode> {
        segments(path).try_fold(self, |node, segment| node.child(segment))
    }

    /// Set a value at a colon-delimited path, creating intermediate nodes
    pub(crate) fn set(&mut self, path: &str, value: impl Into<String>) {
        let node = segments(path).fold(self, |node, segment| node.child_mut_or_insert(segment));
        node.value = Some(value.into());
    }

    /// Overlay another tree onto this one; values from `other` win
    pub(crate) fn merge(&mut self, other: ConfigNode) {
        if other.value.is_some() {
            self.value = other.value;
        }
        for child in other.children {
            let key = child.key.clone();
            self.child_mut_or_insert(&key).merge(child);
        }
    }

    /// Build a tree from a JSON document. Arrays become children keyed by index.
    pub(crate) fn from_json(key: impl Into<String>, value: serde_json::Value) -> Self {
        let mut node = ConfigNode::named(key);
        match value {
            serde_json::Value::Null => {}
            serde_json::Value::Bool(b) => node.value = Some(b.to_string()),
            serde_json::Value::Number(n) => node.value = Some(n.to_string()),
            serde_json::Value::String(s) => node.value = Some(s),
            serde_json::Value::Array(items) => {
                node.children = items
                    .into_iter()
                    .enumerate()
                    .map(|(index, item)| ConfigNode::from_json(index.to_string(), item))
                    .collect();
            }
            serde_json::Value::Object(map) => {
                for (key, item) in map {
                    node.child_mut_or_insert(&key)
                        .merge(ConfigNode::from_json(key.clone(), item));
                }
            }
        }
        node
    }
}

fn segments(path: &str) -> impl Iterator<Item = &str> {
    path.split(KEY_DELIMITER).filter(|segment| !segment.is_empty())
}

/// Immutable hierarchical configuration with case-insensitive keys.
///
/// Paths are colon-delimited (`Modules:add:0`); array elements are addressed
/// by their index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Configuration {
    root: ConfigNode,
}

impl Configuration {
    pub(crate) fn from_root(root: ConfigNode) -> Self {
        Self { root }
    }

    /// Create a configuration builder
    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::new()
    }

    /// Parse a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, CoreError> {
        Self::builder().add_yaml(yaml).build()
    }

    /// Parse a JSON document
    pub fn from_json_str(json: &str) -> Result<Self, CoreError> {
        Self::builder().add_json(json).build()
    }

    /// Build a configuration from `path = value` pairs
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut root = ConfigNode::default();
        for (path, value) in pairs {
            root.set(path.as_ref(), value);
        }
        Self { root }
    }

    /// Get the scalar value at a path
    pub fn get(&self, path: &str) -> Option<&str> {
        self.root.descend(path).and_then(|node| node.value.as_deref())
    }

    /// Get the section at a path. The section may not exist.
    pub fn section(&self, path: &str) -> ConfigSection<'_> {
        self.root().section(path)
    }

    /// Get the root section
    pub fn root(&self) -> ConfigSection<'_> {
        ConfigSection {
            path: String::new(),
            node: Some(&self.root),
        }
    }
}

/// A view of one node of a [`Configuration`]
#[derive(Debug, Clone)]
pub struct ConfigSection<'a> {
    path: String,
    node: Option<&'a ConfigNode>,
}

impl<'a> ConfigSection<'a> {
    /// Full path of the section
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Last segment of the path
    pub fn key(&self) -> &str {
        self.path
            .rsplit(KEY_DELIMITER)
            .next()
            .unwrap_or(self.path.as_str())
    }

    /// Scalar value held directly by this section
    pub fn value(&self) -> Option<&'a str> {
        self.node.and_then(|node| node.value.as_deref())
    }

    /// Check if the section holds a value or children
    pub fn exists(&self) -> bool {
        self.node
            .map(|node| node.value.is_some() || !node.children.is_empty())
            .unwrap_or(false)
    }

    /// Check if the section has child sections
    pub fn has_children(&self) -> bool {
        self.node.map(|node| !node.children.is_empty()).unwrap_or(false)
    }

    /// Direct children in document order
    pub fn children(&self) -> Vec<ConfigSection<'a>> {
        let Some(node) = self.node else {
            return Vec::new();
        };
        node.children
            .iter()
            .map(|child| ConfigSection {
                path: self.join(&child.key),
                node: Some(child),
            })
            .collect()
    }

    /// Get a sub-section
    pub fn section(&self, path: &str) -> ConfigSection<'a> {
        ConfigSection {
            path: self.join(path),
            node: self.node.and_then(|node| node.descend(path)),
        }
    }

    /// Get the scalar value of a sub-section
    pub fn get(&self, path: &str) -> Option<&'a str> {
        self.node
            .and_then(|node| node.descend(path))
            .and_then(|node| node.value.as_deref())
    }

    fn join(&self, key: &str) -> String {
        if self.path.is_empty() {
            key.to_string()
        } else {
            format!("{}{}{}", self.path, KEY_DELIMITER, key)
        }
    }
}
