use crate::errors::CoreError;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashMap;
use std::str::FromStr;

/// How an override entry is bound to a module member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize)]
pub enum OverrideKind {
    /// Bind to a property only
    Property,
    /// Bind to an event only
    Event,
    /// The value is a configuration key whose value is the real override
    Config,
    /// Bind to whichever member the name resolves to
    #[default]
    Auto,
}

impl FromStr for OverrideKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "property" => Ok(OverrideKind::Property),
            "event" => Ok(OverrideKind::Event),
            "config" => Ok(OverrideKind::Config),
            "auto" => Ok(OverrideKind::Auto),
            _ => Err(CoreError::configuration(format!(
                "Invalid override type '{}'. Expected: Property, Event, Config, or Auto",
                s
            ))),
        }
    }
}

/// A single member override read from configuration
#[derive(Debug, Clone, PartialEq, Eq, Default, serde::Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct OverrideEntry {
    pub value: Option<String>,
    pub suppress_errors: bool,
    #[serde(rename = "Type")]
    pub kind: OverrideKind,
    pub hint_path: Option<String>,
}

impl OverrideEntry {
    /// Create an `Auto` entry with the given value
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    /// Set the override kind
    pub fn with_kind(mut self, kind: OverrideKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the error suppression flag
    pub fn with_suppress_errors(mut self, suppress_errors: bool) -> Self {
        self.suppress_errors = suppress_errors;
        self
    }

    /// Set the library hint path used to resolve event handlers
    pub fn with_hint_path(mut self, hint_path: impl Into<String>) -> Self {
        self.hint_path = Some(hint_path.into());
        self
    }
}

/// Insertion-ordered map with case-insensitive string keys
#[derive(Debug, Clone)]
pub struct CaseInsensitiveMap<V> {
    entries: Vec<(String, V)>,
    index: HashMap<String, usize>,
}

impl<V> CaseInsensitiveMap<V> {
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Insert a value, replacing the value of a key differing only by case.
    /// The original key spelling and position are kept on replacement.
    pub fn insert(&mut self, key: impl Into<String>, value: V) {
        let key = key.into();
        match self.index.get(&key.to_ascii_lowercase()) {
            Some(&position) => self.entries[position].1 = value,
            None => {
                self.index.insert(key.to_ascii_lowercase(), self.entries.len());
                self.entries.push((key, value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&V> {
        self.index
            .get(&key.to_ascii_lowercase())
            .map(|&position| &self.entries[position].1)
    }

    /// Get the stored spelling of a key together with its value
    pub fn get_key_value(&self, key: &str) -> Option<(&str, &V)> {
        self.index.get(&key.to_ascii_lowercase()).map(|&position| {
            let (stored, value) = &self.entries[position];
            (stored.as_str(), value)
        })
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(&key.to_ascii_lowercase())
    }

    /// Entries in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &V)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V> Default for CaseInsensitiveMap<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V: Serialize> Serialize for CaseInsensitiveMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// Overrides for the members of one module key
pub type MemberOverrides = CaseInsensitiveMap<OverrideEntry>;

/// Module key → member name → override entry.
///
/// Module keys are full type names, bare type names or `*` patterns.
/// Empty buckets are never stored.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(transparent)]
pub struct ConfigurationOverlay {
    modules: CaseInsensitiveMap<MemberOverrides>,
}

impl ConfigurationOverlay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the overrides for a module key. Empty buckets are dropped.
    pub fn insert(&mut self, module_key: impl Into<String>, members: MemberOverrides) {
        if members.is_empty() {
            return;
        }
        self.modules.insert(module_key, members);
    }

    /// Get the overrides for a module key
    pub fn get(&self, module_key: &str) -> Option<&MemberOverrides> {
        self.modules.get(module_key)
    }

    /// Get the stored spelling of a module key together with its overrides
    pub fn get_key_value(&self, module_key: &str) -> Option<(&str, &MemberOverrides)> {
        self.modules.get_key_value(module_key)
    }

    /// Buckets in configuration order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &MemberOverrides)> {
        self.modules.iter()
    }

    pub fn module_keys(&self) -> impl Iterator<Item = &str> {
        self.modules.keys()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Render the overlay as JSON, for diagnostics
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing() {
        assert_eq!("event".parse::<OverrideKind>().ok(), Some(OverrideKind::Event));
        assert_eq!(" Config ".parse::<OverrideKind>().ok(), Some(OverrideKind::Config));
        assert!("Method".parse::<OverrideKind>().is_err());
    }

    #[test]
    fn test_case_insensitive_map_keeps_first_spelling() {
        let mut map = CaseInsensitiveMap::new();
        map.insert("CacheSize", 1);
        map.insert("cachesize", 2);
        map.insert("Ttl", 3);

        assert_eq!(map.len(), 2);
        assert_eq!(map.get("CACHESIZE"), Some(&2));
        assert_eq!(map.get_key_value("cachesize"), Some(("CacheSize", &2)));
        assert_eq!(map.keys().collect::<Vec<_>>(), vec!["CacheSize", "Ttl"]);
    }

    #[test]
    fn test_keys_fold_ascii_case_like_member_lookup() {
        let mut map = CaseInsensitiveMap::new();
        map.insert("Élan", 1);

        assert_eq!(map.get("ÉLAN"), Some(&1));
        assert_eq!(map.get("élan").is_some(), "Élan".eq_ignore_ascii_case("élan"));
    }

    #[test]
    fn test_empty_buckets_are_dropped() {
        let mut overlay = ConfigurationOverlay::new();
        overlay.insert("Acme.CacheModule", MemberOverrides::new());
        assert!(overlay.is_empty());

        let mut members = MemberOverrides::new();
        members.insert("Size", OverrideEntry::new("64"));
        overlay.insert("Acme.CacheModule", members);
        assert!(overlay.get("acme.cachemodule").is_some());
    }

    #[test]
    fn test_overlay_json_dump() -> Result<(), CoreError> {
        let mut members = MemberOverrides::new();
        members.insert(
            "Size",
            OverrideEntry::new("64").with_suppress_errors(true),
        );
        let mut overlay = ConfigurationOverlay::new();
        overlay.insert("CacheModule", members);

        let json: serde_json::Value = serde_json::from_str(&overlay.to_json()?)?;
        assert_eq!(json["CacheModule"]["Size"]["Value"], "64");
        assert_eq!(json["CacheModule"]["Size"]["SuppressErrors"], true);
        assert_eq!(json["CacheModule"]["Size"]["Type"], "Auto");
        Ok(())
    }
}
