use crate::config::{
    ConfigSection, Configuration, ConfigurationOverlay, MemberOverrides, OverrideEntry,
    OverrideKind,
};
use crate::errors::CoreError;
use crate::modules::ActivationOptions;

/// Default configuration section holding module settings
pub const DEFAULT_SECTION_KEY: &str = "Modules";
/// Sub-section with module key → member overrides
pub const CONFIGURATION_SECTION: &str = "configuration";
/// Sub-section listing extra module types to activate
pub const ADD_SECTION: &str = "add";
/// Sub-section listing module types to exclude
pub const SKIP_SECTION: &str = "skip";

const VALUE_FIELD: &str = "Value";
const SUPPRESS_ERRORS_FIELD: &str = "SuppressErrors";
const TYPE_FIELD: &str = "Type";
const HINT_PATH_FIELD: &str = "HintPath";

/// Reads the `<section>:configuration` tree into a [`ConfigurationOverlay`]
#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigurationLoader;

impl ConfigurationLoader {
    /// Load the overlay for a run. Returns `None` when no configuration was supplied.
    pub fn load(options: &ActivationOptions) -> Result<Option<ConfigurationOverlay>, CoreError> {
        match options.configuration() {
            Some(configuration) => {
                Self::load_section(configuration, options.section_key()).map(Some)
            }
            None => {
                tracing::debug!("No configuration supplied, module overlay disabled");
                Ok(None)
            }
        }
    }

    /// Load the overlay stored under `section_key`
    pub fn load_section(
        configuration: &Configuration,
        section_key: &str,
    ) -> Result<ConfigurationOverlay, CoreError> {
        let section_key = validate_section_key(section_key)?;
        let root = configuration.section(section_key).section(CONFIGURATION_SECTION);

        let mut overlay = ConfigurationOverlay::new();
        for bucket in root.children() {
            let mut members = MemberOverrides::new();
            for member in bucket.children() {
                if let Some(entry) = read_entry(configuration, bucket.key(), &member)? {
                    members.insert(member.key(), entry);
                }
            }
            overlay.insert(bucket.key(), members);
        }

        tracing::debug!(
            "Loaded configuration overlay with {} module keys from '{}'",
            overlay.len(),
            root.path()
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            if let Ok(json) = overlay.to_json() {
                tracing::trace!("Configuration overlay: {}", json);
            }
        }
        Ok(overlay)
    }
}

/// Reject a blank section key
pub fn validate_section_key(section_key: &str) -> Result<&str, CoreError> {
    let trimmed = section_key.trim();
    if trimmed.is_empty() {
        return Err(CoreError::configuration(
            "The module configuration section key must not be empty",
        ));
    }
    Ok(trimmed)
}

/// Parse a boolean flag, treating anything unparsable as `false`
pub(crate) fn parse_flag(value: Option<&str>) -> bool {
    value
        .map(|raw| raw.trim().eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

fn read_entry(
    configuration: &Configuration,
    module_key: &str,
    member: &ConfigSection<'_>,
) -> Result<Option<OverrideEntry>, CoreError> {
    if let Some(value) = member.value() {
        return Ok(Some(OverrideEntry::new(value)));
    }

    let mut entry = OverrideEntry {
        value: member.get(VALUE_FIELD).map(str::to_string),
        suppress_errors: parse_flag(member.get(SUPPRESS_ERRORS_FIELD)),
        kind: member
            .get(TYPE_FIELD)
            .and_then(|raw| raw.parse().ok())
            .unwrap_or_default(),
        hint_path: member.get(HINT_PATH_FIELD).map(str::to_string),
    };

    if entry.kind == OverrideKind::Config {
        let resolved = entry
            .value
            .as_deref()
            .and_then(|key| configuration.get(key));
        match resolved {
            Some(value) => {
                entry.value = Some(value.to_string());
                entry.kind = OverrideKind::Auto;
            }
            None if entry.suppress_errors => {
                tracing::warn!(
                    "Dropping override '{}:{}': configuration key '{}' not found",
                    module_key,
                    member.key(),
                    entry.value.as_deref().unwrap_or_default()
                );
                return Ok(None);
            }
            None => {
                return Err(CoreError::configuration(format!(
                    "Unable to resolve configuration key '{}' referenced by '{}:{}'",
                    entry.value.as_deref().unwrap_or_default(),
                    module_key,
                    member.key()
                )));
            }
        }
    }

    Ok(Some(entry))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> Result<ConfigurationOverlay, CoreError> {
        let configuration = Configuration::from_yaml_str(yaml)?;
        ConfigurationLoader::load_section(&configuration, DEFAULT_SECTION_KEY)
    }

    #[test]
    fn test_shorthand_and_structured_entries() -> Result<(), CoreError> {
        let overlay = load(
            r#"
Modules:
  configuration:
    CacheModule:
      Size: 64
      Started:
        Value: Acme.Handlers.Startup.OnStarted
        Type: Event
        SuppressErrors: "True"
        HintPath: plugins/acme
"#,
        )?;

        let members = overlay.get("cachemodule");
        let size = members.and_then(|m| m.get("size"));
        assert_eq!(size, Some(&OverrideEntry::new("64")));

        let started = members.and_then(|m| m.get("Started"));
        assert_eq!(
            started,
            Some(
                &OverrideEntry::new("Acme.Handlers.Startup.OnStarted")
                    .with_kind(OverrideKind::Event)
                    .with_suppress_errors(true)
                    .with_hint_path("plugins/acme")
            )
        );
        Ok(())
    }

    #[test]
    fn test_scalar_member_stays_shorthand_when_layered() {
        let configuration = Configuration::builder()
            .add_yaml("Modules:\n  configuration:\n    Foo:\n      Size: 64\n")
            .add_in_memory([("Modules:configuration:Foo:Size:SuppressErrors", "true")])
            .build()
            .unwrap();

        let overlay = ConfigurationLoader::load_section(&configuration, DEFAULT_SECTION_KEY).unwrap();
        let entry = overlay.get("Foo").and_then(|m| m.get("Size"));
        assert_eq!(entry, Some(&OverrideEntry::new("64")));
    }

    #[test]
    fn test_unparsable_flags_fall_back_to_defaults() -> Result<(), CoreError> {
        let overlay = load(
            r#"
Modules:
  configuration:
    CacheModule:
      Size:
        Value: "8"
        SuppressErrors: maybe
        Type: Method
"#,
        )?;

        let entry = overlay.get("CacheModule").and_then(|m| m.get("Size"));
        assert_eq!(entry, Some(&OverrideEntry::new("8")));
        Ok(())
    }

    #[test]
    fn test_config_kind_is_resolved_eagerly() -> Result<(), CoreError> {
        let overlay = load(
            r#"
ConnectionStrings:
  Cache: redis://localhost
Modules:
  configuration:
    CacheModule:
      Endpoint:
        Value: ConnectionStrings:Cache
        Type: Config
"#,
        )?;

        let entry = overlay.get("CacheModule").and_then(|m| m.get("Endpoint"));
        assert_eq!(entry, Some(&OverrideEntry::new("redis://localhost")));
        Ok(())
    }

    #[test]
    fn test_unresolved_config_key_fails_unless_suppressed() -> Result<(), CoreError> {
        let failing = load(
            r#"
Modules:
  configuration:
    CacheModule:
      Endpoint:
        Value: ConnectionStrings:Missing
        Type: Config
"#,
        );
        assert!(
            matches!(failing, Err(CoreError::Configuration { ref message, .. }) if message.contains("ConnectionStrings:Missing"))
        );

        let suppressed = load(
            r#"
Modules:
  configuration:
    CacheModule:
      Endpoint:
        Value: ConnectionStrings:Missing
        Type: Config
        SuppressErrors: true
"#,
        )?;
        assert!(suppressed.get("CacheModule").is_none());
        Ok(())
    }

    #[test]
    fn test_blank_section_key() -> Result<(), CoreError> {
        let configuration = Configuration::from_pairs([("Modules:configuration:A:B", "1")]);
        let result = ConfigurationLoader::load_section(&configuration, "  ");
        assert!(matches!(result, Err(CoreError::Configuration { .. })));
        Ok(())
    }

    #[test]
    fn test_missing_section_yields_empty_overlay() -> Result<(), CoreError> {
        let configuration = Configuration::from_pairs([("Logging:Level", "debug")]);
        let overlay = ConfigurationLoader::load_section(&configuration, DEFAULT_SECTION_KEY)?;
        assert!(overlay.is_empty());
        Ok(())
    }
}
