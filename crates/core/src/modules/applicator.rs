//! Applies the configuration overlay to activated modules.
//!
//! Member names are resolved against the module's [`ModuleType`] before
//! anything is changed. Every failure tied to a single overlay entry is
//! downgraded to a logged skip when the entry sets `SuppressErrors`.

use crate::config::{
    ConfigurationLoader, ConfigurationOverlay, ConversionError, OverrideEntry, OverrideKind,
    ValueConverters,
};
use crate::errors::CoreError;
use crate::modules::matching;
use crate::modules::{
    ActivatedModule, ActivationOptions, EventDescriptor, LibraryCatalog, ModuleType,
    PropertyDescriptor,
};
use std::sync::Arc;

/// Applies per-module configuration during a run
pub trait ConfigureModules: Send + Sync {
    /// Prepare for a run. Called once before any module is configured.
    fn initialize(&mut self, options: &ActivationOptions) -> Result<(), CoreError>;

    /// Configure one module
    fn apply(&self, module: &mut ActivatedModule) -> Result<(), CoreError>;
}

enum Member<'a> {
    Property(&'a PropertyDescriptor),
    Event(&'a EventDescriptor),
}

struct Binding<'a> {
    name: &'a str,
    entry: &'a OverrideEntry,
    member: Member<'a>,
}

/// A parsed `library.Type.method` handler reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandlerReference<'a> {
    pub library: &'a str,
    pub type_name: &'a str,
    pub method: &'a str,
}

impl<'a> HandlerReference<'a> {
    /// Split a handler reference from the right: the last segment is the
    /// method, the one before it the declaring type, the rest the library.
    ///
    /// The library part may only be empty when a hint path locates the library.
    pub fn parse(value: &'a str, hint_path: Option<&str>) -> Option<Self> {
        let mut segments = value.trim().rsplitn(3, '.');
        let method = segments.next().filter(|s| !s.is_empty())?;
        let type_name = segments.next().filter(|s| !s.is_empty())?;
        let library = segments.next().unwrap_or_default();
        if library.is_empty() && hint_path.is_none() {
            return None;
        }
        Some(Self {
            library,
            type_name,
            method,
        })
    }
}

/// Default overlay applicator
#[derive(Debug, Default)]
pub struct ConfigurationApplicator {
    overlay: Option<ConfigurationOverlay>,
    public_only: bool,
    catalog: Arc<LibraryCatalog>,
    converters: Arc<ValueConverters>,
}

impl ConfigurationApplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The overlay loaded by [`initialize`](ConfigureModules::initialize)
    pub fn overlay(&self) -> Option<&ConfigurationOverlay> {
        self.overlay.as_ref()
    }

    fn classify<'a>(
        &self,
        module_type: &'a ModuleType,
        module_key: &str,
        members: impl Iterator<Item = (&'a str, &'a OverrideEntry)>,
    ) -> Result<Vec<Binding<'a>>, CoreError> {
        let mut bindings = Vec::new();
        let mut unresolved = Vec::new();
        let mut unsettable = Vec::new();

        for (name, entry) in members {
            let property = || module_type.property(name, self.public_only).map(Member::Property);
            let event = || module_type.event(name, self.public_only).map(Member::Event);
            let member = match entry.kind {
                OverrideKind::Property => property(),
                OverrideKind::Event => event(),
                OverrideKind::Auto | OverrideKind::Config => property().or_else(event),
            };

            match member {
                None if entry.suppress_errors => {
                    tracing::warn!(
                        "Skipping '{}:{}': no such member on {}",
                        module_key,
                        name,
                        module_type.full_name()
                    );
                }
                None => unresolved.push(name),
                Some(Member::Property(property))
                    if !property.has_usable_setter(self.public_only) =>
                {
                    if entry.suppress_errors {
                        tracing::warn!(
                            "Skipping '{}:{}': property cannot be set",
                            module_key,
                            name
                        );
                    } else {
                        unsettable.push(name);
                    }
                }
                Some(member) => bindings.push(Binding {
                    name,
                    entry,
                    member,
                }),
            }
        }

        if !unresolved.is_empty() {
            let kind = if self.public_only {
                "non-existent or non-public"
            } else {
                "non-existent"
            };
            return Err(CoreError::configuration(format!(
                "Configuration '{}' for module {} refers to {} members: {}",
                module_key,
                module_type.full_name(),
                kind,
                unresolved.join(", ")
            )));
        }

        if !unsettable.is_empty() {
            let kind = if self.public_only {
                "no public setter"
            } else {
                "no setter"
            };
            return Err(CoreError::configuration(format!(
                "Configuration '{}' for module {} targets properties with {}: {}",
                module_key,
                module_type.full_name(),
                kind,
                unsettable.join(", ")
            )));
        }

        Ok(bindings)
    }

    fn set_property(
        &self,
        module: &mut ActivatedModule,
        property: &PropertyDescriptor,
        name: &str,
        entry: &OverrideEntry,
    ) -> Result<(), CoreError> {
        let raw = entry.value.as_deref().unwrap_or_default();
        let value = match entry.value.as_deref() {
            Some(raw) => self.converters.convert(property.value_type(), raw),
            None => Err(ConversionError::new(
                property.value_type().type_name(),
                "",
                "no value supplied",
            )),
        };

        let value = match value {
            Ok(value) => value,
            Err(error) => {
                return suppressible(
                    entry,
                    CoreError::configuration_with_source(
                        format!(
                            "Unable to convert '{}' for property {} of {}",
                            raw,
                            name,
                            module.full_name()
                        ),
                        error,
                    ),
                )
            }
        };

        if !property.assign(module.as_any_mut(), value) {
            return suppressible(
                entry,
                CoreError::configuration(format!(
                    "Property {} of {} does not accept values of type {}",
                    name,
                    module.full_name(),
                    property.value_type()
                )),
            );
        }

        tracing::debug!("Set {}.{} = '{}'", module.name(), name, raw);
        Ok(())
    }

    fn attach_handler(
        &self,
        module: &mut ActivatedModule,
        event: &EventDescriptor,
        name: &str,
        entry: &OverrideEntry,
    ) -> Result<(), CoreError> {
        let value = entry.value.as_deref().unwrap_or_default();
        let hint_path = entry.hint_path.as_deref();

        let Some(reference) = HandlerReference::parse(value, hint_path) else {
            return suppressible(
                entry,
                CoreError::configuration(format!(
                    "Invalid handler name '{}' for event {} of {}: expected library.Type.method",
                    value,
                    name,
                    module.full_name()
                )),
            );
        };

        let Some(library) = self.catalog.load(reference.library, hint_path) else {
            let location = hint_path
                .map(|path| format!(" at '{}'", path))
                .unwrap_or_default();
            return suppressible(
                entry,
                CoreError::configuration(format!(
                    "Unable to load library '{}'{} for event {} of {}",
                    reference.library,
                    location,
                    name,
                    module.full_name()
                )),
            );
        };

        let Some(handler_type) = library.handler_type(reference.type_name) else {
            return suppressible(
                entry,
                CoreError::configuration(format!(
                    "Type '{}' not found in library '{}'",
                    reference.type_name,
                    library.name()
                )),
            );
        };

        let Some(method) = handler_type.find_static_method(reference.method) else {
            return suppressible(
                entry,
                CoreError::configuration(format!(
                    "'{}' on {}: no such static method found",
                    reference.method,
                    handler_type.full_name()
                )),
            );
        };

        if !method.is_compatible_with(event.argument_type())
            || !event.attach(module.as_any_mut(), method.handler())
        {
            return suppressible(
                entry,
                CoreError::configuration(format!(
                    "{}.{} is not a compatible event handler for event {} of {}",
                    handler_type.full_name(),
                    method.name(),
                    name,
                    module.full_name()
                )),
            );
        }

        tracing::debug!(
            "Attached {}.{} to {}.{}",
            handler_type.full_name(),
            method.name(),
            module.name(),
            name
        );
        Ok(())
    }
}

impl ConfigureModules for ConfigurationApplicator {
    fn initialize(&mut self, options: &ActivationOptions) -> Result<(), CoreError> {
        self.overlay = ConfigurationLoader::load(options)?;
        self.public_only = options.public_only();
        self.catalog = options.shared_catalog();
        self.converters = options.shared_converters();
        Ok(())
    }

    fn apply(&self, module: &mut ActivatedModule) -> Result<(), CoreError> {
        let Some(overlay) = self.overlay.as_ref() else {
            return Ok(());
        };

        let module_type = Arc::clone(module.module_type());
        let Some(matched) = matching::resolve(overlay, &module_type) else {
            tracing::debug!("No configuration applies to {}", module_type.full_name());
            return Ok(());
        };
        tracing::debug!(
            "Configuring {} from '{}' ({:?})",
            module_type.full_name(),
            matched.key,
            matched.kind
        );

        let bindings = self.classify(&module_type, matched.key, matched.members.iter())?;
        for binding in &bindings {
            match binding.member {
                Member::Property(property) => {
                    self.set_property(module, property, binding.name, binding.entry)?
                }
                Member::Event(event) => {
                    self.attach_handler(module, event, binding.name, binding.entry)?
                }
            }
        }

        tracing::info!(
            "Configured module {} with {} overrides",
            module_type.full_name(),
            bindings.len()
        );
        Ok(())
    }
}

fn suppressible(entry: &OverrideEntry, error: CoreError) -> Result<(), CoreError> {
    if entry.suppress_errors {
        tracing::warn!("Ignoring suppressed configuration error: {}", error);
        Ok(())
    } else {
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Configuration;
    use crate::container::ServiceCollection;
    use crate::modules::{
        Event, HandlerType, Library, Module, ModuleDefinition, ModuleError, Visibility,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};

    static STARTED_CALLS: AtomicUsize = AtomicUsize::new(0);

    #[derive(Default)]
    struct CacheModule {
        size: u32,
        name: String,
        enabled: bool,
        secret: String,
        started: Event<String>,
        evicted: Event<u64>,
    }

    impl Module for CacheModule {
        fn configure_services(&self, _services: &mut ServiceCollection) -> Result<(), ModuleError> {
            Ok(())
        }
    }

    impl ModuleDefinition for CacheModule {
        fn module_type() -> ModuleType {
            ModuleType::builder::<Self>()
                .full_name("Acme.Caching.CacheModule")
                .constructor0(Self::default)
                .property("Size", |m: &mut Self, v: u32| m.size = v)
                .property("Name", |m: &mut Self, v: String| m.name = v)
                .property("Enabled", |m: &mut Self, v: bool| m.enabled = v)
                .with_property(
                    PropertyDescriptor::new("Secret", |m: &mut Self, v: String| m.secret = v)
                        .with_setter_visibility(Visibility::NonPublic),
                )
                .read_only::<String>("Engine")
                .event("Started", |m: &mut Self| &mut m.started)
                .event("Evicted", |m: &mut Self| &mut m.evicted)
                .build()
        }
    }

    fn catalog() -> LibraryCatalog {
        LibraryCatalog::new().with_library(
            Library::new("Acme.Hooks").with_path("plugins/hooks").with_handler_type(
                HandlerType::new("Acme.Hooks.Lifecycle")
                    .method("OnStarted", |_: &String| {
                        STARTED_CALLS.fetch_add(1, Ordering::SeqCst);
                    })
                    .private_method("OnStartedQuietly", |_: &String| {}),
            ),
        )
    }

    fn applicator(yaml: &str, public_only: bool) -> Result<ConfigurationApplicator, CoreError> {
        let options = ActivationOptions::builder()
            .catalog(catalog())
            .public_only(public_only)
            .configuration(Configuration::from_yaml_str(yaml)?)
            .build()?;
        let mut applicator = ConfigurationApplicator::new();
        applicator.initialize(&options)?;
        Ok(applicator)
    }

    fn configure(yaml: &str, public_only: bool) -> Result<ActivatedModule, CoreError> {
        let mut module = ActivatedModule::from_instance(CacheModule::default());
        applicator(yaml, public_only)?.apply(&mut module)?;
        Ok(module)
    }

    fn cache(module: &ActivatedModule) -> &CacheModule {
        module.downcast_ref::<CacheModule>().unwrap()
    }

    fn message(result: Result<ActivatedModule, CoreError>) -> String {
        match result {
            Err(CoreError::Configuration { message, .. }) => message,
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }
    }

    #[test]
    fn test_primitive_properties_are_converted() -> Result<(), CoreError> {
        let module = configure(
            r#"
Modules:
  configuration:
    CacheModule:
      size: "42"
      Name: hello
      ENABLED: "true"
"#,
            false,
        )?;

        let cache = cache(&module);
        assert_eq!(cache.size, 42);
        assert_eq!(cache.name, "hello");
        assert!(cache.enabled);
        Ok(())
    }

    #[test]
    fn test_conversion_failure_respects_suppression() -> Result<(), CoreError> {
        let failing = configure(
            r#"
Modules:
  configuration:
    CacheModule:
      Size:
        Value: not-an-int
        SuppressErrors: false
"#,
            false,
        );
        match failing {
            Err(CoreError::Configuration { source, .. }) => assert!(source.is_some()),
            other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
        }

        let suppressed = configure(
            r#"
Modules:
  configuration:
    CacheModule:
      Size:
        Value: not-an-int
        SuppressErrors: true
      Name: kept
"#,
            false,
        )?;
        assert_eq!(cache(&suppressed).size, 0);
        assert_eq!(cache(&suppressed).name, "kept");
        Ok(())
    }

    #[test]
    fn test_unresolved_members_are_listed() {
        let yaml = r#"
Modules:
  configuration:
    CacheModule:
      Missing: 1
      AlsoMissing: 2
      Skipped:
        Value: 3
        SuppressErrors: true
"#;
        let message_all = message(configure(yaml, false));
        assert!(message_all.contains("non-existent members: Missing, AlsoMissing"));

        let message_public = message(configure(yaml, true));
        assert!(message_public.contains("non-existent or non-public members"));
    }

    #[test]
    fn test_kind_restricts_member_lookup() {
        let message = message(configure(
            r#"
Modules:
  configuration:
    CacheModule:
      Started:
        Value: "1"
        Type: Property
"#,
            false,
        ));
        assert!(message.contains("Started"));
    }

    #[test]
    fn test_setter_guards() -> Result<(), CoreError> {
        let read_only = message(configure(
            r#"
Modules:
  configuration:
    CacheModule:
      Engine: redis
"#,
            false,
        ));
        assert!(read_only.contains("no setter: Engine"));

        let yaml = r#"
Modules:
  configuration:
    CacheModule:
      Secret: hunter2
"#;
        let public_only = message(configure(yaml, true));
        assert!(public_only.contains("no public setter: Secret"));

        let module = configure(yaml, false)?;
        assert_eq!(cache(&module).secret, "hunter2");
        Ok(())
    }

    #[test]
    fn test_event_handler_is_attached() -> Result<(), CoreError> {
        let mut module = configure(
            r#"
Modules:
  configuration:
    "Acme.*":
      Started:
        Value: Acme.Hooks.Lifecycle.OnStarted
        Type: Event
"#,
            false,
        )?;

        let before = STARTED_CALLS.load(Ordering::SeqCst);
        let cache = module.downcast_mut::<CacheModule>().unwrap();
        assert_eq!(cache.started.handler_count(), 1);
        cache.started.emit(&"warm".to_string());
        assert!(STARTED_CALLS.load(Ordering::SeqCst) > before);
        Ok(())
    }

    #[test]
    fn test_non_public_static_method_resolves_with_hint_path() -> Result<(), CoreError> {
        let module = configure(
            r#"
Modules:
  configuration:
    CacheModule:
      Started:
        Value: Lifecycle.OnStartedQuietly
        HintPath: plugins/hooks
"#,
            true,
        )?;
        assert_eq!(cache(&module).started.handler_count(), 1);
        Ok(())
    }

    #[test]
    fn test_each_event_failure_is_reported() {
        let cases = [
            ("OnStarted", "Invalid handler name"),
            ("Missing.Lifecycle.OnStarted", "Unable to load library 'Missing'"),
            ("Acme.Hooks.Nope.OnStarted", "Type 'Nope' not found"),
            ("Acme.Hooks.Lifecycle.Nope", "no such static method found"),
        ];
        for (value, expected) in cases {
            let yaml = format!(
                "Modules:\n  configuration:\n    CacheModule:\n      Started: {}\n",
                value
            );
            let message = message(configure(&yaml, false));
            assert!(message.contains(expected), "{} -> {}", value, message);
        }

        let incompatible = message(configure(
            r#"
Modules:
  configuration:
    CacheModule:
      Evicted: Acme.Hooks.Lifecycle.OnStarted
"#,
            false,
        ));
        assert!(incompatible.contains("not a compatible event handler"));
    }

    #[test]
    fn test_suppressed_failures_leave_module_untouched() {
        let cases = [
            ("Started", "OnStarted", false),
            ("Started", "Missing.Lifecycle.OnStarted", false),
            ("Started", "Acme.Hooks.Nope.OnStarted", false),
            ("Started", "Acme.Hooks.Lifecycle.Nope", false),
            ("Evicted", "Acme.Hooks.Lifecycle.OnStarted", false),
            ("Engine", "redis", false),
            ("Secret", "hunter2", true),
        ];
        for (member, value, public_only) in cases {
            let yaml = format!(
                "Modules:\n  configuration:\n    CacheModule:\n      {}:\n        Value: {}\n        SuppressErrors: true\n",
                member, value
            );
            let module = configure(&yaml, public_only).unwrap();
            let cache = cache(&module);

            assert!(cache.started.is_empty(), "{} = {}", member, value);
            assert!(cache.evicted.is_empty(), "{} = {}", member, value);
            assert!(cache.secret.is_empty(), "{} = {}", member, value);
        }
    }

    #[test]
    fn test_handler_reference_parsing() {
        assert_eq!(
            HandlerReference::parse("Acme.Hooks.Lifecycle.OnStarted", None),
            Some(HandlerReference {
                library: "Acme.Hooks",
                type_name: "Lifecycle",
                method: "OnStarted",
            })
        );
        assert_eq!(HandlerReference::parse("Lifecycle.OnStarted", None), None);
        assert!(HandlerReference::parse("Lifecycle.OnStarted", Some("plugins/hooks")).is_some());
        assert_eq!(HandlerReference::parse("Acme.Lifecycle.", None), None);
    }

    #[test]
    fn test_no_configuration_is_a_no_op() -> Result<(), CoreError> {
        let options = ActivationOptions::builder().build()?;
        let mut applicator = ConfigurationApplicator::new();
        applicator.initialize(&options)?;

        let mut module = ActivatedModule::from_instance(CacheModule::default());
        applicator.apply(&mut module)?;
        assert!(applicator.overlay().is_none());
        assert_eq!(cache(&module).size, 0);
        Ok(())
    }
}
