use crate::config::loader::parse_flag;
use crate::config::{
    validate_section_key, ConfigSection, Configuration, HostEnvironment, ValueConverters,
    ADD_SECTION, DEFAULT_SECTION_KEY, SKIP_SECTION,
};
use crate::errors::CoreError;
use crate::modules::{LibraryCatalog, ModuleDefinition, ModuleInstance, ModuleType, ResolvedType};
use crate::providers::{ProviderPool, ProviderRegistration, TypeKey};
use std::sync::Arc;

const FULL_NAME_FIELD: &str = "FullName";
const SUPPRESS_ERRORS_FIELD: &str = "SuppressErrors";
const HINT_PATH_FIELD: &str = "HintPath";

/// Everything one activation pass needs
pub struct ActivationOptions {
    module_types: Vec<Arc<ModuleType>>,
    instances: Vec<ModuleInstance>,
    providers: ProviderPool,
    public_only: bool,
    environment: Option<Arc<dyn HostEnvironment>>,
    configuration: Option<Arc<Configuration>>,
    section_key: String,
    catalog: Arc<LibraryCatalog>,
    converters: Arc<ValueConverters>,
}

impl ActivationOptions {
    pub fn builder() -> ActivationOptionsBuilder {
        ActivationOptionsBuilder::new()
    }

    /// Module types to instantiate, in registration order
    pub fn module_types(&self) -> &[Arc<ModuleType>] {
        &self.module_types
    }

    /// Pre-built module instances, taking precedence over their types
    pub fn instances(&self) -> &[ModuleInstance] {
        &self.instances
    }

    pub fn providers(&self) -> &ProviderPool {
        &self.providers
    }

    /// Only public types and members take part in activation and configuration
    pub fn public_only(&self) -> bool {
        self.public_only
    }

    pub fn environment(&self) -> Option<&Arc<dyn HostEnvironment>> {
        self.environment.as_ref()
    }

    pub fn configuration(&self) -> Option<&Configuration> {
        self.configuration.as_deref()
    }

    pub fn section_key(&self) -> &str {
        &self.section_key
    }

    pub fn catalog(&self) -> &LibraryCatalog {
        &self.catalog
    }

    pub fn converters(&self) -> &ValueConverters {
        &self.converters
    }

    pub(crate) fn shared_catalog(&self) -> Arc<LibraryCatalog> {
        Arc::clone(&self.catalog)
    }

    pub(crate) fn shared_converters(&self) -> Arc<ValueConverters> {
        Arc::clone(&self.converters)
    }
}

impl std::fmt::Debug for ActivationOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivationOptions")
            .field(
                "module_types",
                &self
                    .module_types
                    .iter()
                    .map(|module_type| module_type.full_name())
                    .collect::<Vec<_>>(),
            )
            .field("instances", &self.instances)
            .field("providers", &self.providers)
            .field("public_only", &self.public_only)
            .field(
                "environment",
                &self.environment.as_ref().map(|e| e.environment_name().to_string()),
            )
            .field("has_configuration", &self.configuration.is_some())
            .field("section_key", &self.section_key)
            .finish()
    }
}

/// Builder for [`ActivationOptions`]
pub struct ActivationOptionsBuilder {
    module_types: Vec<Arc<ModuleType>>,
    module_names: Vec<String>,
    libraries: Vec<String>,
    instances: Vec<ModuleInstance>,
    providers: ProviderPool,
    public_only: bool,
    environment: Option<(TypeKey, Arc<dyn HostEnvironment>)>,
    configuration: Option<Arc<Configuration>>,
    section_key: String,
    catalog: Arc<LibraryCatalog>,
    converters: Arc<ValueConverters>,
}

impl ActivationOptionsBuilder {
    pub fn new() -> Self {
        Self {
            module_types: Vec::new(),
            module_names: Vec::new(),
            libraries: Vec::new(),
            instances: Vec::new(),
            providers: ProviderPool::new(),
            public_only: false,
            environment: None,
            configuration: None,
            section_key: DEFAULT_SECTION_KEY.to_string(),
            catalog: Arc::new(LibraryCatalog::new()),
            converters: Arc::new(ValueConverters::new()),
        }
    }

    /// Activate the self-describing module type `M`
    pub fn module<M: ModuleDefinition>(self) -> Self {
        self.module_type(M::module_type())
    }

    pub fn module_type(mut self, module_type: ModuleType) -> Self {
        self.module_types.push(Arc::new(module_type));
        self
    }

    /// Activate a module type resolved by full name from the catalog
    pub fn module_name(mut self, full_name: impl Into<String>) -> Self {
        self.module_names.push(full_name.into());
        self
    }

    /// Activate every module type of a catalog library
    pub fn discover(mut self, library: impl Into<String>) -> Self {
        self.libraries.push(library.into());
        self
    }

    /// Use a pre-built instance instead of constructing its type
    pub fn instance<M: ModuleDefinition + Clone>(mut self, module: M) -> Self {
        self.instances.push(ModuleInstance::new(module));
        self
    }

    pub fn module_instance(mut self, instance: ModuleInstance) -> Self {
        self.instances.push(instance);
        self
    }

    /// Add a constructor argument provider. The first provider of a type wins.
    pub fn provider<T: Send + Sync + 'static>(mut self, value: T) -> Self {
        self.providers.add(value);
        self
    }

    pub fn shared_provider<T: ?Sized + Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.providers.add_shared(value);
        self
    }

    pub fn register_provider<T: ?Sized + Send + Sync + 'static>(
        mut self,
        registration: ProviderRegistration<T>,
    ) -> Self {
        self.providers.register(registration);
        self
    }

    pub fn public_only(mut self, public_only: bool) -> Self {
        self.public_only = public_only;
        self
    }

    /// Set the environment handle. It is also offered to constructors as
    /// both its own type and `dyn HostEnvironment`, replacing any earlier one.
    pub fn environment<E: HostEnvironment + 'static>(mut self, environment: E) -> Self {
        let environment = Arc::new(environment);
        self.forget_environment();
        self.providers.replace(
            ProviderRegistration::shared(Arc::clone(&environment))
                .assignable_to(|e| e as Arc<dyn HostEnvironment>),
        );
        let environment: Arc<dyn HostEnvironment> = environment;
        self.environment = Some((TypeKey::of::<E>(), environment));
        self
    }

    pub fn shared_environment(mut self, environment: Arc<dyn HostEnvironment>) -> Self {
        self.forget_environment();
        self.providers
            .replace(ProviderRegistration::shared(Arc::clone(&environment)));
        self.environment = Some((TypeKey::of::<dyn HostEnvironment>(), environment));
        self
    }

    fn forget_environment(&mut self) {
        if let Some((key, _)) = self.environment.take() {
            self.providers.remove(&key);
        }
    }

    /// Set the configuration handle, also offered to constructors
    pub fn configuration(self, configuration: Configuration) -> Self {
        self.shared_configuration(Arc::new(configuration))
    }

    pub fn shared_configuration(mut self, configuration: Arc<Configuration>) -> Self {
        self.providers
            .replace(ProviderRegistration::shared(Arc::clone(&configuration)));
        self.configuration = Some(configuration);
        self
    }

    pub fn section_key(mut self, section_key: impl Into<String>) -> Self {
        self.section_key = section_key.into();
        self
    }

    pub fn catalog(self, catalog: LibraryCatalog) -> Self {
        self.shared_catalog(Arc::new(catalog))
    }

    pub fn shared_catalog(mut self, catalog: Arc<LibraryCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    pub fn converters(mut self, converters: ValueConverters) -> Self {
        self.converters = Arc::new(converters);
        self
    }

    /// Resolve names, discovered libraries and the `add`/`skip` sections
    pub fn build(mut self) -> Result<ActivationOptions, CoreError> {
        let mut module_types = std::mem::take(&mut self.module_types);

        for library in &self.libraries {
            if self.catalog.load(library, None).is_none() {
                return Err(CoreError::configuration(format!(
                    "Library '{}' is not registered in the catalog",
                    library
                )));
            }
            module_types.extend(self.catalog.discover_modules(library));
        }

        for name in &self.module_names {
            module_types.push(self.resolve_explicit(name)?);
        }

        let mut skipped = Vec::new();
        if let Some(configuration) = self.configuration.as_deref() {
            let section_key = validate_section_key(&self.section_key)?;
            let section = configuration.section(section_key);
            module_types.extend(self.resolve_additions(&section.section(ADD_SECTION))?);
            skipped = section
                .section(SKIP_SECTION)
                .children()
                .iter()
                .filter_map(|entry| entry.value().map(str::trim).map(str::to_string))
                .filter(|name| !name.is_empty())
                .collect();
        }

        let mut seen: Vec<String> = Vec::new();
        module_types.retain(|module_type| {
            let name = module_type.full_name().to_ascii_lowercase();
            if seen.contains(&name) {
                return false;
            }
            seen.push(name);
            true
        });

        let mut instances = self.instances;
        if !skipped.is_empty() {
            let is_skipped =
                |full_name: &str| skipped.iter().any(|name| name.eq_ignore_ascii_case(full_name));
            module_types.retain(|module_type| {
                let skip = is_skipped(module_type.full_name());
                if skip {
                    tracing::debug!("Skipping module type {}", module_type.full_name());
                }
                !skip
            });
            instances.retain(|module| !is_skipped(module.full_name()));
        }

        Ok(ActivationOptions {
            module_types,
            instances,
            providers: self.providers,
            public_only: self.public_only,
            environment: self.environment.map(|(_, environment)| environment),
            configuration: self.configuration,
            section_key: self.section_key,
            catalog: self.catalog,
            converters: self.converters,
        })
    }

    fn resolve_explicit(&self, name: &str) -> Result<Arc<ModuleType>, CoreError> {
        match self.catalog.find_type(name, None) {
            Some(ResolvedType::Module(module_type)) => Ok(module_type),
            Some(ResolvedType::Other(full_name)) => Err(invalid_module_type(&full_name)),
            None => Err(CoreError::configuration(format!(
                "Module type '{}' could not be found",
                name
            ))),
        }
    }

    fn resolve_additions(
        &self,
        section: &ConfigSection<'_>,
    ) -> Result<Vec<Arc<ModuleType>>, CoreError> {
        let mut resolved = Vec::new();
        let mut unresolved = Vec::new();

        for entry in section.children() {
            let (full_name, suppress_errors, hint_path) = if entry.has_children() {
                (
                    entry.get(FULL_NAME_FIELD),
                    parse_flag(entry.get(SUPPRESS_ERRORS_FIELD)),
                    entry.get(HINT_PATH_FIELD),
                )
            } else {
                (entry.value(), false, None)
            };

            let Some(full_name) = full_name.map(str::trim).filter(|name| !name.is_empty()) else {
                if !suppress_errors {
                    unresolved.push(format!("<entry {}>", entry.key()));
                }
                continue;
            };

            match self.catalog.find_type(full_name, hint_path) {
                Some(ResolvedType::Module(module_type)) => {
                    tracing::debug!("Adding module type {} from configuration", full_name);
                    resolved.push(module_type);
                }
                Some(ResolvedType::Other(_)) if suppress_errors => {
                    tracing::warn!("Ignoring '{}' from '{}': not a module type", full_name, section.path());
                }
                Some(ResolvedType::Other(_)) => return Err(invalid_module_type(full_name)),
                None if suppress_errors => {
                    tracing::warn!("Ignoring unresolved module type '{}' from '{}'", full_name, section.path());
                }
                None => unresolved.push(full_name.to_string()),
            }
        }

        if !unresolved.is_empty() {
            return Err(CoreError::configuration(format!(
                "Unable to resolve module types listed in '{}': {}",
                section.path(),
                unresolved.join(", ")
            )));
        }
        Ok(resolved)
    }
}

impl Default for ActivationOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn invalid_module_type(full_name: &str) -> CoreError {
    CoreError::configuration(format!(
        "Type '{}' does not implement the module capability",
        full_name
    ))
}
