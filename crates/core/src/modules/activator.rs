//! Module activation
//!
//! Turns the module types of an [`ActivationOptions`] into instances by
//! picking, per type, the longest constructor whose parameters the provider
//! pool can satisfy. Pre-built instances take precedence over their type and
//! the combined list is ordered by descending priority.

use crate::errors::CoreError;
use crate::modules::{ActivatedModule, ActivationOptions, Constructor, ConstructorArguments, ModuleType};
use crate::providers::{ProviderPool, TypeKey};
use std::sync::Arc;

/// Produces the ordered module list for a run
pub trait ActivateModules: Send + Sync {
    /// Build every module of the options. Repeated calls yield equivalent lists.
    fn activate(&self, options: &ActivationOptions) -> Result<Vec<ActivatedModule>, CoreError>;
}

/// Default activator using best-fit constructor matching
#[derive(Debug, Default, Clone, Copy)]
pub struct ModuleActivator;

impl ModuleActivator {
    pub fn new() -> Self {
        Self
    }

    /// Pick the constructor with the most parameters that the pool can satisfy.
    ///
    /// Constructors needing more arguments than there are allowed types are
    /// never considered. Among equally long candidates the first declared wins.
    pub fn select_constructor<'a>(
        module_type: &'a ModuleType,
        providers: &ProviderPool,
    ) -> Result<&'a Constructor, CoreError> {
        let available = providers.len();
        let mut selected: Option<&Constructor> = None;

        for constructor in module_type.constructors() {
            if constructor.arity() > available {
                continue;
            }
            if !constructor
                .parameters()
                .iter()
                .all(|parameter| providers.is_satisfiable(parameter))
            {
                continue;
            }
            if selected.map_or(true, |current| constructor.arity() > current.arity()) {
                selected = Some(constructor);
            }
        }

        selected.ok_or_else(|| {
            CoreError::activation(format!(
                "Module type '{}' has no constructor satisfiable by the available providers. Allowed argument types: {}",
                module_type.full_name(),
                describe_types(&providers.allowed_types())
            ))
        })
    }

    /// Construct one module of `module_type`
    pub fn instantiate(
        module_type: &Arc<ModuleType>,
        providers: &ProviderPool,
    ) -> Result<ActivatedModule, CoreError> {
        let constructor = Self::select_constructor(module_type, providers)?;

        let mut values = Vec::with_capacity(constructor.arity());
        for parameter in constructor.parameters() {
            let value = providers.select(parameter).ok_or_else(|| {
                CoreError::activation(format!(
                    "No provider of type {} is available for module type '{}'",
                    parameter,
                    module_type.full_name()
                ))
            })?;
            tracing::debug!(
                "Binding {} for constructor of {}",
                parameter,
                module_type.full_name()
            );
            values.push(value);
        }

        let arguments =
            ConstructorArguments::new(module_type.full_name(), constructor.parameters(), values);
        let module = constructor.invoke(&arguments)?;
        Ok(ActivatedModule::new(Arc::clone(module_type), module))
    }
}

impl ActivateModules for ModuleActivator {
    fn activate(&self, options: &ActivationOptions) -> Result<Vec<ActivatedModule>, CoreError> {
        let provided: Vec<&str> = options
            .instances()
            .iter()
            .map(|instance| instance.full_name())
            .collect();

        let mut modules =
            Vec::with_capacity(options.module_types().len() + options.instances().len());
        for module_type in options.module_types() {
            if options.public_only() && !module_type.is_public() {
                tracing::debug!("Ignoring non-public module type {}", module_type.full_name());
                continue;
            }
            if provided
                .iter()
                .any(|name| name.eq_ignore_ascii_case(module_type.full_name()))
            {
                tracing::debug!(
                    "Module type {} already has an instance, not constructing",
                    module_type.full_name()
                );
                continue;
            }
            modules.push(Self::instantiate(module_type, options.providers())?);
        }
        modules.extend(options.instances().iter().map(|instance| instance.activate()));

        modules.sort_by(|a, b| b.priority().cmp(&a.priority()));

        for module in &modules {
            tracing::info!(
                "Activated module {} (priority {})",
                module.full_name(),
                module.priority()
            );
        }
        Ok(modules)
    }
}

fn describe_types(types: &[TypeKey]) -> String {
    if types.is_empty() {
        return "(none)".to_string();
    }
    types
        .iter()
        .map(|key| key.type_name())
        .collect::<Vec<_>>()
        .join(", ")
}
