//! Run orchestration
//!
//! A run activates the modules, drops those not targeting the current
//! environment, prepares the configurator once and then configures and
//! registers each module in priority order. The first unsuppressed error
//! stops the run; work already done for earlier modules is kept.

use crate::container::ServiceCollection;
use crate::errors::CoreError;
use crate::modules::{
    ActivateModules, ActivatedModule, ActivationOptions, ConfigurationApplicator,
    ConfigureModules, ModuleActivator,
};
use serde::Serialize;

/// What happened during a run
#[derive(Debug, Default, Serialize)]
pub struct RunReport {
    /// Environment the run was filtered on
    pub environment: Option<String>,
    /// Every activated module, in priority order
    pub activated: Vec<String>,
    /// Modules dropped because they target other environments
    pub skipped: Vec<String>,
    /// Modules whose registration callback completed
    pub registered: Vec<String>,
    #[serde(skip)]
    modules: Vec<ActivatedModule>,
}

impl RunReport {
    /// The configured and registered modules
    pub fn modules(&self) -> &[ActivatedModule] {
        &self.modules
    }

    pub fn into_modules(self) -> Vec<ActivatedModule> {
        self.modules
    }

    /// Render the report as JSON
    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Runs activation, environment filtering, configuration and registration
pub struct ModuleHost {
    activator: Box<dyn ActivateModules>,
    configurator: Box<dyn ConfigureModules>,
}

impl ModuleHost {
    pub fn new() -> Self {
        Self::with_components(
            Box::new(ModuleActivator::new()),
            Box::new(ConfigurationApplicator::new()),
        )
    }

    /// Create a host with custom collaborators
    pub fn with_components(
        activator: Box<dyn ActivateModules>,
        configurator: Box<dyn ConfigureModules>,
    ) -> Self {
        Self {
            activator,
            configurator,
        }
    }

    /// Execute one run, registering services into `services`
    pub fn run(
        &mut self,
        options: ActivationOptions,
        services: &mut ServiceCollection,
    ) -> Result<RunReport, CoreError> {
        let mut report = RunReport::default();

        let activated = self.activator.activate(&options)?;
        report.activated = activated.iter().map(|m| m.full_name().to_string()).collect();

        let modules = match options.environment() {
            Some(environment) => {
                let name = environment.environment_name().trim();
                if name.is_empty() {
                    return Err(CoreError::configuration(
                        "The environment handle does not expose an environment name",
                    ));
                }
                report.environment = Some(name.to_string());

                let (kept, skipped): (Vec<_>, Vec<_>) = activated
                    .into_iter()
                    .partition(|module| module.targets_environment(name));
                for module in &skipped {
                    tracing::info!(
                        "Skipping module {}: targets {:?}, environment is {}",
                        module.full_name(),
                        module.environments(),
                        name
                    );
                }
                report.skipped = skipped.iter().map(|m| m.full_name().to_string()).collect();
                kept
            }
            None => activated,
        };

        self.configurator.initialize(&options)?;

        for mut module in modules {
            self.configurator.apply(&mut module)?;
            module
                .configure_services(services)
                .map_err(|error| CoreError::registration(module.full_name(), error))?;
            tracing::info!("Registered services of module {}", module.full_name());
            report.registered.push(module.full_name().to_string());
            report.modules.push(module);
        }

        Ok(report)
    }
}

impl Default for ModuleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ModuleHost {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHost").finish_non_exhaustive()
    }
}
