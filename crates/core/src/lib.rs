pub mod config;
pub mod container;
pub mod errors;
pub mod modules;
pub mod providers;

// Re-export key types for convenience
pub use config::{
    ConfigSource, Configuration, ConfigurationBuilder, ConfigurationLoader, ConfigurationOverlay,
    Environment, HostEnvironment, NamedEnvironment, OverrideEntry, OverrideKind, ValueConverters,
};
pub use container::{ServiceCollection, ServiceScope};
pub use errors::CoreError;
pub use modules::{
    ActivateModules, ActivatedModule, ActivationOptions, ConfigurationApplicator,
    ConfigureModules, Event, HandlerType, Library, LibraryCatalog, Module, ModuleActivator,
    ModuleDefinition, ModuleError, ModuleHost, ModuleInstance, ModuleType, RunReport, Visibility,
};
pub use providers::{ProviderPool, ProviderRegistration, TypeKey};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const LIBRARY_NAME: &str = "bindery";

/// Get library version
pub fn version() -> &'static str {
    VERSION
}

/// Get library name
pub fn name() -> &'static str {
    LIBRARY_NAME
}
