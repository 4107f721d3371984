use crate::container::ServiceCollection;
use crate::errors::CoreError;
use crate::modules::ModuleType;
use std::any::Any;
use std::sync::Arc;

/// Error returned by a module's registration callback
#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error("Module registration failed: {message}")]
    RegistrationFailed { message: String },

    #[error("Container error: {0}")]
    Container(#[from] CoreError),
}

impl ModuleError {
    /// Create a registration failure
    pub fn registration_failed(message: impl Into<String>) -> Self {
        Self::RegistrationFailed {
            message: message.into(),
        }
    }
}

/// Access to the concrete type behind a trait object
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of service registration logic
pub trait Module: AsAny + Send + Sync {
    /// Register services in the collection
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), ModuleError>;

    /// Environments this module runs in. Empty means every environment.
    fn environments(&self) -> Vec<String> {
        Vec::new()
    }

    /// Modules with a higher priority run first
    fn priority(&self) -> i32 {
        0
    }
}

/// A module type that can describe itself
pub trait ModuleDefinition: Module + Sized {
    /// Constructors, properties and events exposed to activation and configuration
    fn module_type() -> ModuleType;
}

/// A module instance paired with its type descriptor
pub struct ActivatedModule {
    module_type: Arc<ModuleType>,
    module: Box<dyn Module>,
}

impl ActivatedModule {
    pub fn new(module_type: Arc<ModuleType>, module: Box<dyn Module>) -> Self {
        Self {
            module_type,
            module,
        }
    }

    /// Wrap an instance of a self-describing module
    pub fn from_instance<M: ModuleDefinition>(module: M) -> Self {
        Self::new(Arc::new(M::module_type()), Box::new(module))
    }

    pub fn module_type(&self) -> &Arc<ModuleType> {
        &self.module_type
    }

    /// Fully qualified type name
    pub fn full_name(&self) -> &str {
        self.module_type.full_name()
    }

    /// Bare type name
    pub fn name(&self) -> &str {
        self.module_type.name()
    }

    pub fn priority(&self) -> i32 {
        self.module.priority()
    }

    pub fn environments(&self) -> Vec<String> {
        self.module.environments()
    }

    /// Check if the module runs in the named environment
    pub fn targets_environment(&self, environment: &str) -> bool {
        let environments = self.environments();
        environments.is_empty()
            || environments
                .iter()
                .any(|candidate| candidate.eq_ignore_ascii_case(environment))
    }

    /// Invoke the module's registration callback
    pub fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), ModuleError> {
        self.module.configure_services(services)
    }

    pub fn module(&self) -> &dyn Module {
        self.module.as_ref()
    }

    pub(crate) fn as_any_mut(&mut self) -> &mut dyn Any {
        AsAny::as_any_mut(self.module.as_mut())
    }

    /// Borrow the concrete module
    pub fn downcast_ref<M: Module>(&self) -> Option<&M> {
        AsAny::as_any(self.module.as_ref()).downcast_ref::<M>()
    }

    /// Mutably borrow the concrete module
    pub fn downcast_mut<M: Module>(&mut self) -> Option<&mut M> {
        self.as_any_mut().downcast_mut::<M>()
    }
}

type Prototype = Arc<dyn Fn() -> Box<dyn Module> + Send + Sync>;

/// A pre-built module supplied by the host.
///
/// The instance is kept as a prototype so every activation pass hands out the
/// same configured state and the instance always takes the place of its type.
#[derive(Clone)]
pub struct ModuleInstance {
    module_type: Arc<ModuleType>,
    prototype: Prototype,
}

impl ModuleInstance {
    pub fn new<M: ModuleDefinition + Clone>(module: M) -> Self {
        Self::with_type(M::module_type(), module)
    }

    /// Pair an instance with an explicit descriptor
    pub fn with_type<M: Module + Clone>(module_type: ModuleType, module: M) -> Self {
        Self {
            module_type: Arc::new(module_type),
            prototype: Arc::new(move || -> Box<dyn Module> { Box::new(module.clone()) }),
        }
    }

    pub fn module_type(&self) -> &Arc<ModuleType> {
        &self.module_type
    }

    pub fn full_name(&self) -> &str {
        self.module_type.full_name()
    }

    /// Hand out a fresh copy for one activation pass
    pub fn activate(&self) -> ActivatedModule {
        ActivatedModule::new(Arc::clone(&self.module_type), (self.prototype)())
    }
}

impl std::fmt::Debug for ModuleInstance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleInstance")
            .field("type", &self.full_name())
            .finish()
    }
}

impl std::fmt::Debug for ActivatedModule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivatedModule")
            .field("type", &self.full_name())
            .field("priority", &self.priority())
            .field("environments", &self.environments())
            .finish()
    }
}
