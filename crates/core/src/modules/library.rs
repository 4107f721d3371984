//! Libraries of module types and event handlers
//!
//! A [`Library`] stands in for a loadable unit of code: it lists the module
//! types it ships and the handler types whose static methods can be wired to
//! module events by name. The [`LibraryCatalog`] is populated by the host at
//! startup and answers discovery and late-bound lookups.

use crate::modules::{EventHandler, ModuleDefinition, ModuleType, Visibility};
use crate::providers::TypeKey;
use std::any::Any;
use std::sync::Arc;

/// A named function that can be attached to events taking `argument`
#[derive(Clone)]
pub struct HandlerMethod {
    name: String,
    visibility: Visibility,
    is_static: bool,
    argument: TypeKey,
    handler: Arc<dyn Any + Send + Sync>,
}

impl HandlerMethod {
    fn new<A: 'static>(name: impl Into<String>, handler: EventHandler<A>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Public,
            is_static: true,
            argument: TypeKey::of::<A>(),
            handler: Arc::new(handler),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn is_static(&self) -> bool {
        self.is_static
    }

    /// Argument type the handler accepts
    pub fn argument_type(&self) -> &TypeKey {
        &self.argument
    }

    /// Check if the handler fits events carrying `argument`
    pub fn is_compatible_with(&self, argument: &TypeKey) -> bool {
        &self.argument == argument
    }

    /// The stored `EventHandler<A>`, type-erased
    pub fn handler(&self) -> &(dyn Any + Send + Sync) {
        self.handler.as_ref()
    }

    /// Get the handler as a typed `EventHandler<A>`
    pub fn typed<A: 'static>(&self) -> Option<EventHandler<A>> {
        self.handler.downcast_ref::<EventHandler<A>>().cloned()
    }
}

impl std::fmt::Debug for HandlerMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandlerMethod")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("is_static", &self.is_static)
            .field("argument", &self.argument)
            .finish()
    }
}

/// A type declaring handler methods
#[derive(Debug, Clone)]
pub struct HandlerType {
    full_name: String,
    name: String,
    methods: Vec<HandlerMethod>,
}

impl HandlerType {
    /// Create a handler type. The bare name is the last `.` segment.
    pub fn new(full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        let name = full_name
            .rsplit('.')
            .next()
            .unwrap_or(full_name.as_str())
            .to_string();
        Self {
            full_name,
            name,
            methods: Vec::new(),
        }
    }

    /// Add a public static handler
    pub fn method<A, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        A: 'static,
        F: Fn(&A) + Send + Sync + 'static,
    {
        let handler: EventHandler<A> = Arc::new(handler);
        self.methods.push(HandlerMethod::new(name, handler));
        self
    }

    /// Add a non-public static handler
    pub fn private_method<A, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        A: 'static,
        F: Fn(&A) + Send + Sync + 'static,
    {
        let handler: EventHandler<A> = Arc::new(handler);
        let mut method = HandlerMethod::new(name, handler);
        method.visibility = Visibility::NonPublic;
        self.methods.push(method);
        self
    }

    /// Add an instance method. Instance methods are never bound to events.
    pub fn instance_method<A, F>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        A: 'static,
        F: Fn(&A) + Send + Sync + 'static,
    {
        let handler: EventHandler<A> = Arc::new(handler);
        let mut method = HandlerMethod::new(name, handler);
        method.is_static = false;
        self.methods.push(method);
        self
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn methods(&self) -> &[HandlerMethod] {
        &self.methods
    }

    /// Find a static method of either visibility by exact name
    pub fn find_static_method(&self, name: &str) -> Option<&HandlerMethod> {
        self.methods
            .iter()
            .find(|method| method.is_static && method.name == name)
    }
}

/// A unit of code shipping module types and handler types
#[derive(Debug, Clone)]
pub struct Library {
    name: String,
    path: Option<String>,
    module_types: Vec<Arc<ModuleType>>,
    handler_types: Vec<HandlerType>,
    other_types: Vec<String>,
}

impl Library {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: None,
            module_types: Vec::new(),
            handler_types: Vec::new(),
            other_types: Vec::new(),
        }
    }

    /// Set the path a hint path must equal to load this library
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Add a self-describing module type
    pub fn with_module<M: ModuleDefinition>(self) -> Self {
        self.with_module_type(M::module_type())
    }

    pub fn with_module_type(mut self, module_type: ModuleType) -> Self {
        self.module_types.push(Arc::new(module_type));
        self
    }

    pub fn with_handler_type(mut self, handler_type: HandlerType) -> Self {
        self.handler_types.push(handler_type);
        self
    }

    /// Declare a type that exists in the library but is not a module
    pub fn with_type(mut self, full_name: impl Into<String>) -> Self {
        self.other_types.push(full_name.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    pub fn module_types(&self) -> &[Arc<ModuleType>] {
        &self.module_types
    }

    /// Find a handler type by bare name
    pub fn handler_type(&self, name: &str) -> Option<&HandlerType> {
        self.handler_types
            .iter()
            .find(|handler_type| handler_type.name == name)
    }

    fn find_type(&self, full_name: &str) -> Option<ResolvedType> {
        if let Some(module_type) = self
            .module_types
            .iter()
            .find(|module_type| module_type.full_name() == full_name)
        {
            return Some(ResolvedType::Module(Arc::clone(module_type)));
        }

        self.handler_types
            .iter()
            .map(HandlerType::full_name)
            .chain(self.other_types.iter().map(String::as_str))
            .find(|name| *name == full_name)
            .map(|name| ResolvedType::Other(name.to_string()))
    }
}

/// Result of resolving a type reference by name
#[derive(Debug, Clone)]
pub enum ResolvedType {
    Module(Arc<ModuleType>),
    /// The type exists but is not a module
    Other(String),
}

/// Every library known to the host
#[derive(Debug, Clone, Default)]
pub struct LibraryCatalog {
    libraries: Vec<Library>,
}

impl LibraryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a library, replacing one with the same name
    pub fn register(&mut self, library: Library) -> &mut Self {
        self.libraries.retain(|existing| existing.name != library.name);
        self.libraries.push(library);
        self
    }

    pub fn with_library(mut self, library: Library) -> Self {
        self.register(library);
        self
    }

    pub fn libraries(&self) -> &[Library] {
        &self.libraries
    }

    pub fn len(&self) -> usize {
        self.libraries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.libraries.is_empty()
    }

    /// Load a library by hint path when one is given, else by name
    pub fn load(&self, name: &str, hint_path: Option<&str>) -> Option<&Library> {
        match hint_path {
            Some(hint_path) => self
                .libraries
                .iter()
                .find(|library| library.path.as_deref() == Some(hint_path)),
            None => self
                .libraries
                .iter()
                .find(|library| library.name.eq_ignore_ascii_case(name)),
        }
    }

    /// Every module type shipped by the named library
    pub fn discover_modules(&self, library: &str) -> Vec<Arc<ModuleType>> {
        self.load(library, None)
            .map(|library| library.module_types.clone())
            .unwrap_or_default()
    }

    /// Resolve a fully qualified type name.
    ///
    /// With a hint path only the library at that path is searched.
    pub fn find_type(&self, full_name: &str, hint_path: Option<&str>) -> Option<ResolvedType> {
        let full_name = full_name.trim();
        match hint_path {
            Some(hint_path) => self
                .libraries
                .iter()
                .filter(|library| library.path.as_deref() == Some(hint_path))
                .find_map(|library| library.find_type(full_name)),
            None => self
                .libraries
                .iter()
                .find_map(|library| library.find_type(full_name)),
        }
    }
}
