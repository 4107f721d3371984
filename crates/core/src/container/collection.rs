use crate::container::scope::ServiceScope;
use crate::errors::CoreError;
use crate::providers::TypeKey;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::Arc;

/// Service entry in the collection. Both variants yield an `Arc<T>` boxed as `Any`.
pub enum ServiceEntry {
    /// Single shared instance
    Instance(Box<dyn Any + Send + Sync>),
    /// Factory invoked on every resolution
    Factory(Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync>),
}

impl std::fmt::Debug for ServiceEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ServiceEntry::Instance(_) => f.debug_tuple("Instance").field(&"<instance>").finish(),
            ServiceEntry::Factory(_) => f.debug_tuple("Factory").field(&"<factory>").finish(),
        }
    }
}

/// Service bindings contributed by modules.
///
/// Modules only ever write into the collection; the activation engine never
/// inspects it.
#[derive(Debug, Default)]
pub struct ServiceCollection {
    services: HashMap<TypeId, ServiceEntry>,
    scopes: HashMap<TypeId, ServiceScope>,
    registration_order: Vec<TypeKey>,
}

impl ServiceCollection {
    /// Create an empty service collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a singleton instance
    pub fn add_singleton<T: Send + Sync + 'static>(&mut self, service: T) -> &mut Self {
        self.add_shared(Arc::new(service))
    }

    /// Register a shared instance, typically bound to a trait object
    pub fn add_shared<T: ?Sized + Send + Sync + 'static>(&mut self, service: Arc<T>) -> &mut Self {
        self.insert(
            TypeKey::of::<T>(),
            ServiceEntry::Instance(Box::new(service)),
            ServiceScope::Singleton,
        );
        self
    }

    /// Register a transient service created by a factory
    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: Send + Sync + 'static,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let wrapped: Box<dyn Fn() -> Box<dyn Any + Send + Sync> + Send + Sync> =
            Box::new(move || -> Box<dyn Any + Send + Sync> { Box::new(Arc::new(factory())) });
        self.insert(
            TypeKey::of::<T>(),
            ServiceEntry::Factory(wrapped),
            ServiceScope::Transient,
        );
        self
    }

    fn insert(&mut self, key: TypeKey, entry: ServiceEntry, scope: ServiceScope) {
        tracing::debug!("Registering {} service {}", scope, key);
        if self.services.insert(key.type_id(), entry).is_none() {
            self.registration_order.push(key);
        }
        self.scopes.insert(key.type_id(), scope);
    }

    /// Resolve a service
    pub fn resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, CoreError> {
        self.try_resolve::<T>()
            .ok_or_else(|| CoreError::service_not_found(std::any::type_name::<T>()))
    }

    /// Try to resolve a service, returning None if not found
    pub fn try_resolve<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        match self.services.get(&TypeId::of::<T>())? {
            ServiceEntry::Instance(instance) => instance.downcast_ref::<Arc<T>>().cloned(),
            ServiceEntry::Factory(factory) => factory().downcast::<Arc<T>>().ok().map(|b| *b),
        }
    }

    /// Check if a service is registered
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.services.contains_key(&TypeId::of::<T>())
    }

    /// Get the scope a service was registered with
    pub fn scope_of<T: ?Sized + 'static>(&self) -> Option<ServiceScope> {
        self.scopes.get(&TypeId::of::<T>()).copied()
    }

    /// Get the number of registered services
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Check if no service is registered
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Names of registered service types, in first-registration order
    pub fn service_names(&self) -> Vec<&'static str> {
        self.registration_order
            .iter()
            .map(|key| key.type_name())
            .collect()
    }
}
