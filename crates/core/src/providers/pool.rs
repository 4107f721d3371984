use crate::providers::TypeKey;
use std::any::Any;
use std::sync::Arc;

/// Type-erased provider value. Always holds an `Arc<T>` for the key it was stored under.
pub type ProviderValue = Arc<dyn Any + Send + Sync>;

/// A provider ready to be added to a [`ProviderPool`], together with the
/// types it can be assigned to besides its own.
pub struct ProviderRegistration<T: ?Sized> {
    value: Arc<T>,
    views: Vec<(TypeKey, ProviderValue)>,
}

impl<T: Send + Sync + 'static> ProviderRegistration<T> {
    /// Register an owned value
    pub fn new(value: T) -> Self {
        Self::shared(Arc::new(value))
    }
}

impl<T: ?Sized + Send + Sync + 'static> ProviderRegistration<T> {
    /// Register an already shared value
    pub fn shared(value: Arc<T>) -> Self {
        let own: ProviderValue = Arc::new(Arc::clone(&value));
        Self {
            views: vec![(TypeKey::of::<T>(), own)],
            value,
        }
    }

    /// Make the provider assignable to `I`, usually a trait object it implements
    pub fn assignable_to<I, F>(mut self, upcast: F) -> Self
    where
        I: ?Sized + Send + Sync + 'static,
        F: FnOnce(Arc<T>) -> Arc<I>,
    {
        let key = TypeKey::of::<I>();
        if !self.views.iter().any(|(existing, _)| *existing == key) {
            let view: ProviderValue = Arc::new(upcast(Arc::clone(&self.value)));
            self.views.push((key, view));
        }
        self
    }

    fn into_entry(self) -> ProviderEntry {
        let key = self.views[0].0;
        ProviderEntry {
            key,
            views: self.views,
        }
    }
}

struct ProviderEntry {
    key: TypeKey,
    views: Vec<(TypeKey, ProviderValue)>,
}

impl ProviderEntry {
    fn assignable_to(&self, target: &TypeKey) -> bool {
        self.views.iter().any(|(key, _)| key == target)
    }

    fn view(&self, target: &TypeKey) -> Option<&ProviderValue> {
        self.views
            .iter()
            .find(|(key, _)| key == target)
            .map(|(_, value)| value)
    }
}

/// Runtime-supplied objects available to module constructors.
///
/// At most one provider is kept per exact type. The order in which providers
/// were added is the order of the allow-list reported in activation errors.
#[derive(Default)]
pub struct ProviderPool {
    entries: Vec<ProviderEntry>,
}

impl ProviderPool {
    /// Create an empty provider pool
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a provider value. Returns `false` if a provider of the same type is already present.
    pub fn add<T: Send + Sync + 'static>(&mut self, value: T) -> bool {
        self.register(ProviderRegistration::new(value))
    }

    /// Add a shared provider. Returns `false` if a provider of the same type is already present.
    pub fn add_shared<T: ?Sized + Send + Sync + 'static>(&mut self, value: Arc<T>) -> bool {
        self.register(ProviderRegistration::shared(value))
    }

    /// Add a provider registration. Returns `false` if a provider of the same type is already present.
    pub fn register<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        registration: ProviderRegistration<T>,
    ) -> bool {
        let entry = registration.into_entry();
        if self.contains(&entry.key) {
            tracing::debug!("Provider of type {} already present, ignoring", entry.key);
            return false;
        }
        self.entries.push(entry);
        true
    }

    /// Replace the provider of the same type, moving it to the end of the allow-list.
    /// Used for the environment and configuration handles.
    pub fn replace<T: ?Sized + Send + Sync + 'static>(
        &mut self,
        registration: ProviderRegistration<T>,
    ) {
        let entry = registration.into_entry();
        self.entries.retain(|existing| existing.key != entry.key);
        self.entries.push(entry);
    }

    /// Remove the provider of exactly this type
    pub fn remove(&mut self, key: &TypeKey) -> bool {
        let before = self.entries.len();
        self.entries.retain(|existing| existing.key != *key);
        self.entries.len() != before
    }

    /// Check if a provider of exactly this type is present
    pub fn contains(&self, key: &TypeKey) -> bool {
        self.entries.iter().any(|entry| entry.key == *key)
    }

    /// The types eligible as constructor arguments, in insertion order
    pub fn allowed_types(&self) -> Vec<TypeKey> {
        self.entries.iter().map(|entry| entry.key).collect()
    }

    /// Check whether some allowed type is assignable to `parameter`
    pub fn is_satisfiable(&self, parameter: &TypeKey) -> bool {
        self.entries.iter().any(|entry| entry.assignable_to(parameter))
    }

    /// Pick the provider for a constructor parameter: the provider of exactly
    /// that type if present, otherwise the first assignable one.
    pub fn select(&self, parameter: &TypeKey) -> Option<ProviderValue> {
        self.entries
            .iter()
            .find(|entry| entry.key == *parameter)
            .or_else(|| self.entries.iter().find(|entry| entry.assignable_to(parameter)))
            .and_then(|entry| entry.view(parameter))
            .cloned()
    }

    /// Get a typed provider, following the same selection rule as [`select`](Self::select)
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.select(&TypeKey::of::<T>())
            .and_then(|value| value.downcast_ref::<Arc<T>>().cloned())
    }

    /// Get the number of providers
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the pool is empty
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for ProviderPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderPool")
            .field("allowed_types", &self.allowed_types())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Clock: Send + Sync {
        fn now(&self) -> u64;
    }

    struct FixedClock(u64);

    impl Clock for FixedClock {
        fn now(&self) -> u64 {
            self.0
        }
    }

    struct OtherClock;

    impl Clock for OtherClock {
        fn now(&self) -> u64 {
            7
        }
    }

    #[test]
    fn test_add_keeps_first_provider_per_type() {
        let mut pool = ProviderPool::new();

        assert!(pool.add(String::from("first")));
        assert!(!pool.add(String::from("second")));

        assert_eq!(pool.len(), 1);
        assert_eq!(pool.get::<String>().as_deref().map(String::as_str), Some("first"));
    }

    #[test]
    fn test_replace_moves_type_to_end_of_allow_list() {
        let mut pool = ProviderPool::new();
        pool.add(String::from("name"));
        pool.add(true);

        pool.replace(ProviderRegistration::new(String::from("renamed")));

        assert_eq!(
            pool.allowed_types(),
            vec![TypeKey::of::<bool>(), TypeKey::of::<String>()]
        );
        assert_eq!(pool.get::<String>().as_deref().map(String::as_str), Some("renamed"));
    }

    #[test]
    fn test_assignable_provider_satisfies_trait_parameter() {
        let mut pool = ProviderPool::new();
        pool.register(
            ProviderRegistration::new(FixedClock(42)).assignable_to(|c| c as Arc<dyn Clock>),
        );

        assert!(pool.is_satisfiable(&TypeKey::of::<dyn Clock>()));
        assert!(pool.is_satisfiable(&TypeKey::of::<FixedClock>()));
        assert!(!pool.is_satisfiable(&TypeKey::of::<OtherClock>()));

        let clock = pool.get::<dyn Clock>().map(|c| c.now());
        assert_eq!(clock, Some(42));
    }

    #[test]
    fn test_select_prefers_exact_type_over_assignable() {
        let mut pool = ProviderPool::new();
        pool.register(
            ProviderRegistration::new(FixedClock(1)).assignable_to(|c| c as Arc<dyn Clock>),
        );
        pool.add_shared::<dyn Clock>(Arc::new(OtherClock));

        let clock = pool.get::<dyn Clock>().map(|c| c.now());
        assert_eq!(clock, Some(7));
    }
}
