//! Module type descriptors
//!
//! A [`ModuleType`] is the runtime description of a module type: its names,
//! visibility, constructors, settable properties and events. Activation and
//! configuration work against descriptors instead of inspecting types.
//!
//! ## Features
//! - **Constructors**: parameter type keys plus a factory fed from the provider pool
//! - **Properties**: typed setters driven by string values from configuration
//! - **Events**: typed add-accessors receiving handlers from a library catalog
//! - **Visibility**: public / non-public flags on types, members, setters and add-accessors

use crate::errors::CoreError;
use crate::modules::{Event, EventHandler, Module};
use crate::providers::{ProviderValue, TypeKey};
use std::any::{Any, TypeId};
use std::marker::PhantomData;
use std::sync::Arc;

/// Visibility of a type or member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Public,
    NonPublic,
}

impl Visibility {
    pub fn is_public(&self) -> bool {
        matches!(self, Visibility::Public)
    }

    fn allows(&self, public_only: bool) -> bool {
        !public_only || self.is_public()
    }
}

/// Values selected from the provider pool for one constructor call
pub struct ConstructorArguments<'a> {
    module: &'a str,
    parameters: &'a [TypeKey],
    values: Vec<ProviderValue>,
}

impl<'a> ConstructorArguments<'a> {
    pub(crate) fn new(module: &'a str, parameters: &'a [TypeKey], values: Vec<ProviderValue>) -> Self {
        Self {
            module,
            parameters,
            values,
        }
    }

    /// Get the argument at `index` as `Arc<T>`
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self, index: usize) -> Result<Arc<T>, CoreError> {
        self.values
            .get(index)
            .and_then(|value| value.downcast_ref::<Arc<T>>())
            .cloned()
            .ok_or_else(|| {
                let declared = self
                    .parameters
                    .get(index)
                    .map(|key| key.type_name())
                    .unwrap_or("<none>");
                CoreError::activation(format!(
                    "Argument {} of '{}' is declared as {} and cannot be read as {}",
                    index,
                    self.module,
                    declared,
                    std::any::type_name::<T>()
                ))
            })
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

type Factory =
    Box<dyn Fn(&ConstructorArguments<'_>) -> Result<Box<dyn Module>, CoreError> + Send + Sync>;

/// A way to construct a module from provider values
pub struct Constructor {
    parameters: Vec<TypeKey>,
    factory: Factory,
}

impl Constructor {
    /// Create a constructor from parameter types and a raw factory
    pub fn new<F>(parameters: Vec<TypeKey>, factory: F) -> Self
    where
        F: Fn(&ConstructorArguments<'_>) -> Result<Box<dyn Module>, CoreError> + Send + Sync + 'static,
    {
        Self {
            parameters,
            factory: Box::new(factory),
        }
    }

    pub fn parameters(&self) -> &[TypeKey] {
        &self.parameters
    }

    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    pub(crate) fn invoke(&self, arguments: &ConstructorArguments<'_>) -> Result<Box<dyn Module>, CoreError> {
        (self.factory)(arguments)
    }
}

impl std::fmt::Debug for Constructor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constructor")
            .field("parameters", &self.parameters)
            .finish()
    }
}

type Setter = Box<dyn Fn(&mut dyn Any, Box<dyn Any + Send>) -> bool + Send + Sync>;

struct PropertySetter {
    visibility: Visibility,
    assign: Setter,
}

/// A property that configuration can set
pub struct PropertyDescriptor {
    name: String,
    value_type: TypeKey,
    visibility: Visibility,
    setter: Option<PropertySetter>,
}

impl PropertyDescriptor {
    /// A public property with a public setter
    pub fn new<M, T, F>(name: impl Into<String>, set: F) -> Self
    where
        M: Module,
        T: 'static,
        F: Fn(&mut M, T) + Send + Sync + 'static,
    {
        let assign: Setter = Box::new(move |target: &mut dyn Any, value: Box<dyn Any + Send>| {
            match (target.downcast_mut::<M>(), value.downcast::<T>()) {
                (Some(module), Ok(value)) => {
                    set(module, *value);
                    true
                }
                _ => false,
            }
        });
        Self {
            name: name.into(),
            value_type: TypeKey::of::<T>(),
            visibility: Visibility::Public,
            setter: Some(PropertySetter {
                visibility: Visibility::Public,
                assign,
            }),
        }
    }

    /// A public property without a setter
    pub fn read_only<T: 'static>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value_type: TypeKey::of::<T>(),
            visibility: Visibility::Public,
            setter: None,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    /// Change the setter visibility. No effect on read-only properties.
    pub fn with_setter_visibility(mut self, visibility: Visibility) -> Self {
        if let Some(setter) = self.setter.as_mut() {
            setter.visibility = visibility;
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value_type(&self) -> &TypeKey {
        &self.value_type
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// Visibility of the setter, `None` for read-only properties
    pub fn setter_visibility(&self) -> Option<Visibility> {
        self.setter.as_ref().map(|setter| setter.visibility)
    }

    /// Check if the property can be found under the public-only rule
    pub fn is_visible(&self, public_only: bool) -> bool {
        self.visibility.allows(public_only)
    }

    /// Check if the property has a setter usable under the public-only rule
    pub fn has_usable_setter(&self, public_only: bool) -> bool {
        self.setter_visibility()
            .map(|visibility| visibility.allows(public_only))
            .unwrap_or(false)
    }

    pub(crate) fn assign(&self, target: &mut dyn Any, value: Box<dyn Any + Send>) -> bool {
        self.setter
            .as_ref()
            .map(|setter| (setter.assign)(target, value))
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("value_type", &self.value_type)
            .field("visibility", &self.visibility)
            .field("setter", &self.setter_visibility())
            .finish()
    }
}

type Attach = Box<dyn Fn(&mut dyn Any, &(dyn Any + Send + Sync)) -> bool + Send + Sync>;

/// An event that configuration can attach handlers to
pub struct EventDescriptor {
    name: String,
    argument: TypeKey,
    visibility: Visibility,
    add_visibility: Visibility,
    attach: Attach,
}

impl EventDescriptor {
    /// A public event with a public add-accessor
    pub fn new<M, A, F>(name: impl Into<String>, accessor: F) -> Self
    where
        M: Module,
        A: 'static,
        F: Fn(&mut M) -> &mut Event<A> + Send + Sync + 'static,
    {
        let attach: Attach = Box::new(
            move |target: &mut dyn Any, handler: &(dyn Any + Send + Sync)| {
                match (target.downcast_mut::<M>(), handler.downcast_ref::<EventHandler<A>>()) {
                    (Some(module), Some(handler)) => {
                        accessor(module).subscribe(Arc::clone(handler));
                        true
                    }
                    _ => false,
                }
            },
        );
        Self {
            name: name.into(),
            argument: TypeKey::of::<A>(),
            visibility: Visibility::Public,
            add_visibility: Visibility::Public,
            attach,
        }
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_add_visibility(mut self, visibility: Visibility) -> Self {
        self.add_visibility = visibility;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type of the argument handlers receive
    pub fn argument_type(&self) -> &TypeKey {
        &self.argument
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    pub fn add_visibility(&self) -> Visibility {
        self.add_visibility
    }

    /// Check if the event and its add-accessor can be found under the public-only rule
    pub fn is_visible(&self, public_only: bool) -> bool {
        self.visibility.allows(public_only) && self.add_visibility.allows(public_only)
    }

    pub(crate) fn attach(&self, target: &mut dyn Any, handler: &(dyn Any + Send + Sync)) -> bool {
        (self.attach)(target, handler)
    }
}

impl std::fmt::Debug for EventDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventDescriptor")
            .field("name", &self.name)
            .field("argument", &self.argument)
            .field("visibility", &self.visibility)
            .field("add_visibility", &self.add_visibility)
            .finish()
    }
}

/// Runtime description of a module type
pub struct ModuleType {
    full_name: String,
    name: String,
    type_id: TypeId,
    visibility: Visibility,
    enclosing: Vec<Visibility>,
    constructors: Vec<Constructor>,
    properties: Vec<PropertyDescriptor>,
    events: Vec<EventDescriptor>,
}

impl ModuleType {
    /// Start describing the module type `M`
    pub fn builder<M: Module>() -> ModuleTypeBuilder<M> {
        ModuleTypeBuilder::new()
    }

    /// Fully qualified, dot-separated type name
    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    /// Type name without its path
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn visibility(&self) -> Visibility {
        self.visibility
    }

    /// A type is public only if it and every enclosing type are public
    pub fn is_public(&self) -> bool {
        self.visibility.is_public() && self.enclosing.iter().all(Visibility::is_public)
    }

    pub fn constructors(&self) -> &[Constructor] {
        &self.constructors
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn events(&self) -> &[EventDescriptor] {
        &self.events
    }

    /// Find a property by case-insensitive name
    pub fn property(&self, name: &str, public_only: bool) -> Option<&PropertyDescriptor> {
        self.properties
            .iter()
            .find(|property| property.name.eq_ignore_ascii_case(name) && property.is_visible(public_only))
    }

    /// Find an event by case-insensitive name
    pub fn event(&self, name: &str, public_only: bool) -> Option<&EventDescriptor> {
        self.events
            .iter()
            .find(|event| event.name.eq_ignore_ascii_case(name) && event.is_visible(public_only))
    }
}

impl std::fmt::Debug for ModuleType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleType")
            .field("full_name", &self.full_name)
            .field("public", &self.is_public())
            .field("constructors", &self.constructors)
            .field("properties", &self.properties)
            .field("events", &self.events)
            .finish()
    }
}

/// Render a Rust type path as a dot-separated name, dropping generic arguments
fn dotted_type_name(type_name: &str) -> String {
    let base = type_name.split('<').next().unwrap_or(type_name);
    base.replace("::", ".")
}

fn short_name(full_name: &str) -> String {
    full_name.rsplit('.').next().unwrap_or(full_name).to_string()
}

/// Typed builder for [`ModuleType`]
pub struct ModuleTypeBuilder<M> {
    module_type: ModuleType,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Module> ModuleTypeBuilder<M> {
    fn new() -> Self {
        let full_name = dotted_type_name(std::any::type_name::<M>());
        Self {
            module_type: ModuleType {
                name: short_name(&full_name),
                full_name,
                type_id: TypeId::of::<M>(),
                visibility: Visibility::Public,
                enclosing: Vec::new(),
                constructors: Vec::new(),
                properties: Vec::new(),
                events: Vec::new(),
            },
            _marker: PhantomData,
        }
    }

    /// Override the full name derived from the Rust type path
    pub fn full_name(mut self, full_name: impl Into<String>) -> Self {
        let full_name = full_name.into();
        self.module_type.name = short_name(&full_name);
        self.module_type.full_name = full_name;
        self
    }

    pub fn visibility(mut self, visibility: Visibility) -> Self {
        self.module_type.visibility = visibility;
        self
    }

    /// Record an enclosing type, innermost first
    pub fn nested_in(mut self, visibility: Visibility) -> Self {
        self.module_type.enclosing.push(visibility);
        self
    }

    /// Add a constructor with explicit parameter types
    pub fn constructor(mut self, constructor: Constructor) -> Self {
        self.module_type.constructors.push(constructor);
        self
    }

    /// Add a parameterless constructor
    pub fn constructor0<F>(self, create: F) -> Self
    where
        F: Fn() -> M + Send + Sync + 'static,
    {
        self.constructor(Constructor::new(Vec::new(), move |_| {
            Ok(Box::new(create()) as Box<dyn Module>)
        }))
    }

    /// Add a constructor taking one provider
    pub fn constructor1<A, F>(self, create: F) -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<A>) -> M + Send + Sync + 'static,
    {
        self.constructor(Constructor::new(vec![TypeKey::of::<A>()], move |args| {
            Ok(Box::new(create(args.get::<A>(0)?)) as Box<dyn Module>)
        }))
    }

    /// Add a constructor taking two providers
    pub fn constructor2<A, B, F>(self, create: F) -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        B: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<A>, Arc<B>) -> M + Send + Sync + 'static,
    {
        self.constructor(Constructor::new(
            vec![TypeKey::of::<A>(), TypeKey::of::<B>()],
            move |args| Ok(Box::new(create(args.get::<A>(0)?, args.get::<B>(1)?)) as Box<dyn Module>),
        ))
    }

    /// Add a constructor taking three providers
    pub fn constructor3<A, B, C, F>(self, create: F) -> Self
    where
        A: ?Sized + Send + Sync + 'static,
        B: ?Sized + Send + Sync + 'static,
        C: ?Sized + Send + Sync + 'static,
        F: Fn(Arc<A>, Arc<B>, Arc<C>) -> M + Send + Sync + 'static,
    {
        self.constructor(Constructor::new(
            vec![TypeKey::of::<A>(), TypeKey::of::<B>(), TypeKey::of::<C>()],
            move |args| {
                Ok(Box::new(create(
                    args.get::<A>(0)?,
                    args.get::<B>(1)?,
                    args.get::<C>(2)?,
                )) as Box<dyn Module>)
            },
        ))
    }

    /// Add a public property with a public setter
    pub fn property<T, F>(self, name: impl Into<String>, set: F) -> Self
    where
        T: 'static,
        F: Fn(&mut M, T) + Send + Sync + 'static,
    {
        self.with_property(PropertyDescriptor::new::<M, T, F>(name, set))
    }

    /// Add a public property without a setter
    pub fn read_only<T: 'static>(self, name: impl Into<String>) -> Self {
        self.with_property(PropertyDescriptor::read_only::<T>(name))
    }

    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.module_type.properties.push(property);
        self
    }

    /// Add a public event
    pub fn event<A, F>(self, name: impl Into<String>, accessor: F) -> Self
    where
        A: 'static,
        F: Fn(&mut M) -> &mut Event<A> + Send + Sync + 'static,
    {
        self.with_event(EventDescriptor::new::<M, A, F>(name, accessor))
    }

    pub fn with_event(mut self, event: EventDescriptor) -> Self {
        self.module_type.events.push(event);
        self
    }

    pub fn build(self) -> ModuleType {
        self.module_type
    }
}
