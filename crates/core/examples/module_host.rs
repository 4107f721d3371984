//! Example: configuring modules from YAML and running them
//!
//! Run with `RUST_LOG=debug` to see matching and binding decisions.

use std::sync::Arc;

use anyhow::Context;
use bindery_core::config::{Configuration, Environment};
use bindery_core::modules::{
    ActivationOptions, Event, HandlerType, Library, LibraryCatalog, Module, ModuleDefinition,
    ModuleError, ModuleHost, ModuleType,
};
use bindery_core::ServiceCollection;
use tracing_subscriber::EnvFilter;

const SETTINGS: &str = r#"
ConnectionStrings:
  Cache: redis://cache.internal:6379
Modules:
  add:
    - Shop.Catalog.CatalogModule
  skip:
    - Shop.Diagnostics.DebugModule
  configuration:
    CacheModule:
      Capacity: "2048"
      Endpoint:
        Value: ConnectionStrings:Cache
        Type: Config
      Warmed:
        Value: Shop.Hooks.Audit.OnWarmed
        Type: Event
    "Shop.Catalog.*":
      Region:
        Value: eu-west
        SuppressErrors: true
"#;

pub trait Clock: Send + Sync {
    fn now(&self) -> u64;
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> u64 {
        1_700_000_000
    }
}

#[derive(Debug)]
pub struct CacheSettings {
    pub endpoint: String,
    pub capacity: usize,
}

#[derive(Default)]
pub struct CacheModule {
    endpoint: String,
    capacity: usize,
    warmed: Event<String>,
}

impl Module for CacheModule {
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), ModuleError> {
        services.add_singleton(CacheSettings {
            endpoint: self.endpoint.clone(),
            capacity: self.capacity,
        });
        self.warmed.emit(&self.endpoint);
        Ok(())
    }

    fn priority(&self) -> i32 {
        100
    }
}

impl ModuleDefinition for CacheModule {
    fn module_type() -> ModuleType {
        ModuleType::builder::<Self>()
            .full_name("Shop.Caching.CacheModule")
            .constructor0(Self::default)
            .property("Endpoint", |m: &mut Self, v: String| m.endpoint = v)
            .property("Capacity", |m: &mut Self, v: usize| m.capacity = v)
            .event("Warmed", |m: &mut Self| &mut m.warmed)
            .build()
    }
}

pub struct CatalogModule {
    started_at: u64,
}

impl Module for CatalogModule {
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), ModuleError> {
        services.add_singleton(self.started_at);
        Ok(())
    }

    fn environments(&self) -> Vec<String> {
        vec!["Development".to_string(), "Production".to_string()]
    }
}

impl ModuleDefinition for CatalogModule {
    fn module_type() -> ModuleType {
        ModuleType::builder::<Self>()
            .full_name("Shop.Catalog.CatalogModule")
            .constructor1(|clock: Arc<dyn Clock>| Self {
                started_at: clock.now(),
            })
            .build()
    }
}

fn catalog() -> LibraryCatalog {
    LibraryCatalog::new()
        .with_library(Library::new("Shop.Catalog").with_module::<CatalogModule>())
        .with_library(Library::new("Shop.Hooks").with_handler_type(
            HandlerType::new("Shop.Hooks.Audit").method("OnWarmed", |endpoint: &String| {
                tracing::info!("Cache warmed at {}", endpoint);
            }),
        ))
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let configuration = Configuration::builder()
        .add_yaml(SETTINGS)
        .add_env_vars("SHOP_")
        .build()
        .context("loading settings")?;

    let options = ActivationOptions::builder()
        .catalog(catalog())
        .module::<CacheModule>()
        .shared_provider::<dyn Clock>(Arc::new(FixedClock))
        .environment(Environment::from_env()?)
        .configuration(configuration)
        .build()?;

    let mut services = ServiceCollection::new();
    let report = ModuleHost::new().run(options, &mut services)?;

    println!("{}", report.to_json()?);
    println!("{:?}", services.resolve::<CacheSettings>()?);
    Ok(())
}
