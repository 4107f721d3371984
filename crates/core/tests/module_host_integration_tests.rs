//! Integration tests for module hosting
//!
//! Runs the full activation → environment filter → configuration → registration
//! pipeline through the public API, with configuration coming from YAML, files
//! and layered sources.

use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bindery_core::config::{Configuration, Environment, NamedEnvironment};
use bindery_core::modules::{
    ActivateModules, ActivatedModule, ActivationOptions, Event, HandlerType, Library,
    LibraryCatalog, Module, ModuleActivator, ModuleDefinition, ModuleError, ModuleHost,
    ModuleType,
};
use bindery_core::{CoreError, ServiceCollection};

static AUDIT_EVENTS: AtomicUsize = AtomicUsize::new(0);

/// Services registered by [`GreetingModule`]
#[derive(Debug, Clone, PartialEq)]
struct GreetingSettings {
    greeting: String,
    repeat: u32,
    loud: bool,
}

#[derive(Default)]
struct GreetingModule {
    greeting: String,
    repeat: u32,
    loud: bool,
    registered: Event<String>,
}

impl Module for GreetingModule {
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), ModuleError> {
        services.add_singleton(GreetingSettings {
            greeting: self.greeting.clone(),
            repeat: self.repeat,
            loud: self.loud,
        });
        self.registered.emit(&self.greeting);
        Ok(())
    }
}

impl ModuleDefinition for GreetingModule {
    fn module_type() -> ModuleType {
        ModuleType::builder::<Self>()
            .full_name("Acme.Web.Foo")
            .constructor0(Self::default)
            .property("Greeting", |m: &mut Self, v: String| m.greeting = v)
            .property("Repeat", |m: &mut Self, v: u32| m.repeat = v)
            .property("Loud", |m: &mut Self, v: bool| m.loud = v)
            .event("Registered", |m: &mut Self| &mut m.registered)
            .build()
    }
}

#[derive(Clone)]
struct TitleModule {
    title: String,
    verbose: Option<bool>,
}

impl Module for TitleModule {
    fn configure_services(&self, services: &mut ServiceCollection) -> Result<(), ModuleError> {
        services.add_singleton(self.title.clone());
        Ok(())
    }
}

impl ModuleDefinition for TitleModule {
    fn module_type() -> ModuleType {
        ModuleType::builder::<Self>()
            .full_name("Acme.Reports.TitleModule")
            .constructor1(|title: Arc<String>| Self {
                title: title.as_ref().clone(),
                verbose: None,
            })
            .constructor2(|title: Arc<String>, verbose: Arc<bool>| Self {
                title: title.as_ref().clone(),
                verbose: Some(*verbose),
            })
            .build()
    }
}

macro_rules! environment_module {
    ($name:ident, $full_name:expr, [$($environment:expr),*]) => {
        #[derive(Default)]
        struct $name;

        impl Module for $name {
            fn configure_services(&self, _services: &mut ServiceCollection) -> Result<(), ModuleError> {
                Ok(())
            }

            fn environments(&self) -> Vec<String> {
                vec![$($environment.to_string()),*]
            }
        }

        impl ModuleDefinition for $name {
            fn module_type() -> ModuleType {
                ModuleType::builder::<Self>()
                    .full_name($full_name)
                    .constructor0(Self::default)
                    .build()
            }
        }
    };
}

environment_module!(DevTools, "Acme.Env.DevTools", ["Development"]);
environment_module!(Everywhere, "Acme.Env.Everywhere", []);
environment_module!(ProdMetrics, "Acme.Env.ProdMetrics", ["Production"]);

fn catalog() -> LibraryCatalog {
    LibraryCatalog::new()
        .with_library(
            Library::new("Acme.Env")
                .with_module::<DevTools>()
                .with_module::<Everywhere>()
                .with_module::<ProdMetrics>(),
        )
        .with_library(
            Library::new("Acme.Audit")
                .with_path("plugins/audit")
                .with_handler_type(HandlerType::new("Acme.Audit.Listeners").method(
                    "OnRegistered",
                    |_: &String| {
                        AUDIT_EVENTS.fetch_add(1, Ordering::SeqCst);
                    },
                )),
        )
}

fn run(options: ActivationOptions) -> Result<(bindery_core::RunReport, ServiceCollection), CoreError> {
    let mut services = ServiceCollection::new();
    let report = ModuleHost::new().run(options, &mut services)?;
    Ok((report, services))
}

fn greeting_with(yaml: &str) -> Result<GreetingSettings, CoreError> {
    let options = ActivationOptions::builder()
        .module::<GreetingModule>()
        .catalog(catalog())
        .configuration(Configuration::from_yaml_str(yaml)?)
        .build()?;
    let (_, services) = run(options)?;
    Ok(services.resolve::<GreetingSettings>()?.as_ref().clone())
}

#[test]
fn test_short_name_beats_wildcard() -> anyhow::Result<()> {
    let settings = greeting_with(
        r#"
Modules:
  configuration:
    "*.Foo":
      Greeting: from-pattern
    Foo:
      Greeting: from-short-name
"#,
    )?;

    assert_eq!(settings.greeting, "from-short-name");
    Ok(())
}

#[test]
fn test_full_name_beats_short_name() -> anyhow::Result<()> {
    let settings = greeting_with(
        r#"
Modules:
  configuration:
    Foo:
      Greeting: short
    acme.web.foo:
      Greeting: full
"#,
    )?;

    assert_eq!(settings.greeting, "full");
    Ok(())
}

#[test]
fn test_primitive_values_round_trip() -> anyhow::Result<()> {
    let settings = greeting_with(
        r#"
Modules:
  configuration:
    Acme.Web.*:
      Greeting: hello
      Repeat: "42"
      Loud: "true"
"#,
    )?;

    assert_eq!(
        settings,
        GreetingSettings {
            greeting: "hello".to_string(),
            repeat: 42,
            loud: true,
        }
    );
    Ok(())
}

#[test]
fn test_conversion_failure_and_suppression() -> anyhow::Result<()> {
    let failed = greeting_with(
        r#"
Modules:
  configuration:
    Foo:
      Repeat:
        Value: not-an-int
        SuppressErrors: false
"#,
    );
    assert!(matches!(failed, Err(CoreError::Configuration { .. })));

    let settings = greeting_with(
        r#"
Modules:
  configuration:
    Foo:
      Repeat:
        Value: not-an-int
        SuppressErrors: true
"#,
    )?;
    assert_eq!(settings.repeat, 0);
    Ok(())
}

#[test]
fn test_event_handler_fires_during_registration() -> anyhow::Result<()> {
    let before = AUDIT_EVENTS.load(Ordering::SeqCst);

    greeting_with(
        r#"
Modules:
  configuration:
    Foo:
      Registered:
        Value: Listeners.OnRegistered
        Type: Event
        HintPath: plugins/audit
"#,
    )?;

    assert!(AUDIT_EVENTS.load(Ordering::SeqCst) > before);
    Ok(())
}

#[test]
fn test_two_parameter_constructor_selected() -> anyhow::Result<()> {
    let options = ActivationOptions::builder()
        .module::<TitleModule>()
        .provider(String::from("Quarterly"))
        .provider(true)
        .build()?;

    let (report, services) = run(options)?;

    let module = report
        .modules()
        .first()
        .and_then(|m| m.downcast_ref::<TitleModule>());
    assert_eq!(module.and_then(|m| m.verbose), Some(true));
    assert_eq!(services.resolve::<String>()?.as_str(), "Quarterly");
    Ok(())
}

#[test]
fn test_activation_is_repeatable() -> anyhow::Result<()> {
    let options = ActivationOptions::builder()
        .catalog(catalog())
        .discover("Acme.Env")
        .module::<GreetingModule>()
        .module::<TitleModule>()
        .instance(TitleModule {
            title: "Prebuilt".to_string(),
            verbose: None,
        })
        .provider(String::from("Constructed"))
        .build()?;
    let activator = ModuleActivator::new();

    let describe = |modules: Vec<ActivatedModule>| -> Vec<String> {
        modules
            .iter()
            .map(|m| match m.downcast_ref::<TitleModule>() {
                Some(title) => format!("{}={}", m.full_name(), title.title),
                None => m.full_name().to_string(),
            })
            .collect()
    };
    let first = describe(activator.activate(&options)?);
    let second = describe(activator.activate(&options)?);

    assert_eq!(first, second);
    assert_eq!(first.len(), 5);
    assert!(first.contains(&"Acme.Reports.TitleModule=Prebuilt".to_string()));
    Ok(())
}

#[test]
fn test_add_section_with_unresolved_module() -> anyhow::Result<()> {
    let unsuppressed = Configuration::from_yaml_str(
        r#"
Modules:
  add:
    - Acme.Env.Everywhere
    - Acme.Env.DoesNotExist
"#,
    )?;
    let result = ActivationOptions::builder()
        .catalog(catalog())
        .configuration(unsuppressed)
        .build();
    match result {
        Err(CoreError::Configuration { message, .. }) => {
            assert!(message.contains("Acme.Env.DoesNotExist"));
            assert!(!message.contains("Acme.Env.Everywhere"));
        }
        other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
    }

    let suppressed = Configuration::from_yaml_str(
        r#"
Modules:
  add:
    - Acme.Env.Everywhere
    - FullName: Acme.Env.DoesNotExist
      SuppressErrors: true
"#,
    )?;
    let options = ActivationOptions::builder()
        .catalog(catalog())
        .configuration(suppressed)
        .build()?;
    let (report, _) = run(options)?;

    assert_eq!(report.registered, vec!["Acme.Env.Everywhere".to_string()]);
    Ok(())
}

#[test]
fn test_environment_filter() -> anyhow::Result<()> {
    let options = ActivationOptions::builder()
        .catalog(catalog())
        .discover("Acme.Env")
        .environment(NamedEnvironment::new("development"))
        .build()?;

    let (report, _) = run(options)?;

    assert_eq!(report.environment.as_deref(), Some("development"));
    assert_eq!(
        report.registered,
        vec!["Acme.Env.DevTools".to_string(), "Acme.Env.Everywhere".to_string()]
    );
    assert_eq!(report.skipped, vec!["Acme.Env.ProdMetrics".to_string()]);
    Ok(())
}

#[test]
fn test_skip_section_and_custom_section_key() -> anyhow::Result<()> {
    let configuration = Configuration::from_yaml_str(
        r#"
Hosting:
  skip:
    - Acme.Env.DevTools
  configuration:
    Foo:
      Greeting: custom-section
"#,
    )?;
    let options = ActivationOptions::builder()
        .catalog(catalog())
        .discover("Acme.Env")
        .module::<GreetingModule>()
        .section_key("Hosting")
        .environment(Environment::Production)
        .configuration(configuration)
        .build()?;

    let (report, services) = run(options)?;

    assert!(!report.activated.iter().any(|name| name == "Acme.Env.DevTools"));
    assert_eq!(report.skipped, Vec::<String>::new());
    assert_eq!(
        services.resolve::<GreetingSettings>()?.greeting,
        "custom-section"
    );
    Ok(())
}

#[test]
fn test_layered_file_configuration() -> anyhow::Result<()> {
    let mut file = tempfile::Builder::new().suffix(".yaml").tempfile()?;
    writeln!(
        file,
        "Greetings:\n  Default: from-file\nModules:\n  configuration:\n    Foo:\n      Repeat: \"1\""
    )?;

    let configuration = Configuration::builder()
        .add_file(file.path())
        .add_in_memory([
            ("Modules:configuration:Foo:Repeat", "3"),
            ("Modules:configuration:Foo:Greeting:Value", "Greetings:Default"),
            ("Modules:configuration:Foo:Greeting:Type", "Config"),
        ])
        .build()?;

    let options = ActivationOptions::builder()
        .module::<GreetingModule>()
        .configuration(configuration)
        .build()?;
    let (_, services) = run(options)?;

    let settings = services.resolve::<GreetingSettings>()?;
    assert_eq!(settings.repeat, 3);
    assert_eq!(settings.greeting, "from-file");
    Ok(())
}

#[test]
fn test_runs_are_independent() -> anyhow::Result<()> {
    let mut greetings = Vec::new();
    for greeting in ["first", "second"] {
        let yaml = format!("Modules:\n  configuration:\n    Foo:\n      Greeting: {}\n", greeting);
        greetings.push(greeting_with(&yaml)?.greeting);
    }

    assert_eq!(greetings, vec!["first", "second"]);
    Ok(())
}
