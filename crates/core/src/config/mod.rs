pub mod builder;
pub mod configuration;
pub mod convert;
pub mod environment;
pub mod loader;
pub mod overlay;
pub mod sources;

pub use builder::*;
pub use configuration::{ConfigSection, Configuration, KEY_DELIMITER};
pub use convert::*;
pub use environment::*;
pub use loader::*;
pub use overlay::*;
pub use sources::*;
