pub mod collection;
pub mod scope;

pub use collection::{ServiceCollection, ServiceEntry};
pub use scope::ServiceScope;
