pub mod pool;
pub mod type_key;

pub use pool::*;
pub use type_key::*;
