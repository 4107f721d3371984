pub mod activator;
pub mod applicator;
pub mod definition;
pub mod descriptors;
pub mod events;
pub mod host;
pub mod library;
pub mod matching;
pub mod options;

pub use activator::*;
pub use applicator::*;
pub use definition::*;
pub use descriptors::*;
pub use events::*;
pub use host::*;
pub use library::*;
pub use matching::{MatchKind, OverlayMatch, Specificity};
pub use options::*;
