//! External message entity: model types, property bag, events, and formatting.

pub mod entity;
pub mod events;
pub mod format;
pub mod model;
pub mod properties;

pub use entity::{ExternMessage, MessageKey};
pub use events::MessageEvent;
pub use format::FormatCode;
pub use model::{ComparisonMode, Direction, PropertyType, Status};
pub use properties::PropertyBag;
