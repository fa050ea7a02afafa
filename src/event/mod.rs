mod derive;
mod types;

pub use derive::derive_events;
pub use types::{AttributeValue, Attributes, Event, EventKind, Location, SensorReport};
