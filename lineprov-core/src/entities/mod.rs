pub mod event;

pub use event::{Event, EventPatch, GetEventById, InsertEvent, ListEvents, ReplaceEvent};
