pub mod entities;
pub mod patch;
pub mod repository;

pub use entities::Track;
pub use patch::{FieldScope, PropagationPolicy, TrackField, TrackPatch};
pub use repository::{BatchUpdateResult, TrackStore};
