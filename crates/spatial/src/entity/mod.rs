mod model;
mod snapshot;
mod status;

pub use model::Entity;
pub use snapshot::Snapshot;
pub use status::EntityStatus;
