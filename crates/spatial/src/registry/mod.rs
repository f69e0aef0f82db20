mod diff;
mod store;

pub use diff::SnapshotDiff;
pub use store::EntityRegistry;
