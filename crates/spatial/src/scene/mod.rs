mod color;
mod error;
mod graph;
mod sync;

pub use color::Color;
pub use error::InvariantViolation;
pub use graph::{MemoryScene, MutationCounts, ObjectHandle, Scene, SceneObject};
pub use sync::{SceneSynchronizer, SyncReport};
