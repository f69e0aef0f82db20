pub mod entity;
pub mod net;
pub mod reconcile;
pub mod registry;
pub mod scene;

pub use entity::{Entity, EntityStatus, Snapshot};
pub use net::{
    DEFAULT_PORT, EntityUpdate, ListenerConfig, MAX_MESSAGE_SIZE, ProtocolError, ReconnectPolicy,
    ServerMessage, TransportCounters, TransportError, TransportEvent, TransportListener,
    TransportStats, WireCoordinates, WireEntity, decode_message, encode_update,
};
pub use reconcile::Reconciler;
pub use registry::{EntityRegistry, SnapshotDiff};
pub use scene::{
    Color, InvariantViolation, MemoryScene, MutationCounts, ObjectHandle, Scene, SceneObject,
    SceneSynchronizer, SyncReport,
};
