mod config;
mod listener;
mod protocol;
mod stats;

pub use config::{ListenerConfig, ReconnectPolicy};
pub use listener::{TransportError, TransportEvent, TransportListener};
pub use protocol::{
    DEFAULT_PORT, ENTITY_UPDATE, EntityUpdate, MAX_MESSAGE_SIZE, ProtocolError, ServerMessage,
    WireCoordinates, WireEntity, decode_message, encode_update,
};
pub use stats::{TransportCounters, TransportStats};
