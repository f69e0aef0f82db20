use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub enum FeedEvent {
    ClientConnected {
        client_id: u32,
        addr: SocketAddr,
    },
    ClientDisconnected {
        client_id: u32,
        reason: DisconnectReason,
    },
    ClientLagged {
        client_id: u32,
        skipped: u64,
    },
    ConnectionDenied {
        addr: SocketAddr,
        reason: String,
    },
    Error {
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    Closed,
    WriteFailed,
    Shutdown,
}

impl DisconnectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisconnectReason::Closed => "disconnected",
            DisconnectReason::WriteFailed => "dropped (write failed)",
            DisconnectReason::Shutdown => "closed by shutdown",
        }
    }
}
