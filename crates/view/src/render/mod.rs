mod camera;
mod headless;
mod terminal;

use anyhow::Result;
use spatial::{EntityRegistry, EntityStatus, MemoryScene, SyncReport, TransportStats};

use crate::app::ConnectionStatus;

pub use headless::HeadlessRenderer;
pub use terminal::TerminalRenderer;

/// Read-only view of everything a renderer may draw for one frame.
pub struct FrameContext<'a> {
    pub scene: &'a MemoryScene,
    pub registry: &'a EntityRegistry,
    pub connection: &'a ConnectionStatus,
    pub transport: TransportStats,
    pub last_sync: SyncReport,
    pub frame: u64,
    pub fps: f32,
    pub snapshot_rate: f32,
}

impl FrameContext<'_> {
    pub fn status_counts(&self) -> StatusCounts {
        let mut counts = StatusCounts::default();
        for entity in self.registry.iter() {
            match entity.status {
                EntityStatus::Active => counts.active += 1,
                EntityStatus::Idle => counts.idle += 1,
                EntityStatus::Alert => counts.alert += 1,
                EntityStatus::Unknown => counts.unknown += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub active: usize,
    pub idle: usize,
    pub alert: usize,
    pub unknown: usize,
}

pub trait FrameRenderer {
    fn draw(&mut self, frame: &FrameContext<'_>) -> Result<()>;

    fn quit_requested(&mut self) -> bool {
        false
    }
}
