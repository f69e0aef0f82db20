use anyhow::Result;

use super::{FrameContext, FrameRenderer};

/// Logs a scene summary every `every` frames instead of drawing.
pub struct HeadlessRenderer {
    every: u64,
}

impl HeadlessRenderer {
    pub fn new(every: u64) -> Self {
        Self {
            every: every.max(1),
        }
    }

    pub fn summary(frame: &FrameContext<'_>) -> String {
        let counts = frame.status_counts();
        format!(
            "[{}] {} objects (active {}, idle {}, alert {}, unknown {}) | snapshots {} ({:.1}/s) dropped {} | {:.0} fps",
            frame.connection,
            frame.scene.iter().count(),
            counts.active,
            counts.idle,
            counts.alert,
            counts.unknown,
            frame.transport.snapshots_forwarded,
            frame.snapshot_rate,
            frame.transport.messages_dropped,
            frame.fps,
        )
    }
}

impl FrameRenderer for HeadlessRenderer {
    fn draw(&mut self, frame: &FrameContext<'_>) -> Result<()> {
        if frame.frame % self.every == 0 {
            log::info!("{}", Self::summary(frame));
        }
        Ok(())
    }
}
