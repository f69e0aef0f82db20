use spatial::ListenerConfig;

pub const DEFAULT_FRAME_RATE: u32 = 30;
pub const DEFAULT_SUMMARY_EVERY: u64 = 30;

#[derive(Debug, Clone)]
pub struct ViewConfig {
    pub listener: ListenerConfig,
    pub frame_rate: u32,
    pub headless: bool,
    pub summary_every: u64,
    pub exit_when_feed_ends: bool,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            listener: ListenerConfig::default(),
            frame_rate: DEFAULT_FRAME_RATE,
            headless: false,
            summary_every: DEFAULT_SUMMARY_EVERY,
            exit_when_feed_ends: false,
        }
    }
}
