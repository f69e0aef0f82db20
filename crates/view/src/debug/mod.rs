mod stats;

pub use stats::FrameStats;
