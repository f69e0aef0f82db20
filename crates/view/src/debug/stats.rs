use std::collections::VecDeque;
use std::time::Instant;

const SAMPLE_COUNT: usize = 60;

pub struct FrameStats {
    frame_times: VecDeque<f32>,
    snapshot_times: VecDeque<Instant>,
    fps: f32,
    snapshot_rate: f32,
}

impl Default for FrameStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameStats {
    pub fn new() -> Self {
        Self {
            frame_times: VecDeque::with_capacity(SAMPLE_COUNT),
            snapshot_times: VecDeque::with_capacity(SAMPLE_COUNT),
            fps: 0.0,
            snapshot_rate: 0.0,
        }
    }

    pub fn record_frame(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }

        if self.frame_times.len() >= SAMPLE_COUNT {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);

        let avg_dt: f32 = self.frame_times.iter().sum::<f32>() / self.frame_times.len() as f32;
        self.fps = 1.0 / avg_dt;
    }

    pub fn record_snapshot(&mut self) {
        self.record_snapshot_at(Instant::now());
    }

    fn record_snapshot_at(&mut self, now: Instant) {
        if self.snapshot_times.len() >= SAMPLE_COUNT {
            self.snapshot_times.pop_front();
        }
        self.snapshot_times.push_back(now);

        if let Some(oldest) = self.snapshot_times.front() {
            let elapsed = now.duration_since(*oldest).as_secs_f32();
            if elapsed > 0.0 {
                self.snapshot_rate = (self.snapshot_times.len() - 1) as f32 / elapsed;
            }
        }
    }

    pub fn fps(&self) -> f32 {
        self.fps
    }

    pub fn snapshot_rate(&self) -> f32 {
        self.snapshot_rate
    }
}
