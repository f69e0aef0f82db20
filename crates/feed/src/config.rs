#[derive(Debug, Clone)]
pub struct FeedConfig {
    pub tick_rate: u32,
    pub entity_count: usize,
    pub max_clients: usize,
    /// Half-width of the cube entities wander in.
    pub extent: f64,
    /// Largest per-axis move in one tick.
    pub step: f64,
    pub status_change_chance: f64,
    /// Chance per tick that one entity despawns and a fresh one spawns.
    pub churn_chance: f64,
    /// Snapshots buffered per client before it starts skipping.
    pub client_buffer: usize,
    pub seed: Option<u64>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            tick_rate: 10,
            entity_count: 12,
            max_clients: 32,
            extent: 20.0,
            step: 0.5,
            status_change_chance: 0.05,
            churn_chance: 0.02,
            client_buffer: 16,
            seed: None,
        }
    }
}
