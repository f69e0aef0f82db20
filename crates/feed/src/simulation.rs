use glam::DVec3;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use spatial::{Entity, EntityStatus, Snapshot};

use crate::config::FeedConfig;

/// Status strings put on the wire. `offline` is deliberately outside the
/// viewer's vocabulary and shows up as unknown.
const STATUSES: [&str; 3] = ["active", "idle", "alert"];
const UNLISTED_STATUS: &str = "offline";
const UNLISTED_CHANCE: f64 = 0.1;

pub fn random_seed() -> u64 {
    use std::collections::hash_map::RandomState;
    use std::hash::{BuildHasher, Hasher};

    let state = RandomState::new();
    let mut hasher = state.build_hasher();
    hasher.write_u128(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos(),
    );
    hasher.finish()
}

pub struct FeedWorld {
    entities: Vec<Entity>,
    rng: StdRng,
    next_id: u64,
    tick: u64,
    extent: f64,
    step: f64,
    status_change_chance: f64,
    churn_chance: f64,
}

impl FeedWorld {
    pub fn new(config: &FeedConfig) -> Self {
        let seed = config.seed.unwrap_or_else(random_seed);
        let mut world = Self {
            entities: Vec::with_capacity(config.entity_count),
            rng: StdRng::seed_from_u64(seed),
            next_id: 0,
            tick: 0,
            extent: config.extent.max(1.0),
            step: config.step,
            status_change_chance: config.status_change_chance.clamp(0.0, 1.0),
            churn_chance: config.churn_chance.clamp(0.0, 1.0),
        };

        for _ in 0..config.entity_count {
            let entity = world.spawn();
            world.entities.push(entity);
        }
        world
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn snapshot(&self) -> Snapshot {
        Snapshot::new(self.entities.clone())
    }

    /// Advances one tick and returns the resulting complete snapshot.
    pub fn step(&mut self) -> Snapshot {
        self.tick += 1;

        for i in 0..self.entities.len() {
            if self.rng.gen_bool(self.status_change_chance) {
                let raw = self.random_status();
                let entity = &mut self.entities[i];
                entity.status = EntityStatus::classify(raw);
                entity.raw_status = raw.to_string();
            }

            // Idle and unreachable entities hold still.
            if matches!(
                self.entities[i].status,
                EntityStatus::Active | EntityStatus::Alert
            ) {
                let delta = self.random_unit_cube() * self.step;
                let extent = DVec3::splat(self.extent);
                let entity = &mut self.entities[i];
                entity.position = (entity.position + delta).clamp(-extent, extent);
            }
        }

        if !self.entities.is_empty() && self.rng.gen_bool(self.churn_chance) {
            let index = self.rng.gen_range(0..self.entities.len());
            let gone = self.entities.remove(index);
            let fresh = self.spawn();
            log::debug!("Tick {}: {} despawned, {} spawned", self.tick, gone.id, fresh.id);
            self.entities.push(fresh);
        }

        self.snapshot()
    }

    fn spawn(&mut self) -> Entity {
        self.next_id += 1;
        let id = format!("unit-{:03}", self.next_id);
        let position = self.random_unit_cube() * self.extent;
        let raw = self.random_status();
        Entity::with_raw_status(id, position, raw)
    }

    /// Uniform in `[-1, 1)` on each axis.
    fn random_unit_cube(&mut self) -> DVec3 {
        DVec3::new(
            self.rng.gen_range(-1.0..1.0),
            self.rng.gen_range(-1.0..1.0),
            self.rng.gen_range(-1.0..1.0),
        )
    }

    fn random_status(&mut self) -> &'static str {
        if self.rng.gen_bool(UNLISTED_CHANCE) {
            UNLISTED_STATUS
        } else {
            STATUSES[self.rng.gen_range(0..STATUSES.len())]
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    fn config(seed: u64) -> FeedConfig {
        FeedConfig {
            seed: Some(seed),
            ..FeedConfig::default()
        }
    }

    #[test]
    fn test_same_seed_same_feed() {
        let mut a = FeedWorld::new(&config(7));
        let mut b = FeedWorld::new(&config(7));

        for _ in 0..50 {
            assert_eq!(a.step(), b.step());
        }
    }

    #[test]
    fn test_entities_stay_inside_extent() {
        let config = FeedConfig {
            step: 5.0,
            ..config(3)
        };
        let mut world = FeedWorld::new(&config);

        for _ in 0..200 {
            let snapshot = world.step();
            for entity in snapshot.iter() {
                assert!(entity.position.abs().max_element() <= config.extent);
            }
        }
    }

    #[test]
    fn test_churn_keeps_count_and_unique_ids() {
        let config = FeedConfig {
            churn_chance: 1.0,
            ..config(11)
        };
        let mut world = FeedWorld::new(&config);
        let before: HashSet<String> = world.snapshot().ids().map(str::to_string).collect();

        let snapshot = world.step();
        let after: HashSet<String> = snapshot.ids().map(str::to_string).collect();

        assert_eq!(snapshot.len(), config.entity_count);
        assert_eq!(after.len(), config.entity_count);
        assert_eq!(before.difference(&after).count(), 1);
        assert_eq!(world.tick(), 1);
    }

    #[test]
    fn test_idle_entities_hold_position() {
        let config = FeedConfig {
            status_change_chance: 0.0,
            churn_chance: 0.0,
            ..config(5)
        };
        let mut world = FeedWorld::new(&config);
        let first = world.snapshot();
        let second = world.step();

        for (before, after) in first.iter().zip(second.iter()) {
            assert_eq!(before.id, after.id);
            if matches!(before.status, EntityStatus::Idle | EntityStatus::Unknown) {
                assert_eq!(before.position, after.position);
            }
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let a = FeedWorld::new(&config(1)).snapshot();
        let b = FeedWorld::new(&config(2)).snapshot();

        let positions = |s: &Snapshot| s.iter().map(|e| e.position).collect::<Vec<_>>();
        assert_ne!(positions(&a), positions(&b));
    }

    #[test]
    fn test_out_of_range_chances_are_clamped() {
        let config = FeedConfig {
            status_change_chance: 3.0,
            churn_chance: -1.0,
            ..config(9)
        };
        let mut world = FeedWorld::new(&config);
        let ids: Vec<String> = world.snapshot().ids().map(str::to_string).collect();

        let snapshot = world.step();
        let after: Vec<String> = snapshot.ids().map(str::to_string).collect();
        assert_eq!(ids, after);
    }
}
