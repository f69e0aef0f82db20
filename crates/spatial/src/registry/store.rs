use std::collections::HashMap;

use crate::entity::{Entity, Snapshot};

use super::diff::SnapshotDiff;

#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Entity>,
    generation: u64,
}

impl EntityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the whole state with `snapshot`. Entities missing from it are
    /// reported as removed; nothing is merged.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> SnapshotDiff {
        let mut next: HashMap<String, Entity> = HashMap::with_capacity(snapshot.len());
        let mut order: Vec<String> = Vec::with_capacity(snapshot.len());

        for entity in snapshot {
            if next.contains_key(&entity.id) {
                log::warn!("Duplicate entity id {:?} in snapshot, keeping last", entity.id);
            } else {
                order.push(entity.id.clone());
            }
            next.insert(entity.id.clone(), entity);
        }

        let mut diff = SnapshotDiff::default();

        for id in order {
            match (self.entities.get(&id), next.get(&id)) {
                (None, Some(_)) => diff.added.push(id),
                (Some(previous), Some(current)) if !previous.same_state(current) => {
                    diff.changed.push(id)
                }
                _ => {}
            }
        }

        diff.removed = self
            .entities
            .keys()
            .filter(|id| !next.contains_key(*id))
            .cloned()
            .collect();
        diff.removed.sort();

        self.entities = next;
        self.generation = self.generation.wrapping_add(1);

        diff
    }

    pub fn clear(&mut self) -> SnapshotDiff {
        self.apply_snapshot(Snapshot::empty())
    }

    pub fn get(&self, id: &str) -> Option<&Entity> {
        self.entities.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.entities.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Number of snapshots applied so far.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}
