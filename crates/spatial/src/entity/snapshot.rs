use crate::net::EntityUpdate;

use super::model::Entity;

/// Complete world state at one instant. Anything absent is gone.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    entities: Vec<Entity>,
}

impl Snapshot {
    pub fn new(entities: Vec<Entity>) -> Self {
        Self { entities }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_update(update: &EntityUpdate) -> Self {
        let mut skipped = 0usize;
        let entities = update
            .entities
            .iter()
            .filter_map(|wire| {
                let entity = Entity::from_wire(wire);
                if entity.is_none() {
                    skipped += 1;
                }
                entity
            })
            .collect();

        if skipped > 0 {
            log::debug!("Skipped {} entities without an id", skipped);
        }

        Self { entities }
    }

    pub fn to_update(&self) -> EntityUpdate {
        EntityUpdate {
            entities: self.entities.iter().map(Entity::to_wire).collect(),
        }
    }

    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entity> {
        self.entities.iter()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entities.iter().map(|e| e.id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

impl FromIterator<Entity> for Snapshot {
    fn from_iter<I: IntoIterator<Item = Entity>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl IntoIterator for Snapshot {
    type Item = Entity;
    type IntoIter = std::vec::IntoIter<Entity>;

    fn into_iter(self) -> Self::IntoIter {
        self.entities.into_iter()
    }
}
