use glam::DVec3;

use crate::entity::Entity;

use super::color::Color;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    index: u32,
    generation: u32,
}

impl ObjectHandle {
    pub fn index(self) -> u32 {
        self.index
    }

    pub fn generation(self) -> u32 {
        self.generation
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SceneObject {
    pub label: String,
    pub position: DVec3,
    pub color: Color,
}

impl SceneObject {
    pub fn new(label: impl Into<String>, position: DVec3, color: Color) -> Self {
        Self {
            label: label.into(),
            position,
            color,
        }
    }

    pub fn for_entity(entity: &Entity) -> Self {
        Self::new(
            entity.id.clone(),
            entity.position,
            Color::for_status(entity.status),
        )
    }
}

/// Mutation surface the synchronizer drives. Implemented by whatever owns the
/// renderable objects.
pub trait Scene {
    fn add_object(&mut self, object: SceneObject) -> ObjectHandle;
    fn remove_object(&mut self, handle: ObjectHandle) -> Option<SceneObject>;
    fn set_position(&mut self, handle: ObjectHandle, position: DVec3) -> bool;
    fn set_color(&mut self, handle: ObjectHandle, color: Color) -> bool;
    fn object(&self, handle: ObjectHandle) -> Option<&SceneObject>;
    fn object_count(&self) -> usize;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MutationCounts {
    pub added: u64,
    pub removed: u64,
    pub position_writes: u64,
    pub color_writes: u64,
}

impl MutationCounts {
    pub fn total(&self) -> u64 {
        self.added + self.removed + self.position_writes + self.color_writes
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    object: Option<SceneObject>,
}

/// Retained scene graph. Slots are reused after removal; the generation in
/// each handle keeps stale handles from resolving to a newer object.
#[derive(Debug, Default)]
pub struct MemoryScene {
    slots: Vec<Slot>,
    free: Vec<u32>,
    len: usize,
    mutations: MutationCounts,
}

impl MemoryScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (ObjectHandle, &SceneObject)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.object.as_ref().map(|object| {
                (
                    ObjectHandle {
                        index: index as u32,
                        generation: slot.generation,
                    },
                    object,
                )
            })
        })
    }

    pub fn objects(&self) -> impl Iterator<Item = &SceneObject> {
        self.iter().map(|(_, object)| object)
    }

    pub fn find(&self, label: &str) -> Option<(ObjectHandle, &SceneObject)> {
        self.iter().find(|(_, object)| object.label == label)
    }

    pub fn mutations(&self) -> MutationCounts {
        self.mutations
    }

    pub fn reset_mutations(&mut self) {
        self.mutations = MutationCounts::default();
    }

    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        self.objects().fold(None, |acc, object| match acc {
            None => Some((object.position, object.position)),
            Some((min, max)) => Some((min.min(object.position), max.max(object.position))),
        })
    }

    fn slot_mut(&mut self, handle: ObjectHandle) -> Option<&mut SceneObject> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_mut())
    }
}

impl Scene for MemoryScene {
    fn add_object(&mut self, object: SceneObject) -> ObjectHandle {
        self.mutations.added += 1;
        self.len += 1;

        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            return ObjectHandle {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            object: Some(object),
        });
        ObjectHandle {
            index,
            generation: 0,
        }
    }

    fn remove_object(&mut self, handle: ObjectHandle) -> Option<SceneObject> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)?;
        let object = slot.object.take()?;

        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        self.mutations.removed += 1;

        Some(object)
    }

    fn set_position(&mut self, handle: ObjectHandle, position: DVec3) -> bool {
        let Some(object) = self.slot_mut(handle) else {
            return false;
        };
        object.position = position;
        self.mutations.position_writes += 1;
        true
    }

    fn set_color(&mut self, handle: ObjectHandle, color: Color) -> bool {
        let Some(object) = self.slot_mut(handle) else {
            return false;
        };
        object.color = color;
        self.mutations.color_writes += 1;
        true
    }

    fn object(&self, handle: ObjectHandle) -> Option<&SceneObject> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.object.as_ref())
    }

    fn object_count(&self) -> usize {
        self.len
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(label: &str) -> SceneObject {
        SceneObject::new(label, DVec3::ZERO, Color::GRAY)
    }

    #[test]
    fn test_add_and_remove() {
        let mut scene = MemoryScene::new();

        let a = scene.add_object(object("a"));
        let b = scene.add_object(object("b"));
        assert_eq!(scene.object_count(), 2);

        assert_eq!(scene.remove_object(a).unwrap().label, "a");
        assert_eq!(scene.object_count(), 1);
        assert!(scene.object(a).is_none());
        assert_eq!(scene.object(b).unwrap().label, "b");
    }

    #[test]
    fn test_stale_handle_does_not_resolve_after_reuse() {
        let mut scene = MemoryScene::new();

        let old = scene.add_object(object("old"));
        scene.remove_object(old);
        let new = scene.add_object(object("new"));

        assert_eq!(old.index(), new.index());
        assert_ne!(old.generation(), new.generation());
        assert!(scene.object(old).is_none());
        assert!(scene.remove_object(old).is_none());
        assert!(!scene.set_position(old, DVec3::ONE));
        assert_eq!(scene.object(new).unwrap().position, DVec3::ZERO);
    }

    #[test]
    fn test_mutation_counts() {
        let mut scene = MemoryScene::new();

        let a = scene.add_object(object("a"));
        scene.set_position(a, DVec3::X);
        scene.set_color(a, Color::RED);
        scene.remove_object(a);

        let counts = scene.mutations();
        assert_eq!(counts.added, 1);
        assert_eq!(counts.position_writes, 1);
        assert_eq!(counts.color_writes, 1);
        assert_eq!(counts.removed, 1);
        assert_eq!(counts.total(), 4);

        scene.reset_mutations();
        assert_eq!(scene.mutations().total(), 0);
    }

    #[test]
    fn test_bounds_cover_all_objects() {
        let mut scene = MemoryScene::new();
        assert!(scene.bounds().is_none());

        scene.add_object(SceneObject::new("a", DVec3::new(-1.0, 2.0, 0.0), Color::RED));
        scene.add_object(SceneObject::new("b", DVec3::new(3.0, -4.0, 5.0), Color::RED));

        let (min, max) = scene.bounds().unwrap();
        assert_eq!(min, DVec3::new(-1.0, -4.0, 0.0));
        assert_eq!(max, DVec3::new(3.0, 2.0, 5.0));
    }
}
