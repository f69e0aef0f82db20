use std::collections::HashMap;

use crate::registry::{EntityRegistry, SnapshotDiff};

use super::color::Color;
use super::error::InvariantViolation;
use super::graph::{ObjectHandle, Scene, SceneObject};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub updated: usize,
    pub destroyed: usize,
    pub position_writes: usize,
    pub color_writes: usize,
}

impl SyncReport {
    pub fn is_noop(&self) -> bool {
        self.created == 0 && self.updated == 0 && self.destroyed == 0
    }
}

impl std::ops::AddAssign for SyncReport {
    fn add_assign(&mut self, other: Self) {
        self.created += other.created;
        self.updated += other.updated;
        self.destroyed += other.destroyed;
        self.position_writes += other.position_writes;
        self.color_writes += other.color_writes;
    }
}

/// Owns the identifier to scene object mapping and keeps it matched to the
/// registry. The registry is only read.
#[derive(Debug, Default)]
pub struct SceneSynchronizer {
    objects: HashMap<String, ObjectHandle>,
}

impl SceneSynchronizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies `diff` and verifies the scene afterwards.
    ///
    /// # Panics
    ///
    /// Panics if the scene and registry disagree. That can only happen if the
    /// diff did not come from `registry`, or something other than this
    /// synchronizer mutated the scene.
    pub fn apply<S: Scene>(
        &mut self,
        diff: &SnapshotDiff,
        registry: &EntityRegistry,
        scene: &mut S,
    ) -> SyncReport {
        match self.try_apply(diff, registry, scene) {
            Ok(report) => report,
            Err(violation) => panic!("scene synchronization invariant violated: {violation}"),
        }
    }

    pub fn try_apply<S: Scene>(
        &mut self,
        diff: &SnapshotDiff,
        registry: &EntityRegistry,
        scene: &mut S,
    ) -> Result<SyncReport, InvariantViolation> {
        let mut report = SyncReport::default();

        for id in &diff.removed {
            let handle = self
                .objects
                .remove(id)
                .ok_or_else(|| InvariantViolation::MissingObject { id: id.clone() })?;
            scene
                .remove_object(handle)
                .ok_or_else(|| InvariantViolation::MissingObject { id: id.clone() })?;
            report.destroyed += 1;
        }

        for id in &diff.added {
            let entity = registry
                .get(id)
                .ok_or_else(|| InvariantViolation::DanglingDiff { id: id.clone() })?;
            if self.objects.contains_key(id) {
                return Err(InvariantViolation::DuplicateObject { id: id.clone() });
            }
            let handle = scene.add_object(SceneObject::for_entity(entity));
            self.objects.insert(id.clone(), handle);
            report.created += 1;
        }

        for id in &diff.changed {
            let entity = registry
                .get(id)
                .ok_or_else(|| InvariantViolation::DanglingDiff { id: id.clone() })?;
            let handle = *self
                .objects
                .get(id)
                .ok_or_else(|| InvariantViolation::MissingObject { id: id.clone() })?;
            let object = scene
                .object(handle)
                .ok_or_else(|| InvariantViolation::MissingObject { id: id.clone() })?;

            let color = Color::for_status(entity.status);
            let move_to = (object.position != entity.position).then_some(entity.position);
            let recolor = (object.color != color).then_some(color);

            if let Some(position) = move_to {
                scene.set_position(handle, position);
                report.position_writes += 1;
            }
            if let Some(color) = recolor {
                scene.set_color(handle, color);
                report.color_writes += 1;
            }
            report.updated += 1;
        }

        self.check_invariants(registry, scene)?;

        if !report.is_noop() {
            log::trace!(
                "Scene sync: {} created, {} updated, {} destroyed",
                report.created,
                report.updated,
                report.destroyed
            );
        }

        Ok(report)
    }

    pub fn check_invariants<S: Scene>(
        &self,
        registry: &EntityRegistry,
        scene: &S,
    ) -> Result<(), InvariantViolation> {
        for (id, handle) in &self.objects {
            if !registry.contains(id) {
                return Err(InvariantViolation::OrphanedObject { id: id.clone() });
            }
            let object = scene
                .object(*handle)
                .ok_or_else(|| InvariantViolation::MissingObject { id: id.clone() })?;
            if object.label != *id {
                return Err(InvariantViolation::MislabeledObject {
                    id: id.clone(),
                    label: object.label.clone(),
                });
            }
        }

        if let Some(id) = registry.ids().find(|id| !self.objects.contains_key(*id)) {
            return Err(InvariantViolation::UnrenderedEntity { id: id.to_string() });
        }

        if scene.object_count() != self.objects.len() {
            return Err(InvariantViolation::UntrackedObjects {
                scene: scene.object_count(),
                tracked: self.objects.len(),
            });
        }

        Ok(())
    }

    pub fn clear<S: Scene>(&mut self, scene: &mut S) -> usize {
        let mut removed = 0;
        for (_, handle) in self.objects.drain() {
            if scene.remove_object(handle).is_some() {
                removed += 1;
            }
        }
        removed
    }

    /// Recreates an object for every registry entry. Used when the scene the
    /// objects lived in has been replaced.
    pub fn rebuild<S: Scene>(&mut self, registry: &EntityRegistry, scene: &mut S) -> SyncReport {
        self.objects.clear();

        let mut report = SyncReport::default();
        for entity in registry.iter() {
            let handle = scene.add_object(SceneObject::for_entity(entity));
            self.objects.insert(entity.id.clone(), handle);
            report.created += 1;
        }

        if let Err(violation) = self.check_invariants(registry, scene) {
            panic!("scene rebuild invariant violated: {violation}");
        }
        report
    }

    pub fn handle(&self, id: &str) -> Option<ObjectHandle> {
        self.objects.get(id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.objects.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}
