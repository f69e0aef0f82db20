use crate::entity::Snapshot;
use crate::registry::{EntityRegistry, SnapshotDiff};
use crate::scene::{Scene, SceneSynchronizer, SyncReport};

/// Registry, synchronizer and scene bundled behind one mutation entry point,
/// so a snapshot is always applied to all three as one step.
#[derive(Debug, Default)]
pub struct Reconciler<S> {
    registry: EntityRegistry,
    synchronizer: SceneSynchronizer,
    scene: S,
}

impl<S: Scene> Reconciler<S> {
    pub fn new(scene: S) -> Self {
        Self {
            registry: EntityRegistry::new(),
            synchronizer: SceneSynchronizer::new(),
            scene,
        }
    }

    pub fn apply_snapshot(&mut self, snapshot: Snapshot) -> (SnapshotDiff, SyncReport) {
        let diff = self.registry.apply_snapshot(snapshot);
        let report = self
            .synchronizer
            .apply(&diff, &self.registry, &mut self.scene);
        (diff, report)
    }

    pub fn reset(&mut self) -> SyncReport {
        let diff = self.registry.clear();
        self.synchronizer
            .apply(&diff, &self.registry, &mut self.scene)
    }

    /// Swaps in a new scene and repopulates it from the registry. The old
    /// scene is returned with its objects detached.
    pub fn replace_scene(&mut self, scene: S) -> S {
        let mut old = std::mem::replace(&mut self.scene, scene);
        self.synchronizer.clear(&mut old);
        self.synchronizer.rebuild(&self.registry, &mut self.scene);
        old
    }

    pub fn registry(&self) -> &EntityRegistry {
        &self.registry
    }

    pub fn synchronizer(&self) -> &SceneSynchronizer {
        &self.synchronizer
    }

    pub fn scene(&self) -> &S {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut S {
        &mut self.scene
    }
}
