use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantViolation {
    #[error("entity {id:?} is registered but has no scene object")]
    MissingObject { id: String },

    #[error("scene object for {id:?} has no registry entry")]
    OrphanedObject { id: String },

    #[error("entity {id:?} is in the registry but not in the scene")]
    UnrenderedEntity { id: String },

    #[error("entity {id:?} already has a scene object")]
    DuplicateObject { id: String },

    #[error("diff names {id:?} but the registry does not hold it")]
    DanglingDiff { id: String },

    #[error("scene object registered for {id:?} is labelled {label:?}")]
    MislabeledObject { id: String, label: String },

    #[error("scene holds {scene} objects but {tracked} are tracked")]
    UntrackedObjects { scene: usize, tracked: usize },
}
