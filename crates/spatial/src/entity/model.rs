use glam::DVec3;

use crate::net::{WireCoordinates, WireEntity};

use super::status::EntityStatus;

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub position: DVec3,
    pub status: EntityStatus,
    pub raw_status: String,
}

impl Entity {
    pub fn new(id: impl Into<String>, position: DVec3, status: EntityStatus) -> Self {
        Self {
            id: id.into(),
            position,
            status,
            raw_status: status.as_str().to_string(),
        }
    }

    pub fn with_raw_status(id: impl Into<String>, position: DVec3, raw_status: &str) -> Self {
        Self {
            id: id.into(),
            position,
            status: EntityStatus::classify(raw_status),
            raw_status: raw_status.to_string(),
        }
    }

    /// Value equality on the fields that drive the scene: position and
    /// classified status. Two unknown statuses with different raw text are
    /// the same state.
    pub fn same_state(&self, other: &Entity) -> bool {
        self.position == other.position && self.status == other.status
    }

    pub fn from_wire(wire: &WireEntity) -> Option<Self> {
        let id = wire.id.as_ref()?;
        let position = wire
            .coordinates
            .as_ref()
            .map(|c| DVec3::new(c.x, c.y, c.z))
            .unwrap_or(DVec3::ZERO);
        let raw_status = wire.status.as_deref().unwrap_or_default();

        Some(Self::with_raw_status(id.clone(), position, raw_status))
    }

    pub fn to_wire(&self) -> WireEntity {
        WireEntity {
            id: Some(self.id.clone()),
            coordinates: Some(WireCoordinates {
                x: self.position.x,
                y: self.position.y,
                z: self.position.z,
            }),
            status: Some(self.raw_status.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_roundtrip() {
        let entity = Entity::new("drone-7", DVec3::new(10.0, 5.0, -3.0), EntityStatus::Alert);

        let reconstructed = Entity::from_wire(&entity.to_wire()).unwrap();

        assert_eq!(entity, reconstructed);
    }

    #[test]
    fn test_wire_entity_without_id_is_skipped() {
        let wire = WireEntity {
            id: None,
            coordinates: Some(WireCoordinates {
                x: 1.0,
                y: 2.0,
                z: 3.0,
            }),
            status: Some("active".to_string()),
        };

        assert!(Entity::from_wire(&wire).is_none());
    }

    #[test]
    fn test_missing_fields_default() {
        let wire = WireEntity {
            id: Some("e1".to_string()),
            coordinates: None,
            status: None,
        };

        let entity = Entity::from_wire(&wire).unwrap();
        assert_eq!(entity.position, DVec3::ZERO);
        assert_eq!(entity.status, EntityStatus::Unknown);
    }

    #[test]
    fn test_unknown_raw_statuses_share_state() {
        let a = Entity::with_raw_status("e1", DVec3::ZERO, "offline");
        let b = Entity::with_raw_status("e1", DVec3::ZERO, "sleeping");

        assert!(a.same_state(&b));
        assert_ne!(a, b);
    }
}
