use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_PORT: u16 = 27020;
pub const ENTITY_UPDATE: &str = "entity_update";
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WireCoordinates {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub z: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WireEntity {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<WireCoordinates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityUpdate {
    pub entities: Vec<WireEntity>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    EntityUpdate(EntityUpdate),
    Other { kind: String },
}

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message is not an object")]
    NotAnObject,
    #[error("message has no string \"type\" field")]
    MissingType,
    #[error("invalid entity_update payload: {0}")]
    InvalidUpdate(serde_json::Error),
}

#[derive(Serialize)]
struct TaggedUpdate<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(flatten)]
    update: &'a EntityUpdate,
}

/// Decodes one wire message. Messages of any type other than
/// `entity_update` decode to [`ServerMessage::Other`].
pub fn decode_message(text: &str) -> Result<ServerMessage, ProtocolError> {
    let value: Value = serde_json::from_str(text)?;
    let Value::Object(mut fields) = value else {
        return Err(ProtocolError::NotAnObject);
    };

    let kind = match fields.remove("type") {
        Some(Value::String(kind)) => kind,
        _ => return Err(ProtocolError::MissingType),
    };

    if kind != ENTITY_UPDATE {
        return Ok(ServerMessage::Other { kind });
    }

    let update = serde_json::from_value(Value::Object(fields))
        .map_err(ProtocolError::InvalidUpdate)?;
    Ok(ServerMessage::EntityUpdate(update))
}

pub fn encode_update(update: &EntityUpdate) -> Result<String, ProtocolError> {
    let tagged = TaggedUpdate {
        kind: ENTITY_UPDATE,
        update,
    };
    Ok(serde_json::to_string(&tagged)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_entity_update() {
        let text = r#"{
            "type": "entity_update",
            "entities": [
                {"id": "e1", "coordinates": {"x": 1.5, "y": -2, "z": 0}, "status": "active"},
                {"id": "e2", "coordinates": {"x": 0, "y": 0, "z": 3}, "status": "mystery"}
            ]
        }"#;

        let ServerMessage::EntityUpdate(update) = decode_message(text).unwrap() else {
            panic!("expected entity update");
        };

        assert_eq!(update.entities.len(), 2);
        assert_eq!(update.entities[0].id.as_deref(), Some("e1"));
        assert_eq!(
            update.entities[0].coordinates,
            Some(WireCoordinates {
                x: 1.5,
                y: -2.0,
                z: 0.0
            })
        );
        assert_eq!(update.entities[1].status.as_deref(), Some("mystery"));
    }

    #[test]
    fn test_other_types_are_not_errors() {
        let message = decode_message(r#"{"type": "heartbeat", "ts": 1}"#).unwrap();
        assert_eq!(
            message,
            ServerMessage::Other {
                kind: "heartbeat".to_string()
            }
        );
    }

    #[test]
    fn test_malformed_messages() {
        assert!(matches!(
            decode_message("{not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_message("[1, 2, 3]"),
            Err(ProtocolError::NotAnObject)
        ));
        assert!(matches!(
            decode_message(r#"{"entities": []}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode_message(r#"{"type": 7}"#),
            Err(ProtocolError::MissingType)
        ));
        assert!(matches!(
            decode_message(r#"{"type": "entity_update"}"#),
            Err(ProtocolError::InvalidUpdate(_))
        ));
        assert!(matches!(
            decode_message(r#"{"type": "entity_update", "entities": {"id": "e1"}}"#),
            Err(ProtocolError::InvalidUpdate(_))
        ));
    }

    #[test]
    fn test_encode_is_decodable() {
        let update = EntityUpdate {
            entities: vec![WireEntity {
                id: Some("e1".to_string()),
                coordinates: Some(WireCoordinates {
                    x: 1.0,
                    y: 2.0,
                    z: 3.0,
                }),
                status: Some("idle".to_string()),
            }],
        };

        let line = encode_update(&update).unwrap();
        assert!(!line.contains('\n'));
        assert!(line.starts_with(r#"{"type":"entity_update""#));
        assert_eq!(
            decode_message(&line).unwrap(),
            ServerMessage::EntityUpdate(update)
        );
    }
}
