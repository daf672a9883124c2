//! WebSocket protocol message definitions
//! These are the wire types for client-server communication

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// Transmission position shown to other players
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Gear {
    /// Park
    #[default]
    P,
    /// Drive
    D,
    /// Reverse
    R,
}

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMsg {
    /// Enter the shared world. Every field is optional; missing or empty
    /// fields fall back to defaults.
    Join {
        #[serde(default, deserialize_with = "lenient_string")]
        nickname: Option<String>,
        #[serde(default, alias = "carModel", deserialize_with = "lenient_string")]
        vehicle_model: Option<String>,
        #[serde(default, alias = "carColor", deserialize_with = "lenient_string")]
        color: Option<String>,
    },

    /// Latest control state. Replaces the previous one wholesale.
    Input {
        #[serde(default, alias = "accel")]
        accelerate: bool,
        #[serde(default)]
        brake: bool,
        #[serde(default, alias = "left")]
        steer_left: bool,
        #[serde(default, alias = "right")]
        steer_right: bool,
        /// Optional gear change
        #[serde(default)]
        gear: Option<Gear>,
    },

    /// Free-text chat line
    Chat {
        message: String,
    },

    /// Ping for latency measurement
    Ping {
        /// Client timestamp
        t: u64,
    },
}

/// Non-string values read as missing so a sloppy join still gets defaults
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => Some(s),
        _ => None,
    })
}

/// Messages sent from server to client
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMsg {
    /// Sent once to a connection right after it joins
    IdentityAssigned {
        id: Uuid,
    },

    /// World state (sent at regular intervals and on roster changes)
    Snapshot {
        /// Physics tick the transforms belong to
        tick: u64,
        /// Every joined player keyed by connection id
        players: HashMap<Uuid, PlayerSnapshot>,
    },

    /// Chat line relayed to everyone
    Chat {
        sender: String,
        message: String,
    },

    /// Error message
    Error {
        code: String,
        message: String,
    },

    /// Pong response
    Pong {
        /// Echo back client timestamp
        t: u64,
    },
}

/// Player state in a snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerSnapshot {
    pub nickname: String,
    pub vehicle_model: String,
    pub color: String,
    pub position: Position,
    pub rotation: Rotation,
    pub gear: Gear,
}

/// World-space position
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

/// Orientation quaternion
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Default for Rotation {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
            w: 1.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_accepts_empty_payload() {
        let msg: ClientMsg = serde_json::from_str(r#"{"type":"join"}"#).unwrap();
        match msg {
            ClientMsg::Join {
                nickname,
                vehicle_model,
                color,
            } => {
                assert!(nickname.is_none());
                assert!(vehicle_model.is_none());
                assert!(color.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn join_accepts_camel_case_vehicle_keys() {
        let msg: ClientMsg = serde_json::from_str(
            r##"{"type":"join","nickname":"A","carModel":"Truck","carColor":"#ff0000"}"##,
        )
        .unwrap();
        match msg {
            ClientMsg::Join {
                nickname,
                vehicle_model,
                color,
            } => {
                assert_eq!(nickname.as_deref(), Some("A"));
                assert_eq!(vehicle_model.as_deref(), Some("Truck"));
                assert_eq!(color.as_deref(), Some("#ff0000"));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn join_with_wrong_field_types_reads_as_missing() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"join","nickname":42,"color":["red"],"carModel":null}"#)
                .unwrap();
        match msg {
            ClientMsg::Join {
                nickname,
                vehicle_model,
                color,
            } => {
                assert!(nickname.is_none());
                assert!(vehicle_model.is_none());
                assert!(color.is_none());
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn input_accepts_short_flag_names() {
        let msg: ClientMsg =
            serde_json::from_str(r#"{"type":"input","accel":true,"right":true,"gear":"D"}"#)
                .unwrap();
        match msg {
            ClientMsg::Input {
                accelerate,
                brake,
                steer_left,
                steer_right,
                gear,
            } => {
                assert!(accelerate);
                assert!(!brake);
                assert!(!steer_left);
                assert!(steer_right);
                assert_eq!(gear, Some(Gear::D));
            }
            other => panic!("unexpected message: {:?}", other),
        }
    }

    #[test]
    fn snapshot_uses_tagged_layout() {
        let id = Uuid::from_u128(1);
        let mut players = HashMap::new();
        players.insert(
            id,
            PlayerSnapshot {
                nickname: "Alice".to_string(),
                vehicle_model: "DefaultCar".to_string(),
                color: "#ffffff".to_string(),
                position: Position::default(),
                rotation: Rotation::default(),
                gear: Gear::P,
            },
        );
        let json = serde_json::to_value(ServerMsg::Snapshot { tick: 3, players }).unwrap();

        assert_eq!(json["type"], "snapshot");
        assert_eq!(json["tick"], 3);
        let entry = &json["players"][id.to_string()];
        assert_eq!(entry["nickname"], "Alice");
        assert_eq!(entry["gear"], "P");
        assert_eq!(entry["rotation"]["w"], 1.0);
        assert!(entry.get("input").is_none());
    }
}
