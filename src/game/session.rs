//! Session registry: who is in the world and how they present

use std::collections::HashMap;

use uuid::Uuid;

use crate::util::time::unix_millis;
use crate::ws::protocol::Gear;

use super::error::SimError;

/// Opaque connection identity
pub type ConnectionId = Uuid;

pub const DEFAULT_NICKNAME: &str = "Unknown";
pub const DEFAULT_VEHICLE_MODEL: &str = "DefaultCar";
pub const DEFAULT_COLOR: &str = "#ffffff";

/// Optional presentation fields supplied with a join
#[derive(Debug, Clone, Default)]
pub struct JoinProfile {
    pub nickname: Option<String>,
    pub vehicle_model: Option<String>,
    pub color: Option<String>,
}

/// A joined player
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerSession {
    pub id: ConnectionId,
    pub nickname: String,
    pub vehicle_model: String,
    pub color: String,
    pub gear: Gear,
    pub joined_at: u64,
}

impl PlayerSession {
    pub fn new(id: ConnectionId, profile: JoinProfile) -> Self {
        Self {
            id,
            nickname: or_default(profile.nickname, DEFAULT_NICKNAME),
            vehicle_model: or_default(profile.vehicle_model, DEFAULT_VEHICLE_MODEL),
            color: or_default(profile.color, DEFAULT_COLOR),
            gear: Gear::default(),
            joined_at: unix_millis(),
        }
    }
}

/// Blank strings count as missing
fn or_default(value: Option<String>, default: &str) -> String {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Active sessions keyed by connection
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<ConnectionId, PlayerSession>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new session. An existing session for the same connection is
    /// kept and the join is rejected.
    pub fn join(
        &mut self,
        id: ConnectionId,
        profile: JoinProfile,
    ) -> Result<&PlayerSession, SimError> {
        if self.sessions.contains_key(&id) {
            return Err(SimError::DuplicateSession(id));
        }
        Ok(&*self
            .sessions
            .entry(id)
            .or_insert_with(|| PlayerSession::new(id, profile)))
    }

    pub fn get(&self, id: &ConnectionId) -> Option<&PlayerSession> {
        self.sessions.get(id)
    }

    pub fn get_mut(&mut self, id: &ConnectionId) -> Option<&mut PlayerSession> {
        self.sessions.get_mut(id)
    }

    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.sessions.contains_key(id)
    }

    /// Remove a session; absent ids are a no-op
    pub fn remove(&mut self, id: &ConnectionId) -> Option<PlayerSession> {
        self.sessions.remove(id)
    }

    pub fn list_all(&self) -> impl Iterator<Item = &PlayerSession> {
        self.sessions.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = ConnectionId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::{assert_err, assert_ok};

    fn id(n: u128) -> ConnectionId {
        Uuid::from_u128(n)
    }

    #[test]
    fn join_fills_defaults() {
        let mut registry = SessionRegistry::new();
        let session = assert_ok!(registry.join(id(1), JoinProfile::default()));

        assert_eq!(session.nickname, "Unknown");
        assert_eq!(session.vehicle_model, "DefaultCar");
        assert_eq!(session.color, "#ffffff");
        assert_eq!(session.gear, Gear::P);
    }

    #[test]
    fn blank_fields_count_as_missing() {
        let mut registry = SessionRegistry::new();
        let profile = JoinProfile {
            nickname: Some("  ".to_string()),
            vehicle_model: Some("Truck".to_string()),
            color: Some(String::new()),
        };
        let session = assert_ok!(registry.join(id(1), profile));

        assert_eq!(session.nickname, "Unknown");
        assert_eq!(session.vehicle_model, "Truck");
        assert_eq!(session.color, "#ffffff");
    }

    #[test]
    fn duplicate_join_keeps_original() {
        let mut registry = SessionRegistry::new();
        let alice = JoinProfile {
            nickname: Some("Alice".to_string()),
            ..Default::default()
        };
        let mallory = JoinProfile {
            nickname: Some("Mallory".to_string()),
            ..Default::default()
        };
        assert_ok!(registry.join(id(1), alice));

        let err = assert_err!(registry.join(id(1), mallory));
        assert_eq!(err, SimError::DuplicateSession(id(1)));
        assert_eq!(registry.get(&id(1)).map(|s| s.nickname.as_str()), Some("Alice"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn remove_is_idempotent() {
        let mut registry = SessionRegistry::new();
        assert_ok!(registry.join(id(1), JoinProfile::default()));

        assert!(registry.remove(&id(1)).is_some());
        assert!(registry.remove(&id(1)).is_none());
        assert!(registry.remove(&id(2)).is_none());
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn list_all_returns_every_session() {
        let mut registry = SessionRegistry::new();
        for n in 1..=3 {
            assert_ok!(registry.join(id(n), JoinProfile::default()));
        }
        let mut ids: Vec<_> = registry.list_all().map(|s| s.id).collect();
        ids.sort();
        assert_eq!(ids, vec![id(1), id(2), id(3)]);
    }
}
