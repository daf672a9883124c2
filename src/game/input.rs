//! Latest control input per session

use std::collections::HashMap;

use crate::ws::protocol::Gear;

use super::session::{ConnectionId, SessionRegistry};

/// Control flags for one session. Neutral by default.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InputState {
    pub accelerate: bool,
    pub brake: bool,
    pub steer_left: bool,
    pub steer_right: bool,
    pub gear: Option<Gear>,
}

/// Input cache: one entry per live session, last write wins
#[derive(Debug, Default)]
pub struct InputCache {
    inputs: HashMap<ConnectionId, InputState>,
}

impl InputCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the cached input wholesale. Input for an unknown connection
    /// is dropped. Returns whether it was stored.
    pub fn set_input(
        &mut self,
        sessions: &SessionRegistry,
        id: ConnectionId,
        input: InputState,
    ) -> bool {
        if !sessions.contains(&id) {
            return false;
        }
        self.inputs.insert(id, input);
        true
    }

    /// Cached input, or neutral if none
    pub fn get(&self, id: &ConnectionId) -> InputState {
        self.inputs.get(id).copied().unwrap_or_default()
    }

    pub fn remove(&mut self, id: &ConnectionId) {
        self.inputs.remove(id);
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.inputs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::session::JoinProfile;
    use uuid::Uuid;

    fn registry_with(id: ConnectionId) -> SessionRegistry {
        let mut sessions = SessionRegistry::new();
        sessions.join(id, JoinProfile::default()).unwrap();
        sessions
    }

    #[test]
    fn absent_input_is_neutral() {
        let cache = InputCache::new();
        assert_eq!(cache.get(&Uuid::from_u128(9)), InputState::default());
    }

    #[test]
    fn unknown_session_input_is_dropped() {
        let sessions = SessionRegistry::new();
        let mut cache = InputCache::new();
        let input = InputState {
            accelerate: true,
            ..Default::default()
        };

        assert!(!cache.set_input(&sessions, Uuid::from_u128(1), input));
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn last_write_wins_without_merging() {
        let id = Uuid::from_u128(1);
        let sessions = registry_with(id);
        let mut cache = InputCache::new();

        cache.set_input(
            &sessions,
            id,
            InputState {
                accelerate: true,
                steer_left: true,
                gear: Some(Gear::D),
                ..Default::default()
            },
        );
        cache.set_input(
            &sessions,
            id,
            InputState {
                brake: true,
                ..Default::default()
            },
        );

        let input = cache.get(&id);
        assert!(input.brake);
        assert!(!input.accelerate);
        assert!(!input.steer_left);
        assert_eq!(input.gear, None);
    }
}
