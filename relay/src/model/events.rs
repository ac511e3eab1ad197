//! Events published by the domain model

use std::fmt;

/// Snapshot of a user as seen by event recipients
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserInfo {
    pub id: u16,
    pub name: String,
    /// Stealth users' game lifecycle is hidden from everyone else
    pub stealth: bool,
}

impl fmt::Display for UserInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "User{}<{}>", self.id, self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayEvent {
    // Server-wide
    GameCreated {
        game_id: u32,
        rom_name: String,
        owner: UserInfo,
    },
    UserQuit {
        user: UserInfo,
        message: String,
    },

    // Scoped to the players of one game
    UserDropped {
        game_id: u32,
        user: UserInfo,
        player_number: u8,
    },
    GameInfo {
        game_id: u32,
        message: String,
        /// Restricts the announcement to one user
        to_user: Option<u16>,
    },
    GameChat {
        game_id: u32,
        user: UserInfo,
        message: String,
    },
    AllReady {
        game_id: u32,
    },
    GameTimeout {
        game_id: u32,
        user: UserInfo,
        timeout_number: u16,
    },
    UserJoinedGame {
        game_id: u32,
        user: UserInfo,
    },
    UserQuitGame {
        game_id: u32,
        user: UserInfo,
    },
    GameData {
        game_id: u32,
        user: UserInfo,
        data: Vec<u8>,
    },

    // Addressed to a single user
    InfoMessage {
        user_id: u16,
        message: String,
    },
}

/// Discriminant of [`RelayEvent`], used as the event handler table key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    GameCreated,
    UserQuit,
    UserDropped,
    GameInfo,
    GameChat,
    AllReady,
    GameTimeout,
    UserJoinedGame,
    UserQuitGame,
    GameData,
    InfoMessage,
}

impl RelayEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            RelayEvent::GameCreated { .. } => EventKind::GameCreated,
            RelayEvent::UserQuit { .. } => EventKind::UserQuit,
            RelayEvent::UserDropped { .. } => EventKind::UserDropped,
            RelayEvent::GameInfo { .. } => EventKind::GameInfo,
            RelayEvent::GameChat { .. } => EventKind::GameChat,
            RelayEvent::AllReady { .. } => EventKind::AllReady,
            RelayEvent::GameTimeout { .. } => EventKind::GameTimeout,
            RelayEvent::UserJoinedGame { .. } => EventKind::UserJoinedGame,
            RelayEvent::UserQuitGame { .. } => EventKind::UserQuitGame,
            RelayEvent::GameData { .. } => EventKind::GameData,
            RelayEvent::InfoMessage { .. } => EventKind::InfoMessage,
        }
    }
}

/// Receives the events a user is interested in
///
/// Called synchronously from whichever task published the event, never while
/// the domain model holds its own lock.
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &RelayEvent);
}
