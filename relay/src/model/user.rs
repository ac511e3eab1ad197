//! Handle through which a session acts on behalf of its user

use crate::error::DomainError;
use crate::model::events::UserInfo;
use crate::model::server::RelayServer;
use std::fmt;
use std::sync::Arc;

/// A logged-in user
///
/// Cheap to clone. Every operation is forwarded to the owning
/// [`RelayServer`], which publishes the resulting events.
#[derive(Clone)]
pub struct User {
    info: UserInfo,
    server: Arc<RelayServer>,
}

impl User {
    pub(crate) fn new(info: UserInfo, server: Arc<RelayServer>) -> Self {
        Self { info, server }
    }

    pub fn id(&self) -> u16 {
        self.info.id
    }

    pub fn name(&self) -> &str {
        &self.info.name
    }

    pub fn is_stealth(&self) -> bool {
        self.info.stealth
    }

    pub fn info(&self) -> &UserInfo {
        &self.info
    }

    pub fn server(&self) -> &Arc<RelayServer> {
        &self.server
    }

    pub fn drop_game(&self) -> Result<(), DomainError> {
        self.server.drop_game(self.info.id)
    }

    pub fn game_kick(&self, target_id: u16) -> Result<(), DomainError> {
        self.server.game_kick(self.info.id, target_id)
    }

    pub fn player_ready(&self) -> Result<(), DomainError> {
        self.server.player_ready(self.info.id)
    }

    pub fn game_chat(&self, message: &str) -> Result<(), DomainError> {
        self.server.game_chat(self.info.id, message)
    }

    /// Opens a new game with this user as owner and player 1
    pub fn create_game(&self, rom_name: &str) -> Result<u32, DomainError> {
        self.server.create_game(self.info.id, rom_name)
    }

    pub fn join_game(&self, game_id: u32) -> Result<(), DomainError> {
        self.server.join_game(self.info.id, game_id)
    }

    pub fn add_game_data(&self, data: Vec<u8>) -> Result<(), DomainError> {
        self.server.add_game_data(self.info.id, data)
    }

    /// Reports that the client stopped receiving at `timeout_number`
    pub fn report_timeout(&self, timeout_number: u16) -> Result<(), DomainError> {
        self.server.report_timeout(self.info.id, timeout_number)
    }

    pub fn keep_alive(&self) -> Result<(), DomainError> {
        self.server.keep_alive(self.info.id)
    }

    /// Marks the user active without a keep-alive
    pub fn touch(&self) {
        self.server.touch(self.info.id)
    }

    pub fn quit(&self, message: &str) -> Result<(), DomainError> {
        self.server.quit(self.info.id, message)
    }
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User").field("info", &self.info).finish()
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.info, f)
    }
}
