//! In-memory relay server state
//!
//! [`RelayServer`] owns every logged-in user and every open game. Each
//! operation mutates the state under one lock, collects the events it
//! produced together with a snapshot of their recipients, and delivers them
//! only after the lock is released. Listeners are held weakly: a session
//! that has gone away simply stops receiving events.

use crate::config::RelayConfig;
use crate::error::DomainError;
use crate::lookingforgame::{
    Broadcaster, LogBroadcaster, LookingForGameEvent, LookingForGameReporter,
};
use crate::model::events::{EventListener, RelayEvent, UserInfo};
use crate::model::user::User;
use log::{debug, info};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};

/// Player numbers travel as one byte, so a game seats at most this many
pub const MAX_PLAYERS_PER_GAME: usize = u8::MAX as usize;

/// How often the idle reaper looks for silent users
pub const IDLE_CHECK_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    /// Players may join; not everyone has signalled ready
    Waiting,
    /// Every player signalled ready; game data is flowing
    Playing,
}

struct UserEntry {
    info: UserInfo,
    game_id: Option<u32>,
    listener: Option<Weak<dyn EventListener>>,
    last_activity: Instant,
}

struct Game {
    id: u32,
    rom_name: String,
    owner: u16,
    /// Join order; a player's number is its index plus one
    players: Vec<u16>,
    ready: HashSet<u16>,
    status: GameStatus,
}

impl Game {
    fn player_number(&self, user_id: u16) -> Option<u8> {
        self.players
            .iter()
            .position(|&id| id == user_id)
            .and_then(|index| u8::try_from(index + 1).ok())
    }

    fn remove_player(&mut self, user_id: u16) {
        self.players.retain(|&id| id != user_id);
        self.unready(user_id);
    }

    fn unready(&mut self, user_id: u16) {
        self.ready.remove(&user_id);
        if self.ready.is_empty() && self.status == GameStatus::Playing {
            info!("Game {} has no active players left, waiting", self.id);
            self.status = GameStatus::Waiting;
        }
    }
}

enum Scope {
    All,
    Game(u32),
    User(u16),
}

type Delivery = (Vec<Weak<dyn EventListener>>, RelayEvent);

#[derive(Default)]
struct ServerState {
    users: HashMap<u16, UserEntry>,
    games: HashMap<u32, Game>,
    next_user_id: u16,
    next_game_id: u32,
}

impl ServerState {
    fn allocate_user_id(&mut self) -> Option<u16> {
        for _ in 0..u16::MAX {
            self.next_user_id = self.next_user_id.wrapping_add(1);
            if self.next_user_id != 0 && !self.users.contains_key(&self.next_user_id) {
                return Some(self.next_user_id);
            }
        }
        None
    }

    fn allocate_game_id(&mut self) -> u32 {
        loop {
            self.next_game_id = self.next_game_id.wrapping_add(1);
            if self.next_game_id != 0 && !self.games.contains_key(&self.next_game_id) {
                return self.next_game_id;
            }
        }
    }

    fn user(&self, user_id: u16) -> Option<&UserEntry> {
        self.users.get(&user_id)
    }

    /// Users that have been silent for longer than `timeout`
    fn idle_users(&self, now: Instant, timeout: Duration) -> Vec<u16> {
        let mut idle: Vec<u16> = self
            .users
            .values()
            .filter(|u| now.duration_since(u.last_activity) > timeout)
            .map(|u| u.info.id)
            .collect();
        idle.sort_unstable();
        idle
    }

    fn recipients(&self, scope: Scope) -> Vec<Weak<dyn EventListener>> {
        match scope {
            Scope::All => self
                .users
                .values()
                .filter_map(|u| u.listener.clone())
                .collect(),
            Scope::Game(game_id) => self
                .games
                .get(&game_id)
                .map(|game| {
                    game.players
                        .iter()
                        .filter_map(|id| self.users.get(id))
                        .filter_map(|u| u.listener.clone())
                        .collect()
                })
                .unwrap_or_default(),
            Scope::User(user_id) => self
                .users
                .get(&user_id)
                .and_then(|u| u.listener.clone())
                .into_iter()
                .collect(),
        }
    }

    fn event(&self, scope: Scope, event: RelayEvent) -> Delivery {
        (self.recipients(scope), event)
    }

    /// Takes `user_id` out of its game, closing the game if it was the owner
    ///
    /// Returns the resulting events and the id of the game that was closed.
    fn leave_game(&mut self, user_id: u16) -> (Vec<Delivery>, Option<u32>) {
        let mut deliveries = Vec::new();
        let Some(entry) = self.users.get_mut(&user_id) else {
            return (deliveries, None);
        };
        let Some(game_id) = entry.game_id.take() else {
            return (deliveries, None);
        };
        let info = entry.info.clone();

        deliveries.push(self.event(
            Scope::Game(game_id),
            RelayEvent::UserQuitGame {
                game_id,
                user: info.clone(),
            },
        ));

        let Some(game) = self.games.get_mut(&game_id) else {
            return (deliveries, None);
        };
        game.remove_player(user_id);
        info!("{} left game {}", info, game_id);

        if game.owner != user_id {
            return (deliveries, None);
        }

        deliveries.push(self.event(
            Scope::Game(game_id),
            RelayEvent::GameInfo {
                game_id,
                message: format!("{} closed the game", info.name),
                to_user: None,
            },
        ));
        if let Some(game) = self.games.remove(&game_id) {
            for player in game.players {
                if let Some(entry) = self.users.get_mut(&player) {
                    entry.game_id = None;
                }
            }
        }
        info!("Game {} closed by its owner", game_id);
        (deliveries, Some(game_id))
    }
}

pub struct RelayServer {
    config: RelayConfig,
    state: Mutex<ServerState>,
    reporter: LookingForGameReporter,
    self_ref: Weak<RelayServer>,
}

impl RelayServer {
    pub fn new(config: RelayConfig) -> Arc<Self> {
        Self::with_broadcaster(config, Arc::new(LogBroadcaster::default()))
    }

    pub fn with_broadcaster(config: RelayConfig, broadcaster: Arc<dyn Broadcaster>) -> Arc<Self> {
        Arc::new_cyclic(|self_ref| Self {
            reporter: LookingForGameReporter::new(&config, broadcaster),
            config,
            state: Mutex::new(ServerState::default()),
            self_ref: self_ref.clone(),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn reporter(&self) -> &LookingForGameReporter {
        &self.reporter
    }

    /// Registers a new user and returns its handle
    pub fn login(self: &Arc<Self>, username: &str) -> Result<User, DomainError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(DomainError::Login("username is empty".to_string()));
        }
        if username.chars().count() > self.config.max_username_length {
            return Err(DomainError::Login(format!(
                "username is longer than {} characters",
                self.config.max_username_length
            )));
        }

        let mut state = self.state.lock();
        if state.users.len() >= self.config.max_users {
            return Err(DomainError::Login("server is full".to_string()));
        }
        let id = state
            .allocate_user_id()
            .ok_or_else(|| DomainError::Login("no user ids left".to_string()))?;

        let info = UserInfo {
            id,
            name: username.to_string(),
            stealth: self.config.is_stealth(username),
        };
        state.users.insert(
            id,
            UserEntry {
                info: info.clone(),
                game_id: None,
                listener: None,
                last_activity: Instant::now(),
            },
        );
        info!("{} logged in", info);

        Ok(User::new(info, Arc::clone(self)))
    }

    /// Routes the events a user should see to `listener`
    pub fn register_listener(&self, user_id: u16, listener: Weak<dyn EventListener>) {
        if let Some(entry) = self.state.lock().users.get_mut(&user_id) {
            entry.listener = Some(listener);
        }
    }

    /// Sends a server message to a single user
    pub fn announce_to(&self, user_id: u16, message: impl Into<String>) {
        let delivery = self.state.lock().event(
            Scope::User(user_id),
            RelayEvent::InfoMessage {
                user_id,
                message: message.into(),
            },
        );
        deliver(vec![delivery]);
    }

    /// Posts an announcement into a game, optionally to a single player
    pub fn announce_game(&self, game_id: u32, message: impl Into<String>, to_user: Option<u16>) {
        let delivery = {
            let state = self.state.lock();
            if !state.games.contains_key(&game_id) {
                return;
            }
            state.event(
                Scope::Game(game_id),
                RelayEvent::GameInfo {
                    game_id,
                    message: message.into(),
                    to_user,
                },
            )
        };
        deliver(vec![delivery]);
    }

    pub fn user_count(&self) -> usize {
        self.state.lock().users.len()
    }

    pub fn game_count(&self) -> usize {
        self.state.lock().games.len()
    }

    /// Ids of every open game, lowest first
    pub fn game_ids(&self) -> Vec<u32> {
        let mut ids: Vec<u32> = self.state.lock().games.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn user_game(&self, user_id: u16) -> Option<u32> {
        self.state.lock().user(user_id).and_then(|u| u.game_id)
    }

    pub fn game_status(&self, game_id: u32) -> Option<GameStatus> {
        self.state.lock().games.get(&game_id).map(|g| g.status)
    }

    pub fn game_players(&self, game_id: u32) -> Vec<u16> {
        self.state
            .lock()
            .games
            .get(&game_id)
            .map(|g| g.players.clone())
            .unwrap_or_default()
    }

    pub fn last_activity(&self, user_id: u16) -> Option<Instant> {
        self.state.lock().user(user_id).map(|u| u.last_activity)
    }

    pub(crate) fn create_game(&self, user_id: u16, rom_name: &str) -> Result<u32, DomainError> {
        if rom_name.trim().is_empty() {
            return Err(DomainError::CreateGame("rom name is empty".to_string()));
        }

        let (owner, game_id, deliveries) = {
            let mut state = self.state.lock();
            let owner = match state.user(user_id) {
                Some(entry) if entry.game_id.is_some() => {
                    return Err(DomainError::CreateGame("already in a game".to_string()))
                }
                Some(entry) => entry.info.clone(),
                None => return Err(DomainError::CreateGame("not logged in".to_string())),
            };

            let game_id = state.allocate_game_id();
            state.games.insert(
                game_id,
                Game {
                    id: game_id,
                    rom_name: rom_name.to_string(),
                    owner: user_id,
                    players: vec![user_id],
                    ready: HashSet::new(),
                    status: GameStatus::Waiting,
                },
            );
            if let Some(entry) = state.users.get_mut(&user_id) {
                entry.game_id = Some(game_id);
            }
            info!("{} created game {}: {}", owner, game_id, rom_name);

            let deliveries = vec![
                state.event(
                    Scope::All,
                    RelayEvent::GameCreated {
                        game_id,
                        rom_name: rom_name.to_string(),
                        owner: owner.clone(),
                    },
                ),
                state.event(
                    Scope::Game(game_id),
                    RelayEvent::UserJoinedGame {
                        game_id,
                        user: owner.clone(),
                    },
                ),
            ];
            (owner, game_id, deliveries)
        };
        deliver(deliveries);

        let event = LookingForGameEvent {
            game_id,
            game_title: rom_name.to_string(),
            user_id,
            username: owner.name,
        };
        let server = self.self_ref.clone();
        let armed = self.reporter.report_and_start_timer(event, move |link| {
            if let Some(server) = server.upgrade() {
                server.announce_game(game_id, link, None);
            }
        });
        if armed {
            self.announce_game(
                game_id,
                format!(
                    "A looking-for-game report will be posted in {} seconds",
                    self.reporter.delay().as_secs()
                ),
                Some(user_id),
            );
        }

        Ok(game_id)
    }

    pub(crate) fn join_game(&self, user_id: u16, game_id: u32) -> Result<(), DomainError> {
        let delivery = {
            let mut state = self.state.lock();
            let info = match state.user(user_id) {
                Some(entry) if entry.game_id.is_some() => {
                    return Err(DomainError::JoinGame("already in a game".to_string()))
                }
                Some(entry) => entry.info.clone(),
                None => return Err(DomainError::JoinGame("not logged in".to_string())),
            };

            let game = state
                .games
                .get_mut(&game_id)
                .ok_or_else(|| DomainError::JoinGame(format!("game {} does not exist", game_id)))?;
            if game.status == GameStatus::Playing {
                return Err(DomainError::JoinGame(
                    "game is already in progress".to_string(),
                ));
            }
            if game.players.len() >= MAX_PLAYERS_PER_GAME {
                return Err(DomainError::JoinGame("game is full".to_string()));
            }
            game.players.push(user_id);
            debug!("{} is player {} of {}", info, game.players.len(), game.rom_name);

            if let Some(entry) = state.users.get_mut(&user_id) {
                entry.game_id = Some(game_id);
            }
            info!("{} joined game {}", info, game_id);

            state.event(
                Scope::Game(game_id),
                RelayEvent::UserJoinedGame {
                    game_id,
                    user: info,
                },
            )
        };
        deliver(vec![delivery]);

        if self.reporter.cancel_actions_for_game(game_id) {
            debug!("Cancelled looking-for-game report for game {}", game_id);
        }
        Ok(())
    }

    pub(crate) fn drop_game(&self, user_id: u16) -> Result<(), DomainError> {
        let delivery = {
            let mut state = self.state.lock();
            let (info, game_id) = match state.user(user_id) {
                Some(UserEntry {
                    info,
                    game_id: Some(game_id),
                    ..
                }) => (info.clone(), *game_id),
                Some(_) => return Err(DomainError::DropGame("not in a game".to_string())),
                None => return Err(DomainError::DropGame("not logged in".to_string())),
            };

            let game = state
                .games
                .get_mut(&game_id)
                .ok_or_else(|| DomainError::DropGame(format!("game {} is gone", game_id)))?;
            let player_number = game
                .player_number(user_id)
                .ok_or_else(|| DomainError::DropGame("not a player of the game".to_string()))?;
            game.unready(user_id);
            info!("{} dropped from game {}", info, game_id);

            state.event(
                Scope::Game(game_id),
                RelayEvent::UserDropped {
                    game_id,
                    user: info,
                    player_number,
                },
            )
        };
        deliver(vec![delivery]);
        Ok(())
    }

    pub(crate) fn player_ready(&self, user_id: u16) -> Result<(), DomainError> {
        let (game_id, delivery) = {
            let mut state = self.state.lock();
            let game_id = state
                .user(user_id)
                .ok_or_else(|| DomainError::UserReady("not logged in".to_string()))?
                .game_id
                .ok_or_else(|| DomainError::UserReady("not in a game".to_string()))?;

            let game = state
                .games
                .get_mut(&game_id)
                .ok_or_else(|| DomainError::UserReady(format!("game {} is gone", game_id)))?;
            if game.ready.contains(&user_id) {
                return Ok(());
            }
            if game.status == GameStatus::Playing {
                return Err(DomainError::UserReady(
                    "game is already in progress".to_string(),
                ));
            }

            game.ready.insert(user_id);
            if game.ready.len() < game.players.len() {
                debug!(
                    "Game {}: {}/{} players ready",
                    game_id,
                    game.ready.len(),
                    game.players.len()
                );
                return Ok(());
            }

            game.status = GameStatus::Playing;
            info!("Game {}: all players ready, starting", game_id);
            (
                game_id,
                state.event(Scope::Game(game_id), RelayEvent::AllReady { game_id }),
            )
        };
        deliver(vec![delivery]);
        self.reporter.cancel_actions_for_game(game_id);
        Ok(())
    }

    pub(crate) fn game_chat(&self, user_id: u16, message: &str) -> Result<(), DomainError> {
        if message.is_empty() {
            return Err(DomainError::GameChat("message is empty".to_string()));
        }

        let delivery = {
            let state = self.state.lock();
            let entry = state
                .user(user_id)
                .ok_or_else(|| DomainError::GameChat("not logged in".to_string()))?;
            let game_id = entry
                .game_id
                .ok_or_else(|| DomainError::GameChat("not in a game".to_string()))?;

            state.event(
                Scope::Game(game_id),
                RelayEvent::GameChat {
                    game_id,
                    user: entry.info.clone(),
                    message: message.to_string(),
                },
            )
        };
        deliver(vec![delivery]);
        Ok(())
    }

    pub(crate) fn game_kick(&self, user_id: u16, target_id: u16) -> Result<(), DomainError> {
        let deliveries = {
            let mut state = self.state.lock();
            let game_id = state
                .user(user_id)
                .ok_or_else(|| DomainError::GameKick("You are not logged in".to_string()))?
                .game_id
                .ok_or_else(|| DomainError::GameKick("You are not in a game".to_string()))?;

            let game = state
                .games
                .get(&game_id)
                .ok_or_else(|| DomainError::GameKick("That game no longer exists".to_string()))?;
            if game.owner != user_id {
                return Err(DomainError::GameKick(
                    "Only the game owner can kick players".to_string(),
                ));
            }
            if target_id == user_id {
                return Err(DomainError::GameKick("You can't kick yourself".to_string()));
            }
            if !game.players.contains(&target_id) {
                return Err(DomainError::GameKick(format!(
                    "User {} is not in this game",
                    target_id
                )));
            }

            let target = state
                .user(target_id)
                .map(|u| u.info.name.clone())
                .unwrap_or_default();
            let mut deliveries = vec![state.event(
                Scope::Game(game_id),
                RelayEvent::GameInfo {
                    game_id,
                    message: format!("{} has been kicked from the game", target),
                    to_user: None,
                },
            )];
            let (left, _) = state.leave_game(target_id);
            deliveries.extend(left);
            info!("User{} kicked User{} from game {}", user_id, target_id, game_id);
            deliveries
        };
        deliver(deliveries);
        self.reporter.cancel_actions_for_user(target_id);
        Ok(())
    }

    pub(crate) fn add_game_data(&self, user_id: u16, data: Vec<u8>) -> Result<(), DomainError> {
        let delivery = {
            let state = self.state.lock();
            let entry = state
                .user(user_id)
                .ok_or_else(|| DomainError::GameData("not logged in".to_string()))?;
            let game_id = entry
                .game_id
                .ok_or_else(|| DomainError::GameData("not in a game".to_string()))?;
            let game = state
                .games
                .get(&game_id)
                .ok_or_else(|| DomainError::GameData(format!("game {} is gone", game_id)))?;
            if game.status != GameStatus::Playing {
                return Err(DomainError::GameData("game is not running".to_string()));
            }
            if !game.ready.contains(&user_id) {
                return Err(DomainError::GameData("player has dropped".to_string()));
            }

            state.event(
                Scope::Game(game_id),
                RelayEvent::GameData {
                    game_id,
                    user: entry.info.clone(),
                    data,
                },
            )
        };
        deliver(vec![delivery]);
        Ok(())
    }

    pub(crate) fn report_timeout(&self, user_id: u16, timeout_number: u16) -> Result<(), DomainError> {
        let delivery = {
            let state = self.state.lock();
            let entry = state
                .user(user_id)
                .ok_or_else(|| DomainError::Timeout("not logged in".to_string()))?;
            let game_id = entry
                .game_id
                .ok_or_else(|| DomainError::Timeout("not in a game".to_string()))?;

            state.event(
                Scope::Game(game_id),
                RelayEvent::GameTimeout {
                    game_id,
                    user: entry.info.clone(),
                    timeout_number,
                },
            )
        };
        deliver(vec![delivery]);
        Ok(())
    }

    pub(crate) fn keep_alive(&self, user_id: u16) -> Result<(), DomainError> {
        let mut state = self.state.lock();
        let entry = state
            .users
            .get_mut(&user_id)
            .ok_or_else(|| DomainError::Login("not logged in".to_string()))?;
        entry.last_activity = Instant::now();
        Ok(())
    }

    /// Records that the user's client sent something
    pub(crate) fn touch(&self, user_id: u16) {
        if let Some(entry) = self.state.lock().users.get_mut(&user_id) {
            entry.last_activity = Instant::now();
        }
    }

    /// Logs out every user silent for longer than the keep-alive timeout
    ///
    /// Returns how many users were removed.
    pub fn reap_idle(&self) -> usize {
        let idle = self
            .state
            .lock()
            .idle_users(Instant::now(), self.config.keep_alive_timeout);

        for &user_id in &idle {
            info!(
                "User{} sent nothing for {:?}, logging out",
                user_id, self.config.keep_alive_timeout
            );
            if let Err(e) = self.quit(user_id, "Timeout") {
                debug!("User{}: timeout quit failed: {}", user_id, e);
            }
        }
        idle.len()
    }

    /// Spawns the task that reaps idle users every [`IDLE_CHECK_INTERVAL`]
    ///
    /// The task holds the server weakly and ends once the server is dropped.
    pub fn spawn_idle_reaper(self: &Arc<Self>) -> JoinHandle<()> {
        let server = Arc::downgrade(self);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(IDLE_CHECK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                interval.tick().await;

                let Some(server) = server.upgrade() else {
                    debug!("Relay server dropped, idle reaper exiting");
                    break;
                };
                let reaped = server.reap_idle();
                if reaped > 0 {
                    debug!("Idle reaper removed {} users", reaped);
                }
            }
        })
    }

    /// Logs a user out, leaving its game first; quitting twice is a no-op
    pub(crate) fn quit(&self, user_id: u16, message: &str) -> Result<(), DomainError> {
        let (deliveries, closed_game) = {
            let mut state = self.state.lock();
            let Some(info) = state.user(user_id).map(|u| u.info.clone()) else {
                return Ok(());
            };

            let (mut deliveries, closed_game) = state.leave_game(user_id);
            deliveries.push(state.event(
                Scope::All,
                RelayEvent::UserQuit {
                    user: info.clone(),
                    message: message.to_string(),
                },
            ));
            state.users.remove(&user_id);
            info!("{} quit: {}", info, message);
            (deliveries, closed_game)
        };
        deliver(deliveries);

        self.reporter.cancel_actions_for_user(user_id);
        if let Some(game_id) = closed_game {
            self.reporter.cancel_actions_for_game(game_id);
        }
        Ok(())
    }
}

fn deliver(deliveries: Vec<Delivery>) {
    for (recipients, event) in deliveries {
        for listener in recipients.iter().filter_map(|w| w.upgrade()) {
            listener.on_event(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::events::EventKind;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<RelayEvent>>,
    }

    impl Recorder {
        fn kinds(&self) -> Vec<EventKind> {
            self.events.lock().iter().map(RelayEvent::kind).collect()
        }

        fn take(&self) -> Vec<RelayEvent> {
            std::mem::take(&mut *self.events.lock())
        }
    }

    impl EventListener for Recorder {
        fn on_event(&self, event: &RelayEvent) {
            self.events.lock().push(event.clone());
        }
    }

    fn login(server: &Arc<RelayServer>, name: &str) -> (User, Arc<Recorder>) {
        let user = server.login(name).unwrap();
        let recorder = Arc::new(Recorder::default());
        let weak: Weak<dyn EventListener> = Arc::downgrade(&recorder) as Weak<dyn EventListener>;
        server.register_listener(user.id(), weak);
        (user, recorder)
    }

    #[test]
    fn test_login_assigns_unique_ids() {
        let server = RelayServer::new(RelayConfig::default());
        let alice = server.login("alice").unwrap();
        let bob = server.login("bob").unwrap();

        assert_ne!(alice.id(), bob.id());
        assert_eq!(server.user_count(), 2);
    }

    #[test]
    fn test_login_rejects_bad_names_and_full_server() {
        let server = RelayServer::new(RelayConfig {
            max_users: 1,
            max_username_length: 5,
            ..RelayConfig::default()
        });

        assert!(matches!(server.login("  "), Err(DomainError::Login(_))));
        assert!(matches!(server.login("toolong"), Err(DomainError::Login(_))));
        server.login("alice").unwrap();
        assert_eq!(
            server.login("bob").unwrap_err(),
            DomainError::Login("server is full".to_string())
        );
    }

    #[test]
    fn test_stealth_flag_from_config() {
        let server = RelayServer::new(RelayConfig {
            stealth_users: vec!["ghost".to_string()],
            ..RelayConfig::default()
        });
        assert!(server.login("ghost").unwrap().is_stealth());
        assert!(!server.login("alice").unwrap().is_stealth());
    }

    #[test]
    fn test_create_and_join_publish_to_game() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, alice_events) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");

        let game_id = alice.create_game("Street Fighter").unwrap();
        assert_eq!(
            alice_events.kinds(),
            vec![EventKind::GameCreated, EventKind::UserJoinedGame]
        );
        assert_eq!(bob_events.kinds(), vec![EventKind::GameCreated]);

        bob.join_game(game_id).unwrap();
        assert_eq!(server.game_players(game_id), vec![alice.id(), bob.id()]);
        assert_eq!(alice_events.kinds().last(), Some(&EventKind::UserJoinedGame));
        assert_eq!(bob_events.kinds().last(), Some(&EventKind::UserJoinedGame));
    }

    #[test]
    fn test_join_errors() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, _) = login(&server, "alice");

        assert!(matches!(alice.join_game(99), Err(DomainError::JoinGame(_))));
        let game_id = alice.create_game("Tekken").unwrap();
        assert!(matches!(
            alice.join_game(game_id),
            Err(DomainError::JoinGame(_))
        ));
        assert!(matches!(
            alice.create_game("Tekken"),
            Err(DomainError::CreateGame(_))
        ));
    }

    #[test]
    fn test_join_full_game_fails() {
        let server = RelayServer::new(RelayConfig {
            max_users: 300,
            ..RelayConfig::default()
        });
        let users: Vec<User> = (0..=MAX_PLAYERS_PER_GAME)
            .map(|i| server.login(&format!("player{}", i)).unwrap())
            .collect();

        let game_id = users[0].create_game("Street Fighter").unwrap();
        for user in &users[1..MAX_PLAYERS_PER_GAME] {
            user.join_game(game_id).unwrap();
        }
        assert_eq!(server.game_players(game_id).len(), MAX_PLAYERS_PER_GAME);

        let Err(DomainError::JoinGame(reason)) = users[MAX_PLAYERS_PER_GAME].join_game(game_id)
        else {
            panic!("expected the full game to refuse a join");
        };
        assert_eq!(reason, "game is full");
        assert_eq!(server.user_game(users[MAX_PLAYERS_PER_GAME].id()), None);
    }

    #[test]
    fn test_drop_reports_player_number_to_game() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, alice_events) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");
        let (_carol, carol_events) = login(&server, "carol");

        let game_id = alice.create_game("Street Fighter").unwrap();
        bob.join_game(game_id).unwrap();
        alice_events.take();
        bob_events.take();
        carol_events.take();

        bob.drop_game().unwrap();

        let expected = RelayEvent::UserDropped {
            game_id,
            user: bob.info().clone(),
            player_number: 2,
        };
        assert_eq!(alice_events.take(), vec![expected.clone()]);
        assert_eq!(bob_events.take(), vec![expected]);
        assert!(carol_events.take().is_empty());
    }

    #[test]
    fn test_drop_outside_game_fails() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, _) = login(&server, "alice");
        assert_eq!(
            alice.drop_game(),
            Err(DomainError::DropGame("not in a game".to_string()))
        );
    }

    #[test]
    fn test_all_ready_starts_game() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, alice_events) = login(&server, "alice");
        let (bob, _) = login(&server, "bob");

        let game_id = alice.create_game("Street Fighter").unwrap();
        bob.join_game(game_id).unwrap();
        alice_events.take();

        alice.player_ready().unwrap();
        assert!(alice_events.take().is_empty());
        assert_eq!(server.game_status(game_id), Some(GameStatus::Waiting));

        bob.player_ready().unwrap();
        assert_eq!(alice_events.take(), vec![RelayEvent::AllReady { game_id }]);
        assert_eq!(server.game_status(game_id), Some(GameStatus::Playing));

        // A repeated ready is ignored
        bob.player_ready().unwrap();
        assert!(alice_events.take().is_empty());
    }

    #[test]
    fn test_game_data_requires_running_game() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, _) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");

        let game_id = alice.create_game("Street Fighter").unwrap();
        bob.join_game(game_id).unwrap();
        assert!(matches!(
            alice.add_game_data(vec![1, 2]),
            Err(DomainError::GameData(_))
        ));

        alice.player_ready().unwrap();
        bob.player_ready().unwrap();
        bob_events.take();

        alice.add_game_data(vec![1, 2]).unwrap();
        assert_eq!(bob_events.kinds(), vec![EventKind::GameData]);
    }

    #[test]
    fn test_kick_rules() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, alice_events) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");

        let game_id = alice.create_game("Street Fighter").unwrap();
        bob.join_game(game_id).unwrap();

        assert_eq!(
            bob.game_kick(alice.id()),
            Err(DomainError::GameKick(
                "Only the game owner can kick players".to_string()
            ))
        );
        assert!(matches!(alice.game_kick(alice.id()), Err(DomainError::GameKick(_))));
        assert!(matches!(alice.game_kick(999), Err(DomainError::GameKick(_))));

        alice_events.take();
        bob_events.take();
        alice.game_kick(bob.id()).unwrap();

        assert_eq!(server.game_players(game_id), vec![alice.id()]);
        assert_eq!(server.user_game(bob.id()), None);
        assert_eq!(
            bob_events.kinds(),
            vec![EventKind::GameInfo, EventKind::UserQuitGame]
        );
        assert_eq!(
            alice_events.kinds(),
            vec![EventKind::GameInfo, EventKind::UserQuitGame]
        );
    }

    #[test]
    fn test_owner_quit_closes_game() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, _) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");

        let game_id = alice.create_game("Street Fighter").unwrap();
        bob.join_game(game_id).unwrap();
        bob_events.take();

        alice.quit("bye").unwrap();

        assert_eq!(server.game_count(), 0);
        assert_eq!(server.user_game(bob.id()), None);
        assert_eq!(server.user_count(), 1);
        assert_eq!(
            bob_events.kinds(),
            vec![EventKind::UserQuitGame, EventKind::GameInfo, EventKind::UserQuit]
        );

        // Quitting again is harmless
        alice.quit("bye").unwrap();
    }

    #[test]
    fn test_info_message_is_single_recipient() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, alice_events) = login(&server, "alice");
        let (_bob, bob_events) = login(&server, "bob");

        server.announce_to(alice.id(), "welcome");

        assert_eq!(
            alice_events.take(),
            vec![RelayEvent::InfoMessage {
                user_id: alice.id(),
                message: "welcome".to_string()
            }]
        );
        assert!(bob_events.take().is_empty());
    }

    #[test]
    fn test_dropped_listener_is_skipped() {
        let server = RelayServer::new(RelayConfig::default());
        let (alice, alice_events) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");
        drop(bob_events);

        let game_id = alice.create_game("Street Fighter").unwrap();
        bob.join_game(game_id).unwrap();
        assert_eq!(alice_events.kinds().last(), Some(&EventKind::UserJoinedGame));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_cancels_looking_for_game_report() {
        let server = RelayServer::new(RelayConfig {
            looking_for_game_enabled: true,
            ..RelayConfig::default()
        });
        let (alice, alice_events) = login(&server, "alice");
        let (bob, _) = login(&server, "bob");

        let game_id = alice.create_game("Street Fighter").unwrap();
        assert_eq!(server.reporter().pending_count(), 1);
        assert!(alice_events.take().iter().any(|e| matches!(
            e,
            RelayEvent::GameInfo { to_user: Some(id), .. } if *id == alice.id()
        )));

        bob.join_game(game_id).unwrap();
        assert_eq!(server.reporter().pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reap_idle_removes_only_silent_users() {
        let server = RelayServer::new(RelayConfig {
            keep_alive_timeout: Duration::from_secs(10),
            ..RelayConfig::default()
        });
        let (alice, _) = login(&server, "alice");
        let (bob, bob_events) = login(&server, "bob");

        tokio::time::advance(Duration::from_secs(6)).await;
        bob.keep_alive().unwrap();
        assert_eq!(server.reap_idle(), 0);

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(server.reap_idle(), 1);
        assert_eq!(server.user_count(), 1);
        assert!(server.last_activity(alice.id()).is_none());
        assert!(bob_events.take().iter().any(|e| matches!(
            e,
            RelayEvent::UserQuit { user, message } if user.id == alice.id() && message == "Timeout"
        )));

        tokio::time::advance(Duration::from_secs(5)).await;
        bob.touch();
        assert_eq!(server.reap_idle(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_idle_reaper_task_logs_out_stale_users() {
        let server = RelayServer::new(RelayConfig {
            keep_alive_timeout: Duration::from_secs(10),
            ..RelayConfig::default()
        });
        let reaper = server.spawn_idle_reaper();
        let alice_id = server.login("alice").unwrap().id();

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert!(server.last_activity(alice_id).is_some());

        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(server.user_count(), 0);

        drop(server);
        tokio::time::sleep(IDLE_CHECK_INTERVAL * 2).await;
        assert!(reaper.is_finished());
    }
}
