//! Inbound action and event handler tables
//!
//! Every v086 message family has one stateless handler object. As an
//! [`Action`] it performs a client request against the domain model; as an
//! [`EventHandler`] it turns a domain event into a notification for one
//! recipient session. Handlers are built once per process and shared by all
//! sessions; their only state is a pair of invocation counters.

mod create_game;
mod drop_game;
mod game_chat;
mod game_data;
mod game_info;
mod game_kick;
mod game_timeout;
mod info_message;
mod join_game;
mod keep_alive;
mod quit;
mod quit_game;
mod user_ready;

pub use create_game::CreateGameAction;
pub use drop_game::DropGameAction;
pub use game_chat::GameChatAction;
pub use game_data::GameDataAction;
pub use game_info::GameInfoAction;
pub use game_kick::GameKickAction;
pub use game_timeout::GameTimeoutAction;
pub use info_message::InfoMessageAction;
pub use join_game::JoinGameAction;
pub use keep_alive::KeepAliveAction;
pub use quit::QuitAction;
pub use quit_game::QuitGameAction;
pub use user_ready::UserReadyAction;

use crate::error::FatalActionError;
use crate::model::{EventKind, RelayEvent};
use crate::session::ClientSession;
use log::error;
use protocol::{Message, MessageBody, MessageType};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Handles one family of client requests
pub trait Action: Send + Sync {
    fn name(&self) -> &'static str;

    /// Performs `message` on behalf of the session's user
    ///
    /// Domain failures are handled inside; only a message the handler cannot
    /// interpret at all is returned as an error, and it ends the session.
    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError>;

    fn performed_count(&self) -> u64;
}

/// Turns one kind of domain event into a notification for one session
pub trait EventHandler: Send + Sync {
    fn name(&self) -> &'static str;

    fn handle(&self, event: &RelayEvent, session: &ClientSession);

    fn handled_count(&self) -> u64;
}

/// Invocation counters shared by every handler
#[derive(Debug, Default)]
pub struct Counters {
    performed: AtomicU64,
    handled: AtomicU64,
}

impl Counters {
    pub fn record_performed(&self) {
        self.performed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_handled(&self) {
        self.handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn performed(&self) -> u64 {
        self.performed.load(Ordering::Relaxed)
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }
}

pub(crate) fn wrong_variant(handler: &'static str, message: &Message) -> FatalActionError {
    FatalActionError::WrongVariant {
        handler,
        received: format!("{:?}", message.body()),
    }
}

/// Sends a notification, logging instead of failing
pub(crate) fn notify(handler: &'static str, session: &ClientSession, body: MessageBody) {
    let message_type = body.message_type();
    if let Err(e) = session.send(body) {
        error!(
            "{}: failed to send {} to {}: {}",
            handler,
            message_type,
            session.user(),
            e
        );
    }
}

/// Request handlers keyed by message type
#[derive(Clone)]
pub struct ActionTable {
    actions: HashMap<MessageType, Arc<dyn Action>>,
}

impl ActionTable {
    pub fn standard() -> Self {
        HandlerTables::standard().actions
    }

    pub fn get(&self, message_type: MessageType) -> Option<&Arc<dyn Action>> {
        self.actions.get(&message_type)
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Event handlers keyed by event kind
#[derive(Clone)]
pub struct EventHandlerTable {
    handlers: HashMap<EventKind, Arc<dyn EventHandler>>,
}

impl EventHandlerTable {
    pub fn standard() -> Self {
        HandlerTables::standard().events
    }

    pub fn get(&self, kind: EventKind) -> Option<&Arc<dyn EventHandler>> {
        self.handlers.get(&kind)
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Both tables, sharing one instance per handler
#[derive(Clone)]
pub struct HandlerTables {
    pub actions: ActionTable,
    pub events: EventHandlerTable,
}

impl HandlerTables {
    pub fn standard() -> Self {
        let create_game = Arc::new(CreateGameAction::default());
        let drop_game = Arc::new(DropGameAction::default());
        let game_chat = Arc::new(GameChatAction::default());
        let game_data = Arc::new(GameDataAction::default());
        let game_kick = Arc::new(GameKickAction::default());
        let game_timeout = Arc::new(GameTimeoutAction::default());
        let join_game = Arc::new(JoinGameAction::default());
        let keep_alive = Arc::new(KeepAliveAction::default());
        let quit = Arc::new(QuitAction::default());
        let user_ready = Arc::new(UserReadyAction::default());

        let mut actions: HashMap<MessageType, Arc<dyn Action>> = HashMap::new();
        actions.insert(MessageType::Quit, quit.clone());
        actions.insert(MessageType::GameChat, game_chat.clone());
        actions.insert(MessageType::KeepAlive, keep_alive);
        actions.insert(MessageType::CreateGame, create_game.clone());
        actions.insert(MessageType::JoinGame, join_game.clone());
        actions.insert(MessageType::GameKick, game_kick);
        actions.insert(MessageType::GameData, game_data.clone());
        actions.insert(MessageType::CachedGameData, game_data.clone());
        actions.insert(MessageType::PlayerDrop, drop_game.clone());
        actions.insert(MessageType::AllReady, user_ready.clone());
        actions.insert(MessageType::GameTimeout, game_timeout.clone());

        let mut handlers: HashMap<EventKind, Arc<dyn EventHandler>> = HashMap::new();
        handlers.insert(EventKind::GameCreated, create_game);
        handlers.insert(EventKind::UserQuit, quit);
        handlers.insert(EventKind::UserDropped, drop_game);
        handlers.insert(EventKind::GameInfo, Arc::new(GameInfoAction::default()));
        handlers.insert(EventKind::GameChat, game_chat);
        handlers.insert(EventKind::AllReady, user_ready);
        handlers.insert(EventKind::GameTimeout, game_timeout);
        handlers.insert(EventKind::UserJoinedGame, join_game);
        handlers.insert(EventKind::UserQuitGame, Arc::new(QuitGameAction::default()));
        handlers.insert(EventKind::GameData, game_data);
        handlers.insert(EventKind::InfoMessage, Arc::new(InfoMessageAction::default()));

        Self {
            actions: ActionTable { actions },
            events: EventHandlerTable { handlers },
        }
    }
}
