use crate::sequence::MessageNumber;
use serde::{Deserialize, Serialize};
use std::fmt;

/// v086 message type ids
///
/// A request and the notification of the same family share one id; the
/// direction is carried by the [`MessageBody`] variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    Quit = 0x01,
    GameChat = 0x08,
    KeepAlive = 0x09,
    CreateGame = 0x0A,
    QuitGame = 0x0B,
    JoinGame = 0x0C,
    GameKick = 0x0F,
    GameData = 0x12,
    CachedGameData = 0x13,
    PlayerDrop = 0x14,
    AllReady = 0x15,
    InformationMessage = 0x17,
    GameTimeout = 0x18,
}

impl MessageType {
    pub fn id(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}(0x{:02X})", self, self.id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageBody {
    // Client -> server
    QuitRequest {
        message: String,
    },
    GameChatRequest {
        message: String,
    },
    KeepAlive {
        value: u8,
    },
    CreateGameRequest {
        rom_name: String,
    },
    JoinGameRequest {
        game_id: u32,
    },
    GameKickRequest {
        user_id: u16,
    },
    GameDataRequest {
        data: Vec<u8>,
    },
    CachedGameDataRequest {
        key: u8,
    },
    PlayerDropRequest,
    UserReadyRequest,
    GameTimeoutRequest {
        timeout_number: u16,
    },

    // Server -> client
    QuitNotification {
        username: String,
        user_id: u16,
        message: String,
    },
    GameChatNotification {
        username: String,
        message: String,
    },
    CreateGameNotification {
        username: String,
        rom_name: String,
        game_id: u32,
    },
    QuitGameNotification {
        username: String,
        user_id: u16,
    },
    JoinGameNotification {
        game_id: u32,
        username: String,
        user_id: u16,
    },
    GameDataNotification {
        data: Vec<u8>,
    },
    CachedGameDataNotification {
        key: u8,
    },
    PlayerDropNotification {
        username: String,
        /// Port number of the player within the game, not the user id
        player_number: u8,
    },
    AllReadyNotification,
    InformationMessage {
        source: String,
        message: String,
    },
}

impl MessageBody {
    /// The type tag used for handler dispatch
    pub fn message_type(&self) -> MessageType {
        match self {
            MessageBody::QuitRequest { .. } | MessageBody::QuitNotification { .. } => {
                MessageType::Quit
            }
            MessageBody::GameChatRequest { .. } | MessageBody::GameChatNotification { .. } => {
                MessageType::GameChat
            }
            MessageBody::KeepAlive { .. } => MessageType::KeepAlive,
            MessageBody::CreateGameRequest { .. } | MessageBody::CreateGameNotification { .. } => {
                MessageType::CreateGame
            }
            MessageBody::QuitGameNotification { .. } => MessageType::QuitGame,
            MessageBody::JoinGameRequest { .. } | MessageBody::JoinGameNotification { .. } => {
                MessageType::JoinGame
            }
            MessageBody::GameKickRequest { .. } => MessageType::GameKick,
            MessageBody::GameDataRequest { .. } | MessageBody::GameDataNotification { .. } => {
                MessageType::GameData
            }
            MessageBody::CachedGameDataRequest { .. }
            | MessageBody::CachedGameDataNotification { .. } => MessageType::CachedGameData,
            MessageBody::PlayerDropRequest | MessageBody::PlayerDropNotification { .. } => {
                MessageType::PlayerDrop
            }
            MessageBody::UserReadyRequest | MessageBody::AllReadyNotification => {
                MessageType::AllReady
            }
            MessageBody::InformationMessage { .. } => MessageType::InformationMessage,
            MessageBody::GameTimeoutRequest { .. } => MessageType::GameTimeout,
        }
    }

    /// True for the variants a client is allowed to send
    pub fn is_request(&self) -> bool {
        matches!(
            self,
            MessageBody::QuitRequest { .. }
                | MessageBody::GameChatRequest { .. }
                | MessageBody::KeepAlive { .. }
                | MessageBody::CreateGameRequest { .. }
                | MessageBody::JoinGameRequest { .. }
                | MessageBody::GameKickRequest { .. }
                | MessageBody::GameDataRequest { .. }
                | MessageBody::CachedGameDataRequest { .. }
                | MessageBody::PlayerDropRequest
                | MessageBody::UserReadyRequest
                | MessageBody::GameTimeoutRequest { .. }
        )
    }
}

/// A numbered protocol message
///
/// Messages are immutable once built; the sender's session stamps the number
/// when the message is queued for transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    number: MessageNumber,
    body: MessageBody,
}

impl Message {
    pub fn new(number: MessageNumber, body: MessageBody) -> Self {
        Self { number, body }
    }

    pub fn number(&self) -> MessageNumber {
        self.number
    }

    pub fn body(&self) -> &MessageBody {
        &self.body
    }

    pub fn message_type(&self) -> MessageType {
        self.body.message_type()
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {}", self.number, self.message_type())
    }
}
