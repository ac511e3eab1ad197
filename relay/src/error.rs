//! Error taxonomy
//!
//! - [`FatalActionError`] ends the session that raised it.
//! - [`DomainError`] is absorbed by the action handler that received it.
//! - [`TransportError`] and [`SessionError`] cost one outbound message.

use protocol::{BundleError, MessageType};
use std::io;
use thiserror::Error;

/// An inbound message that no handler can accept
///
/// Points at a protocol or decoder bug, never at a user mistake.
#[derive(Debug, Error)]
pub enum FatalActionError {
    #[error("{handler} received incorrect message variant: {received}")]
    WrongVariant {
        handler: &'static str,
        received: String,
    },
}

/// Failures reported by the domain model
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("drop game failed: {0}")]
    DropGame(String),

    #[error("{0}")]
    GameKick(String),

    #[error("ready signal failed: {0}")]
    UserReady(String),

    #[error("game chat failed: {0}")]
    GameChat(String),

    #[error("create game failed: {0}")]
    CreateGame(String),

    #[error("join game failed: {0}")]
    JoinGame(String),

    #[error("game data rejected: {0}")]
    GameData(String),

    #[error("timeout report rejected: {0}")]
    Timeout(String),

    #[error("login failed: {0}")]
    Login(String),
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no remote address has been learned yet")]
    NoRemoteAddress,

    #[error("socket error: {0}")]
    Io(#[from] io::Error),
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("failed to encode {message_type}: {source}")]
    Encode {
        message_type: MessageType,
        #[source]
        source: BundleError,
    },

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("session is stopped")]
    Stopped,
}
