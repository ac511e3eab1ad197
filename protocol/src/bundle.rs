//! Message bundles and the codec seam
//!
//! A bundle frames one or more messages into a single datagram. Messages are
//! kept in logical send order, oldest first.

use crate::message::Message;
use crate::MAX_BUNDLE_SIZE;
use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BundleError {
    #[error("bundle contains no messages")]
    Empty,

    #[error("bundle contains {0} messages, at most {max} are allowed", max = MAX_BUNDLE_SIZE)]
    TooManyMessages(usize),

    #[error("failed to encode bundle: {0}")]
    Encode(#[source] bincode::Error),

    #[error("failed to decode bundle: {0}")]
    Decode(#[source] bincode::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bundle {
    messages: Vec<Message>,
}

impl Bundle {
    pub fn new(messages: Vec<Message>) -> Result<Self, BundleError> {
        let bundle = Self { messages };
        bundle.validate()?;
        Ok(bundle)
    }

    pub fn single(message: Message) -> Self {
        Self {
            messages: vec![message],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn validate(&self) -> Result<(), BundleError> {
        match self.messages.len() {
            0 => Err(BundleError::Empty),
            n if n > MAX_BUNDLE_SIZE => Err(BundleError::TooManyMessages(n)),
            _ => Ok(()),
        }
    }
}

/// Converts bundles to and from datagram payloads
///
/// Sessions only depend on this trait, so the binary layout can change
/// without touching session or handler code.
pub trait Codec: Send + Sync {
    fn encode(&self, bundle: &Bundle) -> Result<Vec<u8>, BundleError>;

    fn decode(&self, bytes: &[u8]) -> Result<Bundle, BundleError>;
}

/// Codec backed by bincode over the serde derives
#[derive(Debug, Default, Clone, Copy)]
pub struct BincodeCodec;

impl Codec for BincodeCodec {
    fn encode(&self, bundle: &Bundle) -> Result<Vec<u8>, BundleError> {
        bundle.validate()?;
        serialize(bundle).map_err(BundleError::Encode)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Bundle, BundleError> {
        let bundle: Bundle = deserialize(bytes).map_err(BundleError::Decode)?;
        bundle.validate()?;
        Ok(bundle)
    }
}
