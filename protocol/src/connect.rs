//! Handshake messages exchanged on the public connect port
//!
//! A client greets the connect port with `Hello`; the server answers with the
//! private port allocated for that client's session.

use bincode::{deserialize, serialize};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectMessage {
    Ping,
    Pong,
    Hello { protocol: String, username: String },
    HelloD00d { port: u16 },
    Rejected { reason: String },
}

impl ConnectMessage {
    pub fn encode(&self) -> Result<Vec<u8>, bincode::Error> {
        serialize(self)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, bincode::Error> {
        deserialize(bytes)
    }
}
