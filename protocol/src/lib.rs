//! Wire types shared by the relay server and its clients
//!
//! - [`sequence`]: wrapping 16-bit message numbers
//! - [`message`]: typed v086 requests and notifications
//! - [`bundle`]: bundles of messages and the [`Codec`] seam
//! - [`connect`]: the handshake spoken on the public connect port

pub mod bundle;
pub mod connect;
pub mod message;
pub mod sequence;

pub use bundle::{BincodeCodec, Bundle, BundleError, Codec};
pub use connect::ConnectMessage;
pub use message::{Message, MessageBody, MessageType};
pub use sequence::{sequence_greater_than, sequence_less_than, wrapping_diff, MessageNumber};

/// Protocol string clients send in their `Hello`
pub const PROTOCOL_VERSION: &str = "0.83";

/// Maximum number of messages framed into a single datagram
pub const MAX_BUNDLE_SIZE: usize = 9;

/// Receive buffer size for a single datagram
pub const MAX_DATAGRAM_SIZE: usize = 2048;
