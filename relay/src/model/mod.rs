//! Domain model: users, games and the events they produce

pub mod events;
pub mod server;
pub mod user;

pub use events::{EventKind, EventListener, RelayEvent, UserInfo};
pub use server::{GameStatus, RelayServer};
pub use user::User;
