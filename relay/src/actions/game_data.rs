//! Game input relay
//!
//! Clients send input either in full or as a one-byte key into the cache of
//! payloads they sent before. The relay resolves keys against its mirror of
//! the client's cache and forwards the full payload to the domain. Outbound,
//! each recipient session picks the cached form when its own client already
//! holds the payload.

use super::{wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{error, warn};
use protocol::{Message, MessageBody};

const NAME: &str = "GameDataAction";

#[derive(Debug, Default)]
pub struct GameDataAction {
    counters: Counters,
}

impl Action for GameDataAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let data = match message.body() {
            MessageBody::GameDataRequest { data } => {
                session.remember_client_game_data(data.clone());
                data.clone()
            }
            MessageBody::CachedGameDataRequest { key } => match session.client_game_data(*key) {
                Some(data) => data,
                None => {
                    warn!(
                        "{}: cached game data key {} is not in the cache, dropping",
                        session.user(),
                        key
                    );
                    return Ok(());
                }
            },
            _ => return Err(wrong_variant(NAME, message)),
        };

        if let Err(e) = session.user().add_game_data(data) {
            warn!("{}: {}", session.user(), e);
        }
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}

impl EventHandler for GameDataAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::GameData { user, data, .. } = event else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if user.id == session.user().id() {
            return;
        }
        if let Err(e) = session.send_game_data(data.clone()) {
            error!(
                "{}: failed to send game data to {}: {}",
                NAME,
                session.user(),
                e
            );
        }
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
