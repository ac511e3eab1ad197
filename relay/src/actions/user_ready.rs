//! Ready signals
//!
//! Each player signals ready once its emulator is synchronised. When the last
//! player is ready every session clears its game-data caches, exactly as the
//! clients do, and then announces the start.

use super::{notify, wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{debug, error};
use protocol::{Message, MessageBody};

const NAME: &str = "UserReadyAction";

#[derive(Debug, Default)]
pub struct UserReadyAction {
    counters: Counters,
}

impl Action for UserReadyAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        if !matches!(message.body(), MessageBody::UserReadyRequest) {
            return Err(wrong_variant(NAME, message));
        }

        if let Err(e) = session.user().player_ready() {
            debug!("{}: {}", session.user(), e);
        }
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}

impl EventHandler for UserReadyAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        if !matches!(event, RelayEvent::AllReady { .. }) {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        }

        session.reset_game_data_cache();
        notify(NAME, session, MessageBody::AllReadyNotification);
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
