//! Player drops
//!
//! A client drops out of a running game without leaving it. Everyone else in
//! the game is told which player slot went away; the dropper already knows,
//! and a stealth dropper is never announced.

use super::{notify, wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{debug, error};
use protocol::{Message, MessageBody};

const NAME: &str = "DropGameAction";

#[derive(Debug, Default)]
pub struct DropGameAction {
    counters: Counters,
}

impl Action for DropGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        if !matches!(message.body(), MessageBody::PlayerDropRequest) {
            return Err(wrong_variant(NAME, message));
        }

        if let Err(e) = session.user().drop_game() {
            debug!("{}: {}", session.user(), e);
        }
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}

impl EventHandler for DropGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::UserDropped {
            user,
            player_number,
            ..
        } = event
        else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if user.id == session.user().id() || user.stealth {
            return;
        }
        notify(
            NAME,
            session,
            MessageBody::PlayerDropNotification {
                username: user.name.clone(),
                player_number: *player_number,
            },
        );
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
