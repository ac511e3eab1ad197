//! Timeout reports
//!
//! A client that stops hearing from the server reports the first message
//! number it is missing. The report travels through the game so the
//! reporter's own session can replay its cache; every other player's session
//! only logs it.

use super::{wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{debug, error};
use protocol::{Message, MessageBody, MessageNumber};

const NAME: &str = "GameTimeoutAction";

#[derive(Debug, Default)]
pub struct GameTimeoutAction {
    counters: Counters,
}

impl Action for GameTimeoutAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let MessageBody::GameTimeoutRequest { timeout_number } = message.body() else {
            return Err(wrong_variant(NAME, message));
        };

        if let Err(e) = session.user().report_timeout(*timeout_number) {
            debug!("{}: {}", session.user(), e);
        }
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}

impl EventHandler for GameTimeoutAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::GameTimeout {
            user,
            timeout_number,
            ..
        } = event
        else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if user.id == session.user().id() {
            session.resend(MessageNumber(*timeout_number));
        } else {
            debug!(
                "{}: {} timed out at #{}",
                session.user(),
                user,
                timeout_number
            );
        }
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
