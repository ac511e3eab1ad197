//! Leaving the server

use super::{notify, wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{debug, error, info};
use protocol::{Message, MessageBody};

const NAME: &str = "QuitAction";

#[derive(Debug, Default)]
pub struct QuitAction {
    counters: Counters,
}

impl Action for QuitAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let MessageBody::QuitRequest { message: text } = message.body() else {
            return Err(wrong_variant(NAME, message));
        };

        info!("{} is quitting: {}", session.user(), text);
        if let Err(e) = session.user().quit(text) {
            debug!("{}: {}", session.user(), e);
        }
        session.stop();
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}

impl EventHandler for QuitAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::UserQuit { user, message } = event else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        notify(
            NAME,
            session,
            MessageBody::QuitNotification {
                username: user.name.clone(),
                user_id: user.id,
                message: message.clone(),
            },
        );
        // Logged out elsewhere, e.g. by the idle reaper
        if user.id == session.user().id() {
            session.stop();
        }
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
