//! Server messages addressed to one user

use super::{notify, Counters, EventHandler};
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::error;
use protocol::MessageBody;

const NAME: &str = "InfoMessageAction";

#[derive(Debug, Default)]
pub struct InfoMessageAction {
    counters: Counters,
}

impl EventHandler for InfoMessageAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::InfoMessage { message, .. } = event else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        notify(
            NAME,
            session,
            MessageBody::InformationMessage {
                source: "server".to_string(),
                message: message.clone(),
            },
        );
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
