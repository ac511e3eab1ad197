//! Server announcements inside a game, shown as chat from "Server"

use super::{notify, Counters, EventHandler};
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::error;
use protocol::MessageBody;

const NAME: &str = "GameInfoAction";

#[derive(Debug, Default)]
pub struct GameInfoAction {
    counters: Counters,
}

impl EventHandler for GameInfoAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::GameInfo {
            message, to_user, ..
        } = event
        else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if let Some(recipient) = to_user {
            if *recipient != session.user().id() {
                return;
            }
        }
        notify(
            NAME,
            session,
            MessageBody::GameChatNotification {
                username: "Server".to_string(),
                message: message.clone(),
            },
        );
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
