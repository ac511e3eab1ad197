//! Joining games
//!
//! A join is shown to every player of the game. A stealth user joining is
//! only shown to itself.

use super::{notify, wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{error, warn};
use protocol::{Message, MessageBody};

const NAME: &str = "JoinGameAction";

#[derive(Debug, Default)]
pub struct JoinGameAction {
    counters: Counters,
}

impl Action for JoinGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let MessageBody::JoinGameRequest { game_id } = message.body() else {
            return Err(wrong_variant(NAME, message));
        };

        if let Err(e) = session.user().join_game(*game_id) {
            warn!("{}: {}", session.user(), e);
            notify(
                NAME,
                session,
                MessageBody::InformationMessage {
                    source: "server".to_string(),
                    message: e.to_string(),
                },
            );
        }
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}

impl EventHandler for JoinGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::UserJoinedGame { game_id, user } = event else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if user.stealth && user.id != session.user().id() {
            return;
        }
        notify(
            NAME,
            session,
            MessageBody::JoinGameNotification {
                game_id: *game_id,
                username: user.name.clone(),
                user_id: user.id,
            },
        );
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
