//! Game creation
//!
//! Creating a game is announced to every connected user, except that a
//! stealth owner's game is only shown to the owner.

use super::{notify, wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{error, warn};
use protocol::{Message, MessageBody};

const NAME: &str = "CreateGameAction";

#[derive(Debug, Default)]
pub struct CreateGameAction {
    counters: Counters,
}

impl Action for CreateGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let MessageBody::CreateGameRequest { rom_name } = message.body() else {
            return Err(wrong_variant(NAME, message));
        };

        if let Err(e) = session.user().create_game(rom_name) {
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

impl EventHandler for CreateGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::GameCreated {
            game_id,
            rom_name,
            owner,
        } = event
        else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if owner.stealth && owner.id != session.user().id() {
            return;
        }
        notify(
            NAME,
            session,
            MessageBody::CreateGameNotification {
                username: owner.name.clone(),
                rom_name: rom_name.clone(),
                game_id: *game_id,
            },
        );
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}
