//! Kick requests
//!
//! Only the game owner may kick. A refused kick is reported back to the
//! requester as a chat line from "Error"; the kicked player's departure is
//! announced by the quit-game and game-info handlers.

use super::{notify, wrong_variant, Action, Counters};
use crate::error::FatalActionError;
use crate::session::ClientSession;
use log::error;
use protocol::{Message, MessageBody};

const NAME: &str = "GameKickAction";

#[derive(Debug, Default)]
pub struct GameKickAction {
    counters: Counters,
}

impl Action for GameKickAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let MessageBody::GameKickRequest { user_id } = message.body() else {
            return Err(wrong_variant(NAME, message));
        };

        if let Err(e) = session.user().game_kick(*user_id) {
            error!("{}: failed to kick User{}: {}", session.user(), user_id, e);
            notify(
                NAME,
                session,
                MessageBody::GameChatNotification {
                    username: "Error".to_string(),
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
