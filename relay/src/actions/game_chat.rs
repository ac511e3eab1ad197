//! In-game chat

use super::{notify, wrong_variant, Action, Counters, EventHandler};
use crate::error::FatalActionError;
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::{error, warn};
use protocol::{Message, MessageBody};

const NAME: &str = "GameChatAction";

#[derive(Debug, Default)]
pub struct GameChatAction {
    counters: Counters,
}

impl Action for GameChatAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        let MessageBody::GameChatRequest { message: text } = message.body() else {
            return Err(wrong_variant(NAME, message));
        };

        if let Err(e) = session.user().game_chat(text) {
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

impl EventHandler for GameChatAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::GameChat { user, message, .. } = event else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        notify(
            NAME,
            session,
            MessageBody::GameChatNotification {
                username: user.name.clone(),
                message: message.clone(),
            },
        );
    }

    fn handled_count(&self) -> u64 {
        self.counters.handled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RelayConfig;
    use crate::testing::Harness;

    #[tokio::test]
    async fn test_chat_reaches_all_players() {
        let harness = Harness::new(RelayConfig::default());
        let (_, clients) = harness.game_of(&["alice", "bob"]).await;

        clients[1]
            .request(MessageBody::GameChatRequest {
                message: "gg".to_string(),
            })
            .unwrap();

        for client in &clients {
            assert_eq!(
                client.bodies().await,
                vec![MessageBody::GameChatNotification {
                    username: "bob".to_string(),
                    message: "gg".to_string(),
                }]
            );
        }
    }

    #[tokio::test]
    async fn test_chat_outside_game_reports_error() {
        let harness = Harness::new(RelayConfig::default());
        let alice = harness.connect("alice").await;

        alice
            .request(MessageBody::GameChatRequest {
                message: "anyone?".to_string(),
            })
            .unwrap();

        let bodies = alice.bodies().await;
        assert_eq!(bodies.len(), 1);
        assert!(matches!(
            &bodies[0],
            MessageBody::InformationMessage { source, .. } if source == "server"
        ));
    }
}
