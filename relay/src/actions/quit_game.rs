//! Players leaving a game
//!
//! There is no client request for this; users leave a game by being kicked
//! or by quitting the server.

use super::{notify, Counters, EventHandler};
use crate::model::RelayEvent;
use crate::session::ClientSession;
use log::error;
use protocol::MessageBody;

const NAME: &str = "QuitGameAction";

#[derive(Debug, Default)]
pub struct QuitGameAction {
    counters: Counters,
}

impl EventHandler for QuitGameAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn handle(&self, event: &RelayEvent, session: &ClientSession) {
        self.counters.record_handled();
        let RelayEvent::UserQuitGame { user, .. } = event else {
            error!("{} received unexpected event {:?}", NAME, event.kind());
            return;
        };

        if user.stealth && user.id != session.user().id() {
            return;
        }
        notify(
            NAME,
            session,
            MessageBody::QuitGameNotification {
                username: user.name.clone(),
                user_id: user.id,
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
    async fn test_stealth_departure_is_hidden() {
        let harness = Harness::new(RelayConfig {
            stealth_users: vec!["ghost".to_string()],
            ..RelayConfig::default()
        });
        let (_, clients) = harness.game_of(&["alice", "bob", "ghost"]).await;
        let (alice, bob, ghost) = (&clients[0], &clients[1], &clients[2]);

        alice
            .request(MessageBody::GameKickRequest {
                user_id: ghost.user_id(),
            })
            .unwrap();

        // Only the kick announcement reaches the others
        for client in [alice, bob] {
            let bodies = client.bodies().await;
            assert_eq!(bodies.len(), 1);
            assert!(matches!(
                &bodies[0],
                MessageBody::GameChatNotification { username, .. } if username == "Server"
            ));
        }
        let ghost_bodies = ghost.bodies().await;
        assert!(ghost_bodies.contains(&MessageBody::QuitGameNotification {
            username: "ghost".to_string(),
            user_id: ghost.user_id(),
        }));
    }
}
