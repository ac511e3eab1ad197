//! Keep-alive pings from idle clients

use super::{wrong_variant, Action, Counters};
use crate::error::FatalActionError;
use crate::session::ClientSession;
use log::debug;
use protocol::{Message, MessageBody};

const NAME: &str = "KeepAliveAction";

#[derive(Debug, Default)]
pub struct KeepAliveAction {
    counters: Counters,
}

impl Action for KeepAliveAction {
    fn name(&self) -> &'static str {
        NAME
    }

    fn perform(&self, message: &Message, session: &ClientSession) -> Result<(), FatalActionError> {
        self.counters.record_performed();
        if !matches!(message.body(), MessageBody::KeepAlive { .. }) {
            return Err(wrong_variant(NAME, message));
        }

        if let Err(e) = session.user().keep_alive() {
            debug!("{}: {}", session.user(), e);
        }
        Ok(())
    }

    fn performed_count(&self) -> u64 {
        self.counters.performed()
    }
}
