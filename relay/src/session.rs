//! Per-client protocol session
//!
//! A [`ClientSession`] ties one private transport to one logged-in user. It
//! stamps every outbound message with the next wrapping message number and
//! keeps the most recent ones so they can be replayed when the client reports
//! a timeout. Inbound bundles are decoded, stale or duplicate numbers are
//! skipped, and every new message is dispatched to its action handler.
//!
//! The outbound path is synchronous: number assignment, resend caching,
//! encoding and the datagram send all happen under one short-lived lock, so
//! event handlers running on other sessions' tasks can send without awaiting.
//!
//! Every datagram carries the new message after up to
//! `messages_per_datagram - 1` of its predecessors, so a single lost datagram
//! is covered by the next one. Neither live sends nor replays ever build a
//! datagram larger than [`MAX_DATAGRAM_SIZE`].

use crate::actions::HandlerTables;
use crate::cache::{GameDataCache, ResendCache};
use crate::config::RelayConfig;
use crate::error::{FatalActionError, SessionError};
use crate::model::{EventListener, RelayEvent, User};
use crate::transport::PrivateTransport;
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use protocol::{
    Bundle, BundleError, Codec, Message, MessageBody, MessageNumber, MAX_BUNDLE_SIZE,
    MAX_DATAGRAM_SIZE,
};
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;

struct Outbound {
    next_number: MessageNumber,
    last_sent: Option<MessageNumber>,
    resend_cache: ResendCache,
    /// Mirrors the client's cache of game data we sent
    game_data: GameDataCache,
}

struct Inbound {
    last_received: Option<MessageNumber>,
    /// Mirrors the client's cache of game data it sent
    game_data: GameDataCache,
}

pub struct ClientSession {
    transport: PrivateTransport,
    codec: Arc<dyn Codec>,
    user: User,
    tables: Arc<HandlerTables>,
    outbound: Mutex<Outbound>,
    inbound: Mutex<Inbound>,
    game_data_cache_capacity: usize,
    messages_per_datagram: usize,
    stopped: AtomicBool,
    shutdown: Notify,
}

impl ClientSession {
    pub fn new(
        transport: PrivateTransport,
        codec: Arc<dyn Codec>,
        user: User,
        tables: Arc<HandlerTables>,
        config: &RelayConfig,
    ) -> Arc<Self> {
        Arc::new(Self {
            transport,
            codec,
            user,
            tables,
            outbound: Mutex::new(Outbound {
                next_number: MessageNumber::ZERO,
                last_sent: None,
                resend_cache: ResendCache::new(config.resend_cache_capacity),
                game_data: GameDataCache::new(config.game_data_cache_capacity),
            }),
            inbound: Mutex::new(Inbound {
                last_received: None,
                game_data: GameDataCache::new(config.game_data_cache_capacity),
            }),
            game_data_cache_capacity: config.game_data_cache_capacity,
            messages_per_datagram: config.messages_per_datagram,
            stopped: AtomicBool::new(false),
            shutdown: Notify::new(),
        })
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn tables(&self) -> &HandlerTables {
        &self.tables
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.transport.local_addr()
    }

    pub fn remote_addr(&self) -> Option<SocketAddr> {
        self.transport.remote_addr()
    }

    #[cfg(test)]
    pub(crate) fn transport_accepts(&self, from: SocketAddr) -> bool {
        self.transport.accept_from(from)
    }

    /// Number of the most recent message handed to the transport
    pub fn last_sent_number(&self) -> Option<MessageNumber> {
        self.outbound.lock().last_sent
    }

    pub fn last_received_number(&self) -> Option<MessageNumber> {
        self.inbound.lock().last_received
    }

    /// Numbers, caches and sends one message
    ///
    /// The message stays in the resend cache even if the transport fails to
    /// deliver it.
    pub fn send(&self, body: MessageBody) -> Result<MessageNumber, SessionError> {
        let mut outbound = self.outbound.lock();
        self.send_locked(&mut outbound, body)
    }

    /// Sends game data, using the one-byte cached form when the client
    /// already holds the same payload
    pub fn send_game_data(&self, data: Vec<u8>) -> Result<MessageNumber, SessionError> {
        let mut outbound = self.outbound.lock();
        let body = match outbound.game_data.key_of(&data) {
            Some(key) => MessageBody::CachedGameDataNotification { key },
            None => {
                outbound.game_data.add(data.clone());
                MessageBody::GameDataNotification { data }
            }
        };
        self.send_locked(&mut outbound, body)
    }

    fn send_locked(
        &self,
        outbound: &mut Outbound,
        body: MessageBody,
    ) -> Result<MessageNumber, SessionError> {
        if self.is_stopped() {
            return Err(SessionError::Stopped);
        }

        let number = outbound.next_number;
        let message = Message::new(number, body);
        let single = self
            .codec
            .encode(&Bundle::single(message.clone()))
            .map_err(|source| SessionError::Encode {
                message_type: message.message_type(),
                source,
            })?;

        outbound.next_number = number.next();
        outbound.last_sent = Some(number);
        outbound.resend_cache.push(message);

        let recent = outbound.resend_cache.recent(self.messages_per_datagram);
        let bytes = self.pack_newest(&recent, single);
        self.transport.send(&bytes)?;
        Ok(number)
    }

    fn encode_messages(&self, messages: &[Message]) -> Result<Vec<u8>, BundleError> {
        Bundle::new(messages.to_vec()).and_then(|bundle| self.codec.encode(&bundle))
    }

    /// Extends `single` backwards with older messages while the datagram fits
    fn pack_newest(&self, recent: &[Message], single: Vec<u8>) -> Vec<u8> {
        let mut packed = single;
        for start in (0..recent.len().saturating_sub(1)).rev() {
            match self.encode_messages(&recent[start..]) {
                Ok(bytes) if bytes.len() <= MAX_DATAGRAM_SIZE => packed = bytes,
                _ => break,
            }
        }
        packed
    }

    /// Encodes the longest prefix of `messages` that fits in one datagram
    ///
    /// Returns how many messages were consumed. A lone message that is
    /// already too large is still returned on its own.
    fn pack_oldest(&self, messages: &[Message]) -> (usize, Result<Vec<u8>, BundleError>) {
        let first = match self.encode_messages(&messages[..1]) {
            Ok(bytes) => bytes,
            Err(e) => return (1, Err(e)),
        };

        let mut packed = (1, first);
        for count in 2..=messages.len().min(MAX_BUNDLE_SIZE) {
            match self.encode_messages(&messages[..count]) {
                Ok(bytes) if bytes.len() <= MAX_DATAGRAM_SIZE => packed = (count, bytes),
                _ => break,
            }
        }
        (packed.0, Ok(packed.1))
    }

    /// Replays every cached message from `from` onwards, oldest first
    ///
    /// Messages are packed into as few datagrams as the bundle and datagram
    /// limits allow. Returns the number of messages replayed; zero if `from`
    /// is no longer cached.
    pub fn resend(&self, from: MessageNumber) -> usize {
        let outbound = self.outbound.lock();
        let messages = outbound.resend_cache.since(from);
        if messages.is_empty() {
            debug!(
                "{}: nothing to resend from #{} (cached {:?}..={:?})",
                self.user,
                from,
                outbound.resend_cache.oldest(),
                outbound.resend_cache.newest()
            );
            return 0;
        }

        info!(
            "{}: resending {} messages from #{}",
            self.user,
            messages.len(),
            from
        );
        let mut rest = &messages[..];
        while !rest.is_empty() {
            let (count, result) = self.pack_oldest(rest);
            let result = result.map_err(|e| e.to_string()).and_then(|bytes| {
                if bytes.len() > MAX_DATAGRAM_SIZE {
                    warn!(
                        "{}: #{} alone encodes to {} bytes",
                        self.user,
                        rest[0].number(),
                        bytes.len()
                    );
                }
                self.transport.send(&bytes).map_err(|e| e.to_string())
            });
            if let Err(e) = result {
                error!("{}: failed to resend from #{}: {}", self.user, rest[0].number(), e);
            }
            rest = &rest[count..];
        }
        messages.len()
    }

    /// Forgets both game-data caches, as the client does when a game starts
    pub fn reset_game_data_cache(&self) {
        self.outbound.lock().game_data = GameDataCache::new(self.game_data_cache_capacity);
        self.inbound.lock().game_data = GameDataCache::new(self.game_data_cache_capacity);
    }

    /// Game data the client previously sent under `key`
    pub fn client_game_data(&self, key: u8) -> Option<Vec<u8>> {
        self.inbound.lock().game_data.get(key).map(<[u8]>::to_vec)
    }

    pub fn remember_client_game_data(&self, data: Vec<u8>) {
        self.inbound.lock().game_data.add(data);
    }

    /// Decodes one datagram and dispatches each new message in it
    ///
    /// Undecodable datagrams are dropped. Only a message no handler can
    /// interpret is an error.
    pub fn handle_datagram(&self, bytes: &[u8]) -> Result<(), FatalActionError> {
        let bundle = match self.codec.decode(bytes) {
            Ok(bundle) => bundle,
            Err(e) => {
                warn!("{}: dropping undecodable datagram: {}", self.user, e);
                return Ok(());
            }
        };
        self.user.touch();

        for message in bundle.into_messages() {
            if self.accept_number(message.number()) {
                self.dispatch(&message)?;
            }
        }
        Ok(())
    }

    fn accept_number(&self, number: MessageNumber) -> bool {
        let mut inbound = self.inbound.lock();
        if let Some(last) = inbound.last_received {
            if !number.is_newer_than(last) {
                debug!("{}: skipping already seen message #{}", self.user, number);
                return false;
            }
            let gap = last.distance_to(number);
            if gap > 1 {
                warn!(
                    "{}: {} messages missing between #{} and #{}",
                    self.user,
                    gap - 1,
                    last,
                    number
                );
            }
        }
        inbound.last_received = Some(number);
        true
    }

    /// Runs the action registered for the message's type
    pub fn dispatch(&self, message: &Message) -> Result<(), FatalActionError> {
        match self.tables.actions.get(message.message_type()) {
            Some(action) => {
                debug!("{}: {} -> {}", self.user, message, action.name());
                action.perform(message, self)
            }
            None => {
                warn!("{}: no action registered for {}", self.user, message);
                Ok(())
            }
        }
    }

    /// Stops the session; the receive loop exits and sends start failing
    pub fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            debug!("{}: session stopping", self.user);
            self.shutdown.notify_one();
        }
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Receive loop; returns once the session stops
    ///
    /// On exit the user is logged out of the domain model.
    pub async fn run(self: Arc<Self>) {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        if let Ok(addr) = self.local_addr() {
            info!("{}: session listening on {}", self.user, addr);
        }

        while !self.is_stopped() {
            tokio::select! {
                result = self.transport.recv(&mut buffer) => match result {
                    Ok(len) => {
                        if let Err(e) = self.handle_datagram(&buffer[..len]) {
                            warn!("{}: fatal action, closing connection: {}", self.user, e);
                            break;
                        }
                    }
                    Err(e) => {
                        error!("{}: error receiving packet: {}", self.user, e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                },
                _ = self.shutdown.notified() => break,
            }
        }

        self.stop();
        if let Err(e) = self.user.quit("Connection closed") {
            debug!("{}: quit on close failed: {}", self.user, e);
        }
        info!("{}: session closed", self.user);
    }
}

impl EventListener for ClientSession {
    fn on_event(&self, event: &RelayEvent) {
        if self.is_stopped() {
            return;
        }
        match self.tables.events.get(event.kind()) {
            Some(handler) => handler.handle(event, self),
            None => debug!("{}: no handler for {:?}", self.user, event.kind()),
        }
    }
}
