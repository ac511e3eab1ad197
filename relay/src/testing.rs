//! Helpers for unit tests that need real sessions on loopback sockets

use crate::actions::HandlerTables;
use crate::config::RelayConfig;
use crate::error::FatalActionError;
use crate::model::{EventListener, RelayServer};
use crate::session::ClientSession;
use crate::transport::PrivateTransport;
use parking_lot::Mutex;
use protocol::{BincodeCodec, Bundle, Codec, Message, MessageBody, MessageNumber};
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::timeout;

pub(crate) struct Harness {
    pub server: Arc<RelayServer>,
    pub tables: Arc<HandlerTables>,
    pub config: RelayConfig,
}

impl Harness {
    pub fn new(config: RelayConfig) -> Self {
        Self {
            server: RelayServer::new(config.clone()),
            tables: Arc::new(HandlerTables::standard()),
            config,
        }
    }

    /// A logged-in session whose transport has not learned a peer yet
    pub async fn unconnected_session(&self, name: &str) -> Arc<ClientSession> {
        let user = self.server.login(name).unwrap();
        let user_id = user.id();
        let transport = PrivateTransport::bind("127.0.0.1:0", None).await.unwrap();
        let session = ClientSession::new(
            transport,
            Arc::new(BincodeCodec),
            user,
            Arc::clone(&self.tables),
            &self.config,
        );
        let listener: Weak<dyn EventListener> =
            Arc::downgrade(&session) as Weak<dyn EventListener>;
        self.server.register_listener(user_id, listener);
        session
    }

    /// A logged-in session paired with a loopback peer socket
    pub async fn connect(&self, name: &str) -> TestClient {
        let session = self.unconnected_session(name).await;
        let peer = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        assert!(session.transport_accepts(peer.local_addr().unwrap()));
        peer.connect(session.local_addr().unwrap()).await.unwrap();
        TestClient {
            session,
            peer,
            next_number: AtomicU16::new(0),
            last_seen: Mutex::new(None),
        }
    }

    /// Connects every name; the first creates a game the others join
    ///
    /// All sockets are drained before returning.
    pub async fn game_of(&self, names: &[&str]) -> (u32, Vec<TestClient>) {
        let mut clients = Vec::new();
        for name in names {
            clients.push(self.connect(name).await);
        }

        clients[0]
            .request(MessageBody::CreateGameRequest {
                rom_name: "Street Fighter II".to_string(),
            })
            .unwrap();
        let game_id = self.server.user_game(clients[0].user_id()).unwrap();
        for client in &clients[1..] {
            client
                .request(MessageBody::JoinGameRequest { game_id })
                .unwrap();
        }

        for client in &clients {
            client.drain().await;
        }
        (game_id, clients)
    }

    /// Readies every client and drains the resulting notifications
    pub async fn start(&self, clients: &[TestClient]) {
        for client in clients {
            client.request(MessageBody::UserReadyRequest).unwrap();
        }
        for client in clients {
            client.drain().await;
        }
    }
}

pub(crate) struct TestClient {
    pub session: Arc<ClientSession>,
    pub peer: UdpSocket,
    next_number: AtomicU16,
    /// Newest number `drain` has returned
    last_seen: Mutex<Option<MessageNumber>>,
}

impl TestClient {
    pub fn user_id(&self) -> u16 {
        self.session.user().id()
    }

    fn next_message(&self, body: MessageBody) -> Message {
        let number = self.next_number.fetch_add(1, Ordering::SeqCst);
        Message::new(MessageNumber(number), body)
    }

    /// Feeds a request straight into the session, bypassing the socket
    pub fn request(&self, body: MessageBody) -> Result<(), FatalActionError> {
        let bytes = BincodeCodec
            .encode(&Bundle::single(self.next_message(body)))
            .unwrap();
        self.session.handle_datagram(&bytes)
    }

    /// Sends a request through the peer socket
    pub async fn send_raw(&self, body: MessageBody) {
        let bytes = BincodeCodec
            .encode(&Bundle::single(self.next_message(body)))
            .unwrap();
        self.peer.send(&bytes).await.unwrap();
    }

    pub async fn recv_bundle(&self) -> Bundle {
        let mut buf = vec![0u8; protocol::MAX_DATAGRAM_SIZE];
        let len = timeout(Duration::from_secs(1), self.peer.recv(&mut buf))
            .await
            .expect("timed out waiting for a datagram")
            .unwrap();
        BincodeCodec.decode(&buf[..len]).unwrap()
    }

    /// Every datagram's messages until the socket goes quiet, repeats included
    pub async fn drain_raw(&self) -> Vec<Message> {
        let mut messages = Vec::new();
        let mut buf = vec![0u8; protocol::MAX_DATAGRAM_SIZE];
        while let Ok(result) = timeout(Duration::from_millis(100), self.peer.recv(&mut buf)).await
        {
            let len = result.unwrap();
            messages.extend(BincodeCodec.decode(&buf[..len]).unwrap().into_messages());
        }
        messages
    }

    /// New messages received until the socket goes quiet
    ///
    /// Every datagram repeats a few older messages; those are skipped the
    /// way a client skips them.
    pub async fn drain(&self) -> Vec<Message> {
        let received = self.drain_raw().await;
        let mut last_seen = self.last_seen.lock();
        let mut fresh = Vec::new();
        for message in received {
            if last_seen.map_or(true, |last| message.number().is_newer_than(last)) {
                *last_seen = Some(message.number());
                fresh.push(message);
            }
        }
        fresh
    }

    pub async fn bodies(&self) -> Vec<MessageBody> {
        self.drain()
            .await
            .into_iter()
            .map(|m| m.body().clone())
            .collect()
    }

    pub async fn expect_silence(&self) {
        let received = self.drain_raw().await;
        assert!(received.is_empty(), "unexpected messages: {:?}", received);
    }
}
