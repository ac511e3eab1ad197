//! Public connect port
//!
//! Clients first greet the connect port. A valid `Hello` logs the user in,
//! binds a private transport for it on an ephemeral port and starts a
//! session task there; the reply tells the client which port to talk to from
//! now on. The connect port also answers pings so clients can measure
//! latency before connecting.

use crate::actions::HandlerTables;
use crate::model::{EventListener, RelayServer};
use crate::session::ClientSession;
use crate::transport::PrivateTransport;
use log::{debug, error, info, warn};
use protocol::{Codec, ConnectMessage, MAX_DATAGRAM_SIZE, PROTOCOL_VERSION};
use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::net::UdpSocket;

pub struct ConnectController {
    socket: UdpSocket,
    server: Arc<RelayServer>,
    tables: Arc<HandlerTables>,
    codec: Arc<dyn Codec>,
}

impl ConnectController {
    /// Binds the connect port from the server's configuration
    pub async fn bind(
        server: Arc<RelayServer>,
        tables: Arc<HandlerTables>,
        codec: Arc<dyn Codec>,
    ) -> io::Result<Self> {
        let addr = format!("{}:{}", server.config().host, server.config().connect_port);
        let socket = UdpSocket::bind(&addr).await?;
        info!("Connect controller listening on {}", socket.local_addr()?);

        Ok(Self {
            socket,
            server,
            tables,
            codec,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Serves handshakes until the socket fails
    ///
    /// Also starts the idle reaper, which lives until the server is dropped.
    pub async fn run(&self) -> io::Result<()> {
        let mut buffer = vec![0u8; MAX_DATAGRAM_SIZE];
        let _reaper = self.server.spawn_idle_reaper();

        loop {
            let (len, from) = match self.socket.recv_from(&mut buffer).await {
                Ok(received) => received,
                Err(e) => {
                    error!("Error receiving handshake packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    continue;
                }
            };

            let request = match ConnectMessage::decode(&buffer[..len]) {
                Ok(request) => request,
                Err(e) => {
                    warn!("Failed to deserialize handshake from {}: {}", from, e);
                    continue;
                }
            };

            let Some(reply) = self.handle(request, from).await else {
                continue;
            };
            match reply.encode() {
                Ok(bytes) => {
                    if let Err(e) = self.socket.send_to(&bytes, from).await {
                        error!("Failed to send handshake reply to {}: {}", from, e);
                    }
                }
                Err(e) => error!("Failed to encode handshake reply: {}", e),
            }
        }
    }

    /// Computes the reply to one handshake message
    pub async fn handle(&self, request: ConnectMessage, from: SocketAddr) -> Option<ConnectMessage> {
        match request {
            ConnectMessage::Ping => Some(ConnectMessage::Pong),
            ConnectMessage::Hello { protocol, username } => {
                if protocol != PROTOCOL_VERSION {
                    warn!(
                        "Rejecting {} from {}: unsupported protocol {}",
                        username, from, protocol
                    );
                    return Some(ConnectMessage::Rejected {
                        reason: format!(
                            "unsupported protocol {}, expected {}",
                            protocol, PROTOCOL_VERSION
                        ),
                    });
                }

                match self.open_session(&username, from).await {
                    Ok(port) => Some(ConnectMessage::HelloD00d { port }),
                    Err(reason) => {
                        warn!("Rejecting {} from {}: {}", username, from, reason);
                        Some(ConnectMessage::Rejected { reason })
                    }
                }
            }
            other => {
                debug!("Ignoring unexpected handshake message from {}: {:?}", from, other);
                None
            }
        }
    }

    async fn open_session(&self, username: &str, from: SocketAddr) -> Result<u16, String> {
        let user = self.server.login(username).map_err(|e| e.to_string())?;
        let user_id = user.id();

        let bind_addr = format!("{}:0", self.server.config().host);
        let transport = match PrivateTransport::bind(&bind_addr, Some(from.ip())).await {
            Ok(transport) => transport,
            Err(e) => {
                error!("Failed to bind private port for {}: {}", user, e);
                if let Err(e) = user.quit("No port available") {
                    debug!("{}: quit after bind failure: {}", user, e);
                }
                return Err("no port available".to_string());
            }
        };
        let port = match transport.local_addr() {
            Ok(addr) => addr.port(),
            Err(e) => {
                error!("Private port for {} has no local address: {}", user, e);
                if let Err(e) = user.quit("No port available") {
                    debug!("{}: quit after address failure: {}", user, e);
                }
                return Err(e.to_string());
            }
        };

        let session = ClientSession::new(
            transport,
            Arc::clone(&self.codec),
            user,
            Arc::clone(&self.tables),
            self.server.config(),
        );
        let listener: Weak<dyn EventListener> = Arc::downgrade(&session) as Weak<dyn EventListener>;
        self.server.register_listener(user_id, listener);
        tokio::spawn(session.run());

        info!("User{} ({}) connected from {} on port {}", user_id, username, from, port);
        Ok(port)
    }
}
