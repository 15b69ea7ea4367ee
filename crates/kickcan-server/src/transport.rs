//! UDP netcode transport feeding the renet server.

use std::io;
use std::net::{SocketAddr, UdpSocket};
use std::time::{Duration, SystemTime, SystemTimeError, UNIX_EPOCH};

use renet::RenetServer;
use renet_netcode::{NetcodeServerTransport, ServerAuthentication, ServerConfig as NetcodeConfig};
use tracing::{error, info};

use crate::config::{ServerConfig, ServerConfigError};

/// Clients must present the same id ("KICKCAN1").
pub const PROTOCOL_ID: u64 = 0x4B49_434B_4341_4E31;

pub struct TransportConfig {
    pub public_address: SocketAddr,
    /// Players plus spectators
    pub max_clients: usize,
    /// Secure netcode authentication when present; connect tokens then come
    /// from a separate service.
    pub private_key: Option<[u8; 32]>,
}

impl TryFrom<&ServerConfig> for TransportConfig {
    type Error = ServerConfigError;

    fn try_from(config: &ServerConfig) -> Result<Self, Self::Error> {
        Ok(Self {
            public_address: config.bind_address,
            max_clients: config.max_clients(),
            private_key: config.private_key_bytes()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Cannot bind {0}: {1}")]
    Bind(SocketAddr, io::Error),

    #[error("Cannot prepare socket on {0}: {1}")]
    Socket(SocketAddr, io::Error),

    #[error("System clock is before the unix epoch: {0}")]
    Clock(#[from] SystemTimeError),

    #[error("Netcode rejected the server setup: {0}")]
    Netcode(String),
}

/// Binds a non-blocking socket and reports the address actually bound, which
/// differs from the requested one when port 0 was asked for.
fn bind_socket(requested: SocketAddr) -> Result<(UdpSocket, SocketAddr), TransportError> {
    let socket = UdpSocket::bind(requested).map_err(|e| TransportError::Bind(requested, e))?;
    let bound = socket
        .local_addr()
        .map_err(|e| TransportError::Socket(requested, e))?;
    socket
        .set_nonblocking(true)
        .map_err(|e| TransportError::Socket(bound, e))?;
    Ok((socket, bound))
}

pub fn create_server_transport(
    config: TransportConfig,
) -> Result<NetcodeServerTransport, TransportError> {
    let (socket, bound) = bind_socket(config.public_address)?;

    let authentication = config
        .private_key
        .map_or(ServerAuthentication::Unsecure, |private_key| {
            ServerAuthentication::Secure { private_key }
        });
    let secure = matches!(authentication, ServerAuthentication::Secure { .. });

    let netcode = NetcodeConfig {
        current_time: SystemTime::now().duration_since(UNIX_EPOCH)?,
        max_clients: config.max_clients,
        protocol_id: PROTOCOL_ID,
        public_addresses: vec![bound],
        authentication,
    };
    let transport = NetcodeServerTransport::new(netcode, socket)
        .map_err(|e| TransportError::Netcode(e.to_string()))?;

    info!(
        "UDP transport on {} ({} slots, secure: {}, protocol {:016x})",
        bound, config.max_clients, secure, PROTOCOL_ID
    );
    Ok(transport)
}

/// Owns the netcode transport and pumps packets in and out of renet.
pub struct ServerRunner {
    transport: NetcodeServerTransport,
}

impl ServerRunner {
    pub fn new(config: TransportConfig) -> Result<Self, TransportError> {
        Ok(Self {
            transport: create_server_transport(config)?,
        })
    }

    /// Receives pending packets into `renet_server`.
    pub fn receive(&mut self, renet_server: &mut RenetServer, delta: Duration) {
        if let Err(e) = self.transport.update(delta, renet_server) {
            error!("Dropped inbound packets: {}", e);
        }
    }

    /// Flushes everything renet queued this tick.
    pub fn send(&mut self, renet_server: &mut RenetServer) {
        self.transport.send_packets(renet_server);
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.transport.addresses().first().copied()
    }
}
