//! Renet glue around a [`Session`].

use std::time::{Duration, Instant};

use renet::{ConnectionConfig, RenetServer, ServerEvent};
use tracing::{info, warn};

use crate::channels::{channel_id, create_channel_configs};
use crate::protocol::serialize_server_message;
use crate::session::{Outbound, Recipient, Session};
use crate::transport::ServerRunner;

pub struct Server {
    renet: RenetServer,
    session: Session,
}

impl Server {
    pub fn new(session: Session) -> Self {
        let connection_config = ConnectionConfig {
            available_bytes_per_tick: 60_000,
            server_channels_config: create_channel_configs(),
            client_channels_config: create_channel_configs(),
        };

        Self {
            renet: RenetServer::new(connection_config),
            session,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// One loop iteration: pull packets, handle connection events and
    /// inbound traffic, step the simulation once and flush the results.
    pub fn update(&mut self, transport: &mut ServerRunner, delta: Duration) {
        self.renet.update(delta);
        transport.receive(&mut self.renet, delta);

        while let Some(event) = self.renet.get_event() {
            self.handle_server_event(event);
        }

        let now = Instant::now();
        for client_id in self.renet.clients_id() {
            for channel in [channel_id::COMMANDS, channel_id::TRANSFORMS] {
                while let Some(data) = self.renet.receive_message(client_id, channel) {
                    let replies = self.session.handle_message(client_id, &data, now);
                    self.deliver(replies);
                }
            }
        }

        let produced = self.session.tick();
        self.deliver(produced);

        transport.send(&mut self.renet);
    }

    fn handle_server_event(&mut self, event: ServerEvent) {
        match event {
            ServerEvent::ClientConnected { client_id } => {
                info!("Client {:?} connected", client_id);
            }
            ServerEvent::ClientDisconnected { client_id, reason } => {
                info!("Client {:?} disconnected: {:?}", client_id, reason);
                self.session.disconnect(client_id);
            }
        }
    }

    fn deliver(&mut self, outbound: Vec<Outbound>) {
        for Outbound { to, message } in outbound {
            let data = match serialize_server_message(&message) {
                Ok(data) => data,
                Err(e) => {
                    warn!("Failed to encode {:?}: {}", message, e);
                    continue;
                }
            };
            let channel = message.channel();
            match to {
                Recipient::Client(client_id) => self.renet.send_message(client_id, channel, data),
                Recipient::All => {
                    for client_id in self.session.players().client_ids() {
                        self.renet.send_message(client_id, channel, data.clone());
                    }
                }
            }
        }
    }
}
