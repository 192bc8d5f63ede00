// Cobbler - Temperature and humidity telemetry relay
//
// Copyright 2026 Cobbler Authors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.
//

use crate::config::StreamConfig;
use crate::publish::{Delivery, Receipt, StreamClient, StreamError, StreamErrorKind};
use async_trait::async_trait;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Outgoing, Packet, QoS};
use std::time::Duration;

const MQTT_KEEP_ALIVE: Duration = Duration::from_secs(30);
const MQTT_REQUEST_CAPACITY: usize = 10;

/// `StreamClient` for an MQTT broker. Messages are sent with QoS 1 and count as
/// delivered once the matching `PUBACK` arrives.
///
/// The connection is driven only from within `send` and `close` so nothing happens
/// on the network between readings besides reconnecting on the next send. A send
/// that fails or is abandoned before its acknowledgement leaves requests behind in
/// the client, so the next send starts over with a new client and connection. That
/// way an acknowledgement is only ever matched to the message just sent.
pub struct MqttStreamClient {
    options: MqttOptions,
    client: AsyncClient,
    events: EventLoop,
    unsettled: bool,
}

impl MqttStreamClient {
    pub fn new(config: &StreamConfig) -> Self {
        let mut options = MqttOptions::new(config.client_id.clone(), config.host.clone(), config.port);
        options.set_keep_alive(MQTT_KEEP_ALIVE);

        let (client, events) = AsyncClient::new(options.clone(), MQTT_REQUEST_CAPACITY);
        Self {
            options,
            client,
            events,
            unsettled: false,
        }
    }

    /// Replace the client and event loop, discarding anything still queued.
    fn reset(&mut self) {
        let (host, port) = self.options.broker_address();
        tracing::debug!(message = "discarding unacknowledged mqtt requests", host = %host, port = port);
        let (client, events) = AsyncClient::new(self.options.clone(), MQTT_REQUEST_CAPACITY);
        self.client = client;
        self.events = events;
        self.unsettled = false;
    }
}

#[async_trait]
impl StreamClient for MqttStreamClient {
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<Delivery, StreamError> {
        if self.unsettled {
            self.reset();
        }

        // Cleared only once this message is acknowledged
        self.unsettled = true;

        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| StreamError::KindMsgCause(StreamErrorKind::Send, "unable to queue message", Box::new(e)))?;

        let mut packet_id = None;
        loop {
            let event = self.events.poll().await.map_err(|e| {
                StreamError::KindMsgCause(StreamErrorKind::Connect, "broker connection failed", Box::new(e))
            })?;

            match event {
                Event::Outgoing(Outgoing::Publish(pkid)) => {
                    packet_id = Some(pkid);
                }
                Event::Incoming(Packet::PubAck(ack)) if Some(ack.pkid) == packet_id => {
                    self.unsettled = false;
                    return Ok(Delivery {
                        topic: topic.to_owned(),
                        receipt: Receipt::PacketId(ack.pkid),
                    });
                }
                other => {
                    tracing::trace!(message = "mqtt event", event = ?other);
                }
            }
        }
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        // Never let a message abandoned earlier go out on the way to disconnecting
        if self.unsettled {
            self.reset();
        }

        self.client
            .disconnect()
            .await
            .map_err(|e| StreamError::KindMsgCause(StreamErrorKind::Close, "unable to queue disconnect", Box::new(e)))?;

        loop {
            match self.events.poll().await {
                Ok(Event::Outgoing(Outgoing::Disconnect)) => return Ok(()),
                Ok(_) => {}
                Err(e) => {
                    return Err(StreamError::KindMsgCause(
                        StreamErrorKind::Close,
                        "broker connection failed during disconnect",
                        Box::new(e),
                    ))
                }
            }
        }
    }
}
