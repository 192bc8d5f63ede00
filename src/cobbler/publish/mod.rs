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

//! Forward readings to a message stream (Kafka or MQTT) or to standard output.

mod kafka;
mod mqtt;

pub use crate::publish::kafka::KafkaStreamClient;
pub use crate::publish::mqtt::MqttStreamClient;

use crate::reading::Reading;
use async_trait::async_trait;
use std::error::Error;
use std::fmt::{self, Formatter};
use std::io::{self, Write};
use std::time::Duration;
use tokio::time;

/// Bound on waiting for the broker to acknowledge a reading (or a disconnect).
pub const PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// Consumer of readings produced by the polling loop.
#[async_trait]
pub trait ReadingSink: Send {
    /// Forward a reading, returning `false` if it was dropped.
    async fn publish(&mut self, reading: &Reading) -> bool;

    /// Flush and release anything held by the sink. Only the first call has any effect.
    async fn close(&mut self);
}

/// Kinds of errors encountered talking to the message stream
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum StreamErrorKind {
    Connect,
    Send,
    Acknowledge,
    Close,
}

impl StreamErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            StreamErrorKind::Connect => "connect",
            StreamErrorKind::Send => "send",
            StreamErrorKind::Acknowledge => "acknowledge",
            StreamErrorKind::Close => "close",
        }
    }
}

/// Error sending to or disconnecting from the message stream
#[derive(Debug)]
pub enum StreamError {
    KindMsg(StreamErrorKind, &'static str),
    KindMsgCause(StreamErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl StreamError {
    pub fn kind(&self) -> StreamErrorKind {
        match self {
            StreamError::KindMsg(kind, _) => *kind,
            StreamError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::KindMsg(_, msg) => msg.fmt(f),
            StreamError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for StreamError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            StreamError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Where the broker recorded an acknowledged message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receipt {
    /// Partition and offset assigned by a Kafka broker
    Offset { partition: i32, offset: i64 },
    /// Packet identifier acknowledged by an MQTT broker
    PacketId(u16),
}

impl fmt::Display for Receipt {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Receipt::Offset { partition, offset } => write!(f, "partition {} offset {}", partition, offset),
            Receipt::PacketId(pkid) => write!(f, "packet {}", pkid),
        }
    }
}

/// Broker acknowledgement of a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub topic: String,
    pub receipt: Receipt,
}

/// Publish-and-acknowledge access to a message broker.
#[async_trait]
pub trait StreamClient: Send {
    /// Send a payload and wait for the broker to acknowledge it.
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<Delivery, StreamError>;

    /// Flush anything pending and disconnect from the broker.
    async fn close(&mut self) -> Result<(), StreamError>;
}

/// Publish readings as JSON to a topic of a message stream.
///
/// Each publish waits at most `PUBLISH_TIMEOUT` for the broker acknowledgement. There
/// are no retries: a reading that can't be delivered is logged and dropped.
pub struct ReadingPublisher<C> {
    client: C,
    topic: String,
    closed: bool,
}

impl<C> ReadingPublisher<C>
where
    C: StreamClient,
{
    pub fn new<S: Into<String>>(client: C, topic: S) -> Self {
        Self {
            client,
            topic: topic.into(),
            closed: false,
        }
    }
}

#[async_trait]
impl<C> ReadingSink for ReadingPublisher<C>
where
    C: StreamClient,
{
    async fn publish(&mut self, reading: &Reading) -> bool {
        if self.closed {
            tracing::error!(message = "dropping reading, publisher is closed", sensor_id = reading.sensor_id());
            return false;
        }

        let payload = match serde_json::to_vec(reading) {
            Ok(p) => p,
            Err(e) => {
                tracing::error!(message = "unable to encode reading", sensor_id = reading.sensor_id(), error = %e);
                return false;
            }
        };

        match time::timeout(PUBLISH_TIMEOUT, self.client.send(&self.topic, payload)).await {
            Ok(Ok(delivery)) => {
                tracing::info!(
                    message = "reading acknowledged by broker",
                    topic = %delivery.topic,
                    receipt = %delivery.receipt,
                    sensor_id = reading.sensor_id(),
                );
                true
            }
            Ok(Err(e)) => {
                tracing::error!(
                    message = "unable to publish reading",
                    topic = %self.topic,
                    kind = e.kind().as_label(),
                    error = %e,
                );
                false
            }
            Err(_) => {
                tracing::error!(
                    message = "timed out waiting for broker acknowledgement",
                    topic = %self.topic,
                    timeout_secs = PUBLISH_TIMEOUT.as_secs(),
                );
                false
            }
        }
    }

    async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;

        match time::timeout(PUBLISH_TIMEOUT, self.client.close()).await {
            Ok(Ok(())) => tracing::info!(message = "stream connection closed", topic = %self.topic),
            Ok(Err(e)) => tracing::warn!(message = "error closing stream connection", error = %e),
            Err(_) => tracing::warn!(message = "timed out closing stream connection"),
        }
    }
}

/// Write readings as pretty-printed JSON, one after another.
pub struct PrintSink<W> {
    out: W,
}

impl PrintSink<io::Stdout> {
    pub fn stdout() -> Self {
        Self { out: io::stdout() }
    }
}

impl<W> PrintSink<W>
where
    W: Write + Send,
{
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write(&mut self, reading: &Reading) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut self.out, reading)?;
        self.out.write_all(b"\n")?;
        self.out.flush()
    }
}

#[async_trait]
impl<W> ReadingSink for PrintSink<W>
where
    W: Write + Send,
{
    async fn publish(&mut self, reading: &Reading) -> bool {
        match self.write(reading) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(message = "unable to write reading", sensor_id = reading.sensor_id(), error = %e);
                false
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.out.flush() {
            tracing::warn!(message = "unable to flush output", error = %e);
        }
    }
}
