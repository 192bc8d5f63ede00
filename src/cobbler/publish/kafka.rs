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
use chrono::Utc;
use rskafka::client::partition::{Compression, PartitionClient, UnknownTopicHandling};
use rskafka::client::ClientBuilder;
use rskafka::record::Record;
use std::collections::BTreeMap;
use std::sync::Arc;

/// `StreamClient` for a Kafka cluster. Each reading is produced as a single record
/// to one partition of the topic and counts as delivered once the partition leader
/// returns its offset.
///
/// The connection is made on the first send, and made again on the send after any
/// failure, so a broker that is down at startup or restarts only costs the readings
/// sent while it is unreachable.
pub struct KafkaStreamClient {
    brokers: Vec<String>,
    partition: i32,
    connection: Option<(String, Arc<PartitionClient>)>,
}

impl KafkaStreamClient {
    pub fn new(config: &StreamConfig) -> Self {
        Self {
            brokers: vec![config.address()],
            partition: config.partition,
            connection: None,
        }
    }

    async fn connect(&mut self, topic: &str) -> Result<Arc<PartitionClient>, StreamError> {
        if let Some((connected, client)) = &self.connection {
            if connected == topic {
                return Ok(Arc::clone(client));
            }
        }

        tracing::debug!(message = "connecting to kafka", brokers = ?self.brokers, topic = topic, partition = self.partition);
        let client = ClientBuilder::new(self.brokers.clone())
            .build()
            .await
            .map_err(|e| StreamError::KindMsgCause(StreamErrorKind::Connect, "unable to connect to brokers", Box::new(e)))?;

        let partition = client
            .partition_client(topic.to_owned(), self.partition, UnknownTopicHandling::Retry)
            .await
            .map_err(|e| {
                StreamError::KindMsgCause(StreamErrorKind::Connect, "unable to find partition leader", Box::new(e))
            })?;

        let partition = Arc::new(partition);
        self.connection = Some((topic.to_owned(), Arc::clone(&partition)));
        Ok(partition)
    }
}

#[async_trait]
impl StreamClient for KafkaStreamClient {
    async fn send(&mut self, topic: &str, payload: Vec<u8>) -> Result<Delivery, StreamError> {
        let client = self.connect(topic).await?;
        let record = Record {
            key: None,
            value: Some(payload),
            headers: BTreeMap::new(),
            timestamp: Utc::now(),
        };

        let offsets = match client.produce(vec![record], Compression::NoCompression).await {
            Ok(offsets) => offsets,
            Err(e) => {
                self.connection = None;
                return Err(StreamError::KindMsgCause(
                    StreamErrorKind::Send,
                    "unable to produce record",
                    Box::new(e),
                ));
            }
        };

        let offset = offsets
            .first()
            .copied()
            .ok_or(StreamError::KindMsg(StreamErrorKind::Acknowledge, "broker returned no offset"))?;

        Ok(Delivery {
            topic: topic.to_owned(),
            receipt: Receipt::Offset {
                partition: self.partition,
                offset,
            },
        })
    }

    async fn close(&mut self) -> Result<(), StreamError> {
        // Produce requests are acknowledged synchronously, there is nothing to flush
        self.connection = None;
        Ok(())
    }
}
