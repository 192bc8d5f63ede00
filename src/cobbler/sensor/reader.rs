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

use crate::poll::ReadingSource;
use crate::reading::{Origin, Reading};
use crate::sensor::core::{Connector, Sample};
use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;
use tokio::task;
use tracing::{Instrument, Level};

/// Produce normalized readings from a GPIO attached temperature and humidity sensor.
///
/// Each read opens the sensor, takes one sample, and closes it again on the blocking
/// thread pool. Failures of any kind are logged and result in no reading.
pub struct PhysicalSensorReader {
    connector: Arc<dyn Connector>,
    origin: Origin,
}

impl PhysicalSensorReader {
    pub fn new<C>(connector: C, origin: Origin) -> Self
    where
        C: Connector + 'static,
    {
        Self {
            connector: Arc::new(connector),
            origin,
        }
    }

    pub async fn read(&self) -> Option<Reading> {
        let connector = Arc::clone(&self.connector);

        // The driver is dropped, releasing the pin, before this closure returns or unwinds.
        let res = task::spawn_blocking(move || {
            let mut driver = connector.connect()?;
            driver.sample()
        })
        .instrument(tracing::span!(Level::DEBUG, "sensor_read"))
        .await;

        match res {
            Ok(Ok(sample)) => self.normalize(sample),
            Ok(Err(e)) if e.kind().is_transient() => {
                tracing::warn!(
                    message = "skipping sensor reading after transient fault",
                    sensor_id = %self.origin.sensor_id,
                    kind = e.kind().as_label(),
                    error = %e,
                );
                None
            }
            Ok(Err(e)) => {
                tracing::error!(
                    message = "unable to read sensor",
                    sensor_id = %self.origin.sensor_id,
                    kind = e.kind().as_label(),
                    error = %e,
                );
                None
            }
            Err(e) => {
                tracing::error!(
                    message = "unexpected failure reading sensor",
                    sensor_id = %self.origin.sensor_id,
                    error = %e,
                );
                None
            }
        }
    }

    fn normalize(&self, sample: Sample) -> Option<Reading> {
        match (sample.temperature, sample.humidity) {
            (Some(temperature), Some(humidity)) => {
                match Reading::from_celsius(&self.origin, Local::now(), temperature, humidity) {
                    Ok(reading) => Some(reading),
                    Err(e) => {
                        tracing::warn!(
                            message = "skipping unusable sensor sample",
                            sensor_id = %self.origin.sensor_id,
                            error = %e,
                        );
                        None
                    }
                }
            }
            _ => {
                tracing::warn!(
                    message = "skipping incomplete sensor sample",
                    sensor_id = %self.origin.sensor_id,
                    temperature = ?sample.temperature,
                    humidity = ?sample.humidity,
                );
                None
            }
        }
    }
}

#[async_trait]
impl ReadingSource for PhysicalSensorReader {
    fn name(&self) -> &'static str {
        self.origin.source.as_label()
    }

    async fn read(&self) -> Option<Reading> {
        PhysicalSensorReader::read(self).await
    }
}
