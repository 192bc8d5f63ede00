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

use crate::metrics::RelayMetrics;
use crate::publish::ReadingSink;
use crate::reading::Reading;
use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;
use tokio::time;
use tracing::Instrument;

pub const DEFAULT_SENSOR_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_CYCLE_DELAY: Duration = Duration::from_secs(13);

/// Something that produces at most one reading each time it is asked.
#[async_trait]
pub trait ReadingSource: Send + Sync {
    /// Short label identifying the source in logs and metrics.
    fn name(&self) -> &'static str;

    /// Produce a reading, or `None` if one couldn't be produced this time. Never fails.
    async fn read(&self) -> Option<Reading>;
}

/// Fixed delays of the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schedule {
    /// Between the physical sensor read and the thermostat read.
    pub sensor_delay: Duration,
    /// After the thermostat read, before the next cycle.
    pub cycle_delay: Duration,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            sensor_delay: DEFAULT_SENSOR_DELAY,
            cycle_delay: DEFAULT_CYCLE_DELAY,
        }
    }
}

/// Read the physical sensor and the thermostat in turn, forever, forwarding every
/// reading to a sink.
///
/// Everything happens sequentially on the calling task. A source failing to produce
/// a reading, or the sink failing to forward one, never interrupts the loop.
pub struct PollingOrchestrator {
    physical: Box<dyn ReadingSource>,
    thermostat: Box<dyn ReadingSource>,
    sink: Box<dyn ReadingSink>,
    schedule: Schedule,
    metrics: RelayMetrics,
    cycle: u64,
}

impl PollingOrchestrator {
    pub fn new(
        physical: Box<dyn ReadingSource>,
        thermostat: Box<dyn ReadingSource>,
        sink: Box<dyn ReadingSink>,
        schedule: Schedule,
        metrics: RelayMetrics,
    ) -> Self {
        Self {
            physical,
            thermostat,
            sink,
            schedule,
            metrics,
            cycle: 0,
        }
    }

    /// Number of cycles started so far.
    pub fn cycles(&self) -> u64 {
        self.cycle
    }

    /// Read both sources once, pausing `sensor_delay` in between.
    pub async fn run_cycle(&mut self) {
        self.cycle += 1;
        self.metrics.cycle();

        let span = tracing::info_span!("cycle", cycle = self.cycle);
        async {
            tracing::info!(message = "starting polling cycle", time = %chrono::Local::now().format("%Y-%m-%d %H:%M:%S"));
            forward(&*self.physical, &mut *self.sink, &self.metrics).await;
            time::sleep(self.schedule.sensor_delay).await;
            forward(&*self.thermostat, &mut *self.sink, &self.metrics).await;
        }
        .instrument(span)
        .await
    }

    /// Run cycles until `shutdown` completes, then close the sink.
    pub async fn run<F>(mut self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => break,
                _ = self.cycle_then_wait() => {}
            }
        }

        tracing::info!(message = "stopping polling loop", cycles = self.cycle);
        self.sink.close().await;
    }

    /// Run a single cycle without the trailing delay, then close the sink.
    pub async fn run_once(mut self) {
        self.run_cycle().await;
        self.sink.close().await;
    }

    async fn cycle_then_wait(&mut self) {
        self.run_cycle().await;
        tracing::debug!(message = "waiting for next cycle", delay_secs = self.schedule.cycle_delay.as_secs());
        time::sleep(self.schedule.cycle_delay).await;
    }
}

async fn forward(source: &dyn ReadingSource, sink: &mut dyn ReadingSink, metrics: &RelayMetrics) {
    let reading = source.read().await;
    metrics.observe(source.name(), reading.as_ref());

    match reading {
        Some(r) => {
            tracing::info!(
                message = "read temperature",
                source = source.name(),
                temperature_f = r.temperature_fahrenheit(),
                humidity = r.humidity(),
                hvac_action = r.hvac().map(|h| h.hvac_action.as_str()).unwrap_or("n/a"),
            );
            metrics.published(sink.publish(&r).await);
        }
        None => {
            tracing::info!(message = "read failed", source = source.name());
        }
    }
}
