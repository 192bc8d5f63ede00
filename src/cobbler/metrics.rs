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

use crate::reading::Reading;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::registry::Registry;
use std::sync::atomic::AtomicU64;

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct ReadLabels {
    source: String,
    outcome: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct PublishLabels {
    outcome: String,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
struct SourceLabels {
    source: String,
}

/// Prometheus metrics describing the polling loop: how many cycles ran, how many
/// reads produced a reading, how many readings were forwarded, and the most recent
/// temperature and humidity per source.
#[derive(Clone)]
pub struct RelayMetrics {
    cycles: Counter,
    reads: Family<ReadLabels, Counter>,
    publishes: Family<PublishLabels, Counter>,
    temperature: Family<SourceLabels, Gauge<f64, AtomicU64>>,
    humidity: Family<SourceLabels, Gauge<f64, AtomicU64>>,
}

impl RelayMetrics {
    pub fn new(reg: &mut Registry) -> Self {
        let cycles = Counter::default();
        let reads = Family::<ReadLabels, Counter>::default();
        let publishes = Family::<PublishLabels, Counter>::default();
        let temperature = Family::<SourceLabels, Gauge<f64, AtomicU64>>::default();
        let humidity = Family::<SourceLabels, Gauge<f64, AtomicU64>>::default();

        reg.register("cobbler_cycles", "Number of polling cycles started", cycles.clone());
        reg.register("cobbler_reads", "Number of attempted reads by source and outcome", reads.clone());
        reg.register("cobbler_publishes", "Number of forwarded readings by outcome", publishes.clone());
        reg.register(
            "cobbler_temperature_degrees",
            "Temperature in celsius of the last reading by source",
            temperature.clone(),
        );
        reg.register(
            "cobbler_relative_humidity",
            "Relative humidity (0-100) of the last reading by source",
            humidity.clone(),
        );

        Self {
            cycles,
            reads,
            publishes,
            temperature,
            humidity,
        }
    }

    pub fn cycle(&self) {
        self.cycles.inc();
    }

    pub fn observe(&self, source: &str, reading: Option<&Reading>) {
        let outcome = if reading.is_some() { "ok" } else { "absent" };
        self.reads
            .get_or_create(&ReadLabels {
                source: source.to_owned(),
                outcome: outcome.to_owned(),
            })
            .inc();

        if let Some(r) = reading {
            let labels = SourceLabels {
                source: source.to_owned(),
            };
            self.temperature.get_or_create(&labels).set(r.temperature_celsius());
            self.humidity.get_or_create(&labels).set(r.humidity());
        }
    }

    pub fn published(&self, ok: bool) {
        let outcome = if ok { "ok" } else { "failed" };
        self.publishes
            .get_or_create(&PublishLabels {
                outcome: outcome.to_owned(),
            })
            .inc();
    }
}

#[cfg(test)]
mod test {
    use super::RelayMetrics;
    use crate::reading::{Humidity, Origin, Reading, Source};
    use chrono::Local;
    use prometheus_client::encoding::text::encode;
    use prometheus_client::registry::Registry;

    #[test]
    fn test_metrics_update() {
        let mut registry = Registry::default();
        let metrics = RelayMetrics::new(&mut registry);
        let origin = Origin::new("raspberry_pi_dht22", "bird_cage_window_area", Source::Dht22);
        let reading = Reading::from_celsius(&origin, Local::now(), 21.0.into(), Humidity::from(50.0)).unwrap();

        metrics.cycle();
        metrics.observe("DHT22", Some(&reading));
        metrics.observe("Ecobee", None);
        metrics.published(true);

        let mut out = String::new();
        encode(&mut out, &registry).unwrap();

        assert!(out.contains("cobbler_cycles_total 1"), "{}", out);
        assert!(out.contains(r#"cobbler_reads_total{source="DHT22",outcome="ok"} 1"#), "{}", out);
        assert!(out.contains(r#"cobbler_reads_total{source="Ecobee",outcome="absent"} 1"#), "{}", out);
        assert!(out.contains(r#"cobbler_publishes_total{outcome="ok"} 1"#), "{}", out);
        assert!(out.contains(r#"cobbler_temperature_degrees{source="DHT22"} 21.0"#), "{}", out);
        assert!(out.contains(r#"cobbler_relative_humidity{source="DHT22"} 50.0"#), "{}", out);
    }
}
