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

//! Relay temperature and humidity readings from a DHT22 sensor and a smart thermostat
//! to a message stream.
//!
//! ## Features
//!
//! Cobbler polls two sources in a fixed order, every 15 seconds by default:
//!
//! * A [DHT22 sensor](https://learn.adafruit.com/dht) connected to a GPIO pin of the
//!   local machine, usually a Raspberry PI.
//! * A smart thermostat exposed by a [Home Assistant](https://www.home-assistant.io/) hub,
//!   read through three entities of its REST API (temperature, humidity, and climate).
//!
//! Both are normalized into the same flat JSON record and published to a Kafka topic
//! (or an MQTT topic), or printed to standard output. For example:
//!
//! ```text
//! {
//!   "timestamp": "2026-01-30T08:12:44.017+01:00",
//!   "sensor_id": "ecobee_thermostat",
//!   "location": "whole_house",
//!   "temperature_celsius": 22.5,
//!   "temperature_fahrenheit": 72.5,
//!   "humidity": 40.0,
//!   "source": "Ecobee",
//!   "device": "smart_thermostat",
//!   "hvac_mode": "heat",
//!   "hvac_action": "heating",
//!   "target_temperature": 70
//! }
//! ```
//!
//! DHT22 readings have the same shape without the `hvac_*` and `target_temperature`
//! fields. A source that can't produce every field produces no reading at all for
//! that cycle.
//!
//! ## Configuration
//!
//! All options can be given as flags. The hub and broker settings can also be given
//! through the environment:
//!
//! * `HOME_ASSISTANT_URL` - Base URL of the hub, e.g. `http://10.20.27.40:8123`.
//! * `HOME_ASSISTANT_TOKEN` - Long-lived access token of the hub. Required, cobbler
//!   refuses to start without one.
//! * `STREAM_PROTOCOL` - `kafka` (the default) or `mqtt`.
//! * `STREAM_BROKER` - Broker as `host[:port]`, `localhost:9092` by default for Kafka
//!   and `localhost:1883` for MQTT.
//! * `STREAM_TOPIC` - Topic readings are published to, `temperature-readings` by default.
//! * `STREAM_PARTITION` - Kafka partition readings are produced to, `0` by default.
//! * `DHT22_PIN` - BCM GPIO pin the data line of the DHT22 is connected to, `4` by default.
//!
//! When no sensor is wired up, run with `--simulate-sensor` to generate random readings
//! instead. These are published with a `source` of `simulated`.
//!
//! ## Build
//!
//! Since cobbler is meant to run on a Raspberry PI, you'll likely want to cross-compile
//! it. Install a toolchain for ARMv7 and build a static binary.
//!
//! ```text
//! apt-get install gcc-arm-linux-gnueabihf musl-tools
//! rustup target add armv7-unknown-linux-musleabihf
//! cargo build --release --target armv7-unknown-linux-musleabihf
//! ```
//!
//! ## Run
//!
//! In order to read and write the device `/dev/gpiomem`, cobbler must run as `root` or
//! as a member of the `gpio` group.
//!
//! ```text
//! export HOME_ASSISTANT_URL=http://10.20.27.40:8123
//! export HOME_ASSISTANT_TOKEN=...
//! cobbler --bcm-pin 4 --broker localhost:9092
//! ```
//!
//! Use `--once --print-only` to print a single reading from each source and exit.
//!
//! ### Prometheus
//!
//! Pass `--metrics-bind 0.0.0.0:9782` to expose metrics about the polling loop at
//! `/metrics`:
//!
//! * `cobbler_cycles_total` - Number of polling cycles started.
//! * `cobbler_reads_total` - Attempted reads by source and outcome (`ok` or `absent`).
//! * `cobbler_publishes_total` - Forwarded readings by outcome (`ok` or `failed`).
//! * `cobbler_temperature_degrees` - Degrees celsius of the last reading by source.
//! * `cobbler_relative_humidity` - Relative humidity of the last reading by source.
//!

pub mod config;
pub mod http;
pub mod hub;
pub mod metrics;
pub mod poll;
pub mod publish;
pub mod reading;
pub mod sensor;
