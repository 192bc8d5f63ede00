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

use axum::routing::get;
use axum::Router;
use clap::Parser;
use cobbler::config::{HubConfig, StreamConfig, StreamProtocol, DEFAULT_TOPIC};
use cobbler::http::RequestState;
use cobbler::hub::{HttpHubClient, RemoteThermostatReader, ThermostatEntities};
use cobbler::metrics::RelayMetrics;
use cobbler::poll::{PollingOrchestrator, Schedule};
use cobbler::publish::{KafkaStreamClient, MqttStreamClient, PrintSink, ReadingPublisher, ReadingSink};
use cobbler::reading::{Origin, Source};
use cobbler::sensor::{Dht22Connector, PhysicalSensorReader, SimulatedConnector};
use prometheus_client::registry::Registry;
use std::net::SocketAddr;
use std::process;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal::unix::{self, SignalKind};
use tokio::sync::oneshot;
use tower_http::trace::TraceLayer;
use tracing::Level;

const DEFAULT_LOG_LEVEL: Level = Level::INFO;
const DEFAULT_BCM_PIN: u8 = 4;
const DEFAULT_SENSOR_ID: &str = "raspberry_pi_dht22";
const DEFAULT_LOCATION: &str = "bird_cage_window_area";
const DEFAULT_SENSOR_DELAY_SECS: u64 = 2;
const DEFAULT_CYCLE_DELAY_SECS: u64 = 13;

/// Relay temperature and humidity from a DHT22 sensor and a smart thermostat to a message stream
///
/// Read a DHT22 sensor connected to a data pin of the local machine, usually a
/// Raspberry PI, and a thermostat exposed by a Home Assistant hub, one after the
/// other on a fixed schedule. Each reading is normalized to the same JSON record and
/// published to a Kafka topic (or an MQTT topic), or printed with --print-only.
///
/// The numbering of GPIO pins (and how the pin number is provided to cobbler) is
/// based on the Broadcom SOC channel.
#[derive(Debug, Parser)]
#[command(name = "cobbler", version = clap::crate_version!())]
struct CobblerApplication {
    /// Base URL of the Home Assistant hub, e.g. http://10.20.27.40:8123
    #[arg(long, env = "HOME_ASSISTANT_URL")]
    hub_url: String,

    /// Long-lived access token for the Home Assistant hub
    #[arg(long, env = "HOME_ASSISTANT_TOKEN", hide_env_values = true)]
    hub_token: Option<String>,

    /// Kind of message stream to publish readings to. Allowed values are 'kafka' and
    /// 'mqtt' (case insensitive)
    #[arg(long, env = "STREAM_PROTOCOL", default_value = "kafka")]
    stream_protocol: StreamProtocol,

    /// Broker to publish readings to, as host[:port]. Defaults to localhost:9092 for
    /// Kafka and localhost:1883 for MQTT
    #[arg(long, env = "STREAM_BROKER")]
    broker: Option<String>,

    /// Topic to publish readings to
    #[arg(long, env = "STREAM_TOPIC", default_value = DEFAULT_TOPIC)]
    topic: String,

    /// Kafka partition to produce readings to
    #[arg(long, env = "STREAM_PARTITION", default_value_t = 0)]
    partition: i32,

    /// BCM GPIO pin number the DHT22 sensor data line is connected to
    #[arg(long, env = "DHT22_PIN", default_value_t = DEFAULT_BCM_PIN)]
    bcm_pin: u8,

    /// Generate random readings instead of reading a DHT22 sensor. Readings are
    /// labelled with a source of 'simulated'
    #[arg(long, env = "COBBLER_SIMULATE_SENSOR")]
    simulate_sensor: bool,

    /// Identifier of the DHT22 sensor included in its readings
    #[arg(long, default_value = DEFAULT_SENSOR_ID)]
    sensor_id: String,

    /// Location of the DHT22 sensor included in its readings
    #[arg(long, default_value = DEFAULT_LOCATION)]
    location: String,

    /// Hub entity reporting the thermostat temperature
    #[arg(long, default_value = "sensor.my_ecobee_current_temperature")]
    temperature_entity: String,

    /// Hub entity reporting the thermostat humidity
    #[arg(long, default_value = "sensor.my_ecobee_current_humidity")]
    humidity_entity: String,

    /// Hub entity reporting the thermostat HVAC state
    #[arg(long, default_value = "climate.my_ecobee")]
    climate_entity: String,

    /// Wait this long between reading the sensor and reading the thermostat, in seconds
    #[arg(long, default_value_t = DEFAULT_SENSOR_DELAY_SECS)]
    sensor_delay_secs: u64,

    /// Wait this long after reading the thermostat before the next cycle, in seconds
    #[arg(long, default_value_t = DEFAULT_CYCLE_DELAY_SECS)]
    cycle_delay_secs: u64,

    /// Print readings as JSON to standard output instead of publishing them
    #[arg(long)]
    print_only: bool,

    /// Read each source a single time and exit
    #[arg(long)]
    once: bool,

    /// Address to expose Prometheus metrics about the polling loop on. Metrics are
    /// not exposed unless this is set
    #[arg(long)]
    metrics_bind: Option<SocketAddr>,

    /// Logging verbosity. Allowed values are 'trace', 'debug', 'info', 'warn', and 'error'
    /// (case insensitive)
    #[arg(long, default_value_t = DEFAULT_LOG_LEVEL)]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let opts = CobblerApplication::parse();
    tracing::subscriber::set_global_default(
        tracing_subscriber::FmtSubscriber::builder()
            .with_max_level(opts.log_level)
            .finish(),
    )
    .expect("failed to set tracing subscriber");

    // Validate everything before any client exists so bad configuration never
    // results in network traffic.
    let hub_config = HubConfig::new(&opts.hub_url, opts.hub_token.clone()).unwrap_or_else(|e| {
        tracing::error!(message = "invalid hub configuration", error = %e);
        process::exit(1)
    });

    let stream_config = StreamConfig::new(opts.stream_protocol, opts.broker.as_deref(), &opts.topic)
        .and_then(|c| c.with_partition(opts.partition))
        .unwrap_or_else(|e| {
            tracing::error!(message = "invalid stream configuration", error = %e);
            process::exit(1)
        });

    let hub = HttpHubClient::new(hub_config).unwrap_or_else(|e| {
        tracing::error!(message = "failed to initialize hub client", error = %e);
        process::exit(1)
    });

    let entities = ThermostatEntities {
        temperature: opts.temperature_entity.clone(),
        humidity: opts.humidity_entity.clone(),
        climate: opts.climate_entity.clone(),
    };
    let thermostat = RemoteThermostatReader::new(hub, entities);

    let physical = if opts.simulate_sensor {
        tracing::warn!(message = "using simulated sensor readings", sensor_id = %opts.sensor_id);
        let origin = Origin::new(opts.sensor_id.clone(), opts.location.clone(), Source::Simulated);
        PhysicalSensorReader::new(SimulatedConnector, origin)
    } else {
        let origin = Origin::new(opts.sensor_id.clone(), opts.location.clone(), Source::Dht22);
        PhysicalSensorReader::new(Dht22Connector::new(opts.bcm_pin), origin)
    };

    let sink: Box<dyn ReadingSink> = if opts.print_only {
        Box::new(PrintSink::stdout())
    } else {
        tracing::info!(
            message = "publishing readings to stream",
            protocol = stream_config.protocol.as_label(),
            broker = %stream_config.address(),
            topic = %stream_config.topic,
        );
        let topic = stream_config.topic.clone();
        match stream_config.protocol {
            StreamProtocol::Kafka => Box::new(ReadingPublisher::new(KafkaStreamClient::new(&stream_config), topic)),
            StreamProtocol::Mqtt => Box::new(ReadingPublisher::new(MqttStreamClient::new(&stream_config), topic)),
        }
    };

    let mut registry = <Registry>::default();
    let metrics = RelayMetrics::new(&mut registry);
    let schedule = Schedule {
        sensor_delay: Duration::from_secs(opts.sensor_delay_secs),
        cycle_delay: Duration::from_secs(opts.cycle_delay_secs),
    };

    let orchestrator = PollingOrchestrator::new(Box::new(physical), Box::new(thermostat), sink, schedule, metrics);

    let (stop_server, server_stopped) = oneshot::channel::<()>();
    let server = match opts.metrics_bind {
        Some(addr) => Some(serve_metrics(addr, registry, server_stopped).await),
        None => None,
    };

    if opts.once {
        orchestrator.run_once().await;
    } else {
        tracing::info!(message = "starting polling loop", bcm_pin = opts.bcm_pin, hub = %opts.hub_url);
        orchestrator
            .run(async {
                // Wait for either SIGTERM or SIGINT to shutdown
                tokio::select! {
                    _ = sigterm() => {}
                    _ = sigint() => {}
                }
            })
            .await;
    }

    let _ = stop_server.send(());
    if let Some(handle) = server {
        let _ = handle.await;
    }

    tracing::info!("shutdown complete");
    Ok(())
}

/// Start serving metrics on a separate task, exiting the process if the address
/// can't be bound.
async fn serve_metrics(
    addr: SocketAddr,
    registry: Registry,
    stop: oneshot::Receiver<()>,
) -> tokio::task::JoinHandle<()> {
    let state = Arc::new(RequestState { registry });
    let app = Router::new()
        .route("/metrics", get(cobbler::http::text_metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(addr).await.unwrap_or_else(|e| {
        tracing::error!(message = "error starting metrics server", address = %addr, err = %e);
        process::exit(1)
    });

    tracing::info!(message = "serving metrics", address = %addr);
    tokio::spawn(async move {
        let res = axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = stop.await;
            })
            .await;

        if let Err(e) = res {
            tracing::error!(message = "metrics server failed", err = %e);
        }
    })
}

/// Return after the first SIGTERM signal received by this process
async fn sigterm() -> std::io::Result<()> {
    unix::signal(SignalKind::terminate())?.recv().await;
    Ok(())
}

/// Return after the first SIGINT signal received by this process
async fn sigint() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
