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

use reqwest::Url;
use std::error::Error;
use std::fmt::{self, Formatter};
use std::str::FromStr;

/// Environment variable holding the hub access token.
pub const HUB_TOKEN_ENV: &str = "HOME_ASSISTANT_TOKEN";
pub const DEFAULT_TOPIC: &str = "temperature-readings";
const DEFAULT_CLIENT_ID: &str = "cobbler";

/// Invalid or missing configuration. Always fatal at startup.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    MissingCredential,
    InvalidUrl(String),
    InvalidBroker(String),
    InvalidProtocol(String),
    InvalidPartition(i32),
    EmptyTopic,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::MissingCredential => write!(
                f,
                "no hub access token configured: create a long-lived access token in your \
                 Home Assistant profile and set it with `export {}=<token>`",
                HUB_TOKEN_ENV
            ),
            ConfigError::InvalidUrl(url) => write!(f, "invalid hub URL '{}': expected http(s)://host[:port]", url),
            ConfigError::InvalidBroker(addr) => write!(f, "invalid broker address '{}': expected host[:port]", addr),
            ConfigError::InvalidProtocol(p) => write!(f, "unknown stream protocol '{}': expected kafka or mqtt", p),
            ConfigError::InvalidPartition(p) => write!(f, "invalid stream partition {}: must not be negative", p),
            ConfigError::EmptyTopic => write!(f, "stream topic must not be empty"),
        }
    }
}

impl Error for ConfigError {}

/// Location of and credential for the home automation hub.
#[derive(Clone)]
pub struct HubConfig {
    base_url: Url,
    token: String,
}

impl HubConfig {
    /// Validate the hub URL and token. A missing or blank token is an error so that
    /// unauthenticated requests are never made.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, ConfigError> {
        let token = match token {
            Some(t) if !t.trim().is_empty() => t.trim().to_owned(),
            _ => return Err(ConfigError::MissingCredential),
        };

        let base_url = Url::parse(base_url).map_err(|_| ConfigError::InvalidUrl(base_url.to_owned()))?;
        if !matches!(base_url.scheme(), "http" | "https") || base_url.host_str().is_none() {
            return Err(ConfigError::InvalidUrl(base_url.to_string()));
        }

        Ok(Self { base_url, token })
    }

    /// URL of the state endpoint for a single entity.
    pub fn state_url(&self, entity_id: &str) -> String {
        format!("{}/api/states/{}", self.base_url.as_str().trim_end_matches('/'), entity_id)
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl fmt::Debug for HubConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("HubConfig")
            .field("base_url", &self.base_url.as_str())
            .field("token", &"<redacted>")
            .finish()
    }
}

/// Message stream readings are published to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamProtocol {
    Kafka,
    Mqtt,
}

impl StreamProtocol {
    pub fn default_port(&self) -> u16 {
        match self {
            StreamProtocol::Kafka => 9092,
            StreamProtocol::Mqtt => 1883,
        }
    }

    pub fn default_broker(&self) -> &'static str {
        match self {
            StreamProtocol::Kafka => "localhost:9092",
            StreamProtocol::Mqtt => "localhost:1883",
        }
    }

    pub fn as_label(&self) -> &'static str {
        match self {
            StreamProtocol::Kafka => "kafka",
            StreamProtocol::Mqtt => "mqtt",
        }
    }
}

impl FromStr for StreamProtocol {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kafka" => Ok(StreamProtocol::Kafka),
            "mqtt" => Ok(StreamProtocol::Mqtt),
            _ => Err(ConfigError::InvalidProtocol(s.to_owned())),
        }
    }
}

impl fmt::Display for StreamProtocol {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        self.as_label().fmt(f)
    }
}

/// Broker connection and destination topic for published readings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    pub protocol: StreamProtocol,
    pub host: String,
    pub port: u16,
    pub topic: String,
    /// Kafka partition records are produced to, unused for MQTT
    pub partition: i32,
    pub client_id: String,
}

impl StreamConfig {
    /// Parse a `host[:port]` broker address. Without a broker the protocol's usual
    /// local broker is used, without a port its usual port.
    pub fn new(protocol: StreamProtocol, broker: Option<&str>, topic: &str) -> Result<Self, ConfigError> {
        let broker = broker.unwrap_or_else(|| protocol.default_broker()).trim();
        let invalid = || ConfigError::InvalidBroker(broker.to_owned());

        let (host, port) = match broker.rsplit_once(':') {
            Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
            None => (broker, protocol.default_port()),
        };

        if host.is_empty() || port == 0 {
            return Err(invalid());
        }

        let topic = topic.trim();
        if topic.is_empty() {
            return Err(ConfigError::EmptyTopic);
        }

        Ok(Self {
            protocol,
            host: host.to_owned(),
            port,
            topic: topic.to_owned(),
            partition: 0,
            client_id: DEFAULT_CLIENT_ID.to_owned(),
        })
    }

    pub fn with_partition(mut self, partition: i32) -> Result<Self, ConfigError> {
        if partition < 0 {
            return Err(ConfigError::InvalidPartition(partition));
        }

        self.partition = partition;
        Ok(self)
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod test {
    use super::{ConfigError, HubConfig, StreamConfig, StreamProtocol, HUB_TOKEN_ENV};

    #[test]
    fn test_hub_missing_token() {
        let res = HubConfig::new("http://10.20.27.40:8123", None);
        assert_eq!(ConfigError::MissingCredential, res.unwrap_err());
    }

    #[test]
    fn test_hub_blank_token() {
        let res = HubConfig::new("http://10.20.27.40:8123", Some("   ".to_owned()));
        assert_eq!(ConfigError::MissingCredential, res.unwrap_err());
    }

    #[test]
    fn test_hub_missing_token_message_names_variable() {
        let msg = ConfigError::MissingCredential.to_string();
        assert!(msg.contains(HUB_TOKEN_ENV));
    }

    #[test]
    fn test_hub_token_checked_before_url() {
        let res = HubConfig::new("not a url", None);
        assert_eq!(ConfigError::MissingCredential, res.unwrap_err());
    }

    #[test]
    fn test_hub_invalid_url() {
        let res = HubConfig::new("ftp://hub.local", Some("secret".to_owned()));
        assert!(matches!(res.unwrap_err(), ConfigError::InvalidUrl(_)));

        let res = HubConfig::new("hub.local:8123/", Some("secret".to_owned()));
        assert!(matches!(res.unwrap_err(), ConfigError::InvalidUrl(_)));
    }

    #[test]
    fn test_hub_state_url() {
        let cfg = HubConfig::new("http://hub.local:8123/", Some(" secret\n".to_owned())).unwrap();

        assert_eq!("secret", cfg.token());
        assert_eq!(
            "http://hub.local:8123/api/states/climate.my_ecobee",
            cfg.state_url("climate.my_ecobee")
        );
    }

    #[test]
    fn test_hub_debug_redacts_token() {
        let cfg = HubConfig::new("http://hub.local:8123", Some("secret".to_owned())).unwrap();
        assert!(!format!("{:?}", cfg).contains("secret"));
    }

    #[test]
    fn test_stream_with_port() {
        let cfg = StreamConfig::new(StreamProtocol::Kafka, Some("broker.local:9093"), "temperature-readings").unwrap();

        assert_eq!(StreamProtocol::Kafka, cfg.protocol);
        assert_eq!("broker.local", cfg.host);
        assert_eq!(9093, cfg.port);
        assert_eq!("temperature-readings", cfg.topic);
        assert_eq!(0, cfg.partition);
        assert_eq!("broker.local:9093", cfg.address());
    }

    #[test]
    fn test_stream_default_port() {
        let kafka = StreamConfig::new(StreamProtocol::Kafka, Some("localhost"), "readings").unwrap();
        assert_eq!(9092, kafka.port);

        let mqtt = StreamConfig::new(StreamProtocol::Mqtt, Some("localhost"), "readings").unwrap();
        assert_eq!(1883, mqtt.port);
    }

    #[test]
    fn test_stream_default_broker() {
        let cfg = StreamConfig::new(StreamProtocol::Kafka, None, "temperature-readings").unwrap();
        assert_eq!("localhost:9092", cfg.address());

        let cfg = StreamConfig::new(StreamProtocol::Mqtt, None, "temperature-readings").unwrap();
        assert_eq!("localhost:1883", cfg.address());
    }

    #[test]
    fn test_stream_partition() {
        let cfg = StreamConfig::new(StreamProtocol::Kafka, None, "t").unwrap();
        assert_eq!(2, cfg.clone().with_partition(2).unwrap().partition);
        assert_eq!(ConfigError::InvalidPartition(-1), cfg.with_partition(-1).unwrap_err());
    }

    #[test]
    fn test_stream_protocol_from_str() {
        assert_eq!(StreamProtocol::Kafka, "kafka".parse::<StreamProtocol>().unwrap());
        assert_eq!(StreamProtocol::Mqtt, " MQTT".parse::<StreamProtocol>().unwrap());
        assert!(matches!(
            "amqp".parse::<StreamProtocol>().unwrap_err(),
            ConfigError::InvalidProtocol(_)
        ));
    }

    #[test]
    fn test_stream_invalid() {
        assert!(matches!(
            StreamConfig::new(StreamProtocol::Kafka, Some("localhost:abc"), "t").unwrap_err(),
            ConfigError::InvalidBroker(_)
        ));
        assert!(matches!(
            StreamConfig::new(StreamProtocol::Kafka, Some(":9092"), "t").unwrap_err(),
            ConfigError::InvalidBroker(_)
        ));
        assert_eq!(
            ConfigError::EmptyTopic,
            StreamConfig::new(StreamProtocol::Kafka, None, " ").unwrap_err()
        );
    }
}
