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

use crate::hub::client::{EntityStates, HubError};
use crate::poll::ReadingSource;
use crate::reading::{Humidity, HvacStatus, Origin, Reading, Source, TemperatureFahrenheit};
use async_trait::async_trait;
use chrono::Local;
use std::sync::Arc;

pub const THERMOSTAT_SENSOR_ID: &str = "ecobee_thermostat";
pub const THERMOSTAT_LOCATION: &str = "whole_house";

/// Hub entity ids that together describe one thermostat.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThermostatEntities {
    pub temperature: String,
    pub humidity: String,
    pub climate: String,
}

impl Default for ThermostatEntities {
    fn default() -> Self {
        Self {
            temperature: "sensor.my_ecobee_current_temperature".to_owned(),
            humidity: "sensor.my_ecobee_current_humidity".to_owned(),
            climate: "climate.my_ecobee".to_owned(),
        }
    }
}

/// Produce normalized readings from a smart thermostat exposed by the hub.
///
/// The thermostat reports fahrenheit, so that is the canonical temperature here and
/// celsius is derived from it. A reading is only produced when all three entities
/// could be fetched and contain every expected field.
pub struct RemoteThermostatReader {
    hub: Arc<dyn EntityStates>,
    entities: ThermostatEntities,
    origin: Origin,
}

impl RemoteThermostatReader {
    pub fn new<H>(hub: H, entities: ThermostatEntities) -> Self
    where
        H: EntityStates + 'static,
    {
        Self {
            hub: Arc::new(hub),
            entities,
            origin: Origin::new(THERMOSTAT_SENSOR_ID, THERMOSTAT_LOCATION, Source::Ecobee),
        }
    }

    pub async fn read(&self) -> Option<Reading> {
        match self.fetch().await {
            Ok(reading) => Some(reading),
            Err(e) if e.kind().is_request_fault() => {
                tracing::warn!(
                    message = "unable to reach hub for thermostat reading",
                    kind = e.kind().as_label(),
                    error = %e,
                );
                None
            }
            Err(e) => {
                tracing::warn!(
                    message = "hub response missing expected thermostat field",
                    kind = e.kind().as_label(),
                    error = %e,
                );
                None
            }
        }
    }

    pub(crate) async fn fetch(&self) -> Result<Reading, HubError> {
        let temperature = self.hub.entity_state(&self.entities.temperature).await?;
        let humidity = self.hub.entity_state(&self.entities.humidity).await?;
        let climate = self.hub.entity_state(&self.entities.climate).await?;

        let fahrenheit = TemperatureFahrenheit::from(temperature.numeric_state()?);
        let relative = Humidity::from(humidity.numeric_state()?);
        let hvac = HvacStatus {
            hvac_mode: climate.state()?.to_owned(),
            hvac_action: climate.attribute_str("hvac_action")?.to_owned(),
            target_temperature: climate.attribute_number("temperature")?.clone(),
        };

        let reading = Reading::from_fahrenheit(&self.origin, Local::now(), fahrenheit, relative).map_err(|e| {
            let entity = if e.field() == "humidity" { &humidity } else { &temperature };
            HubError::BadValue(entity.entity_id.clone(), "state", e.to_string())
        })?;

        Ok(reading.with_hvac(hvac))
    }
}

#[async_trait]
impl ReadingSource for RemoteThermostatReader {
    fn name(&self) -> &'static str {
        self.origin.source.as_label()
    }

    async fn read(&self) -> Option<Reading> {
        RemoteThermostatReader::read(self).await
    }
}

#[cfg(test)]
mod test {
    use super::{RemoteThermostatReader, ThermostatEntities};
    use crate::hub::client::{HubError, HubErrorKind};
    use crate::hub::test::FakeHub;
    use crate::reading::Source;
    use serde_json::{json, Number};
    use std::sync::Arc;

    fn reader(hub: FakeHub) -> RemoteThermostatReader {
        RemoteThermostatReader::new(hub, ThermostatEntities::default())
    }

    #[tokio::test]
    async fn test_read_healthy() {
        let r = reader(FakeHub::healthy()).read().await.unwrap();

        assert_eq!(72.5, r.temperature_fahrenheit());
        assert_eq!(22.5, r.temperature_celsius());
        assert_eq!(40.0, r.humidity());
        assert_eq!(Source::Ecobee, r.source());
        assert_eq!("ecobee_thermostat", r.sensor_id());
        assert_eq!("whole_house", r.location());

        let hvac = r.hvac().unwrap();
        assert_eq!("heat", hvac.hvac_mode);
        assert_eq!("heating", hvac.hvac_action);
        assert_eq!(Number::from(70), hvac.target_temperature);
    }

    #[tokio::test]
    async fn test_read_requests_in_order() {
        let hub = FakeHub::healthy();
        let requested = Arc::clone(&hub.requested);
        reader(hub).read().await.unwrap();

        assert_eq!(
            vec![
                "sensor.my_ecobee_current_temperature",
                "sensor.my_ecobee_current_humidity",
                "climate.my_ecobee"
            ],
            *requested.lock().unwrap()
        );
    }

    #[tokio::test]
    async fn test_temperature_request_fails() {
        let hub = FakeHub::healthy().without("sensor.my_ecobee_current_temperature");
        let r = reader(hub);

        assert_eq!(HubErrorKind::Network, r.fetch().await.unwrap_err().kind());
        assert!(r.read().await.is_none());
    }

    #[tokio::test]
    async fn test_humidity_request_fails() {
        let hub = FakeHub::healthy().without("sensor.my_ecobee_current_humidity");
        let r = reader(hub);

        assert_eq!(HubErrorKind::Network, r.fetch().await.unwrap_err().kind());
        assert!(r.read().await.is_none());
    }

    #[tokio::test]
    async fn test_climate_request_fails() {
        let hub = FakeHub::healthy().without("climate.my_ecobee");
        let r = reader(hub);

        assert_eq!(HubErrorKind::Network, r.fetch().await.unwrap_err().kind());
        assert!(r.read().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_hvac_action() {
        let hub = FakeHub::healthy().with(
            "climate.my_ecobee",
            json!({"state": "heat", "attributes": {"temperature": 70}}),
        );
        let r = reader(hub);

        match r.fetch().await.unwrap_err() {
            HubError::MissingField(entity, field) => {
                assert_eq!("climate.my_ecobee", entity);
                assert_eq!("hvac_action", field);
            }
            e => panic!("unexpected error: {:?}", e),
        }
        assert!(r.read().await.is_none());
    }

    #[tokio::test]
    async fn test_missing_target_temperature() {
        let hub = FakeHub::healthy().with(
            "climate.my_ecobee",
            json!({"state": "off", "attributes": {"hvac_action": "idle"}}),
        );

        assert_eq!(HubErrorKind::MissingField, reader(hub).fetch().await.unwrap_err().kind());
    }

    #[tokio::test]
    async fn test_missing_humidity_state() {
        let hub = FakeHub::healthy().with("sensor.my_ecobee_current_humidity", json!({"attributes": {}}));

        assert_eq!(HubErrorKind::MissingField, reader(hub).fetch().await.unwrap_err().kind());
    }

    #[tokio::test]
    async fn test_unavailable_temperature() {
        let hub = FakeHub::healthy().with("sensor.my_ecobee_current_temperature", json!({"state": "unavailable"}));

        assert_eq!(HubErrorKind::Parse, reader(hub).fetch().await.unwrap_err().kind());
    }

    #[tokio::test]
    async fn test_target_temperature_passed_through() {
        let hub = FakeHub::healthy().with(
            "climate.my_ecobee",
            json!({"state": "cool", "attributes": {"hvac_action": "cooling", "temperature": 68.5}}),
        );
        let r = reader(hub).read().await.unwrap();
        let body = serde_json::to_string(&r).unwrap();

        assert!(body.contains("\"target_temperature\":68.5"), "{}", body);
        assert_eq!(Some("cooling"), r.hvac().map(|h| h.hvac_action.as_str()));
    }

    #[tokio::test]
    async fn test_target_temperature_not_a_number() {
        let hub = FakeHub::healthy().with(
            "climate.my_ecobee",
            json!({"state": "heat", "attributes": {"hvac_action": "heating", "temperature": "70"}}),
        );

        assert_eq!(HubErrorKind::Parse, reader(hub).fetch().await.unwrap_err().kind());
    }

    #[tokio::test]
    async fn test_nan_temperature() {
        let hub = FakeHub::healthy().with("sensor.my_ecobee_current_temperature", json!({"state": "NaN"}));
        let r = reader(hub);

        assert_eq!(HubErrorKind::Parse, r.fetch().await.unwrap_err().kind());
        assert!(r.read().await.is_none());
    }

    #[tokio::test]
    async fn test_infinite_temperature() {
        let hub = FakeHub::healthy().with("sensor.my_ecobee_current_temperature", json!({"state": "inf"}));
        let r = reader(hub);

        assert_eq!(HubErrorKind::Parse, r.fetch().await.unwrap_err().kind());
        assert!(r.read().await.is_none());
    }

    #[tokio::test]
    async fn test_nan_humidity() {
        let hub = FakeHub::healthy().with("sensor.my_ecobee_current_humidity", json!({"state": "nan"}));

        assert_eq!(HubErrorKind::Parse, reader(hub).fetch().await.unwrap_err().kind());
    }

    #[tokio::test]
    async fn test_temperature_too_large_to_convert() {
        let hub = FakeHub::healthy().with("sensor.my_ecobee_current_temperature", json!({"state": "1e307"}));

        match reader(hub).fetch().await.unwrap_err() {
            HubError::BadValue(entity, field, _) => {
                assert_eq!("sensor.my_ecobee_current_temperature", entity);
                assert_eq!("state", field);
            }
            e => panic!("unexpected error: {:?}", e),
        }
    }
}
