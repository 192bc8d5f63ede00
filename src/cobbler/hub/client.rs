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

use crate::config::HubConfig;
use async_trait::async_trait;
use reqwest::header::{HeaderValue, CONTENT_TYPE};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use std::error::Error;
use std::fmt::{self, Formatter};
use std::time::Duration;

/// Bound on each individual request to the hub.
pub const HUB_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Kinds of errors encountered fetching and interpreting entity state from the hub
#[derive(PartialEq, Eq, Debug, Hash, Clone, Copy)]
pub enum HubErrorKind {
    Network,
    Status,
    Parse,
    MissingField,
}

impl HubErrorKind {
    pub fn as_label(&self) -> &'static str {
        match self {
            HubErrorKind::Network => "network",
            HubErrorKind::Status => "status",
            HubErrorKind::Parse => "parse",
            HubErrorKind::MissingField => "missing_field",
        }
    }

    /// True when the request itself failed, as opposed to the hub answering with
    /// something that isn't usable.
    pub fn is_request_fault(&self) -> bool {
        matches!(self, HubErrorKind::Network | HubErrorKind::Status)
    }
}

/// Error fetching or interpreting the state of a hub entity
#[derive(Debug)]
pub enum HubError {
    /// Entity and the name of the field it lacks
    MissingField(String, &'static str),
    /// Entity, field, and the value that couldn't be interpreted
    BadValue(String, &'static str, String),
    KindMsgCause(HubErrorKind, &'static str, Box<dyn Error + Send + Sync>),
}

impl HubError {
    pub fn kind(&self) -> HubErrorKind {
        match self {
            HubError::MissingField(_, _) => HubErrorKind::MissingField,
            HubError::BadValue(_, _, _) => HubErrorKind::Parse,
            HubError::KindMsgCause(kind, _, _) => *kind,
        }
    }
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            HubError::MissingField(entity, field) => write!(f, "{} has no '{}' field", entity, field),
            HubError::BadValue(entity, field, value) => {
                write!(f, "{} has unusable '{}' value: {}", entity, field, value)
            }
            HubError::KindMsgCause(_, msg, ref e) => write!(f, "{}: {}", msg, e),
        }
    }
}

impl Error for HubError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            HubError::KindMsgCause(_, _, ref e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HubError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_status() {
            HubError::KindMsgCause(HubErrorKind::Status, "hub returned error status", Box::new(e))
        } else if e.is_decode() {
            HubError::KindMsgCause(HubErrorKind::Parse, "unable to decode hub response", Box::new(e))
        } else {
            HubError::KindMsgCause(HubErrorKind::Network, "hub request failed", Box::new(e))
        }
    }
}

/// State of a single hub entity as returned by `GET /api/states/<entity_id>`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EntityState {
    #[serde(default)]
    pub entity_id: String,
    pub state: Option<String>,
    #[serde(default)]
    pub attributes: Map<String, Value>,
}

impl EntityState {
    pub fn state(&self) -> Result<&str, HubError> {
        self.state
            .as_deref()
            .ok_or_else(|| HubError::MissingField(self.entity_id.clone(), "state"))
    }

    /// Entity state interpreted as a number, e.g. a temperature or humidity sensor.
    /// `NaN`, infinities and values out of `f64` range are rejected.
    pub fn numeric_state(&self) -> Result<f64, HubError> {
        let raw = self.state()?;
        match raw.trim().parse::<f64>() {
            Ok(v) if v.is_finite() => Ok(v),
            _ => Err(HubError::BadValue(self.entity_id.clone(), "state", raw.to_owned())),
        }
    }

    pub fn attribute_str(&self, name: &'static str) -> Result<&str, HubError> {
        match self.attributes.get(name) {
            None | Some(Value::Null) => Err(HubError::MissingField(self.entity_id.clone(), name)),
            Some(Value::String(s)) => Ok(s),
            Some(other) => Err(HubError::BadValue(self.entity_id.clone(), name, other.to_string())),
        }
    }

    /// Numeric attribute exactly as the hub encoded it.
    pub fn attribute_number(&self, name: &'static str) -> Result<&Number, HubError> {
        match self.attributes.get(name) {
            None | Some(Value::Null) => Err(HubError::MissingField(self.entity_id.clone(), name)),
            Some(Value::Number(n)) => Ok(n),
            Some(other) => Err(HubError::BadValue(self.entity_id.clone(), name, other.to_string())),
        }
    }
}

/// Source of hub entity state.
#[async_trait]
pub trait EntityStates: Send + Sync {
    async fn entity_state(&self, entity_id: &str) -> Result<EntityState, HubError>;
}

/// `EntityStates` implementation backed by the hub REST API.
#[derive(Debug, Clone)]
pub struct HttpHubClient {
    http: Client,
    config: HubConfig,
}

impl HttpHubClient {
    pub fn new(config: HubConfig) -> Result<Self, HubError> {
        // The hub lives on the local network, never route requests through a proxy.
        let http = Client::builder()
            .timeout(HUB_REQUEST_TIMEOUT)
            .no_proxy()
            .build()
            .map_err(|e| HubError::KindMsgCause(HubErrorKind::Network, "unable to build HTTP client", Box::new(e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl EntityStates for HttpHubClient {
    async fn entity_state(&self, entity_id: &str) -> Result<EntityState, HubError> {
        let url = self.config.state_url(entity_id);
        tracing::debug!(message = "fetching entity state", entity_id = entity_id, url = %url);

        let mut state = self
            .http
            .get(&url)
            .bearer_auth(self.config.token())
            .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
            .send()
            .await?
            .error_for_status()?
            .json::<EntityState>()
            .await?;

        state.entity_id = entity_id.to_owned();
        Ok(state)
    }
}
