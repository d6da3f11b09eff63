//! Domain DTOs for the deployment API.
//!
//! # Design
//! These types mirror the wire shape of the remote service. `created_at` is
//! owned by the server and never travels over the wire, so a value decoded
//! from a response always has it unset.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

/// A deployment resource managed by the remote service.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Deployment {
    /// Caller-assigned identifier; primary key for get and delete.
    pub id: Uuid,
    pub replicas: u32,
    pub image: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub labels: HashMap<String, String>,
    /// Order is significant to callers.
    #[serde(default, deserialize_with = "null_as_default")]
    pub ports: Vec<Port>,
    #[serde(skip)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An exposed port. Serialized as `{"name": .., "port": ..}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Port {
    pub name: String,
    #[serde(rename = "port")]
    pub number: u16,
}

impl Deployment {
    /// A deployment with a fresh random id and no labels or ports.
    pub fn new(image: impl Into<String>, replicas: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            replicas,
            image: image.into(),
            ..Default::default()
        }
    }

    pub fn with_port(mut self, name: impl Into<String>, number: u16) -> Self {
        self.ports.push(Port {
            name: name.into(),
            number,
        });
        self
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }
}

/// Servers that omit empty collections may send `null` instead.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
