use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionStatus {
    Unknown,
    Active,
    Error,
}

impl ConnectionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionStatus::Unknown => "unknown",
            ConnectionStatus::Active => "active",
            ConnectionStatus::Error => "error",
        }
    }
}

impl FromStr for ConnectionStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(ConnectionStatus::Unknown),
            "active" => Ok(ConnectionStatus::Active),
            "error" => Ok(ConnectionStatus::Error),
            other => anyhow::bail!("unknown connection status: {other}"),
        }
    }
}

#[derive(Clone)]
pub struct Site {
    pub id: Uuid,
    pub name: String,
    pub base_url: String,
    pub api_key: String,
    pub connection_status: ConnectionStatus,
    pub last_connection: Option<DateTime<Utc>>,
    pub wp_version: Option<String>,
}

// Keeps the shared secret out of logs.
impl fmt::Debug for Site {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Site")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .field("connection_status", &self.connection_status)
            .field("last_connection", &self.last_connection)
            .field("wp_version", &self.wp_version)
            .finish()
    }
}
