use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The part an acting user plays towards a trip.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
pub enum Role {
    #[default]
    #[serde(rename = "rider")]
    Rider,
    #[serde(rename = "driver")]
    Driver,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Rider => "rider",
            Role::Driver => "driver",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "rider" => Ok(Role::Rider),
            "driver" => Ok(Role::Driver),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// The authenticated caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: String,
    pub role: Role,
}

impl Actor {
    pub fn rider(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Rider,
        }
    }

    pub fn driver(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            role: Role::Driver,
        }
    }
}
