// Copyright (c) 2025 - Cowboy AI, Inc.
//! Routing control: which transactional path a query takes

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::errors::ConfigError;

/// Read or write intent of a query
///
/// Writers sends the unit of work down the executor's write path, Readers down
/// its read path. The set is closed; there is no third state to dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RoutingControl {
    #[default]
    Writers,
    Readers,
}

impl RoutingControl {
    pub fn is_read(&self) -> bool {
        matches!(self, RoutingControl::Readers)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RoutingControl::Writers => "writers",
            RoutingControl::Readers => "readers",
        }
    }
}

impl fmt::Display for RoutingControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RoutingControl {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "writers" | "writer" | "write" | "w" => Ok(RoutingControl::Writers),
            "readers" | "reader" | "read" | "r" => Ok(RoutingControl::Readers),
            other => Err(ConfigError::UnknownRoutingControl(other.to_string())),
        }
    }
}
