//! Shared value types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Deployment environment a signed payload targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    #[serde(rename = "Production")]
    Production,
    #[serde(rename = "Sandbox")]
    Sandbox,
    #[serde(rename = "Xcode")]
    Xcode,
    #[serde(rename = "LocalTesting")]
    LocalTesting,
}

impl Environment {
    /// Wire name as it appears in payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Production => "Production",
            Self::Sandbox => "Sandbox",
            Self::Xcode => "Xcode",
            Self::LocalTesting => "LocalTesting",
        }
    }

    /// Whether chain and signature verification is skipped in this
    /// environment. Identity checks still apply.
    pub fn bypasses_verification(&self) -> bool {
        matches!(self, Self::Xcode | Self::LocalTesting)
    }
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Environment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        match normalized.as_str() {
            "production" => Ok(Self::Production),
            "sandbox" => Ok(Self::Sandbox),
            "xcode" => Ok(Self::Xcode),
            "localtesting" => Ok(Self::LocalTesting),
            _ => Err(format!("unknown environment: {s}")),
        }
    }
}
