use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Syslog priority of a journal record, most urgent first.
///
/// The discriminant is the value journald stores in the `PRIORITY` field, so
/// ordering follows urgency: `Emergency < Alert < ... < Debug`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum Severity {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{0}' is unsupported log priority")]
pub struct UnknownSeverity(pub String);

impl Severity {
    /// Every level in ascending numeric order.
    pub const ALL: [Severity; 8] = [
        Severity::Emergency,
        Severity::Alert,
        Severity::Critical,
        Severity::Error,
        Severity::Warning,
        Severity::Notice,
        Severity::Info,
        Severity::Debug,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Canonical numeric alias, as written to the journal `PRIORITY` field.
    pub fn as_numeric_str(self) -> &'static str {
        match self {
            Severity::Emergency => "0",
            Severity::Alert => "1",
            Severity::Critical => "2",
            Severity::Error => "3",
            Severity::Warning => "4",
            Severity::Notice => "5",
            Severity::Info => "6",
            Severity::Debug => "7",
        }
    }

    /// Name alias used by systemd tooling (`journalctl -p err`).
    pub fn as_name(self) -> &'static str {
        match self {
            Severity::Emergency => "emerg",
            Severity::Alert => "alert",
            Severity::Critical => "crit",
            Severity::Error => "err",
            Severity::Warning => "warning",
            Severity::Notice => "notice",
            Severity::Info => "info",
            Severity::Debug => "debug",
        }
    }

    /// Case-sensitive lookup against both aliases of every level.
    pub fn from_alias(alias: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_numeric_str() == alias || level.as_name() == alias)
    }
}

impl FromStr for Severity {
    type Err = UnknownSeverity;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_alias(s).ok_or_else(|| UnknownSeverity(s.to_string()))
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_name())
    }
}

impl Serialize for Severity {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_name())
    }
}

impl<'de> Deserialize<'de> for Severity {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let alias = String::deserialize(deserializer)?;
        alias.parse().map_err(serde::de::Error::custom)
    }
}
