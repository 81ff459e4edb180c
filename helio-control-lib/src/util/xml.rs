//! Lenient field decoders for the fixtures' XML documents.
//!
//! The firmware leaves elements empty instead of omitting them, so an empty
//! element decodes to the zero value of its field. Text that is present but
//! does not parse still fails the whole document.

use std::net::IpAddr;
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

pub(crate) fn optional_ip<'de, D>(deserializer: D) -> Result<Option<IpAddr>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    IpAddr::from_str(raw)
        .map(Some)
        .map_err(|e| D::Error::custom(format!("invalid IP address {:?}: {}", raw, e)))
}

pub(crate) fn unsigned<'de, D>(deserializer: D) -> Result<u32, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(0);
    }
    raw.parse()
        .map_err(|e| D::Error::custom(format!("invalid number {:?}: {}", raw, e)))
}

pub(crate) fn flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    match raw.trim() {
        "" | "0" | "f" | "F" | "false" | "False" | "FALSE" => Ok(false),
        "1" | "t" | "T" | "true" | "True" | "TRUE" => Ok(true),
        other => Err(D::Error::custom(format!("invalid boolean {:?}", other))),
    }
}
