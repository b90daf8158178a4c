//! Function address value object.
//!
//! Addresses are the canonical identity of a function within one
//! decompilation result. They serialize as the `0x…` hex string the engine
//! reports so call-graph edges survive round-trips byte-identically.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// A virtual address inside one binary's address space.
///
/// All addresses produced by one engine session share one address-space
/// interpretation; comparing addresses across sessions is meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FunctionAddress(u64);

impl schemars::JsonSchema for FunctionAddress {
    fn schema_name() -> std::borrow::Cow<'static, str> {
        "FunctionAddress".into()
    }

    fn json_schema(_generator: &mut schemars::SchemaGenerator) -> schemars::Schema {
        schemars::json_schema!({
            "type": "string",
            "pattern": "^0x[0-9a-fA-F]+$"
        })
    }
}

impl FunctionAddress {
    /// Wrap a raw address.
    #[must_use]
    pub fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// The raw numeric address.
    #[must_use]
    pub fn value(&self) -> u64 {
        self.0
    }

    /// Whether this is the null address (the regression marker for broken
    /// extraction).
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Parse from `0x…` hex or plain decimal.
    pub fn parse(s: &str) -> Result<Self> {
        let parsed = if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            u64::from_str_radix(hex, 16)
        } else {
            s.parse::<u64>()
        };
        parsed
            .map(Self)
            .map_err(|e| Error::invalid_argument(format!("invalid address '{s}': {e}")))
    }
}

impl fmt::Display for FunctionAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl From<u64> for FunctionAddress {
    fn from(addr: u64) -> Self {
        Self(addr)
    }
}

impl FromStr for FunctionAddress {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl Serialize for FunctionAddress {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for FunctionAddress {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}
