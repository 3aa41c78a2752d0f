//! Output buffering modes.

use daedalus_core::{DispatchError, DispatchResult};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// How output captured while a route handler runs is combined with the
/// response body.
///
/// Accepted textual forms are `false` (disabled), `"prepend"` and
/// `"append"`. Everything else, `true` included, is rejected.
///
/// # Example
///
/// ```
/// use daedalus_route::OutputBuffering;
///
/// assert_eq!("prepend".parse::<OutputBuffering>().unwrap(), OutputBuffering::Prepend);
/// assert_eq!(OutputBuffering::try_from(false).unwrap(), OutputBuffering::Disabled);
/// assert!(OutputBuffering::try_from(true).is_err());
/// assert!("bogus".parse::<OutputBuffering>().is_err());
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum OutputBuffering {
    /// Output is not captured; it reaches the client as it is emitted.
    Disabled,
    /// Captured output is placed before the response body.
    Prepend,
    /// Captured output is written after the response body.
    #[default]
    Append,
}

impl OutputBuffering {
    /// Returns whether output is captured at all.
    #[must_use]
    pub const fn is_enabled(self) -> bool {
        !matches!(self, Self::Disabled)
    }
}

fn invalid_mode(shown: impl fmt::Display) -> DispatchError {
    DispatchError::invalid_argument(format!(
        "Unknown output buffering mode {shown}; expected false, \"prepend\" or \"append\""
    ))
}

impl FromStr for OutputBuffering {
    type Err = DispatchError;

    fn from_str(s: &str) -> DispatchResult<Self> {
        match s {
            "prepend" => Ok(Self::Prepend),
            "append" => Ok(Self::Append),
            other => Err(invalid_mode(format_args!("\"{other}\""))),
        }
    }
}

impl TryFrom<&str> for OutputBuffering {
    type Error = DispatchError;

    fn try_from(value: &str) -> DispatchResult<Self> {
        value.parse()
    }
}

impl TryFrom<bool> for OutputBuffering {
    type Error = DispatchError;

    fn try_from(value: bool) -> DispatchResult<Self> {
        if value {
            Err(invalid_mode(value))
        } else {
            Ok(Self::Disabled)
        }
    }
}

impl TryFrom<&serde_json::Value> for OutputBuffering {
    type Error = DispatchError;

    fn try_from(value: &serde_json::Value) -> DispatchResult<Self> {
        match value {
            serde_json::Value::Bool(flag) => Self::try_from(*flag),
            serde_json::Value::String(mode) => mode.parse(),
            other => Err(invalid_mode(other)),
        }
    }
}

impl fmt::Display for OutputBuffering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disabled => f.write_str("false"),
            Self::Prepend => f.write_str("prepend"),
            Self::Append => f.write_str("append"),
        }
    }
}

impl Serialize for OutputBuffering {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Disabled => serializer.serialize_bool(false),
            Self::Prepend => serializer.serialize_str("prepend"),
            Self::Append => serializer.serialize_str("append"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawMode {
    Flag(bool),
    Name(String),
}

impl<'de> Deserialize<'de> for OutputBuffering {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let parsed = match RawMode::deserialize(deserializer)? {
            RawMode::Flag(flag) => Self::try_from(flag),
            RawMode::Name(name) => name.parse(),
        };
        parsed.map_err(serde::de::Error::custom)
    }
}
