use std::fmt;

use serde::Deserialize;
use serde::Serialize;

/// Generates a string-backed identifier newtype.
///
/// Layout entities are keyed by the short names assigned in the layout plan
/// (e.g. block "b1", route "b1+_b2-"), so identity is textual rather than
/// numeric.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(
                &self,
                f: &mut fmt::Formatter<'_>,
            ) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

string_id! {
    /// Identifier of a locomotive
    LocoId
}

string_id! {
    /// Identifier of a block
    BlockId
}

string_id! {
    /// Identifier of a route
    RouteId
}

string_id! {
    /// Identifier of a track plan tile; routes and blocks are joined on it
    TileId
}

/// Feedback sensor address on the accessory bus: device unit plus contact
/// number within the unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SensorAddress {
    pub device: u16,
    pub contact: u16,
}

impl SensorAddress {
    pub fn new(
        device: u16,
        contact: u16,
    ) -> Self {
        Self { device, contact }
    }
}

impl fmt::Display for SensorAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "{}:{}", self.device, self.contact)
    }
}

/// Turnout decoder address on the accessory bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnoutAddress(pub u16);

impl fmt::Display for TurnoutAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Signal decoder address on the accessory bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SignalAddress(pub u16);

impl fmt::Display for SignalAddress {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        self.0.fmt(f)
    }
}
