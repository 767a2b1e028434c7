use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::FlexError;

/// Authorization tier of a change.
///
/// Ordering is precedence: changes of a higher layer are applied after, and
/// therefore override, changes of a lower layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Layer {
    Vendor,
    Partner,
    Customer,
    User,
}

impl Layer {
    /// All layers, lowest precedence first.
    pub const ALL: [Layer; 4] = [Layer::Vendor, Layer::Partner, Layer::Customer, Layer::User];

    /// Returns the wire name of the layer.
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::Vendor => "VENDOR",
            Layer::Partner => "PARTNER",
            Layer::Customer => "CUSTOMER",
            Layer::User => "USER",
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layer {
    type Err = FlexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Layer::ALL
            .into_iter()
            .find(|layer| layer.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| FlexError::SerializationError(format!("unknown layer '{}'", s)))
    }
}
