use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Canonical object id used for every entity and principal: 12 bytes,
/// rendered as 24 lowercase hex characters.
///
/// Parsing accepts mixed case; display is always lowercase. The same format
/// is validated on every endpoint, so a malformed id fails the same way
/// everywhere.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Id([u8; 12]);

impl Id {
    /// Length of the string form, in hex characters.
    pub const HEX_LEN: usize = 24;

    /// Mint a fresh id from the leading bytes of a v4 UUID.
    pub fn generate() -> Self {
        let uuid = Uuid::new_v4();
        let mut bytes = [0u8; 12];
        bytes.copy_from_slice(&uuid.as_bytes()[..12]);
        Id(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    pub fn from_bytes(bytes: [u8; 12]) -> Self {
        Id(bytes)
    }
}

impl fmt::Display for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in self.0 {
            write!(f, "{:02x}", b)?;
        }
        Ok(())
    }
}

impl fmt::Debug for Id {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self)
    }
}

fn hex_val(c: u8) -> Option<u8> {
    match c {
        b'0'..=b'9' => Some(c - b'0'),
        b'a'..=b'f' => Some(c - b'a' + 10),
        b'A'..=b'F' => Some(c - b'A' + 10),
        _ => None,
    }
}

impl FromStr for Id {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != Self::HEX_LEN {
            return Err(format!(
                "expected {} hex characters, got {}",
                Self::HEX_LEN,
                s.len()
            ));
        }
        let raw = s.as_bytes();
        let mut bytes = [0u8; 12];
        for (i, out) in bytes.iter_mut().enumerate() {
            let hi = hex_val(raw[2 * i]).ok_or_else(|| format!("invalid hex in id: `{s}`"))?;
            let lo = hex_val(raw[2 * i + 1]).ok_or_else(|| format!("invalid hex in id: `{s}`"))?;
            *out = (hi << 4) | lo;
        }
        Ok(Id(bytes))
    }
}

impl TryFrom<String> for Id {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Id> for String {
    fn from(id: Id) -> Self {
        id.to_string()
    }
}
