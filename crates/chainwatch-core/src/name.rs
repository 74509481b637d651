//! Account and action names.
//!
//! Names are 64-bit values encoded as up to 13 characters from the alphabet
//! `.12345abcdefghijklmnopqrstuvwxyz`: five bits per character for the first
//! twelve characters and four bits for the thirteenth.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::ConfigError;

const CHARMAP: &[u8; 32] = b".12345abcdefghijklmnopqrstuvwxyz";
const MAX_LEN: usize = 13;

/// A base-32 encoded account, action or permission name.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Name(u64);

impl Name {
    /// The empty name. In a watch entry it stands for "any action".
    pub const EMPTY: Name = Name(0);

    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    pub const fn as_u64(self) -> u64 {
        self.0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

fn char_to_symbol(c: u8) -> Option<u64> {
    match c {
        b'a'..=b'z' => Some((c - b'a') as u64 + 6),
        b'1'..=b'5' => Some((c - b'1') as u64 + 1),
        b'.' => Some(0),
        _ => None,
    }
}

impl FromStr for Name {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| ConfigError::InvalidName {
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let bytes = s.as_bytes();
        if bytes.len() > MAX_LEN {
            return Err(invalid("longer than 13 characters"));
        }

        let mut value = 0u64;
        for (i, &c) in bytes.iter().enumerate() {
            let sym = char_to_symbol(c).ok_or_else(|| invalid("character outside [.1-5a-z]"))?;
            if i < 12 {
                value |= (sym & 0x1f) << (64 - 5 * (i + 1));
            } else {
                if sym > 0x0f {
                    return Err(invalid("thirteenth character must be in [.1-5a-j]"));
                }
                value |= sym;
            }
        }

        let name = Name(value);
        if name.to_string() != s {
            return Err(invalid("not normalized (trailing dots)"));
        }
        Ok(name)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut out = [b'.'; MAX_LEN];
        let mut tmp = self.0;
        for i in 0..MAX_LEN {
            let (mask, shift) = if i == 0 { (0x0f, 4) } else { (0x1f, 5) };
            out[MAX_LEN - 1 - i] = CHARMAP[(tmp & mask) as usize];
            tmp >>= shift;
        }
        let end = out.iter().rposition(|&c| c != b'.').map_or(0, |p| p + 1);
        // CHARMAP is ASCII
        f.write_str(std::str::from_utf8(&out[..end]).map_err(|_| fmt::Error)?)
    }
}

impl fmt::Debug for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Name({self})")
    }
}

impl Serialize for Name {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Name {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
