//! Activity identifiers for correlating nested operations

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 128-bit identifier assigned to one logical operation
///
/// Rendered as an uppercase hyphenated UUID, e.g.
/// `3F2504E0-4F89-11D3-9A0C-0305E82C3301`.
///
/// ```
/// use cpio_core_async::ActivityId;
///
/// let id = ActivityId::from_parts(0x3F2504E0_4F8911D3, 0x9A0C0305_E82C3301);
/// assert_eq!(id.to_string(), "3F2504E0-4F89-11D3-9A0C-0305E82C3301");
/// assert_eq!(id.to_string().parse::<ActivityId>().unwrap(), id);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActivityId(Uuid);

/// Error returned when parsing an [`ActivityId`] from text
#[derive(Debug, thiserror::Error)]
#[error("invalid activity id: {0}")]
pub struct ParseActivityIdError(#[from] uuid::Error);

impl ActivityId {
    /// The all-zero id, used where no activity exists
    pub const ZERO: ActivityId = ActivityId(Uuid::nil());

    /// Generate a fresh random id
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Build an id from its high and low 64-bit halves
    pub const fn from_parts(high: u64, low: u64) -> Self {
        Self(Uuid::from_u64_pair(high, low))
    }

    pub fn high(&self) -> u64 {
        self.0.as_u64_pair().0
    }

    pub fn low(&self) -> u64 {
        self.0.as_u64_pair().1
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_nil()
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for ActivityId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = Uuid::encode_buffer();
        f.write_str(self.0.hyphenated().encode_upper(&mut buf))
    }
}

impl FromStr for ActivityId {
    type Err = ParseActivityIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_generate_unique() {
        let ids: HashSet<ActivityId> = (0..1000).map(|_| ActivityId::generate()).collect();
        assert_eq!(ids.len(), 1000);
        assert!(!ids.contains(&ActivityId::ZERO));
    }

    #[test]
    fn test_parts_round_trip() {
        let id = ActivityId::from_parts(0xDEAD_BEEF_0000_0001, 42);
        assert_eq!(id.high(), 0xDEAD_BEEF_0000_0001);
        assert_eq!(id.low(), 42);
    }

    #[test]
    fn test_zero() {
        assert!(ActivityId::ZERO.is_zero());
        assert_eq!(ActivityId::default(), ActivityId::ZERO);
        assert_eq!(
            ActivityId::ZERO.to_string(),
            "00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_display_is_uppercase() {
        let text = ActivityId::from_parts(0xabcd_ef01_2345_6789, 0xabcd_ef01_2345_6789).to_string();
        assert_eq!(text, "ABCDEF01-2345-6789-ABCD-EF0123456789");
    }

    #[test]
    fn test_parse_lowercase_and_invalid() {
        let id: ActivityId = "abcdef01-2345-6789-abcd-ef0123456789".parse().unwrap();
        assert_eq!(id.high(), 0xabcd_ef01_2345_6789);
        assert!("not-an-id".parse::<ActivityId>().is_err());
    }
}
