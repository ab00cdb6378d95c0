use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::compact::{CompactTarget, Target};
use crate::error::{KgwError, Result};

/// Where a header came from.
#[derive(
    Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq,
)]
pub enum HeaderOrigin {
    /// Fetched from a real chain
    Chain,
    /// Produced by the simulator, no proof of work behind it
    Synthetic,
}

/// The part of a block header that difficulty retargeting
/// looks at.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct BlockHeader {
    /// Height of the block
    pub height: u64,
    /// Timestamp of the block
    pub timestamp: DateTime<Utc>,
    /// Compact difficulty the block was mined at
    pub bits: CompactTarget,
    pub origin: HeaderOrigin,
}

impl BlockHeader {
    pub fn new(
        height: u64,
        timestamp: DateTime<Utc>,
        bits: CompactTarget,
    ) -> Self {
        BlockHeader {
            height,
            timestamp,
            bits,
            origin: HeaderOrigin::Chain,
        }
    }

    pub fn synthetic(
        height: u64,
        timestamp: DateTime<Utc>,
        bits: CompactTarget,
    ) -> Self {
        BlockHeader {
            height,
            timestamp,
            bits,
            origin: HeaderOrigin::Synthetic,
        }
    }

    pub fn target(&self) -> Target {
        self.bits.to_target()
    }

    pub fn is_synthetic(&self) -> bool {
        self.origin == HeaderOrigin::Synthetic
    }

    // may be negative when timestamps run backwards
    pub fn seconds_since(&self, earlier: &BlockHeader) -> i64 {
        (self.timestamp - earlier.timestamp).num_seconds()
    }

    /// Build the synthetic successor of this header, found
    /// `seconds` later at difficulty `bits`.
    pub fn next_synthetic(
        &self,
        seconds: u64,
        bits: CompactTarget,
    ) -> Result<BlockHeader> {
        let timestamp = i64::try_from(seconds)
            .ok()
            .and_then(Duration::try_seconds)
            .and_then(|elapsed| {
                self.timestamp.checked_add_signed(elapsed)
            })
            .ok_or(KgwError::TimestampOverflow)?;

        Ok(BlockHeader::synthetic(self.height + 1, timestamp, bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_next_synthetic() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let header =
            BlockHeader::new(10, start, CompactTarget::new(0x1c0f_fff0));

        let next = header
            .next_synthetic(150, CompactTarget::new(0x1c0f_0000))
            .unwrap();
        assert_eq!(next.height, 11);
        assert_eq!(next.seconds_since(&header), 150);
        assert_eq!(next.bits, CompactTarget::new(0x1c0f_0000));
        assert!(next.is_synthetic());
        assert!(!header.is_synthetic());
    }

    #[test]
    fn test_next_synthetic_overflow() {
        let start = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        let header =
            BlockHeader::new(10, start, CompactTarget::new(0x1c0f_fff0));

        assert!(matches!(
            header.next_synthetic(u64::MAX, header.bits),
            Err(KgwError::TimestampOverflow)
        ));
    }
}
