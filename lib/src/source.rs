//! Where historical headers come from.
//!
//! The simulator only needs an ordered, already fetched run
//! of headers ending at the best block. `HeaderSource`
//! abstracts over whatever produced them; `HeaderSnapshot`
//! is a file-backed implementation.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use std::io::{
    Error as IoError, ErrorKind as IoErrorKind, Read,
    Result as IoResult, Write,
};

use crate::compact::CompactTarget;
use crate::error::{KgwError, Result};
use crate::types::{BlockHeader, HeaderWindow};
use crate::util::Saveable;

pub trait HeaderSource {
    /// Height of the best known block.
    fn best_height(&self) -> Result<u64>;

    /// Up to `count` headers ending at `height`, oldest
    /// first. Fewer are returned only when the chain itself
    /// is shorter than `count`.
    fn headers_ending_at(
        &self,
        height: u64,
        count: usize,
    ) -> Result<Vec<BlockHeader>>;

    /// Fill a window of `capacity` headers ending at the
    /// best block.
    fn fetch_window(&self, capacity: usize) -> Result<HeaderWindow> {
        let best = self.best_height()?;
        let headers = self.headers_ending_at(best, capacity)?;
        debug!(best, fetched = headers.len(), "fetched header window");
        HeaderWindow::from_headers(capacity, headers)
    }
}

/// A gap-free run of headers held in memory and stored as
/// CBOR on disk.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct HeaderSnapshot {
    headers: Vec<BlockHeader>,
}

impl HeaderSnapshot {
    pub fn new(headers: Vec<BlockHeader>) -> Result<Self> {
        let snapshot = HeaderSnapshot { headers };
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Build `count` headers ending at `tip_height`, all at
    /// difficulty `bits` and exactly `spacing` seconds apart,
    /// the last one stamped `tip_time`.
    pub fn steady(
        tip_height: u64,
        count: u64,
        bits: CompactTarget,
        spacing: u64,
        tip_time: DateTime<Utc>,
    ) -> Result<Self> {
        if count == 0 || count > tip_height + 1 {
            return Err(KgwError::InvalidSnapshot(format!(
                "cannot build {} headers ending at height {}",
                count, tip_height
            )));
        }

        let first = tip_height + 1 - count;
        let headers = (first..=tip_height)
            .map(|height| -> Result<BlockHeader> {
                let behind = (tip_height - height)
                    .checked_mul(spacing)
                    .and_then(|secs| i64::try_from(secs).ok())
                    .and_then(Duration::try_seconds)
                    .and_then(|elapsed| {
                        tip_time.checked_sub_signed(elapsed)
                    })
                    .ok_or(KgwError::TimestampOverflow)?;
                Ok(BlockHeader::new(height, behind, bits))
            })
            .collect::<Result<Vec<_>>>()?;

        Self::new(headers)
    }

    pub fn headers(&self) -> &[BlockHeader] {
        &self.headers
    }

    pub fn len(&self) -> usize {
        self.headers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.headers.is_empty()
    }

    fn validate(&self) -> Result<()> {
        if self.headers.is_empty() {
            return Err(KgwError::InvalidSnapshot(
                "no headers".to_string(),
            ));
        }

        for pair in self.headers.windows(2) {
            if pair[1].height != pair[0].height + 1 {
                return Err(KgwError::NonContiguousHeaders {
                    expected: pair[0].height + 1,
                    found: pair[1].height,
                });
            }
        }

        Ok(())
    }
}

impl HeaderSource for HeaderSnapshot {
    fn best_height(&self) -> Result<u64> {
        self.headers
            .last()
            .map(|header| header.height)
            .ok_or(KgwError::EmptyWindow)
    }

    fn headers_ending_at(
        &self,
        height: u64,
        count: usize,
    ) -> Result<Vec<BlockHeader>> {
        let first = self.headers.first().ok_or(KgwError::EmptyWindow)?;
        let best = self.best_height()?;
        if height < first.height || height > best {
            return Err(KgwError::InvalidSnapshot(format!(
                "height {} outside snapshot range {}..={}",
                height, first.height, best
            )));
        }

        let end = (height - first.height) as usize + 1;
        // a snapshot starting at genesis holds the whole
        // chain, so a short answer is the truth there
        if end < count && first.height != 0 {
            return Err(KgwError::InsufficientHistory {
                required: count as u64,
                available: end as u64,
            });
        }

        let start = end.saturating_sub(count);
        Ok(self.headers[start..end].to_vec())
    }
}

// save and load expecting CBOR from ciborium as format
impl Saveable for HeaderSnapshot {
    fn load<I: Read>(reader: I) -> IoResult<Self> {
        let snapshot: HeaderSnapshot = ciborium::de::from_reader(
            reader,
        )
        .map_err(|_| {
            IoError::new(
                IoErrorKind::InvalidData,
                "Failed to deserialize HeaderSnapshot",
            )
        })?;

        snapshot.validate().map_err(|e| {
            IoError::new(IoErrorKind::InvalidData, e.to_string())
        })?;

        Ok(snapshot)
    }

    fn save<O: Write>(&self, writer: O) -> IoResult<()> {
        ciborium::ser::into_writer(self, writer).map_err(|_| {
            IoError::new(
                IoErrorKind::InvalidData,
                "Failed to serialize HeaderSnapshot",
            )
        })
    }
}
